use std::collections::HashMap;

use bevy::prelude::*;
use folio_avatar_core::{
    CueError, CueTimeline, Director, FrameOutputs, ListenerId, RequestId, RigId, VoiceAssets,
};

/// The core director. Sessions own host audio handles, so it lives as a non-send resource.
pub struct AvatarDirector(pub Director);

/// Outputs of the most recent frame (clip poses, yaw, events) for hosts that apply
/// clip weights to their own animation players.
#[derive(Resource, Default)]
pub struct LatestAvatarFrame(pub FrameOutputs);

/// Entity → rig mapping, kept so teardown still knows the id after a despawn.
#[derive(Resource, Default)]
pub struct RigEntities {
    pub map: HashMap<Entity, RigId>,
}

/// Pointer interaction on a rig.
#[derive(Event, Debug, Clone, Copy)]
pub struct AvatarClicked {
    pub rig: RigId,
}

/// The host must fetch `assets` and answer with [`AvatarMediaLoaded`].
#[derive(Event, Debug, Clone)]
pub struct AvatarMediaRequested {
    pub rig: RigId,
    pub request: RequestId,
    pub assets: VoiceAssets,
}

/// Fetched voice media. Audio is modelled as a clock of `audio_seconds`; `None`
/// means the audio could not be loaded.
#[derive(Event, Debug, Clone)]
pub struct AvatarMediaLoaded {
    pub rig: RigId,
    pub request: RequestId,
    pub cues: Result<CueTimeline, CueError>,
    pub audio_seconds: Option<f32>,
}

/// Listener id handed out when the session's audio started.
#[derive(Event, Debug, Clone, Copy)]
pub struct AvatarAudioStarted {
    pub rig: RigId,
    pub listener: ListenerId,
}

/// Forwarded "ended" signal of a session's audio.
#[derive(Event, Debug, Clone, Copy)]
pub struct AvatarAudioEnded {
    pub rig: RigId,
    pub listener: ListenerId,
}
