//! Output contracts from the avatar core.
//!
//! Outputs carry the per-clip poses the host mixer must apply this frame and a
//! separate list of semantic events. Morph-target weights are written straight
//! into the host meshes by the viseme driver and are not repeated here.

use serde::{Deserialize, Serialize};

use crate::ids::{ClipHandle, RequestId, RigId};
use crate::sequencer::PlaybackState;

/// Local time and effective weight of one running clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipPose {
    pub clip: ClipHandle,
    pub name: String,
    pub time: f32,
    pub weight: f32,
}

/// Discrete signals raised while advancing the blender.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlendEvent {
    /// A weight ramp reached its target.
    FadeCompleted { clip: ClipHandle, weight: f32 },
    /// A play-once clip reached its end.
    Finished { clip: ClipHandle },
}

/// Poses and events produced by one [`crate::ActionBlender::advance`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlendOutputs {
    #[serde(default)]
    pub poses: Vec<ClipPose>,
    #[serde(default)]
    pub events: Vec<BlendEvent>,
}

impl BlendOutputs {
    #[inline]
    pub fn clear(&mut self) {
        self.poses.clear();
        self.events.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty() && self.events.is_empty()
    }

    pub fn pose(&self, clip: ClipHandle) -> Option<&ClipPose> {
        self.poses.iter().find(|p| p.clip == clip)
    }
}

/// Paths of the voice assets a host must fetch for a playback session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAssets {
    pub cues: String,
    pub audio: String,
}

impl Default for VoiceAssets {
    fn default() -> Self {
        Self {
            cues: "/audio/voice.json".into(),
            audio: "/audio/voice.wav".into(),
        }
    }
}

/// Semantic events of a rig's playback sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RigEvent {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    /// The host must start fetching `assets` and answer with `media_ready(request, ..)`.
    MediaRequested {
        request: RequestId,
        assets: VoiceAssets,
    },
    ClipUnavailable {
        name: String,
    },
    CuesUnavailable {
        reason: String,
    },
    AudioUnavailable,
}

/// Everything one rig produced during a frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigFrame {
    pub rig: RigId,
    pub state: PlaybackState,
    /// Root yaw (radians) the host applies to the rig's scene node.
    pub yaw: f32,
    #[serde(default)]
    pub poses: Vec<ClipPose>,
    #[serde(default)]
    pub events: Vec<RigEvent>,
}

/// Outputs returned by [`crate::Director::frame`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameOutputs {
    #[serde(default)]
    pub rigs: Vec<RigFrame>,
}

impl FrameOutputs {
    #[inline]
    pub fn clear(&mut self) {
        self.rigs.clear();
    }

    pub fn rig(&self, rig: RigId) -> Option<&RigFrame> {
        self.rigs.iter().find(|r| r.rig == rig)
    }
}
