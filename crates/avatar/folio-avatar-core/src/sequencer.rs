//! PlaybackSequencer: the click-to-speak sequence of one rig.
//!
//! ```text
//! Idle --trigger--> GestureStarting --media_ready--> LipSyncing --audio ended--> Restoring --gesture faded--> Idle
//! ```
//!
//! The session travels inside the state, so a second session cannot exist while
//! one is in flight and signals aimed at a finished session have nothing to act on.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioPlayback, MediaBundle};
use crate::blender::{ActionBlender, ClipSpec, LoopMode};
use crate::config::{BlendTimings, Config};
use crate::ids::{ClipHandle, IdAllocator, ListenerId, RequestId, RigId};
use crate::outputs::{RigEvent, RigFrame, VoiceAssets};
use crate::timeline::CueTimeline;
use crate::viseme::{MorphTargetMesh, VisemeDriver};

/// Observable phase of the playback sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    GestureStarting,
    LipSyncing,
    Restoring,
}

/// Picks a clip from a late-bound clip list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClipSelector {
    /// Position in the asset's clip list.
    Index(usize),
    Name(String),
}

impl ClipSelector {
    fn resolve(&self, blender: &ActionBlender) -> Option<ClipHandle> {
        match self {
            ClipSelector::Index(i) => blender.handle_at(*i),
            ClipSelector::Name(n) => blender.handle(n),
        }
    }

    fn describe(&self) -> String {
        match self {
            ClipSelector::Index(i) => format!("#{i}"),
            ClipSelector::Name(n) => n.clone(),
        }
    }
}

fn default_gesture_mode() -> LoopMode {
    LoopMode::Once
}

/// Which clips a rig idles and gestures with, and the voice line it speaks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    pub name: String,
    pub idle_clip: ClipSelector,
    pub gesture_clip: ClipSelector,
    /// `Once` leaves no clip running once the gesture ends, since idle is already
    /// stopped; use `Repeat` when the gesture is shorter than the voice line.
    #[serde(default = "default_gesture_mode")]
    pub gesture_mode: LoopMode,
    /// Rigs without a voice only idle; triggering them does nothing.
    #[serde(default)]
    pub voice: Option<VoiceAssets>,
}

impl RigConfig {
    /// The talking presenter: idles on the second clip, gestures with the first.
    pub fn presenter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idle_clip: ClipSelector::Index(1),
            gesture_clip: ClipSelector::Index(0),
            gesture_mode: LoopMode::Once,
            voice: Some(VoiceAssets::default()),
        }
    }

    /// Background scenery: loops its first clip forever.
    pub fn scenery(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idle_clip: ClipSelector::Index(0),
            gesture_clip: ClipSelector::Index(0),
            gesture_mode: LoopMode::Once,
            voice: None,
        }
    }
}

/// One trigger-to-idle episode. Dropping it silences its audio.
struct PlaybackSession {
    request: RequestId,
    gesture: Option<ClipHandle>,
    audio: Option<Box<dyn AudioPlayback>>,
    cues: CueTimeline,
    listener: Option<ListenerId>,
}

impl PlaybackSession {
    fn audio_time(&self) -> f32 {
        self.audio.as_ref().map_or(0.0, |a| a.current_time())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
        }
    }
}

enum Phase {
    Idle,
    GestureStarting(PlaybackSession),
    LipSyncing(PlaybackSession),
    Restoring(PlaybackSession),
}

impl Phase {
    fn state(&self) -> PlaybackState {
        match self {
            Phase::Idle => PlaybackState::Idle,
            Phase::GestureStarting(_) => PlaybackState::GestureStarting,
            Phase::LipSyncing(_) => PlaybackState::LipSyncing,
            Phase::Restoring(_) => PlaybackState::Restoring,
        }
    }
}

pub struct PlaybackSequencer {
    rig: RigId,
    name: String,
    blender: ActionBlender,
    viseme: VisemeDriver,
    timings: BlendTimings,
    presenting_yaw: f32,
    idle: Option<ClipHandle>,
    gesture_clip: ClipSelector,
    gesture_mode: LoopMode,
    voice: Option<VoiceAssets>,
    ids: IdAllocator,
    phase: Phase,
    yaw: f32,
    events: Vec<RigEvent>,
    torn_down: bool,
}

impl std::fmt::Debug for PlaybackSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSequencer")
            .field("rig", &self.rig)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("idle", &self.idle)
            .field("yaw", &self.yaw)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl PlaybackSequencer {
    /// Build the sequencer for a freshly loaded rig and start its idle clip.
    pub fn new(
        rig: RigId,
        clips: impl IntoIterator<Item = ClipSpec>,
        rig_cfg: &RigConfig,
        cfg: &Config,
    ) -> Self {
        let mut seq = Self {
            rig,
            name: rig_cfg.name.clone(),
            blender: ActionBlender::new(clips),
            viseme: VisemeDriver::new(cfg.viseme.clone(), cfg.phonemes.clone()),
            timings: cfg.blend.clone(),
            presenting_yaw: cfg.presenting_yaw,
            idle: None,
            gesture_clip: rig_cfg.gesture_clip.clone(),
            gesture_mode: rig_cfg.gesture_mode,
            voice: rig_cfg.voice.clone(),
            ids: IdAllocator::new(),
            phase: Phase::Idle,
            yaw: 0.0,
            events: Vec::new(),
            torn_down: false,
        };

        if seq.blender.is_empty() {
            log::warn!("rig '{}' has no animation clips", seq.name);
            return seq;
        }
        match rig_cfg.idle_clip.resolve(&seq.blender) {
            Some(idle) => {
                seq.blender
                    .play_handle(idle, seq.timings.idle_fade_in, LoopMode::Repeat);
                seq.idle = Some(idle);
            }
            None => {
                let wanted = rig_cfg.idle_clip.describe();
                log::warn!("rig '{}': idle clip {wanted} not found", seq.name);
                seq.events.push(RigEvent::ClipUnavailable { name: wanted });
            }
        }
        seq
    }

    pub fn rig(&self) -> RigId {
        self.rig
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PlaybackState {
        self.phase.state()
    }

    /// Whether a click on the rig would start a session.
    pub fn is_trigger_enabled(&self) -> bool {
        !self.torn_down && self.voice.is_some() && matches!(self.phase, Phase::Idle)
    }

    pub fn blender(&self) -> &ActionBlender {
        &self.blender
    }

    pub fn idle_clip(&self) -> Option<ClipHandle> {
        self.idle
    }

    /// Gesture clip of the session in flight.
    pub fn gesture_clip(&self) -> Option<ClipHandle> {
        self.session().and_then(|s| s.gesture)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn is_lip_sync_active(&self) -> bool {
        self.viseme.is_active()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Media request the host still has to answer.
    pub fn pending_request(&self) -> Option<RequestId> {
        match &self.phase {
            Phase::GestureStarting(s) => Some(s.request),
            _ => None,
        }
    }

    /// Listener currently attached to the session audio's "ended" signal.
    pub fn audio_listener(&self) -> Option<ListenerId> {
        match &self.phase {
            Phase::LipSyncing(s) => s.listener,
            _ => None,
        }
    }

    fn session(&self) -> Option<&PlaybackSession> {
        match &self.phase {
            Phase::Idle => None,
            Phase::GestureStarting(s) | Phase::LipSyncing(s) | Phase::Restoring(s) => Some(s),
        }
    }

    fn enter(&mut self, from: PlaybackState, next: Phase) {
        let to = next.state();
        self.phase = next;
        if from != to {
            log::debug!("rig '{}': {from:?} -> {to:?}", self.name);
            self.events.push(RigEvent::StateChanged { from, to });
        }
    }

    /// User clicked the rig. Starts a session from `Idle`; ignored in any other state.
    /// Returns the media request the host must fulfil with [`media_ready`](Self::media_ready).
    pub fn trigger(&mut self) -> Option<RequestId> {
        if !self.is_trigger_enabled() {
            log::debug!(
                "rig '{}': trigger ignored in {:?}",
                self.name,
                self.phase.state()
            );
            return None;
        }
        let assets = self.voice.clone()?;

        if let Some(idle) = self.idle {
            self.blender.stop(idle, self.timings.idle_fade_out);
        }
        let gesture = match self.gesture_clip.resolve(&self.blender) {
            Some(h) => self
                .blender
                .play_handle(h, self.timings.gesture_fade_in, self.gesture_mode),
            None => {
                let wanted = self.gesture_clip.describe();
                log::warn!("rig '{}': gesture clip {wanted} not found", self.name);
                self.events.push(RigEvent::ClipUnavailable { name: wanted });
                None
            }
        };
        self.yaw = self.presenting_yaw;

        let request = self.ids.alloc_request();
        self.events.push(RigEvent::MediaRequested { request, assets });
        self.enter(PlaybackState::Idle, Phase::GestureStarting(PlaybackSession {
            request,
            gesture,
            audio: None,
            cues: CueTimeline::empty(),
            listener: None,
        }));
        Some(request)
    }

    /// The host finished loading the voice media for `request`.
    ///
    /// Starts audio from zero and lip-sync, and returns the listener id the host must
    /// report the audio's end with. Missing cues or audio degrade the session instead of
    /// aborting it. Unknown or stale requests are ignored.
    pub fn media_ready(&mut self, request: RequestId, media: MediaBundle) -> Option<ListenerId> {
        let matches = matches!(&self.phase, Phase::GestureStarting(s) if s.request == request);
        if !matches {
            log::debug!("rig '{}': stale media request {request:?}", self.name);
            return None;
        }
        let Phase::GestureStarting(mut session) = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return None;
        };

        session.cues = match media.cues {
            Ok(timeline) => timeline,
            Err(e) => {
                log::warn!("rig '{}': {e}; speaking without lip-sync", self.name);
                self.events.push(RigEvent::CuesUnavailable {
                    reason: e.to_string(),
                });
                CueTimeline::empty()
            }
        };
        session.audio = media.audio;
        match session.audio.as_mut() {
            Some(audio) => {
                audio.rewind();
                audio.play();
            }
            None => {
                log::warn!("rig '{}': voice audio unavailable", self.name);
                self.events.push(RigEvent::AudioUnavailable);
            }
        }
        let listener = self.ids.alloc_listener();
        session.listener = Some(listener);
        self.viseme.activate();
        self.enter(PlaybackState::GestureStarting, Phase::LipSyncing(session));
        Some(listener)
    }

    /// The session audio fired its "ended" signal. Only the attached listener is honoured.
    pub fn audio_ended(&mut self, listener: ListenerId) -> bool {
        if self.audio_listener() != Some(listener) {
            log::debug!("rig '{}': ended signal for detached {listener:?}", self.name);
            return false;
        }
        self.begin_restore();
        true
    }

    fn begin_restore(&mut self) {
        let Phase::LipSyncing(mut session) = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return;
        };
        session.listener = None;
        self.viseme.deactivate();
        if let Some(gesture) = session.gesture {
            self.blender.stop(gesture, self.timings.gesture_stop);
        }
        self.yaw = 0.0;

        let idle = self.idle.or_else(|| {
            let fallback = self.blender.handle_at(0);
            if fallback.is_some() {
                log::debug!("rig '{}': no idle clip captured; using first clip", self.name);
            }
            fallback
        });
        if let Some(idle) = idle {
            self.blender
                .play_handle(idle, self.timings.idle_restore, LoopMode::Repeat);
            self.idle = Some(idle);
        }

        self.enter(PlaybackState::LipSyncing, Phase::Restoring(session));
    }

    /// Advance one rendered frame. `visit_meshes` is handed a callback that must be
    /// applied to every morph-target mesh of the rig; it is only invoked while
    /// lip-sync has work to do.
    pub fn frame_with<F>(&mut self, dt: f32, visit_meshes: F) -> RigFrame
    where
        F: FnOnce(&mut dyn FnMut(&mut dyn MorphTargetMesh)),
    {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        let mut ended = false;
        if let Phase::LipSyncing(session) = &mut self.phase {
            match session.audio.as_mut() {
                Some(audio) => {
                    audio.advance(dt);
                    ended = audio.has_ended();
                }
                None => ended = true,
            }
        }
        if ended {
            self.begin_restore();
        }

        let poses = self.blender.advance(dt).poses.clone();

        if let Phase::LipSyncing(session) = &self.phase {
            if let Some(frame) = self.viseme.begin_frame(session.audio_time(), &session.cues) {
                visit_meshes(&mut |mesh: &mut dyn MorphTargetMesh| frame.apply(mesh));
            }
        }

        let restored = match &self.phase {
            Phase::Restoring(session) => match session.gesture {
                Some(g) => Some(g) == self.idle || !self.blender.is_running(g),
                None => true,
            },
            _ => false,
        };
        if restored {
            self.enter(PlaybackState::Restoring, Phase::Idle);
        }

        RigFrame {
            rig: self.rig,
            state: self.state(),
            yaw: self.yaw,
            poses,
            events: std::mem::take(&mut self.events),
        }
    }

    /// [`frame_with`](Self::frame_with) over an owned set of meshes.
    pub fn frame<M: MorphTargetMesh>(&mut self, dt: f32, meshes: &mut [M]) -> RigFrame {
        self.frame_with(dt, |apply| {
            for mesh in meshes.iter_mut() {
                apply(mesh);
            }
        })
    }

    /// Release everything the rig holds: fades clips out, silences audio, detaches the
    /// ended listener and discards the session. Later signals are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.viseme.deactivate();
        self.blender.stop_all(self.timings.teardown_stop);
        self.yaw = 0.0;
        // dropping the session pauses its audio
        self.enter(self.state(), Phase::Idle);
        log::debug!("rig '{}': torn down", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ClockAudio;
    use crate::timeline::MouthCue;

    fn clips() -> Vec<ClipSpec> {
        vec![ClipSpec::new("Wave", 1.0), ClipSpec::new("Looking", 3.0)]
    }

    fn presenter() -> PlaybackSequencer {
        PlaybackSequencer::new(
            RigId(0),
            clips(),
            &RigConfig::presenter("avatar"),
            &Config::default(),
        )
    }

    fn cues() -> CueTimeline {
        CueTimeline::new(vec![MouthCue::new(0.0, 1.0, "AI"), MouthCue::new(1.0, 2.0, "rest")])
    }

    #[test]
    fn starts_idle_on_second_clip() {
        let seq = presenter();
        assert_eq!(seq.state(), PlaybackState::Idle);
        assert_eq!(seq.idle_clip(), seq.blender().handle("Looking"));
        assert_eq!(seq.blender().active(), seq.blender().handle("Looking"));
        assert!(seq.is_trigger_enabled());
    }

    #[test]
    fn trigger_starts_gesture_and_requests_media() {
        let mut seq = presenter();
        let req = seq.trigger().unwrap();
        assert_eq!(seq.state(), PlaybackState::GestureStarting);
        assert_eq!(seq.pending_request(), Some(req));
        assert_eq!(seq.blender().active(), seq.blender().handle("Wave"));
        assert_eq!(seq.yaw(), 0.5);
        assert!(!seq.is_trigger_enabled());

        let frame = seq.frame::<crate::viseme::MorphTargets>(0.0, &mut []);
        assert!(frame.events.iter().any(|e| matches!(
            e,
            RigEvent::MediaRequested { request, .. } if *request == req
        )));
    }

    #[test]
    fn stale_media_and_listener_are_ignored() {
        let mut seq = presenter();
        let req = seq.trigger().unwrap();
        assert!(seq
            .media_ready(RequestId(req.0 + 7), MediaBundle::new(ClockAudio::new(1.0), Ok(cues())))
            .is_none());
        assert_eq!(seq.state(), PlaybackState::GestureStarting);

        let listener = seq
            .media_ready(req, MediaBundle::new(ClockAudio::new(1.0), Ok(cues())))
            .unwrap();
        assert_eq!(seq.state(), PlaybackState::LipSyncing);
        assert!(!seq.audio_ended(ListenerId(listener.0 + 1)));
        assert_eq!(seq.state(), PlaybackState::LipSyncing);
        assert!(seq.audio_ended(listener));
        assert_eq!(seq.state(), PlaybackState::Restoring);
    }

    #[test]
    fn scenery_rig_ignores_trigger() {
        let mut seq = PlaybackSequencer::new(
            RigId(1),
            vec![ClipSpec::new("Hover", 2.0)],
            &RigConfig::scenery("robot"),
            &Config::default(),
        );
        assert_eq!(seq.idle_clip(), seq.blender().handle("Hover"));
        assert!(!seq.is_trigger_enabled());
        assert_eq!(seq.trigger(), None);
        assert_eq!(seq.state(), PlaybackState::Idle);
    }

    #[test]
    fn missing_idle_falls_back_to_first_clip_on_restore() {
        let mut seq = PlaybackSequencer::new(
            RigId(0),
            vec![ClipSpec::new("Wave", 0.5)],
            &RigConfig::presenter("solo"),
            &Config::default(),
        );
        assert_eq!(seq.idle_clip(), None);
        let req = seq.trigger().unwrap();
        let listener = seq
            .media_ready(req, MediaBundle::without_audio(Ok(cues())))
            .unwrap();
        assert!(seq.audio_ended(listener));
        assert_eq!(seq.idle_clip(), seq.blender().handle("Wave"));
        assert_eq!(seq.blender().active(), seq.blender().handle("Wave"));
        let frame = seq.frame::<crate::viseme::MorphTargets>(0.016, &mut []);
        assert_eq!(frame.state, PlaybackState::Idle);
    }
}
