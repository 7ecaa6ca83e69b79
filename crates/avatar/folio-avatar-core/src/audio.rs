//! Audio position sources and the media handed over when a session's request completes.

use crate::error::CueError;
use crate::timeline::CueTimeline;

/// Host audio element as seen by a playback session.
///
/// Hosts with an "ended" callback forward it through `audio_ended(listener)`; hosts
/// that can only poll report it through [`has_ended`](Self::has_ended).
pub trait AudioPlayback {
    /// Seek to the start.
    fn rewind(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    /// Playback position in seconds.
    fn current_time(&self) -> f32;

    /// Called once per frame while the session runs; clock-driven sources advance here.
    fn advance(&mut self, _dt: f32) {}

    fn has_ended(&self) -> bool {
        false
    }
}

/// Audio clock of a known length advanced by the frame loop.
///
/// Stands in for backends that cannot report their playback position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockAudio {
    duration: f32,
    time: f32,
    playing: bool,
    ended: bool,
}

impl ClockAudio {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            time: 0.0,
            playing: false,
            ended: false,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl AudioPlayback for ClockAudio {
    fn rewind(&mut self) {
        self.time = 0.0;
        self.ended = false;
    }

    fn play(&mut self) {
        if !self.ended {
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn current_time(&self) -> f32 {
        self.time
    }

    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.time += dt.max(0.0);
        if self.time >= self.duration {
            self.time = self.duration;
            self.playing = false;
            self.ended = true;
        }
    }

    fn has_ended(&self) -> bool {
        self.ended
    }
}

/// Result of a media request: the voice audio and its cue timeline.
/// Either half may be missing; the session degrades instead of aborting.
pub struct MediaBundle {
    pub audio: Option<Box<dyn AudioPlayback>>,
    pub cues: Result<CueTimeline, CueError>,
}

impl MediaBundle {
    pub fn new(audio: impl AudioPlayback + 'static, cues: Result<CueTimeline, CueError>) -> Self {
        Self {
            audio: Some(Box::new(audio)),
            cues,
        }
    }

    /// Cues loaded but no playable audio.
    pub fn without_audio(cues: Result<CueTimeline, CueError>) -> Self {
        Self { audio: None, cues }
    }
}

impl std::fmt::Debug for MediaBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBundle")
            .field("audio", &self.audio.is_some())
            .field("cues", &self.cues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_audio_runs_to_end() {
        let mut a = ClockAudio::new(1.0);
        a.advance(0.5);
        assert_eq!(a.current_time(), 0.0);

        a.play();
        a.advance(0.6);
        assert!(!a.has_ended());
        a.advance(0.6);
        assert!(a.has_ended());
        assert_eq!(a.current_time(), 1.0);
        assert!(!a.is_playing());

        a.rewind();
        assert!(!a.has_ended());
        assert_eq!(a.current_time(), 0.0);
    }
}
