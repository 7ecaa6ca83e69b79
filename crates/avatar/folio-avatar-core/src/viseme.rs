//! VisemeDriver: per-frame mouth shapes from audio time and a cue timeline.
//!
//! Every morph target decays toward rest each frame; the target named by the
//! active cue's phoneme is pulled toward the attack weight instead. The result
//! is an attack/decay envelope per phoneme rather than hard snapping.

use crate::config::{PhonemeMap, VisemeConfig};
use crate::timeline::CueTimeline;

/// Morph-target access on a host mesh. The driver only looks up indices and
/// writes influences; it never adds or removes targets.
pub trait MorphTargetMesh {
    fn morph_target_index(&self, name: &str) -> Option<usize>;
    fn morph_influences_mut(&mut self) -> &mut [f32];
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug, Clone)]
pub struct VisemeDriver {
    cfg: VisemeConfig,
    phonemes: PhonemeMap,
    active: bool,
}

impl VisemeDriver {
    pub fn new(cfg: VisemeConfig, phonemes: PhonemeMap) -> Self {
        Self {
            cfg,
            phonemes,
            active: false,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Resolve the viseme for `audio_time`, or `None` on the idle path (driver inactive
    /// or timeline empty), in which case no mesh must be touched this frame.
    pub fn begin_frame<'a>(
        &'a self,
        audio_time: f32,
        timeline: &'a CueTimeline,
    ) -> Option<VisemeFrame<'a>> {
        if !self.active || timeline.is_empty() {
            return None;
        }
        let viseme = timeline
            .find_active_cue(audio_time)
            .and_then(|cue| self.phonemes.viseme_for(&cue.value));
        Some(VisemeFrame {
            cfg: &self.cfg,
            viseme,
        })
    }

    /// Advance mouth shapes of every mesh by one rendered frame.
    /// Returns `false` when the idle path was taken.
    pub fn step<M: MorphTargetMesh>(
        &self,
        audio_time: f32,
        timeline: &CueTimeline,
        meshes: &mut [M],
    ) -> bool {
        let Some(frame) = self.begin_frame(audio_time, timeline) else {
            return false;
        };
        for mesh in meshes.iter_mut() {
            frame.apply(mesh);
        }
        true
    }
}

/// Viseme selection for one frame, applied to each tracked mesh in turn.
#[derive(Debug, Clone, Copy)]
pub struct VisemeFrame<'a> {
    cfg: &'a VisemeConfig,
    viseme: Option<&'a str>,
}

impl VisemeFrame<'_> {
    /// Morph target pulled toward the attack weight this frame, if any.
    pub fn viseme(&self) -> Option<&str> {
        self.viseme
    }

    pub fn apply<M: MorphTargetMesh + ?Sized>(&self, mesh: &mut M) {
        let target = self.viseme.and_then(|name| mesh.morph_target_index(name));
        let influences = mesh.morph_influences_mut();
        for w in influences.iter_mut() {
            *w = lerp(*w, 0.0, self.cfg.decay_factor);
        }
        if let Some(w) = target.and_then(|idx| influences.get_mut(idx)) {
            *w = lerp(*w, self.cfg.attack_target, self.cfg.attack_factor);
        }
    }
}

impl<T: MorphTargetMesh + ?Sized> MorphTargetMesh for &mut T {
    fn morph_target_index(&self, name: &str) -> Option<usize> {
        (**self).morph_target_index(name)
    }

    fn morph_influences_mut(&mut self) -> &mut [f32] {
        (**self).morph_influences_mut()
    }
}

/// Simple owned mesh: a name → index dictionary plus an influence array.
#[derive(Debug, Clone, Default)]
pub struct MorphTargets {
    names: Vec<String>,
    influences: Vec<f32>,
}

impl MorphTargets {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let influences = vec![0.0; names.len()];
        Self { names, influences }
    }

    pub fn weight(&self, name: &str) -> Option<f32> {
        self.morph_target_index(name).map(|i| self.influences[i])
    }

    pub fn influences(&self) -> &[f32] {
        &self.influences
    }
}

impl MorphTargetMesh for MorphTargets {
    fn morph_target_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn morph_influences_mut(&mut self) -> &mut [f32] {
        &mut self.influences
    }
}
