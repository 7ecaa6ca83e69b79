//! Director: the per-page owner of attached rigs and their frame subscription.
//!
//! Attaching a rig subscribes it to the host's frame loop; detaching tears it
//! down and unsubscribes it, so no frame after `detach` can reach its meshes.
//! A detached rig still reports poses until its teardown fade has finished.

use crate::audio::MediaBundle;
use crate::blender::ClipSpec;
use crate::config::Config;
use crate::ids::{IdAllocator, ListenerId, RequestId, RigId};
use crate::outputs::FrameOutputs;
use crate::sequencer::{PlaybackSequencer, RigConfig};
use crate::viseme::MorphTargetMesh;

/// Host lookup of the morph-target meshes that belong to a rig.
pub trait MorphTargetResolver {
    /// Call `visit` once for every morph-target mesh of `rig`.
    fn visit_meshes(&mut self, rig: RigId, visit: &mut dyn FnMut(&mut dyn MorphTargetMesh));
}

/// Resolver for hosts (or rigs) without any morph-target meshes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMeshes;

impl MorphTargetResolver for NoMeshes {
    fn visit_meshes(&mut self, _rig: RigId, _visit: &mut dyn FnMut(&mut dyn MorphTargetMesh)) {}
}

#[derive(Debug)]
pub struct Director {
    cfg: Config,
    ids: IdAllocator,
    rigs: Vec<PlaybackSequencer>,
    /// Torn-down rigs whose clips are still fading out.
    retiring: Vec<PlaybackSequencer>,
    outputs: FrameOutputs,
}

impl Director {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            ids: IdAllocator::new(),
            rigs: Vec::new(),
            retiring: Vec::new(),
            outputs: FrameOutputs::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Register a loaded rig with its clip list; its idle clip starts fading in.
    pub fn attach(
        &mut self,
        rig_cfg: &RigConfig,
        clips: impl IntoIterator<Item = ClipSpec>,
    ) -> RigId {
        let id = self.ids.alloc_rig();
        log::debug!("attach rig '{}' as {id:?}", rig_cfg.name);
        self.rigs
            .push(PlaybackSequencer::new(id, clips, rig_cfg, &self.cfg));
        id
    }

    /// Tear the rig down and stop routing signals and meshes to it. Returns `false`
    /// for unknown rigs.
    ///
    /// Frames keep carrying the rig's poses until the `teardown_stop` fade is over;
    /// the last one holds every clip at weight 0.
    pub fn detach(&mut self, rig: RigId) -> bool {
        let Some(pos) = self.rigs.iter().position(|s| s.rig() == rig) else {
            log::debug!("detach of unknown {rig:?}");
            return false;
        };
        let mut seq = self.rigs.remove(pos);
        seq.teardown();
        if seq.blender().is_fading() {
            self.retiring.push(seq);
        }
        true
    }

    pub fn is_attached(&self, rig: RigId) -> bool {
        self.rigs.iter().any(|s| s.rig() == rig)
    }

    pub fn rig_ids(&self) -> impl Iterator<Item = RigId> + '_ {
        self.rigs.iter().map(|s| s.rig())
    }

    pub fn rig(&self, rig: RigId) -> Option<&PlaybackSequencer> {
        self.rigs.iter().find(|s| s.rig() == rig)
    }

    fn rig_mut(&mut self, rig: RigId) -> Option<&mut PlaybackSequencer> {
        let found = self.rigs.iter_mut().find(|s| s.rig() == rig);
        if found.is_none() {
            log::debug!("signal for detached or unknown {rig:?} ignored");
        }
        found
    }

    /// Pointer interaction on the rig's root node.
    pub fn trigger(&mut self, rig: RigId) -> Option<RequestId> {
        self.rig_mut(rig)?.trigger()
    }

    pub fn media_ready(
        &mut self,
        rig: RigId,
        request: RequestId,
        media: MediaBundle,
    ) -> Option<ListenerId> {
        self.rig_mut(rig)?.media_ready(request, media)
    }

    pub fn audio_ended(&mut self, rig: RigId, listener: ListenerId) -> bool {
        self.rig_mut(rig)
            .is_some_and(|seq| seq.audio_ended(listener))
    }

    /// Frame-loop callback: advance every attached rig by `dt` seconds.
    pub fn frame(&mut self, dt: f32, resolver: &mut dyn MorphTargetResolver) -> &FrameOutputs {
        self.outputs.clear();
        for seq in self.rigs.iter_mut() {
            let id = seq.rig();
            let frame = seq.frame_with(dt, |apply| resolver.visit_meshes(id, apply));
            self.outputs.rigs.push(frame);
        }
        for seq in self.retiring.iter_mut() {
            // torn down: lip-sync is off, so meshes are never visited
            let frame = seq.frame_with(dt, |_| {});
            self.outputs.rigs.push(frame);
        }
        self.retiring.retain(|s| s.blender().is_fading());
        &self.outputs
    }
}

impl Default for Director {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
