use bevy::prelude::*;
use folio_avatar_core::{ClipSpec, RigConfig, RigId};

/// Spawned by the host once a rig's asset has loaded. The attach system replaces it
/// with [`AvatarRig`].
#[derive(Component, Debug, Clone)]
pub struct AvatarRigRequest {
    pub config: RigConfig,
    pub clips: Vec<ClipSpec>,
}

/// Root of an attached rig. Morph-target meshes are looked up among its descendants.
/// Despawning the entity (or removing this component) tears the rig down.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarRig {
    pub id: RigId,
}
