use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::mesh::morph::MorphWeights;
use folio_avatar_core::{
    ClockAudio, MediaBundle, MorphTargetMesh, MorphTargetResolver, RigEvent, RigId,
};

use crate::components::{AvatarRig, AvatarRigRequest};
use crate::resources::{
    AvatarAudioEnded, AvatarAudioStarted, AvatarClicked, AvatarDirector, AvatarMediaLoaded,
    AvatarMediaRequested, LatestAvatarFrame, RigEntities,
};

/// Attach every newly requested rig and tag its entity with the allocated id.
pub fn attach_rigs_system(
    mut commands: Commands,
    requests: Query<(Entity, &AvatarRigRequest), Without<AvatarRig>>,
    mut director: NonSendMut<AvatarDirector>,
    mut entities: ResMut<RigEntities>,
) {
    for (entity, req) in requests.iter() {
        let id = director.0.attach(&req.config, req.clips.iter().cloned());
        entities.map.insert(entity, id);
        commands
            .entity(entity)
            .insert(AvatarRig { id })
            .remove::<AvatarRigRequest>();
    }
}

/// Tear down rigs whose entity was despawned or lost its [`AvatarRig`].
pub fn detach_removed_rigs_system(
    mut removed: RemovedComponents<AvatarRig>,
    mut director: NonSendMut<AvatarDirector>,
    mut entities: ResMut<RigEntities>,
) {
    for entity in removed.read() {
        if let Some(id) = entities.map.remove(&entity) {
            director.0.detach(id);
        }
    }
}

pub fn handle_clicks_system(
    mut clicks: EventReader<AvatarClicked>,
    mut director: NonSendMut<AvatarDirector>,
) {
    for click in clicks.read() {
        director.0.trigger(click.rig);
    }
}

/// Start sessions whose media finished loading.
pub fn media_loaded_system(
    mut loaded: EventReader<AvatarMediaLoaded>,
    mut started: EventWriter<AvatarAudioStarted>,
    mut director: NonSendMut<AvatarDirector>,
) {
    for ev in loaded.read() {
        let media = match ev.audio_seconds {
            Some(secs) => MediaBundle::new(ClockAudio::new(secs), ev.cues.clone()),
            None => MediaBundle::without_audio(ev.cues.clone()),
        };
        if let Some(listener) = director.0.media_ready(ev.rig, ev.request, media) {
            started.send(AvatarAudioStarted {
                rig: ev.rig,
                listener,
            });
        }
    }
}

pub fn audio_ended_system(
    mut ended: EventReader<AvatarAudioEnded>,
    mut director: NonSendMut<AvatarDirector>,
) {
    for ev in ended.read() {
        director.0.audio_ended(ev.rig, ev.listener);
    }
}

struct MorphMesh<'a> {
    names: &'a [String],
    weights: &'a mut [f32],
}

impl MorphTargetMesh for MorphMesh<'_> {
    fn morph_target_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn morph_influences_mut(&mut self) -> &mut [f32] {
        self.weights
    }
}

/// Morph-weight entities under each rig root, with the target names of their mesh.
struct EcsResolver<'q, 'w, 's> {
    targets: HashMap<RigId, Vec<(Entity, Vec<String>)>>,
    weights: &'q mut Query<'w, 's, &'static mut MorphWeights>,
}

impl MorphTargetResolver for EcsResolver<'_, '_, '_> {
    fn visit_meshes(&mut self, rig: RigId, visit: &mut dyn FnMut(&mut dyn MorphTargetMesh)) {
        let Some(targets) = self.targets.get(&rig) else {
            return;
        };
        for (entity, names) in targets {
            if let Ok(mut w) = self.weights.get_mut(*entity) {
                let mut mesh = MorphMesh {
                    names,
                    weights: w.weights_mut(),
                };
                visit(&mut mesh);
            }
        }
    }
}

fn collect_morph_targets(
    root: Entity,
    children: &Query<&Children>,
    weights: &Query<&'static mut MorphWeights>,
    meshes: Option<&Assets<Mesh>>,
    out: &mut Vec<(Entity, Vec<String>)>,
) {
    if let Ok(w) = weights.get(root) {
        let names = w
            .first_mesh()
            .and_then(|h| meshes.and_then(|m| m.get(h)))
            .and_then(|m| m.morph_target_names())
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        out.push((root, names));
    }
    if let Ok(cs) = children.get(root) {
        for &c in cs.iter() {
            collect_morph_targets(c, children, weights, meshes, out);
        }
    }
}

/// Per-frame tick: advance every rig, write lip-sync weights into `MorphWeights`,
/// apply the rig yaw and publish the frame's outputs.
pub fn frame_system(
    time: Res<Time>,
    mut director: NonSendMut<AvatarDirector>,
    mut latest: ResMut<LatestAvatarFrame>,
    mut requested: EventWriter<AvatarMediaRequested>,
    mut rigs: Query<(Entity, &AvatarRig, &mut Transform)>,
    children: Query<&Children>,
    mut weights: Query<&'static mut MorphWeights>,
    meshes: Option<Res<Assets<Mesh>>>,
) {
    let mut targets: HashMap<RigId, Vec<(Entity, Vec<String>)>> = HashMap::new();
    for (entity, rig, _) in rigs.iter() {
        let list = targets.entry(rig.id).or_default();
        collect_morph_targets(entity, &children, &weights, meshes.as_deref(), list);
    }

    let mut resolver = EcsResolver {
        targets,
        weights: &mut weights,
    };
    let out = director.0.frame(time.delta_seconds(), &mut resolver);

    for frame in &out.rigs {
        for ev in &frame.events {
            if let RigEvent::MediaRequested { request, assets } = ev {
                requested.send(AvatarMediaRequested {
                    rig: frame.rig,
                    request: *request,
                    assets: assets.clone(),
                });
            }
        }
    }
    for (_, rig, mut tf) in rigs.iter_mut() {
        if let Some(frame) = out.rig(rig.id) {
            tf.rotation = Quat::from_rotation_y(frame.yaw);
        }
    }
    latest.0.clone_from(out);
}
