//! Bevy adapter for the folio avatar core.
//!
//! Spawn an [`AvatarRigRequest`] on the rig's scene root once its asset has loaded.
//! Clicks, media and audio-ended signals travel as events; lip-sync writes go
//! straight into the rig's `MorphWeights`.

use bevy::prelude::*;
use folio_avatar_core::{Config, Director};

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{AvatarRig, AvatarRigRequest};
pub use resources::{
    AvatarAudioEnded, AvatarAudioStarted, AvatarClicked, AvatarDirector, AvatarMediaLoaded,
    AvatarMediaRequested, LatestAvatarFrame, RigEntities,
};

#[derive(Default)]
pub struct FolioAvatarPlugin {
    pub config: Config,
}

impl Plugin for FolioAvatarPlugin {
    fn build(&self, app: &mut App) {
        let cfg = match self.config.validate() {
            Ok(()) => self.config.clone(),
            Err(e) => {
                log::warn!("invalid avatar config ({e}); using defaults");
                Config::default()
            }
        };
        app.insert_non_send_resource(AvatarDirector(Director::new(cfg)))
            .init_resource::<LatestAvatarFrame>()
            .init_resource::<RigEntities>()
            .add_event::<AvatarClicked>()
            .add_event::<AvatarMediaRequested>()
            .add_event::<AvatarMediaLoaded>()
            .add_event::<AvatarAudioStarted>()
            .add_event::<AvatarAudioEnded>()
            .add_systems(
                Update,
                (
                    systems::detach_removed_rigs_system,
                    systems::attach_rigs_system,
                    systems::handle_clicks_system,
                    systems::media_loaded_system,
                    systems::audio_ended_system,
                    systems::frame_system,
                )
                    .chain(),
            );
    }
}
