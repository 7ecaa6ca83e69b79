use std::time::Duration;

use bevy::prelude::*;
use bevy::render::mesh::morph::MorphWeights;
use bevy::time::TimeUpdateStrategy;
use bevy_folio_avatar::{
    AvatarAudioStarted, AvatarClicked, AvatarDirector, AvatarMediaLoaded, AvatarMediaRequested,
    AvatarRig, AvatarRigRequest, FolioAvatarPlugin, LatestAvatarFrame,
};
use folio_avatar_core::{ClipSpec, CueTimeline, PlaybackState, RigConfig, RigId};

fn app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(FolioAvatarPlugin::default())
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(50)));
    app
}

fn spawn_presenter(app: &mut App) -> Entity {
    app.world_mut()
        .spawn((
            AvatarRigRequest {
                config: RigConfig::presenter("AvatarMainOP"),
                clips: vec![ClipSpec::new("Wave", 1.0), ClipSpec::new("Looking", 3.0)],
            },
            Transform::default(),
        ))
        .id()
}

fn rig_of(app: &App, entity: Entity) -> RigId {
    app.world().get::<AvatarRig>(entity).expect("rig attached").id
}

fn drain<E: Event + Clone>(app: &App) -> Vec<E> {
    let events = app.world().resource::<Events<E>>();
    let mut reader = events.get_reader();
    reader.read(events).cloned().collect()
}

fn state(app: &App, rig: RigId) -> PlaybackState {
    app.world()
        .non_send_resource::<AvatarDirector>()
        .0
        .rig(rig)
        .expect("rig known")
        .state()
}

#[test]
fn plugin_inserts_director_resource() {
    let app = app();
    assert!(app.world().get_non_send_resource::<AvatarDirector>().is_some());
    assert!(app.world().get_resource::<LatestAvatarFrame>().is_some());
}

#[test]
fn request_component_attaches_rig() {
    let mut app = app();
    let entity = spawn_presenter(&mut app);
    app.update();

    let rig = rig_of(&app, entity);
    assert!(app.world().get::<AvatarRigRequest>(entity).is_none());
    assert_eq!(state(&app, rig), PlaybackState::Idle);

    app.update();
    let latest = app.world().resource::<LatestAvatarFrame>();
    assert!(latest.0.rig(rig).is_some());
}

#[test]
fn click_to_speak_round_trip_through_events() {
    let mut app = app();
    let entity = spawn_presenter(&mut app);
    app.update();
    let rig = rig_of(&app, entity);

    app.world_mut().send_event(AvatarClicked { rig });
    app.update();
    let requested: Vec<AvatarMediaRequested> = drain(&app);
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].assets.audio, "/audio/voice.wav");
    assert_eq!(state(&app, rig), PlaybackState::GestureStarting);

    let json = folio_test_fixtures::cues::json("voice").unwrap();
    app.world_mut().send_event(AvatarMediaLoaded {
        rig,
        request: requested[0].request,
        cues: CueTimeline::from_json(&json),
        audio_seconds: Some(0.3),
    });
    app.update();
    assert_eq!(drain::<AvatarAudioStarted>(&app).len(), 1);
    assert_eq!(state(&app, rig), PlaybackState::LipSyncing);
    let yawed = app.world().get::<Transform>(entity).unwrap().rotation;
    assert!(yawed.angle_between(Quat::from_rotation_y(0.5)) < 1e-4);

    for _ in 0..20 {
        app.update();
    }
    assert_eq!(state(&app, rig), PlaybackState::Idle);
    let rotation = app.world().get::<Transform>(entity).unwrap().rotation;
    assert!(rotation.angle_between(Quat::IDENTITY) < 1e-4);
}

#[test]
fn lip_sync_writes_into_morph_weights() {
    let mut app = app();
    let entity = spawn_presenter(&mut app);
    let face = app
        .world_mut()
        .spawn(MorphWeights::new(vec![0.8, 0.4], None).unwrap())
        .id();
    app.world_mut().entity_mut(entity).add_child(face);
    app.update();
    let rig = rig_of(&app, entity);

    app.world_mut().send_event(AvatarClicked { rig });
    app.update();
    let request = drain::<AvatarMediaRequested>(&app)[0].request;
    app.world_mut().send_event(AvatarMediaLoaded {
        rig,
        request,
        cues: CueTimeline::from_json(r#"{"mouthCues":[{"start":0,"end":5,"value":"AI"}]}"#),
        audio_seconds: Some(5.0),
    });
    for _ in 0..3 {
        app.update();
    }
    // no mesh asset means no target names: every weight only decays
    let weights = app.world().get::<MorphWeights>(face).unwrap().weights();
    assert!(weights[0] < 0.8 && weights[0] > 0.0);
    assert!(weights[1] < 0.4);
}

#[test]
fn despawn_tears_rig_down() {
    let mut app = app();
    let entity = spawn_presenter(&mut app);
    app.update();
    let rig = rig_of(&app, entity);

    app.world_mut().send_event(AvatarClicked { rig });
    app.update();
    app.world_mut().despawn(entity);
    app.update();

    let director = app.world().non_send_resource::<AvatarDirector>();
    assert!(!director.0.is_attached(rig));

    // Poses keep coming until the teardown fade is over, then the rig drops out.
    for _ in 0..10 {
        app.update();
    }
    assert!(app.world().resource::<LatestAvatarFrame>().0.rig(rig).is_none());
}
