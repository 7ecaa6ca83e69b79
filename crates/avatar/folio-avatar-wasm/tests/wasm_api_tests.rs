#![cfg(target_arch = "wasm32")]
use folio_avatar_wasm::{abi_version, FolioAvatar, FolioLoading};
use js_sys::{Array, Float32Array, Function, Object, Reflect};
use serde_json::json;
use serde_wasm_bindgen as swb;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn clips() -> JsValue {
    swb::to_value(&json!([
        { "name": "Wave", "duration": 1.0 },
        { "name": "Looking", "duration": 3.0 }
    ]))
    .unwrap()
}

fn cues() -> JsValue {
    swb::to_value(&json!({
        "mouthCues": [
            { "start": 0.0, "end": 1.0, "value": "AI" },
            { "start": 1.0, "end": 2.0, "value": "rest" }
        ]
    }))
    .unwrap()
}

fn mesh() -> (JsValue, Float32Array) {
    let dict = Object::new();
    Reflect::set(&dict, &"viseme_sil".into(), &JsValue::from(0)).unwrap();
    Reflect::set(&dict, &"viseme_aa".into(), &JsValue::from(1)).unwrap();
    let influences = Float32Array::new_with_length(2);
    let mesh = Object::new();
    Reflect::set(&mesh, &"morphTargetDictionary".into(), &dict).unwrap();
    Reflect::set(&mesh, &"morphTargetInfluences".into(), &influences).unwrap();
    (mesh.into(), influences)
}

fn state_of(out: &JsValue, rig: u32) -> String {
    let out: serde_json::Value = swb::from_value(out.clone()).unwrap();
    out["rigs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["rig"].as_f64() == Some(rig as f64))
        .map(|r| r["state"].as_str().unwrap().to_string())
        .unwrap()
}

#[wasm_bindgen_test]
fn abi_is_1() {
    assert_eq!(abi_version(), 1);
}

#[wasm_bindgen_test]
fn construct_with_defaults_and_reject_bad_config() {
    assert!(FolioAvatar::new(JsValue::UNDEFINED).is_ok());
    let bad = swb::to_value(&json!({ "viseme": { "decay_factor": 3.0 } })).unwrap();
    assert!(FolioAvatar::new(bad).is_err());
}

#[wasm_bindgen_test]
fn session_drives_js_mesh_and_returns_to_idle() {
    let mut avatar = FolioAvatar::new(JsValue::NULL).unwrap();
    let rig = avatar.attach("presenter".into(), clips()).unwrap();
    assert!(avatar.is_trigger_enabled(rig));

    let req = avatar.trigger(rig).unwrap();
    assert_eq!(avatar.trigger(rig), None);

    // audio element stand-in: plain object with currentTime and no-op methods
    let audio = Object::new();
    let noop = Function::new_no_args("");
    Reflect::set(&audio, &"play".into(), &noop).unwrap();
    Reflect::set(&audio, &"pause".into(), &noop).unwrap();
    Reflect::set(&audio, &"currentTime".into(), &JsValue::from_f64(0.5)).unwrap();
    let listener = avatar.media_ready(rig, req, cues(), audio.clone().into()).unwrap();

    let (mesh, influences) = mesh();
    let meshes = Array::of1(&mesh);
    let resolver = Function::new_with_args("rig", "return this.meshes;")
        .bind(&{
            let ctx = Object::new();
            Reflect::set(&ctx, &"meshes".into(), &meshes).unwrap();
            ctx.into()
        });
    // rewind() reset the element to 0; move it into the "AI" cue
    Reflect::set(&audio, &"currentTime".into(), &JsValue::from_f64(0.5)).unwrap();

    let out = avatar.frame(0.016, Some(resolver)).unwrap();
    assert_eq!(state_of(&out, rig), "LipSyncing");
    assert!(influences.get_index(1) > 0.3);

    assert!(avatar.audio_ended(rig, listener));
    let mut last = JsValue::UNDEFINED;
    for _ in 0..30 {
        last = avatar.frame(0.016, None).unwrap();
    }
    assert_eq!(state_of(&last, rig), "Idle");
    assert!(avatar.is_trigger_enabled(rig));
}

#[wasm_bindgen_test]
fn detach_stops_frames() {
    let mut avatar = FolioAvatar::new(JsValue::NULL).unwrap();
    let rig = avatar.attach("scenery".into(), clips()).unwrap();
    assert_eq!(avatar.trigger(rig), None);
    assert!(avatar.detach(rig));
    assert!(!avatar.detach(rig));
    // One last frame carries the idle clip faded to zero.
    let out: serde_json::Value = swb::from_value(avatar.frame(0.2, None).unwrap()).unwrap();
    let rigs = out["rigs"].as_array().unwrap();
    assert_eq!(rigs.len(), 1);
    assert!(rigs[0]["poses"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["weight"].as_f64() == Some(0.0)));
    let out: serde_json::Value = swb::from_value(avatar.frame(0.016, None).unwrap()).unwrap();
    assert!(out["rigs"].as_array().unwrap().is_empty());
}

#[wasm_bindgen_test]
fn loading_tracker_from_viewport() {
    let mut loading = FolioLoading::new(375, 42, JsValue::UNDEFINED).unwrap();
    assert_eq!(loading.assets(), vec!["/models/AvatarMainOP.glb".to_string()]);
    assert!(loading.asset_settled("/models/AvatarMainOP.glb", true));
    loading.advance(3000.0);
    assert_eq!(loading.progress(), 100.0);
    loading.advance(500.0);
    assert!(loading.is_loaded());

    let desktop = FolioLoading::new(1440, 42, JsValue::NULL).unwrap();
    assert_eq!(desktop.assets().len(), 3);
}

#[wasm_bindgen_test]
fn loading_rejects_bad_config() {
    let spin = swb::to_value(&json!({ "trickle_interval_ms": 0.0 })).unwrap();
    assert!(FolioLoading::new(1440, 1, spin).is_err());
    let wait = swb::to_value(&json!({ "settle_delay_ms": -1.0 })).unwrap();
    assert!(FolioLoading::new(1440, 1, wait).is_err());
}
