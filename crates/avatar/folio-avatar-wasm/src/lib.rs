use js_sys::{Array, Function, Reflect, JSON};
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use folio_avatar_core::{
    AudioPlayback, ClipSpec, Config, CueError, CueTimeline, DeviceProfile, Director, ListenerId,
    LoadingConfig, LoadingTracker, MediaBundle, MorphTargetMesh, MorphTargetResolver, RequestId,
    RigConfig, RigId,
};

#[wasm_bindgen]
pub struct FolioAvatar {
    core: Director,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

/// An `HTMLAudioElement`-like object: `play()`, `pause()`, `currentTime`, `ended`.
struct JsAudio {
    el: JsValue,
}

impl JsAudio {
    fn call(&self, method: &str) {
        if let Some(f) = get(&self.el, method).dyn_ref::<Function>() {
            // play() returns a promise; autoplay rejections surface on the JS side
            let _ = f.call0(&self.el);
        }
    }
}

impl AudioPlayback for JsAudio {
    fn rewind(&mut self) {
        let _ = Reflect::set(
            &self.el,
            &JsValue::from_str("currentTime"),
            &JsValue::from_f64(0.0),
        );
    }

    fn play(&mut self) {
        self.call("play");
    }

    fn pause(&mut self) {
        self.call("pause");
    }

    fn current_time(&self) -> f32 {
        get(&self.el, "currentTime").as_f64().unwrap_or(0.0) as f32
    }

    fn has_ended(&self) -> bool {
        get(&self.el, "ended").as_bool().unwrap_or(false)
    }
}

/// A three.js-style mesh: `morphTargetDictionary` (name -> index) and
/// `morphTargetInfluences` (array or Float32Array). Influences are copied in,
/// edited, and written back.
struct JsMesh {
    dict: JsValue,
    influences: JsValue,
    buf: Vec<f32>,
}

impl JsMesh {
    fn read(mesh: &JsValue) -> Option<Self> {
        let dict = get(mesh, "morphTargetDictionary");
        let influences = get(mesh, "morphTargetInfluences");
        if jsvalue_is_undefined_or_null(&dict) || jsvalue_is_undefined_or_null(&influences) {
            return None;
        }
        let len = get(&influences, "length").as_f64().unwrap_or(0.0) as u32;
        let buf = (0..len)
            .map(|i| {
                Reflect::get(&influences, &JsValue::from(i))
                    .ok()
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0) as f32
            })
            .collect();
        Some(JsMesh {
            dict,
            influences,
            buf,
        })
    }

    fn write_back(&self) {
        for (i, w) in self.buf.iter().enumerate() {
            let _ = Reflect::set(
                &self.influences,
                &JsValue::from(i as u32),
                &JsValue::from_f64(*w as f64),
            );
        }
    }
}

impl MorphTargetMesh for JsMesh {
    fn morph_target_index(&self, name: &str) -> Option<usize> {
        get(&self.dict, name).as_f64().map(|n| n as usize)
    }

    fn morph_influences_mut(&mut self) -> &mut [f32] {
        &mut self.buf
    }
}

/// Calls `resolver(rigId) -> mesh[] | null` to find the morph-target meshes of a rig.
struct JsResolver {
    f: Option<Function>,
}

impl MorphTargetResolver for JsResolver {
    fn visit_meshes(&mut self, rig: RigId, visit: &mut dyn FnMut(&mut dyn MorphTargetMesh)) {
        let Some(f) = &self.f else {
            return;
        };
        let Ok(val) = f.call1(&JsValue::UNDEFINED, &JsValue::from(rig.0)) else {
            return;
        };
        if !Array::is_array(&val) {
            return;
        }
        for mesh in Array::from(&val).iter() {
            if let Some(mut m) = JsMesh::read(&mesh) {
                visit(&mut m);
                m.write_back();
            }
        }
    }
}

fn cues_from_js(cues: JsValue) -> Result<CueTimeline, CueError> {
    if jsvalue_is_undefined_or_null(&cues) {
        return Err(CueError::unavailable("<js>", "no cue document"));
    }
    if let Some(s) = cues.as_string() {
        return CueTimeline::from_json(&s);
    }
    let s = JSON::stringify(&cues)
        .map_err(|e| CueError::malformed("<js>", format!("stringify error: {e:?}")))?
        .as_string()
        .ok_or_else(|| CueError::malformed("<js>", "stringify produced non-string"))?;
    CueTimeline::from_json(&s)
}

#[wasm_bindgen]
impl FolioAvatar {
    /// Create a director. Pass a config object or undefined/null for defaults.
    /// Example:
    ///   new FolioAvatar({ presenting_yaw: 0.4 })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<FolioAvatar, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        cfg.validate()
            .map_err(|e| JsError::new(&format!("config error: {e}")))?;

        Ok(FolioAvatar {
            core: Director::new(cfg),
        })
    }

    /// Attach a loaded rig. `rig_cfg` is a RigConfig object, or a string naming a
    /// preset ("presenter" | "scenery"); `clips` is `[{ name, duration }]` in asset order.
    /// Returns the RigId (u32).
    #[wasm_bindgen]
    pub fn attach(&mut self, rig_cfg: JsValue, clips: JsValue) -> Result<u32, JsError> {
        let cfg: RigConfig = match rig_cfg.as_string().as_deref() {
            Some("presenter") => RigConfig::presenter("presenter"),
            Some("scenery") => RigConfig::scenery("scenery"),
            Some(other) => return Err(JsError::new(&format!("unknown rig preset '{other}'"))),
            None => swb::from_value(rig_cfg)
                .map_err(|e| JsError::new(&format!("rig config error: {e}")))?,
        };
        let clips: Vec<ClipSpec> = if jsvalue_is_undefined_or_null(&clips) {
            Vec::new()
        } else {
            swb::from_value(clips).map_err(|e| JsError::new(&format!("clips error: {e}")))?
        };
        Ok(self.core.attach(&cfg, clips).0)
    }

    /// Tear a rig down (component unmount). Returns false for unknown rigs.
    #[wasm_bindgen]
    pub fn detach(&mut self, rig: u32) -> bool {
        self.core.detach(RigId(rig))
    }

    /// Pointer interaction on the rig. Returns the media request id to answer with
    /// `media_ready`, or undefined when the click is ignored.
    #[wasm_bindgen]
    pub fn trigger(&mut self, rig: u32) -> Option<u32> {
        self.core.trigger(RigId(rig)).map(|r| r.0)
    }

    #[wasm_bindgen(js_name = is_trigger_enabled)]
    pub fn is_trigger_enabled(&self, rig: u32) -> bool {
        self.core
            .rig(RigId(rig))
            .is_some_and(|s| s.is_trigger_enabled())
    }

    /// Hand over the fetched voice media. `cues` is the cue document (object or JSON
    /// string; null when the fetch failed), `audio` an audio element (null when
    /// unavailable). Returns the listener id to pass to `audio_ended`.
    #[wasm_bindgen(js_name = media_ready)]
    pub fn media_ready(
        &mut self,
        rig: u32,
        request: u32,
        cues: JsValue,
        audio: JsValue,
    ) -> Option<u32> {
        let cues = cues_from_js(cues);
        let media = if jsvalue_is_undefined_or_null(&audio) {
            MediaBundle::without_audio(cues)
        } else {
            MediaBundle::new(JsAudio { el: audio }, cues)
        };
        self.core
            .media_ready(RigId(rig), RequestId(request), media)
            .map(|l| l.0)
    }

    /// Forward the audio element's "ended" event.
    #[wasm_bindgen(js_name = audio_ended)]
    pub fn audio_ended(&mut self, rig: u32, listener: u32) -> bool {
        self.core.audio_ended(RigId(rig), ListenerId(listener))
    }

    /// Frame-loop callback. `resolver(rigId)` returns the rig's morph-target meshes
    /// (may be undefined when no rig lip-syncs). Returns FrameOutputs JSON.
    #[wasm_bindgen]
    pub fn frame(&mut self, dt: f32, resolver: Option<Function>) -> Result<JsValue, JsError> {
        let mut js_resolver = JsResolver { f: resolver };
        let out = self.core.frame(dt, &mut js_resolver);
        swb::to_value(out).map_err(|e| JsError::new(&format!("outputs error: {e}")))
    }
}

/// Loading-screen progress for the page's model downloads.
#[wasm_bindgen]
pub struct FolioLoading {
    core: LoadingTracker,
}

#[wasm_bindgen]
impl FolioLoading {
    /// `config` is a LoadingConfig object or undefined/null; `seed` drives the trickle jitter.
    #[wasm_bindgen(constructor)]
    pub fn new(viewport_width: u32, seed: u32, config: JsValue) -> Result<FolioLoading, JsError> {
        console_error_panic_hook::set_once();
        let cfg: LoadingConfig = if jsvalue_is_undefined_or_null(&config) {
            LoadingConfig::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        cfg.validate()
            .map_err(|e| JsError::new(&format!("config error: {e}")))?;
        let profile = DeviceProfile::from_viewport_width(viewport_width, &cfg);
        Ok(FolioLoading {
            core: LoadingTracker::new(&cfg, profile, seed as u64),
        })
    }

    /// Asset paths the page must fetch.
    #[wasm_bindgen]
    pub fn assets(&self) -> Vec<String> {
        self.core.assets().iter().map(|(p, _)| p.clone()).collect()
    }

    #[wasm_bindgen(js_name = asset_settled)]
    pub fn asset_settled(&mut self, path: &str, ok: bool) -> bool {
        self.core.asset_settled(path, ok)
    }

    #[wasm_bindgen]
    pub fn advance(&mut self, dt_ms: f32) {
        self.core.advance(dt_ms);
    }

    #[wasm_bindgen]
    pub fn progress(&self) -> f32 {
        self.core.progress()
    }

    #[wasm_bindgen(js_name = is_loaded)]
    pub fn is_loaded(&self) -> bool {
        self.core.is_loaded()
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<JsValue, JsError> {
        swb::to_value(&self.core.snapshot())
            .map_err(|e| JsError::new(&format!("snapshot error: {e}")))
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
