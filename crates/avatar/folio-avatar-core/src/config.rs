//! Runtime configuration for folio-avatar-core.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration shared by every rig of a [`crate::Director`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub blend: BlendTimings,
    pub viseme: VisemeConfig,
    pub phonemes: PhonemeMap,
    /// Yaw (radians) the rig turns to while presenting a voice line.
    pub presenting_yaw: f32,
    pub loading: LoadingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blend: BlendTimings::default(),
            viseme: VisemeConfig::default(),
            phonemes: PhonemeMap::default(),
            presenting_yaw: 0.5,
            loading: LoadingConfig::default(),
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.blend.validate()?;
        self.viseme.validate()?;
        self.loading.validate()?;
        if !self.presenting_yaw.is_finite() {
            return Err(ConfigError::Invalid {
                field: "presenting_yaw",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }
}

/// Fade durations (seconds) used by the playback sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendTimings {
    pub idle_fade_in: f32,
    pub idle_fade_out: f32,
    pub gesture_fade_in: f32,
    pub gesture_stop: f32,
    pub idle_restore: f32,
    pub teardown_stop: f32,
}

impl Default for BlendTimings {
    fn default() -> Self {
        Self {
            idle_fade_in: 0.5,
            idle_fade_out: 0.25,
            gesture_fade_in: 0.15,
            gesture_stop: 0.2,
            idle_restore: 0.25,
            teardown_stop: 0.1,
        }
    }
}

impl BlendTimings {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("blend.idle_fade_in", self.idle_fade_in),
            ("blend.idle_fade_out", self.idle_fade_out),
            ("blend.gesture_fade_in", self.gesture_fade_in),
            ("blend.gesture_stop", self.gesture_stop),
            ("blend.idle_restore", self.idle_restore),
            ("blend.teardown_stop", self.teardown_stop),
        ];
        for (field, v) in fields {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("fade must be a non-negative number, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Per-frame smoothing factors for mouth shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VisemeConfig {
    /// Lerp factor toward 0 applied to every morph target each frame.
    pub decay_factor: f32,
    /// Lerp factor toward `attack_target` for the viseme of the active cue.
    pub attack_factor: f32,
    pub attack_target: f32,
}

impl Default for VisemeConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.1,
            attack_factor: 0.4,
            attack_target: 1.0,
        }
    }
}

impl VisemeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, v) in [
            ("viseme.decay_factor", self.decay_factor),
            ("viseme.attack_factor", self.attack_factor),
            ("viseme.attack_target", self.attack_target),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a value in [0, 1], got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Phoneme symbol → morph target name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhonemeMap(HashMap<String, String>);

impl Default for PhonemeMap {
    fn default() -> Self {
        let table = [
            ("AI", "viseme_aa"),
            ("E", "viseme_E"),
            ("O", "viseme_O"),
            ("U", "viseme_U"),
            ("B", "viseme_PP"),
            ("C", "viseme_CH"),
            ("F", "viseme_FF"),
            ("L", "viseme_RR"),
            ("WQ", "viseme_U"),
            ("rest", "viseme_sil"),
        ];
        Self(
            table
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl PhonemeMap {
    #[inline]
    pub fn viseme_for(&self, symbol: &str) -> Option<&str> {
        self.0.get(symbol).map(String::as_str)
    }

    pub fn insert(&mut self, symbol: impl Into<String>, target: impl Into<String>) {
        self.0.insert(symbol.into(), target.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Asset-loading progress simulation parameters (milliseconds, percent).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub mobile_max_width: u32,
    pub mobile_assets: Vec<String>,
    pub desktop_assets: Vec<String>,
    pub trickle_interval_ms: f32,
    pub trickle_max_step: f32,
    pub trickle_cap: f32,
    pub mobile_min_load_ms: f32,
    pub desktop_min_load_ms: f32,
    pub settle_delay_ms: f32,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            mobile_max_width: 768,
            mobile_assets: vec!["/models/AvatarMainOP.glb".into()],
            desktop_assets: vec![
                "/models/AvatarMainOP.glb".into(),
                "/models/Robo.glb".into(),
                "/models/ContactOP.glb".into(),
            ],
            trickle_interval_ms: 300.0,
            trickle_max_step: 15.0,
            trickle_cap: 90.0,
            mobile_min_load_ms: 3000.0,
            desktop_min_load_ms: 4000.0,
            settle_delay_ms: 500.0,
        }
    }
}

impl LoadingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.trickle_interval_ms.is_finite() || self.trickle_interval_ms <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "loading.trickle_interval_ms",
                reason: format!("must be positive, got {}", self.trickle_interval_ms),
            });
        }
        if !(0.0..=100.0).contains(&self.trickle_cap) {
            return Err(ConfigError::Invalid {
                field: "loading.trickle_cap",
                reason: format!("expected a percentage, got {}", self.trickle_cap),
            });
        }
        for (field, value) in [
            ("loading.trickle_max_step", self.trickle_max_step),
            ("loading.mobile_min_load_ms", self.mobile_min_load_ms),
            ("loading.desktop_min_load_ms", self.desktop_min_load_ms),
            ("loading.settle_delay_ms", self.settle_delay_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be finite and >= 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}
