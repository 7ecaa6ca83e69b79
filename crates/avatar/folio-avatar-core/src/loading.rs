//! Staged asset-loading progress for the site's loading screen.
//!
//! Real download progress is coarse (one step per model), so a random trickle
//! keeps the bar moving below a cap until every model has settled. The screen
//! then stays up until a minimum display time has passed, shows 100 %, and
//! reports loaded after a short settle delay.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::LoadingConfig;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProfile {
    Mobile,
    Desktop,
}

impl DeviceProfile {
    pub fn from_viewport_width(width: u32, cfg: &LoadingConfig) -> Self {
        if width <= cfg.mobile_max_width {
            DeviceProfile::Mobile
        } else {
            DeviceProfile::Desktop
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Pending,
    Loaded,
    Failed,
}

/// Badges shown under the progress bar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingStage {
    Models,
    Textures,
    Animations,
}

impl LoadingStage {
    pub const ALL: [LoadingStage; 3] = [
        LoadingStage::Models,
        LoadingStage::Textures,
        LoadingStage::Animations,
    ];

    /// Progress (percent) at which the badge lights up.
    pub fn threshold(self) -> f32 {
        match self {
            LoadingStage::Models => 33.0,
            LoadingStage::Textures => 66.0,
            LoadingStage::Animations => 100.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Phase {
    Fetching,
    /// All assets settled; waiting for the minimum display time.
    Holding { until_ms: f32 },
    /// Progress shown at 100 %; waiting for the settle delay.
    Settling { until_ms: f32 },
    Done,
}

/// Snapshot handed to the loading screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadingSnapshot {
    pub progress: f32,
    pub is_loaded: bool,
    pub is_mobile: bool,
    pub stages: Vec<(LoadingStage, bool)>,
}

#[derive(Debug)]
pub struct LoadingTracker {
    cfg: LoadingConfig,
    profile: DeviceProfile,
    assets: Vec<(String, AssetStatus)>,
    rng: StdRng,
    progress: f32,
    elapsed_ms: f32,
    trickle_ms: f32,
    phase: Phase,
}

impl LoadingTracker {
    /// Start tracking the asset list of `profile`. `seed` drives the trickle jitter.
    pub fn new(cfg: &LoadingConfig, profile: DeviceProfile, seed: u64) -> Self {
        let list = match profile {
            DeviceProfile::Mobile => &cfg.mobile_assets,
            DeviceProfile::Desktop => &cfg.desktop_assets,
        };
        let mut tracker = Self {
            cfg: cfg.clone(),
            profile,
            assets: list
                .iter()
                .map(|a| (a.clone(), AssetStatus::Pending))
                .collect(),
            rng: StdRng::seed_from_u64(seed),
            progress: 0.0,
            elapsed_ms: 0.0,
            trickle_ms: 0.0,
            phase: Phase::Fetching,
        };
        if tracker.assets.is_empty() {
            tracker.complete();
        }
        tracker
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn assets(&self) -> &[(String, AssetStatus)] {
        &self.assets
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn stage_reached(&self, stage: LoadingStage) -> bool {
        self.progress >= stage.threshold()
    }

    pub fn snapshot(&self) -> LoadingSnapshot {
        LoadingSnapshot {
            progress: self.progress,
            is_loaded: self.is_loaded(),
            is_mobile: self.profile == DeviceProfile::Mobile,
            stages: LoadingStage::ALL
                .iter()
                .map(|s| (*s, self.stage_reached(*s)))
                .collect(),
        }
    }

    fn min_load_ms(&self) -> f32 {
        match self.profile {
            DeviceProfile::Mobile => self.cfg.mobile_min_load_ms,
            DeviceProfile::Desktop => self.cfg.desktop_min_load_ms,
        }
    }

    fn raise(&mut self, to: f32) {
        self.progress = self.progress.max(to.min(100.0));
    }

    /// Record that the fetch of `path` finished. Failed fetches count as settled too.
    /// Returns `false` for unknown or already settled assets.
    pub fn asset_settled(&mut self, path: &str, ok: bool) -> bool {
        let Some(entry) = self
            .assets
            .iter_mut()
            .find(|(p, s)| p == path && *s == AssetStatus::Pending)
        else {
            return false;
        };
        entry.1 = if ok {
            AssetStatus::Loaded
        } else {
            log::warn!("asset {path} failed to load");
            AssetStatus::Failed
        };

        let settled = self
            .assets
            .iter()
            .filter(|(_, s)| *s != AssetStatus::Pending)
            .count();
        let total = self.assets.len();
        self.raise(settled as f32 / total as f32 * 100.0);
        if settled == total {
            self.complete();
        }
        true
    }

    fn complete(&mut self) {
        if self.phase == Phase::Fetching {
            self.phase = Phase::Holding {
                until_ms: self.elapsed_ms.max(self.min_load_ms()),
            };
        }
    }

    /// Advance wall-clock time by `dt_ms` milliseconds.
    pub fn advance(&mut self, dt_ms: f32) {
        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        let start = self.elapsed_ms;
        self.elapsed_ms += dt_ms;

        let interval = self.cfg.trickle_interval_ms;
        let max_step = self.cfg.trickle_max_step;
        // Unvalidated configs may carry a zero interval or an unbounded step.
        if self.phase == Phase::Fetching && interval.is_finite() && interval > 0.0 {
            self.trickle_ms += dt_ms;
            while self.trickle_ms >= interval {
                self.trickle_ms -= interval;
                let step = if max_step.is_finite() && max_step > 0.0 {
                    self.rng.gen_range(0.0..max_step)
                } else {
                    0.0
                };
                let capped = (self.progress + step).min(self.cfg.trickle_cap);
                self.raise(capped);
            }
        }

        if let Phase::Holding { until_ms } = self.phase {
            if self.elapsed_ms >= until_ms {
                self.progress = 100.0;
                self.phase = Phase::Settling {
                    until_ms: until_ms.max(start) + self.cfg.settle_delay_ms,
                };
            }
        }
        if let Phase::Settling { until_ms } = self.phase {
            if self.elapsed_ms >= until_ms {
                self.phase = Phase::Done;
                log::info!("loading complete after {:.0} ms", self.elapsed_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop(seed: u64) -> LoadingTracker {
        LoadingTracker::new(&LoadingConfig::default(), DeviceProfile::Desktop, seed)
    }

    #[test]
    fn profile_from_viewport() {
        let cfg = LoadingConfig::default();
        assert_eq!(DeviceProfile::from_viewport_width(768, &cfg), DeviceProfile::Mobile);
        assert_eq!(DeviceProfile::from_viewport_width(1280, &cfg), DeviceProfile::Desktop);
        let mobile = LoadingTracker::new(&cfg, DeviceProfile::Mobile, 1);
        assert_eq!(mobile.assets().len(), 1);
    }

    #[test]
    fn trickle_stays_under_cap() {
        let mut t = desktop(7);
        for _ in 0..200 {
            t.advance(300.0);
        }
        assert!(t.progress() > 0.0);
        assert!(t.progress() <= 90.0);
        assert!(!t.is_loaded());
    }

    #[test]
    fn completes_after_min_time_and_settle_delay() {
        let mut t = desktop(3);
        t.advance(100.0);
        assert!(t.asset_settled("/models/AvatarMainOP.glb", true));
        assert!(t.asset_settled("/models/Robo.glb", false));
        assert!(!t.asset_settled("/models/Robo.glb", true));
        assert!(t.asset_settled("/models/ContactOP.glb", true));
        // Every asset has answered, so the bar is full, but the screen stays up.
        assert_eq!(t.progress(), 100.0);
        assert!(!t.is_loaded());

        t.advance(3800.0); // 3900 ms
        assert!(!t.is_loaded());
        t.advance(100.0); // 4000 ms
        assert_eq!(t.progress(), 100.0);
        assert!(!t.is_loaded());
        t.advance(499.0);
        assert!(!t.is_loaded());
        t.advance(1.0);
        assert!(t.is_loaded());
        assert!(LoadingStage::ALL.iter().all(|s| t.stage_reached(*s)));
    }

    #[test]
    fn late_assets_skip_the_minimum_wait() {
        let mut t = LoadingTracker::new(&LoadingConfig::default(), DeviceProfile::Mobile, 9);
        t.advance(5000.0);
        t.asset_settled("/models/AvatarMainOP.glb", true);
        assert_eq!(t.progress(), 100.0);
        t.advance(0.0);
        assert!(!t.is_loaded());
        t.advance(500.0);
        assert!(t.is_loaded());
    }

    #[test]
    fn zero_trickle_interval_does_not_spin() {
        let cfg = LoadingConfig {
            trickle_interval_ms: 0.0,
            ..LoadingConfig::default()
        };
        assert!(cfg.validate().is_err());
        let mut t = LoadingTracker::new(&cfg, DeviceProfile::Desktop, 1);
        t.advance(16.0);
        t.advance(16.0);
        assert_eq!(t.progress(), 0.0);
        assert!(!t.is_loaded());
    }

    #[test]
    fn unbounded_trickle_step_is_ignored() {
        let cfg = LoadingConfig {
            trickle_max_step: f32::INFINITY,
            ..LoadingConfig::default()
        };
        assert!(cfg.validate().is_err());
        let mut t = LoadingTracker::new(&cfg, DeviceProfile::Desktop, 1);
        t.advance(300.0);
        t.advance(300.0);
        assert_eq!(t.progress(), 0.0);
    }

    #[test]
    fn progress_never_goes_backwards() {
        let mut t = desktop(11);
        let mut last = 0.0;
        for step in 0..40 {
            t.advance(150.0);
            if step == 10 {
                t.asset_settled("/models/Robo.glb", true);
            }
            if step == 20 {
                t.asset_settled("/models/ContactOP.glb", true);
            }
            if step == 30 {
                t.asset_settled("/models/AvatarMainOP.glb", true);
            }
            assert!(t.progress() >= last);
            last = t.progress();
        }
    }
}
