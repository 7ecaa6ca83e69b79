//! ActionBlender: cross-fades between named clips on a shared clock.
//!
//! The blender owns only bookkeeping (clip clocks, weight ramps and the
//! "active" pointer). Clip data stays with the host's scene-graph engine; each
//! frame the host applies the emitted [`ClipPose`]s to its own mixer.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ids::ClipHandle;
use crate::outputs::{BlendEvent, BlendOutputs, ClipPose};

/// How a clip's clock behaves when it reaches the clip's end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    /// Wrap back to zero indefinitely.
    Repeat,
    /// Play to the end once, then stop contributing.
    Once,
}

/// Name and length (seconds) of a clip found in a loaded asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub name: String,
    pub duration: f32,
}

impl ClipSpec {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Fade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

#[derive(Debug)]
struct ClipAction {
    name: String,
    duration: f32,
    time: f32,
    weight: f32,
    loop_mode: LoopMode,
    running: bool,
    fade: Option<Fade>,
}

impl ClipAction {
    fn fading_out(&self) -> bool {
        matches!(self.fade, Some(f) if f.to == 0.0)
    }
}

/// Per-rig blend state: at most one active clip, any number fading out.
#[derive(Debug, Default)]
pub struct ActionBlender {
    actions: Vec<ClipAction>,
    by_name: HashMap<String, ClipHandle>,
    active: Option<ClipHandle>,
    outputs: BlendOutputs,
}

impl ActionBlender {
    /// Build a blender over the clip set of a loaded asset. Handles follow load order;
    /// for duplicated names the first clip wins the name lookup.
    pub fn new(clips: impl IntoIterator<Item = ClipSpec>) -> Self {
        let mut blender = Self::default();
        for spec in clips {
            let handle = ClipHandle(blender.actions.len() as u32);
            blender.by_name.entry(spec.name.clone()).or_insert(handle);
            blender.actions.push(ClipAction {
                name: spec.name,
                duration: if spec.duration.is_finite() {
                    spec.duration.max(0.0)
                } else {
                    0.0
                },
                time: 0.0,
                weight: 0.0,
                loop_mode: LoopMode::Repeat,
                running: false,
                fade: None,
            });
        }
        blender
    }

    pub fn handle(&self, name: &str) -> Option<ClipHandle> {
        self.by_name.get(name).copied()
    }

    pub fn handle_at(&self, index: usize) -> Option<ClipHandle> {
        (index < self.actions.len()).then(|| ClipHandle(index as u32))
    }

    pub fn name(&self, handle: ClipHandle) -> Option<&str> {
        self.action(handle).map(|a| a.name.as_str())
    }

    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The clip most recently started with `play` and not stopped since.
    pub fn active(&self) -> Option<ClipHandle> {
        self.active
    }

    /// Current effective weight; 0 for clips that are not running.
    pub fn weight(&self, handle: ClipHandle) -> f32 {
        match self.action(handle) {
            Some(a) if a.running => a.weight,
            _ => 0.0,
        }
    }

    pub fn time(&self, handle: ClipHandle) -> Option<f32> {
        self.action(handle).map(|a| a.time)
    }

    pub fn is_running(&self, handle: ClipHandle) -> bool {
        self.action(handle).is_some_and(|a| a.running)
    }

    /// True while any clip still has an unfinished weight ramp.
    pub fn is_fading(&self) -> bool {
        self.actions.iter().any(|a| a.running && a.fade.is_some())
    }

    /// Fade `name` in from zero and cross-fade the previously active clip out over the
    /// same duration. Returns `None` (and changes nothing) when the clip does not exist.
    pub fn play(&mut self, name: &str, fade_seconds: f32, mode: LoopMode) -> Option<ClipHandle> {
        let Some(handle) = self.handle(name) else {
            log::warn!("clip '{name}' not found; animation unavailable");
            return None;
        };
        self.play_handle(handle, fade_seconds, mode)
    }

    /// Same as [`play`](Self::play) for an already resolved handle.
    pub fn play_handle(
        &mut self,
        handle: ClipHandle,
        fade_seconds: f32,
        mode: LoopMode,
    ) -> Option<ClipHandle> {
        let fade = sanitize_fade(fade_seconds);
        let action = self.action_mut(handle)?;
        action.time = 0.0;
        action.loop_mode = mode;
        action.running = true;
        if fade > 0.0 {
            action.weight = 0.0;
            action.fade = Some(Fade {
                from: 0.0,
                to: 1.0,
                duration: fade,
                elapsed: 0.0,
            });
        } else {
            action.weight = 1.0;
            action.fade = None;
        }

        if let Some(prev) = self.active {
            if prev != handle {
                self.fade_out(prev, fade);
            }
        }
        self.active = Some(handle);
        Some(handle)
    }

    /// Ramp `handle` to zero. Clears the active pointer only if `handle` is the active clip.
    /// Stopping a clip that is already stopped or already fading out changes nothing.
    pub fn stop(&mut self, handle: ClipHandle, fade_seconds: f32) {
        self.fade_out(handle, sanitize_fade(fade_seconds));
        if self.active == Some(handle) {
            self.active = None;
        }
    }

    /// Stop every running clip (teardown).
    pub fn stop_all(&mut self, fade_seconds: f32) {
        let fade = sanitize_fade(fade_seconds);
        for idx in 0..self.actions.len() {
            self.fade_out(ClipHandle(idx as u32), fade);
        }
        self.active = None;
    }

    fn fade_out(&mut self, handle: ClipHandle, fade: f32) {
        let Some(action) = self.action_mut(handle) else {
            return;
        };
        if !action.running || action.fading_out() {
            return;
        }
        if fade > 0.0 {
            action.fade = Some(Fade {
                from: action.weight,
                to: 0.0,
                duration: fade,
                elapsed: 0.0,
            });
        } else {
            action.weight = 0.0;
            action.fade = None;
            action.running = false;
        }
    }

    /// Advance clip clocks and weight ramps by `dt` seconds.
    ///
    /// Every clip that was running at the start of the step gets a pose, including
    /// clips that reach zero weight during it, so hosts always see the final weight.
    pub fn advance(&mut self, dt: f32) -> &BlendOutputs {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.outputs.clear();

        for (idx, action) in self.actions.iter_mut().enumerate() {
            if !action.running {
                continue;
            }
            let clip = ClipHandle(idx as u32);

            action.time += dt;
            match action.loop_mode {
                LoopMode::Repeat => {
                    action.time = if action.duration > 0.0 {
                        action.time.rem_euclid(action.duration)
                    } else {
                        0.0
                    };
                }
                LoopMode::Once => {
                    if action.time >= action.duration {
                        action.time = action.duration;
                        action.weight = 0.0;
                        action.fade = None;
                        action.running = false;
                        self.outputs.events.push(BlendEvent::Finished { clip });
                    }
                }
            }

            if let Some(mut fade) = action.fade {
                fade.elapsed += dt;
                let u = (fade.elapsed / fade.duration).min(1.0);
                action.weight = fade.from + (fade.to - fade.from) * u;
                if u >= 1.0 {
                    action.weight = fade.to;
                    action.fade = None;
                    if fade.to == 0.0 {
                        action.running = false;
                    }
                    self.outputs.events.push(BlendEvent::FadeCompleted {
                        clip,
                        weight: fade.to,
                    });
                } else {
                    action.fade = Some(fade);
                }
            }

            self.outputs.poses.push(ClipPose {
                clip,
                name: action.name.clone(),
                time: action.time,
                weight: action.weight,
            });
        }

        &self.outputs
    }

    fn action(&self, handle: ClipHandle) -> Option<&ClipAction> {
        self.actions.get(handle.0 as usize)
    }

    fn action_mut(&mut self, handle: ClipHandle) -> Option<&mut ClipAction> {
        self.actions.get_mut(handle.0 as usize)
    }
}

fn sanitize_fade(fade: f32) -> f32 {
    if fade.is_finite() {
        fade.max(0.0)
    } else {
        0.0
    }
}
