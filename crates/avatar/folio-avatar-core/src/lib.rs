//! Folio Avatar Core (engine-agnostic)
//!
//! Clip cross-fading, viseme lip-sync and the click-to-speak playback sequence
//! for the portfolio site's avatars. Hosts feed frame deltas, pointer/media/audio
//! signals and morph-target meshes in; poses, yaw and events come out.

pub mod audio;
pub mod blender;
pub mod config;
pub mod director;
pub mod error;
pub mod ids;
pub mod loading;
pub mod outputs;
pub mod sequencer;
pub mod timeline;
pub mod viseme;

// Re-exports for consumers (adapters)
pub use audio::{AudioPlayback, ClockAudio, MediaBundle};
pub use blender::{ActionBlender, ClipSpec, LoopMode};
pub use config::{BlendTimings, Config, LoadingConfig, PhonemeMap, VisemeConfig};
pub use director::{Director, MorphTargetResolver, NoMeshes};
pub use error::{ConfigError, CueError};
pub use ids::{ClipHandle, ListenerId, RequestId, RigId};
pub use loading::{AssetStatus, DeviceProfile, LoadingSnapshot, LoadingStage, LoadingTracker};
pub use outputs::{BlendEvent, BlendOutputs, ClipPose, FrameOutputs, RigEvent, RigFrame, VoiceAssets};
pub use sequencer::{ClipSelector, PlaybackSequencer, PlaybackState, RigConfig};
pub use timeline::{CueSource, CueTimeline, FileCueSource, MouthCue};
pub use viseme::{MorphTargetMesh, MorphTargets, VisemeDriver, VisemeFrame};
