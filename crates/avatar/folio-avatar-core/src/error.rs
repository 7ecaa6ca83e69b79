//! Error types for the avatar core.
//!
//! None of these are fatal to the host page: callers log them and fall back to
//! an idle-looking rig.

/// Failure to obtain a mouth-cue timeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CueError {
    /// The cue document could not be fetched (missing file, HTTP error, ...).
    #[error("cue data unavailable at {source_name}: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// The cue document was fetched but does not have the expected shape.
    #[error("malformed cue data from {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}

impl CueError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CueError::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CueError::Malformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Every cue failure counts as "data unavailable": playback continues without lip movement.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, CueError::Unavailable { .. } | CueError::Malformed { .. })
    }
}

/// Invalid runtime configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
