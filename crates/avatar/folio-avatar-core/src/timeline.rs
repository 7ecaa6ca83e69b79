//! Mouth-cue timeline: time-ranged phoneme events loaded once per session.
//!
//! Source documents follow the Rhubarb lip-sync export shape:
//!
//! ```json
//! { "metadata": { "duration": 2.1 }, "mouthCues": [ { "start": 0.0, "end": 0.12, "value": "rest" } ] }
//! ```
//!
//! Only `mouthCues` is read; a document without it is an empty timeline.

use serde::{Deserialize, Serialize};

use crate::error::CueError;

/// One phoneme held over `[start, end]` seconds of audio time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f32,
    pub end: f32,
    pub value: String,
}

impl MouthCue {
    pub fn new(start: f32, end: f32, value: impl Into<String>) -> Self {
        Self {
            start,
            end,
            value: value.into(),
        }
    }

    #[inline]
    pub fn covers(&self, t: f32) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Where a cue document comes from. Hosts implement this over their fetch layer;
/// `&str` and [`FileCueSource`] cover in-memory and on-disk documents.
pub trait CueSource {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<String, CueError>;
}

impl CueSource for str {
    fn name(&self) -> &str {
        "<inline>"
    }

    fn fetch(&self) -> Result<String, CueError> {
        Ok(self.to_string())
    }
}

/// Cue document on the local filesystem.
#[derive(Clone, Debug)]
pub struct FileCueSource {
    path: std::path::PathBuf,
    name: String,
}

impl FileCueSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl CueSource for FileCueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<String, CueError> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| CueError::unavailable(&self.name, e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CueDocument {
    #[serde(default, rename = "mouthCues")]
    mouth_cues: Vec<MouthCue>,
}

/// Immutable, ordered sequence of mouth cues.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CueTimeline {
    cues: Vec<MouthCue>,
    /// Cues are sorted and non-overlapping (touching ends allowed).
    ordered: bool,
}

impl CueTimeline {
    pub fn new(cues: Vec<MouthCue>) -> Self {
        for (i, c) in cues.iter().enumerate() {
            if c.start > c.end {
                log::warn!(
                    "mouth cue {i} '{}' has start {} after end {}; it will never match",
                    c.value,
                    c.start,
                    c.end
                );
            }
        }
        let ordered = cues.iter().all(|c| c.start <= c.end)
            && cues.windows(2).all(|w| w[0].end <= w[1].start);
        if !ordered && !cues.is_empty() {
            log::debug!("mouth cues are unsorted or overlapping; first match wins");
        }
        Self { cues, ordered }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a cue document.
    pub fn from_json(s: &str) -> Result<Self, CueError> {
        Self::parse(s, "<inline>")
    }

    /// Fetch and parse a cue document from `source`.
    pub fn load<S: CueSource + ?Sized>(source: &S) -> Result<Self, CueError> {
        let text = source.fetch()?;
        Self::parse(&text, source.name())
    }

    fn parse(s: &str, source_name: &str) -> Result<Self, CueError> {
        let doc: CueDocument =
            serde_json::from_str(s).map_err(|e| CueError::malformed(source_name, e.to_string()))?;
        Ok(Self::new(doc.mouth_cues))
    }

    pub fn cues(&self) -> &[MouthCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// End of the last cue, or 0 for an empty timeline.
    pub fn duration(&self) -> f32 {
        self.cues.iter().map(|c| c.end).fold(0.0, f32::max)
    }

    /// First cue with `start <= t <= end`, `None` when `t` falls in a gap.
    ///
    /// Ordered timelines use a binary search that yields the same cue the linear
    /// scan would; anything else is scanned front to back so the earliest listed
    /// cue wins on overlap.
    pub fn find_active_cue(&self, t: f32) -> Option<&MouthCue> {
        if self.ordered {
            let idx = self.cues.partition_point(|c| c.end < t);
            self.cues.get(idx).filter(|c| c.covers(t))
        } else {
            self.cues.iter().find(|c| c.covers(t))
        }
    }
}

impl From<Vec<MouthCue>> for CueTimeline {
    fn from(cues: Vec<MouthCue>) -> Self {
        Self::new(cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cues() -> CueTimeline {
        CueTimeline::new(vec![MouthCue::new(0.0, 1.0, "AI"), MouthCue::new(1.0, 2.0, "rest")])
    }

    #[test]
    fn samples_synthetic_timeline() {
        let tl = two_cues();
        assert!(tl.is_ordered());
        assert_eq!(tl.find_active_cue(0.5).map(|c| c.value.as_str()), Some("AI"));
        assert_eq!(tl.find_active_cue(1.5).map(|c| c.value.as_str()), Some("rest"));
        assert_eq!(tl.find_active_cue(3.0), None);
    }

    #[test]
    fn shared_boundary_goes_to_earlier_cue() {
        let tl = two_cues();
        assert_eq!(tl.find_active_cue(1.0).map(|c| c.value.as_str()), Some("AI"));
        assert_eq!(tl.find_active_cue(2.0).map(|c| c.value.as_str()), Some("rest"));
    }

    #[test]
    fn gaps_and_before_start_are_none() {
        let tl = CueTimeline::new(vec![MouthCue::new(0.5, 1.0, "E"), MouthCue::new(1.5, 2.0, "O")]);
        assert_eq!(tl.find_active_cue(0.1), None);
        assert_eq!(tl.find_active_cue(1.2), None);
        assert_eq!(tl.find_active_cue(-1.0), None);
    }

    #[test]
    fn overlapping_cues_first_listed_wins() {
        let tl = CueTimeline::new(vec![
            MouthCue::new(0.0, 2.0, "AI"),
            MouthCue::new(1.0, 3.0, "O"),
        ]);
        assert!(!tl.is_ordered());
        assert_eq!(tl.find_active_cue(1.5).map(|c| c.value.as_str()), Some("AI"));
        assert_eq!(tl.find_active_cue(2.5).map(|c| c.value.as_str()), Some("O"));
    }

    #[test]
    fn binary_search_agrees_with_linear_scan() {
        let cues: Vec<MouthCue> = (0..40)
            .map(|i| {
                let s = i as f32 * 0.25;
                let e = if i % 3 == 0 { s + 0.25 } else { s + 0.2 };
                MouthCue::new(s, e, format!("c{i}"))
            })
            .collect();
        let tl = CueTimeline::new(cues.clone());
        assert!(tl.is_ordered());
        let mut t = -0.1;
        while t < 11.0 {
            let linear = cues.iter().find(|c| c.covers(t));
            assert_eq!(tl.find_active_cue(t), linear, "t={t}");
            t += 0.0137;
        }
    }

    #[test]
    fn parses_rhubarb_document() {
        let tl = CueTimeline::from_json(
            r#"{ "metadata": { "soundFile": "voice.wav", "duration": 1.2 },
                 "mouthCues": [ { "start": 0.0, "end": 0.4, "value": "rest" },
                                { "start": 0.4, "end": 1.2, "value": "B" } ] }"#,
        )
        .unwrap();
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.duration(), 1.2);
    }

    #[test]
    fn missing_cue_list_is_empty_timeline() {
        let tl = CueTimeline::from_json(r#"{ "metadata": {} }"#).unwrap();
        assert!(tl.is_empty());
        assert_eq!(tl.find_active_cue(0.0), None);
    }

    #[test]
    fn malformed_document_is_data_unavailable() {
        let err = CueTimeline::from_json(r#"{ "mouthCues": [ { "start": "zero" } ] }"#).unwrap_err();
        assert!(matches!(err, CueError::Malformed { .. }));
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let src = FileCueSource::new("/definitely/not/here/voice.json");
        let err = CueTimeline::load(&src).unwrap_err();
        assert!(matches!(err, CueError::Unavailable { .. }));
        assert!(err.is_data_unavailable());
    }
}
