use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of upstream artifact a slide needs before a video can be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteKind {
    /// Narration script for the slide
    Narrative,
    /// Synthesized narration audio
    Audio,
}

impl fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrative => write!(f, "narrative"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// An upstream artifact attached to a work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub kind: PrerequisiteKind,
    /// Opaque reference handed to the provider (storage key, URL, ...)
    pub handle: String,
    /// Only the active version of an artifact satisfies a requirement
    pub active: bool,
}

impl Prerequisite {
    pub fn active(kind: PrerequisiteKind, handle: impl Into<String>) -> Self {
        Self {
            kind,
            handle: handle.into(),
            active: true,
        }
    }
}

/// One slide of a presentation, as supplied by the repository.
///
/// Read-only to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub item_id: Uuid,
    /// Ordering key within the presentation (ascending)
    pub slide_number: u32,
    pub title: Option<String>,
    pub prerequisites: Vec<Prerequisite>,
}

impl WorkItem {
    pub fn new(slide_number: u32) -> Self {
        Self {
            item_id: Uuid::new_v4(),
            slide_number,
            title: None,
            prerequisites: Vec::new(),
        }
    }

    pub fn with_prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    /// The active artifact of the given kind, if any
    pub fn active_prerequisite(&self, kind: PrerequisiteKind) -> Option<&Prerequisite> {
        self.prerequisites
            .iter()
            .find(|p| p.kind == kind && p.active)
    }

    pub fn has_active(&self, kind: PrerequisiteKind) -> bool {
        self.active_prerequisite(kind).is_some()
    }
}

/// A previously completed output for a work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingArtifact {
    pub item_id: Uuid,
    pub artifact_id: Uuid,
    pub handle: String,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_prerequisite_does_not_count() {
        let item = WorkItem::new(1).with_prerequisite(Prerequisite {
            kind: PrerequisiteKind::Audio,
            handle: "audio/old.mp3".to_string(),
            active: false,
        });

        assert!(!item.has_active(PrerequisiteKind::Audio));
        assert!(!item.has_active(PrerequisiteKind::Narrative));
    }

    #[test]
    fn test_active_prerequisite_lookup() {
        let item = WorkItem::new(2)
            .with_prerequisite(Prerequisite::active(PrerequisiteKind::Narrative, "script-2"))
            .with_prerequisite(Prerequisite::active(PrerequisiteKind::Audio, "audio/2.mp3"));

        let audio = item.active_prerequisite(PrerequisiteKind::Audio).unwrap();
        assert_eq!(audio.handle, "audio/2.mp3");
    }
}
