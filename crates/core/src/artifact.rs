//! Typed outputs of a completed generation job.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Which kind of output a task produces.
///
/// Decided by the task being run, never by inspecting the backend payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Audio,
    Text,
}

/// A single output unit produced by a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Image file on the backend's file system.
    ImagePath(PathBuf),
    /// Audio file on the backend's file system.
    AudioPath(PathBuf),
    /// Generated text, already post-processed.
    TextBlob(String),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::ImagePath(_) => ArtifactKind::Image,
            Artifact::AudioPath(_) => ArtifactKind::Audio,
            Artifact::TextBlob(_) => ArtifactKind::Text,
        }
    }

    /// File path for image and audio artifacts, `None` for text.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Artifact::ImagePath(p) | Artifact::AudioPath(p) => Some(p),
            Artifact::TextBlob(_) => None,
        }
    }
}

/// Ordered artifacts, in the order the backend reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet(Vec<Artifact>);

impl ArtifactSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&Artifact> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.0.iter()
    }

    /// First artifact backed by a file (image or audio).
    pub fn first_file(&self) -> Option<&Artifact> {
        self.0.iter().find(|a| a.path().is_some())
    }

    /// All text blobs joined without a separator.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .filter_map(|a| match a {
                Artifact::TextBlob(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FromIterator<Artifact> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = Artifact>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ArtifactSet {
    type Item = Artifact;
    type IntoIter = std::vec::IntoIter<Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
