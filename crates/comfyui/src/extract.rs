//! Typed artifact extraction from ComfyUI history payloads.
//!
//! A history payload looks like
//!
//! ```text
//! { "<prompt_id>": { "outputs": { "<node_id>": { "images": [...], ... } }, "status": {...} } }
//! ```
//!
//! Each node entry under `outputs` is a *slot*. Extractors scan every slot
//! in payload order and never fail: anything missing or oddly shaped is
//! skipped, so a half-written payload simply reads as "nothing yet" and the
//! poller tries again.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use studio_core::artifact::{Artifact, ArtifactKind, ArtifactSet};

/// Reasoning traces some text models emit ahead of their answer.
static THINK_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Strategy for turning a raw status payload into artifacts.
///
/// Implementations must be pure: the same payload always yields the same
/// set. An empty set means "not ready yet".
pub trait ArtifactExtractor: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    fn extract(&self, payload: &Value) -> ArtifactSet;
}

/// Iterate every output slot of every job entry in `payload`.
fn output_slots(payload: &Value) -> impl Iterator<Item = &Value> {
    payload
        .as_object()
        .into_iter()
        .flat_map(|jobs| jobs.values())
        .filter_map(|job| job.get("outputs").and_then(Value::as_object))
        .flat_map(|outputs| outputs.values())
}

/// Resolve a `{ filename, type, subfolder }` entry to a file path.
///
/// Path is `{backend_dir}/{type}/{subfolder}/{filename}`, with an empty
/// subfolder omitted. A bare string entry is taken as the filename.
fn entry_path(backend_dir: &Path, entry: &Value, default_type: &str) -> Option<PathBuf> {
    let (filename, folder_type, subfolder) = match entry {
        Value::String(name) if !name.is_empty() => (name.as_str(), default_type, None),
        Value::Object(_) => (
            non_empty_str(entry, "filename")?,
            non_empty_str(entry, "type").unwrap_or(default_type),
            non_empty_str(entry, "subfolder"),
        ),
        _ => return None,
    };

    let mut path = backend_dir.join(folder_type);
    if let Some(sub) = subfolder {
        path.push(sub);
    }
    path.push(filename);
    Some(path)
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Entries of `value` whether it is a single object or a list of them.
fn one_or_many(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Images from every slot's `images` list.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    backend_dir: PathBuf,
}

impl ImageExtractor {
    pub fn new(backend_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend_dir: backend_dir.into(),
        }
    }
}

impl ArtifactExtractor for ImageExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Image
    }

    fn extract(&self, payload: &Value) -> ArtifactSet {
        output_slots(payload)
            .filter_map(|slot| slot.get("images").and_then(Value::as_array))
            .flatten()
            .filter_map(|entry| entry_path(&self.backend_dir, entry, "output"))
            .map(Artifact::ImagePath)
            .collect()
    }
}

/// Audio from `audio_files`, or from `audio` when a slot has no `audio_files`.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    backend_dir: PathBuf,
}

impl AudioExtractor {
    pub fn new(backend_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend_dir: backend_dir.into(),
        }
    }
}

impl ArtifactExtractor for AudioExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Audio
    }

    fn extract(&self, payload: &Value) -> ArtifactSet {
        output_slots(payload)
            .filter_map(|slot| slot.get("audio_files").or_else(|| slot.get("audio")))
            .flat_map(one_or_many)
            .filter_map(|entry| entry_path(&self.backend_dir, entry, "audio"))
            .map(Artifact::AudioPath)
            .collect()
    }
}

/// Text concatenated from every slot's `text`, with think spans removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl ArtifactExtractor for TextExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    fn extract(&self, payload: &Value) -> ArtifactSet {
        let mut raw = String::new();
        for text in output_slots(payload).filter_map(|slot| slot.get("text")) {
            match text {
                Value::String(s) => raw.push_str(s),
                Value::Array(parts) => parts
                    .iter()
                    .filter_map(Value::as_str)
                    .for_each(|s| raw.push_str(s)),
                _ => {}
            }
        }

        // A reply that is all reasoning so far is not an answer yet.
        let text = strip_think_spans(&raw);
        if text.is_empty() {
            return ArtifactSet::new();
        }
        std::iter::once(Artifact::TextBlob(text)).collect()
    }
}

/// Remove every `<think>...</think>` span, delimiters included.
///
/// Text outside the spans is kept byte for byte. An unterminated `<think>`
/// is left alone.
pub fn strip_think_spans(text: &str) -> String {
    THINK_SPAN_RE.replace_all(text, "").into_owned()
}

/// Extractor for the artifact kind a task produces.
pub fn extractor_for(kind: ArtifactKind, backend_dir: &Path) -> Box<dyn ArtifactExtractor> {
    match kind {
        ArtifactKind::Image => Box::new(ImageExtractor::new(backend_dir)),
        ArtifactKind::Audio => Box::new(AudioExtractor::new(backend_dir)),
        ArtifactKind::Text => Box::new(TextExtractor),
    }
}
