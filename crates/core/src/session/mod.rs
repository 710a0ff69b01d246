//! In-memory annotation session for one open video document.
//!
//! Collections are held as shared immutable slices. Every mutation installs a
//! freshly built slice, so a caller holding an earlier [`Arc`] can detect change
//! with [`Arc::ptr_eq`]. Removing an absent id leaves the slice untouched.

use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{format_time, BioMotionError, ObjectUrlRegistry, PlaybackUrl, Result};

/// Generates an opaque id that is unique for the lifetime of the process.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Marker anchored to a single timeline instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub time: f64,
    pub text: String,
}

/// Named time range played back with a zoomed viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    pub name: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Recorded audio bytes, or only their size when the note was reconstructed
/// from a share link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioPayload {
    Loaded {
        #[serde(with = "payload_bytes")]
        bytes: Arc<[u8]>,
    },
    Detached {
        byte_size: usize,
    },
}

impl AudioPayload {
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Loaded { bytes } => bytes.len(),
            Self::Detached { byte_size } => *byte_size,
        }
    }

    pub fn bytes(&self) -> Option<&Arc<[u8]>> {
        match self {
            Self::Loaded { bytes } => Some(bytes),
            Self::Detached { .. } => None,
        }
    }

    fn detached(&self) -> Self {
        Self::Detached {
            byte_size: self.byte_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteDuration {
    Unknown,
    Seconds(f64),
}

impl fmt::Display for NoteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Seconds(seconds) => f.write_str(&format_time(*seconds)),
        }
    }
}

/// Spoken note produced by a completed recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioNote {
    pub id: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    pub payload: AudioPayload,
    pub duration: NoteDuration,
    #[serde(skip)]
    pub url: Option<PlaybackUrl>,
}

/// Aggregate of notes, clips, annotations and audio notes. This is the unit
/// of export and import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    notes: String,
    clips: Arc<[Clip]>,
    annotations: Arc<[Annotation]>,
    audio_notes: Arc<[AudioNote]>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            notes: String::new(),
            clips: Arc::from(Vec::new()),
            annotations: Arc::from(Vec::new()),
            audio_notes: Arc::from(Vec::new()),
        }
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn clips(&self) -> &Arc<[Clip]> {
        &self.clips
    }

    pub fn annotations(&self) -> &Arc<[Annotation]> {
        &self.annotations
    }

    pub fn audio_notes(&self) -> &Arc<[AudioNote]> {
        &self.audio_notes
    }

    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    pub fn audio_note(&self, id: &str) -> Option<&AudioNote> {
        self.audio_notes.iter().find(|note| note.id == id)
    }

    pub fn set_notes(&mut self, text: impl Into<String>) {
        self.notes = text.into();
    }

    /// Adds a marker at `time`. Markers keep insertion order. Non-finite times
    /// are rejected and the session is left unchanged.
    pub fn add_annotation(&mut self, time: f64, text: impl Into<String>) -> Result<Annotation> {
        check_time(time)?;
        let annotation = Annotation {
            id: new_id(),
            time,
            text: text.into(),
        };
        self.annotations = appended(&self.annotations, annotation.clone());
        tracing::debug!(id = %annotation.id, time, "annotation added");
        Ok(annotation)
    }

    pub fn remove_annotation(&mut self, id: &str) {
        if let Some(next) = without(&self.annotations, |annotation| annotation.id == id) {
            self.annotations = next;
            tracing::debug!(id, "annotation removed");
        }
    }

    /// Adds a clip spanning `start..end`. Overlapping clips are allowed.
    pub fn add_clip(&mut self, name: impl Into<String>, start: f64, end: f64) -> Result<Clip> {
        check_range(start, end)?;
        let clip = Clip {
            id: new_id(),
            name: name.into(),
            start_time: start,
            end_time: end,
        };
        self.clips = appended(&self.clips, clip.clone());
        tracing::debug!(id = %clip.id, start, end, "clip added");
        Ok(clip)
    }

    pub fn remove_clip(&mut self, id: &str) {
        if let Some(next) = without(&self.clips, |clip| clip.id == id) {
            self.clips = next;
            tracing::debug!(id, "clip removed");
        }
    }

    /// Stores a recorded payload as a new audio note with a freshly issued
    /// playable url. If the url cannot be issued the session is unchanged.
    pub fn append_audio_note(
        &mut self,
        payload: Arc<[u8]>,
        timestamp: i64,
        duration: NoteDuration,
        urls: &mut dyn ObjectUrlRegistry,
    ) -> Result<AudioNote> {
        let url = urls.create(&payload)?;
        let note = AudioNote {
            id: new_id(),
            timestamp,
            payload: AudioPayload::Loaded { bytes: payload },
            duration,
            url: Some(url),
        };
        self.audio_notes = appended(&self.audio_notes, note.clone());
        tracing::debug!(id = %note.id, bytes = note.payload.byte_size(), "audio note appended");
        Ok(note)
    }

    /// Removes an audio note and releases its playable url. Release failures
    /// are logged and otherwise ignored.
    pub fn remove_audio_note(&mut self, id: &str, urls: &mut dyn ObjectUrlRegistry) {
        let Some(note) = self.audio_note(id).cloned() else {
            return;
        };
        if let Some(next) = without(&self.audio_notes, |candidate| candidate.id == id) {
            self.audio_notes = next;
        }
        if let Some(url) = &note.url {
            release_quietly(urls, url);
        }
        tracing::debug!(id, "audio note removed");
    }

    /// Issues playable urls for every loaded payload that lacks one, as needed
    /// after loading from disk. On failure the urls issued so far are released
    /// and the session is unchanged.
    pub fn rehydrate(&mut self, urls: &mut dyn ObjectUrlRegistry) -> Result<()> {
        if self
            .audio_notes
            .iter()
            .all(|note| note.url.is_some() || note.payload.bytes().is_none())
        {
            return Ok(());
        }

        let mut notes = self.audio_notes.to_vec();
        let mut issued = Vec::new();
        for note in notes.iter_mut().filter(|note| note.url.is_none()) {
            let Some(bytes) = note.payload.bytes() else {
                continue;
            };
            match urls.create(bytes) {
                Ok(url) => {
                    issued.push(url.clone());
                    note.url = Some(url);
                }
                Err(err) => {
                    for url in &issued {
                        release_quietly(urls, url);
                    }
                    return Err(err);
                }
            }
        }
        self.audio_notes = Arc::from(notes);
        Ok(())
    }

    /// Releases every playable url held by the session.
    pub fn release_all(&mut self, urls: &mut dyn ObjectUrlRegistry) {
        if self.audio_notes.iter().all(|note| note.url.is_none()) {
            return;
        }

        let mut notes = self.audio_notes.to_vec();
        for note in &mut notes {
            if let Some(url) = note.url.take() {
                release_quietly(urls, &url);
            }
        }
        self.audio_notes = Arc::from(notes);
    }

    /// The part of the session that can travel inside a share link: audio
    /// payloads are reduced to their size and urls are dropped.
    pub fn without_payloads(&self) -> Session {
        let audio_notes: Vec<AudioNote> = self
            .audio_notes
            .iter()
            .map(|note| AudioNote {
                payload: note.payload.detached(),
                url: None,
                ..note.clone()
            })
            .collect();
        Session {
            audio_notes: Arc::from(audio_notes),
            ..self.clone()
        }
    }

    /// Checks the invariants a session built elsewhere (a file, a link) must
    /// satisfy before it can replace the live one.
    pub fn validate(&self) -> Result<()> {
        for clip in self.clips.iter() {
            check_range(clip.start_time, clip.end_time)?;
        }
        for annotation in self.annotations.iter() {
            check_time(annotation.time)?;
        }
        ensure_unique("clip", self.clips.iter().map(|clip| clip.id.as_str()))?;
        ensure_unique(
            "annotation",
            self.annotations.iter().map(|annotation| annotation.id.as_str()),
        )?;
        ensure_unique(
            "audio note",
            self.audio_notes.iter().map(|note| note.id.as_str()),
        )?;
        Ok(())
    }
}

fn check_range(start: f64, end: f64) -> Result<()> {
    // Written so that NaN on either side is rejected.
    if start >= 0.0 && start < end && end.is_finite() {
        Ok(())
    } else {
        Err(BioMotionError::InvalidRange { start, end })
    }
}

fn check_time(time: f64) -> Result<()> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(BioMotionError::InvalidTime { time })
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(BioMotionError::msg(format!("duplicate {kind} id `{id}`")));
        }
    }
    Ok(())
}

fn appended<T: Clone>(items: &Arc<[T]>, item: T) -> Arc<[T]> {
    items.iter().cloned().chain(std::iter::once(item)).collect()
}

/// Returns a new slice without the matching items, or `None` when nothing
/// matched.
fn without<T: Clone>(items: &Arc<[T]>, matches: impl Fn(&T) -> bool) -> Option<Arc<[T]>> {
    if !items.iter().any(&matches) {
        return None;
    }
    Some(items.iter().filter(|item| !matches(*item)).cloned().collect())
}

fn release_quietly(urls: &mut dyn ObjectUrlRegistry, url: &PlaybackUrl) {
    if let Err(err) = urls.release(url) {
        tracing::warn!(%url, error = %err, "failed to release playback url");
    }
}

mod payload_bytes {
    use std::sync::Arc;

    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}
