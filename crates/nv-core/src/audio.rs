use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The channel an audio stream plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// One-shot effect.
    Sound,
    /// Spoken line.
    Voice,
    /// Background music.
    Music,
}

impl StreamKind {
    /// Whether streams of this kind loop when the step does not say.
    pub fn loops_by_default(self) -> bool {
        matches!(self, Self::Music)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sound => write!(f, "sound"),
            Self::Voice => write!(f, "voice"),
            Self::Music => write!(f, "music"),
        }
    }
}

/// An active audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Registry key.
    #[serde(skip)]
    pub id: String,
    /// Channel kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: StreamKind,
    /// Asset reference.
    pub file: String,
    /// Whether the stream repeats. Only looping streams are saved.
    #[serde(rename = "loop")]
    pub looping: bool,
}

/// Host-level playback signal. The registry only records intent; actual
/// playback is up to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSignal {
    /// Every stream should pause.
    PauseAll,
    /// Every paused stream should resume.
    ResumeAll,
}

/// Active streams keyed by stream id.
#[derive(Debug, Clone, Default)]
pub struct AudioRegistry {
    streams: BTreeMap<String, AudioStream>,
    paused: Option<Vec<String>>,
    signals: Vec<AudioSignal>,
}

impl AudioRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a stream, replacing any stream with the same id. Without an
    /// explicit id a unique `<kind>_<uuid>` id is generated. Returns the id.
    pub fn play(
        &mut self,
        kind: StreamKind,
        file: impl Into<String>,
        looping: Option<bool>,
        stream_id: Option<&str>,
    ) -> String {
        let id = match stream_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{kind}_{}", Uuid::new_v4().simple()),
        };
        let stream = AudioStream {
            id: id.clone(),
            kind,
            file: file.into(),
            looping: looping.unwrap_or_else(|| kind.loops_by_default()),
        };
        tracing::debug!(stream = %id, %kind, file = %stream.file, "play");
        self.streams.insert(id.clone(), stream);
        id
    }

    /// Seed a stream as-is, e.g. when restoring a save.
    pub fn insert(&mut self, stream: AudioStream) {
        self.streams.insert(stream.id.clone(), stream);
    }

    /// Remove one stream. Unknown ids are ignored.
    pub fn stop(&mut self, stream_id: &str) -> Option<AudioStream> {
        self.streams.remove(stream_id)
    }

    /// Remove every stream.
    pub fn stop_all(&mut self) {
        self.streams.clear();
        self.paused = None;
    }

    /// Broadcast a pause to the host, remembering which streams were active.
    pub fn pause_all(&mut self) {
        self.paused = Some(self.streams.keys().cloned().collect());
        self.signals.push(AudioSignal::PauseAll);
    }

    /// Broadcast a resume to the host. No-op when nothing was paused.
    pub fn resume_all(&mut self) {
        if self.paused.take().is_some() {
            self.signals.push(AudioSignal::ResumeAll);
        }
    }

    /// Whether a pause is in effect.
    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    /// Take the signals queued since the last call.
    pub fn drain_signals(&mut self) -> Vec<AudioSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Look up a stream.
    pub fn get(&self, stream_id: &str) -> Option<&AudioStream> {
        self.streams.get(stream_id)
    }

    /// All active streams, by id.
    pub fn streams(&self) -> &BTreeMap<String, AudioStream> {
        &self.streams
    }

    /// Streams eligible for persistence.
    pub fn looping_streams(&self) -> impl Iterator<Item = &AudioStream> {
        self.streams.values().filter(|s| s.looping)
    }

    /// Number of active streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is active.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_and_loop_flags() {
        let mut a = AudioRegistry::new();
        let sfx = a.play(StreamKind::Sound, "door.ogg", None, None);
        let bgm = a.play(StreamKind::Music, "theme.ogg", None, None);
        assert!(sfx.starts_with("sound_"));
        assert!(bgm.starts_with("music_"));
        assert_ne!(sfx, bgm);
        assert!(!a.get(&sfx).unwrap().looping);
        assert!(a.get(&bgm).unwrap().looping);
    }

    #[test]
    fn same_id_replaces_stream() {
        let mut a = AudioRegistry::new();
        a.play(StreamKind::Music, "a.ogg", None, Some("bgm"));
        a.play(StreamKind::Music, "b.ogg", Some(false), Some("bgm"));
        assert_eq!(a.len(), 1);
        assert_eq!(a.get("bgm").unwrap().file, "b.ogg");
        assert_eq!(a.looping_streams().count(), 0);
    }

    #[test]
    fn stop_and_stop_all() {
        let mut a = AudioRegistry::new();
        a.play(StreamKind::Voice, "v.ogg", None, Some("v"));
        a.play(StreamKind::Sound, "s.ogg", None, Some("s"));
        assert!(a.stop("v").is_some());
        assert!(a.stop("v").is_none());
        a.stop_all();
        assert!(a.is_empty());
    }

    #[test]
    fn pause_and_resume_do_not_touch_streams() {
        let mut a = AudioRegistry::new();
        a.play(StreamKind::Music, "m.ogg", None, Some("bgm"));
        a.resume_all();
        a.pause_all();
        assert!(a.is_paused());
        assert_eq!(a.len(), 1);
        a.resume_all();
        assert_eq!(
            a.drain_signals(),
            vec![AudioSignal::PauseAll, AudioSignal::ResumeAll]
        );
        assert!(a.drain_signals().is_empty());
    }

    #[test]
    fn stream_serializes_with_wire_names() {
        let mut a = AudioRegistry::new();
        a.play(StreamKind::Music, "m.ogg", None, Some("bgm"));
        let json = serde_json::to_string(a.get("bgm").unwrap()).unwrap();
        assert_eq!(json, r#"{"type":"music","file":"m.ogg","loop":true}"#);
    }
}
