use std::path::Path;

use crate::{Result, Session};

/// Writes the full session, audio payloads included, as pretty JSON. Playable
/// urls are process-local and are not written.
pub fn save_session(path: impl AsRef<Path>, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path.as_ref(), json)?;
    tracing::debug!(path = %path.as_ref().display(), "session saved");
    Ok(())
}

/// Reads a session written by [`save_session`]. The result has no playable
/// urls until it is rehydrated.
pub fn load_session(path: impl AsRef<Path>) -> Result<Session> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let session: Session = serde_json::from_str(&raw)?;
    session.validate()?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use super::*;
    use crate::{AudioPayload, LocalUrlRegistry, NoteDuration};

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "biomotion-session-{}.json",
            uuid::Uuid::new_v4().simple()
        ))
    }

    #[test]
    fn saves_and_loads_payloads() {
        let mut urls = LocalUrlRegistry::new();
        let mut session = Session::new();
        session.set_notes("Observações gerais");
        session.add_annotation(1.25, "heel").unwrap();
        session.add_clip("Zoom", 0.5, 2.0).unwrap();
        session
            .append_audio_note(
                Arc::from(&[0u8, 159, 146, 150][..]),
                9,
                NoteDuration::Seconds(0.8),
                &mut urls,
            )
            .unwrap();

        let path = temp_path();
        save_session(&path, &session).unwrap();
        let loaded = load_session(&path);
        let _ = std::fs::remove_file(&path);
        let mut loaded = loaded.unwrap();

        let note = &loaded.audio_notes()[0];
        assert!(note.url.is_none());
        assert_eq!(
            note.payload,
            AudioPayload::Loaded {
                bytes: Arc::from(&[0u8, 159, 146, 150][..])
            }
        );

        loaded.rehydrate(&mut urls).unwrap();
        assert_eq!(loaded.notes(), "Observações gerais");
        assert_eq!(loaded.clips(), session.clips());
        assert_eq!(loaded.annotations(), session.annotations());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_session(temp_path()).unwrap_err();
        assert!(matches!(err, crate::BioMotionError::Io(_)));
    }
}
