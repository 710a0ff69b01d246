use std::sync::Arc;

use crate::{
    codec, AudioNote, LocalUrlRegistry, MediaPlayer, NoteDuration, ObjectUrlRegistry,
    PlaybackCoordinator, Result, Session,
};

/// Context for one open video document: the live session, the registry that
/// issued its playable urls and the playback coordinator.
///
/// Opening a document creates a fresh context; [`Document::close`] consumes
/// it and releases every url the session still holds.
pub struct Document {
    session: Session,
    urls: Box<dyn ObjectUrlRegistry>,
    playback: PlaybackCoordinator,
}

impl Document {
    /// Opens an empty document backed by a [`LocalUrlRegistry`].
    pub fn open() -> Self {
        Self::with_registry(Box::new(LocalUrlRegistry::new()))
    }

    /// Opens an empty document whose playable urls come from `urls`.
    pub fn with_registry(urls: Box<dyn ObjectUrlRegistry>) -> Self {
        Self {
            session: Session::new(),
            urls,
            playback: PlaybackCoordinator::new(),
        }
    }

    /// Opens a document around a session loaded from elsewhere, issuing urls
    /// for its audio payloads.
    pub fn from_session(session: Session, urls: Box<dyn ObjectUrlRegistry>) -> Result<Self> {
        let mut document = Self::with_registry(urls);
        // Nothing can be playing yet, so the swap needs no player.
        document.install(session)?;
        Ok(document)
    }

    /// Returns the live session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the live session for editing. Removing a clip or audio note
    /// through it bypasses the playback coordinator; prefer
    /// [`Document::remove_clip`] and [`Document::remove_audio_note`].
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the playback coordinator.
    pub fn playback(&self) -> &PlaybackCoordinator {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackCoordinator {
        &mut self.playback
    }

    /// Borrows the session together with the url registry, as the capture
    /// controller needs both.
    pub fn parts_mut(&mut self) -> (&mut Session, &mut dyn ObjectUrlRegistry) {
        (&mut self.session, self.urls.as_mut())
    }

    /// Appends a recorded note and issues its playable url.
    pub fn append_audio_note(
        &mut self,
        payload: Arc<[u8]>,
        timestamp: i64,
        duration: NoteDuration,
    ) -> Result<AudioNote> {
        self.session
            .append_audio_note(payload, timestamp, duration, self.urls.as_mut())
    }

    /// Removes an audio note, stopping it first if it was playing, and
    /// releases its url.
    pub fn remove_audio_note(&mut self, id: &str, player: &mut dyn MediaPlayer) {
        if self.playback.active_note_id() == Some(id) {
            self.playback.stop(player);
        }
        self.session.remove_audio_note(id, self.urls.as_mut());
        self.playback.reconcile(&self.session, player);
    }

    /// Removes a clip and stops it if it was playing.
    pub fn remove_clip(&mut self, id: &str, player: &mut dyn MediaPlayer) {
        self.session.remove_clip(id);
        self.playback.reconcile(&self.session, player);
    }

    /// Replaces the live session. Whatever was playing is stopped, the
    /// previous session's urls are released and fresh ones are issued for the
    /// new one. On error the live session and playback are untouched.
    pub fn replace_session(
        &mut self,
        mut session: Session,
        player: &mut dyn MediaPlayer,
    ) -> Result<()> {
        session.rehydrate(self.urls.as_mut())?;
        self.playback.stop(player);
        self.swap(session);
        Ok(())
    }

    /// Imports a shareable string. The live session is replaced only when the
    /// string decodes; otherwise nothing changes and `false` is returned.
    pub fn import_shared(&mut self, encoded: &str, player: &mut dyn MediaPlayer) -> bool {
        let Some(session) = codec::decode(encoded) else {
            return false;
        };
        match self.replace_session(session, player) {
            Ok(()) => {
                tracing::info!("replaced session from shared state");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not install shared session");
                false
            }
        }
    }

    /// Discards the document, stopping playback and releasing every playable
    /// url.
    pub fn close(mut self, player: &mut dyn MediaPlayer) {
        self.playback.stop(player);
        self.session.release_all(self.urls.as_mut());
    }

    fn install(&mut self, mut session: Session) -> Result<()> {
        session.rehydrate(self.urls.as_mut())?;
        self.swap(session);
        Ok(())
    }

    fn swap(&mut self, session: Session) {
        self.session.release_all(self.urls.as_mut());
        self.session = session;
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("session", &self.session)
            .field("playback", &self.playback)
            .finish()
    }
}
