use crate::{AudioNote, BioMotionError, Clip, PlaybackUrl, Result, Session};

/// Intents the coordinator issues to the host's media elements. The video
/// methods drive the main player; the note methods drive the audio-note
/// player.
pub trait MediaPlayer {
    fn seek(&mut self, time: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn play_note(&mut self, url: &PlaybackUrl);
    fn stop_note(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
enum Active {
    Clip { id: String, end: f64 },
    Note { id: String },
}

/// Keeps at most one clip or audio note playing at a time.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    active: Option<Active>,
}

impl PlaybackCoordinator {
    /// Creates a coordinator with nothing playing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of the clip currently playing, if any.
    pub fn active_clip_id(&self) -> Option<&str> {
        match &self.active {
            Some(Active::Clip { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Returns the id of the audio note currently playing, if any.
    pub fn active_note_id(&self) -> Option<&str> {
        match &self.active {
            Some(Active::Note { id }) => Some(id),
            _ => None,
        }
    }

    /// Resolves the active clip against the session it was started from.
    pub fn active_clip<'a>(&self, session: &'a Session) -> Option<&'a Clip> {
        self.active_clip_id().and_then(|id| session.clip(id))
    }

    /// Plays `clip` from its start. Whatever was active is stopped first; the
    /// same clip requested twice is left running untouched.
    pub fn play(&mut self, clip: &Clip, player: &mut dyn MediaPlayer) {
        if self.active_clip_id() == Some(clip.id.as_str()) {
            return;
        }
        self.stop(player);

        player.seek(clip.start_time);
        player.play();
        self.active = Some(Active::Clip {
            id: clip.id.clone(),
            end: clip.end_time,
        });
        tracing::debug!(id = %clip.id, start = clip.start_time, end = clip.end_time, "clip playing");
    }

    /// Stops the clip if it is the active one, otherwise plays it.
    pub fn toggle(&mut self, clip: &Clip, player: &mut dyn MediaPlayer) {
        if self.active_clip_id() == Some(clip.id.as_str()) {
            self.stop(player);
        } else {
            self.play(clip, player);
        }
    }

    /// Plays an audio note, stopping any clip or other note first. Fails
    /// without side effects when the note has no playable url.
    pub fn play_note(&mut self, note: &AudioNote, player: &mut dyn MediaPlayer) -> Result<()> {
        let url = note.url.as_ref().ok_or_else(|| {
            BioMotionError::msg(format!("audio note `{}` has no playable payload", note.id))
        })?;
        if self.active_note_id() == Some(note.id.as_str()) {
            return Ok(());
        }
        self.stop(player);

        player.play_note(url);
        self.active = Some(Active::Note {
            id: note.id.clone(),
        });
        Ok(())
    }

    /// Clears whatever is active. Idempotent.
    pub fn stop(&mut self, player: &mut dyn MediaPlayer) {
        match self.active.take() {
            Some(Active::Clip { id, .. }) => {
                player.pause();
                tracing::debug!(%id, "clip stopped");
            }
            Some(Active::Note { .. }) => player.stop_note(),
            None => {}
        }
    }

    /// Called as the video's current time advances. Returns the id of a clip
    /// that just reached its end.
    pub fn time_advanced(&mut self, time: f64, player: &mut dyn MediaPlayer) -> Option<String> {
        let ended = matches!(&self.active, Some(Active::Clip { end, .. }) if time >= *end);
        if !ended {
            return None;
        }
        let id = self.active_clip_id().map(str::to_owned);
        self.stop(player);
        id
    }

    /// Stops playback whose clip or note no longer exists in `session`.
    pub fn reconcile(&mut self, session: &Session, player: &mut dyn MediaPlayer) {
        let gone = match &self.active {
            Some(Active::Clip { id, .. }) => session.clip(id).is_none(),
            Some(Active::Note { id }) => session.audio_note(id).is_none(),
            None => false,
        };
        if gone {
            self.stop(player);
        }
    }
}
