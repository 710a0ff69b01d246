//! Audio capture controller: turns a live microphone stream into an
//! [`AudioNote`] appended to the session.
//!
//! The controller moves through `Idle -> Requesting -> Recording -> Idle`.
//! While it holds a stream the stream lives inside a guard that stops every
//! hardware track when dropped, so leaving `Recording` by any path releases
//! the microphone.

use std::{mem, sync::Arc};

use crate::{
    AudioNote, BioMotionError, CaptureConfig, NoteDuration, ObjectUrlRegistry, Result, Session,
};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// An acquired microphone stream.
pub trait LiveStream {
    /// Stops all underlying hardware tracks. Must be idempotent.
    fn stop_tracks(&mut self);
}

/// Outcome of asking the platform for a stream.
pub enum Acquisition {
    /// The stream is available immediately.
    Ready(Box<dyn LiveStream>),
    /// The platform is asking the user; the answer arrives through
    /// [`CaptureController::stream_granted`] or
    /// [`CaptureController::stream_denied`].
    Pending,
}

/// Platform microphone. An `Err` from `request_stream` means capture is not
/// possible at all (no device, no recorder support).
pub trait Microphone {
    fn request_stream(&mut self) -> Result<Acquisition>;
}

/// Notifications delivered by the recording subsystem while recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Encoded audio, in arrival order.
    Chunk(Vec<u8>),
    /// The platform ended the stream on its own (device removed, track ended).
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requesting,
    Recording,
}

struct StreamGuard(Box<dyn LiveStream>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.stop_tracks();
    }
}

struct ActiveCapture {
    _stream: StreamGuard,
    chunks: Vec<Vec<u8>>,
    started_at: i64,
}

enum Phase {
    Idle,
    Requesting,
    Recording(ActiveCapture),
}

pub struct CaptureController<M, C = SystemClock> {
    microphone: M,
    clock: C,
    config: CaptureConfig,
    phase: Phase,
}

impl<M: Microphone> CaptureController<M> {
    pub fn new(microphone: M, config: CaptureConfig) -> Self {
        Self::with_clock(microphone, SystemClock, config)
    }
}

impl<M: Microphone, C: Clock> CaptureController<M, C> {
    pub fn with_clock(microphone: M, clock: C, config: CaptureConfig) -> Self {
        Self {
            microphone,
            clock,
            config,
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Requesting => CaptureState::Requesting,
            Phase::Recording(_) => CaptureState::Recording,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.phase, Phase::Recording(_))
    }

    /// Number of chunks buffered for the current recording.
    pub fn buffered_chunks(&self) -> usize {
        match &self.phase {
            Phase::Recording(capture) => capture.chunks.len(),
            _ => 0,
        }
    }

    /// Begins a capture. Does nothing if one is already requested or running.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Idle) {
            tracing::debug!(state = ?self.state(), "capture already active, ignoring start");
            return Ok(());
        }

        self.phase = Phase::Requesting;
        tracing::debug!("requesting microphone stream");
        match self.microphone.request_stream() {
            Ok(Acquisition::Ready(stream)) => {
                self.begin_recording(stream);
                Ok(())
            }
            Ok(Acquisition::Pending) => Ok(()),
            Err(err) => {
                self.phase = Phase::Idle;
                Err(unavailable(err))
            }
        }
    }

    /// Delivers a stream the platform granted after a pending request. A grant
    /// that nobody is waiting for is released straight away.
    pub fn stream_granted(&mut self, stream: Box<dyn LiveStream>) {
        if matches!(self.phase, Phase::Requesting) {
            self.begin_recording(stream);
        } else {
            tracing::debug!(state = ?self.state(), "releasing unexpected microphone stream");
            drop(StreamGuard(stream));
        }
    }

    /// Reports that the user or platform refused a pending request.
    pub fn stream_denied(&mut self, reason: impl Into<String>) -> Result<()> {
        if !matches!(self.phase, Phase::Requesting) {
            return Ok(());
        }
        self.phase = Phase::Idle;
        Err(BioMotionError::CaptureUnavailable(reason.into()))
    }

    /// Feeds a recorder notification. A platform-initiated end finishes the
    /// recording exactly like [`stop`](Self::stop).
    pub fn handle_event(
        &mut self,
        event: CaptureEvent,
        session: &mut Session,
        urls: &mut dyn ObjectUrlRegistry,
    ) -> Result<Option<AudioNote>> {
        match event {
            CaptureEvent::Chunk(bytes) => {
                match &mut self.phase {
                    Phase::Recording(capture) if !bytes.is_empty() => capture.chunks.push(bytes),
                    Phase::Recording(_) => {}
                    _ => tracing::trace!(len = bytes.len(), "dropping chunk outside recording"),
                }
                Ok(None)
            }
            CaptureEvent::Ended => self.stop(session, urls),
        }
    }

    /// Ends the capture. While recording this concatenates the buffered chunks
    /// into one payload, releases the stream and appends the note to
    /// `session`. A stop while still requesting abandons the request.
    pub fn stop(
        &mut self,
        session: &mut Session,
        urls: &mut dyn ObjectUrlRegistry,
    ) -> Result<Option<AudioNote>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(capture) => self.finish(capture, session, urls).map(Some),
            Phase::Requesting => {
                tracing::debug!("stop before stream was granted, abandoning request");
                Ok(None)
            }
            Phase::Idle => Ok(None),
        }
    }

    fn begin_recording(&mut self, stream: Box<dyn LiveStream>) {
        let started_at = self.clock.now_millis();
        self.phase = Phase::Recording(ActiveCapture {
            _stream: StreamGuard(stream),
            chunks: Vec::new(),
            started_at,
        });
        tracing::debug!(started_at, "recording started");
    }

    fn finish(
        &self,
        capture: ActiveCapture,
        session: &mut Session,
        urls: &mut dyn ObjectUrlRegistry,
    ) -> Result<AudioNote> {
        let ActiveCapture {
            _stream: stream,
            chunks,
            started_at,
        } = capture;
        drop(stream);

        let payload: Arc<[u8]> = Arc::from(chunks.concat());
        let now = self.clock.now_millis();
        let duration = if self.config.compute_duration {
            NoteDuration::Seconds((now - started_at).max(0) as f64 / 1000.0)
        } else {
            NoteDuration::Unknown
        };

        let note = session.append_audio_note(payload, now, duration, urls)?;
        tracing::info!(id = %note.id, bytes = note.payload.byte_size(), %duration, "recording saved");
        Ok(note)
    }
}

fn unavailable(err: BioMotionError) -> BioMotionError {
    match err {
        BioMotionError::CaptureUnavailable(_) => err,
        other => BioMotionError::CaptureUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;
    use crate::{LocalUrlRegistry, PlaybackUrl};

    #[derive(Clone, Default)]
    struct Probe {
        requests: Rc<Cell<usize>>,
        stops: Rc<Cell<usize>>,
    }

    struct FakeStream {
        probe: Probe,
        stopped: bool,
    }

    impl LiveStream for FakeStream {
        fn stop_tracks(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.probe.stops.set(self.probe.stops.get() + 1);
            }
        }
    }

    enum Mode {
        Immediate,
        Prompt,
        Missing,
    }

    struct FakeMicrophone {
        probe: Probe,
        mode: Mode,
    }

    impl FakeMicrophone {
        fn stream(&self) -> Box<dyn LiveStream> {
            Box::new(FakeStream {
                probe: self.probe.clone(),
                stopped: false,
            })
        }
    }

    impl Microphone for FakeMicrophone {
        fn request_stream(&mut self) -> Result<Acquisition> {
            self.probe.requests.set(self.probe.requests.get() + 1);
            match self.mode {
                Mode::Immediate => Ok(Acquisition::Ready(self.stream())),
                Mode::Prompt => Ok(Acquisition::Pending),
                Mode::Missing => Err(BioMotionError::msg("no input device")),
            }
        }
    }

    #[derive(Clone, Default)]
    struct ManualClock(Rc<RefCell<i64>>);

    impl ManualClock {
        fn set(&self, millis: i64) {
            *self.0.borrow_mut() = millis;
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            *self.0.borrow()
        }
    }

    struct RefusingRegistry;

    impl ObjectUrlRegistry for RefusingRegistry {
        fn create(&mut self, _payload: &Arc<[u8]>) -> Result<PlaybackUrl> {
            Err(BioMotionError::msg("quota exceeded"))
        }

        fn release(&mut self, _url: &PlaybackUrl) -> Result<()> {
            Ok(())
        }
    }

    fn controller(
        mode: Mode,
    ) -> (CaptureController<FakeMicrophone, ManualClock>, Probe, ManualClock) {
        let probe = Probe::default();
        let clock = ManualClock::default();
        let microphone = FakeMicrophone {
            probe: probe.clone(),
            mode,
        };
        let controller =
            CaptureController::with_clock(microphone, clock.clone(), CaptureConfig::default());
        (controller, probe, clock)
    }

    #[test]
    fn records_chunks_in_arrival_order() {
        let (mut capture, probe, clock) = controller(Mode::Immediate);
        let mut session = Session::new();
        let mut urls = LocalUrlRegistry::new();

        clock.set(1_000);
        capture.start().unwrap();
        assert_eq!(capture.state(), CaptureState::Recording);

        for chunk in [b"ab".to_vec(), Vec::new(), b"cd".to_vec(), b"e".to_vec()] {
            capture
                .handle_event(CaptureEvent::Chunk(chunk), &mut session, &mut urls)
                .unwrap();
        }
        assert_eq!(capture.buffered_chunks(), 3);

        clock.set(3_500);
        let note = capture.stop(&mut session, &mut urls).unwrap().unwrap();

        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(note.payload.bytes().map(|b| b.as_ref()), Some(&b"abcde"[..]));
        assert_eq!(note.timestamp, 3_500);
        assert_eq!(note.duration, NoteDuration::Seconds(2.5));
        assert_eq!(session.audio_notes().len(), 1);
        assert_eq!(probe.stops.get(), 1);
        assert_eq!(urls.live_count(), 1);
    }

    #[test]
    fn second_start_does_not_acquire_again() {
        let (mut capture, probe, _) = controller(Mode::Immediate);
        let mut session = Session::new();
        let mut urls = LocalUrlRegistry::new();

        capture.start().unwrap();
        capture.start().unwrap();
        assert_eq!(probe.requests.get(), 1);

        capture.stop(&mut session, &mut urls).unwrap();
        assert_eq!(probe.stops.get(), 1);
        assert_eq!(session.audio_notes().len(), 1);

        assert!(capture.stop(&mut session, &mut urls).unwrap().is_none());
        assert_eq!(session.audio_notes().len(), 1);
    }

    #[test]
    fn pending_request_then_grant() {
        let (mut capture, probe, _) = controller(Mode::Prompt);
        let mut session = Session::new();
        let mut urls = LocalUrlRegistry::new();

        capture.start().unwrap();
        assert_eq!(capture.state(), CaptureState::Requesting);
        capture.start().unwrap();
        assert_eq!(probe.requests.get(), 1);

        capture.stream_granted(Box::new(FakeStream {
            probe: probe.clone(),
            stopped: false,
        }));
        assert!(capture.is_recording());

        capture
            .handle_event(CaptureEvent::Chunk(vec![1, 2]), &mut session, &mut urls)
            .unwrap();
        let note = capture
            .handle_event(CaptureEvent::Ended, &mut session, &mut urls)
            .unwrap();
        assert!(note.is_some());
        assert_eq!(probe.stops.get(), 1);
    }

    #[test]
    fn denial_returns_to_idle_and_is_reported() {
        let (mut capture, probe, _) = controller(Mode::Prompt);

        capture.start().unwrap();
        let err = capture.stream_denied("permission denied").unwrap_err();

        assert!(matches!(err, BioMotionError::CaptureUnavailable(_)));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(probe.requests.get(), 1);
    }

    #[test]
    fn missing_device_is_capture_unavailable() {
        let (mut capture, _, _) = controller(Mode::Missing);

        let err = capture.start().unwrap_err();
        assert!(matches!(err, BioMotionError::CaptureUnavailable(msg) if msg.contains("no input device")));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn late_grant_after_stop_is_released() {
        let (mut capture, probe, _) = controller(Mode::Prompt);
        let mut session = Session::new();
        let mut urls = LocalUrlRegistry::new();

        capture.start().unwrap();
        assert!(capture.stop(&mut session, &mut urls).unwrap().is_none());

        capture.stream_granted(Box::new(FakeStream {
            probe: probe.clone(),
            stopped: false,
        }));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(probe.stops.get(), 1);
        assert!(session.audio_notes().is_empty());
    }

    #[test]
    fn stream_is_released_when_append_fails() {
        let (mut capture, probe, _) = controller(Mode::Immediate);
        let mut session = Session::new();

        capture.start().unwrap();
        let result = capture.stop(&mut session, &mut RefusingRegistry);

        assert!(result.is_err());
        assert_eq!(probe.stops.get(), 1);
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(session.audio_notes().is_empty());
    }

    #[test]
    fn duration_can_be_left_unknown() {
        let probe = Probe::default();
        let microphone = FakeMicrophone {
            probe: probe.clone(),
            mode: Mode::Immediate,
        };
        let config = CaptureConfig {
            compute_duration: false,
        };
        let mut capture = CaptureController::with_clock(microphone, ManualClock::default(), config);
        let mut session = Session::new();
        let mut urls = LocalUrlRegistry::new();

        capture.start().unwrap();
        let note = capture.stop(&mut session, &mut urls).unwrap().unwrap();
        assert_eq!(note.duration, NoteDuration::Unknown);
    }

    #[test]
    fn dropping_the_controller_releases_the_stream() {
        let (mut capture, probe, _) = controller(Mode::Immediate);
        capture.start().unwrap();
        drop(capture);
        assert_eq!(probe.stops.get(), 1);
    }
}
