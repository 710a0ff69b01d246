//! Core library for the BioMotion video annotation tools.
//!
//! A [`Session`] holds the notes, clips, annotations and recorded audio notes
//! for one open video. The [`CaptureController`] turns a microphone stream into
//! audio notes, the [`PlaybackCoordinator`] keeps a single clip or note
//! playing, and the [`codec`] packs a whole session into a URL-safe string so
//! it can be shared without a backend.

pub mod capture;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod media_url;
pub mod persist;
pub mod playback;
pub mod session;
pub mod share;

pub use capture::{
    Acquisition, CaptureController, CaptureEvent, CaptureState, Clock, LiveStream, Microphone,
    SystemClock,
};
pub use codec::{decode, encode, try_decode};
pub use config::{AppConfig, CaptureConfig, ShareConfig};
pub use document::Document;
pub use error::{BioMotionError, CodecError, Result};
pub use geometry::{
    denormalize_position, format_time, normalize_position, range_from_drag, time_at_fraction, Rect,
};
pub use media_url::{LocalUrlRegistry, ObjectUrlRegistry, PlaybackUrl};
pub use persist::{load_session, save_session};
pub use playback::{MediaPlayer, PlaybackCoordinator};
pub use session::{new_id, Annotation, AudioNote, AudioPayload, Clip, NoteDuration, Session};
pub use share::{is_local_source, session_from_link, share_link, SharedState};
