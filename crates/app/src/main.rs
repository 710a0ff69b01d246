use std::path::{Path, PathBuf};

use biomotion_core::{
    format_time, load_session, save_session, session_from_link, share_link, Acquisition,
    AppConfig, BioMotionError, CaptureConfig, CaptureController, CaptureEvent, Document,
    LiveStream, LocalUrlRegistry, MediaPlayer, Microphone, PlaybackUrl, Session, ShareConfig,
    SharedState,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

const CHUNK_SIZE: usize = 16 * 1024;

fn main() -> biomotion_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::New { session } => run_new(&session),
        Commands::Show { session } => run_show(&session),
        Commands::Notes { session, text } => edit(&session, |document| {
            document.session_mut().set_notes(text);
            Ok(())
        }),
        Commands::Annotate {
            session,
            time,
            text,
        } => edit(&session, |document| {
            let annotation = document.session_mut().add_annotation(time, text)?;
            println!("{}", annotation.id);
            Ok(())
        }),
        Commands::Clip {
            session,
            name,
            start,
            end,
        } => edit(&session, |document| {
            let clip = document.session_mut().add_clip(name, start, end)?;
            println!("{}", clip.id);
            Ok(())
        }),
        Commands::Remove { session, kind, id } => edit(&session, |document| {
            match kind {
                EntityKind::Annotation => document.session_mut().remove_annotation(&id),
                EntityKind::Clip => document.remove_clip(&id, &mut NoPlayer),
                EntityKind::Audio => document.remove_audio_note(&id, &mut NoPlayer),
            }
            Ok(())
        }),
        Commands::AttachAudio { session, audio } => run_attach_audio(&session, &audio),
        Commands::Share {
            session,
            video,
            base,
        } => run_share(&session, video.as_deref(), &base, &config),
        Commands::Import { link, session } => run_import(&link, &session, &config),
    }
}

fn run_new(path: &Path) -> biomotion_core::Result<()> {
    tracing::info!(?path, "creating empty session");
    save_session(path, &Session::new())
}

fn run_show(path: &Path) -> biomotion_core::Result<()> {
    let session = load_session(path)?;

    if !session.notes().is_empty() {
        println!("notes: {}", session.notes());
    }
    for (index, annotation) in session.annotations().iter().enumerate() {
        println!(
            "annotation {} {} {} {}",
            index + 1,
            annotation.id,
            format_time(annotation.time),
            annotation.text
        );
    }
    for clip in session.clips().iter() {
        println!(
            "clip {} {} {} - {}",
            clip.id,
            clip.name,
            format_time(clip.start_time),
            format_time(clip.end_time)
        );
    }
    for (index, note) in session.audio_notes().iter().enumerate() {
        println!(
            "audio #{} {} {} bytes, {}",
            index + 1,
            note.id,
            note.payload.byte_size(),
            note.duration
        );
    }
    Ok(())
}

/// Loads a session into a document, applies `change` and writes it back.
fn edit(
    path: &Path,
    change: impl FnOnce(&mut Document) -> biomotion_core::Result<()>,
) -> biomotion_core::Result<()> {
    let session = load_session(path)?;
    let mut document = Document::from_session(session, Box::new(LocalUrlRegistry::new()))?;
    change(&mut document)?;
    save_session(path, document.session())?;
    document.close(&mut NoPlayer);
    Ok(())
}

fn run_attach_audio(path: &Path, audio: &Path) -> biomotion_core::Result<()> {
    let bytes = std::fs::read(audio)?;
    tracing::info!(?audio, len = bytes.len(), "attaching audio file");

    edit(path, |document| {
        // The wall-clock span of reading a file says nothing about its length.
        let config = CaptureConfig {
            compute_duration: false,
        };
        let mut capture = CaptureController::new(FileMicrophone, config);
        capture.start()?;

        let (session, urls) = document.parts_mut();
        for chunk in bytes.chunks(CHUNK_SIZE) {
            capture.handle_event(CaptureEvent::Chunk(chunk.to_vec()), session, urls)?;
        }
        let note = capture
            .stop(session, urls)?
            .ok_or_else(|| BioMotionError::msg("recording did not produce a note"))?;
        println!("{}", note.id);
        Ok(())
    })
}

fn run_share(
    path: &Path,
    video: Option<&str>,
    base: &str,
    config: &AppConfig,
) -> biomotion_core::Result<()> {
    let session = load_session(path)?;
    let link = share_link(base, &session, video, &config.share)?;
    println!("{link}");
    Ok(())
}

fn run_import(link: &str, path: &Path, config: &AppConfig) -> biomotion_core::Result<()> {
    let shared = read_shared(link, &config.share)?;
    if let Some(video) = &shared.video_source {
        println!("video: {video}");
    }

    tracing::info!(?path, "saving imported session");
    save_session(path, &shared.session)
}

/// Reads shared state from a link, or from a bare shared string when the input
/// does not parse as a url at all.
fn read_shared(link: &str, config: &ShareConfig) -> biomotion_core::Result<SharedState> {
    if let Some(shared) = session_from_link(link, config) {
        return Ok(shared);
    }
    if url::Url::parse(link).is_ok() {
        return Err(BioMotionError::msg("no valid shared state in link"));
    }
    Ok(SharedState {
        session: biomotion_core::try_decode(link)?,
        video_source: None,
    })
}

/// Treats an audio file as an already-granted microphone stream.
struct FileMicrophone;

struct FileStream;

impl LiveStream for FileStream {
    fn stop_tracks(&mut self) {}
}

impl Microphone for FileMicrophone {
    fn request_stream(&mut self) -> biomotion_core::Result<Acquisition> {
        Ok(Acquisition::Ready(Box::new(FileStream)))
    }
}

/// The command line has no media elements, so playback intents go nowhere.
struct NoPlayer;

impl MediaPlayer for NoPlayer {
    fn seek(&mut self, _time: f64) {}
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn play_note(&mut self, _url: &PlaybackUrl) {}
    fn stop_note(&mut self) {}
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Video annotation sessions you can share as a link", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty session file.
    New { session: PathBuf },
    /// List everything stored in a session file.
    Show { session: PathBuf },
    /// Replace the general notes.
    Notes { session: PathBuf, text: String },
    /// Add a marker at a timeline instant.
    Annotate {
        session: PathBuf,
        /// Position in seconds.
        #[arg(short, long)]
        time: f64,
        #[arg(long)]
        text: String,
    },
    /// Add a named zoom clip.
    Clip {
        session: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        start: f64,
        #[arg(short, long)]
        end: f64,
    },
    /// Delete an entry by id. Unknown ids are ignored.
    Remove {
        session: PathBuf,
        kind: EntityKind,
        id: String,
    },
    /// Store an encoded audio file as an audio note.
    AttachAudio { session: PathBuf, audio: PathBuf },
    /// Print a share link for the session.
    Share {
        session: PathBuf,
        /// Remote address of the annotated video.
        #[arg(long)]
        video: Option<String>,
        #[arg(long, default_value = "https://biomotion.app/")]
        base: String,
    },
    /// Save the session carried by a share link (or a bare shared string).
    Import { link: String, session: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntityKind {
    Annotation,
    Clip,
    Audio,
}

#[cfg(test)]
mod tests {
    use biomotion_core::encode;

    use super::*;

    fn shared_session() -> Session {
        let mut session = Session::new();
        session.add_annotation(12.5, "footstrike").unwrap();
        session
    }

    #[test]
    fn bare_strings_and_links_are_both_read() {
        let config = ShareConfig::default();
        let session = shared_session();
        let encoded = encode(&session).unwrap();

        let bare = read_shared(&encoded, &config).unwrap();
        assert_eq!(bare.session, session);
        assert!(bare.video_source.is_none());

        let link = format!("https://biomotion.app/?state={encoded}");
        assert_eq!(read_shared(&link, &config).unwrap().session, session);
    }

    #[test]
    fn link_without_state_is_not_decoded_whole() {
        let config = ShareConfig::default();
        let encoded = encode(&shared_session()).unwrap();

        for link in [
            "https://biomotion.app/".to_string(),
            "https://biomotion.app/?state=broken".to_string(),
            format!("https://biomotion.app/?other={encoded}"),
        ] {
            let err = read_shared(&link, &config).unwrap_err();
            assert_eq!(err.to_string(), "no valid shared state in link");
        }
    }
}
