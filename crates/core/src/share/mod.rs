use url::{form_urlencoded, Url};

use crate::{codec, BioMotionError, Result, Session, ShareConfig};

/// Session and video source recovered from a share link.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedState {
    pub session: Session,
    pub video_source: Option<String>,
}

/// Returns whether a video source only exists on this machine and therefore cannot be
/// opened by whoever receives a link.
pub fn is_local_source(source: &str) -> bool {
    match Url::parse(source) {
        Ok(url) => !matches!(url.scheme(), "http" | "https"),
        Err(_) => true,
    }
}

/// Builds a link to `base` that carries the encoded session and the remote
/// video it annotates. State or video parameters already present on `base`
/// are replaced; its other query pairs are kept.
pub fn share_link(
    base: &str,
    session: &Session,
    video_source: Option<&str>,
    config: &ShareConfig,
) -> Result<String> {
    let video = match video_source {
        Some(source) if !is_local_source(source) => source,
        Some(_) => return Err(BioMotionError::Share("the video is a local file".into())),
        None => return Err(BioMotionError::Share("no video is loaded".into())),
    };
    let mut url = Url::parse(base)
        .map_err(|err| BioMotionError::Share(format!("invalid base url `{base}`: {err}")))?;

    let encoded = codec::encode(session)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(name, _)| *name != config.state_param && *name != config.video_param)
        .collect();
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(&kept)
        .append_pair(&config.video_param, video)
        .append_pair(&config.state_param, &encoded);

    let link = String::from(url);
    if link.len() > config.max_link_len {
        tracing::warn!(
            len = link.len(),
            max = config.max_link_len,
            "share link is longer than many clients accept"
        );
    }
    Ok(link)
}

/// Reads shared state from the query or fragment of `link`. Returns `None` if
/// the link carries no state or the state does not decode.
pub fn session_from_link(link: &str, config: &ShareConfig) -> Option<SharedState> {
    let url = Url::parse(link).ok()?;
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let fragment: Vec<(String, String)> = url
        .fragment()
        .map(|fragment| form_urlencoded::parse(fragment.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let pairs = if lookup(&query, &config.state_param).is_some() {
        query
    } else {
        fragment
    };
    let session = codec::decode(lookup(&pairs, &config.state_param)?)?;
    tracing::info!(
        clips = session.clips().len(),
        annotations = session.annotations().len(),
        "loaded shared session"
    );
    Some(SharedState {
        session,
        video_source: lookup(&pairs, &config.video_param).map(str::to_owned),
    })
}

/// Returns the value of the first pair named `key`.
fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}
