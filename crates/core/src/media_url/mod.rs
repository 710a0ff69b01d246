use std::{collections::HashMap, fmt, sync::Arc};

use uuid::Uuid;

use crate::{BioMotionError, Result};

/// Transient, process-local reference through which an audio payload can be
/// played. Never persisted or shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackUrl(String);

impl PlaybackUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaybackUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues and releases playable handles for binary payloads, in the manner of
/// a browser's object URLs.
pub trait ObjectUrlRegistry {
    fn create(&mut self, payload: &Arc<[u8]>) -> Result<PlaybackUrl>;
    fn release(&mut self, url: &PlaybackUrl) -> Result<()>;
}

/// In-process registry that keeps every live handle so leaks can be observed.
#[derive(Debug, Default)]
pub struct LocalUrlRegistry {
    live: HashMap<PlaybackUrl, Arc<[u8]>>,
}

impl LocalUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn resolve(&self, url: &PlaybackUrl) -> Option<&[u8]> {
        self.live.get(url).map(|payload| payload.as_ref())
    }
}

impl ObjectUrlRegistry for LocalUrlRegistry {
    fn create(&mut self, payload: &Arc<[u8]>) -> Result<PlaybackUrl> {
        let url = PlaybackUrl(format!("blob:biomotion/{}", Uuid::new_v4()));
        self.live.insert(url.clone(), payload.clone());
        Ok(url)
    }

    fn release(&mut self, url: &PlaybackUrl) -> Result<()> {
        self.live
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| BioMotionError::msg(format!("`{url}` is not a live handle")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_distinct_resolvable_handles() {
        let mut registry = LocalUrlRegistry::new();
        let payload: Arc<[u8]> = Arc::from(&b"RIFF"[..]);

        let a = registry.create(&payload).unwrap();
        let b = registry.create(&payload).unwrap();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("blob:"));
        assert_eq!(registry.resolve(&a), Some(&b"RIFF"[..]));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn releasing_twice_reports_an_error() {
        let mut registry = LocalUrlRegistry::new();
        let url = registry.create(&Arc::from(&[1u8, 2, 3][..])).unwrap();

        registry.release(&url).unwrap();
        assert_eq!(registry.live_count(), 0);
        assert!(registry.release(&url).is_err());
    }
}
