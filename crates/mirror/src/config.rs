use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::error::MirrorError;
use crate::retry::RetryPolicy;

/// Upper bound on the worker count.
pub const MAX_WORKERS: usize = 10_000;

/// Name of the rewritten manifest inside the output directory.
pub const INDEX_FILE_NAME: &str = "index.m3u8";

static HTTP_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("static URL pattern is valid"));

/// Everything a mirror run needs, passed explicitly into [`crate::Mirror`].
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Absolute HTTP(S) URL of the `.m3u8` to mirror
    pub playlist_url: String,

    /// Directory receiving `index.m3u8` and every downloaded resource
    pub output_dir: PathBuf,

    /// Number of concurrent download workers
    pub workers: usize,

    /// Pause after every link a worker processes, successful or not
    pub request_delay: Duration,

    /// Prepended to every generated local filename. May contain a directory,
    /// e.g. `ts/`, in which case resources land in that subdirectory.
    pub name_prefix: String,

    /// Timeout applied to each individual HTTP request
    pub request_timeout: Duration,

    /// Retry behaviour for segment and key downloads
    pub retry: RetryPolicy,

    /// Generated names start at `sequence_offset + 1`
    pub sequence_offset: u64,

    /// Zero-padded width of the sequence number in generated names
    pub sequence_width: usize,

    /// Comment lines with an index up to and including this value are
    /// scanned for `URI="..."` references.
    pub key_scan_lines: usize,

    /// Maximum number of master playlists followed before giving up
    pub max_variant_depth: usize,

    /// `User-Agent` header value. `None` sends requests without one.
    pub user_agent: Option<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            playlist_url: String::new(),
            output_dir: PathBuf::from("."),
            workers: 1,
            request_delay: Duration::ZERO,
            name_prefix: String::new(),
            request_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            sequence_offset: 10_000,
            sequence_width: 5,
            key_scan_lines: 10,
            max_variant_depth: 8,
            user_agent: None,
        }
    }
}

impl MirrorConfig {
    pub fn new(playlist_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            playlist_url: playlist_url.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks the values the CLI layer is expected to have validated.
    pub fn validate(&self) -> Result<(), MirrorError> {
        if !HTTP_URL_PATTERN.is_match(&self.playlist_url) {
            return Err(MirrorError::configuration(format!(
                "playlist URL must be an absolute http(s) URL, got `{}`",
                self.playlist_url
            )));
        }
        Url::parse(&self.playlist_url)
            .map_err(|e| MirrorError::invalid_url(&self.playlist_url, e.to_string()))?;

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(MirrorError::configuration(format!(
                "worker count must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.sequence_width == 0 {
            return Err(MirrorError::configuration(
                "sequence width must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(MirrorError::configuration(
                "retry policy needs at least one attempt",
            ));
        }
        Ok(())
    }
}
