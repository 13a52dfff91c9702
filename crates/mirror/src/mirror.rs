// Mirror orchestration: playlist resolution, rewriting and dispatch to the worker pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use url::Url;

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::fetcher::{HttpFetcher, ResourceFetcher};
use crate::output::prepare_link_dirs;
use crate::pool::{PoolReport, WorkerContext, run_pool};
use crate::rewrite::{ResourceLink, RewriteOptions, rewrite};
use crate::variant::resolve_media_playlist;

/// A resolved and rewritten media playlist, ready for download.
#[derive(Debug, Clone)]
pub struct PreparedPlaylist {
    /// URL of the media playlist actually rewritten
    pub playlist_url: Url,
    /// Master playlists followed to reach it
    pub via: Vec<Url>,
    /// Rewritten manifest text
    pub manifest: String,
    pub links: Vec<ResourceLink>,
}

/// Result of a complete run. Individual download failures are listed in
/// `report.failed`; they never fail the run.
#[derive(Debug, Clone)]
pub struct MirrorOutcome {
    pub playlist_url: Url,
    /// Rewritten manifest text, to be persisted by the caller
    pub manifest: String,
    pub total: usize,
    pub report: PoolReport,
    pub elapsed: Duration,
}

impl MirrorOutcome {
    pub fn is_complete(&self) -> bool {
        self.report.failed.is_empty()
    }
}

pub struct Mirror {
    config: MirrorConfig,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl Mirror {
    /// Create a mirror backed by an HTTP client built from `config`.
    pub fn new(config: MirrorConfig) -> Result<Self, MirrorError> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a mirror using a custom transport.
    pub fn with_fetcher(
        config: MirrorConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Result<Self, MirrorError> {
        config.validate()?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Fetches the playlist, descends into the first variant of any master
    /// playlist and rewrites the resulting media playlist. No resource is
    /// downloaded.
    pub async fn prepare(&self) -> Result<PreparedPlaylist, MirrorError> {
        let start = Url::parse(&self.config.playlist_url)
            .map_err(|e| MirrorError::invalid_url(&self.config.playlist_url, e.to_string()))?;

        let source =
            resolve_media_playlist(self.fetcher.as_ref(), start, self.config.max_variant_depth)
                .await?;

        let options = RewriteOptions::from(&self.config);
        let rewritten = rewrite(&source.url, &source.text, &options)?;

        info!(
            url = %source.url,
            tasks = rewritten.links.len(),
            "Playlist rewritten"
        );

        Ok(PreparedPlaylist {
            playlist_url: source.url,
            via: source.via,
            manifest: rewritten.text,
            links: rewritten.links,
        })
    }

    /// Runs the whole mirror: [`Mirror::prepare`], directory creation and the
    /// concurrent download of every link. Setup errors abort the run;
    /// per-resource download errors are collected in the outcome.
    pub async fn run(&self) -> Result<MirrorOutcome, MirrorError> {
        let started = Instant::now();
        let prepared = self.prepare().await?;

        prepare_link_dirs(&self.config.output_dir, &prepared.links).await?;

        let total = prepared.links.len();
        let context = Arc::new(WorkerContext {
            fetcher: Arc::clone(&self.fetcher),
            output_dir: self.config.output_dir.clone(),
            retry: self.config.retry.clone(),
            request_delay: self.config.request_delay,
        });
        let report = run_pool(prepared.links, self.config.workers, context).await?;
        let elapsed = started.elapsed();

        if report.failed.is_empty() {
            info!(
                tasks = total,
                bytes = report.bytes,
                elapsed = ?elapsed,
                "All resources downloaded"
            );
        } else {
            warn!(
                tasks = total,
                succeeded = report.succeeded,
                failed = report.failed.len(),
                elapsed = ?elapsed,
                "Mirror finished with failed downloads"
            );
        }

        Ok(MirrorOutcome {
            playlist_url: prepared.playlist_url,
            manifest: prepared.manifest,
            total,
            report,
            elapsed,
        })
    }
}
