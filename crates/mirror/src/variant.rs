// Variant selection: detects master playlists and follows the first variant
// down to a media playlist.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::MirrorError;
use crate::fetcher::ResourceFetcher;
use crate::resolver::resolve_url;
use crate::rewrite::check_header;

/// Tag announcing a variant stream in a master playlist.
pub const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// A media playlist reached after following zero or more master playlists.
#[derive(Debug, Clone)]
pub struct MediaPlaylistSource {
    /// URL the media playlist was fetched from; relative references resolve against it.
    pub url: Url,
    pub text: String,
    /// Master playlists traversed on the way, in order.
    pub via: Vec<Url>,
}

/// Returns the absolute URL of every variant listed in `manifest`, in
/// order of appearance. For each stream-info tag the first following line
/// that is neither blank nor a comment is the variant reference. References
/// that fail to resolve are skipped.
pub fn select_variants(base: &Url, manifest: &str) -> Vec<Url> {
    let mut variants = Vec::new();
    let mut awaiting_uri = false;

    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with(STREAM_INF_TAG) {
            awaiting_uri = true;
            continue;
        }
        if !awaiting_uri || line.is_empty() || line.starts_with('#') {
            continue;
        }
        awaiting_uri = false;
        match resolve_url(base, line) {
            Ok(url) => variants.push(url),
            Err(e) => warn!(reference = line, error = %e, "Skipping unresolvable variant"),
        }
    }

    variants
}

/// Fetches `start` and keeps descending into the first variant until a
/// manifest without variants is found.
///
/// Every fetched manifest must carry the `#EXTM3U` header. A URL seen twice
/// fails with [`MirrorError::Cycle`]; following more than `max_depth` master
/// playlists fails with [`MirrorError::VariantDepth`].
pub async fn resolve_media_playlist(
    fetcher: &dyn ResourceFetcher,
    start: Url,
    max_depth: usize,
) -> Result<MediaPlaylistSource, MirrorError> {
    let mut visited: HashSet<Url> = HashSet::new();
    let mut via = Vec::new();
    let mut current = start;

    loop {
        if !visited.insert(current.clone()) {
            return Err(MirrorError::cycle(current.as_str()));
        }

        info!(url = %current, "Fetching playlist");
        let text = fetcher.fetch_text(&current).await?;
        check_header(&text)?;

        let variants = select_variants(&current, &text);
        let Some(first) = variants.into_iter().next() else {
            debug!(url = %current, depth = via.len(), "Media playlist reached");
            return Ok(MediaPlaylistSource {
                url: current,
                text,
                via,
            });
        };

        if via.len() >= max_depth {
            return Err(MirrorError::VariantDepth {
                limit: max_depth,
                url: current.to_string(),
            });
        }

        info!(master = %current, variant = %first, "Master playlist detected, following first variant");
        via.push(current);
        current = first;
    }
}
