//! HLS playlist mirroring engine.
//!
//! Fetches an `.m3u8`, follows master playlists down to a media playlist,
//! rewrites every segment and key reference to a generated local filename and
//! downloads the referenced resources with a fixed pool of workers.

pub mod config;
pub mod error;
pub mod fetcher;
mod mirror;
pub mod output;
pub mod partition;
pub mod pool;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod rewrite;
pub mod variant;

pub use config::{INDEX_FILE_NAME, MAX_WORKERS, MirrorConfig};
pub use error::MirrorError;
pub use fetcher::{HttpFetcher, ResourceFetcher, create_client};
pub use mirror::{Mirror, MirrorOutcome, PreparedPlaylist};
pub use output::{create_dirs, write_manifest};
pub use partition::{TaskRange, partition};
pub use pool::{FailedDownload, PoolReport};
pub use retry::RetryPolicy;
pub use rewrite::{ResourceKind, ResourceLink, RewriteOptions, RewrittenPlaylist, rewrite};
pub use variant::select_variants;
