// Resource fetcher: manifest text fetches and streamed segment downloads over HTTP.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use url::Url;

use crate::config::MirrorConfig;
use crate::error::MirrorError;

/// Transport used by the mirror. Production code uses [`HttpFetcher`];
/// tests plug in in-memory implementations.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches a manifest and returns its body as text. No retries.
    async fn fetch_text(&self, url: &Url) -> Result<String, MirrorError>;

    /// Downloads `url` into `destination`, creating or truncating the file.
    /// Returns the number of bytes written.
    async fn download_to(&self, url: &Url, destination: &Path) -> Result<u64, MirrorError>;
}

/// Create a reqwest Client with the provided configuration.
///
/// No `User-Agent` header is sent unless one is configured.
pub fn create_client(config: &MirrorConfig) -> Result<Client, MirrorError> {
    let mut client_builder = Client::builder();

    if let Some(user_agent) = &config.user_agent {
        client_builder = client_builder.user_agent(user_agent);
    }
    if !config.request_timeout.is_zero() {
        client_builder = client_builder.timeout(config.request_timeout);
    }

    client_builder.build().map_err(MirrorError::from)
}

pub struct HttpFetcher {
    http_client: Client,
}

impl HttpFetcher {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    pub fn from_config(config: &MirrorConfig) -> Result<Self, MirrorError> {
        Ok(Self::new(create_client(config)?))
    }

    async fn get(&self, url: &Url, operation: &'static str) -> Result<Response, MirrorError> {
        let response = self.http_client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::http_status(
                response.status(),
                url.as_str(),
                operation,
            ));
        }
        Ok(response)
    }
}

async fn write_body(response: Response, destination: &Path) -> Result<u64, MirrorError> {
    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String, MirrorError> {
        debug!(url = %url, "Fetching playlist");
        let response = self.get(url, "playlist fetch").await?;
        let text = response.text().await?;
        trace!(url = %url, len = text.len(), "Playlist fetched");
        Ok(text)
    }

    /// A body that fails mid-stream removes the partially written file, so a
    /// failed download never leaves truncated content at `destination`.
    async fn download_to(&self, url: &Url, destination: &Path) -> Result<u64, MirrorError> {
        let response = self.get(url, "segment download").await?;

        match write_body(response, destination).await {
            Ok(written) => {
                trace!(url = %url, bytes = written, path = %destination.display(), "Resource written");
                Ok(written)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    debug!(
                        path = %destination.display(),
                        error = %remove_err,
                        "Could not remove partial download"
                    );
                }
                Err(e)
            }
        }
    }
}
