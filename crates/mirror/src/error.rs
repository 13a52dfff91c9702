use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("playlist format error: expected `#EXTM3U` header, found `{line}`")]
    Format { line: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("variant playlist cycle detected: `{url}` was already visited")]
    Cycle { url: String },

    #[error("variant playlist chain exceeds {limit} levels at `{url}`")]
    VariantDepth { limit: usize, url: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl MirrorError {
    pub fn format(line: impl Into<String>) -> Self {
        Self::Format { line: line.into() }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>, operation: &'static str) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn cycle(url: impl Into<String>) -> Self {
        Self::Cycle { url: url.into() }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}
