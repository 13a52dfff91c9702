use url::Url;

use crate::error::MirrorError;

/// Parses `base` and resolves `reference` against it.
pub fn resolve(base: &str, reference: &str) -> Result<Url, MirrorError> {
    let base_url = Url::parse(base).map_err(|e| MirrorError::invalid_url(base, e.to_string()))?;
    resolve_url(&base_url, reference)
}

/// Resolves a manifest reference (absolute, root-relative or relative)
/// against an already parsed base URL.
pub fn resolve_url(base: &Url, reference: &str) -> Result<Url, MirrorError> {
    base.join(reference)
        .map_err(|e| MirrorError::invalid_url(reference, e.to_string()))
}
