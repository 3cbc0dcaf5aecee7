//! Asset resolution for rehydrated image references.
//!
//! Inline (`data:`) images are self-contained. Anything else is a path only the
//! generation host can serve, so it is routed through a retrieval endpoint.

use reqwest::Url;

use crate::content::CellContent;
use crate::errors::StudioError;

/// Rewrites a stored image reference into one the interaction surface can load.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> String;
}

/// Leaves every reference unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl AssetResolver for PassthroughResolver {
    fn resolve(&self, reference: &str) -> String {
        reference.to_string()
    }
}

/// Routes references through `{endpoint}?path={reference}`.
#[derive(Debug, Clone)]
pub struct RetrievalEndpointResolver {
    endpoint: Url,
}

impl RetrievalEndpointResolver {
    pub fn new(endpoint: &str) -> Result<Self, StudioError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StudioError::validation(format!("Invalid asset endpoint '{endpoint}': {e}"))
        })?;
        Ok(Self { endpoint })
    }

    fn is_routed(&self, reference: &str) -> bool {
        reference
            .strip_prefix(self.endpoint.as_str())
            .is_some_and(|rest| rest.starts_with('?'))
    }
}

impl AssetResolver for RetrievalEndpointResolver {
    fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("data:") || self.is_routed(reference) {
            return reference.to_string();
        }
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("path", reference);
        url.into()
    }
}

/// Applies `resolver` to the primary image and every variation.
pub fn resolve_content(mut content: CellContent, resolver: &dyn AssetResolver) -> CellContent {
    content.image = content.image.map(|img| resolver.resolve(&img));
    content.variations = content
        .variations
        .iter()
        .map(|v| resolver.resolve(v))
        .collect();
    content
}
