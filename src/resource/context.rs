//! Request context for resource operations.

use uuid::Uuid;

/// Request context for resource operations.
///
/// Carries the correlation id used in logs and error bodies, and the base
/// URL hyperlinks are built from.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    base_url: String,
}

impl RequestContext {
    /// Create a new request context with a specific request ID.
    pub fn new(request_id: String, base_url: impl Into<String>) -> Self {
        Self {
            request_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a new request context with a generated request ID.
    pub fn with_generated_id(base_url: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a resource below the base, e.g. `url(&["schools", "OU1"])`.
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }
}

/// The last path segment of a hyperlink; plain names are returned as is.
pub fn url_tail(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
