//! Per-request context carried into every service call.

/// Identifies the inbound request a service call belongs to.
///
/// Transports fill `request_id` from whatever correlation id they have
/// (the HTTP layer uses `x-request-id`) so service logs line up with
/// access logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    pub fn new<S: Into<String>>(request_id: S) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// Context with a freshly generated id, for callers outside HTTP.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::generate()
    }
}
