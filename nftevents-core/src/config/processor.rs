//! Event processor endpoint configuration.

use std::time::Duration;

use url::Url;

/// Where canonical events are pushed.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Root URL of the event processor.
    pub endpoint: Url,
    /// Timeout of a single push request.
    pub request_timeout: Duration,
}
