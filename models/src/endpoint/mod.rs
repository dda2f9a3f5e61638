pub mod builder;

use crate::TargetId;

use std::fmt::{Display, Formatter, Result as FormatResult};

use url::Url;

/// Feature segment for the remote step-debugger stream.
pub const DEBUG_FEATURE: &str = "debug";

/// Feature segment for deployment log streaming.
pub const DEPLOYMENT_LOGS_FEATURE: &str = "deployments";

pub(crate) const API_SEGMENT: &str = "api";
pub(crate) const SOCKET_SEGMENT: &str = "ws";

/// A validated stream endpoint: `ws(s)://<host>/api/<feature>/<target>/ws`.
///
/// Built through [`EndpointBuilder`](builder::EndpointBuilder); the derivation
/// is deterministic, so the same inputs always produce the same URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    feature: String,
    target: TargetId,
}

impl Endpoint {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl Display for Endpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.url.as_str())
    }
}
