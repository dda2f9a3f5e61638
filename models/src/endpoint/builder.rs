use crate::endpoint::{API_SEGMENT, Endpoint, SOCKET_SEGMENT};
use crate::error::model_error::ModelError;
use crate::{ErrorLocation, TargetId};

use std::panic::Location;

use url::Url;

/// Builder for creating validated [`Endpoint`] instances.
///
/// The host comes either from a dashboard base URL (`http(s)://` or
/// `ws(s)://`, whose scheme decides between `ws` and `wss`) or from a bare
/// `host[:port]` plus the `secure` flag. When both are given the base URL
/// wins.
#[derive(Debug, Default, Clone)]
pub struct EndpointBuilder {
    base_url: Option<String>,
    host: Option<String>,
    secure: Option<bool>,
    feature: Option<String>,
    target: Option<TargetId>,
}

impl EndpointBuilder {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<TargetId>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Build the Endpoint with validation.
    #[track_caller]
    pub fn build(self) -> Result<Endpoint, ModelError> {
        let feature = self.feature.ok_or_else(|| ModelError::Validation {
            message: String::from("Feature is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if feature.is_empty() || feature.contains('/') {
            return Err(ModelError::Validation {
                message: format!("Invalid feature segment: '{feature}'"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let target = self.target.ok_or_else(|| ModelError::Validation {
            message: String::from("Target is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if target.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Target cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let (scheme, authority) = match (self.base_url, self.host) {
            (Some(base_url), _) => socket_origin(&base_url)?,
            (None, Some(host)) => {
                let host = host.trim().trim_end_matches('/').to_string();
                if host.is_empty() || host.contains('/') {
                    return Err(ModelError::Validation {
                        message: format!("Invalid host: '{host}'"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                let scheme = if self.secure.unwrap_or(false) {
                    "wss"
                } else {
                    "ws"
                };
                (scheme, host)
            }
            (None, None) => {
                return Err(ModelError::Validation {
                    message: String::from("Host or base URL is required"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let mut url = Url::parse(&format!("{scheme}://{authority}/")).map_err(|e| {
            ModelError::Validation {
                message: format!("Invalid endpoint host '{authority}': {e}"),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        let target_segment = target.to_string();
        url.path_segments_mut()
            .map_err(|_| ModelError::Validation {
                message: format!("Endpoint URL cannot carry a path: {authority}"),
                location: ErrorLocation::from(Location::caller()),
            })?
            .clear()
            .extend([API_SEGMENT, feature.as_str(), target_segment.as_str(), SOCKET_SEGMENT]);

        Ok(Endpoint {
            url,
            feature,
            target,
        })
    }
}

/// Map a dashboard origin onto the matching socket scheme and authority.
#[track_caller]
fn socket_origin(base_url: &str) -> Result<(&'static str, String), ModelError> {
    let parsed = Url::parse(base_url).map_err(|e| ModelError::Validation {
        message: format!("Invalid base URL '{base_url}': {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ModelError::Validation {
                message: format!("Unsupported base URL scheme: {other}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let host = parsed.host_str().ok_or_else(|| ModelError::Validation {
        message: format!("Base URL has no host: {base_url}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok((scheme, authority))
}
