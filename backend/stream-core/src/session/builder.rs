use crate::config::{ReconnectPolicy, StreamConfig};
use crate::dispatcher::{Dispatcher, EventHandlers};
use crate::error::CoreError;
use crate::error::stream::StreamError;
use crate::lifecycle::LifecycleManager;
use crate::session::DebugSession;
use crate::session::pump::{LinkHandlers, run_event_pump};
use crate::transport::websocket::WsTransport;
use crate::transport::{CloseInfo, Transport};

use common::ErrorLocation;
use models::{
    DEBUG_FEATURE, EndpointBuilder, ErrorPayload, LogPayload, StateChangePayload, TargetId,
};

use std::panic::Location;
use std::sync::Arc;

use log::info;
use serde_json::Value;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Builder for a [`DebugSession`].
///
/// Only the target is required. The endpoint defaults to the `debug`
/// feature, the reconnect policy to 5 s fixed-interval unbounded retries,
/// and the transport to [`WsTransport`].
pub struct DebugSessionBuilder {
    target: TargetId,
    endpoint: EndpointBuilder,
    policy: ReconnectPolicy,
    transport: Option<Arc<dyn Transport>>,
    link_handlers: LinkHandlers,
    event_handlers: EventHandlers,
}

impl DebugSessionBuilder {
    pub(crate) fn new(target: TargetId) -> Self {
        Self {
            endpoint: EndpointBuilder::default()
                .with_feature(DEBUG_FEATURE)
                .with_target(target.clone()),
            target,
            policy: ReconnectPolicy::default(),
            transport: None,
            link_handlers: LinkHandlers::default(),
            event_handlers: EventHandlers::default(),
        }
    }

    /// Take endpoint and reconnect settings from a loaded config.
    pub fn with_config(mut self, config: &StreamConfig) -> Self {
        if let Some(base_url) = &config.endpoint.base_url {
            self.endpoint = self.endpoint.with_base_url(base_url.clone());
        }
        if let Some(host) = &config.endpoint.host {
            self.endpoint = self.endpoint.with_host(host.clone());
        }
        self.endpoint = self.endpoint.with_secure(config.endpoint.secure);
        self.policy = config.reconnect;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint = self.endpoint.with_base_url(base_url);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.endpoint = self.endpoint.with_host(host);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.endpoint = self.endpoint.with_secure(secure);
        self
    }

    /// Path segment after `/api/`: `debug` or `deployments`.
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.endpoint = self.endpoint.with_feature(feature);
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_connect(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.link_handlers.on_connect = Some(Box::new(handler));
        self
    }

    pub fn on_disconnect(mut self, handler: impl FnMut(&CloseInfo) + Send + 'static) -> Self {
        self.link_handlers.on_disconnect = Some(Box::new(handler));
        self
    }

    pub fn on_log(mut self, handler: impl FnMut(&LogPayload) + Send + 'static) -> Self {
        self.event_handlers = self.event_handlers.on_log(handler);
        self
    }

    pub fn on_variables(mut self, handler: impl FnMut(&Value) + Send + 'static) -> Self {
        self.event_handlers = self.event_handlers.on_variables(handler);
        self
    }

    pub fn on_state_change(
        mut self,
        handler: impl FnMut(&StateChangePayload) + Send + 'static,
    ) -> Self {
        self.event_handlers = self.event_handlers.on_state_change(handler);
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(&ErrorPayload) + Send + 'static) -> Self {
        self.event_handlers = self.event_handlers.on_error(handler);
        self
    }

    /// Validate everything and start the event pump, without connecting.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Model`] if the endpoint cannot be derived
    /// - [`CoreError::Config`] if the reconnect policy is out of bounds
    /// - [`CoreError::Stream`] if there is no current tokio runtime
    pub fn build(self) -> Result<DebugSession, CoreError> {
        let endpoint = self.endpoint.build()?;
        self.policy.validate()?;

        let runtime = Handle::try_current().map_err(|e| StreamError::Runtime {
            message: format!("DebugSession requires a tokio runtime: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let id = Uuid::new_v4();
        let label = session_label(&self.target, &id);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::default()));

        let (lifecycle, events) = LifecycleManager::new(
            endpoint,
            self.policy,
            transport,
            runtime.clone(),
            label.clone(),
        );
        let dispatcher = Dispatcher::new(self.event_handlers).with_label(label.clone());
        let last_event = dispatcher.last_event_slot();

        let pump = runtime.spawn(run_event_pump(
            lifecycle.clone(),
            events,
            dispatcher,
            self.link_handlers,
            label.clone(),
        ));

        info!("[{}] Session created for {}", label, lifecycle.endpoint());

        Ok(DebugSession::assemble(
            id,
            self.target,
            lifecycle,
            last_event,
            pump,
            label,
        ))
    }

    /// [`build`](Self::build), then connect.
    pub fn open(self) -> Result<DebugSession, CoreError> {
        let session = self.build()?;
        session.connect();
        Ok(session)
    }
}

fn session_label(target: &TargetId, id: &Uuid) -> String {
    let short: String = id.simple().to_string().chars().take(8).collect();
    format!("{target}#{short}")
}
