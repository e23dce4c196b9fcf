//! Dispatcher: routes inbound requests to handlers, notifications to
//! listeners.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use protomcp_protocol::error::{Error, ErrorKind};
use serde_json::Value;

use crate::context::RequestContext;

/// A registered request handler. The dispatcher calls exactly one of
/// these per inbound request, selected by method name.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle `params` and return a JSON result, or an [`Error`] which the
    /// dispatcher maps to a JSON-RPC error response.
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> Result<Value, Error>;
}

/// A registered notification listener. Exceptions are logged and never
/// propagated to the peer: listener dispatch is fire-and-forget.
#[async_trait]
pub trait NotificationListener: Send + Sync {
    /// React to an inbound notification.
    async fn handle(&self, params: Option<Value>);
}

/// Routes inbound requests and notifications by method name.
///
/// Reads (dispatching) and writes (registering) are both cheap and rare
/// relative to request volume, so a plain `RwLock` is enough.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, std::sync::Arc<dyn RequestHandler>>>,
    listeners: RwLock<HashMap<String, Vec<std::sync::Arc<dyn NotificationListener>>>>,
}

impl Dispatcher {
    /// Register (or replace) the handler for `method`.
    pub fn register_handler(
        &self,
        method: impl Into<String>,
        handler: std::sync::Arc<dyn RequestHandler>,
    ) {
        self.handlers.write().unwrap().insert(method.into(), handler);
    }

    /// Register an additional listener for `method`'s notifications.
    pub fn register_listener(
        &self,
        method: impl Into<String>,
        listener: std::sync::Arc<dyn NotificationListener>,
    ) {
        self.listeners
            .write()
            .unwrap()
            .entry(method.into())
            .or_default()
            .push(listener);
    }

    /// Dispatch an inbound request. `MethodNotFound` if nothing is
    /// registered for `method`.
    pub async fn dispatch_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> Result<Value, Error> {
        let handler = {
            let handlers = self.handlers.read().unwrap();
            handlers.get(method).cloned()
        };
        match handler {
            Some(handler) => handler.handle(params, ctx).await,
            None => Err(Error::new(
                ErrorKind::MethodNotFound,
                format!("no handler registered for method '{method}'"),
            )),
        }
    }

    /// Dispatch an inbound notification to every registered listener.
    /// Listener panics/errors never reach the peer.
    pub async fn dispatch_notification(&self, method: &str, params: Option<Value>) {
        let listeners = {
            let listeners = self.listeners.read().unwrap();
            listeners.get(method).cloned().unwrap_or_default()
        };
        for listener in listeners {
            let params = params.clone();
            listener.handle(params).await;
        }
    }

    /// Whether a handler is registered for `method`.
    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.read().unwrap().contains_key(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Cancellation, PeerFacilities};
    use protomcp_protocol::version::ProtocolVersion;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoopPeer;
    #[async_trait]
    impl PeerFacilities for NoopPeer {
        async fn notify(&self, _method: &str, _params: Option<Value>) {}
        async fn call(&self, _method: &str, _params: Option<Value>) -> Result<Value, Error> {
            Ok(Value::Null)
        }
    }

    fn test_ctx() -> RequestContext {
        RequestContext::new(
            None,
            Arc::new(NoopPeer),
            ProtocolVersion::PREFERRED,
            None,
            Cancellation::default(),
        )
    }

    struct Echo;
    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> Result<Value, Error> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let dispatcher = Dispatcher::default();
        dispatcher.register_handler("ping", Arc::new(Echo));
        let result = dispatcher
            .dispatch_request("ping", Some(serde_json::json!({"a": 1})), test_ctx())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let dispatcher = Dispatcher::default();
        let err = dispatcher
            .dispatch_request("nonexistent", None, test_ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MethodNotFound);
    }

    #[tokio::test]
    async fn notification_fans_out_to_all_listeners() {
        let dispatcher = Dispatcher::default();
        let count = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);
        #[async_trait]
        impl NotificationListener for Counter {
            async fn handle(&self, _params: Option<Value>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        dispatcher.register_listener("notifications/message", Arc::new(Counter(count.clone())));
        dispatcher.register_listener("notifications/message", Arc::new(Counter(count.clone())));
        dispatcher
            .dispatch_notification("notifications/message", None)
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
