//! Live updates pushed by the server.
//!
//! The host owns the transport; this module opens one connection through a
//! [`PushChannel`] and turns inbound event payloads into actions for the
//! application's dispatcher.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, DEFAULT_NAMESPACE, keys};
use crate::error::{Error, Result};

/// Field that marks a payload as an application event.
pub const EVENT_FIELD: &str = "event";

/// A host transport that delivers raw inbound payloads in arrival order.
pub trait PushChannel {
    fn open(&self, endpoint: &str) -> Result<Receiver<String>>;
}

/// An in-process channel: whatever is sent on the paired sender is delivered.
///
/// It can be opened once.
pub struct MemoryChannel {
    inbound: Mutex<Option<Receiver<String>>>,
}

impl MemoryChannel {
    pub fn new(capacity: usize) -> (Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let channel = Self {
            inbound: Mutex::new(Some(rx)),
        };
        (tx, channel)
    }
}

impl PushChannel for MemoryChannel {
    fn open(&self, endpoint: &str) -> Result<Receiver<String>> {
        let mut guard = self
            .inbound
            .lock()
            .map_err(|_| Error::Push("memory channel lock poisoned".into()))?;
        guard
            .take()
            .ok_or_else(|| Error::Push(format!("{endpoint}: channel already open")))
    }
}

/// Subscription settings resolved from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveUpdates {
    endpoint: Option<String>,
}

impl LiveUpdates {
    /// Blank endpoints disable live updates.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
        }
    }

    /// Read the endpoint from the `websocket` key.
    pub fn from_config(config: &ClientConfig) -> Self {
        let endpoint = config
            .get_value(keys::WEBSOCKET, DEFAULT_NAMESPACE)
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::new(endpoint)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Open the push connection and start forwarding events.
    ///
    /// Does nothing and returns `Ok(None)` when no endpoint is configured.
    /// Otherwise spawns one task on the current tokio runtime; it finishes
    /// when the channel closes or `dispatch` is dropped, yielding the number
    /// of actions delivered.
    pub fn subscribe<C, A, F>(
        &self,
        channel: &C,
        dispatch: Sender<A>,
        action: F,
    ) -> Result<Option<JoinHandle<usize>>>
    where
        C: PushChannel + ?Sized,
        A: Send + 'static,
        F: Fn(&Value) -> A + Send + 'static,
    {
        let Some(endpoint) = self.endpoint() else {
            log::debug!("no push endpoint configured, live updates disabled");
            return Ok(None);
        };
        let inbound = channel.open(endpoint)?;
        log::debug!("push channel open: {endpoint}");
        Ok(Some(tokio::spawn(run_subscriber(inbound, dispatch, action))))
    }
}

/// Forward event payloads from `inbound` to `dispatch` until either side closes.
///
/// Payloads that are not JSON are logged and dropped; JSON without a
/// truthy `event` field is ignored.
pub async fn run_subscriber<A, F>(mut inbound: Receiver<String>, dispatch: Sender<A>, action: F) -> usize
where
    F: Fn(&Value) -> A,
{
    let mut delivered = 0;

    while let Some(raw) = inbound.recv().await {
        let data: Value = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("dropping malformed push payload: {e}");
                continue;
            }
        };

        if !data.get(EVENT_FIELD).is_some_and(is_truthy) {
            log::debug!("ignoring push payload without event");
            continue;
        }

        if dispatch.send(action(&data)).await.is_err() {
            log::debug!("dispatcher closed, ending push subscription");
            break;
        }
        delivered += 1;
    }

    delivered
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum Action {
        Push(String),
    }

    fn to_action(data: &Value) -> Action {
        Action::Push(data[EVENT_FIELD].as_str().unwrap_or("?").to_string())
    }

    fn enabled() -> LiveUpdates {
        LiveUpdates::new(Some("ws://localhost:5100".to_string()))
    }

    #[test]
    fn test_from_config() {
        let cfg = ClientConfig::from_default_namespace(json!({ "websocket": "ws://push:5100" }));
        assert_eq!(LiveUpdates::from_config(&cfg).endpoint(), Some("ws://push:5100"));

        let blank = ClientConfig::from_default_namespace(json!({ "websocket": " " }));
        assert!(!LiveUpdates::from_config(&blank).is_enabled());
        assert!(!LiveUpdates::from_config(&ClientConfig::new()).is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_subscription_does_not_open_channel() {
        let (_tx, channel) = MemoryChannel::new(4);
        let (dispatch, _rx) = mpsc::channel::<Action>(4);
        let handle = LiveUpdates::default()
            .subscribe(&channel, dispatch, to_action)
            .unwrap();
        assert!(handle.is_none());
        // still unopened, so the first real open succeeds
        assert!(channel.open("ws://x").is_ok());
    }

    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        let (tx, channel) = MemoryChannel::new(8);
        let (dispatch, mut actions) = mpsc::channel(8);
        let handle = enabled()
            .subscribe(&channel, dispatch, to_action)
            .unwrap()
            .unwrap();

        tx.send(r#"{"event": "new_item", "extra": {"_items": []}}"#.to_string())
            .await
            .unwrap();
        tx.send(r#"{"event": "topics"}"#.to_string()).await.unwrap();
        drop(tx);

        assert_eq!(actions.recv().await, Some(Action::Push("new_item".into())));
        assert_eq!(actions.recv().await, Some(Action::Push("topics".into())));
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_malformed_and_unmarked_payloads_are_skipped() {
        let (tx, channel) = MemoryChannel::new(8);
        let (dispatch, mut actions) = mpsc::channel(8);
        let handle = enabled()
            .subscribe(&channel, dispatch, to_action)
            .unwrap()
            .unwrap();

        for raw in [
            "not json",
            r#"{"data": 1}"#,
            r#"{"event": ""}"#,
            r#"{"event": null}"#,
            r#"{"event": "kept"}"#,
        ] {
            tx.send(raw.to_string()).await.unwrap();
        }
        drop(tx);

        assert_eq!(actions.recv().await, Some(Action::Push("kept".into())));
        assert_eq!(actions.recv().await, None);
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_channel_opens_once() {
        let (_tx, channel) = MemoryChannel::new(1);
        let (dispatch, _actions) = mpsc::channel::<Action>(1);
        let _handle = enabled().subscribe(&channel, dispatch.clone(), to_action).unwrap();
        assert!(enabled().subscribe(&channel, dispatch, to_action).is_err());
    }

    #[tokio::test]
    async fn test_subscription_ends_when_dispatcher_drops() {
        let (tx, channel) = MemoryChannel::new(4);
        let (dispatch, actions) = mpsc::channel::<Action>(4);
        let handle = enabled()
            .subscribe(&channel, dispatch, to_action)
            .unwrap()
            .unwrap();
        drop(actions);
        tx.send(r#"{"event": "late"}"#.to_string()).await.unwrap();
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
    }
}
