//! Event system for decoupled delivery of inbound server events

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{MdeditError, Result};

/// Wire encoding of client events for the socket layer, logs and replay scripts
pub mod serialization {
    use super::*;

    /// Serialize an event to its wire form, `{"event": ..., "payload": ...}`
    pub fn serialize_event(event: &ClientEvent) -> Result<String> {
        serde_json::to_string(event).map_err(MdeditError::Json)
    }

    /// Deserialize an event from its wire form
    pub fn deserialize_event(json: &str) -> Result<ClientEvent> {
        serde_json::from_str(json).map_err(MdeditError::Json)
    }

    /// Build an event from a transport-level event name and its JSON payload
    pub fn event_from_parts(name: &str, payload: serde_json::Value) -> Result<ClientEvent> {
        let name = name.strip_prefix("phx:").unwrap_or(name);
        let wire = serde_json::json!({ "event": name, "payload": payload });
        serde_json::from_value(wire).map_err(MdeditError::Json)
    }

    /// Format event for logging, never including credential values
    pub fn format_event_for_log(event: &ClientEvent) -> String {
        format!(
            "{}: {}",
            event.event_type().to_uppercase(),
            event.description()
        )
    }

    /// Create a compact event representation for debugging
    pub fn event_debug_string(event: &ClientEvent) -> String {
        let mut metadata: Vec<_> = event.metadata().into_iter().collect();
        metadata.sort();

        if metadata.is_empty() {
            return event.description();
        }

        format!(
            "{} ({})",
            event.description(),
            metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Core trait for events flowing through the client
pub trait Event: Send + Sync + Clone + std::fmt::Debug + 'static {
    /// Get the event type identifier
    fn event_type(&self) -> &str;

    /// Get event metadata
    fn metadata(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Events pushed by the server over the live connection
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Authoritative full-content snapshot of the open document
    SyncContent { content: String },
    /// Capability token granted for a document
    StoreAdminToken { slug: String, admin_token: String },
    /// Capability token revoked for a document
    ClearAdminToken { slug: String },
    /// Text the server wants placed on the clipboard
    CopyToClipboard { text: String },
}

// Tokens must not end up in logs through `{:?}`.
impl std::fmt::Debug for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEvent::SyncContent { content } => f
                .debug_struct("SyncContent")
                .field("content_len", &content.len())
                .finish(),
            ClientEvent::StoreAdminToken { slug, .. } => f
                .debug_struct("StoreAdminToken")
                .field("slug", slug)
                .field("admin_token", &"[REDACTED]")
                .finish(),
            ClientEvent::ClearAdminToken { slug } => f
                .debug_struct("ClearAdminToken")
                .field("slug", slug)
                .finish(),
            ClientEvent::CopyToClipboard { text } => f
                .debug_struct("CopyToClipboard")
                .field("text_len", &text.len())
                .finish(),
        }
    }
}

/// Discriminant of [`ClientEvent`], used for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SyncContent,
    StoreAdminToken,
    ClearAdminToken,
    CopyToClipboard,
}

impl Event for ClientEvent {
    fn event_type(&self) -> &str {
        match self {
            ClientEvent::SyncContent { .. } => "sync_content",
            ClientEvent::StoreAdminToken { .. } => "store_admin_token",
            ClientEvent::ClearAdminToken { .. } => "clear_admin_token",
            ClientEvent::CopyToClipboard { .. } => "copy_to_clipboard",
        }
    }

    fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();

        match self {
            ClientEvent::SyncContent { content } => {
                metadata.insert("content_len".to_string(), content.len().to_string());
            }
            ClientEvent::StoreAdminToken { slug, .. } => {
                metadata.insert("slug".to_string(), slug.clone());
            }
            ClientEvent::ClearAdminToken { slug } => {
                metadata.insert("slug".to_string(), slug.clone());
            }
            ClientEvent::CopyToClipboard { text } => {
                metadata.insert("text_len".to_string(), text.len().to_string());
            }
        }

        metadata
    }
}

impl ClientEvent {
    /// Create a new content snapshot event
    pub fn sync_content(content: impl Into<String>) -> Self {
        Self::SyncContent {
            content: content.into(),
        }
    }

    /// Create a new token grant event
    pub fn store_admin_token(slug: impl Into<String>, admin_token: impl Into<String>) -> Self {
        Self::StoreAdminToken {
            slug: slug.into(),
            admin_token: admin_token.into(),
        }
    }

    /// Create a new token revoke event
    pub fn clear_admin_token(slug: impl Into<String>) -> Self {
        Self::ClearAdminToken { slug: slug.into() }
    }

    /// Create a new clipboard copy event
    pub fn copy_to_clipboard(text: impl Into<String>) -> Self {
        Self::CopyToClipboard { text: text.into() }
    }

    /// Get the kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::SyncContent { .. } => EventKind::SyncContent,
            ClientEvent::StoreAdminToken { .. } => EventKind::StoreAdminToken,
            ClientEvent::ClearAdminToken { .. } => EventKind::ClearAdminToken,
            ClientEvent::CopyToClipboard { .. } => EventKind::CopyToClipboard,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ClientEvent::SyncContent { content } => {
                format!("Content snapshot of {} bytes", content.len())
            }
            ClientEvent::StoreAdminToken { slug, .. } => {
                format!("Admin token granted for document: {}", slug)
            }
            ClientEvent::ClearAdminToken { slug } => {
                format!("Admin token revoked for document: {}", slug)
            }
            ClientEvent::CopyToClipboard { text } => {
                format!("Copy {} bytes to clipboard", text.len())
            }
        }
    }

    /// Check if this event carries capability token state
    pub fn is_token_event(&self) -> bool {
        matches!(
            self,
            ClientEvent::StoreAdminToken { .. } | ClientEvent::ClearAdminToken { .. }
        )
    }
}

/// Handler for inbound client events
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// Handle an incoming event
    async fn handle_event(&self, event: &ClientEvent) -> Result<()>;

    /// Get handler name for debugging
    fn handler_name(&self) -> &str {
        "UnnamedClientEventHandler"
    }
}

/// Filter deciding whether an event should be delivered to a handler
pub trait EventFilter: Send + Sync {
    /// Check if the event should be delivered to the handler
    fn should_handle(&self, event: &ClientEvent) -> bool;

    /// Get filter name for debugging
    fn filter_name(&self) -> &str {
        "UnnamedFilter"
    }
}

/// Filter that accepts only the listed event kinds
#[derive(Debug, Clone)]
pub struct KindFilter {
    kinds: Vec<EventKind>,
}

impl KindFilter {
    pub fn new(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn only(kind: EventKind) -> Self {
        Self { kinds: vec![kind] }
    }
}

impl EventFilter for KindFilter {
    fn should_handle(&self, event: &ClientEvent) -> bool {
        self.kinds.contains(&event.kind())
    }

    fn filter_name(&self) -> &str {
        "kind-filter"
    }
}

/// Event bus for publishing and subscribing to client events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to all matching subscribers
    async fn publish(&self, event: ClientEvent) -> Result<()>;

    /// Subscribe a handler with optional filtering
    async fn subscribe(
        &self,
        handler: Arc<dyn ClientEventHandler>,
        filter: Option<Box<dyn EventFilter>>,
    ) -> Result<SubscriptionId>;

    /// Unsubscribe from events
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Get the number of active subscriptions
    async fn subscription_count(&self) -> usize;
}

/// Unique identifier for event subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Subscription information stored in the event bus
struct Subscription {
    handler: Arc<dyn ClientEventHandler>,
    filter: Option<Arc<dyn EventFilter>>,
}

/// In-memory event bus delivering to handlers in subscription order
pub struct InMemoryEventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    order: RwLock<Vec<SubscriptionId>>,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Route an event to all matching subscribers
    async fn route_event(&self, event: &ClientEvent) -> Result<()> {
        // Handlers may subscribe or unsubscribe while handling, so no lock is
        // held across their await points.
        let targets: Vec<Arc<dyn ClientEventHandler>> = {
            let order = self.order.read().await;
            let subscriptions = self.subscriptions.read().await;
            order
                .iter()
                .filter_map(|id| subscriptions.get(id))
                .filter(|sub| {
                    sub.filter
                        .as_ref()
                        .map(|filter| filter.should_handle(event))
                        .unwrap_or(true)
                })
                .map(|sub| sub.handler.clone())
                .collect()
        };

        if targets.is_empty() {
            tracing::trace!("No subscribers for event type: {}", event.event_type());
            return Ok(());
        }

        let mut handlers_called = 0;
        for handler in targets {
            if let Err(e) = handler.handle_event(event).await {
                tracing::error!(
                    "Handler {} failed to process event {}: {}",
                    handler.handler_name(),
                    event.event_type(),
                    e
                );
            } else {
                handlers_called += 1;
                tracing::trace!(
                    "Handler {} processed event {}",
                    handler.handler_name(),
                    event.event_type()
                );
            }
        }

        tracing::debug!(
            "Routed event {} to {} handlers",
            event.event_type(),
            handlers_called
        );

        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: ClientEvent) -> Result<()> {
        tracing::debug!(
            "Publishing event: {}",
            serialization::event_debug_string(&event)
        );
        self.route_event(&event).await
    }

    async fn subscribe(
        &self,
        handler: Arc<dyn ClientEventHandler>,
        filter: Option<Box<dyn EventFilter>>,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId::new();

        tracing::debug!(
            "Created subscription {:?} for handler {} (filter: {})",
            id,
            handler.handler_name(),
            filter
                .as_ref()
                .map(|f| f.filter_name().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let subscription = Subscription {
            handler,
            filter: filter.map(Arc::from),
        };

        self.subscriptions.write().await.insert(id, subscription);
        self.order.write().await.push(id);

        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let removed = self.subscriptions.write().await.remove(&id);

        if removed.is_some() {
            self.order.write().await.retain(|&sub_id| sub_id != id);
            tracing::debug!("Removed subscription: {:?}", id);
        } else {
            tracing::warn!("Attempted to remove non-existent subscription: {:?}", id);
        }

        Ok(())
    }

    async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}
