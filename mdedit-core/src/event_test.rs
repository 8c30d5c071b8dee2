#[cfg(test)]
mod tests {
    use crate::error::{MdeditError, Result};
    use crate::event::{
        serialization, ClientEvent, ClientEventHandler, Event, EventBus, EventKind,
        InMemoryEventBus, KindFilter,
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct RecordingHandler {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                seen,
                fail: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl ClientEventHandler for RecordingHandler {
        async fn handle_event(&self, event: &ClientEvent) -> Result<()> {
            self.seen
                .lock()
                .await
                .push(format!("{}:{}", self.name, event.event_type()));
            if self.fail {
                return Err(MdeditError::plugin("handler refused event"));
            }
            Ok(())
        }

        fn handler_name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn test_event_creation_helpers() {
        let event = ClientEvent::sync_content("# Title");
        assert_eq!(event.event_type(), "sync_content");
        assert_eq!(event.kind(), EventKind::SyncContent);
        assert!(!event.is_token_event());

        let event = ClientEvent::store_admin_token("doc1", "secret");
        assert_eq!(event.event_type(), "store_admin_token");
        assert!(event.is_token_event());

        let event = ClientEvent::clear_admin_token("doc1");
        assert_eq!(event.kind(), EventKind::ClearAdminToken);
        assert!(event.is_token_event());
    }

    #[test]
    fn test_wire_format() {
        let event = ClientEvent::store_admin_token("doc1", "T");
        let json = serialization::serialize_event(&event).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "store_admin_token");
        assert_eq!(value["payload"]["slug"], "doc1");
        assert_eq!(value["payload"]["admin_token"], "T");

        let parsed =
            serialization::deserialize_event(r#"{"event":"sync_content","payload":{"content":"hi"}}"#)
                .unwrap();
        assert_eq!(parsed, ClientEvent::sync_content("hi"));
    }

    #[test]
    fn test_event_from_parts_accepts_prefixed_names() {
        let event = serialization::event_from_parts(
            "phx:clear_admin_token",
            serde_json::json!({ "slug": "doc1" }),
        )
        .unwrap();
        assert_eq!(event, ClientEvent::clear_admin_token("doc1"));

        let event =
            serialization::event_from_parts("copy_to_clipboard", serde_json::json!({ "text": "x" }))
                .unwrap();
        assert_eq!(event, ClientEvent::copy_to_clipboard("x"));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let result =
            serialization::event_from_parts("sync_content", serde_json::json!({ "body": "x" }));
        assert!(matches!(result, Err(MdeditError::Json(_))));

        let result = serialization::event_from_parts("unknown_event", serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_tokens_never_reach_logs() {
        let event = ClientEvent::store_admin_token("doc1", "super-secret");

        assert!(!format!("{:?}", event).contains("super-secret"));
        assert!(!serialization::format_event_for_log(&event).contains("super-secret"));
        assert!(!serialization::event_debug_string(&event).contains("super-secret"));
        assert!(serialization::format_event_for_log(&event).starts_with("STORE_ADMIN_TOKEN"));
    }

    #[tokio::test]
    async fn test_bus_routes_in_subscription_order_with_filters() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Arc::new(RecordingHandler::new("all", seen.clone())), None)
            .await
            .unwrap();
        bus.subscribe(
            Arc::new(RecordingHandler::new("sync", seen.clone())),
            Some(Box::new(KindFilter::only(EventKind::SyncContent))),
        )
        .await
        .unwrap();

        bus.publish(ClientEvent::sync_content("x")).await.unwrap();
        bus.publish(ClientEvent::clear_admin_token("doc")).await.unwrap();

        let seen = seen.lock().await.clone();
        assert_eq!(
            seen,
            vec![
                "all:sync_content".to_string(),
                "sync:sync_content".to_string(),
                "all:clear_admin_token".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            Arc::new(RecordingHandler::new("broken", seen.clone()).failing()),
            None,
        )
        .await
        .unwrap();
        bus.subscribe(Arc::new(RecordingHandler::new("ok", seen.clone())), None)
            .await
            .unwrap();

        assert!(bus.publish(ClientEvent::sync_content("x")).await.is_ok());
        assert_eq!(seen.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let id = bus
            .subscribe(Arc::new(RecordingHandler::new("h", seen.clone())), None)
            .await
            .unwrap();
        assert_eq!(bus.subscription_count().await, 1);

        bus.unsubscribe(id).await.unwrap();
        assert_eq!(bus.subscription_count().await, 0);

        // Removing twice is tolerated
        assert!(bus.unsubscribe(id).await.is_ok());

        bus.publish(ClientEvent::sync_content("x")).await.unwrap();
        assert!(seen.lock().await.is_empty());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = InMemoryEventBus::new();

        tokio_test::block_on(async {
            assert_eq!(bus.subscription_count().await, 0);
            assert!(bus
                .publish(ClientEvent::copy_to_clipboard("orphan"))
                .await
                .is_ok());
        });
    }
}
