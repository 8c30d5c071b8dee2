//! Live connection handle and connection parameters
//!
//! The socket owns no transport logic of its own. It decides *what* is sent
//! on every connect attempt (endpoint plus freshly computed parameters) and
//! delegates the wire work to a [`Transport`].

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SocketConfig;
use crate::error::{MdeditError, Result};

/// Parameter key of the replay-protection token
pub const CSRF_TOKEN_PARAM: &str = "_csrf_token";

/// Parameter key of the document capability token
pub const ADMIN_TOKEN_PARAM: &str = "admin_token";

const REDACTED_PARAMS: [&str; 2] = [CSRF_TOKEN_PARAM, ADMIN_TOKEN_PARAM];

/// Parameters sent with a connection handshake
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectParams(BTreeMap<String, String>);

impl ConnectParams {
    /// Base parameters; the replay-protection token is always present
    pub fn new(csrf_token: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert(CSRF_TOKEN_PARAM.to_string(), csrf_token.into());
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.get(CSRF_TOKEN_PARAM)
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.get(ADMIN_TOKEN_PARAM)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if REDACTED_PARAMS.contains(&key.as_str()) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// Source of connection parameters, consulted on every connect attempt
pub trait ParamsProvider: Send + Sync {
    /// Augment the base parameters for the given navigation path
    fn connect_params(&self, path: &str, base: ConnectParams) -> ConnectParams;
}

/// Provider that sends the base parameters unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseParams;

impl ParamsProvider for BaseParams {
    fn connect_params(&self, _path: &str, base: ConnectParams) -> ConnectParams {
        base
    }
}

/// Everything a transport needs to open one connection
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub params: ConnectParams,
    pub long_poll_fallback: Duration,
    /// 1-based attempt number within this socket's lifetime
    pub attempt: u32,
}

/// Wire-level connection, implemented outside this crate
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &ConnectRequest) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected { attempt: u32 },
}

/// Explicit handle to the client's live connection
pub struct LiveSocket {
    endpoint: String,
    long_poll_fallback: Duration,
    csrf_token: String,
    path: RwLock<String>,
    provider: Arc<dyn ParamsProvider>,
    transport: Arc<dyn Transport>,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
}

impl LiveSocket {
    /// Create a disconnected socket
    pub fn new(
        config: &SocketConfig,
        csrf_token: impl Into<String>,
        path: impl Into<String>,
        provider: Arc<dyn ParamsProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            long_poll_fallback: Duration::from_millis(config.long_poll_fallback_ms),
            csrf_token: csrf_token.into(),
            path: RwLock::new(path.into()),
            provider,
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn current_path(&self) -> String {
        self.path.read().clone()
    }

    /// Record client-side navigation; later attempts use the new path
    pub fn navigate(&self, path: impl Into<String>) {
        let path = path.into();
        tracing::debug!("Navigated to {}", path);
        *self.path.write() = path;
    }

    /// Compute parameters for the current path. Never cached.
    pub fn params(&self) -> ConnectParams {
        let path = self.current_path();
        self.provider
            .connect_params(&path, ConnectParams::new(self.csrf_token.clone()))
    }

    /// Open the connection with freshly computed parameters
    pub async fn connect(&self) -> Result<ConnectParams> {
        if let ConnectionState::Connected { attempt } = self.state() {
            return Err(MdeditError::connection(format!(
                "Socket already connected (attempt {})",
                attempt
            )));
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let request = ConnectRequest {
            endpoint: self.endpoint.clone(),
            params: self.params(),
            long_poll_fallback: self.long_poll_fallback,
            attempt,
        };

        tracing::debug!(
            "Connecting to {} (attempt {}) with params {:?}",
            request.endpoint,
            attempt,
            request.params
        );

        self.transport.open(&request).await.map_err(|e| {
            MdeditError::connection(format!(
                "Failed to connect to {} (attempt {}): {}",
                request.endpoint, attempt, e
            ))
        })?;

        *self.state.write() = ConnectionState::Connected { attempt };
        tracing::info!("Connected to {} (attempt {})", request.endpoint, attempt);
        Ok(request.params)
    }

    /// Drop the current connection, if any, and connect again
    pub async fn reconnect(&self) -> Result<ConnectParams> {
        if self.is_connected() {
            self.disconnect().await?;
        }
        self.connect().await
    }

    /// Close the connection; closing a closed socket is a no-op
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        self.transport.close().await?;
        *self.state.write() = ConnectionState::Disconnected;
        tracing::info!("Disconnected from {}", self.endpoint);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected { .. })
    }

    /// Number of connect attempts made so far, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        opened: Mutex<Vec<ConnectRequest>>,
        closes: AtomicU32,
        fail_next: Mutex<bool>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn open(&self, request: &ConnectRequest) -> Result<()> {
            if std::mem::take(&mut *self.fail_next.lock()) {
                return Err(MdeditError::connection("refused"));
            }
            self.opened.lock().push(request.clone());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Provider tagging params with the path it was asked about
    struct PathEcho;

    impl ParamsProvider for PathEcho {
        fn connect_params(&self, path: &str, base: ConnectParams) -> ConnectParams {
            base.with("path", path)
        }
    }

    fn socket(transport: Arc<RecordingTransport>) -> LiveSocket {
        LiveSocket::new(
            &SocketConfig::default(),
            "csrf-1",
            "/editor/doc1",
            Arc::new(PathEcho),
            transport,
        )
    }

    #[test]
    fn test_connect_params_always_carry_csrf_token() {
        let params = ConnectParams::new("abc");
        assert_eq!(params.csrf_token(), Some("abc"));
        assert_eq!(params.admin_token(), None);
        assert_eq!(params.len(), 1);

        let params = BaseParams.connect_params("/anything", params.clone());
        assert_eq!(params, ConnectParams::new("abc"));
    }

    #[test]
    fn test_params_debug_is_redacted() {
        let params = ConnectParams::new("csrf-secret").with(ADMIN_TOKEN_PARAM, "admin-secret");
        let debug = format!("{:?}", params);
        assert!(!debug.contains("csrf-secret"));
        assert!(!debug.contains("admin-secret"));
        assert!(debug.contains(ADMIN_TOKEN_PARAM));
    }

    #[tokio::test]
    async fn test_connect_sends_fresh_params() {
        let transport = Arc::new(RecordingTransport::default());
        let socket = socket(transport.clone());

        let params = socket.connect().await.unwrap();
        assert_eq!(params.get("path"), Some("/editor/doc1"));
        assert_eq!(socket.state(), ConnectionState::Connected { attempt: 1 });

        socket.navigate("/editor/doc2");
        let params = socket.reconnect().await.unwrap();
        assert_eq!(params.get("path"), Some("/editor/doc2"));
        assert_eq!(socket.attempts(), 2);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);

        let opened = transport.opened.lock();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[0].endpoint, "/live");
        assert_eq!(opened[0].long_poll_fallback, Duration::from_millis(2500));
        assert_eq!(opened[1].attempt, 2);
    }

    #[tokio::test]
    async fn test_double_connect_is_rejected() {
        let socket = socket(Arc::new(RecordingTransport::default()));
        socket.connect().await.unwrap();
        assert!(matches!(
            socket.connect().await,
            Err(MdeditError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let transport = Arc::new(RecordingTransport::default());
        *transport.fail_next.lock() = true;
        let socket = socket(transport.clone());

        assert!(socket.connect().await.is_err());
        assert_eq!(socket.state(), ConnectionState::Disconnected);
        assert_eq!(socket.attempts(), 1);

        socket.connect().await.unwrap();
        assert_eq!(socket.state(), ConnectionState::Connected { attempt: 2 });
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let transport = Arc::new(RecordingTransport::default());
        let socket = socket(transport.clone());

        socket.disconnect().await.unwrap();
        socket.connect().await.unwrap();
        socket.disconnect().await.unwrap();
        socket.disconnect().await.unwrap();

        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert!(!socket.is_connected());
    }
}
