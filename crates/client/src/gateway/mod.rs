//! Shared HTTP gateway for the ActaLog API
//!
//! Every outbound call goes through [`Gateway::send`]. The gateway attaches the
//! current access token and, when the server answers 401, renews the token once
//! on behalf of all concurrently failing requests before replaying them.

pub mod renewal;

use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::ClientError;
use crate::navigator::{LOGIN_ROUTE, LogNavigator, Navigator};
use crate::storage::{
    MemoryStorage, REFRESH_TOKEN_KEY, SessionPersistence, TOKEN_KEY, USER_KEY,
};
use crate::types::{AuthResponse, RefreshTokenRequest, User};
use renewal::{RenewalCoordinator, RenewalGuard, Ticket};
use reqwest::{Client, ClientBuilder, Method, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Notified whenever the gateway changes the session behind the caller's back
pub trait SessionObserver: Send + Sync {
    /// A renewal stored a new access token and user
    fn session_renewed(&self, token: &str, user: &User);

    /// The session was irrecoverably ended and its persisted state removed
    fn session_cleared(&self);
}

/// A request to the ActaLog API
///
/// Unlike a `reqwest::RequestBuilder` this can be replayed after a renewal.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<String>,
    renewable: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            renewable: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Surface a 401 directly instead of renewing the session.
    ///
    /// Used for credential endpoints, where a 401 means bad credentials rather
    /// than an expired access token.
    pub fn without_renewal(mut self) -> Self {
        self.renewable = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this request was already replayed after a renewal
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Shared ActaLog API client
///
/// Cheap to clone; all clones share the renewal state.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: String,
    storage: Arc<dyn SessionPersistence>,
    navigator: Arc<dyn Navigator>,
    default_token: RwLock<Option<String>>,
    observers: RwLock<Vec<Weak<dyn SessionObserver>>>,
    renewal: RenewalCoordinator,
}

impl Gateway {
    /// Create a gateway with in-memory storage
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new gateway builder
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Persisted session record shared with the session store
    pub fn storage(&self) -> &Arc<dyn SessionPersistence> {
        &self.inner.storage
    }

    /// Token attached when nothing is persisted
    pub fn default_token(&self) -> Option<String> {
        self.inner
            .default_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set or remove the default outbound `Authorization` header
    pub fn set_default_token(&self, token: Option<&str>) {
        *self
            .inner
            .default_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.map(str::to_string);
    }

    /// Token the next request will carry
    pub fn current_token(&self) -> Option<String> {
        self.inner
            .storage
            .get(TOKEN_KEY)
            .or_else(|| self.default_token())
    }

    /// Register an observer of renewals and forced logouts.
    ///
    /// The gateway holds the observer weakly: it is notified for as long as
    /// the caller keeps its `Arc` alive and forgotten afterwards.
    pub fn observe(&self, observer: &Arc<dyn SessionObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(observer));
    }

    /// Whether a token renewal is in flight
    pub fn is_renewing(&self) -> bool {
        self.inner.renewal.in_progress()
    }

    /// Send a request, renewing the access token once if the server rejects it.
    ///
    /// Returns the response when its status is a success, otherwise the error
    /// derived from the status and body.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let token = self.current_token();
        let response = self.dispatch(&request, token.as_deref()).await?;

        match Self::check(response).await {
            Err(failure)
                if failure.is_unauthorized() && request.renewable && !request.retried =>
            {
                self.recover(request, failure).await
            }
            other => other,
        }
    }

    /// Send a request and decode its JSON body
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.inner.base_url, request.path);
        let mut builder = self.inner.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(
            method = %request.method,
            path = %request.path,
            authorized = token.is_some(),
            retried = request.retried,
            "Dispatching request"
        );
        Ok(builder.send().await?)
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%status, "Failed to read error response body: {e}");
                    String::new()
                }
            };
            Err(ClientError::from_body(status, &body))
        }
    }

    async fn recover(
        &self,
        mut request: ApiRequest,
        failure: ClientError,
    ) -> Result<Response, ClientError> {
        if request.path == endpoints::REFRESH {
            warn!("Refresh token was rejected, ending session");
            self.end_session();
            return Err(failure);
        }

        request.retried = true;
        let token = match self.inner.renewal.join() {
            Ticket::Waiter(waiter) => {
                debug!(path = %request.path, "Waiting for in-flight session renewal");
                waiter.outcome().await?
            }
            Ticket::Leader(guard) => self.renew(guard, failure).await?,
        };

        let response = self.dispatch(&request, Some(&token)).await?;
        Self::check(response).await
    }

    async fn renew(
        &self,
        guard: RenewalGuard<'_>,
        failure: ClientError,
    ) -> Result<String, ClientError> {
        let Some(refresh_token) = self.inner.storage.get(REFRESH_TOKEN_KEY) else {
            info!("Access token rejected and no refresh token stored, ending session");
            self.end_session();
            let failure = Arc::new(failure);
            guard.settle(Err(Arc::clone(&failure)));
            return Err(ClientError::RenewalFailed(failure));
        };

        info!("Access token rejected, renewing session");
        match self.request_renewal(refresh_token).await {
            Ok(auth) => {
                self.store_renewal(&auth);
                let released = guard.settle(Ok(auth.token.clone()));
                info!(user_id = auth.user.id, released, "Session renewed");
                Ok(auth.token)
            }
            Err(error) => {
                warn!("Session renewal failed: {error}");
                self.end_session();
                let error = Arc::new(error);
                let released = guard.settle(Err(Arc::clone(&error)));
                debug!(released, "Released requests waiting on failed renewal");
                Err(ClientError::RenewalFailed(error))
            }
        }
    }

    async fn request_renewal(&self, refresh_token: String) -> Result<AuthResponse, ClientError> {
        let request = ApiRequest::post(endpoints::REFRESH)
            .json(&RefreshTokenRequest { refresh_token })?
            .without_renewal();
        let response = self.dispatch(&request, None).await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn store_renewal(&self, auth: &AuthResponse) {
        let storage = &self.inner.storage;
        storage.set(TOKEN_KEY, &auth.token);
        match serde_json::to_string(&auth.user) {
            Ok(user) => storage.set(USER_KEY, &user),
            Err(e) => warn!("Failed to serialize renewed user: {e}"),
        }
        self.set_default_token(Some(&auth.token));

        for observer in self.observers() {
            observer.session_renewed(&auth.token, &auth.user);
        }
    }

    /// Drop every trace of the session and send the user to the login route
    fn end_session(&self) {
        self.inner.storage.clear_session();
        self.set_default_token(None);

        for observer in self.observers() {
            observer.session_cleared();
        }
        self.inner.navigator.navigate(LOGIN_ROUTE);
    }

    /// Live observers; entries whose owner was dropped are pruned
    fn observers(&self) -> Vec<Arc<dyn SessionObserver>> {
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        observers.retain(|observer| observer.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.base_url)
            .field("renewing", &self.is_renewing())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Gateway`]
#[derive(Default)]
pub struct GatewayBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    storage: Option<Arc<dyn SessionPersistence>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl GatewayBuilder {
    /// Take base URL, timeout and user agent from a loaded configuration
    pub fn config(self, config: &ClientConfig) -> Self {
        self.base_url(config.base_url.clone())
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the session persistence; defaults to [`MemoryStorage`]
    pub fn storage(mut self, storage: Arc<dyn SessionPersistence>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the navigator; defaults to [`LogNavigator`]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<Gateway, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let timeout = self
            .timeout
            .unwrap_or_else(|| ClientConfig::default().timeout());
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| ClientConfig::default().user_agent);

        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Gateway {
            inner: Arc::new(Inner {
                client,
                base_url,
                storage: self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
                navigator: self.navigator.unwrap_or_else(|| Arc::new(LogNavigator)),
                default_token: RwLock::new(None),
                observers: RwLock::new(Vec::new()),
                renewal: RenewalCoordinator::new(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::RecordingNavigator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct CountingObserver {
        cleared: AtomicUsize,
    }

    impl SessionObserver for CountingObserver {
        fn session_renewed(&self, _token: &str, _user: &User) {}

        fn session_cleared(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = Gateway::builder().build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let gateway = Gateway::new("http://localhost:8080/").unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_persisted_token_wins_over_default() {
        let gateway = Gateway::new("http://localhost:8080").unwrap();
        assert_eq!(gateway.current_token(), None);

        gateway.set_default_token(Some("default"));
        assert_eq!(gateway.current_token().as_deref(), Some("default"));

        gateway.storage().set(TOKEN_KEY, "persisted");
        assert_eq!(gateway.current_token().as_deref(), Some("persisted"));

        gateway.storage().remove(TOKEN_KEY);
        gateway.set_default_token(None);
        assert_eq!(gateway.current_token(), None);
    }

    #[test]
    fn test_request_flags() {
        let request = ApiRequest::get("/api/workouts").query("limit", "5");
        assert!(request.renewable);
        assert!(!request.is_retried());
        assert_eq!(request.method(), &Method::GET);

        let request = ApiRequest::post(endpoints::LOGIN).without_renewal();
        assert!(!request.renewable);
        assert_eq!(request.path(), "/api/auth/login");
    }

    #[test]
    fn test_dropped_observers_are_forgotten() {
        let navigator = Arc::new(RecordingNavigator::new());
        let gateway = Gateway::builder()
            .base_url("http://localhost:8080")
            .navigator(navigator.clone())
            .build()
            .unwrap();

        let kept = Arc::new(CountingObserver::default());
        let registered: Arc<dyn SessionObserver> = kept.clone();
        gateway.observe(&registered);
        {
            let gone: Arc<dyn SessionObserver> = Arc::new(CountingObserver::default());
            gateway.observe(&gone);
        }
        assert_eq!(gateway.inner.observers.read().unwrap().len(), 2);

        gateway.end_session();

        assert_eq!(kept.cleared.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.inner.observers.read().unwrap().len(), 1);
        assert_eq!(navigator.routes(), vec![LOGIN_ROUTE.to_string()]);
    }

    #[tokio::test]
    async fn test_truncated_error_body_falls_back_to_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
            while socket.read(&mut buf).await.is_ok_and(|read| read > 0) {}
        });

        let gateway = Gateway::new(format!("http://{addr}")).unwrap();
        let error = gateway
            .send(ApiRequest::get("/api/workouts"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ClientError::ServerError { status: 500, ref message } if message == "500 Internal Server Error"
        ));
    }
}
