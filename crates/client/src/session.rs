//! Authentication state and its lifecycle operations
//!
//! [`SessionStore`] is the authoritative record of who is logged in. Every
//! change of the in-memory [`Session`] is paired with the matching write to the
//! gateway's persisted storage. Operations never return an error: they report
//! success as a `bool` and leave a displayable message in [`Session::error`].

use crate::endpoints;
use crate::error::ClientError;
use crate::gateway::{ApiRequest, Gateway, SessionObserver};
use crate::storage::{REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use crate::types::{
    AuthResponse, LoginRequest, ProfileResponse, RefreshTokenRequest, RegisterRequest,
    UpdateProfileRequest, User,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Snapshot of the authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    /// An operation is in progress
    pub loading: bool,
    /// Message of the last failed operation
    pub error: Option<String>,
}

impl Session {
    /// Both an access token and a user are present
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}

#[derive(Debug, Default)]
struct CellState {
    session: Session,
    busy: usize,
}

/// In-memory session shared with the gateway
#[derive(Debug, Default)]
struct SessionCell {
    state: Mutex<CellState>,
}

impl SessionCell {
    fn new(session: Session) -> Self {
        Self {
            state: Mutex::new(CellState { session, busy: 0 }),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state.session)
    }

    fn snapshot(&self) -> Session {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .session
            .clone()
    }

    fn clear_credentials(&self) {
        self.update(|session| {
            session.user = None;
            session.token = None;
            session.refresh_token = None;
        });
    }
}

impl SessionObserver for SessionCell {
    fn session_renewed(&self, token: &str, user: &User) {
        self.update(|session| {
            session.token = Some(token.to_string());
            session.user = Some(user.clone());
        });
    }

    fn session_cleared(&self) {
        self.clear_credentials();
    }
}

/// Marks the store as loading until dropped
struct Busy<'a> {
    cell: &'a SessionCell,
}

impl<'a> Busy<'a> {
    fn begin(cell: &'a SessionCell) -> Self {
        let mut state = cell.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.busy += 1;
        state.session.loading = true;
        state.session.error = None;
        drop(state);
        Self { cell }
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut state = self.cell.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.busy = state.busy.saturating_sub(1);
        state.session.loading = state.busy > 0;
    }
}

/// Authoritative record of the logged-in user
#[derive(Debug, Clone)]
pub struct SessionStore {
    gateway: Gateway,
    cell: Arc<SessionCell>,
}

impl SessionStore {
    /// Create the store and hydrate it from the gateway's persisted storage.
    ///
    /// The user is restored only when both a user record and an access token
    /// are persisted. A user record that cannot be decoded ends the session.
    pub async fn init(gateway: Gateway) -> Self {
        let storage = gateway.storage();
        let session = Session {
            token: storage.get(TOKEN_KEY),
            refresh_token: storage.get(REFRESH_TOKEN_KEY),
            ..Session::default()
        };
        let saved_user = storage.get(USER_KEY);

        let store = Self {
            gateway: gateway.clone(),
            cell: Arc::new(SessionCell::new(session)),
        };
        let observer: Arc<dyn SessionObserver> = store.cell.clone();
        gateway.observe(&observer);

        if let (Some(saved_user), Some(token)) = (saved_user, store.token()) {
            match serde_json::from_str::<User>(&saved_user) {
                Ok(user) => {
                    debug!(user_id = user.id, "Restored persisted session");
                    store.cell.update(|session| session.user = Some(user));
                    gateway.set_default_token(Some(&token));
                }
                Err(e) => {
                    warn!("Persisted user is corrupted, ending session: {e}");
                    store.logout().await;
                }
            }
        }

        store
    }

    /// The gateway this store authenticates
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> Session {
        self.cell.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.snapshot().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.cell.snapshot().user
    }

    pub fn token(&self) -> Option<String> {
        self.cell.snapshot().token
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.cell.snapshot().refresh_token
    }

    pub fn error(&self) -> Option<String> {
        self.cell.snapshot().error
    }

    pub fn is_loading(&self) -> bool {
        self.cell.snapshot().loading
    }

    /// Log in with email and password.
    ///
    /// With `remember_me` the server also issues a refresh token, which lets
    /// the gateway renew the session once the access token expires.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> bool {
        let _busy = Busy::begin(&self.cell);

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember_me,
        };
        match self.authenticate(endpoints::LOGIN, &request).await {
            Ok(auth) => {
                info!(user_id = auth.user.id, remember_me, "Logged in");
                self.store_auth(&auth);
                true
            }
            Err(e) => {
                self.fail(&e, "Login failed");
                false
            }
        }
    }

    /// Create an account and log in as it
    pub async fn register(&self, user_data: &RegisterRequest) -> bool {
        let _busy = Busy::begin(&self.cell);

        match self.authenticate(endpoints::REGISTER, user_data).await {
            Ok(auth) => {
                info!(user_id = auth.user.id, "Registered");
                self.store_auth(&auth);
                true
            }
            Err(e) => {
                self.fail(&e, "Registration failed");
                false
            }
        }
    }

    /// End the session.
    ///
    /// The refresh token is revoked on a best-effort basis; the local session
    /// is cleared whether or not the server could be reached.
    pub async fn logout(&self) {
        let _busy = Busy::begin(&self.cell);

        if let Some(refresh_token) = self.refresh_token() {
            if let Err(e) = self.revoke(refresh_token).await {
                warn!("Failed to revoke refresh token: {e}");
            }
        }

        self.gateway.storage().clear_session();
        self.gateway.set_default_token(None);
        self.cell.clear_credentials();
        info!("Logged out");
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Without a refresh token this returns `false` immediately and touches
    /// nothing. A failed refresh logs the user out.
    pub async fn refresh_access_token(&self) -> bool {
        let Some(refresh_token) = self.refresh_token() else {
            return false;
        };
        let _busy = Busy::begin(&self.cell);

        match self.refresh(refresh_token).await {
            Ok(auth) => {
                debug!(user_id = auth.user.id, "Access token refreshed");
                self.store_auth(&auth);
                true
            }
            Err(e) => {
                warn!("Refresh token is invalid or expired: {e}");
                self.logout().await;
                false
            }
        }
    }

    /// Update profile fields; tokens are left untouched
    pub async fn update_profile(&self, updates: &UpdateProfileRequest) -> bool {
        let _busy = Busy::begin(&self.cell);

        let result = match ApiRequest::put(endpoints::PROFILE).json(updates) {
            Ok(request) => self.gateway.execute::<ProfileResponse>(request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(profile) => {
                self.store_user(profile.user);
                true
            }
            Err(e) => {
                self.fail(&e, "Profile update failed");
                false
            }
        }
    }

    /// Reload the user from the server
    pub async fn fetch_profile(&self) -> bool {
        let _busy = Busy::begin(&self.cell);

        match self.gateway.get_profile().await {
            Ok(profile) => {
                self.store_user(profile.user);
                true
            }
            Err(e) => {
                self.fail(&e, "Failed to load profile");
                false
            }
        }
    }

    async fn authenticate<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<AuthResponse, ClientError> {
        let request = ApiRequest::post(path).json(body)?.without_renewal();
        self.gateway.execute(request).await
    }

    async fn refresh(&self, refresh_token: String) -> Result<AuthResponse, ClientError> {
        let request =
            ApiRequest::post(endpoints::REFRESH).json(&RefreshTokenRequest { refresh_token })?;
        self.gateway.execute(request).await
    }

    async fn revoke(&self, refresh_token: String) -> Result<(), ClientError> {
        let request = ApiRequest::post(endpoints::REVOKE)
            .json(&RefreshTokenRequest { refresh_token })?
            .without_renewal();
        self.gateway.send(request).await?;
        Ok(())
    }

    fn store_auth(&self, auth: &AuthResponse) {
        let storage = self.gateway.storage();
        storage.set(TOKEN_KEY, &auth.token);
        if let Some(refresh_token) = &auth.refresh_token {
            storage.set(REFRESH_TOKEN_KEY, refresh_token);
        }
        self.persist_user(&auth.user);
        self.gateway.set_default_token(Some(&auth.token));

        self.cell.update(|session| {
            session.token = Some(auth.token.clone());
            session.user = Some(auth.user.clone());
            if let Some(refresh_token) = &auth.refresh_token {
                session.refresh_token = Some(refresh_token.clone());
            }
        });
    }

    fn store_user(&self, user: User) {
        self.persist_user(&user);
        self.cell.update(|session| session.user = Some(user));
    }

    fn persist_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(serialized) => self.gateway.storage().set(USER_KEY, &serialized),
            Err(e) => warn!(user_id = user.id, "Failed to serialize user: {e}"),
        }
    }

    fn fail(&self, error: &ClientError, default_message: &str) {
        debug!("Session operation failed: {error}");
        let message = error.server_message().unwrap_or(default_message).to_string();
        self.cell.update(|session| session.error = Some(message));
    }
}
