use chrono::TimeDelta;
use serde::de::IgnoredAny;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

use super::{InFlight, any_in_flight};
use crate::api::{ApiClient, endpoints};
use crate::core::user::{AuthResponse, Credentials, PasswordChange, ProfilePatch, Registration, User};
use crate::lock;
use crate::storage::{Storage, StorageError, keys};
use crate::ui::{Notice, Notifier, Presentation};

/// How long a persisted token stays readable.
pub const TOKEN_TTL_DAYS: i64 = 7;

pub const LOGIN_ROUTE: &str = "/login";

/// The authenticated identity. User and token only ever exist together.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Session state shared between the [`SessionStore`] and the API client, which reads
/// the token for every request and clears the session on a 401.
pub struct SessionCell {
    session: Mutex<Option<Session>>,
    storage: Storage,
}

impl SessionCell {
    pub fn new(storage: Storage) -> Self {
        Self {
            session: Mutex::new(None),
            storage,
        }
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.session).as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.session).as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Set and persist user and token together.
    pub fn establish(&self, token: String, user: User) {
        let ttl = TimeDelta::days(TOKEN_TTL_DAYS);
        if let Err(e) = self.storage.session.set(keys::AUTH_TOKEN, &token, Some(ttl)) {
            log::error!("Failed to persist auth token: {}", e);
        }
        self.persist_user(&user);
        *lock(&self.session) = Some(Session { token, user });
    }

    /// Swap the profile of an established session. Ignored when signed out.
    pub fn replace_user(&self, user: User) {
        let mut session = lock(&self.session);
        match session.as_mut() {
            Some(session) => {
                self.persist_user(&user);
                session.user = user;
            }
            None => log::debug!("Dropping profile update for a signed-out session"),
        }
    }

    pub fn clear(&self) {
        *lock(&self.session) = None;
        if let Err(e) = self.storage.session.remove(keys::AUTH_TOKEN) {
            log::error!("Failed to remove auth token: {}", e);
        }
        if let Err(e) = self.storage.local.remove(keys::AUTH_USER) {
            log::error!("Failed to remove stored user: {}", e);
        }
    }

    /// Load a persisted session. Only a stored token together with a readable stored
    /// profile counts; anything else leaves the session signed out.
    pub fn restore(&self) -> bool {
        let token = match self.storage.session.get(keys::AUTH_TOKEN) {
            Ok(token) => token,
            Err(e) => {
                log::error!("Failed to read auth token: {}", e);
                None
            }
        };
        let stored_user = match self.storage.local.get(keys::AUTH_USER) {
            Ok(user) => user,
            Err(e) => {
                log::error!("Failed to read stored user: {}", e);
                None
            }
        };

        let (Some(token), Some(raw_user)) = (token, stored_user) else {
            return false;
        };
        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => {
                log::info!("Restored session for {}", user.username);
                *lock(&self.session) = Some(Session { token, user });
                true
            }
            Err(e) => {
                log::error!("Failed to restore auth state: {}", e);
                self.clear();
                false
            }
        }
    }

    fn persist_user(&self, user: &User) {
        let result = serde_json::to_string(user)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.local.set(keys::AUTH_USER, &json, None));
        if let Err(e) = result {
            log::error!("Failed to persist user profile: {}", e);
        }
    }
}

pub struct SessionStore {
    cell: Arc<SessionCell>,
    api: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
    presentation: Arc<dyn Presentation>,
    in_flight: AtomicUsize,
}

impl SessionStore {
    pub fn new(
        cell: Arc<SessionCell>,
        api: Arc<ApiClient>,
        notifier: Arc<dyn Notifier>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        Self {
            cell,
            api,
            notifier,
            presentation,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Restore the persisted session, if any.
    pub fn init(&self) -> bool {
        self.cell.restore()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.cell.user()
    }

    pub fn token(&self) -> Option<String> {
        self.cell.token()
    }

    pub fn user_name(&self) -> String {
        self.user().map(|u| u.username).unwrap_or_default()
    }

    pub fn user_email(&self) -> String {
        self.user().map(|u| u.email).unwrap_or_default()
    }

    pub fn user_avatar(&self) -> String {
        self.user().and_then(|u| u.avatar).unwrap_or_default()
    }

    pub fn loading(&self) -> bool {
        any_in_flight(&self.in_flight)
    }

    pub async fn login(&self, credentials: &Credentials) -> bool {
        let _busy = InFlight::begin(&self.in_flight);
        match self.api.post::<AuthResponse, _>(endpoints::AUTH_LOGIN, credentials).await {
            Ok(auth) => {
                log::info!("Logged in as {}", auth.user.username);
                self.cell.establish(auth.access_token, auth.user);
                self.notifier.notify(Notice::success("Login successful"));
                true
            }
            Err(e) => {
                log::error!("Login failed: {}", e);
                false
            }
        }
    }

    pub async fn register(&self, registration: &Registration) -> bool {
        let _busy = InFlight::begin(&self.in_flight);
        match self.api.post::<AuthResponse, _>(endpoints::AUTH_REGISTER, registration).await {
            Ok(auth) => {
                log::info!("Registered {}", auth.user.username);
                self.cell.establish(auth.access_token, auth.user);
                self.notifier.notify(Notice::success("Registration successful"));
                true
            }
            Err(e) => {
                log::error!("Registration failed: {}", e);
                false
            }
        }
    }

    /// Invalidate the token remotely if possible, then sign out locally regardless.
    pub async fn logout(&self) {
        if let Err(e) = self.api.post_empty::<IgnoredAny>(endpoints::AUTH_LOGOUT).await {
            log::warn!("Logout request failed: {}", e);
        }
        self.clear_auth();
        self.notifier.notify(Notice::success("Logged out"));
        self.presentation.navigate(LOGIN_ROUTE);
    }

    pub fn clear_auth(&self) {
        self.cell.clear();
    }

    /// Reload the profile. A failure signs the session out.
    pub async fn refresh_user(&self) -> bool {
        if !self.cell.is_authenticated() {
            return false;
        }
        match self.api.get::<User>(endpoints::AUTH_ME, &[]).await {
            Ok(user) => {
                self.cell.replace_user(user);
                true
            }
            Err(e) => {
                log::error!("Failed to refresh user info: {}", e);
                self.clear_auth();
                false
            }
        }
    }

    pub async fn update_profile(&self, patch: &ProfilePatch) -> Option<User> {
        let _busy = InFlight::begin(&self.in_flight);
        match self.api.patch::<User, _>(endpoints::USER_PROFILE, patch).await {
            Ok(user) => {
                self.cell.replace_user(user.clone());
                self.notifier.notify(Notice::success("Profile updated"));
                Some(user)
            }
            Err(e) => {
                log::error!("Failed to update profile: {}", e);
                None
            }
        }
    }

    pub async fn change_password(&self, current: &str, new: &str) -> bool {
        let _busy = InFlight::begin(&self.in_flight);
        let body = PasswordChange {
            current_password: current,
            new_password: new,
        };
        match self.api.post::<IgnoredAny, _>(endpoints::AUTH_CHANGE_PASSWORD, &body).await {
            Ok(_) => {
                self.notifier.notify(Notice::success("Password changed"));
                true
            }
            Err(e) => {
                log::error!("Failed to change password: {}", e);
                false
            }
        }
    }

    /// Ask the server whether the held token is still good; sign out if not.
    pub async fn validate_token(&self) -> bool {
        if !self.cell.is_authenticated() {
            return false;
        }
        match self.api.get::<IgnoredAny>(endpoints::AUTH_VALIDATE, &[]).await {
            Ok(_) => true,
            Err(e) => {
                log::info!("Token rejected: {}", e);
                self.clear_auth();
                false
            }
        }
    }
}
