//! Session lifecycle: login, registration, profile loading and logout.
//!
//! [`SessionManager`] owns the in-memory session and keeps the persistent
//! [`SessionStore`] in step with it. Phases move
//! `Empty → Authenticating → Loading → Ready`, and back to `Empty` on logout;
//! a forced reload re-enters `Loading` from `Ready`.
//!
//! `login`, `register`, `complete_profile` and `load_profile` never overlap:
//! they share one async mutex, and `load_profile` returns immediately instead
//! of queueing when the mutex is taken. Every login, registration and logout
//! starts a new generation; work that finishes under an older generation is
//! discarded.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};

use crate::error::{ProfileFetchError, SessionError};
use crate::profile::ProfileLoader;
use crate::role::{Portal, PortalAccess, Role};
use crate::storage::{SessionStore, StoredSession};
use crate::transport::{ApiRequest, ApiTransport, Endpoint};
use crate::types::{
    extract_token, CombinedProfile, LoginRequest, MedicalRecord, ProfileCompletion,
    RegisterRequest, RegistrationForm, RoleProfile, UserRecord,
};

const LOGIN_REJECTED: &str = "Email or password incorrect";
const REGISTRATION_FAILED: &str = "Registration failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No token.
    Empty,
    /// Login or registration in flight.
    Authenticating,
    /// Profile fetch in flight.
    Loading,
    /// Profile resolved, possibly to nothing.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalErrorKind {
    /// Unrecoverable application failure; leaving it requires a reload.
    Application,
    /// Authentication failure while unauthenticated; leaving it requires a new login.
    Auth,
}

/// An error that takes over the whole screen until the user acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub kind: FatalErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
struct SessionState {
    phase: SessionPhase,
    token: Option<String>,
    user: Option<UserRecord>,
    profile: Option<CombinedProfile>,
    medical_records: Vec<MedicalRecord>,
    is_loading_profile: bool,
    has_loaded_once: bool,
    error: Option<String>,
    success: Option<String>,
    fatal_error: Option<FatalError>,
    completion_request: Option<Portal>,
    generation: u64,
}

impl SessionState {
    fn empty(generation: u64) -> Self {
        Self {
            phase: SessionPhase::Empty,
            token: None,
            user: None,
            profile: None,
            medical_records: Vec::new(),
            is_loading_profile: false,
            has_loaded_once: false,
            error: None,
            success: None,
            fatal_error: None,
            completion_request: None,
            generation,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::empty(self.generation)
    }

    /// Where a finished or failed authentication attempt leaves the session.
    fn settled_phase(&self) -> SessionPhase {
        if self.token.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Empty
        }
    }
}

/// Point-in-time view of the session, combining in-memory state with the
/// persisted bridge flags. This is the only input of [`route`](crate::route).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: Option<String>,
    pub user: Option<UserRecord>,
    pub profile: Option<CombinedProfile>,
    pub medical_records: Vec<MedicalRecord>,
    pub is_loading_profile: bool,
    pub has_loaded_once: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    pub fatal_error: Option<FatalError>,
    pub pending_role: Option<Portal>,
    pub needs_profile_completion: bool,
    /// Set when the user chose to complete a missing profile from a dashboard prompt.
    pub completion_request: Option<Portal>,
}

impl SessionSnapshot {
    fn from_parts(state: SessionState, stored: StoredSession) -> Self {
        Self {
            phase: state.phase,
            token: state.token,
            user: state.user,
            profile: state.profile,
            medical_records: state.medical_records,
            is_loading_profile: state.is_loading_profile,
            has_loaded_once: state.has_loaded_once,
            error: state.error,
            success: state.success,
            fatal_error: state.fatal_error,
            pending_role: stored.pending_role,
            needs_profile_completion: stored.needs_profile_completion,
            completion_request: state.completion_request,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().map(|u| &u.role)
    }

    pub fn role_profile(&self) -> Option<&RoleProfile> {
        self.profile.as_ref().and_then(|p| p.role_profile.as_ref())
    }
}

/// Change notifier for session consumers.
///
/// Uses `tokio::sync::watch`: each published state change bumps a version
/// number, and subscribers re-read the session when it moves.
#[derive(Clone)]
pub struct SessionBroadcast {
    sender: Arc<watch::Sender<u64>>,
}

impl SessionBroadcast {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0u64);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal that the session has changed.
    pub fn notify(&self) {
        self.sender.send_modify(|version| *version = version.wrapping_add(1));
    }

    pub fn version(&self) -> u64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}

impl Default for SessionBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroadcast")
            .field("version", &self.version())
            .finish()
    }
}

/// The session state machine.
///
/// Construct one per process and hand clones to whatever needs it; clones
/// share the same session.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn ApiTransport>,
    store: SessionStore,
    loader: ProfileLoader,
    state: Arc<RwLock<SessionState>>,
    exclusive: Arc<Mutex<()>>,
    broadcast: SessionBroadcast,
}

impl SessionManager {
    pub fn new(api: Arc<dyn ApiTransport>, store: SessionStore) -> Self {
        Self {
            loader: ProfileLoader::new(api.clone()),
            api,
            store,
            state: Arc::new(RwLock::new(SessionState::empty(0))),
            exclusive: Arc::new(Mutex::new(())),
            broadcast: SessionBroadcast::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn broadcast(&self) -> &SessionBroadcast {
        &self.broadcast
    }

    /// Receiver that changes whenever the session does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.broadcast.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let stored = self.store.read_all().await;
        let state = self.state.read().await.clone();
        SessionSnapshot::from_parts(state, stored)
    }

    // ─── Startup ────────────────────────────────────────────────────

    /// Rehydrate the session persisted by a previous run and load its profile.
    pub async fn restore(&self) {
        if self.rehydrate().await {
            self.load_profile(false).await;
        }
    }

    /// Rehydrate the persisted session without loading its profile.
    ///
    /// Returns whether a session was found. An incomplete one (token without
    /// identity or the reverse) is cleared.
    pub async fn rehydrate(&self) -> bool {
        let stored = self.store.read_all().await;
        let (token, auth) = match (stored.token, stored.auth_data) {
            (Some(token), Some(auth)) => (token, auth),
            (None, None) => {
                if stored.pending_role.is_some() || stored.needs_profile_completion {
                    tracing::warn!("clearing bridge flags left without a session");
                    if let Err(e) = self.store.clear_bridge_flags().await {
                        tracing::warn!("failed to clear bridge flags: {}", e);
                    }
                }
                return false;
            }
            _ => {
                tracing::warn!("discarding incomplete persisted session");
                if let Err(e) = self.store.clear().await {
                    tracing::warn!("failed to clear session storage: {}", e);
                }
                return false;
            }
        };

        tracing::debug!(role = %auth.user.role, "restoring persisted session");
        {
            let mut state = self.state.write().await;
            let generation = state.generation + 1;
            *state = SessionState::empty(generation);
            state.token = Some(token);
            state.profile = Some(CombinedProfile::bare(auth.user.clone()));
            state.user = Some(auth.user);
            state.phase = SessionPhase::Ready;
        }
        self.broadcast.notify();
        true
    }

    // ─── Login ──────────────────────────────────────────────────────

    /// Authenticate and enter `portal`.
    ///
    /// The token is persisted before the portal is checked against the
    /// account's role, and it stays persisted when the check fails: a user
    /// who picked the wrong portal remains signed in and is routed by their
    /// actual role.
    pub async fn login(&self, email: &str, password: &str, portal: Portal) -> Result<(), SessionError> {
        let _guard = self.exclusive.lock().await;
        let generation = self.begin_authentication().await;
        tracing::debug!(portal = %portal, "login started");

        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = match self
            .api
            .send(ApiRequest::new(Endpoint::Authenticate).json(body))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::info!("login rejected: {}", e);
                let message = if e.is_rejection() {
                    LOGIN_REJECTED.to_string()
                } else {
                    format!("Unable to sign in: {}", e.message())
                };
                self.fail_authentication(generation, message).await;
                return Err(SessionError::Credentials(e));
            }
        };

        let Some(token) = extract_token(&response) else {
            self.fail_authentication(generation, LOGIN_REJECTED.to_string()).await;
            return Err(SessionError::MissingToken);
        };
        let user = UserRecord::from_auth_response(&response);
        let access = portal.accepts(&user.role);
        let bridge = match access {
            Some(PortalAccess::Bridge(pending)) => Some(pending),
            _ => None,
        };
        self.persist_identity(generation, &token, &user, bridge, "Login successful")
            .await?;
        tracing::info!(role = %user.role, portal = %portal, "logged in");

        match access {
            Some(PortalAccess::Direct) => {}
            Some(PortalAccess::Bridge(pending)) => {
                tracing::debug!(pending = %pending, "bridge account, profile completion required");
            }
            None => {
                let err = SessionError::RoleMismatch {
                    intended: portal,
                    actual: user.role.clone(),
                };
                tracing::warn!("{}", err);
                let message = err.to_string();
                self.publish_if_current(generation, |s| {
                    s.error = Some(message);
                    s.success = None;
                })
                .await;
                return Err(err);
            }
        }

        self.load_profile_exclusive(true).await;
        Ok(())
    }

    // ─── Registration ───────────────────────────────────────────────

    /// Create a bridge account destined for `portal`.
    ///
    /// The account is always created with the `user` role; the session is
    /// left waiting for profile completion and no profile is loaded.
    pub async fn register(&self, form: &RegistrationForm, portal: Portal) -> Result<(), SessionError> {
        if !portal.is_registrable() {
            let err = SessionError::RegistrationPortal(portal);
            self.set_error(err.to_string()).await;
            return Err(err);
        }

        let _guard = self.exclusive.lock().await;
        let generation = self.begin_authentication().await;
        tracing::debug!(portal = %portal, "registration started");

        let body = serde_json::to_value(RegisterRequest::from_form(form))?;
        let response = match self
            .api
            .send(ApiRequest::new(Endpoint::Register).json(body))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::info!("registration rejected: {}", e);
                let message = match e.message().trim() {
                    "" => REGISTRATION_FAILED.to_string(),
                    msg => msg.to_string(),
                };
                self.fail_authentication(generation, message).await;
                return Err(SessionError::Credentials(e));
            }
        };

        let Some(token) = extract_token(&response) else {
            self.fail_authentication(generation, REGISTRATION_FAILED.to_string()).await;
            return Err(SessionError::MissingToken);
        };

        let mut user = UserRecord::from_auth_response(&response);
        user.role = Role::User;
        if user.email.is_empty() {
            user.email = form.email.clone();
        }
        if user.first_name.is_empty() {
            user.first_name = form.first_name.clone();
        }
        if user.last_name.is_empty() {
            user.last_name = form.last_name.clone();
        }
        if user.phone.is_empty() {
            user.phone = form.phone.clone();
        }

        self.persist_identity(generation, &token, &user, Some(portal), "Registration successful")
            .await?;
        tracing::info!(portal = %portal, "registered bridge account");
        Ok(())
    }

    // ─── Profile ────────────────────────────────────────────────────

    /// Resolve the role profile of the current identity.
    ///
    /// No-op without a token, while another session operation is running, or
    /// when a profile was already resolved for this token and `force` is false.
    /// Never fails: a missing profile is published as absent, and any other
    /// failure logs the user out.
    pub async fn load_profile(&self, force: bool) {
        let Ok(_guard) = self.exclusive.try_lock() else {
            tracing::debug!("profile load skipped: another session operation is running");
            return;
        };
        self.load_profile_exclusive(force).await;
    }

    async fn load_profile_exclusive(&self, force: bool) {
        let (token, generation, fallback_user) = {
            let mut state = self.state.write().await;
            let Some(token) = state.token.clone() else {
                return;
            };
            if state.is_loading_profile {
                return;
            }
            if state.has_loaded_once && !force {
                tracing::debug!("profile already loaded");
                return;
            }
            state.is_loading_profile = true;
            state.phase = SessionPhase::Loading;
            (token, state.generation, state.user.clone())
        };
        self.broadcast.notify();

        // The persisted identity is authoritative; profile completion rewrites it.
        let stored = self.store.read_all().await;
        let Some(user) = stored.user().cloned().or(fallback_user) else {
            tracing::error!("token without identity, logging out");
            self.logout().await;
            return;
        };
        tracing::debug!(role = %user.role, force, "loading profile");

        let (role_profile, records) = match self.loader.try_fetch(&token, &user.role).await {
            Ok(role_profile) => {
                let records = match role_profile {
                    Some(RoleProfile::Patient(_)) => self.loader.fetch_medical_records(&token).await,
                    _ => Vec::new(),
                };
                (role_profile, records)
            }
            Err(e) if e.is_access_denied() => {
                tracing::warn!(role = %user.role, "profile unavailable, continuing without it: {}", e);
                (None, Vec::new())
            }
            Err(e) => {
                self.abort_load(generation, e).await;
                return;
            }
        };

        if !self.is_current(generation).await {
            tracing::debug!("discarding profile load from a previous session");
            return;
        }

        let awaiting_completion = stored.needs_profile_completion && user.role.is_bridge();
        let has_flags = stored.needs_profile_completion || stored.pending_role.is_some();
        let mut storage_failure = None;
        if has_flags && !awaiting_completion {
            tracing::debug!(role = %user.role, "clearing bridge flags");
            if let Err(e) = self.store.clear_bridge_flags().await {
                tracing::error!("failed to clear bridge flags: {}", e);
                storage_failure = Some(FatalError {
                    kind: FatalErrorKind::Application,
                    message: format!("Session storage is unavailable: {}", e),
                });
            }
        }

        let combined = CombinedProfile {
            user: user.clone(),
            role_profile,
        };
        self.publish_if_current(generation, |s| {
            s.user = Some(user);
            s.profile = Some(combined);
            s.medical_records = records;
            s.has_loaded_once = true;
            s.is_loading_profile = false;
            s.phase = SessionPhase::Ready;
            if storage_failure.is_some() {
                s.fatal_error = storage_failure;
            }
        })
        .await;
    }

    async fn abort_load(&self, generation: u64, err: ProfileFetchError) {
        if !self.is_current(generation).await {
            tracing::debug!("ignoring failure of a superseded profile load: {}", err);
            return;
        }
        tracing::error!("profile load failed, logging out: {}", err);
        self.logout().await;
    }

    /// Submit the role profile of a bridge account and load it.
    ///
    /// On success the persisted identity is promoted to the portal's role and
    /// the bridge flags are cleared before the forced reload.
    pub async fn complete_profile(&self, completion: &ProfileCompletion) -> Result<(), SessionError> {
        let _guard = self.exclusive.lock().await;
        let (token, generation, fallback_user) = {
            let state = self.state.read().await;
            let token = state.token.clone().ok_or(SessionError::NotAuthenticated)?;
            (token, state.generation, state.user.clone())
        };

        let portal = completion.portal();
        let endpoint = match completion {
            ProfileCompletion::Patient(_) => Endpoint::UpdatePatientProfile,
            ProfileCompletion::Doctor(_) => Endpoint::UpdateDoctorProfile,
            ProfileCompletion::Laboratory(_) => Endpoint::UpdateLaboratoryProfile,
        };
        tracing::debug!(portal = %portal, "submitting profile");

        let body = completion.to_body()?;
        if let Err(e) = self
            .api
            .send(ApiRequest::new(endpoint).bearer(&token).json(body))
            .await
        {
            tracing::warn!(portal = %portal, "profile submission rejected: {}", e);
            let message = e.message().to_string();
            self.publish_if_current(generation, |s| s.error = Some(message))
                .await;
            return Err(SessionError::ProfileUpdate(e));
        }
        if !self.is_current(generation).await {
            return Err(SessionError::Superseded);
        }

        let stored = self.store.read_all().await;
        let mut user = stored
            .user()
            .cloned()
            .or(fallback_user)
            .ok_or(SessionError::NotAuthenticated)?;
        user.role = portal.role();
        self.store.write(&token, &user).await?;
        self.store.clear_bridge_flags().await?;

        let applied = self
            .publish_if_current(generation, |s| {
                s.user = Some(user);
                s.completion_request = None;
                s.error = None;
                s.success = Some("Profile completed".to_string());
            })
            .await;
        if !applied {
            self.discard_superseded_writes().await;
            return Err(SessionError::Superseded);
        }
        tracing::info!(portal = %portal, "profile completed");

        self.load_profile_exclusive(true).await;
        Ok(())
    }

    /// Ask the router to show profile completion for `portal`, e.g. from a
    /// dashboard's "profile required" prompt. Ignored when signed out.
    pub async fn request_profile_completion(&self, portal: Portal) {
        let changed = {
            let mut state = self.state.write().await;
            if state.token.is_none() || state.completion_request == Some(portal) {
                false
            } else {
                state.completion_request = Some(portal);
                true
            }
        };
        if changed {
            self.broadcast.notify();
        }
    }

    // ─── Logout ─────────────────────────────────────────────────────

    /// Clear the persisted and in-memory session.
    ///
    /// Idempotent, and never waits for in-flight operations: they are
    /// superseded and their results dropped.
    pub async fn logout(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!("failed to clear session storage: {}", e);
        }
        let was_signed_in = {
            let mut state = self.state.write().await;
            if state.is_empty() {
                return;
            }
            let was_signed_in = state.token.is_some();
            *state = SessionState::empty(state.generation + 1);
            was_signed_in
        };
        self.broadcast.notify();
        if was_signed_in {
            tracing::info!("logged out");
        }
    }

    // ─── Messages ───────────────────────────────────────────────────

    pub async fn report_fatal_error(&self, kind: FatalErrorKind, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(?kind, "{}", message);
        self.state.write().await.fatal_error = Some(FatalError { kind, message });
        self.broadcast.notify();
    }

    pub async fn clear_fatal_error(&self) {
        let cleared = self.state.write().await.fatal_error.take().is_some();
        if cleared {
            self.broadcast.notify();
        }
    }

    /// Dismiss the user-facing error and success messages.
    pub async fn clear_messages(&self) {
        {
            let mut state = self.state.write().await;
            state.error = None;
            state.success = None;
        }
        self.broadcast.notify();
    }

    // ─── Internal helpers ───────────────────────────────────────────

    async fn begin_authentication(&self) -> u64 {
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.phase = SessionPhase::Authenticating;
            state.error = None;
            state.success = None;
            state.generation
        };
        self.broadcast.notify();
        generation
    }

    async fn fail_authentication(&self, generation: u64, message: String) {
        self.publish_if_current(generation, |s| {
            s.phase = s.settled_phase();
            s.error = Some(message);
        })
        .await;
    }

    async fn set_error(&self, message: String) {
        self.state.write().await.error = Some(message);
        self.broadcast.notify();
    }

    /// Persist a freshly authenticated identity, with the bridge flags for
    /// `bridge` in the same update, and publish it as the interim profile.
    /// Resets the once-only load guard.
    async fn persist_identity(
        &self,
        generation: u64,
        token: &str,
        user: &UserRecord,
        bridge: Option<Portal>,
        success: &str,
    ) -> Result<(), SessionError> {
        if !self.is_current(generation).await {
            return Err(SessionError::Superseded);
        }
        let written = match bridge {
            Some(portal) => self.store.write_bridge_account(token, user, portal).await,
            None => self.store.write(token, user).await,
        };
        if let Err(e) = written {
            self.fail_authentication(generation, format!("Unable to save session: {}", e))
                .await;
            return Err(e.into());
        }

        let applied = self
            .publish_if_current(generation, |s| {
                s.token = Some(token.to_string());
                s.user = Some(user.clone());
                s.profile = Some(CombinedProfile::bare(user.clone()));
                s.medical_records = Vec::new();
                s.has_loaded_once = false;
                s.is_loading_profile = false;
                s.completion_request = None;
                s.fatal_error = None;
                s.phase = SessionPhase::Ready;
                s.success = Some(success.to_string());
            })
            .await;
        if !applied {
            self.discard_superseded_writes().await;
            return Err(SessionError::Superseded);
        }
        Ok(())
    }

    /// Clear what an operation wrote after a logout overtook it.
    async fn discard_superseded_writes(&self) {
        tracing::debug!("operation superseded by logout, clearing its writes");
        if let Err(e) = self.store.clear().await {
            tracing::warn!("failed to clear session storage: {}", e);
        }
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.state.read().await.generation == generation
    }

    /// Apply `update` if no logout or newer login happened since `generation`.
    async fn publish_if_current(
        &self,
        generation: u64,
        update: impl FnOnce(&mut SessionState),
    ) -> bool {
        let applied = {
            let mut state = self.state.write().await;
            if state.generation == generation {
                update(&mut state);
                true
            } else {
                false
            }
        };
        if applied {
            self.broadcast.notify();
        }
        applied
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("broadcast", &self.broadcast)
            .finish()
    }
}
