//! The session coordinator: owns in-memory session state, decides when to
//! exchange the refresh token, schedules periodic and event-triggered
//! checks, and exposes session state and actions to the rest of the
//! application.
//!
//! Execution is cooperative and event-loop driven. Suspension points are
//! exclusively network awaits and timer firings; everything else runs
//! synchronously to completion, so two ordering hazards are handled
//! explicitly instead of with locks held across awaits:
//!
//! - Overlapping refresh attempts: `SessionPhase::Refreshing` is the
//!   mutual-exclusion flag. A refresh request arriving while one is in
//!   flight is dropped, not queued - its result would be superseded anyway.
//! - Stale writes after logout: a session epoch counter is captured when a
//!   refresh starts and compared before its result is committed. Logout
//!   bumps the epoch, so slow network responses land as no-ops.

mod state;

pub use state::{Clock, SessionPhase, SessionView, SystemClock};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::Duration as ChronoDuration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionPolicy;
use crate::error::SessionError;
use crate::notifier::{SessionBus, SessionSignal, SignalKind};
use crate::store::CredentialStore;
use crate::token;
use crate::transport::{RefreshTransport, TokenGrant, TransportError};

use state::{refresh_token_usable, SessionState};

/// Named cancellable scheduled tasks owned by the coordinator. Each slot is
/// armed on entry to Authenticated and disarmed on exit, so repeated
/// login/logout cycles within one process lifetime never accumulate timers.
#[derive(Default)]
struct TaskSet {
    /// Periodic refresh-if-needed check (remembered sessions) or the
    /// conservative expiry check (short sessions).
    periodic: Option<JoinHandle<()>>,
    /// Time-remaining counter recompute. Never touches the network.
    countdown: Option<JoinHandle<()>>,
    /// The single scheduled retry after a transient refresh failure.
    retry: Option<JoinHandle<()>>,
    /// Pending visibility-settle check.
    visibility: Option<JoinHandle<()>>,
}

impl TaskSet {
    fn disarm_all(&mut self) {
        for handle in [
            self.periodic.take(),
            self.countdown.take(),
            self.retry.take(),
            self.visibility.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

struct Inner<T, S> {
    transport: T,
    store: S,
    bus: SessionBus,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
    /// Identifies this coordinator on the signal bus so it can skip its own
    /// broadcasts.
    origin: u64,
    /// Session epoch: bumped on login, logout and re-initialize. In-flight
    /// token exchanges capture it at start and discard their result if it
    /// has advanced by commit time.
    epoch: AtomicU64,
    state: Mutex<SessionState>,
    tasks: StdMutex<TaskSet>,
    /// Whether visibility transitions should trigger refresh checks (only
    /// armed for remembered sessions while Authenticated).
    visibility_armed: AtomicBool,
    view_tx: watch::Sender<SessionView>,
}

/// Session lifecycle coordinator.
///
/// Constructed once at application start; clones are cheap handles onto the
/// same coordinator. Spawned timer tasks hold such handles, so call
/// [`SessionCoordinator::shutdown`] (or [`SessionCoordinator::logout`]) at
/// application teardown to release them.
pub struct SessionCoordinator<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for SessionCoordinator<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> SessionCoordinator<T, S>
where
    T: RefreshTransport,
    S: CredentialStore,
{
    pub fn new(transport: T, store: S, bus: SessionBus, policy: SessionPolicy) -> Self {
        Self::with_clock(transport, store, bus, policy, Arc::new(SystemClock))
    }

    /// Constructor with an explicit wall-clock source.
    pub fn with_clock(
        transport: T,
        store: S,
        bus: SessionBus,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (view_tx, _) = watch::channel(SessionState::default().view(clock.now()));
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                bus,
                policy,
                clock,
                origin: rand::random(),
                epoch: AtomicU64::new(0),
                state: Mutex::new(SessionState::default()),
                tasks: StdMutex::new(TaskSet::default()),
                visibility_armed: AtomicBool::new(false),
                view_tx,
            }),
        }
    }

    /// This coordinator's identity on the signal bus.
    pub fn origin(&self) -> u64 {
        self.inner.origin
    }

    pub fn bus(&self) -> &SessionBus {
        &self.inner.bus
    }

    /// Current UI-facing snapshot.
    pub fn view(&self) -> SessionView {
        self.inner.view_tx.borrow().clone()
    }

    /// Subscribe to UI-facing snapshots. Updated on every transition and on
    /// the countdown timer.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    // ------------------------------------------------------------------
    // Lifecycle transitions
    // ------------------------------------------------------------------

    /// Settle the initial state from the credential store. Runs once at
    /// application start; [`SessionCoordinator::reinitialize`] is the
    /// re-entry point for cross-instance signals.
    ///
    /// Resolution: no stored access token means Unauthenticated; a valid
    /// unexpired token restores the session directly; an expired token with
    /// a usable refresh token gets exactly one refresh attempt, any failure
    /// of which clears the store and settles Unauthenticated.
    pub async fn initialize(&self) -> SessionPhase {
        info!("Initializing session");
        {
            let mut st = self.inner.state.lock().await;
            st.phase = SessionPhase::Initializing;
        }
        self.publish_view().await;

        let snapshot = self.inner.store.read();
        let now = self.inner.clock.now();

        let Some(access_token) = snapshot.access_token.clone() else {
            debug!("No stored access token");
            return self.settle_unauthenticated(!snapshot.is_empty()).await;
        };

        let claims = match token::decode(&access_token) {
            Ok(claims) if claims.expires_at().is_some() => claims,
            Ok(_) => {
                warn!("Stored access token carries no expiry claim");
                return self.settle_unauthenticated(true).await;
            }
            Err(e) => {
                warn!(error = %e, "Stored access token is malformed");
                return self.settle_unauthenticated(true).await;
            }
        };

        if claims.seconds_until_expiry(now) > 0 {
            let identity = match token::extract_identity(&claims) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(error = %e, "Stored access token has unusable identity claims");
                    return self.settle_unauthenticated(true).await;
                }
            };
            let remember = snapshot.remember_me;
            {
                let mut st = self.inner.state.lock().await;
                *st = SessionState {
                    access_token: Some(access_token),
                    refresh_token: snapshot.refresh_token.clone(),
                    access_expiry_at: snapshot.access_expiry_at.or_else(|| claims.expires_at_utc()),
                    refresh_expiry_at: snapshot.refresh_expiry_at,
                    identity: Some(identity),
                    remember_me: remember,
                    phase: SessionPhase::Authenticated,
                    last_error: None,
                };
            }
            self.arm_scheduling(remember);
            self.publish_view().await;
            info!("Session restored from credential store");
            return SessionPhase::Authenticated;
        }

        if !refresh_token_usable(snapshot.refresh_token.as_deref(), snapshot.refresh_expiry_at, now)
        {
            debug!("Access token expired with no usable refresh token");
            return self.settle_unauthenticated(true).await;
        }
        let Some(refresh_token) = snapshot.refresh_token.clone() else {
            return self.settle_unauthenticated(true).await;
        };

        debug!("Access token expired, attempting one refresh");
        {
            let mut st = self.inner.state.lock().await;
            *st = SessionState {
                refresh_token: Some(refresh_token.clone()),
                refresh_expiry_at: snapshot.refresh_expiry_at,
                remember_me: snapshot.remember_me,
                phase: SessionPhase::Refreshing,
                ..SessionState::default()
            };
        }
        self.publish_view().await;

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        match self.inner.transport.refresh(&refresh_token).await {
            Ok(grant) => match self.commit_grant(grant, epoch).await {
                Ok(phase) => phase,
                Err(e) => {
                    warn!(error = %e, "Initial refresh produced an unusable token");
                    self.settle_unauthenticated(true).await
                }
            },
            Err(e) => {
                debug!(error = %e, "Initial refresh failed");
                self.settle_unauthenticated(true).await
            }
        }
    }

    /// Re-read truth from the credential store after another instance
    /// changed it. Supersedes any in-flight token exchange.
    pub async fn reinitialize(&self) -> SessionPhase {
        debug!("Re-initializing session from credential store");
        self.disarm_tasks();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.initialize().await
    }

    /// Explicit login. On success the grant is installed, persisted and
    /// scheduling armed per `remember_me`. `InvalidCredentials` is surfaced
    /// to the caller without touching the current session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), SessionError> {
        info!("Logging in");
        let grant = match self.inner.transport.login(username, password).await {
            Ok(grant) => grant,
            Err(e) => {
                let kind = map_transport_error(e);
                debug!(error = %kind, "Login failed");
                let mut st = self.inner.state.lock().await;
                // A live session stays untouched by a failed re-login; the
                // caller sees the rejection through the return value alone.
                if !st.phase.is_active() {
                    st.last_error = Some(kind.clone());
                    drop(st);
                    self.publish_view().await;
                }
                return Err(kind);
            }
        };

        // A fresh session supersedes anything still in flight.
        self.disarm_tasks();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut st = self.inner.state.lock().await;
            *st = SessionState {
                remember_me,
                phase: SessionPhase::Initializing,
                ..SessionState::default()
            };
        }
        match self.commit_grant(grant, epoch).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Login produced an unusable token");
                {
                    let mut st = self.inner.state.lock().await;
                    *st = SessionState {
                        phase: SessionPhase::Unauthenticated,
                        last_error: Some(e.clone()),
                        ..SessionState::default()
                    };
                }
                self.publish_view().await;
                Err(e)
            }
        }
    }

    /// Explicit logout: tear down scheduling, clear the store, reset the
    /// session and broadcast the logout signal. Revocation of the refresh
    /// token is best effort and never blocks the local logout.
    pub async fn logout(&self) {
        info!("Logging out");
        let refresh_token = {
            let mut st = self.inner.state.lock().await;
            let tok = st.refresh_token.take();
            *st = SessionState {
                phase: SessionPhase::Unauthenticated,
                ..SessionState::default()
            };
            tok
        };
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.disarm_tasks();
        self.inner.store.clear();
        self.signal(SignalKind::LoggedOut);
        self.publish_view().await;

        if let Some(tok) = refresh_token {
            // Local logout is already complete at this point.
            if let Err(e) = self.inner.transport.revoke(&tok).await {
                warn!(error = %e, "Refresh token revocation failed");
            }
        }
    }

    /// Manual refresh, bypassing the pre-expiry threshold. Dropped if a
    /// refresh is already in flight.
    pub async fn refresh_now(&self) {
        self.run_refresh(false).await;
    }

    /// The instance became visible again (tab foregrounded). For remembered
    /// sessions this schedules a refresh check after a short settle delay.
    pub fn notify_visible(&self) {
        if !self.inner.visibility_armed.load(Ordering::SeqCst) {
            return;
        }
        debug!("Instance visible again, scheduling refresh check");
        let coordinator = self.clone();
        let delay = self.inner.policy.visibility_settle_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so the check can survive its own re-arm of the task
            // set; staleness is epoch-guarded.
            tokio::spawn(async move { coordinator.refresh_if_needed().await });
        });
        let mut tasks = self.tasks_lock();
        if let Some(old) = tasks.visibility.replace(handle) {
            old.abort();
        }
    }

    /// Disarm all scheduled tasks. Application-teardown counterpart to the
    /// arm performed on login/refresh.
    pub fn shutdown(&self) {
        self.disarm_tasks();
    }

    /// Listen for session signals from other instances and re-initialize on
    /// each one. The returned handle is owned by the host for the
    /// application lifetime (it deliberately survives logout).
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        let mut rx = self.inner.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) if signal.origin == coordinator.inner.origin => continue,
                    Ok(signal) => {
                        debug!(kind = ?signal.kind, "Session signal from another instance");
                        coordinator.reinitialize().await;
                    }
                    // Missed signals collapse into one re-read of the store.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        coordinator.reinitialize().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Scheduled checks
    // ------------------------------------------------------------------

    /// Refresh only when remaining access-token life has fallen to the
    /// policy threshold; otherwise a no-op. Never a spurious network call.
    pub(crate) async fn refresh_if_needed(&self) {
        let now = self.inner.clock.now();
        {
            let st = self.inner.state.lock().await;
            match st.phase {
                SessionPhase::Refreshing => {
                    debug!("Refresh already in flight, skipping check");
                    return;
                }
                SessionPhase::Authenticated => {}
                _ => return,
            }
            let remaining = st.seconds_until_expiry(now).unwrap_or(i64::MIN);
            if remaining > self.inner.policy.refresh_threshold_secs() {
                debug!(remaining, "Access token still fresh");
                return;
            }
        }
        self.run_refresh(false).await;
    }

    /// Conservative tick for sessions without "remember me": act only once
    /// the access token has actually expired - refresh if a usable refresh
    /// token exists, otherwise end the session.
    async fn short_session_tick(&self) {
        let now = self.inner.clock.now();
        let expired_without_refresh = {
            let st = self.inner.state.lock().await;
            if st.phase != SessionPhase::Authenticated || !st.access_expired(now) {
                return;
            }
            !st.refresh_token_usable(now)
        };
        if expired_without_refresh {
            info!("Short-lived session expired");
            self.clear_session(None, false).await;
        } else {
            self.run_refresh(false).await;
        }
    }

    // ------------------------------------------------------------------
    // Refresh execution
    // ------------------------------------------------------------------

    /// Boxed return type: the retry path spawns a task that calls back into
    /// `run_refresh`, and that recursion must not flow through an opaque
    /// future type.
    fn run_refresh(&self, is_retry: bool) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.run_refresh_inner(is_retry))
    }

    async fn run_refresh_inner(&self, is_retry: bool) {
        let now = self.inner.clock.now();
        let (refresh_token, epoch) = {
            let mut st = self.inner.state.lock().await;
            match st.phase {
                SessionPhase::Refreshing => {
                    debug!("Refresh already in flight, dropping request");
                    return;
                }
                SessionPhase::Authenticated => {}
                _ => {
                    debug!(phase = ?st.phase, "No active session to refresh");
                    return;
                }
            }
            let Some(tok) = st.refresh_token.clone() else {
                if st.access_expired(now) {
                    drop(st);
                    info!("Access token expired with no refresh credential");
                    self.clear_session(None, false).await;
                } else {
                    debug!("No refresh token held, keeping current access token");
                }
                return;
            };
            if !st.refresh_token_usable(now) {
                // The access token may still have life left; it stays in
                // service until it actually expires.
                if st.access_expired(now) {
                    drop(st);
                    info!("Refresh token expired with no access-token life left, ending session");
                    self.clear_session(Some(SessionError::InvalidRefreshToken), false)
                        .await;
                } else {
                    debug!("Refresh token expired locally, keeping live access token");
                }
                return;
            }
            st.phase = SessionPhase::Refreshing;
            (tok, self.inner.epoch.load(Ordering::SeqCst))
        };
        self.publish_view().await;

        match self.inner.transport.refresh(&refresh_token).await {
            Ok(grant) => match self.commit_grant(grant, epoch).await {
                Ok(_) => {}
                Err(e) => {
                    // Structural failure: retrying cannot repair a malformed
                    // payload.
                    warn!(error = %e, "Refresh produced an unusable token");
                    self.clear_session_checked(Some(e), true, epoch).await;
                }
            },
            Err(TransportError::InvalidRefreshToken) => {
                info!("Refresh token rejected, ending session");
                self.clear_session_checked(Some(SessionError::InvalidRefreshToken), false, epoch)
                    .await;
            }
            Err(e) => {
                self.handle_transient_failure(map_transport_error(e), epoch, is_retry)
                    .await;
            }
        }
    }

    /// Commit a token grant unless the session epoch advanced while the
    /// exchange was in flight.
    async fn commit_grant(
        &self,
        grant: TokenGrant,
        epoch: u64,
    ) -> Result<SessionPhase, SessionError> {
        let claims = token::decode(&grant.access_token)?;
        if claims.expires_at().is_none() {
            return Err(SessionError::MalformedToken("missing expiry claim".into()));
        }
        let identity = token::extract_identity(&claims)?;

        let now = self.inner.clock.now();
        let remember;
        {
            let mut st = self.inner.state.lock().await;
            if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                debug!("Discarding token grant from a superseded session epoch");
                return Ok(st.phase);
            }
            remember = st.remember_me;
            st.access_token = Some(grant.access_token);
            let rotated = grant.refresh_token.is_some();
            if let Some(tok) = grant.refresh_token {
                st.refresh_token = Some(tok);
            }
            st.access_expiry_at = Some(now + ChronoDuration::seconds(grant.expires_in_seconds as i64));
            // A kept refresh token keeps its original expiry stamp; only a
            // newly granted one earns a fresh lifetime.
            st.refresh_expiry_at = if !remember {
                None
            } else if rotated || st.refresh_expiry_at.is_none() {
                st.refresh_token
                    .as_deref()
                    .and_then(|tok| token::decode(tok).ok())
                    .and_then(|c| c.expires_at_utc())
                    .or_else(|| {
                        st.refresh_token
                            .as_ref()
                            .map(|_| now + self.inner.policy.refresh_token_lifetime)
                    })
            } else {
                st.refresh_expiry_at
            };
            st.identity = Some(identity);
            st.phase = SessionPhase::Authenticated;
            st.last_error = None;

            // A failed write leaves this instance working from memory; the
            // next initialize falls back toward logged-out, never toward a
            // forged session.
            if let Err(e) = self.inner.store.write(&st.to_stored()) {
                warn!(error = %e, "Failed to persist credentials");
            }
        }
        self.arm_scheduling(remember);
        self.signal(SignalKind::CredentialsChanged);
        self.publish_view().await;
        info!("Session credentials committed");
        Ok(SessionPhase::Authenticated)
    }

    /// Transient transport failure during refresh: keep the previous session
    /// state (the old access token may still have life left), record the
    /// error and schedule exactly one retry. A failed retry is terminal only
    /// if the access token has actually expired by then.
    async fn handle_transient_failure(&self, kind: SessionError, epoch: u64, is_retry: bool) {
        let now = self.inner.clock.now();
        let retry_exhausted_and_expired = {
            let mut st = self.inner.state.lock().await;
            if self.inner.epoch.load(Ordering::SeqCst) != epoch
                || st.phase != SessionPhase::Refreshing
            {
                debug!("Stale refresh failure, ignoring");
                return;
            }
            st.phase = SessionPhase::Authenticated;
            st.last_error = Some(kind.clone());
            is_retry && st.access_expired(now)
        };

        if retry_exhausted_and_expired {
            info!("Refresh retry failed with no access-token life left, ending session");
            self.clear_session_checked(Some(kind), true, epoch).await;
            return;
        }
        self.publish_view().await;

        if is_retry {
            debug!("Refresh retry failed but access token still valid, standing pat");
            return;
        }

        warn!(
            backoff_secs = self.inner.policy.retry_backoff.as_secs(),
            error = %kind,
            "Transient refresh failure, scheduling one retry"
        );
        let coordinator = self.clone();
        let backoff = self.inner.policy.retry_backoff;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            // Detached: committing the retry re-arms the task set, which
            // aborts this slot; the actual exchange must not die with it.
            tokio::spawn(async move { coordinator.run_refresh(true).await });
        });
        let mut tasks = self.tasks_lock();
        if let Some(old) = tasks.retry.replace(handle) {
            old.abort();
        }
    }

    // ------------------------------------------------------------------
    // Terminal transitions
    // ------------------------------------------------------------------

    /// Reset to a credential-free state. `mark_error` selects the Error
    /// phase for sessions that died mid-use and could not be recovered,
    /// letting the UI distinguish that from "never logged in".
    async fn clear_session(&self, reason: Option<SessionError>, mark_error: bool) {
        self.disarm_tasks();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.store.clear();
        {
            let mut st = self.inner.state.lock().await;
            let was_active = st.phase.is_active();
            *st = SessionState {
                phase: if mark_error && was_active && reason.is_some() {
                    SessionPhase::Error
                } else {
                    SessionPhase::Unauthenticated
                },
                last_error: reason,
                ..SessionState::default()
            };
        }
        self.signal(SignalKind::LoggedOut);
        self.publish_view().await;
    }

    async fn clear_session_checked(
        &self,
        reason: Option<SessionError>,
        mark_error: bool,
        epoch: u64,
    ) {
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Superseded session epoch, discarding terminal refresh failure");
            return;
        }
        self.clear_session(reason, mark_error).await;
    }

    /// Initialize resolution that does not constitute a logout broadcast:
    /// the instance is reconciling with truth, not changing it.
    async fn settle_unauthenticated(&self, clear_store: bool) -> SessionPhase {
        if clear_store {
            self.inner.store.clear();
        }
        self.disarm_tasks();
        {
            let mut st = self.inner.state.lock().await;
            *st = SessionState {
                phase: SessionPhase::Unauthenticated,
                ..SessionState::default()
            };
        }
        self.publish_view().await;
        SessionPhase::Unauthenticated
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Arm the timers for the current session flavor, replacing whatever was
    /// armed before. Remembered sessions get the aggressive periodic check,
    /// the countdown recompute and visibility-triggered checks; short
    /// sessions get the single conservative timer.
    fn arm_scheduling(&self, remember: bool) {
        let mut tasks = self.tasks_lock();
        tasks.disarm_all();

        if remember {
            let coordinator = self.clone();
            let period = self.inner.policy.remembered_check_interval;
            tasks.periodic = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // consume the immediate first tick
                loop {
                    ticker.tick().await;
                    let check = coordinator.clone();
                    // Detached: the check may re-arm the task set and abort
                    // this loop; its own commit must run to completion.
                    tokio::spawn(async move { check.refresh_if_needed().await });
                }
            }));

            let coordinator = self.clone();
            let period = self.inner.policy.countdown_interval;
            tasks.countdown = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    coordinator.publish_view().await;
                }
            }));

            self.inner.visibility_armed.store(true, Ordering::SeqCst);
        } else {
            let coordinator = self.clone();
            let period = self.inner.policy.short_session_check_interval;
            tasks.periodic = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let check = coordinator.clone();
                    tokio::spawn(async move { check.short_session_tick().await });
                }
            }));
            self.inner.visibility_armed.store(false, Ordering::SeqCst);
        }
    }

    fn disarm_tasks(&self) {
        self.inner.visibility_armed.store(false, Ordering::SeqCst);
        self.tasks_lock().disarm_all();
    }

    fn tasks_lock(&self) -> std::sync::MutexGuard<'_, TaskSet> {
        // A poisoned lock only means a panic elsewhere; JoinHandles stay
        // valid.
        self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn signal(&self, kind: SignalKind) {
        self.inner.bus.publish(SessionSignal {
            origin: self.inner.origin,
            kind,
            at: self.inner.clock.now(),
        });
    }

    async fn publish_view(&self) {
        let now = self.inner.clock.now();
        let view = {
            let st = self.inner.state.lock().await;
            st.view(now)
        };
        self.inner.view_tx.send_replace(view);
    }
}

fn map_transport_error(e: TransportError) -> SessionError {
    match e {
        TransportError::InvalidCredentials => SessionError::InvalidCredentials,
        TransportError::InvalidRefreshToken => SessionError::InvalidRefreshToken,
        TransportError::Network(msg) => SessionError::Network(msg),
        TransportError::InvalidResponse(msg) => SessionError::Network(msg),
    }
}
