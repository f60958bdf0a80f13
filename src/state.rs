//! Everything the Tauri commands share, and the glue between components.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::Backend;
use crate::board::IncidentBoard;
use crate::db::DbPool;
use crate::dispatch::{AssignmentReport, Dispatcher};
use crate::error::{ActionOutcome, Error, Result};
use crate::evidence::{EvidenceTracker, EvidenceView, VerifyOutcome};
use crate::lifecycle::{self, ReportDraft};
use crate::poller::{ContextGuard, Subscription};
use crate::session::{Session, SessionStore, SessionVault, TokenStorage};
use crate::sos::{Dialer, NotSeenOutcome, SosContext, SosOutcome, SosTrigger};
use crate::types::config::AppConfig;
use crate::types::incident::Incident;
use crate::types::user::{Credentials, ProfileUpdate, Role, User};
use crate::visibility::{visible_incidents, IncidentView, VisibilityPolicy};

/// What a background refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub incidents: bool,
    pub evidence: bool,
}

/// A command result plus the role whose session it just ended, if any.
pub struct Settled<T> {
    pub outcome: ActionOutcome<T>,
    pub expired: Option<Role>,
}

pub struct AppState {
    pub pool: DbPool,
    backend: Arc<dyn Backend>,
    api_base: String,
    config: Mutex<AppConfig>,
    pub sessions: SessionStore,
    pub board: IncidentBoard,
    pub evidence: EvidenceTracker,
    pub sos: SosTrigger,
    dispatcher: Dispatcher,
    dashboard: Mutex<Option<Subscription>>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        backend: Arc<dyn Backend>,
        api_base: impl Into<String>,
        config: AppConfig,
        storage: TokenStorage,
    ) -> Self {
        let dispatcher = Dispatcher::new(Duration::from_millis(config.assign_dismiss_ms));
        Self {
            sessions: SessionStore::new(SessionVault::new(pool.clone(), storage)),
            pool,
            backend,
            api_base: api_base.into(),
            config: Mutex::new(config),
            board: IncidentBoard::new(),
            evidence: EvidenceTracker::new(),
            sos: SosTrigger::new(),
            dispatcher,
            dashboard: Mutex::new(None),
        }
    }

    pub fn config(&self) -> AppConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_config(&self, config: AppConfig) {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn dashboard(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.dashboard.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Token of the active session, taken before a command runs so its
    /// outcome can be settled against the session it started under.
    pub fn session_token(&self) -> Option<String> {
        self.sessions.active().ok().map(|s| s.token)
    }

    /// Turn a result into the frontend shape, ending the session on an auth
    /// failure if `started` is still the active session.
    pub fn settle<T>(&self, started: Option<&str>, result: Result<T>) -> Settled<T> {
        let expired = match (&result, started) {
            (Err(e), Some(token)) if e.is_auth_failure() => self.expire(token),
            _ => None,
        };
        Settled {
            outcome: result.into(),
            expired,
        }
    }

    /// Forced logout. Only the first caller gets the role back.
    fn expire(&self, token: &str) -> Option<Role> {
        let role = self.sessions.expire(token)?;
        self.reset_views();
        Some(role)
    }

    fn reset_views(&self) {
        self.close_dashboard();
        self.board.clear();
        self.evidence.clear();
        self.dispatcher.clear();
    }

    // --- auth ---

    pub async fn login(&self, credentials: &Credentials, role: Role) -> Result<Session> {
        let session = self.sessions.login(&*self.backend, credentials, role).await?;
        self.reset_views();
        Ok(session)
    }

    /// Restore `role`, or the first role with a usable persisted session.
    pub async fn restore(&self, role: Option<Role>) -> Result<Option<Session>> {
        let candidates = match role {
            Some(role) => vec![role],
            None => Role::ALL.to_vec(),
        };
        let mut last_err = None;
        for role in candidates {
            match self.sessions.restore(&*self.backend, role).await {
                Ok(Some(session)) => {
                    self.reset_views();
                    return Ok(Some(session));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%role, error = %e, "Session restore failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    pub fn logout(&self) -> Option<Role> {
        let role = self.sessions.logout();
        self.reset_views();
        role
    }

    pub fn current_user(&self) -> Result<User> {
        self.sessions.active().map(|s| s.user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        self.sessions
            .update_profile(&*self.backend, update)
            .await
            .map(|s| s.user)
    }

    // --- incidents ---

    pub async fn refresh_incidents(&self, guard: Option<&ContextGuard>) -> Result<bool> {
        let session = self.sessions.active()?;
        lifecycle::refresh(&*self.backend, &self.board, &session, guard).await
    }

    /// What the active user may see right now.
    pub fn visible(&self) -> IncidentView {
        let actor = self.sessions.active().ok().map(|s| s.actor());
        let policy = VisibilityPolicy::from(&self.config());
        visible_incidents(&self.board.snapshot(), actor.as_ref(), policy)
    }

    pub async fn acknowledge(&self, incident_id: i64) -> Result<Incident> {
        let session = self.sessions.active()?;
        lifecycle::acknowledge(&*self.backend, &self.board, &session, incident_id).await
    }

    pub async fn report(&self, draft: ReportDraft) -> Result<Incident> {
        let session = self.sessions.active()?;
        lifecycle::report(&*self.backend, &self.board, &session, draft).await
    }

    // --- sos ---

    pub async fn trigger_sos(&self, ctx: &SosContext) -> Result<SosOutcome> {
        let session = self.sessions.active()?;
        self.sos.trigger(&*self.backend, &self.board, &session, ctx).await
    }

    pub async fn report_not_seen<D: Dialer + ?Sized>(
        &self,
        ctx: &SosContext,
        dialer: &D,
    ) -> Result<NotSeenOutcome> {
        let session = self.sessions.active()?;
        let contact = self.config().emergency_contact;
        Ok(self
            .sos
            .report_not_seen(
                &*self.backend,
                &self.board,
                &session,
                ctx,
                dialer,
                contact.as_deref(),
            )
            .await)
    }

    // --- evidence ---

    pub async fn refresh_evidence(&self, guard: Option<&ContextGuard>) -> Result<bool> {
        let session = self.sessions.active()?;
        self.evidence.refresh(&*self.backend, &session, guard).await
    }

    pub fn evidence_views(&self) -> Vec<EvidenceView> {
        self.evidence.views(&self.api_base)
    }

    pub async fn verify_evidence(&self, evidence_id: i64) -> Result<VerifyOutcome> {
        let session = self.sessions.active()?;
        self.evidence.verify(&*self.backend, &session, evidence_id).await
    }

    // --- assignment ---

    pub async fn security_users(&self) -> Result<Vec<User>> {
        let session = self.sessions.active()?;
        self.dispatcher.security_users(&*self.backend, &session).await
    }

    pub async fn assign(
        &self,
        incident_ids: &BTreeSet<i64>,
        security_user_ids: &[i64],
    ) -> Result<AssignmentReport> {
        let session = self.sessions.active()?;
        self.dispatcher
            .assign(
                &*self.backend,
                &self.board,
                &session,
                incident_ids,
                security_user_ids,
            )
            .await
    }

    // --- dashboard ---

    /// One polling round. Incidents and evidence refresh together.
    pub async fn poll_once(&self, guard: &ContextGuard) -> Result<PollResult> {
        let (incidents, evidence) = tokio::join!(
            self.refresh_incidents(Some(guard)),
            self.refresh_evidence(Some(guard)),
        );
        Ok(PollResult {
            incidents: incidents?,
            evidence: evidence?,
        })
    }

    /// Start a dashboard session: a fresh SOS latch and a new poller.
    pub fn open_dashboard(&self, subscription: Subscription) {
        self.sos.reset();
        if self.dashboard().replace(subscription).is_some() {
            info!("Replaced running dashboard poller");
        }
    }

    pub fn close_dashboard(&self) -> bool {
        let previous = self.dashboard().take();
        previous.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config().poll_interval_secs.max(1))
    }
}

/// Log and swallow a background refresh failure.
pub fn log_poll_error(error: &Error) {
    warn!(error = %error, "Background refresh failed");
}
