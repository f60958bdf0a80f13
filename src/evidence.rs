//! Evidence list plus the verification results gathered this session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::Backend;
use crate::error::{Error, Result};
use crate::optimistic::{self, OptimisticCommand};
use crate::poller::ContextGuard;
use crate::session::Session;
use crate::types::evidence::{Evidence, EvidenceDisplay, VerificationResult};

#[derive(Debug, Clone)]
enum Override {
    InFlight,
    Done(VerificationResult),
}

#[derive(Default)]
struct TrackerState {
    items: Vec<Evidence>,
    applied: u64,
    overrides: HashMap<i64, Override>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceView {
    #[serde(flatten)]
    pub evidence: Evidence,
    pub display: EvidenceDisplay,
    pub file_url: Option<String>,
    pub last_result: Option<VerificationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Never anchored, so there is nothing to check against.
    NotRegistered,
    Checked { result: VerificationResult },
}

#[derive(Default)]
pub struct EvidenceTracker {
    state: Mutex<TrackerState>,
    next_ticket: AtomicU64,
}

impl EvidenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn refresh<B: Backend + ?Sized>(
        &self,
        backend: &B,
        session: &Session,
        guard: Option<&ContextGuard>,
    ) -> Result<bool> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let items = backend.list_evidence(&session.token).await?;
        if guard.is_some_and(|g| !g.is_active()) {
            return Ok(false);
        }
        let mut state = self.lock();
        if ticket <= state.applied {
            debug!(ticket, "Discarding stale evidence list");
            return Ok(false);
        }
        state.applied = ticket;
        state.items = items;
        Ok(true)
    }

    /// Items with session results applied over the listed status.
    pub fn views(&self, file_base: &str) -> Vec<EvidenceView> {
        let state = self.lock();
        state
            .items
            .iter()
            .map(|item| {
                let (display, last_result) = match state.overrides.get(&item.id) {
                    Some(Override::InFlight) => (EvidenceDisplay::Pending, None),
                    Some(Override::Done(result)) => (result.status.into(), Some(result.clone())),
                    None => (item.display(), None),
                };
                EvidenceView {
                    evidence: item.clone(),
                    display,
                    file_url: item.file_url(file_base).ok().map(|u| u.to_string()),
                    last_result,
                }
            })
            .collect()
    }

    pub async fn verify<B: Backend + ?Sized>(
        &self,
        backend: &B,
        session: &Session,
        evidence_id: i64,
    ) -> Result<VerifyOutcome> {
        if !session.role.can_verify_evidence() {
            return Err(Error::Forbidden(format!(
                "{} accounts cannot verify evidence",
                session.role
            )));
        }
        let anchored = {
            let state = self.lock();
            state
                .items
                .iter()
                .find(|e| e.id == evidence_id)
                .map(Evidence::is_anchored)
                .ok_or_else(|| Error::NotFound(format!("evidence {}", evidence_id)))?
        };
        if !anchored {
            debug!(evidence_id, "Evidence not anchored, skipping verify");
            return Ok(VerifyOutcome::NotRegistered);
        }

        let command = Verify {
            backend,
            token: &session.token,
            evidence_id,
        };
        let result = optimistic::run(self, &command).await?;
        info!(evidence_id, status = ?result.status, "Evidence verified");
        Ok(VerifyOutcome::Checked { result })
    }

    /// Forget everything on logout.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        state.overrides.clear();
        state.applied = self.next_ticket.load(Ordering::SeqCst);
    }
}

struct Verify<'a, B: ?Sized> {
    backend: &'a B,
    token: &'a str,
    evidence_id: i64,
}

#[async_trait]
impl<'a, B: Backend + ?Sized> OptimisticCommand for Verify<'a, B> {
    type State = EvidenceTracker;
    type Snapshot = Option<VerificationResult>;
    type Output = VerificationResult;

    fn name(&self) -> &'static str {
        "verify_evidence"
    }

    fn apply(&self, tracker: &EvidenceTracker) -> Result<Option<VerificationResult>> {
        let mut state = tracker.lock();
        match state.overrides.insert(self.evidence_id, Override::InFlight) {
            Some(Override::InFlight) => Err(Error::AlreadyInFlight(self.evidence_id)),
            Some(Override::Done(prior)) => Ok(Some(prior)),
            None => Ok(None),
        }
    }

    async fn execute(&self) -> Result<VerificationResult> {
        self.backend.verify_evidence(self.token, self.evidence_id).await
    }

    fn commit(
        &self,
        tracker: &EvidenceTracker,
        result: &VerificationResult,
        _prior: Option<VerificationResult>,
    ) {
        tracker
            .lock()
            .overrides
            .insert(self.evidence_id, Override::Done(result.clone()));
    }

    fn compensate(&self, tracker: &EvidenceTracker, prior: Option<VerificationResult>) {
        let mut state = tracker.lock();
        match prior {
            Some(result) => state.overrides.insert(self.evidence_id, Override::Done(result)),
            None => state.overrides.remove(&self.evidence_id),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{evidence, session, FakeBackend};
    use crate::types::evidence::VerificationStatus;
    use crate::types::user::Role;
    use std::time::Duration;

    const BASE: &str = "http://localhost:8000";

    async fn loaded(items: Vec<Evidence>) -> (FakeBackend, EvidenceTracker) {
        let backend = FakeBackend::new();
        *backend.evidence.lock().unwrap() = items;
        let tracker = EvidenceTracker::new();
        let viewer = session(2, "alice", Role::Viewer, &[3]);
        tracker.refresh(&backend, &viewer, None).await.unwrap();
        (backend, tracker)
    }

    fn display_of(tracker: &EvidenceTracker, id: i64) -> EvidenceDisplay {
        tracker
            .views(BASE)
            .into_iter()
            .find(|v| v.evidence.id == id)
            .map(|v| v.display)
            .unwrap()
    }

    fn tampered() -> VerificationResult {
        VerificationResult {
            status: VerificationStatus::Tampered,
            blockchain_hash: Some("0xaaa".into()),
            current_hash: Some("0xbbb".into()),
            message: "hash mismatch".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slower_older_evidence_list_is_discarded() {
        let backend = FakeBackend::new();
        backend.script_evidence(
            Duration::from_millis(300),
            vec![evidence(1, true, VerificationStatus::Pending)],
        );
        backend.script_evidence(
            Duration::from_millis(10),
            vec![evidence(2, true, VerificationStatus::Verified)],
        );
        let tracker = EvidenceTracker::new();
        let viewer = session(2, "alice", Role::Viewer, &[3]);

        let (older, newer) = tokio::join!(
            tracker.refresh(&backend, &viewer, None),
            tracker.refresh(&backend, &viewer, None),
        );

        assert!(!older.unwrap());
        assert!(newer.unwrap());
        let ids: Vec<i64> = tracker.views(BASE).iter().map(|v| v.evidence.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(backend.call_count("evidence"), 2);
    }

    #[tokio::test]
    async fn security_is_rejected_before_any_call() {
        let (backend, tracker) = loaded(vec![evidence(1, true, VerificationStatus::Pending)]).await;
        let guard = session(7, "guard", Role::Security, &[]);
        let err = tracker.verify(&backend, &guard, 1).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(backend.calls(), vec!["evidence"]);
    }

    #[tokio::test]
    async fn unanchored_evidence_short_circuits() {
        let (backend, tracker) = loaded(vec![evidence(1, false, VerificationStatus::Pending)]).await;
        for actor in [
            session(2, "alice", Role::Viewer, &[]),
            session(1, "root", Role::Admin, &[]),
        ] {
            let outcome = tracker.verify(&backend, &actor, 1).await.unwrap();
            assert_eq!(outcome, VerifyOutcome::NotRegistered);
        }
        assert_eq!(backend.call_count("verify"), 0);
        assert_eq!(display_of(&tracker, 1), EvidenceDisplay::NotRegistered);
    }

    #[tokio::test]
    async fn unknown_evidence_is_not_found() {
        let (backend, tracker) = loaded(vec![]).await;
        let viewer = session(2, "alice", Role::Viewer, &[]);
        let err = tracker.verify(&backend, &viewer, 9).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn result_survives_later_refresh() {
        let (backend, tracker) = loaded(vec![evidence(1, true, VerificationStatus::Pending)]).await;
        backend.set_verify_result(1, tampered());
        let viewer = session(2, "alice", Role::Viewer, &[]);

        let outcome = tracker.verify(&backend, &viewer, 1).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Checked { result: tampered() });

        // backend still lists it as PENDING
        tracker.refresh(&backend, &viewer, None).await.unwrap();
        let view = tracker.views(BASE).remove(0);
        assert_eq!(view.display, EvidenceDisplay::Tampered);
        assert_eq!(view.last_result, Some(tampered()));
        assert_eq!(view.file_url.as_deref(), Some("http://localhost:8000/uploads/1.jpg"));
    }

    #[tokio::test]
    async fn failed_verify_restores_previous_display() {
        let (backend, tracker) = loaded(vec![evidence(1, true, VerificationStatus::Verified)]).await;
        backend.fail("verify:1", Error::Backend {
            status: 500,
            message: "chain unavailable".into(),
        });
        let viewer = session(2, "alice", Role::Viewer, &[]);

        let err = tracker.verify(&backend, &viewer, 1).await.unwrap_err();
        assert!(matches!(err, Error::Backend { status: 500, .. }));
        assert_eq!(display_of(&tracker, 1), EvidenceDisplay::Verified);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_verify_displays_pending() {
        let (backend, tracker) = loaded(vec![evidence(1, true, VerificationStatus::Verified)]).await;
        backend.delay("verify:1", Duration::from_millis(500));
        let viewer = session(2, "alice", Role::Viewer, &[]);

        let (outcome, during) = tokio::join!(tracker.verify(&backend, &viewer, 1), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            display_of(&tracker, 1)
        });

        assert_eq!(during, EvidenceDisplay::Pending);
        assert!(outcome.is_ok());
        assert_eq!(display_of(&tracker, 1), EvidenceDisplay::Verified);
    }

    #[tokio::test]
    async fn clear_drops_session_results() {
        let (backend, tracker) = loaded(vec![evidence(1, true, VerificationStatus::Pending)]).await;
        backend.set_verify_result(1, tampered());
        let viewer = session(2, "alice", Role::Viewer, &[]);
        tracker.verify(&backend, &viewer, 1).await.unwrap();

        tracker.clear();
        assert!(tracker.views(BASE).is_empty());
        tracker.refresh(&backend, &viewer, None).await.unwrap();
        assert_eq!(display_of(&tracker, 1), EvidenceDisplay::Pending);
    }
}
