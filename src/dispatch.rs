//! Admin bulk assignment of incidents to a security user.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::Backend;
use crate::board::IncidentBoard;
use crate::error::{Error, Result};
use crate::optimistic::{self, OptimisticCommand};
use crate::session::Session;
use crate::types::user::{Role, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFailure {
    pub incident_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub succeeded: Vec<i64>,
    pub failed: Vec<AssignmentFailure>,
    /// How long the UI keeps the confirmation up. Only set on success.
    pub dismiss_after_ms: Option<u64>,
}

impl AssignmentReport {
    /// At least one incident was assigned.
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

pub struct Dispatcher {
    dismiss_after: Duration,
    roster: Mutex<Vec<User>>,
}

impl Dispatcher {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            dismiss_after,
            roster: Mutex::new(Vec::new()),
        }
    }

    fn roster(&self) -> MutexGuard<'_, Vec<User>> {
        self.roster.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the security users an admin can pick from.
    pub async fn security_users<B: Backend + ?Sized>(
        &self,
        backend: &B,
        session: &Session,
    ) -> Result<Vec<User>> {
        require_admin(session)?;
        let users = backend.list_users(&session.token, Role::Security).await?;
        *self.roster() = users.clone();
        Ok(users)
    }

    /// Forget the cached roster.
    pub fn clear(&self) {
        self.roster().clear();
    }

    pub async fn assign<B: Backend + ?Sized>(
        &self,
        backend: &B,
        board: &IncidentBoard,
        session: &Session,
        incident_ids: &BTreeSet<i64>,
        security_user_ids: &[i64],
    ) -> Result<AssignmentReport> {
        require_admin(session)?;
        if incident_ids.is_empty() {
            return Err(Error::Validation("select at least one incident".to_string()));
        }
        let &[assignee_id] = security_user_ids else {
            return Err(Error::Validation(
                "select exactly one security user".to_string(),
            ));
        };
        let assignee_name = {
            let roster = self.roster();
            match roster.iter().find(|u| u.id == assignee_id) {
                Some(u) => Some(u.username.clone()),
                None if !roster.is_empty() => {
                    return Err(Error::Validation(format!(
                        "user {} is not on the security roster",
                        assignee_id
                    )));
                }
                None => None,
            }
        };

        let command = Assign {
            backend,
            token: &session.token,
            incident_ids,
            assignee_id,
            assignee_name,
        };
        let outcomes = optimistic::run(board, &command).await?;

        let mut report = AssignmentReport::default();
        for (incident_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(incident_id),
                Err(e) => report.failed.push(AssignmentFailure {
                    incident_id,
                    reason: e.to_string(),
                }),
            }
        }
        if report.is_success() {
            report.dismiss_after_ms = Some(self.dismiss_after.as_millis() as u64);
        }
        info!(
            assignee_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Assignment dispatched"
        );
        Ok(report)
    }
}

fn require_admin(session: &Session) -> Result<()> {
    if session.role != Role::Admin {
        return Err(Error::Forbidden("only admins assign incidents".to_string()));
    }
    Ok(())
}

type PriorAssignment = (Option<i64>, Option<String>);

struct Assign<'a, B: ?Sized> {
    backend: &'a B,
    token: &'a str,
    incident_ids: &'a BTreeSet<i64>,
    assignee_id: i64,
    assignee_name: Option<String>,
}

#[async_trait]
impl<'a, B: Backend + ?Sized> OptimisticCommand for Assign<'a, B> {
    type State = IncidentBoard;
    type Snapshot = HashMap<i64, PriorAssignment>;
    type Output = Vec<(i64, Result<()>)>;

    fn name(&self) -> &'static str {
        "assign"
    }

    fn apply(&self, board: &IncidentBoard) -> Result<Self::Snapshot> {
        let mut prior = HashMap::new();
        for &id in self.incident_ids {
            let stamped = board.update(id, |incident| {
                let before = (incident.assigned_user_id, incident.assigned_user.clone());
                incident.assigned_user_id = Some(self.assignee_id);
                incident.assigned_user = self.assignee_name.clone();
                before
            });
            if let Ok(before) = stamped {
                prior.insert(id, before);
            }
        }
        Ok(prior)
    }

    async fn execute(&self) -> Result<Self::Output> {
        let user_ids = [self.assignee_id];
        let calls = self.incident_ids.iter().map(|&id| async move {
            let outcome = self
                .backend
                .notify_incident_assignment(self.token, id, &user_ids)
                .await;
            (id, outcome)
        });
        Ok(join_all(calls).await)
    }

    fn commit(&self, board: &IncidentBoard, outcomes: &Self::Output, mut prior: Self::Snapshot) {
        for (id, outcome) in outcomes {
            if let Err(e) = outcome {
                warn!(incident_id = id, error = %e, "Assignment failed, reverting");
                if let Some(before) = prior.remove(id) {
                    restore(board, *id, before);
                }
            }
        }
    }

    fn compensate(&self, board: &IncidentBoard, prior: Self::Snapshot) {
        for (id, before) in prior {
            restore(board, id, before);
        }
    }
}

fn restore(board: &IncidentBoard, id: i64, (user_id, user): PriorAssignment) {
    let restored = board.update(id, |incident| {
        incident.assigned_user_id = user_id;
        incident.assigned_user = user;
    });
    if restored.is_err() {
        warn!(incident_id = id, "Incident vanished before assignment rollback");
    }
}
