//! Incident refresh, acknowledgement and viewer reports.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::board::IncidentBoard;
use crate::error::{Error, Result};
use crate::optimistic::{self, OptimisticCommand};
use crate::poller::ContextGuard;
use crate::session::Session;
use crate::types::incident::{
    Incident, IncidentStatus, IncidentType, NewIncident, ReporterContact, Severity, Transition,
};
use crate::types::user::{Actor, Role};

/// Fetch the full list and show it unless a newer fetch already landed.
///
/// With a `guard`, the result is also dropped if its screen closed while
/// the request was out.
pub async fn refresh<B: Backend + ?Sized>(
    backend: &B,
    board: &IncidentBoard,
    session: &Session,
    guard: Option<&ContextGuard>,
) -> Result<bool> {
    let ticket = board.begin_fetch();
    let incidents = backend.list_incidents(&session.token).await?;
    if guard.is_some_and(|g| !g.is_active()) {
        debug!("Context closed, dropping incident list");
        return Ok(false);
    }
    Ok(board.apply_fetch(ticket, incidents))
}

struct AcknowledgeSnapshot {
    status: IncidentStatus,
    assigned_user_id: Option<i64>,
    assigned_user: Option<String>,
}

struct Acknowledge<'a, B: ?Sized> {
    backend: &'a B,
    token: &'a str,
    actor: &'a Actor,
    incident_id: i64,
}

impl<B: ?Sized> Acknowledge<'_, B> {
    /// The local change an acknowledgement makes, also re-applied over the
    /// backend's confirmed record.
    fn stamp(&self, incident: &mut Incident) {
        incident.status = IncidentStatus::Acknowledged;
        if self.actor.role == Role::Security {
            incident.assigned_user_id = Some(self.actor.id);
            incident.assigned_user = Some(self.actor.username.clone());
        }
    }
}

#[async_trait]
impl<'a, B: Backend + ?Sized> OptimisticCommand for Acknowledge<'a, B> {
    type State = IncidentBoard;
    type Snapshot = AcknowledgeSnapshot;
    type Output = Incident;

    fn name(&self) -> &'static str {
        "acknowledge"
    }

    fn apply(&self, board: &IncidentBoard) -> Result<AcknowledgeSnapshot> {
        board.begin_update(self.incident_id, |incident| {
            let next = incident.status.apply(Transition::Acknowledge)?;
            let snapshot = AcknowledgeSnapshot {
                status: incident.status,
                assigned_user_id: incident.assigned_user_id,
                assigned_user: incident.assigned_user.clone(),
            };
            incident.status = next;
            self.stamp(incident);
            Ok(snapshot)
        })
    }

    async fn execute(&self) -> Result<Incident> {
        self.backend
            .set_incident_acknowledged(self.token, self.incident_id, true)
            .await
    }

    fn commit(&self, board: &IncidentBoard, confirmed: &Incident, _snapshot: AcknowledgeSnapshot) {
        board.confirm_update(confirmed.clone(), |incident| self.stamp(incident));
    }

    fn compensate(&self, board: &IncidentBoard, snapshot: AcknowledgeSnapshot) {
        let restored = board.update(self.incident_id, |incident| {
            incident.status = snapshot.status;
            incident.assigned_user_id = snapshot.assigned_user_id;
            incident.assigned_user = snapshot.assigned_user;
        });
        if restored.is_err() {
            warn!(incident_id = self.incident_id, "Incident vanished before rollback");
        }
        board.finish_update(self.incident_id);
    }
}

/// Acknowledge an incident, showing the result before the backend confirms it.
///
/// Security staff take the incident on by acknowledging it. Admins only
/// change its status. The backend notifies the admin and the reporter.
pub async fn acknowledge<B: Backend + ?Sized>(
    backend: &B,
    board: &IncidentBoard,
    session: &Session,
    incident_id: i64,
) -> Result<Incident> {
    let actor = session.actor();
    if !actor.role.can_acknowledge() {
        return Err(Error::Forbidden(format!(
            "{} accounts cannot acknowledge incidents",
            actor.role
        )));
    }
    let command = Acknowledge {
        backend,
        token: &session.token,
        actor: &actor,
        incident_id,
    };
    let mut confirmed = optimistic::run(board, &command).await?;
    command.stamp(&mut confirmed);
    info!(incident_id, actor_id = actor.id, "Incident acknowledged");
    Ok(confirmed)
}

/// What a viewer fills in on the report form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub camera_id: Option<i64>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    #[serde(default)]
    pub severity_score: Option<u8>,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
}

pub async fn report<B: Backend + ?Sized>(
    backend: &B,
    board: &IncidentBoard,
    session: &Session,
    draft: ReportDraft,
) -> Result<Incident> {
    if session.role != Role::Viewer {
        return Err(Error::Forbidden(
            "only viewer accounts file incident reports".to_string(),
        ));
    }
    let user = &session.user;
    let reporter = ReporterContact {
        username: Some(user.username.clone()),
        phone: user.phone.clone(),
        email: Some(user.email.clone()),
        contact: None,
        location: draft.location.filter(|l| !l.trim().is_empty()),
    };
    let mut new = NewIncident::viewer_report(
        draft.camera_id,
        draft.incident_type,
        draft.severity,
        draft.description.trim(),
        reporter,
    );
    new.severity_score = draft.severity_score;
    new.validate()?;

    let created = backend.create_incident(&session.token, &new).await?;
    info!(incident_id = created.id, user_id = user.id, "Viewer report filed");
    board.insert(created.clone());
    Ok(created)
}
