use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::tags::{parse_description, render_description};
use crate::types::evidence::Evidence;
use crate::types::incident::{
    Incident, IncidentStatus, IncidentType, NewIncident, Severity,
};

fn default_type() -> IncidentType {
    IncidentType::Other
}

fn default_severity() -> Severity {
    Severity::Medium
}

/// Incident as the legacy backend sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIncident {
    pub id: i64,
    #[serde(default)]
    pub camera_id: Option<i64>,
    #[serde(rename = "type", default = "default_type")]
    pub incident_type: IncidentType,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub severity_score: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub acknowledged: Option<bool>,
    #[serde(default)]
    pub assigned_user_id: Option<i64>,
    #[serde(default)]
    pub assigned_user: Option<WireAssignee>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub evidence_items: Vec<Evidence>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireAssignee {
    Name(String),
    User {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        username: Option<String>,
    },
}

impl WireIncident {
    /// Either representation of the acknowledged flag counts.
    pub fn normalized_status(&self) -> IncidentStatus {
        let by_status = self
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("acknowledged"));
        if by_status || self.acknowledged == Some(true) {
            IncidentStatus::Acknowledged
        } else {
            IncidentStatus::Pending
        }
    }
}

impl From<WireIncident> for Incident {
    fn from(wire: WireIncident) -> Self {
        let status = wire.normalized_status();
        let parsed = parse_description(&wire.description);
        let (assignee_id, assignee_name) = match wire.assigned_user {
            Some(WireAssignee::Name(name)) => (None, Some(name)),
            Some(WireAssignee::User { id, username }) => (id, username),
            None => (None, None),
        };
        let score = wire
            .severity_score
            .map(|s| s.clamp(0, 100) as u8)
            .unwrap_or_else(|| wire.severity.default_score());

        Incident {
            id: wire.id,
            camera_id: wire.camera_id,
            incident_type: wire.incident_type,
            severity: wire.severity,
            severity_score: score,
            description: parsed.body,
            provenance: parsed.provenance,
            reporter: parsed.reporter,
            status,
            assigned_user_id: wire.assigned_user_id.or(assignee_id),
            assigned_user: assignee_name,
            timestamp: wire.timestamp,
            evidence_items: wire.evidence_items,
        }
    }
}

/// Body for `POST /api/incidents`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNewIncident {
    pub camera_id: Option<i64>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub severity_score: u8,
    pub description: String,
    pub status: &'static str,
    pub acknowledged: bool,
}

impl From<&NewIncident> for WireNewIncident {
    fn from(new: &NewIncident) -> Self {
        Self {
            camera_id: new.camera_id,
            incident_type: new.incident_type,
            severity: new.severity,
            severity_score: new.effective_score(),
            description: render_description(
                new.provenance,
                &new.description,
                new.reporter.as_ref(),
            ),
            status: IncidentStatus::Pending.as_str(),
            acknowledged: false,
        }
    }
}

/// Body for the acknowledge endpoint. Both legacy fields are written together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAcknowledge {
    pub acknowledged: bool,
    pub status: &'static str,
}

impl WireAcknowledge {
    pub fn new(acknowledged: bool) -> Self {
        let status = if acknowledged {
            IncidentStatus::Acknowledged
        } else {
            IncidentStatus::Pending
        };
        Self {
            acknowledged,
            status: status.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAssignment<'a> {
    pub user_ids: &'a [i64],
}

#[derive(Debug, Clone, Serialize)]
pub struct WireLogin<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAuthGrant {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: String,
    pub user: crate::types::user::User,
}

/// Pull a human-readable message out of an error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()).map(String::from))
}
