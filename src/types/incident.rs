use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::evidence::Evidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    AbuseViolence,
    Theft,
    FallHealth,
    AccidentCarTheft,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Canonical score for a tier, used when a caller does not pick one.
    pub fn default_score(&self) -> u8 {
        match self {
            Severity::Low => 30,
            Severity::Medium => 60,
            Severity::High => 90,
            Severity::Critical => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Acknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Acknowledge,
    /// Named by the UI but not supported by the backend contract.
    Revoke,
}

impl Transition {
    fn as_str(&self) -> &'static str {
        match self {
            Transition::Acknowledge => "acknowledge",
            Transition::Revoke => "revoke",
        }
    }
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Acknowledged => "acknowledged",
        }
    }

    pub fn apply(self, transition: Transition) -> Result<IncidentStatus> {
        match (self, transition) {
            (IncidentStatus::Pending, Transition::Acknowledge) => Ok(IncidentStatus::Acknowledged),
            (from, t) => Err(Error::InvalidTransition {
                from: from.as_str(),
                transition: t.as_str(),
            }),
        }
    }
}

/// Where an incident came from. Carried as a description tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Camera,
    ViewerReport,
    SosAlert,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterContact {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub location: Option<String>,
}

impl ReporterContact {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.contact.is_none()
            && self.location.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reported,
    Assigned,
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: i64,
    pub camera_id: Option<i64>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub severity_score: u8,
    pub description: String,
    pub provenance: Provenance,
    pub reporter: Option<ReporterContact>,
    pub status: IncidentStatus,
    pub assigned_user_id: Option<i64>,
    pub assigned_user: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub evidence_items: Vec<Evidence>,
}

impl Incident {
    /// Boolean view of `status` for the presentation edge.
    pub fn acknowledged(&self) -> bool {
        self.status == IncidentStatus::Acknowledged
    }

    pub fn stage(&self) -> Stage {
        match (self.status, self.assigned_user_id) {
            (IncidentStatus::Acknowledged, _) => Stage::Acknowledged,
            (IncidentStatus::Pending, Some(_)) => Stage::Assigned,
            (IncidentStatus::Pending, None) => Stage::Reported,
        }
    }

    pub fn reporter_username(&self) -> Option<&str> {
        self.reporter.as_ref().and_then(|r| r.username.as_deref())
    }
}

/// Payload for `create_incident`, shared by viewer reports and SOS alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub camera_id: Option<i64>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub severity_score: Option<u8>,
    pub description: String,
    pub provenance: Provenance,
    pub reporter: Option<ReporterContact>,
}

impl NewIncident {
    pub fn viewer_report(
        camera_id: Option<i64>,
        incident_type: IncidentType,
        severity: Severity,
        description: impl Into<String>,
        reporter: ReporterContact,
    ) -> Self {
        Self {
            camera_id,
            incident_type,
            severity,
            severity_score: None,
            description: description.into(),
            provenance: Provenance::ViewerReport,
            reporter: Some(reporter),
        }
    }

    pub fn effective_score(&self) -> u8 {
        self.severity_score
            .unwrap_or_else(|| self.severity.default_score())
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::Validation("description must not be empty".to_string()));
        }
        if let Some(score) = self.severity_score {
            if score > 100 {
                return Err(Error::Validation(format!(
                    "severity score {} is outside 0-100",
                    score
                )));
            }
        }
        Ok(())
    }
}
