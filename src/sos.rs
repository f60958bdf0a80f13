//! Panic button handling.
//!
//! A dashboard session may send one SOS. The latch is taken before the
//! request goes out and stays taken even if the request fails, so repeated
//! taps on a slow network never create duplicates. Opening a dashboard
//! resets it.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::Backend;
use crate::board::IncidentBoard;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::incident::{
    Incident, IncidentType, NewIncident, Provenance, ReporterContact, Severity,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosContext {
    pub camera_id: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SosOutcome {
    Sent { incident: Incident },
    /// No camera to attach the alert to. The user still sees it as sent.
    RecordedLocally,
}

/// The call is placed whether or not the SOS went through, so both halves
/// are reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotSeenOutcome {
    pub sos: Option<SosOutcome>,
    pub sos_error: Option<String>,
    pub call_placed: bool,
}

/// Places a phone call outside the app.
pub trait Dialer: Send + Sync {
    fn dial(&self, number: &str) -> Result<(), String>;
}

/// `tel:` URI for a configured contact, keeping only digits and a leading `+`.
pub fn tel_uri(number: &str) -> Result<String, String> {
    let trimmed = number.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(format!("'{}' is not a phone number", number));
    }
    Ok(format!("tel:{}{}", plus, digits))
}

#[derive(Debug, Default)]
pub struct SosTrigger {
    fired: AtomicBool,
}

impl SosTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a dashboard session starts.
    pub fn reset(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub async fn trigger<B: Backend + ?Sized>(
        &self,
        backend: &B,
        board: &IncidentBoard,
        session: &Session,
        ctx: &SosContext,
    ) -> Result<SosOutcome> {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SosAlreadyTriggered);
        }

        let user = &session.user;
        let Some(camera_id) = ctx.camera_id else {
            warn!(user_id = user.id, "SOS without camera context, not sent to backend");
            return Ok(SosOutcome::RecordedLocally);
        };

        let mut description = format!("Emergency SOS from {}", user.username);
        if let Some(note) = ctx.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            description.push_str(": ");
            description.push_str(note);
        }
        let alert = NewIncident {
            camera_id: Some(camera_id),
            incident_type: IncidentType::FallHealth,
            severity: Severity::Critical,
            severity_score: Some(100),
            description,
            provenance: Provenance::SosAlert,
            reporter: Some(ReporterContact {
                username: Some(user.username.clone()),
                phone: user.phone.clone(),
                email: Some(user.email.clone()),
                contact: None,
                location: ctx.location.clone(),
            }),
        };

        match backend.create_incident(&session.token, &alert).await {
            Ok(incident) => {
                info!(incident_id = incident.id, user_id = user.id, camera_id, "SOS sent");
                board.insert(incident.clone());
                Ok(SosOutcome::Sent { incident })
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "SOS failed");
                Err(e)
            }
        }
    }

    /// "I have not seen this incident": raise an SOS, then call for help.
    pub async fn report_not_seen<B: Backend + ?Sized, D: Dialer + ?Sized>(
        &self,
        backend: &B,
        board: &IncidentBoard,
        session: &Session,
        ctx: &SosContext,
        dialer: &D,
        emergency_contact: Option<&str>,
    ) -> NotSeenOutcome {
        let (sos, sos_error) = match self.trigger(backend, board, session, ctx).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(error = %e, "SOS not raised, calling anyway");
                (None, Some(e.to_string()))
            }
        };
        let call_placed = match emergency_contact.map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => match dialer.dial(number) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Could not place emergency call");
                    false
                }
            },
            None => {
                warn!("No emergency contact configured");
                false
            }
        };
        NotSeenOutcome {
            sos,
            sos_error,
            call_placed,
        }
    }
}
