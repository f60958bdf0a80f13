//! Scripted in-memory backend used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::api::{AuthGrant, Backend};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::evidence::{Evidence, VerificationResult, VerificationStatus};
use crate::types::incident::{
    Incident, IncidentStatus, IncidentType, NewIncident, Provenance, ReporterContact, Severity,
};
use crate::types::user::{Credentials, ProfileUpdate, Role, User};

#[derive(Default)]
pub struct FakeBackend {
    pub incidents: Mutex<Vec<Incident>>,
    pub evidence: Mutex<Vec<Evidence>>,
    pub users: Mutex<Vec<User>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Error>>,
    delays: Mutex<HashMap<String, Duration>>,
    list_script: Mutex<VecDeque<(Duration, Vec<Incident>)>>,
    evidence_script: Mutex<VecDeque<(Duration, Vec<Evidence>)>>,
    verify_results: Mutex<HashMap<i64, VerificationResult>>,
    next_id: Mutex<i64>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1000),
            ..Self::default()
        }
    }

    pub fn with_incidents(incidents: Vec<Incident>) -> Self {
        let fake = Self::new();
        *fake.incidents.lock().unwrap() = incidents;
        fake
    }

    /// Make every call with this key fail, e.g. `"ack:42"` or `"notify:2"`.
    pub fn fail(&self, key: &str, error: Error) {
        self.failures.lock().unwrap().insert(key.to_string(), error);
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
    }

    /// Queue a delayed `list_incidents` response.
    pub fn script_list(&self, delay: Duration, incidents: Vec<Incident>) {
        self.list_script.lock().unwrap().push_back((delay, incidents));
    }

    /// Queue an evidence list response returned after `delay`.
    pub fn script_evidence(&self, delay: Duration, items: Vec<Evidence>) {
        self.evidence_script.lock().unwrap().push_back((delay, items));
    }

    pub fn set_verify_result(&self, evidence_id: i64, result: VerificationResult) {
        self.verify_results.lock().unwrap().insert(evidence_id, result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn enter(&self, key: String) -> Result<()> {
        self.calls.lock().unwrap().push(key.clone());
        let delay = {
            let delays = self.delays.lock().unwrap();
            delays
                .get(&key)
                .or_else(|| delays.get(key.split(':').next().unwrap_or("")))
                .copied()
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if let Some(e) = self.failures.lock().unwrap().get(&key) {
            return Err(e.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn authenticate(&self, credentials: &Credentials, role: Role) -> Result<AuthGrant> {
        self.enter(format!("auth:{}", credentials.username)).await?;
        let user = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == credentials.username)
            .cloned()
            .ok_or(Error::Unauthorized)?;
        if user.role != role {
            return Err(Error::Forbidden("role mismatch".to_string()));
        }
        Ok(AuthGrant {
            token: format!("token-{}", user.id),
            user,
        })
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User> {
        self.enter(format!("me:{}", token)).await?;
        let id: i64 = token
            .strip_prefix("token-")
            .and_then(|s| s.parse().ok())
            .ok_or(Error::Unauthorized)?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(Error::Unauthorized)
    }

    async fn list_incidents(&self, _token: &str) -> Result<Vec<Incident>> {
        let scripted = self.list_script.lock().unwrap().pop_front();
        if let Some((delay, incidents)) = scripted {
            self.calls.lock().unwrap().push("list".to_string());
            tokio::time::sleep(delay).await;
            return Ok(incidents);
        }
        self.enter("list".to_string()).await?;
        Ok(self.incidents.lock().unwrap().clone())
    }

    async fn create_incident(&self, _token: &str, new: &NewIncident) -> Result<Incident> {
        self.enter("create".to_string()).await?;
        new.validate()?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let incident = Incident {
            id,
            camera_id: new.camera_id,
            incident_type: new.incident_type,
            severity: new.severity,
            severity_score: new.effective_score(),
            description: new.description.clone(),
            provenance: new.provenance,
            reporter: new.reporter.clone(),
            status: IncidentStatus::Pending,
            assigned_user_id: None,
            assigned_user: None,
            timestamp: Utc::now(),
            evidence_items: Vec::new(),
        };
        self.incidents.lock().unwrap().push(incident.clone());
        Ok(incident)
    }

    async fn set_incident_acknowledged(
        &self,
        _token: &str,
        incident_id: i64,
        acknowledged: bool,
    ) -> Result<Incident> {
        self.enter(format!("ack:{}", incident_id)).await?;
        let mut incidents = self.incidents.lock().unwrap();
        let incident = incidents
            .iter_mut()
            .find(|i| i.id == incident_id)
            .ok_or_else(|| Error::NotFound(format!("incident {}", incident_id)))?;
        incident.status = if acknowledged {
            IncidentStatus::Acknowledged
        } else {
            IncidentStatus::Pending
        };
        Ok(incident.clone())
    }

    async fn notify_incident_assignment(
        &self,
        _token: &str,
        incident_id: i64,
        _user_ids: &[i64],
    ) -> Result<()> {
        self.enter(format!("notify:{}", incident_id)).await
    }

    async fn list_evidence(&self, _token: &str) -> Result<Vec<Evidence>> {
        let scripted = self.evidence_script.lock().unwrap().pop_front();
        if let Some((delay, items)) = scripted {
            self.calls.lock().unwrap().push("evidence".to_string());
            tokio::time::sleep(delay).await;
            return Ok(items);
        }
        self.enter("evidence".to_string()).await?;
        Ok(self.evidence.lock().unwrap().clone())
    }

    async fn verify_evidence(&self, _token: &str, evidence_id: i64) -> Result<VerificationResult> {
        self.enter(format!("verify:{}", evidence_id)).await?;
        Ok(self
            .verify_results
            .lock()
            .unwrap()
            .get(&evidence_id)
            .cloned()
            .unwrap_or(VerificationResult {
                status: VerificationStatus::Verified,
                blockchain_hash: Some("0xanchored".to_string()),
                current_hash: Some("0xanchored".to_string()),
                message: "Evidence integrity verified".to_string(),
            }))
    }

    async fn update_user_profile(
        &self,
        _token: &str,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User> {
        self.enter(format!("profile:{}", user_id)).await?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        if let Some(name) = &update.username {
            user.username = name.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        Ok(user.clone())
    }

    async fn list_users(&self, _token: &str, role: Role) -> Result<Vec<User>> {
        self.enter(format!("users:{}", role)).await?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }
}

pub fn user(id: i64, username: &str, role: Role, camera_ids: &[i64]) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        phone: Some(format!("555-{:04}", id)),
        role,
        camera_ids: camera_ids.to_vec(),
    }
}

pub fn session(id: i64, username: &str, role: Role, camera_ids: &[i64]) -> Session {
    Session {
        role,
        token: format!("token-{}", id),
        user: user(id, username, role, camera_ids),
    }
}

pub fn incident(id: i64, camera_id: Option<i64>, provenance: Provenance) -> Incident {
    Incident {
        id,
        camera_id,
        incident_type: IncidentType::AbuseViolence,
        severity: Severity::High,
        severity_score: 90,
        description: format!("incident {}", id),
        provenance,
        reporter: None,
        status: IncidentStatus::Pending,
        assigned_user_id: None,
        assigned_user: None,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        evidence_items: Vec::new(),
    }
}

pub fn sos_incident(id: i64, camera_id: Option<i64>, reporter: &str) -> Incident {
    Incident {
        reporter: Some(ReporterContact {
            username: Some(reporter.to_string()),
            ..ReporterContact::default()
        }),
        incident_type: IncidentType::FallHealth,
        severity: Severity::Critical,
        severity_score: 100,
        ..incident(id, camera_id, Provenance::SosAlert)
    }
}

pub fn evidence(id: i64, anchored: bool, status: VerificationStatus) -> Evidence {
    Evidence {
        id,
        incident_id: 1,
        file_path: format!("uploads/{}.jpg", id),
        sha256_hash: format!("{:064}", id),
        blockchain_tx_hash: anchored.then(|| format!("0xtx{}", id)),
        verification_status: status,
    }
}
