//! Remote backend contract.
//!
//! Every lifecycle component talks to the backend through [`Backend`], so
//! the HTTP client can be swapped for a scripted fake in tests.

pub mod http;
pub mod tags;
pub mod wire;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::evidence::{Evidence, VerificationResult};
use crate::types::incident::{Incident, NewIncident};
use crate::types::user::{Credentials, ProfileUpdate, Role, User};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials, role: Role) -> Result<AuthGrant>;

    async fn fetch_current_user(&self, token: &str) -> Result<User>;

    /// All incidents. Role filtering happens on the client.
    async fn list_incidents(&self, token: &str) -> Result<Vec<Incident>>;

    async fn create_incident(&self, token: &str, incident: &NewIncident) -> Result<Incident>;

    async fn set_incident_acknowledged(
        &self,
        token: &str,
        incident_id: i64,
        acknowledged: bool,
    ) -> Result<Incident>;

    async fn notify_incident_assignment(
        &self,
        token: &str,
        incident_id: i64,
        user_ids: &[i64],
    ) -> Result<()>;

    async fn list_evidence(&self, token: &str) -> Result<Vec<Evidence>>;

    async fn verify_evidence(&self, token: &str, evidence_id: i64) -> Result<VerificationResult>;

    async fn update_user_profile(
        &self,
        token: &str,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User>;

    async fn list_users(&self, token: &str, role: Role) -> Result<Vec<User>>;
}
