use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::wire::{
    error_message, WireAcknowledge, WireAssignment, WireAuthGrant, WireIncident, WireLogin,
    WireNewIncident,
};
use crate::api::{AuthGrant, Backend};
use crate::error::{Error, Result};
use crate::types::evidence::{Evidence, VerificationResult};
use crate::types::incident::{Incident, NewIncident};
use crate::types::user::{Credentials, ProfileUpdate, Role, User};

/// `Backend` over the REST API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        debug!(status = status.as_u16(), %message, "Backend returned error");
        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized,
            StatusCode::FORBIDDEN => Error::Forbidden(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Backend {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Decode a list, skipping items that do not parse.
    async fn send_list<W, T>(&self, request: RequestBuilder, key: &str) -> Result<Vec<T>>
    where
        W: DeserializeOwned,
        T: From<W>,
    {
        let value: Value = self.send_json(request).await?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove(key).or_else(|| map.remove("data")) {
                Some(Value::Array(items)) => items,
                _ => return Err(Error::Decode(format!("expected a list of {}", key))),
            },
            _ => return Err(Error::Decode(format!("expected a list of {}", key))),
        };

        let total = items.len();
        let parsed: Vec<T> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<W>(item) {
                Ok(w) => Some(T::from(w)),
                Err(e) => {
                    warn!(error = %e, kind = key, "Skipping malformed item");
                    None
                }
            })
            .collect();
        if parsed.len() < total {
            warn!(kind = key, skipped = total - parsed.len(), "Dropped malformed items");
        }
        Ok(parsed)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn authenticate(&self, credentials: &Credentials, role: Role) -> Result<AuthGrant> {
        let body = WireLogin {
            username: &credentials.username,
            password: &credentials.password,
            role: role.as_str(),
        };
        let grant: WireAuthGrant = self
            .send_json(self.client.post(self.url("/api/auth/login")).json(&body))
            .await?;
        if grant.user.role != role {
            return Err(Error::Forbidden(format!(
                "this account is registered as {}, not {}",
                grant.user.role, role
            )));
        }
        Ok(AuthGrant {
            token: grant.token,
            user: grant.user,
        })
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User> {
        self.send_json(self.client.get(self.url("/api/auth/me")).bearer_auth(token))
            .await
    }

    async fn list_incidents(&self, token: &str) -> Result<Vec<Incident>> {
        self.send_list::<WireIncident, Incident>(
            self.client.get(self.url("/api/incidents")).bearer_auth(token),
            "incidents",
        )
        .await
    }

    async fn create_incident(&self, token: &str, incident: &NewIncident) -> Result<Incident> {
        incident.validate()?;
        let body = WireNewIncident::from(incident);
        let wire: WireIncident = self
            .send_json(
                self.client
                    .post(self.url("/api/incidents"))
                    .bearer_auth(token)
                    .json(&body),
            )
            .await?;
        Ok(wire.into())
    }

    async fn set_incident_acknowledged(
        &self,
        token: &str,
        incident_id: i64,
        acknowledged: bool,
    ) -> Result<Incident> {
        let wire: WireIncident = self
            .send_json(
                self.client
                    .patch(self.url(&format!("/api/incidents/{}/acknowledge", incident_id)))
                    .bearer_auth(token)
                    .json(&WireAcknowledge::new(acknowledged)),
            )
            .await?;
        Ok(wire.into())
    }

    async fn notify_incident_assignment(
        &self,
        token: &str,
        incident_id: i64,
        user_ids: &[i64],
    ) -> Result<()> {
        self.send(
            self.client
                .post(self.url(&format!("/api/incidents/{}/notify", incident_id)))
                .bearer_auth(token)
                .json(&WireAssignment { user_ids }),
        )
        .await?;
        Ok(())
    }

    async fn list_evidence(&self, token: &str) -> Result<Vec<Evidence>> {
        self.send_list::<Evidence, Evidence>(
            self.client
                .get(self.url("/api/evidence/my-evidence"))
                .bearer_auth(token),
            "evidence",
        )
        .await
    }

    async fn verify_evidence(&self, token: &str, evidence_id: i64) -> Result<VerificationResult> {
        self.send_json(
            self.client
                .post(self.url(&format!("/api/evidence/{}/verify", evidence_id)))
                .bearer_auth(token),
        )
        .await
    }

    async fn update_user_profile(
        &self,
        token: &str,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<User> {
        if update.is_empty() {
            return Err(Error::Validation("nothing to update".to_string()));
        }
        self.send_json(
            self.client
                .put(self.url(&format!("/api/users/{}", user_id)))
                .bearer_auth(token)
                .json(update),
        )
        .await
    }

    async fn list_users(&self, token: &str, role: Role) -> Result<Vec<User>> {
        self.send_list::<User, User>(
            self.client
                .get(self.url("/api/users"))
                .query(&[("role", role.as_str())])
                .bearer_auth(token),
            "users",
        )
        .await
    }
}
