use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Tampered,
    FileMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: i64,
    pub incident_id: i64,
    pub file_path: String,
    pub sha256_hash: String,
    #[serde(default)]
    pub blockchain_tx_hash: Option<String>,
    #[serde(default = "default_verification_status")]
    pub verification_status: VerificationStatus,
}

fn default_verification_status() -> VerificationStatus {
    VerificationStatus::Pending
}

impl Evidence {
    pub fn is_anchored(&self) -> bool {
        self.blockchain_tx_hash
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }

    /// Resolve `file_path` against the static file server base.
    pub fn file_url(&self, base: &str) -> Result<Url, String> {
        if let Ok(absolute) = Url::parse(&self.file_path) {
            return Ok(absolute);
        }
        let mut base = Url::parse(base).map_err(|e| format!("Invalid base URL '{}': {}", base, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(self.file_path.trim_start_matches('/'))
            .map_err(|e| format!("Invalid evidence path '{}': {}", self.file_path, e))
    }

    pub fn display(&self) -> EvidenceDisplay {
        if !self.is_anchored() {
            return EvidenceDisplay::NotRegistered;
        }
        EvidenceDisplay::from(self.verification_status)
    }
}

/// What the evidence list shows for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceDisplay {
    NotRegistered,
    Pending,
    Verified,
    Tampered,
    FileMissing,
}

impl From<VerificationStatus> for EvidenceDisplay {
    fn from(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Pending => EvidenceDisplay::Pending,
            VerificationStatus::Verified => EvidenceDisplay::Verified,
            VerificationStatus::Tampered => EvidenceDisplay::Tampered,
            VerificationStatus::FileMissing => EvidenceDisplay::FileMissing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub blockchain_hash: Option<String>,
    pub current_hash: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(path: &str, tx: Option<&str>) -> Evidence {
        Evidence {
            id: 1,
            incident_id: 10,
            file_path: path.to_string(),
            sha256_hash: "ab".repeat(32),
            blockchain_tx_hash: tx.map(String::from),
            verification_status: VerificationStatus::Verified,
        }
    }

    #[test]
    fn unanchored_evidence_is_never_pending() {
        let mut ev = evidence("a.jpg", None);
        ev.verification_status = VerificationStatus::Pending;
        assert_eq!(ev.display(), EvidenceDisplay::NotRegistered);
        ev.blockchain_tx_hash = Some("  ".to_string());
        assert_eq!(ev.display(), EvidenceDisplay::NotRegistered);
    }

    #[test]
    fn anchored_evidence_shows_status() {
        let ev = evidence("a.jpg", Some("0xabc"));
        assert_eq!(ev.display(), EvidenceDisplay::Verified);
    }

    #[test]
    fn file_url_joins_relative_path() {
        let ev = evidence("/uploads/evidence/clip.mp4", None);
        let url = ev.file_url("http://10.0.0.5:8000/static").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:8000/static/uploads/evidence/clip.mp4");
    }

    #[test]
    fn file_url_keeps_absolute_path() {
        let ev = evidence("https://cdn.example.com/x.jpg", None);
        let url = ev.file_url("http://localhost:8000").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/x.jpg");
    }

    #[test]
    fn missing_status_defaults_to_pending() {
        let json = r#"{"id":5,"incidentId":2,"filePath":"f.jpg","sha256Hash":"00"}"#;
        let ev: Evidence = serde_json::from_str(json).unwrap();
        assert_eq!(ev.verification_status, VerificationStatus::Pending);
        assert!(!ev.is_anchored());
    }
}
