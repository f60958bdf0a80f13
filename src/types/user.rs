use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Security,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Security, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Security => "security",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "security" => Ok(Role::Security),
            "admin" => Ok(Role::Admin),
            _ => Err(format!(
                "Invalid role: '{}'. Must be 'viewer', 'security' or 'admin'",
                s
            )),
        }
    }

    /// Roles allowed to acknowledge incidents.
    pub fn can_acknowledge(&self) -> bool {
        matches!(self, Role::Security | Role::Admin)
    }

    /// Security acts on incidents, so it never attests evidence integrity.
    pub fn can_verify_evidence(&self) -> bool {
        matches!(self, Role::Viewer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub camera_ids: Vec<i64>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            camera_ids: self.camera_ids.iter().copied().collect(),
        }
    }
}

/// Identity used by every permission and visibility decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub camera_ids: BTreeSet<i64>,
}

impl Actor {
    pub fn owns_camera(&self, camera_id: i64) -> bool {
        self.camera_ids.contains(&camera_id)
    }
}

/// Mutable profile fields. Email is fixed at registration and has no slot here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
