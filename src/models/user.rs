// src/models/user.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::time;

/// Console roles. Serialized uppercase on the wire ("USER" / "ADMIN").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Token claims carried through the auth guard into handlers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub name: String,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Stored user record. Never serialized to clients directly; see [`UserInfo`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

impl UserRecord {
    pub fn new_admin(name: &str, email: &str, password_hash: String) -> Self {
        Self::new(name, email, password_hash, Role::Admin)
    }

    pub fn new_user(name: &str, email: &str, password_hash: String) -> Self {
        Self::new(name, email, password_hash, Role::User)
    }

    fn new(name: &str, email: &str, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.to_lowercase(),
            password_hash,
            role,
            created_at: time::now(),
        }
    }
}

/// Public projection of a user, safe for API responses.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<&UserRecord> for UserInfo {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at.clone(),
        }
    }
}
