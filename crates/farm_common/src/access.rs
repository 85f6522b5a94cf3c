//! Access-control seam between the core and the external session store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dashboard role as stored by the login layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Student: full control
    Aluno,
    /// Instructor: read-only
    Professor,
    Custom(String),
}

impl Role {
    /// Whether this role may send actuator commands
    pub fn can_write(&self) -> bool {
        !matches!(self, Role::Professor)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Aluno => "aluno",
            Role::Professor => "professor",
            Role::Custom(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "aluno" => Role::Aluno,
            "professor" => Role::Professor,
            _ => Role::Custom(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Role::from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the core needs to know about the logged-in user
pub trait AccessControl: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn current_role(&self) -> Role;

    /// Identity written to the audit log
    fn actor_id(&self) -> String;
}

/// Fixed session, e.g. built from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    #[serde(default = "default_authenticated")]
    pub authenticated: bool,
}

fn default_authenticated() -> bool {
    true
}

impl Session {
    pub fn new(username: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            role,
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            role: Role::Aluno,
            authenticated: false,
        }
    }
}

impl AccessControl for Session {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn current_role(&self) -> Role {
        self.role.clone()
    }

    fn actor_id(&self) -> String {
        self.username.clone()
    }
}
