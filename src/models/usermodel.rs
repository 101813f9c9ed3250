use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    ServiceProvider,
    ServiceRequester,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::ServiceProvider => "service_provider",
            UserRole::ServiceRequester => "service_requester",
            UserRole::Admin => "admin",
        }
    }
}

/// The authenticated identity performing an operation. Supplied by the
/// identity provider, never looked up by the engines.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn provider(id: Uuid) -> Self {
        Self::new(id, UserRole::ServiceProvider)
    }

    pub fn requester(id: Uuid) -> Self {
        Self::new(id, UserRole::ServiceRequester)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, UserRole::Admin)
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.id == user_id
    }
}
