//! Identity of whoever asks for a lifecycle change

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Kind of caller requesting a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Admin,
    Owner,
    Renter,
    /// Automated callers such as the checkout completion callback
    #[default]
    System,
}

impl FromStr for ActorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            "renter" => Ok(Self::Renter),
            "system" => Ok(Self::System),
            other => Err(AppError::Validation(format!("Invalid actor kind: {}", other))),
        }
    }
}

/// Transition requester. Carried for audit and logging only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub kind: ActorKind,
}

impl Actor {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn new(id: Uuid, kind: ActorKind) -> Self {
        Self { id: Some(id), kind }
    }
}
