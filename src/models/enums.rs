//! Canonical status vocabulary shared by every rental and equipment surface

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// RentalStatus
// ---------------------------------------------------------------------------

/// Rental lifecycle status
///
/// `pending → confirmed → (delivering →) in_progress → completed`, with
/// `cancelled` reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Pending,
    #[serde(alias = "approved")]
    Confirmed,
    Delivering,
    InProgress,
    Completed,
    #[serde(alias = "rejected")]
    Cancelled,
}

impl RentalStatus {
    pub const ALL: [RentalStatus; 6] = [
        RentalStatus::Pending,
        RentalStatus::Confirmed,
        RentalStatus::Delivering,
        RentalStatus::InProgress,
        RentalStatus::Completed,
        RentalStatus::Cancelled,
    ];

    /// Statuses reachable in one step from `self`
    pub fn allowed_targets(self) -> &'static [RentalStatus] {
        use RentalStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Delivering, InProgress, Cancelled],
            Delivering => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    /// Whether `self → target` is listed in the transition table.
    /// A same-status pair is never listed.
    pub fn can_transition_to(self, target: RentalStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// The equipment is held by this rental
    pub fn is_occupying(self) -> bool {
        matches!(
            self,
            RentalStatus::Confirmed | RentalStatus::Delivering | RentalStatus::InProgress
        )
    }

    /// The rental hands the equipment back
    pub fn is_releasing(self) -> bool {
        matches!(self, RentalStatus::Completed | RentalStatus::Cancelled)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Stored and wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            RentalStatus::Pending => "pending",
            RentalStatus::Confirmed => "confirmed",
            RentalStatus::Delivering => "delivering",
            RentalStatus::InProgress => "in_progress",
            RentalStatus::Completed => "completed",
            RentalStatus::Cancelled => "cancelled",
        }
    }

    /// Human readable label for back-office screens
    pub fn label(self) -> &'static str {
        match self {
            RentalStatus::Pending => "Awaiting confirmation",
            RentalStatus::Confirmed => "Confirmed",
            RentalStatus::Delivering => "Out for delivery",
            RentalStatus::InProgress => "In progress",
            RentalStatus::Completed => "Completed",
            RentalStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for RentalStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RentalStatus::Pending),
            "confirmed" | "approved" => Ok(RentalStatus::Confirmed),
            "delivering" => Ok(RentalStatus::Delivering),
            "in_progress" => Ok(RentalStatus::InProgress),
            "completed" => Ok(RentalStatus::Completed),
            "cancelled" | "rejected" => Ok(RentalStatus::Cancelled),
            other => Err(AppError::Validation(format!("Unknown rental status '{}'", other))),
        }
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

/// Payment state, orthogonal to the rental status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    /// Cash on delivery
    Cod,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cod => "cod",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "cod" => Ok(PaymentStatus::Cod),
            other => Err(AppError::Validation(format!("Unknown payment status '{}'", other))),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Equipment availability
///
/// `available`/`rented` are derived from rentals by the lifecycle engine.
/// `maintenance`/`unavailable` are set by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Rented,
    Maintenance,
    Unavailable,
}

impl Availability {
    pub fn is_owner_managed(self) -> bool {
        matches!(self, Availability::Maintenance | Availability::Unavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Rented => "rented",
            Availability::Maintenance => "maintenance",
            Availability::Unavailable => "unavailable",
        }
    }
}

impl FromStr for Availability {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Availability::Available),
            "rented" => Ok(Availability::Rented),
            "maintenance" => Ok(Availability::Maintenance),
            "unavailable" => Ok(Availability::Unavailable),
            other => Err(AppError::Validation(format!("Unknown availability '{}'", other))),
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OwnerAvailability
// ---------------------------------------------------------------------------

/// What an owner may request for their equipment.
///
/// `active` hands the value back to the engine, which re-derives
/// `available` or `rented` from the current rentals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OwnerAvailability {
    Active,
    Maintenance,
    Unavailable,
}
