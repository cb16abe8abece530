//! Equipment availability derivation.
//!
//! Pure decisions only: given a rental status, the equipment's current
//! availability and the number of other occupying rentals, say what (if
//! anything) to write. The lifecycle engine performs the I/O.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::enums::{Availability, RentalStatus};

/// Why no availability write happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// `pending` never touches the equipment
    NoEquipmentEffect,
    /// Owner-set value the engine must not replace
    OwnerManaged { availability: Availability },
    /// Another rental still holds the equipment
    StillOccupied { other_rentals: i64 },
    /// Stored value already matches the rentals
    AlreadyConsistent,
}

/// Decision for one equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AvailabilityPlan {
    Write { from: Availability, to: Availability },
    Skip { reason: SkipReason },
}

/// Knobs for [`plan_for_status`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivationPolicy {
    pub rented_overrides_owner_status: bool,
}

/// Availability a rental status implies, if any
pub fn implied_availability(status: RentalStatus) -> Option<Availability> {
    if status.is_occupying() {
        Some(Availability::Rented)
    } else if status.is_releasing() {
        Some(Availability::Available)
    } else {
        None
    }
}

/// Whether deciding for `status` needs the sibling-rental count
pub fn needs_sibling_count(status: RentalStatus, current: Availability) -> bool {
    status.is_releasing() && !current.is_owner_managed()
}

/// Availability write implied by a rental entering `status`.
///
/// `other_occupying` counts occupying rentals of the same equipment other
/// than the one being transitioned; it is only consulted on release.
pub fn plan_for_status(
    status: RentalStatus,
    current: Availability,
    other_occupying: i64,
    policy: DerivationPolicy,
) -> AvailabilityPlan {
    let Some(target) = implied_availability(status) else {
        return AvailabilityPlan::Skip {
            reason: SkipReason::NoEquipmentEffect,
        };
    };

    if current.is_owner_managed()
        && !(target == Availability::Rented && policy.rented_overrides_owner_status)
    {
        return AvailabilityPlan::Skip {
            reason: SkipReason::OwnerManaged {
                availability: current,
            },
        };
    }

    if target == Availability::Available && other_occupying > 0 {
        return AvailabilityPlan::Skip {
            reason: SkipReason::StillOccupied {
                other_rentals: other_occupying,
            },
        };
    }

    if target == current {
        return AvailabilityPlan::Skip {
            reason: SkipReason::AlreadyConsistent,
        };
    }

    AvailabilityPlan::Write {
        from: current,
        to: target,
    }
}

/// Recompute availability from scratch out of the occupying-rental count
pub fn plan_from_rentals(current: Availability, occupying: i64) -> AvailabilityPlan {
    if current.is_owner_managed() {
        return AvailabilityPlan::Skip {
            reason: SkipReason::OwnerManaged {
                availability: current,
            },
        };
    }

    let target = if occupying > 0 {
        Availability::Rented
    } else {
        Availability::Available
    };

    if target == current {
        AvailabilityPlan::Skip {
            reason: SkipReason::AlreadyConsistent,
        }
    } else {
        AvailabilityPlan::Write {
            from: current,
            to: target,
        }
    }
}
