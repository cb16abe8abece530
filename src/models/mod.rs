//! Data models for Rentflow

pub mod actor;
pub mod enums;
pub mod equipment;
pub mod event;
pub mod rental;

// Re-export commonly used types
pub use actor::{Actor, ActorKind};
pub use enums::{Availability, OwnerAvailability, PaymentStatus, RentalStatus};
pub use equipment::Equipment;
pub use event::LifecycleEvent;
pub use rental::Rental;
