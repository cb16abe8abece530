//! Repository layer for database operations
//!
//! [`RentalStore`] is the persistence seam consumed by the lifecycle
//! engine. [`Repository`] implements it on Postgres, [`memory::MemoryStore`]
//! in process.

pub mod equipment;
pub mod memory;
pub mod rentals;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::{Availability, PaymentStatus, RentalStatus},
        equipment::Equipment,
        rental::Rental,
    },
};

/// Result of a compare-and-set write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The stored value no longer matched the expected prior value
    Conflict,
}

/// Persistence operations needed by the rental lifecycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn get_rental(&self, id: Uuid) -> AppResult<Option<Rental>>;

    async fn insert_rental(&self, rental: &Rental) -> AppResult<()>;

    /// Set `status` and `updated_at` only if the stored status is still `expected_prior`
    async fn save_rental_status(
        &self,
        id: Uuid,
        status: RentalStatus,
        expected_prior: RentalStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome>;

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()>;

    /// Rentals of `equipment_id` in an occupying status, optionally ignoring one rental
    async fn count_occupying_rentals(
        &self,
        equipment_id: Uuid,
        excluding_rental_id: Option<Uuid>,
    ) -> AppResult<i64>;

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>>;

    async fn insert_equipment(&self, equipment: &Equipment) -> AppResult<()>;

    /// Fails with `NotFound` when the equipment does not exist
    async fn get_equipment_availability(&self, id: Uuid) -> AppResult<Availability>;

    /// Set availability only if the stored value is still `expected_prior`
    async fn set_equipment_availability(
        &self,
        id: Uuid,
        value: Availability,
        expected_prior: Availability,
    ) -> AppResult<WriteOutcome>;

    /// Cheap liveness probe
    async fn ping(&self) -> AppResult<()>;
}

/// Postgres-backed repository
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub rentals: rentals::RentalsRepository,
    pub equipment: equipment::EquipmentRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            rentals: rentals::RentalsRepository::new(pool.clone()),
            equipment: equipment::EquipmentRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl RentalStore for Repository {
    async fn get_rental(&self, id: Uuid) -> AppResult<Option<Rental>> {
        self.rentals.get_by_id(id).await
    }

    async fn insert_rental(&self, rental: &Rental) -> AppResult<()> {
        self.rentals.create(rental).await
    }

    async fn save_rental_status(
        &self,
        id: Uuid,
        status: RentalStatus,
        expected_prior: RentalStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome> {
        self.rentals
            .update_status(id, status, expected_prior, updated_at)
            .await
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()> {
        self.rentals.update_payment_status(id, status).await
    }

    async fn count_occupying_rentals(
        &self,
        equipment_id: Uuid,
        excluding_rental_id: Option<Uuid>,
    ) -> AppResult<i64> {
        self.rentals
            .count_occupying(equipment_id, excluding_rental_id)
            .await
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        self.equipment.get_by_id(id).await
    }

    async fn insert_equipment(&self, equipment: &Equipment) -> AppResult<()> {
        self.equipment.create(equipment).await
    }

    async fn get_equipment_availability(&self, id: Uuid) -> AppResult<Availability> {
        self.equipment.get_availability(id).await
    }

    async fn set_equipment_availability(
        &self,
        id: Uuid,
        value: Availability,
        expected_prior: Availability,
    ) -> AppResult<WriteOutcome> {
        self.equipment
            .update_availability(id, value, expected_prior)
            .await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
