//! In-process [`RentalStore`] used by the `memory` backend and by tests.
//!
//! Besides storage it counts writes and can be told to fail upcoming
//! equipment writes, so partial-failure recovery can be exercised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{RentalStore, WriteOutcome};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{Availability, PaymentStatus, RentalStatus},
        equipment::Equipment,
        rental::Rental,
    },
};

#[derive(Default)]
struct Tables {
    rentals: HashMap<Uuid, Rental>,
    equipment: HashMap<Uuid, Equipment>,
}

#[derive(Default)]
struct Counters {
    rental_writes: AtomicUsize,
    equipment_writes: AtomicUsize,
    failing_equipment_writes: AtomicUsize,
}

/// Write counts observed by a [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteCounts {
    pub rental_writes: usize,
    pub equipment_writes: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    /// Make the next `n` equipment availability writes fail
    pub fn fail_next_equipment_writes(&self, n: usize) {
        self.counters.failing_equipment_writes.store(n, Ordering::SeqCst);
    }

    /// Status and availability writes committed so far
    pub fn write_counts(&self) -> WriteCounts {
        WriteCounts {
            rental_writes: self.counters.rental_writes.load(Ordering::SeqCst),
            equipment_writes: self.counters.equipment_writes.load(Ordering::SeqCst),
        }
    }

    /// Overwrite a rental status behind the engine's back, as a second
    /// process would
    pub fn force_rental_status(&self, id: Uuid, status: RentalStatus) -> AppResult<()> {
        let mut tables = self.tables()?;
        let rental = tables
            .rentals
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))?;
        rental.status = status;
        Ok(())
    }

    /// Overwrite an equipment availability behind the engine's back
    pub fn force_availability(&self, id: Uuid, value: Availability) -> AppResult<()> {
        let mut tables = self.tables()?;
        let equipment = tables
            .equipment
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment.availability = value;
        Ok(())
    }

    fn take_equipment_failure(&self) -> bool {
        self.counters
            .failing_equipment_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn get_rental(&self, id: Uuid) -> AppResult<Option<Rental>> {
        Ok(self.tables()?.rentals.get(&id).cloned())
    }

    async fn insert_rental(&self, rental: &Rental) -> AppResult<()> {
        let mut tables = self.tables()?;
        if tables.rentals.contains_key(&rental.id) {
            return Err(AppError::Conflict(format!("Rental {} already exists", rental.id)));
        }
        tables.rentals.insert(rental.id, rental.clone());
        Ok(())
    }

    async fn save_rental_status(
        &self,
        id: Uuid,
        status: RentalStatus,
        expected_prior: RentalStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome> {
        let mut tables = self.tables()?;
        match tables.rentals.get_mut(&id) {
            Some(rental) if rental.status == expected_prior => {
                rental.status = status;
                rental.updated_at = updated_at;
                self.counters.rental_writes.fetch_add(1, Ordering::SeqCst);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::Conflict),
        }
    }

    async fn set_payment_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()> {
        let mut tables = self.tables()?;
        let rental = tables
            .rentals
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))?;
        rental.payment_status = status;
        Ok(())
    }

    async fn count_occupying_rentals(
        &self,
        equipment_id: Uuid,
        excluding_rental_id: Option<Uuid>,
    ) -> AppResult<i64> {
        let tables = self.tables()?;
        let count = tables
            .rentals
            .values()
            .filter(|r| r.equipment_id == equipment_id)
            .filter(|r| Some(r.id) != excluding_rental_id)
            .filter(|r| r.status.is_occupying())
            .count();
        Ok(count as i64)
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        Ok(self.tables()?.equipment.get(&id).cloned())
    }

    async fn insert_equipment(&self, equipment: &Equipment) -> AppResult<()> {
        let mut tables = self.tables()?;
        if tables.equipment.contains_key(&equipment.id) {
            return Err(AppError::Conflict(format!(
                "Equipment {} already exists",
                equipment.id
            )));
        }
        tables.equipment.insert(equipment.id, equipment.clone());
        Ok(())
    }

    async fn get_equipment_availability(&self, id: Uuid) -> AppResult<Availability> {
        self.tables()?
            .equipment
            .get(&id)
            .map(|e| e.availability)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn set_equipment_availability(
        &self,
        id: Uuid,
        value: Availability,
        expected_prior: Availability,
    ) -> AppResult<WriteOutcome> {
        if self.take_equipment_failure() {
            return Err(AppError::Unavailable(format!(
                "injected failure writing equipment {}",
                id
            )));
        }

        let mut tables = self.tables()?;
        match tables.equipment.get_mut(&id) {
            Some(equipment) if equipment.availability == expected_prior => {
                equipment.availability = value;
                equipment.updated_at = Utc::now();
                self.counters.equipment_writes.fetch_add(1, Ordering::SeqCst);
                Ok(WriteOutcome::Applied)
            }
            Some(_) => Ok(WriteOutcome::Conflict),
            None => Err(AppError::NotFound(format!("Equipment {} not found", id))),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        self.tables().map(|_| ())
    }
}
