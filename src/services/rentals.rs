//! Rental booking and payment bookkeeping
//!
//! Status changes are not made here; they go through
//! [`super::lifecycle::RentalLifecycleEngine`].

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{PaymentStatus, RentalStatus},
        rental::{CreateRental, PaymentOutcome, Rental},
    },
    repository::RentalStore,
};

#[derive(Clone)]
pub struct RentalsService {
    store: Arc<dyn RentalStore>,
}

impl RentalsService {
    pub fn new(store: Arc<dyn RentalStore>) -> Self {
        Self { store }
    }

    /// Get rental by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Rental> {
        self.store
            .get_rental(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))
    }

    /// Book equipment; the rental starts `pending` and does not touch availability
    pub async fn create(&self, request: CreateRental) -> AppResult<Rental> {
        request.validate()?;

        let equipment = self
            .store
            .get_equipment(request.equipment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Equipment {} not found", request.equipment_id))
            })?;

        if equipment.owner_id == request.renter_id {
            return Err(AppError::BusinessRule(
                "Owners cannot rent their own equipment".to_string(),
            ));
        }
        if equipment.availability.is_owner_managed() {
            return Err(AppError::BusinessRule(format!(
                "Equipment {} is {} and not accepting bookings",
                equipment.id, equipment.availability
            )));
        }

        let now = Utc::now();
        let rental = Rental {
            id: Uuid::new_v4(),
            equipment_id: equipment.id,
            renter_id: request.renter_id,
            owner_id: equipment.owner_id,
            start_date: request.start_date,
            end_date: request.end_date,
            status: RentalStatus::Pending,
            payment_status: request.payment_status.unwrap_or(PaymentStatus::Unpaid),
            total_price: request.total_price,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_rental(&rental).await?;

        tracing::info!(
            rental_id = %rental.id,
            equipment_id = %rental.equipment_id,
            renter_id = %rental.renter_id,
            "Rental requested"
        );
        Ok(rental)
    }

    /// Record what the payment gateway reported
    pub async fn record_payment(&self, id: Uuid, outcome: PaymentOutcome) -> AppResult<Rental> {
        let mut rental = self.get_by_id(id).await?;

        if rental.status == RentalStatus::Cancelled {
            return Err(AppError::BusinessRule(format!(
                "Rental {} is cancelled",
                id
            )));
        }

        let status = match outcome {
            PaymentOutcome::Succeeded => PaymentStatus::Paid,
            PaymentOutcome::CashOnDelivery => PaymentStatus::Cod,
            PaymentOutcome::Failed => {
                tracing::warn!(rental_id = %id, "Payment failed");
                return Ok(rental);
            }
        };

        if rental.payment_status != status {
            self.store.set_payment_status(id, status).await?;
            tracing::info!(rental_id = %id, payment_status = %status, "Payment recorded");
            rental.payment_status = status;
        }
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{enums::Availability, equipment::Equipment};
    use crate::repository::memory::MemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn setup(availability: Availability) -> (RentalsService, MemoryStore, Equipment) {
        let store = MemoryStore::new();
        let equipment = Equipment {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Plate compactor".to_string(),
            availability,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_equipment(&equipment).await.unwrap();
        (RentalsService::new(Arc::new(store.clone())), store, equipment)
    }

    fn request(equipment_id: Uuid) -> CreateRental {
        CreateRental {
            equipment_id,
            renter_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
            total_price: Decimal::new(6000, 2),
            payment_status: None,
        }
    }

    #[tokio::test]
    async fn test_create_copies_owner_and_leaves_equipment_alone() {
        let (service, store, equipment) = setup(Availability::Available).await;

        let rental = service.create(request(equipment.id)).await.unwrap();
        assert_eq!(rental.owner_id, equipment.owner_id);
        assert_eq!(rental.status, RentalStatus::Pending);
        assert_eq!(rental.payment_status, PaymentStatus::Unpaid);
        assert_eq!(store.write_counts().equipment_writes, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_equipment_out_of_service() {
        let (service, _, equipment) = setup(Availability::Maintenance).await;
        let err = service.create(request(equipment.id)).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_cash_on_delivery() {
        let (service, _, equipment) = setup(Availability::Available).await;
        let rental = service.create(request(equipment.id)).await.unwrap();

        let paid = service
            .record_payment(rental.id, PaymentOutcome::CashOnDelivery)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Cod);
        assert_eq!(paid.status, RentalStatus::Pending);
    }
}
