//! Equipment service

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Availability,
        equipment::{CreateEquipment, Equipment},
    },
    repository::RentalStore,
};

#[derive(Clone)]
pub struct EquipmentService {
    store: Arc<dyn RentalStore>,
}

impl EquipmentService {
    pub fn new(store: Arc<dyn RentalStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Equipment> {
        self.store
            .get_equipment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Register equipment. Availability starts as `available`; later
    /// changes go through the lifecycle engine.
    pub async fn create(&self, data: CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;

        let now = Utc::now();
        let equipment = Equipment {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            name: data.name.trim().to_string(),
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_equipment(&equipment).await?;

        tracing::info!(equipment_id = %equipment.id, owner_id = %equipment.owner_id, "Equipment registered");
        Ok(equipment)
    }
}
