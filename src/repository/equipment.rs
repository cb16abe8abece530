//! Equipment repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::WriteOutcome;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Availability,
        equipment::{Equipment, EquipmentRow},
    },
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get equipment by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Equipment::try_from)
            .transpose()
    }

    /// Create equipment
    pub async fn create(&self, equipment: &Equipment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment (id, owner_id, name, availability, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(equipment.id)
        .bind(equipment.owner_id)
        .bind(&equipment.name)
        .bind(equipment.availability.as_str())
        .bind(equipment.created_at)
        .bind(equipment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current availability
    pub async fn get_availability(&self, id: Uuid) -> AppResult<Availability> {
        let value: String = sqlx::query_scalar("SELECT availability FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        value.parse()
    }

    /// Compare-and-set availability
    pub async fn update_availability(
        &self,
        id: Uuid,
        value: Availability,
        expected_prior: Availability,
    ) -> AppResult<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE equipment SET availability = $1, updated_at = $2
            WHERE id = $3 AND availability = $4
            "#,
        )
        .bind(value.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_prior.as_str())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            WriteOutcome::Applied
        } else {
            WriteOutcome::Conflict
        })
    }
}
