//! Rental lifecycle engine
//!
//! The only writer of rental status and of derived equipment availability.
//! A transition runs as:
//!
//! 1. load the rental, take the lock of its equipment, load it again
//! 2. validate the pair against [`RentalStatus::allowed_targets`]
//! 3. compare-and-set the new status
//! 4. derive and write equipment availability
//! 5. emit a [`LifecycleEvent`]
//!
//! Failures after step 3 never undo it. A failed step 4 is reported as
//! [`TransitionResult::PartialFailure`] and can be replayed alone with
//! [`RentalLifecycleEngine::resync_equipment`].

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use super::availability::{
    implied_availability, needs_sibling_count, plan_for_status, plan_from_rentals,
    AvailabilityPlan, DerivationPolicy,
};
use super::locks::KeyedLocks;
use super::notifier::Notifier;
use super::retry::RetryPolicy;
use crate::{
    config::EngineConfig,
    error::{AppError, AppResult},
    models::{
        actor::Actor,
        enums::{Availability, OwnerAvailability, RentalStatus},
        equipment::Equipment,
        event::LifecycleEvent,
        rental::Rental,
    },
    repository::{RentalStore, WriteOutcome},
};

/// Compare-and-set rounds on equipment before giving up
const EQUIPMENT_CAS_ROUNDS: usize = 3;

/// Equipment write left undone after the rental status committed
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PendingEquipmentUpdate {
    pub rental_id: Uuid,
    pub equipment_id: Uuid,
    /// Rental status the equipment must be reconciled with
    pub rental_status: RentalStatus,
    /// Value the derivation was aiming for
    pub desired: Option<Availability>,
    pub error: String,
}

/// Outcome of [`RentalLifecycleEngine::request_transition`]
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionResult {
    Success {
        rental: Rental,
        equipment: AvailabilityPlan,
        /// Non-fatal problems, such as an undelivered notification
        warnings: Vec<String>,
    },
    /// The rental already had the requested status; nothing was written
    NoOp { rental: Rental },
    InvalidTransition {
        from: RentalStatus,
        to: RentalStatus,
    },
    NotFound { rental_id: Uuid },
    /// Another transition committed first; reload before deciding again
    Conflict {
        rental_id: Uuid,
        expected: RentalStatus,
        target: RentalStatus,
    },
    /// Rental status committed, equipment availability did not
    PartialFailure {
        rental: Rental,
        pending: PendingEquipmentUpdate,
        warnings: Vec<String>,
    },
}

#[derive(Clone)]
pub struct RentalLifecycleEngine {
    store: Arc<dyn RentalStore>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<KeyedLocks>,
    retry: RetryPolicy,
    policy: DerivationPolicy,
    background_resync: Option<Duration>,
    notify_timeout: Duration,
}

impl RentalLifecycleEngine {
    pub fn new(store: Arc<dyn RentalStore>, notifier: Arc<dyn Notifier>, config: &EngineConfig) -> Self {
        Self {
            store,
            notifier,
            locks: Arc::new(KeyedLocks::new()),
            retry: RetryPolicy::from(config),
            policy: DerivationPolicy {
                rented_overrides_owner_status: config.rented_overrides_owner_status,
            },
            background_resync: config
                .background_resync
                .then_some(config.background_resync_delay),
            notify_timeout: config.operation_timeout,
        }
    }

    /// Upper bound for delivering one event, defaults to the store timeout
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Move a rental to `target`
    pub async fn request_transition(
        &self,
        rental_id: Uuid,
        target: RentalStatus,
        actor: &Actor,
    ) -> AppResult<TransitionResult> {
        let Some(rental) = self.load_rental(rental_id).await? else {
            return Ok(TransitionResult::NotFound { rental_id });
        };

        let guard = self.locks.acquire(rental.equipment_id).await;

        // Another transition may have committed while we waited
        let Some(current) = self.load_rental(rental_id).await? else {
            return Ok(TransitionResult::NotFound { rental_id });
        };
        let from = current.status;

        if from == target {
            tracing::debug!(%rental_id, status = %from, "Transition is a no-op");
            return Ok(TransitionResult::NoOp { rental: current });
        }

        if !from.can_transition_to(target) {
            tracing::info!(
                %rental_id,
                from = %from,
                to = %target,
                actor = ?actor.kind,
                "Rejected invalid transition"
            );
            return Ok(TransitionResult::InvalidTransition { from, to: target });
        }

        // Truncated to what Postgres stores, so a reread compares equal
        let updated_at = Utc::now().trunc_subsecs(6);
        if !self.commit_status(&current, target, updated_at).await? {
            tracing::warn!(
                %rental_id,
                expected = %from,
                to = %target,
                "Rental status changed concurrently"
            );
            return Ok(TransitionResult::Conflict {
                rental_id,
                expected: from,
                target,
            });
        }

        let mut rental = current;
        rental.status = target;
        rental.updated_at = updated_at;

        tracing::info!(
            %rental_id,
            equipment_id = %rental.equipment_id,
            from = %from,
            to = %target,
            actor_id = ?actor.id,
            actor = ?actor.kind,
            "Rental status committed"
        );

        let equipment = self.apply_derivation(&rental).await;
        drop(guard);

        let mut warnings = Vec::new();
        let event = LifecycleEvent::for_transition(&rental, from, actor.id);
        if let Some(warning) = self.notify(&event).await {
            warnings.push(warning);
        }

        Ok(match equipment {
            Ok(plan) => TransitionResult::Success {
                rental,
                equipment: plan,
                warnings,
            },
            Err(pending) => {
                tracing::error!(
                    %rental_id,
                    equipment_id = %pending.equipment_id,
                    status = %pending.rental_status,
                    desired = ?pending.desired,
                    error = %pending.error,
                    "Equipment availability out of sync after committed transition"
                );
                self.schedule_resync(&pending);
                TransitionResult::PartialFailure {
                    rental,
                    pending,
                    warnings,
                }
            }
        })
    }

    /// Replay the equipment step for a rental's current status.
    ///
    /// Safe to call any number of times.
    pub async fn resync_equipment(&self, rental_id: Uuid) -> AppResult<AvailabilityPlan> {
        let rental = self
            .load_rental(rental_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))?;

        let _guard = self.locks.acquire(rental.equipment_id).await;
        let rental = self
            .load_rental(rental_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))?;

        let plan = self.apply_derivation(&rental).await.map_err(|pending| {
            AppError::Unavailable(format!(
                "Equipment {} still out of sync: {}",
                pending.equipment_id, pending.error
            ))
        })?;

        tracing::info!(%rental_id, equipment_id = %rental.equipment_id, ?plan, "Equipment resynced");
        Ok(plan)
    }

    /// Recompute an equipment's availability from its occupying rentals.
    /// Owner-set values are left alone.
    pub async fn reconcile_equipment(&self, equipment_id: Uuid) -> AppResult<AvailabilityPlan> {
        let _guard = self.locks.acquire(equipment_id).await;

        let current = self.load_availability(equipment_id).await?;
        let occupying = self.count_occupying(equipment_id, None).await?;
        let plan = plan_from_rentals(current, occupying);

        if let AvailabilityPlan::Write { from, to } = plan {
            self.write_availability(equipment_id, to, from).await?;
            tracing::warn!(%equipment_id, %from, %to, "Reconciled drifted equipment availability");
        }
        Ok(plan)
    }

    /// Owner request to take equipment out of service or put it back.
    ///
    /// Putting it back derives `rented`/`available` from the rentals
    /// instead of trusting the caller.
    pub async fn set_owner_availability(
        &self,
        equipment_id: Uuid,
        requested: OwnerAvailability,
        actor: &Actor,
    ) -> AppResult<Equipment> {
        let _guard = self.locks.acquire(equipment_id).await;

        let current = self.load_availability(equipment_id).await?;
        let target = match requested {
            OwnerAvailability::Maintenance => Availability::Maintenance,
            OwnerAvailability::Unavailable => Availability::Unavailable,
            OwnerAvailability::Active => {
                if self.count_occupying(equipment_id, None).await? > 0 {
                    Availability::Rented
                } else {
                    Availability::Available
                }
            }
        };

        if target != current {
            self.write_availability(equipment_id, target, current).await?;
            tracing::info!(
                %equipment_id,
                from = %current,
                to = %target,
                actor_id = ?actor.id,
                "Owner changed equipment availability"
            );
        }

        let store = &self.store;
        self.retry
            .run("get_equipment", || store.get_equipment(equipment_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment_id)))
    }

    async fn load_rental(&self, rental_id: Uuid) -> AppResult<Option<Rental>> {
        let store = &self.store;
        self.retry.run("get_rental", || store.get_rental(rental_id)).await
    }

    async fn load_availability(&self, equipment_id: Uuid) -> AppResult<Availability> {
        let store = &self.store;
        self.retry
            .run("get_equipment_availability", || {
                store.get_equipment_availability(equipment_id)
            })
            .await
    }

    async fn count_occupying(&self, equipment_id: Uuid, excluding: Option<Uuid>) -> AppResult<i64> {
        let store = &self.store;
        self.retry
            .run("count_occupying_rentals", || {
                store.count_occupying_rentals(equipment_id, excluding)
            })
            .await
    }

    async fn write_availability(
        &self,
        equipment_id: Uuid,
        value: Availability,
        expected_prior: Availability,
    ) -> AppResult<()> {
        let store = &self.store;
        let outcome = self
            .retry
            .run("set_equipment_availability", || {
                store.set_equipment_availability(equipment_id, value, expected_prior)
            })
            .await?;

        match outcome {
            WriteOutcome::Applied => Ok(()),
            WriteOutcome::Conflict => Err(AppError::Conflict(format!(
                "Equipment {} availability changed concurrently",
                equipment_id
            ))),
        }
    }

    /// Compare-and-set the status. `Ok(false)` means another writer won.
    async fn commit_status(
        &self,
        rental: &Rental,
        target: RentalStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let store = &self.store;
        let outcome = self
            .retry
            .run("save_rental_status", || {
                store.save_rental_status(rental.id, target, rental.status, updated_at)
            })
            .await?;

        if outcome == WriteOutcome::Applied {
            return Ok(true);
        }

        // A retried attempt lands here when the first one committed but its reply was lost
        let stored = self.load_rental(rental.id).await?;
        Ok(matches!(stored, Some(r) if r.status == target && r.updated_at == updated_at))
    }

    /// Bring the equipment in line with `rental.status`
    async fn apply_derivation(&self, rental: &Rental) -> Result<AvailabilityPlan, PendingEquipmentUpdate> {
        let pending = |error: String| PendingEquipmentUpdate {
            rental_id: rental.id,
            equipment_id: rental.equipment_id,
            rental_status: rental.status,
            desired: implied_availability(rental.status),
            error,
        };

        if implied_availability(rental.status).is_none() {
            return Ok(plan_for_status(rental.status, Availability::Available, 0, self.policy));
        }

        let store = &self.store;
        for _ in 0..EQUIPMENT_CAS_ROUNDS {
            let current = self
                .load_availability(rental.equipment_id)
                .await
                .map_err(|e| pending(e.to_string()))?;

            let others = if needs_sibling_count(rental.status, current) {
                self.count_occupying(rental.equipment_id, Some(rental.id))
                    .await
                    .map_err(|e| pending(e.to_string()))?
            } else {
                0
            };

            let plan = plan_for_status(rental.status, current, others, self.policy);
            let AvailabilityPlan::Write { from, to } = plan else {
                tracing::debug!(rental_id = %rental.id, ?plan, "Equipment write skipped");
                return Ok(plan);
            };

            let outcome = self
                .retry
                .run("set_equipment_availability", || {
                    store.set_equipment_availability(rental.equipment_id, to, from)
                })
                .await
                .map_err(|e| pending(e.to_string()))?;

            match outcome {
                WriteOutcome::Applied => {
                    tracing::debug!(
                        equipment_id = %rental.equipment_id,
                        %from,
                        %to,
                        "Equipment availability written"
                    );
                    return Ok(plan);
                }
                WriteOutcome::Conflict => {
                    tracing::warn!(
                        equipment_id = %rental.equipment_id,
                        expected = %from,
                        "Equipment availability changed underneath, deriving again"
                    );
                }
            }
        }

        Err(pending(format!(
            "availability kept changing after {} attempts",
            EQUIPMENT_CAS_ROUNDS
        )))
    }

    /// Deliver the event; any failure comes back as a warning
    async fn notify(&self, event: &LifecycleEvent) -> Option<String> {
        let result = tokio::time::timeout(self.notify_timeout, self.notifier.emit(event)).await;
        let error = match result {
            Ok(Ok(())) => return None,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.notify_timeout),
        };

        tracing::warn!(rental_id = %event.rental_id, %error, "Lifecycle notification not delivered");
        Some(format!("notification not delivered: {}", error))
    }

    fn schedule_resync(&self, pending: &PendingEquipmentUpdate) {
        let Some(delay) = self.background_resync else {
            return;
        };

        let engine = self.clone();
        let rental_id = pending.rental_id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for attempt in 0..=engine.retry.max_retries {
                match engine.resync_equipment(rental_id).await {
                    Ok(_) => return,
                    Err(e) => {
                        tracing::warn!(%rental_id, attempt, error = %e, "Background equipment resync failed");
                        tokio::time::sleep(engine.retry.delay_for_attempt(attempt)).await;
                    }
                }
            }
            tracing::error!(%rental_id, "Gave up on background equipment resync");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::PaymentStatus;
    use crate::repository::MockRentalStore;
    use crate::services::notifier::MockNotifier;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> EngineConfig {
        EngineConfig {
            max_retries: 0,
            background_resync: false,
            ..EngineConfig::default()
        }
    }

    fn rental(status: RentalStatus) -> Rental {
        Rental {
            id: Uuid::new_v4(),
            equipment_id: Uuid::new_v4(),
            renter_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            total_price: Decimal::new(4500, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn silent_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_emit().never();
        notifier
    }

    #[tokio::test]
    async fn test_same_status_writes_nothing() {
        let existing = rental(RentalStatus::Confirmed);
        let id = existing.id;

        let mut store = MockRentalStore::new();
        store
            .expect_get_rental()
            .returning(move |_| Ok(Some(existing.clone())));
        store.expect_save_rental_status().never();
        store.expect_set_equipment_availability().never();

        let engine = RentalLifecycleEngine::new(Arc::new(store), Arc::new(silent_notifier()), &config());
        let result = engine
            .request_transition(id, RentalStatus::Confirmed, &Actor::system())
            .await
            .unwrap();

        assert!(matches!(result, TransitionResult::NoOp { .. }));
    }

    #[tokio::test]
    async fn test_unlisted_pair_writes_nothing() {
        let existing = rental(RentalStatus::Pending);
        let id = existing.id;

        let mut store = MockRentalStore::new();
        store
            .expect_get_rental()
            .returning(move |_| Ok(Some(existing.clone())));
        store.expect_save_rental_status().never();
        store.expect_set_equipment_availability().never();

        let engine = RentalLifecycleEngine::new(Arc::new(store), Arc::new(silent_notifier()), &config());
        let result = engine
            .request_transition(id, RentalStatus::InProgress, &Actor::system())
            .await
            .unwrap();

        assert_eq!(
            result,
            TransitionResult::InvalidTransition {
                from: RentalStatus::Pending,
                to: RentalStatus::InProgress
            }
        );
    }

    #[tokio::test]
    async fn test_missing_rental() {
        let mut store = MockRentalStore::new();
        store.expect_get_rental().returning(|_| Ok(None));

        let engine = RentalLifecycleEngine::new(Arc::new(store), Arc::new(silent_notifier()), &config());
        let id = Uuid::new_v4();
        let result = engine
            .request_transition(id, RentalStatus::Confirmed, &Actor::system())
            .await
            .unwrap();

        assert_eq!(result, TransitionResult::NotFound { rental_id: id });
    }

    #[tokio::test]
    async fn test_lost_race_is_a_conflict() {
        let existing = rental(RentalStatus::Pending);
        let id = existing.id;
        let mut moved_on = existing.clone();
        moved_on.status = RentalStatus::Cancelled;

        // Two reads before the write, the third one sees the winner's status
        let reads = Arc::new(AtomicUsize::new(0));
        let mut store = MockRentalStore::new();
        store.expect_get_rental().times(3).returning(move |_| {
            if reads.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(Some(existing.clone()))
            } else {
                Ok(Some(moved_on.clone()))
            }
        });
        store
            .expect_save_rental_status()
            .times(1)
            .returning(|_, _, _, _| Ok(WriteOutcome::Conflict));
        store.expect_set_equipment_availability().never();

        let engine = RentalLifecycleEngine::new(Arc::new(store), Arc::new(silent_notifier()), &config());
        let result = engine
            .request_transition(id, RentalStatus::Confirmed, &Actor::system())
            .await
            .unwrap();

        assert_eq!(
            result,
            TransitionResult::Conflict {
                rental_id: id,
                expected: RentalStatus::Pending,
                target: RentalStatus::Confirmed
            }
        );
    }

    #[tokio::test]
    async fn test_notifier_failure_is_only_a_warning() {
        let existing = rental(RentalStatus::Pending);
        let id = existing.id;
        let equipment_id = existing.equipment_id;

        let mut store = MockRentalStore::new();
        store
            .expect_get_rental()
            .returning(move |_| Ok(Some(existing.clone())));
        store
            .expect_save_rental_status()
            .times(1)
            .returning(|_, _, _, _| Ok(WriteOutcome::Applied));
        store
            .expect_get_equipment_availability()
            .returning(|_| Ok(Availability::Available));
        store
            .expect_set_equipment_availability()
            .withf(move |eq, to, from| {
                *eq == equipment_id && *to == Availability::Rented && *from == Availability::Available
            })
            .times(1)
            .returning(|_, _, _| Ok(WriteOutcome::Applied));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_emit()
            .withf(move |event| event.rental_id == id && event.new_status == RentalStatus::Confirmed)
            .times(1)
            .returning(|_| Err(AppError::Notification("push gateway down".into())));

        let engine = RentalLifecycleEngine::new(Arc::new(store), Arc::new(notifier), &config());
        let result = engine
            .request_transition(id, RentalStatus::Confirmed, &Actor::system())
            .await
            .unwrap();

        match result {
            TransitionResult::Success { rental, warnings, .. } => {
                assert_eq!(rental.status, RentalStatus::Confirmed);
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("push gateway down"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    struct SlowNotifier(Duration);

    #[async_trait::async_trait]
    impl Notifier for SlowNotifier {
        async fn emit(&self, _event: &LifecycleEvent) -> AppResult<()> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    async fn confirm_with_slow_notifier(notify_timeout: Duration) -> TransitionResult {
        use crate::repository::memory::MemoryStore;

        let store = MemoryStore::new();
        let existing = rental(RentalStatus::Pending);
        store
            .insert_equipment(&Equipment {
                id: existing.equipment_id,
                owner_id: existing.owner_id,
                name: "Trencher".to_string(),
                availability: Availability::Available,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store.insert_rental(&existing).await.unwrap();

        let config = EngineConfig {
            operation_timeout: Duration::from_millis(20),
            ..config()
        };
        let engine = RentalLifecycleEngine::new(
            Arc::new(store),
            Arc::new(SlowNotifier(Duration::from_millis(60))),
            &config,
        )
        .with_notify_timeout(notify_timeout);

        engine
            .request_transition(existing.id, RentalStatus::Confirmed, &Actor::system())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_notify_uses_its_own_timeout() {
        match confirm_with_slow_notifier(Duration::from_millis(500)).await {
            TransitionResult::Success { warnings, .. } => assert!(warnings.is_empty()),
            other => panic!("expected success, got {:?}", other),
        }

        match confirm_with_slow_notifier(Duration::from_millis(5)).await {
            TransitionResult::Success { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("timed out"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }
}
