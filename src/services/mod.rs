//! Business logic services

pub mod availability;
pub mod equipment;
pub mod lifecycle;
pub mod locks;
pub mod notifier;
pub mod rentals;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{EngineConfig, NotificationsConfig},
    error::AppResult,
    repository::RentalStore,
};

/// Lets the webhook client time out on its own before the engine gives up
const NOTIFY_GRACE: Duration = Duration::from_millis(500);

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub lifecycle: lifecycle::RentalLifecycleEngine,
    pub rentals: rentals::RentalsService,
    pub equipment: equipment::EquipmentService,
    /// Realtime change feed, also fed by the lifecycle engine
    pub events: notifier::BroadcastNotifier,
    store: Arc<dyn RentalStore>,
}

impl Services {
    /// Create all services on top of the given store
    pub fn new(
        store: Arc<dyn RentalStore>,
        engine_config: &EngineConfig,
        notifications_config: &NotificationsConfig,
    ) -> AppResult<Self> {
        let events = notifier::BroadcastNotifier::new(notifications_config.broadcast_capacity);
        let fan_out = notifier::FanOutNotifier::from_config(notifications_config, events.clone())?;

        Ok(Self {
            lifecycle: lifecycle::RentalLifecycleEngine::new(
                Arc::clone(&store),
                Arc::new(fan_out),
                engine_config,
            )
            .with_notify_timeout(notifications_config.webhook_timeout + NOTIFY_GRACE),
            rentals: rentals::RentalsService::new(Arc::clone(&store)),
            equipment: equipment::EquipmentService::new(Arc::clone(&store)),
            events,
            store,
        })
    }

    /// Store liveness, for readiness probes
    pub async fn ping_store(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
