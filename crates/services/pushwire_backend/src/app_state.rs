// --- File: crates/services/pushwire_backend/src/app_state.rs ---
use std::sync::Arc;

use axum::Router;
use pushwire_common::PushBroker;
use pushwire_config::AppConfig;
use pushwire_db::{DeviceRepository, PushMessageRepository};
use pushwire_sns::{routes, DispatchHandler, DispatchQueue, DispatchWorkers, Notifier};
use tracing::info;

/// Everything the running service shares: the dispatch handler, its queue and workers.
pub struct AppState<D, M> {
    pub config: Arc<AppConfig>,
    pub handler: Arc<DispatchHandler<D, M>>,
    devices: D,
    queue: DispatchQueue,
    workers: DispatchWorkers,
}

impl<D, M> AppState<D, M>
where
    D: DeviceRepository + Clone + 'static,
    M: PushMessageRepository + 'static,
{
    /// Builds the dispatch handler and starts the dispatch workers.
    pub fn new(config: Arc<AppConfig>, broker: Arc<dyn PushBroker>, devices: D, messages: M) -> Self {
        let handler = Arc::new(DispatchHandler::new(
            broker,
            devices.clone(),
            messages,
            &config.sns,
        ));
        let (queue, workers) = DispatchQueue::spawn(handler.clone(), &config.dispatch);

        Self {
            config,
            handler,
            devices,
            queue,
            workers,
        }
    }

    /// The push API, to be nested under `/api`.
    pub fn router(&self) -> Router {
        let notifier = Notifier::new(self.devices.clone(), self.queue.clone(), &self.config.sns);
        routes(self.handler.clone(), notifier)
    }

    /// Waits for the queued jobs to finish.
    ///
    /// Call after the HTTP server has stopped, so no router holds a queue handle anymore.
    pub async fn shutdown(self) {
        info!("Draining dispatch queue");
        self.workers.shutdown(self.queue).await;
    }
}
