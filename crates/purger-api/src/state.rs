//! Application state

use purger_core::{PurgeDispatcher, SettingsProvider};
use std::sync::Arc;

/// Handle used to render the Prometheus metrics endpoint
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<PurgeDispatcher>,
    pub settings: Arc<dyn SettingsProvider>,
}

impl AppState {
    pub fn new(dispatcher: Arc<PurgeDispatcher>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }
}
