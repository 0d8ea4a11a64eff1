use std::sync::Arc;
use tracing::debug;

use common_redis::Client;

/// Polls the store connection before any cache traffic is attempted.
///
/// Each call is a single point-in-time probe with no retries; a state the
/// probe cannot confirm open counts as closed. Callers decide what a closed
/// gate means for them.
#[derive(Clone)]
pub struct ConnectionGate {
    store: Arc<dyn Client + Send + Sync>,
}

impl ConnectionGate {
    pub fn new(store: Arc<dyn Client + Send + Sync>) -> Self {
        Self { store }
    }

    pub async fn is_open(&self) -> bool {
        let open = self.store.is_connection_open().await;
        if !open {
            debug!("store connection reported closed");
        }
        open
    }
}
