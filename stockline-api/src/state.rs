use std::sync::Arc;
use stockline_core::FulfillmentService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FulfillmentService>,
}

impl AppState {
    pub fn new(service: FulfillmentService) -> Self {
        Self { service: Arc::new(service) }
    }
}
