use findmyseat_core::{BookingCoordinator, BroadcastHub};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub hub: Arc<BroadcastHub>,
    pub auth: AuthConfig,
}
