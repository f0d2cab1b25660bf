use osw_confidence_core::ports::MessageBus;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub bus: Arc<dyn MessageBus>,
    /// Topic that HTTP-submitted messages are published to
    pub incoming_topic: String,
}

impl AppState {
    pub fn new(
        service_name: impl Into<String>,
        bus: Arc<dyn MessageBus>,
        incoming_topic: impl Into<String>,
    ) -> Self {
        Self { service_name: service_name.into(), bus, incoming_topic: incoming_topic.into() }
    }
}
