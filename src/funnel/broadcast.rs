use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::answers::AnswerMap;

/// Payload handed to marketing-integration listeners (pixels, analytics)
/// when a funnel submission goes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingEvent {
    pub form_slug: String,
    pub form_id: String,
    pub form_name: String,
    pub user_data: AnswerMap,
}

/// In-process publish/subscribe seam between the dispatcher and marketing
/// listeners.
///
/// Publication is fire-and-forget: the dispatcher neither waits for nor
/// inspects subscribers, and a bus with no listeners is not an error.
pub trait MarketingBus: Send + Sync {
    fn publish(&self, event: MarketingEvent);
}

/// Recording bus for tests and the simulate command.
#[derive(Debug, Default)]
pub struct InMemoryMarketingBus {
    events: Mutex<Vec<MarketingEvent>>,
}

impl InMemoryMarketingBus {
    pub fn events(&self) -> Vec<MarketingEvent> {
        self.events.lock().expect("marketing bus poisoned").clone()
    }
}

impl MarketingBus for InMemoryMarketingBus {
    fn publish(&self, event: MarketingEvent) {
        self.events
            .lock()
            .expect("marketing bus poisoned")
            .push(event);
    }
}

/// Broadcast-channel bus used by the running service so independently loaded
/// listeners can consume events asynchronously.
#[derive(Debug)]
pub struct ChannelMarketingBus {
    sender: broadcast::Sender<MarketingEvent>,
}

impl ChannelMarketingBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketingEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelMarketingBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MarketingBus for ChannelMarketingBus {
    fn publish(&self, event: MarketingEvent) {
        // A send error only means nobody is listening right now.
        if self.sender.send(event).is_err() {
            debug!("marketing event published with no active listeners");
        }
    }
}
