use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::engine::alert::AlertPlayer;
use crate::navigation::{DriverUi, Notice, Screen};

/// Everything the driver UI is told, in order, over `/ws`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiEvent {
    Navigate(Screen),
    Alert { booking_id: String, ringing: bool },
    Notice(Notice),
}

/// Fans UI events out to every connected UI client.
#[derive(Clone)]
pub struct UiBus {
    tx: broadcast::Sender<UiEvent>,
}

impl UiBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("no ui clients connected");
        }
    }
}

impl DriverUi for UiBus {
    fn navigate(&self, screen: Screen) {
        self.publish(UiEvent::Navigate(screen));
    }

    fn notify(&self, notice: Notice) {
        self.publish(UiEvent::Notice(notice));
    }
}

impl AlertPlayer for UiBus {
    fn start(&self, booking_id: &str) {
        self.publish(UiEvent::Alert {
            booking_id: booking_id.to_string(),
            ringing: true,
        });
    }

    fn stop(&self, booking_id: &str) {
        self.publish(UiEvent::Alert {
            booking_id: booking_id.to_string(),
            ringing: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{UiBus, UiEvent};
    use crate::engine::alert::AlertPlayer;
    use crate::navigation::{DriverUi, Notice, Screen};

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = UiBus::new(16);
        let mut rx = bus.subscribe();

        AlertPlayer::start(&bus, "B-1");
        bus.navigate(Screen::Home);

        assert_eq!(
            rx.recv().await.unwrap(),
            UiEvent::Alert {
                booking_id: "B-1".to_string(),
                ringing: true
            }
        );
        assert_eq!(rx.recv().await.unwrap(), UiEvent::Navigate(Screen::Home));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = UiEvent::Notice(Notice::ChannelStatus { connected: false });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "notice", "payload": { "kind": "channel_status", "connected": false } })
        );

        let event = UiEvent::Navigate(Screen::Home);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "navigate", "payload": { "screen": "home" } })
        );
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = UiBus::new(4);
        bus.notify(Notice::DutyChanged { on_duty: true });
    }
}
