//! Routes inbound dispatch channel events into the ride coordinator.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::engine::coordinator::CoordinatorHandle;
use crate::models::events::{
    RideStatusUpdate, TripCancelled, BOOKING_REQUEST, RIDE_STATUS_UPDATE, TRIP_CANCELLED_BY_USER,
};
use crate::models::offer::RideOffer;
use crate::observability::metrics::Metrics;
use crate::transport::{SocketChannel, CONNECT, DISCONNECT};

/// Registers the coordinator's handlers on `channel`. Calling it again
/// replaces them, so events are never delivered twice.
pub fn bind_channel(channel: &SocketChannel, coordinator: &CoordinatorHandle, metrics: &Metrics) {
    let handle = coordinator.clone();
    let offers = metrics.offers_total.clone();
    channel.on(BOOKING_REQUEST, move |data| match RideOffer::from_payload(data) {
        Ok(offer) => handle.booking_request(offer),
        Err(err) => {
            warn!(error = %err, "discarding booking request");
            offers.with_label_values(&["malformed"]).inc();
        }
    });

    let handle = coordinator.clone();
    channel.on(TRIP_CANCELLED_BY_USER, move |data| {
        if let Some(event) = decode::<TripCancelled>(TRIP_CANCELLED_BY_USER, data) {
            handle.trip_cancelled(event);
        }
    });

    let handle = coordinator.clone();
    channel.on(RIDE_STATUS_UPDATE, move |data| {
        if let Some(update) = decode::<RideStatusUpdate>(RIDE_STATUS_UPDATE, data) {
            handle.ride_status(update);
        }
    });

    let handle = coordinator.clone();
    channel.on(CONNECT, move |_| handle.channel_status(true));

    let handle = coordinator.clone();
    channel.on(DISCONNECT, move |_| handle.channel_status(false));
}

fn decode<T: DeserializeOwned>(event: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(event, error = %err, "discarding undecodable channel event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::watch;

    use super::bind_channel;
    use crate::engine::coordinator::{spawn, CoordinatorDeps};
    use crate::identity::Identity;
    use crate::models::session::RideStage;
    use crate::observability::metrics::Metrics;
    use crate::testing::{CountingAlert, FakeBookings, RecordingChannel, RecordingUi};
    use crate::transport::{ChannelConfig, SocketChannel};

    const OFFER: &str = r#"{"event":"BOOKING_REQUEST","data":{
        "bookingId":"B-100",
        "pickupAddress":{"name":"MG Road","latitude":12.9756,"longitude":77.6050},
        "dropoffAddress":{"name":"Indiranagar","latitude":12.9784,"longitude":77.6408},
        "totalPrice":180.5,
        "otp":"4821"}}"#;

    fn setup() -> (SocketChannel, crate::engine::coordinator::CoordinatorHandle, Metrics) {
        let metrics = Metrics::new();
        let (_duty_tx, duty_rx) = watch::channel(true);
        let handle = spawn(
            CoordinatorDeps {
                channel: Arc::new(RecordingChannel::connected()),
                bookings: Arc::new(FakeBookings::default()),
                ui: Arc::new(RecordingUi::default()),
                alert: Arc::new(CountingAlert::default()),
                identity: Identity::new(12, "9000000000"),
                duty: duty_rx,
                metrics: metrics.clone(),
            },
            Duration::from_secs(30),
        );
        let channel = SocketChannel::new(
            ChannelConfig {
                url: "ws://127.0.0.1:9/socket".to_string(),
                reconnect_delay: Duration::from_millis(10),
            },
            metrics.clone(),
        );
        bind_channel(&channel, &handle, &metrics);
        (channel, handle, metrics)
    }

    #[tokio::test]
    async fn offer_and_cancellation_reach_the_coordinator() {
        let (channel, handle, _metrics) = setup();

        channel.inject(OFFER);
        assert_eq!(handle.current().await.unwrap().stage, RideStage::OfferPending);

        channel.inject(r#"{"event":"TRIP_CANCELLED_BY_USER","data":{"bookingId":"B-100","message":"changed plans"}}"#);
        let snapshot = handle.current().await.unwrap();
        assert_eq!(snapshot.stage, RideStage::Cancelled);
        assert_eq!(snapshot.cancellation_message.as_deref(), Some("changed plans"));
    }

    #[tokio::test]
    async fn malformed_offer_is_counted_and_dropped() {
        let (channel, handle, metrics) = setup();

        channel.inject(r#"{"event":"BOOKING_REQUEST","data":{"bookingId":"B-9","otp":"12"}}"#);

        assert_eq!(handle.current().await.unwrap().stage, RideStage::Idle);
        assert_eq!(
            metrics.offers_total.with_label_values(&["malformed"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn rebinding_does_not_duplicate_delivery() {
        let (channel, handle, metrics) = setup();
        bind_channel(&channel, &handle, &metrics);

        channel.inject(OFFER);
        handle.current().await.unwrap();

        assert_eq!(
            metrics.offers_total.with_label_values(&["surfaced"]).get(),
            1
        );
        assert_eq!(metrics.stale_events_total.with_label_values(&["booking_request"]).get(), 0);
    }
}
