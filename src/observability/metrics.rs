use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_total: IntCounterVec,
    pub stage_transitions_total: IntCounterVec,
    pub stale_events_total: IntCounterVec,
    pub booking_writes_total: IntCounterVec,
    pub booking_write_latency_seconds: HistogramVec,
    pub channel_reconnects_total: IntCounter,
    pub channel_connected: IntGauge,
    pub events_emitted_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Ride offers by outcome"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let stage_transitions_total = IntCounterVec::new(
            Opts::new("stage_transitions_total", "Ride stage transitions by target stage"),
            &["stage"],
        )
        .expect("valid stage_transitions_total metric");

        let stale_events_total = IntCounterVec::new(
            Opts::new(
                "stale_events_total",
                "Events and responses discarded for a superseded ride",
            ),
            &["kind"],
        )
        .expect("valid stale_events_total metric");

        let booking_writes_total = IntCounterVec::new(
            Opts::new("booking_writes_total", "Booking record mutations by outcome"),
            &["operation", "outcome"],
        )
        .expect("valid booking_writes_total metric");

        let booking_write_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "booking_write_latency_seconds",
                "Latency of booking record mutations in seconds",
            ),
            &["operation"],
        )
        .expect("valid booking_write_latency_seconds metric");

        let channel_reconnects_total = IntCounter::new(
            "channel_reconnects_total",
            "Dispatch channel reconnect attempts",
        )
        .expect("valid channel_reconnects_total metric");

        let channel_connected = IntGauge::new(
            "channel_connected",
            "Whether the dispatch channel is connected (0/1)",
        )
        .expect("valid channel_connected metric");

        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Channel events emitted by name"),
            &["event"],
        )
        .expect("valid events_emitted_total metric");

        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(stage_transitions_total.clone()))
            .expect("register stage_transitions_total");
        registry
            .register(Box::new(stale_events_total.clone()))
            .expect("register stale_events_total");
        registry
            .register(Box::new(booking_writes_total.clone()))
            .expect("register booking_writes_total");
        registry
            .register(Box::new(booking_write_latency_seconds.clone()))
            .expect("register booking_write_latency_seconds");
        registry
            .register(Box::new(channel_reconnects_total.clone()))
            .expect("register channel_reconnects_total");
        registry
            .register(Box::new(channel_connected.clone()))
            .expect("register channel_connected");
        registry
            .register(Box::new(events_emitted_total.clone()))
            .expect("register events_emitted_total");

        Self {
            registry,
            offers_total,
            stage_transitions_total,
            stale_events_total,
            booking_writes_total,
            booking_write_latency_seconds,
            channel_reconnects_total,
            channel_connected,
            events_emitted_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
