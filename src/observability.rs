use biometrics::{Collector, Counter, Moments};

pub(crate) static RELAY_REQUESTS: Counter = Counter::new("moderelay.relay.requests");
pub(crate) static RELAY_REJECTED: Counter = Counter::new("moderelay.relay.rejected");
pub(crate) static RELAY_SETUP_ERRORS: Counter = Counter::new("moderelay.relay.setup_errors");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("moderelay.stream.fragments");
pub(crate) static STREAM_FRAGMENT_BYTES: Counter =
    Counter::new("moderelay.stream.fragment_bytes");
pub(crate) static STREAM_COMPLETED: Counter = Counter::new("moderelay.stream.completed");
pub(crate) static STREAM_UPSTREAM_ERRORS: Counter =
    Counter::new("moderelay.stream.upstream_errors");
pub(crate) static STREAM_DISCONNECTS: Counter = Counter::new("moderelay.stream.disconnects");
pub(crate) static STREAM_TTFF: Moments = Moments::new("moderelay.stream.ttff_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("moderelay.stream.duration_seconds");

pub(crate) static SSE_BYTES: Counter = Counter::new("moderelay.sse.bytes");

pub(crate) static CONSUMER_MALFORMED_EVENTS: Counter =
    Counter::new("moderelay.consumer.malformed_events");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&RELAY_REQUESTS);
    collector.register_counter(&RELAY_REJECTED);
    collector.register_counter(&RELAY_SETUP_ERRORS);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_FRAGMENT_BYTES);
    collector.register_counter(&STREAM_COMPLETED);
    collector.register_counter(&STREAM_UPSTREAM_ERRORS);
    collector.register_counter(&STREAM_DISCONNECTS);
    collector.register_moments(&STREAM_TTFF);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SSE_BYTES);

    collector.register_counter(&CONSUMER_MALFORMED_EVENTS);
}
