use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("anaflow.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("anaflow.client.request_errors");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("anaflow.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("anaflow.stream.errors");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("anaflow.stream.cancelled");
pub(crate) static STREAM_BYTES: Counter = Counter::new("anaflow.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("anaflow.stream.duration_seconds");

pub(crate) static CONFIG_FETCHES: Counter = Counter::new("anaflow.config.fetches");
pub(crate) static CONFIG_FALLBACKS: Counter = Counter::new("anaflow.config.fallbacks");

pub(crate) static SETTINGS_SAVES: Counter = Counter::new("anaflow.settings.saves");
pub(crate) static SETTINGS_SAVE_ERRORS: Counter = Counter::new("anaflow.settings.save_errors");
pub(crate) static SETTINGS_LOAD_ERRORS: Counter = Counter::new("anaflow.settings.load_errors");

pub(crate) static SESSION_TURNS: Counter = Counter::new("anaflow.session.turns");
pub(crate) static SESSION_TURNS_SUPERSEDED: Counter =
    Counter::new("anaflow.session.turns_superseded");
pub(crate) static SESSION_TURN_FAILURES: Counter = Counter::new("anaflow.session.turn_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CONFIG_FETCHES);
    collector.register_counter(&CONFIG_FALLBACKS);

    collector.register_counter(&SETTINGS_SAVES);
    collector.register_counter(&SETTINGS_SAVE_ERRORS);
    collector.register_counter(&SETTINGS_LOAD_ERRORS);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURNS_SUPERSEDED);
    collector.register_counter(&SESSION_TURN_FAILURES);
}
