use env_logger::{Builder, Env};

/// Filter env var, e.g. `HANDCALC_LOG=handcalc=trace`.
pub const LOG_ENV: &str = "HANDCALC_LOG";

/// Logs go to stderr so stdout stays clean for JSON records.
pub fn init() {
    Builder::from_env(Env::default().filter_or(LOG_ENV, "info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();
}
