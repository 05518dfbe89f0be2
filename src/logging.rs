//! Tracing subscriber setup.
//!
//! Level comes from `STRUCTSHIFT_LOG`, then `RUST_LOG`, then `info`.
//! `STRUCTSHIFT_LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = env_filter();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match log_format().as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    // A subscriber already installed (tests, embedding) is fine.
    let _ = result;
}

fn env_filter() -> EnvFilter {
    let override_level = non_empty_var("STRUCTSHIFT_LOG").or_else(|| non_empty_var("RUST_LOG"));

    match override_level {
        Some(value) => EnvFilter::try_new(&value).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::new("info"),
    }
}

fn log_format() -> String {
    non_empty_var("STRUCTSHIFT_LOG_FORMAT")
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_else(|| "plain".to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
