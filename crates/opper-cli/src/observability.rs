use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "warn";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn observability_enabled(env: &impl Fn(&str) -> Option<String>) -> bool {
    env("OPPER_OBSERVABILITY")
        .and_then(|v| parse_bool_env(&v))
        .unwrap_or(true)
}

/// Filter directive: `OPPER_LOG_LEVEL`, then `RUST_LOG`, then `warn`.
/// Directives that do not parse are skipped.
fn resolve_filter_directive(env: &impl Fn(&str) -> Option<String>) -> String {
    ["OPPER_LOG_LEVEL", "RUST_LOG"]
        .iter()
        .filter_map(|key| env(key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty() && tracing_subscriber::EnvFilter::try_new(v).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `OPPER_OBSERVABILITY`: set to `0`/`false` to disable logging.
/// - `OPPER_LOG_LEVEL` / `RUST_LOG`: filter (`debug`, `opper_client=trace`, ...).
/// - `OPPER_LOG_JSON_PATH`: if set, logs are JSON lines in that file;
///   otherwise a compact format goes to stderr so stdout stays clean for
///   streamed output.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let env = |key: &str| std::env::var(key).ok();
        if !observability_enabled(&env) {
            return;
        }

        let env_filter = tracing_subscriber::EnvFilter::new(resolve_filter_directive(&env));
        if let Some(path_raw) = env("OPPER_LOG_JSON_PATH").filter(|p| !p.trim().is_empty()) {
            let path = std::path::PathBuf::from(path_raw);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("opper.logs.jsonl");
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
