use std::path::PathBuf;
use std::time::Duration;

use opper_client::{ClientConfig, DEFAULT_BASE_URL, OpperError};

use crate::cli::Cli;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Loads `.env` from the working directory (or a parent) into the process
/// environment and returns its path. Variables already set win.
///
/// Runs before logging is set up so `.env` can carry `OPPER_LOG_LEVEL`; the
/// caller logs the returned path once the subscriber exists.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Resolved runtime settings: flags first, then environment, then defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self, OpperError> {
        Self::from_lookup(cli, |key| std::env::var(key).ok())
    }

    fn from_lookup(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self, OpperError> {
        let api_key = env("OPPER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                OpperError::Config("OPPER_API_KEY environment variable not set".into())
            })?;

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env("OPPER_BASE_URL"))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match (cli.timeout, env("OPPER_TIMEOUT_SECS")) {
            (Some(secs), _) => secs,
            (None, Some(raw)) => raw.trim().parse::<u64>().map_err(|_| {
                OpperError::Config(format!(
                    "OPPER_TIMEOUT_SECS must be a whole number of seconds (got {raw:?})"
                ))
            })?,
            (None, None) => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(OpperError::Config("timeout must be greater than 0".into()));
        }

        Ok(Self {
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_key.clone()).base_url(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use std::collections::HashMap;
    use std::io::Write as _;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["opper"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["traces", "list"]);
        Cli::try_parse_from(argv).expect("parse")
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let settings =
            Settings::from_lookup(&cli(&[]), lookup(&[("OPPER_API_KEY", "k")])).expect("settings");
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn flags_override_environment() {
        let env = lookup(&[
            ("OPPER_API_KEY", "k"),
            ("OPPER_BASE_URL", "http://env:1"),
            ("OPPER_TIMEOUT_SECS", "30"),
        ]);
        let settings = Settings::from_lookup(
            &cli(&["--base-url", "http://flag:2", "--timeout", "5"]),
            &env,
        )
        .expect("settings");
        assert_eq!(settings.base_url, "http://flag:2");
        assert_eq!(settings.timeout, Duration::from_secs(5));

        let settings = Settings::from_lookup(&cli(&[]), &env).expect("settings");
        assert_eq!(settings.base_url, "http://env:1");
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_key_and_bad_timeout_are_config_errors() {
        assert!(matches!(
            Settings::from_lookup(&cli(&[]), lookup(&[("OPPER_API_KEY", "  ")])),
            Err(OpperError::Config(message)) if message.contains("OPPER_API_KEY")
        ));
        assert!(matches!(
            Settings::from_lookup(
                &cli(&[]),
                lookup(&[("OPPER_API_KEY", "k"), ("OPPER_TIMEOUT_SECS", "soon")])
            ),
            Err(OpperError::Config(_))
        ));
        let env = lookup(&[("OPPER_API_KEY", "k")]);
        assert!(Settings::from_lookup(&cli(&["--timeout", "0"]), env).is_err());
    }

    #[test]
    fn values_from_a_dotenv_file_resolve() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "OPPER_API_KEY=from-file\nOPPER_BASE_URL=\"http://localhost:8000\"")
            .expect("write");
        let vars: HashMap<String, String> = dotenvy::from_path_iter(file.path())
            .expect("read .env")
            .collect::<Result<_, _>>()
            .expect("parse .env");

        let settings = Settings::from_lookup(&cli(&[]), |key| vars.get(key).cloned())
            .expect("settings");
        assert_eq!(settings.api_key, "from-file");
        assert_eq!(settings.client_config().base_url, "http://localhost:8000");
    }
}
