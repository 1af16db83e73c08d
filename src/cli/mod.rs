//! # Command Line Interface
//!
//! Reads, writes and deletes cache entries from the shell. Handy for inspecting what
//! an ACME client stored, and for checking that the account running it has the
//! Secret Manager permissions the cache needs (`round-trip`).

use anyhow::{bail, Context};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{Cache, SecretManagerCache};
use crate::config::{CacheConfig, LoggingConfig};
use crate::secrets::SecretClientFactory;

/// Payloads written by `round-trip`, in order.
pub const ROUND_TRIP_PAYLOADS: [&str; 2] = ["this is some data", "new data!"];

#[derive(Parser, Debug)]
#[command(name = "smcache")]
#[command(about = "Certificate cache backed by Google Cloud Secret Manager")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// GCP project that owns the secrets (falls back to GCP_PROJECT_ID)
    #[arg(long, env = "SMCACHE_PROJECT_ID", global = true)]
    pub project_id: Option<String>,

    /// Prefix prepended to every secret id
    #[arg(long, env = "SMCACHE_SECRET_PREFIX", default_value = "", global = true)]
    pub secret_prefix: String,

    /// Keep previous versions instead of destroying them after a put
    #[arg(
        long,
        env = "SMCACHE_KEEP_OLD_VERSIONS",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub keep_old_versions: bool,

    /// Log cache internals (key names and resource paths, never payloads)
    #[arg(
        long,
        env = "SMCACHE_DEBUG_LOGGING",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub debug: bool,

    /// Deadline for each cache operation, in seconds
    #[arg(long, env = "SMCACHE_OPERATION_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON formatted logs
    #[arg(
        long,
        env = "SMCACHE_LOG_JSON",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Print the data stored under a key
    Get {
        key: String,

        /// Write the data to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store data under a key
    Put {
        key: String,

        /// Read the data from a file
        #[arg(long, conflicts_with = "value", required_unless_present = "value")]
        file: Option<PathBuf>,

        /// Use the given string as the data
        #[arg(long)]
        value: Option<String>,
    },

    /// Remove a key and every stored version
    Delete { key: String },

    /// Put, get, put again and get again, printing each result
    RoundTrip { key: String },
}

impl Cli {
    /// Cache configuration from the global flags
    pub fn cache_config(&self) -> anyhow::Result<CacheConfig> {
        let project_id = match &self.project_id {
            Some(project_id) => project_id.clone(),
            None => std::env::var("GCP_PROJECT_ID")
                .context("No project given: pass --project-id or set SMCACHE_PROJECT_ID")?,
        };

        let mut config = CacheConfig::new(project_id)
            .with_secret_prefix(self.secret_prefix.clone())
            .with_keep_old_versions(self.keep_old_versions)
            .with_debug_logging(self.debug);
        config.operation_timeout_secs = self.timeout_secs;
        config.validate()?;

        Ok(config)
    }

    /// Logging configuration from the global flags
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::from_env().unwrap_or_default();
        if self.verbose || self.debug {
            config.log_level = "debug".to_string();
        }
        config.json_logging |= self.json_logs;
        config
    }
}

/// Run a parsed command against sessions from `factory`, writing results to `out`.
pub async fn run<W: Write>(
    cli: Cli,
    factory: Arc<dyn SecretClientFactory>,
    out: &mut W,
) -> anyhow::Result<()> {
    let cache = SecretManagerCache::with_factory(cli.cache_config()?, factory)?;

    match cli.command {
        Commands::Get { key, output } => {
            let data = match cache.get(&key).await {
                Ok(data) => data,
                Err(e) if e.is_cache_miss() => bail!("Nothing stored under '{}'", key),
                Err(e) => return Err(e).context(format!("Failed to get '{}'", key)),
            };
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    writeln!(out, "Wrote {} bytes to {}", data.len(), path.display())?;
                }
                None => out.write_all(&data)?,
            }
        }

        Commands::Put { key, file, value } => {
            let data = match (file, value) {
                (Some(path), _) => tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, Some(value)) => value.into_bytes(),
                (None, None) => bail!("Pass --file or --value"),
            };
            cache.put(&key, &data).await.with_context(|| format!("Failed to put '{}'", key))?;
            writeln!(out, "Stored {} bytes under '{}'", data.len(), key)?;
        }

        Commands::Delete { key } => {
            cache.delete(&key).await.with_context(|| format!("Failed to delete '{}'", key))?;
            writeln!(out, "Deleted '{}'", key)?;
        }

        Commands::RoundTrip { key } => {
            for payload in ROUND_TRIP_PAYLOADS {
                cache
                    .put(&key, payload.as_bytes())
                    .await
                    .with_context(|| format!("Failed to put '{}'", key))?;
                let data =
                    cache.get(&key).await.with_context(|| format!("Failed to get '{}'", key))?;
                if data != payload.as_bytes() {
                    bail!("Read back different data than was written for '{}'", key);
                }
                writeln!(out, "got result: {}", String::from_utf8_lossy(&data))?;
            }
        }
    }

    Ok(())
}

/// Per-operation deadline for display
pub fn describe_timeout(config: &CacheConfig) -> String {
    config
        .operation_timeout()
        .map(|d| format!("{}s", d.as_secs()))
        .unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;
    use crate::secrets::{InMemorySecretService, Operation, SecretsError};
    use std::sync::MutexGuard;

    // Flags fall back to SMCACHE_* variables, which the config tests modify.
    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_parse(argv: &[&str]) -> Result<Cli, clap::Error> {
        let _env = env_lock();
        Cli::try_parse_from(argv)
    }

    /// Parses with an explicit project, so `run` never reads the environment afterwards.
    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["smcache", "--project-id", "proj"];
        argv.extend_from_slice(args);
        try_parse(&argv).unwrap()
    }

    async fn run_to_string(cli: Cli, service: &InMemorySecretService) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(cli, Arc::new(service.clone()), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_put_requires_exactly_one_source() {
        let cli = parse(&["put", "example.com", "--value", "abc"]);
        assert_eq!(
            cli.command,
            Commands::Put { key: "example.com".into(), file: None, value: Some("abc".into()) }
        );

        assert!(try_parse(&["smcache", "put", "example.com"]).is_err());
        assert!(try_parse(&[
            "smcache",
            "put",
            "example.com",
            "--value",
            "a",
            "--file",
            "b"
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_build_cache_config() {
        let cli = parse(&[
            "--secret-prefix",
            "site-",
            "--keep-old-versions",
            "--debug",
            "--timeout-secs",
            "20",
            "get",
            "example.com",
        ]);
        let config = cli.cache_config().unwrap();

        assert_eq!(config.project_id, "proj");
        assert_eq!(config.secret_prefix, "site-");
        assert!(config.keep_old_versions);
        assert!(config.debug_logging);
        assert_eq!(describe_timeout(&config), "20s");
        assert_eq!(cli.logging_config().log_level, "debug");
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let cli = parse(&["--timeout-secs", "0", "delete", "example.com"]);
        assert!(cli.cache_config().is_err());
    }

    #[tokio::test]
    async fn test_put_then_get_prints_payload() {
        let service = InMemorySecretService::new();

        let out = run_to_string(parse(&["put", "example.com", "--value", "cert-bytes"]), &service)
            .await
            .unwrap();
        assert_eq!(out, "Stored 10 bytes under 'example.com'\n");

        let out = run_to_string(parse(&["get", "example.com"]), &service).await.unwrap();
        assert_eq!(out, "cert-bytes");
    }

    #[tokio::test]
    async fn test_get_to_file_and_put_from_file() {
        let service = InMemorySecretService::new();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pem");
        let output = dir.path().join("out.pem");
        std::fs::write(&input, b"pem data").unwrap();

        run_to_string(parse(&["put", "example.com", "--file", input.to_str().unwrap()]), &service)
            .await
            .unwrap();
        run_to_string(
            parse(&["get", "example.com", "--output", output.to_str().unwrap()]),
            &service,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"pem data");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_an_error() {
        let service = InMemorySecretService::new();
        let err = run_to_string(parse(&["get", "missing.example.com"]), &service).await.unwrap_err();
        assert!(err.to_string().contains("Nothing stored under 'missing.example.com'"));
    }

    #[tokio::test]
    async fn test_round_trip_leaves_one_enabled_version() {
        let service = InMemorySecretService::new();

        let out = run_to_string(parse(&["round-trip", "www.example.com"]), &service).await.unwrap();

        assert_eq!(out, "got result: this is some data\ngot result: new data!\n");
        assert_eq!(service.enabled_count("projects/proj/secrets/www_example_com"), 1);
    }

    #[tokio::test]
    async fn test_round_trip_reports_the_failing_step() {
        let service = InMemorySecretService::new();
        service.fail(
            Operation::CreateSecret,
            SecretsError::permission_denied("projects/proj", "secretmanager.secrets.create denied"),
        );

        let err =
            run_to_string(parse(&["round-trip", "www.example.com"]), &service).await.unwrap_err();

        assert!(err.to_string().contains("Failed to put 'www.example.com'"));
        assert!(format!("{:#}", err).contains("failed to create secret"));
    }
}
