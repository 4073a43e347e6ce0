//! Startup configuration.
//!
//! Every setting comes from a command-line flag with an environment-variable
//! fallback. `Config` is parsed once in `main` and passed down explicitly;
//! nothing below `main` reads the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::cors::{AllowedOrigins, CorsPolicy};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FESTIVALS_FILE: &str = "./festivals.json";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "*";

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, one event per line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "festivals-api", version, about)]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// `*` or a comma-separated list of origins allowed to read responses.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGINS)]
    pub allowed_origins: String,

    /// Supabase project URL. Requires `--supabase-key`.
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key. Requires `--supabase-url`.
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Festivals snapshot served when Supabase is not configured.
    #[arg(long, env = "FESTIVALS_FILE", default_value = DEFAULT_FESTIVALS_FILE)]
    pub festivals_file: PathBuf,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn cors(&self) -> CorsPolicy {
        CorsPolicy::new(AllowedOrigins::new(&self.allowed_origins))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_owned(),
            supabase_url: None,
            supabase_key: None,
            festivals_file: PathBuf::from(DEFAULT_FESTIVALS_FILE),
            log_format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "festivals-api",
            "--port", "3000",
            "--allowed-origins", "http://localhost:5173",
            "--supabase-url", "https://test.supabase.co",
            "--supabase-key", "test-key",
            "--log-format", "json",
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.allowed_origins, "http://localhost:5173");
        assert_eq!(config.supabase_url.as_deref(), Some("https://test.supabase.co"));
        assert_eq!(config.supabase_key.as_deref(), Some("test-key"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn default_binds_all_interfaces_on_8080() {
        assert_eq!(Config::default().addr(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn cors_follows_allowed_origins() {
        let config = Config { allowed_origins: "http://a, http://b".into(), ..Config::default() };
        let origin = http::HeaderValue::from_static("http://b");
        assert_eq!(config.cors().allow_origin(Some(&origin)), Some(origin));
    }
}
