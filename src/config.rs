use clap::Parser;
use derive_more::Display;

pub const DEFAULT_PORT: u16 = 4747;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DATABASE: &str = "annotations.db";
pub const DEFAULT_PREFIX: &str = "/services/annotations";

#[derive(Debug, Default, Parser)]
#[command(about = "Annotation storage service")]
pub struct Cli {
    /// Port to listen on when the platform does not provide one
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Address to bind when the platform does not provide one
    #[arg(long)]
    pub host: Option<String>,
    /// Path of the SQLite database file
    #[arg(long)]
    pub database: Option<String>,
    /// Path prefix the annotation routes are mounted under
    #[arg(long)]
    pub prefix: Option<String>,
    /// Only let the owner of an annotation update or delete it
    #[arg(long)]
    pub enforce_ownership: bool,
}

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "{} is not a valid port: {:?}", _0, _1)]
    InvalidPort(&'static str, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub prefix: String,
    pub enforce_ownership: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Config::resolve(Cli::parse(), |key| std::env::var(key).ok())
    }

    /// Platform-provided `PORT` and `HOST` win over flags; for everything
    /// else flags win over the environment.
    pub fn resolve(
        cli: Cli,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = match env("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort("PORT", raw))?,
            None => cli.port.unwrap_or(DEFAULT_PORT),
        };

        let host = env("HOST")
            .or(cli.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let database_url = cli
            .database
            .or_else(|| env("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let prefix = cli
            .prefix
            .or_else(|| env("ANNOTATIONS_PREFIX"))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_owned());
        let enforce_ownership = cli.enforce_ownership
            || env("ENFORCE_OWNERSHIP")
                .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);

        Ok(Config {
            host,
            port,
            database_url,
            prefix: normalize_prefix(&prefix),
            enforce_ownership,
        })
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
