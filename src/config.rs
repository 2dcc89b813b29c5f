use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Per-part ceiling the original service shipped with (10 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// File-part bytes one form keeps in memory before spooling to disk (32 MiB).
pub const DEFAULT_MAX_FORM_MEMORY: usize = 32 * 1024 * 1024;

/// Cap on a whole upload request body (512 MiB); parts past the form memory
/// threshold are spooled to disk, not rejected.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 512 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub content_root: String,
    pub database_url: String,
    pub max_upload_size: u64,
    pub max_form_memory: usize,
    pub max_request_size: usize,
    pub uploaded_by: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File upload ingestion API")]
pub struct Args {
    /// Host to bind to (overrides FILE_INTAKE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_INTAKE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory uploads are bucketed under (overrides FILE_INTAKE_CONTENT_ROOT)
    #[arg(long)]
    pub content_root: Option<String>,

    /// Database URL (overrides FILE_INTAKE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Largest accepted part in bytes (overrides FILE_INTAKE_MAX_UPLOAD_SIZE)
    #[arg(long)]
    pub max_upload_size: Option<u64>,

    /// File-part bytes kept in memory before spooling (overrides FILE_INTAKE_MAX_FORM_MEMORY)
    #[arg(long)]
    pub max_form_memory: Option<usize>,

    /// Largest upload request body accepted (overrides FILE_INTAKE_MAX_REQUEST_SIZE)
    #[arg(long)]
    pub max_request_size: Option<usize>,

    /// Identity recorded as the uploader (overrides FILE_INTAKE_UPLOADED_BY)
    #[arg(long)]
    pub uploaded_by: Option<String>,

    /// Create the schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_INTAKE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("FILE_INTAKE_PORT", 8080)?;
        let env_root =
            env::var("FILE_INTAKE_CONTENT_ROOT").unwrap_or_else(|_| "./data/uploads".into());
        let env_db = env::var("FILE_INTAKE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/files.db".into());
        let env_max_upload = env_or("FILE_INTAKE_MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)?;
        let env_max_form = env_or("FILE_INTAKE_MAX_FORM_MEMORY", DEFAULT_MAX_FORM_MEMORY)?;
        let env_max_request = env_or("FILE_INTAKE_MAX_REQUEST_SIZE", DEFAULT_MAX_REQUEST_SIZE)?;
        let env_uploader =
            env::var("FILE_INTAKE_UPLOADED_BY").unwrap_or_else(|_| "Hard-coded user".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            content_root: args.content_root.unwrap_or(env_root),
            database_url: args.database_url.unwrap_or(env_db),
            max_upload_size: args.max_upload_size.unwrap_or(env_max_upload),
            max_form_memory: args.max_form_memory.unwrap_or(env_max_form),
            max_request_size: args.max_request_size.unwrap_or(env_max_request),
            uploaded_by: args.uploaded_by.unwrap_or(env_uploader),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an environment variable, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
