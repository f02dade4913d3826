pub mod toml_config;

use crate::utils::error::{AppError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, Validate,
};
use clap::Parser;
use std::path::PathBuf;
use toml_config::FileConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_RUN_AS_UID: u32 = 1000;
pub const DEFAULT_RUN_AS_GID: u32 = 1000;
/// 僅供開發使用，正式環境請以 SECRET_KEY 覆蓋
pub const DEVELOPMENT_SECRET: &str = "chord-degrees-development-secret";

const MAX_WORKERS: usize = 256;

/// 命令列參數；每個選項都可以用環境變數提供
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "chord-degrees")]
#[command(about = "Web service that annotates chord sheets with scale degrees")]
pub struct ServeArgs {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "CHORD_DEGREES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind (default 0.0.0.0)
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (default 8000)
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Number of worker threads serving requests (default 4)
    #[arg(short, long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Directory holding per-user results (default ./results)
    #[arg(long, env = "RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// uid to switch to when started as root (default 1000)
    #[arg(long, env = "RUN_AS_UID")]
    pub run_as_uid: Option<u32>,

    /// gid to switch to when started as root (default 1000)
    #[arg(long, env = "RUN_AS_GID")]
    pub run_as_gid: Option<u32>,

    /// Key used to sign session cookies
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// 解析完成的伺服器設定：CLI > 環境變數 > TOML > 預設值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub results_dir: PathBuf,
    pub run_as_uid: u32,
    pub run_as_gid: u32,
    pub secret_key: String,
    pub log_json: bool,
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            run_as_uid: DEFAULT_RUN_AS_UID,
            run_as_gid: DEFAULT_RUN_AS_GID,
            secret_key: DEVELOPMENT_SECRET.to_string(),
            log_json: false,
            verbose: false,
        }
    }
}

impl ServerConfig {
    /// 讀取 (選用的) 設定檔並與命令列參數合併
    pub fn load(args: &ServeArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(args, &file))
    }

    pub fn resolve(args: &ServeArgs, file: &FileConfig) -> Self {
        let defaults = Self::default();
        Self {
            host: args
                .host
                .clone()
                .or_else(|| file.server.host.clone())
                .unwrap_or(defaults.host),
            port: args.port.or(file.server.port).unwrap_or(defaults.port),
            workers: args.workers.or(file.server.workers).unwrap_or(defaults.workers),
            results_dir: args
                .results_dir
                .clone()
                .or_else(|| file.storage.results_dir.clone())
                .unwrap_or(defaults.results_dir),
            run_as_uid: args
                .run_as_uid
                .or(file.security.run_as_uid)
                .unwrap_or(defaults.run_as_uid),
            run_as_gid: args
                .run_as_gid
                .or(file.security.run_as_gid)
                .unwrap_or(defaults.run_as_gid),
            secret_key: args
                .secret_key
                .clone()
                .or_else(|| file.security.secret_key.clone())
                .unwrap_or(defaults.secret_key),
            log_json: args.log_json || file.server.log_json.unwrap_or(false),
            verbose: args.verbose,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_development_secret(&self) -> bool {
        self.secret_key == DEVELOPMENT_SECRET
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("host", &self.host)?;
        validate_range("port", self.port, 1, u16::MAX)?;
        validate_range("workers", self.workers, 1, MAX_WORKERS)?;
        validate_path("results_dir", &self.results_dir.to_string_lossy())?;
        validate_non_empty_string("secret_key", &self.secret_key)?;

        if self.run_as_uid == 0 || self.run_as_gid == 0 {
            return Err(AppError::InvalidConfigValueError {
                field: "run_as_uid/run_as_gid".to_string(),
                value: format!("{}/{}", self.run_as_uid, self.run_as_gid),
                reason: "Refusing to serve as root; pick a non-zero uid and gid".to_string(),
            });
        }

        Ok(())
    }
}
