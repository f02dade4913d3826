//! 伺服器啟動流程。
//!
//! 各階段的順序固定：建立結果目錄 → 移交擁有權 → 放棄 root 身分 → 確認可寫入 →
//! 綁定 port → 開始服務。綁定 port 之前一定已經不是 root。

use crate::adapters::http::{self, AppState};
use crate::adapters::privileges::SystemPrivileges;
use crate::config::ServerConfig;
use crate::domain::ports::Privileges;
use crate::utils::error::{AppError, Result};
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    ProvisionResults,
    AssignOwnership,
    DropPrivileges,
    VerifyWritable,
    Bind,
    Serve,
}

impl StartupStage {
    pub const ORDER: [StartupStage; 6] = [
        StartupStage::ProvisionResults,
        StartupStage::AssignOwnership,
        StartupStage::DropPrivileges,
        StartupStage::VerifyWritable,
        StartupStage::Bind,
        StartupStage::Serve,
    ];

    fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|stage| stage == self)
            .unwrap_or(Self::ORDER.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StartupStage::ProvisionResults => "provision_results",
            StartupStage::AssignOwnership => "assign_ownership",
            StartupStage::DropPrivileges => "drop_privileges",
            StartupStage::VerifyWritable => "verify_writable",
            StartupStage::Bind => "bind",
            StartupStage::Serve => "serve",
        }
    }
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Skipped,
}

pub struct Launcher<P: Privileges> {
    config: ServerConfig,
    privileges: P,
    stages: Vec<(StartupStage, StageOutcome)>,
}

impl<P: Privileges> Launcher<P> {
    pub fn new(config: ServerConfig, privileges: P) -> Self {
        Self {
            config,
            privileges,
            stages: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// 已執行過的階段 (依執行順序)
    pub fn stages(&self) -> &[(StartupStage, StageOutcome)] {
        &self.stages
    }

    fn record(&mut self, stage: StartupStage, outcome: StageOutcome) {
        debug_assert!(
            self.stages
                .last()
                .map_or(true, |(prev, _)| prev.position() < stage.position()),
            "startup stage {} out of order",
            stage
        );
        self.stages.push((stage, outcome));
    }

    /// 綁定 port 之前的步驟；需在建立 tokio runtime 之前呼叫
    pub fn prepare(&mut self) -> Result<()> {
        self.provision_results()?;

        if self.privileges.effective_uid() == 0 {
            self.assign_ownership()?;
            self.drop_privileges()?;
        } else {
            tracing::info!(
                "Running as uid {}, no privilege drop needed",
                self.privileges.effective_uid()
            );
            self.record(StartupStage::AssignOwnership, StageOutcome::Skipped);
            self.record(StartupStage::DropPrivileges, StageOutcome::Skipped);
        }

        self.verify_writable()
    }

    fn provision_results(&mut self) -> Result<()> {
        let dir = &self.config.results_dir;
        std::fs::create_dir_all(dir).map_err(|e| AppError::startup(StartupStage::ProvisionResults, e))?;
        tracing::info!("📁 Results directory ready: {}", dir.display());
        self.record(StartupStage::ProvisionResults, StageOutcome::Completed);
        Ok(())
    }

    fn assign_ownership(&mut self) -> Result<()> {
        let (uid, gid) = (self.config.run_as_uid, self.config.run_as_gid);
        chown_recursive(&self.privileges, &self.config.results_dir, uid, gid)
            .map_err(|e| AppError::startup(StartupStage::AssignOwnership, e))?;
        tracing::info!(
            "🔑 Results directory now owned by {}:{}",
            uid,
            gid
        );
        self.record(StartupStage::AssignOwnership, StageOutcome::Completed);
        Ok(())
    }

    fn drop_privileges(&mut self) -> Result<()> {
        let (uid, gid) = (self.config.run_as_uid, self.config.run_as_gid);
        if uid == 0 || gid == 0 {
            return Err(AppError::PrivilegeError {
                message: "run-as uid/gid must not be 0".to_string(),
            });
        }

        self.privileges
            .drop_to(uid, gid)
            .map_err(|e| AppError::startup(StartupStage::DropPrivileges, e))?;
        if self.privileges.effective_uid() == 0 {
            return Err(AppError::PrivilegeError {
                message: "still running as root after dropping privileges".to_string(),
            });
        }
        tracing::info!("🔒 Dropped privileges to uid {} gid {}", uid, gid);
        self.record(StartupStage::DropPrivileges, StageOutcome::Completed);
        Ok(())
    }

    fn verify_writable(&mut self) -> Result<()> {
        let probe = self
            .config
            .results_dir
            .join(format!(".write-probe-{}", std::process::id()));
        let result = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .and_then(|mut file| file.write_all(b"ok"))
            .and_then(|_| std::fs::remove_file(&probe));
        result.map_err(|e| AppError::startup(StartupStage::VerifyWritable, e))?;

        self.record(StartupStage::VerifyWritable, StageOutcome::Completed);
        Ok(())
    }

    pub async fn bind(&mut self) -> Result<TcpListener> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::startup(StartupStage::Bind, e))?;
        let local = listener
            .local_addr()
            .map_err(|e| AppError::startup(StartupStage::Bind, e))?;
        tracing::info!("🎧 Listening at http://{}", local);
        self.record(StartupStage::Bind, StageOutcome::Completed);
        Ok(listener)
    }

    /// 提供服務直到 `shutdown` 完成
    pub async fn serve<F>(&mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.record(StartupStage::Serve, StageOutcome::Completed);
        let state = Arc::new(AppState::from_config(&self.config)?);
        tracing::info!("🚀 Serving with {} workers", self.config.workers);

        http::serve(listener, state, shutdown)
            .await
            .map_err(|e| AppError::startup(StartupStage::Serve, e))?;

        tracing::info!("✅ Server stopped");
        Ok(())
    }
}

/// 遞迴變更擁有者；不跟隨符號連結
fn chown_recursive<P: Privileges>(privileges: &P, path: &Path, uid: u32, gid: u32) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    privileges.chown(path, uid, gid)?;
    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            chown_recursive(privileges, &entry?.path(), uid, gid)?;
        }
    }
    Ok(())
}

/// 完整啟動：準備 → 建立固定 worker 數的 runtime → 綁定 → 服務
pub fn launch(config: ServerConfig) -> Result<()> {
    let workers = config.workers;
    let mut launcher = Launcher::new(config, SystemPrivileges);
    launcher.prepare()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("chord-worker")
        .enable_all()
        .build()
        .map_err(|e| AppError::startup(StartupStage::Serve, e))?;

    runtime.block_on(async move {
        let listener = launcher.bind().await?;
        launcher.serve(listener, http::shutdown_signal()).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakePrivileges {
        euid: Mutex<u32>,
        fail_drop: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakePrivileges {
        fn root() -> Self {
            Self::default()
        }

        fn user(uid: u32) -> Self {
            Self {
                euid: Mutex::new(uid),
                ..Self::default()
            }
        }
    }

    impl Privileges for &FakePrivileges {
        fn effective_uid(&self) -> u32 {
            *self.euid.lock().unwrap()
        }

        fn chown(&self, path: &Path, uid: u32, gid: u32) -> std::io::Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.calls.lock().unwrap().push(format!("chown {} {}:{}", name, uid, gid));
            Ok(())
        }

        fn drop_to(&self, uid: u32, gid: u32) -> std::io::Result<()> {
            if self.fail_drop {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
            }
            self.calls.lock().unwrap().push(format!("drop {}:{}", uid, gid));
            *self.euid.lock().unwrap() = uid;
            Ok(())
        }
    }

    fn config_in(dir: &Path) -> ServerConfig {
        ServerConfig {
            results_dir: dir.join("results"),
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_root_start_chowns_then_drops() {
        let temp_dir = TempDir::new().unwrap();
        let privileges = FakePrivileges::root();
        let mut launcher = Launcher::new(config_in(temp_dir.path()), &privileges);

        launcher.prepare().unwrap();

        let calls = privileges.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["chown results 1000:1000", "drop 1000:1000"]);
        assert_eq!(
            launcher.stages(),
            &[
                (StartupStage::ProvisionResults, StageOutcome::Completed),
                (StartupStage::AssignOwnership, StageOutcome::Completed),
                (StartupStage::DropPrivileges, StageOutcome::Completed),
                (StartupStage::VerifyWritable, StageOutcome::Completed),
            ]
        );
        assert!(temp_dir.path().join("results").is_dir());
    }

    #[test]
    fn test_chown_covers_existing_results() {
        let temp_dir = TempDir::new().unwrap();
        let user_dir = temp_dir.path().join("results").join("some-user");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("result_1.txt"), "C (1)").unwrap();

        let privileges = FakePrivileges::root();
        let mut launcher = Launcher::new(config_in(temp_dir.path()), &privileges);
        launcher.prepare().unwrap();

        let calls = privileges.calls.lock().unwrap();
        assert!(calls.contains(&"chown some-user 1000:1000".to_string()));
        assert!(calls.contains(&"chown result_1.txt 1000:1000".to_string()));
        assert_eq!(calls.last().unwrap(), "drop 1000:1000");
    }

    #[test]
    fn test_non_root_start_skips_privilege_stages() {
        let temp_dir = TempDir::new().unwrap();
        let privileges = FakePrivileges::user(1000);
        let mut launcher = Launcher::new(config_in(temp_dir.path()), &privileges);

        launcher.prepare().unwrap();

        assert!(privileges.calls.lock().unwrap().is_empty());
        assert_eq!(launcher.stages()[1], (StartupStage::AssignOwnership, StageOutcome::Skipped));
        assert_eq!(launcher.stages()[2], (StartupStage::DropPrivileges, StageOutcome::Skipped));
    }

    #[test]
    fn test_failed_drop_aborts_startup() {
        let temp_dir = TempDir::new().unwrap();
        let privileges = FakePrivileges {
            fail_drop: true,
            ..FakePrivileges::root()
        };
        let mut launcher = Launcher::new(config_in(temp_dir.path()), &privileges);

        let err = launcher.prepare().unwrap_err();
        assert!(matches!(
            err,
            AppError::StartupError {
                stage: StartupStage::DropPrivileges,
                ..
            }
        ));
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_root_run_as_user_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let privileges = FakePrivileges::root();
        let config = ServerConfig {
            run_as_uid: 0,
            ..config_in(temp_dir.path())
        };
        let mut launcher = Launcher::new(config, &privileges);

        assert!(matches!(launcher.prepare(), Err(AppError::PrivilegeError { .. })));
    }

    #[test]
    fn test_results_path_blocked_by_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocked = temp_dir.path().join("results");
        std::fs::write(&blocked, "not a directory").unwrap();

        let privileges = FakePrivileges::user(1000);
        let mut launcher = Launcher::new(config_in(temp_dir.path()), &privileges);

        let err = launcher.prepare().unwrap_err();
        assert!(matches!(
            err,
            AppError::StartupError {
                stage: StartupStage::ProvisionResults,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_taken() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let privileges = FakePrivileges::user(1000);
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            results_dir: PathBuf::from("unused"),
            ..ServerConfig::default()
        };
        let mut launcher = Launcher::new(config, &privileges);

        let err = launcher.bind().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::StartupError {
                stage: StartupStage::Bind,
                ..
            }
        ));
    }
}
