use chord_degrees::core::startup::{StageOutcome, StartupStage};
use chord_degrees::domain::ports::Privileges;
use chord_degrees::{Launcher, ServerConfig};
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// 已經是一般使用者的程序：不需要也不能切換身分
struct AlreadyUnprivileged;

impl Privileges for AlreadyUnprivileged {
    fn effective_uid(&self) -> u32 {
        1000
    }

    fn chown(&self, _path: &Path, _uid: u32, _gid: u32) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
    }

    fn drop_to(&self, _uid: u32, _gid: u32) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_launcher_runs_all_stages_and_serves() {
    let temp_dir = TempDir::new().unwrap();
    let port = free_port();
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        workers: 2,
        results_dir: temp_dir.path().join("results"),
        ..ServerConfig::default()
    };

    let mut launcher = Launcher::new(config, AlreadyUnprivileged);
    launcher.prepare().unwrap();
    assert!(temp_dir.path().join("results").is_dir());

    let listener = launcher.bind().await.unwrap();
    assert_eq!(listener.local_addr().unwrap().port(), port);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        launcher
            .serve(listener, async {
                let _ = stop_rx.await;
            })
            .await
            .map(|_| launcher.stages().to_vec())
    });

    let response = reqwest::get(format!("http://127.0.0.1:{}/tonalities", port))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    stop_tx.send(()).unwrap();
    let stages = server.await.unwrap().unwrap();

    let order: Vec<StartupStage> = stages.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(order, StartupStage::ORDER.to_vec());
    assert_eq!(stages[1].1, StageOutcome::Skipped);
    assert_eq!(stages[2].1, StageOutcome::Skipped);
    assert_eq!(stages[5].1, StageOutcome::Completed);
}

#[tokio::test]
async fn test_second_server_on_same_port_fails_to_start() {
    let temp_dir = TempDir::new().unwrap();
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        results_dir: temp_dir.path().join("results"),
        ..ServerConfig::default()
    };
    let mut launcher = Launcher::new(config, AlreadyUnprivileged);
    launcher.prepare().unwrap();

    let err = launcher.bind().await.unwrap_err();
    assert_ne!(err.exit_code(), 0);
    assert!(err.user_friendly_message().contains("bind"));
}
