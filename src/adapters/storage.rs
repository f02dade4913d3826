use crate::domain::model::{HistoryEntry, UserId};
use crate::domain::ports::ResultStore;
use crate::utils::error::{AppError, Result};
use crate::utils::validation::is_safe_filename;
use async_trait::async_trait;
use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const RESULT_EXTENSION: &str = "txt";
const TITLE_MAX_CHARS: usize = 50;

/// 本機檔案系統上的結果目錄：`<base>/<user_id>/result_*.txt`
#[derive(Debug, Clone)]
pub struct LocalResultStore {
    base_path: PathBuf,
}

impl LocalResultStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 取得 (必要時建立) 使用者目錄
    async fn user_dir(&self, user: &UserId) -> Result<PathBuf> {
        let dir = self.base_path.join(user.to_string());
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// 不合法的檔名一律當作不存在
    async fn existing_file(&self, user: &UserId, filename: &str) -> Result<Option<PathBuf>> {
        if !is_safe_filename(filename) {
            tracing::warn!("Rejected unsafe result filename: {:?}", filename);
            return Ok(None);
        }
        let path = self.user_dir(user).await?.join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::IoError(e)),
        }
    }

    async fn result_files(&self, user: &UserId) -> Result<Vec<PathBuf>> {
        let dir = self.user_dir(user).await?;
        let mut entries = fs::read_dir(&dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_result = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == RESULT_EXTENSION);
            if is_result && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// 歷史清單的標題：檔案第一行 (去頭尾空白)，過長時截斷
fn title_from_contents(contents: &str, filename: &str) -> String {
    let first_line = contents.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return filename.to_string();
    }
    if first_line.chars().count() > TITLE_MAX_CHARS {
        let cut: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

#[async_trait]
impl ResultStore for LocalResultStore {
    async fn save(&self, user: &UserId, contents: &str) -> Result<String> {
        let dir = self.user_dir(user).await?;
        let stem = format!("result_{}", Local::now().format("%Y%m%d_%H%M%S"));

        // 同一秒內的多次儲存加上序號，不覆蓋舊結果
        let mut attempt = 0u32;
        loop {
            let filename = if attempt == 0 {
                format!("{}.{}", stem, RESULT_EXTENSION)
            } else {
                format!("{}_{}.{}", stem, attempt, RESULT_EXTENSION)
            };
            let path = dir.join(&filename);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes()).await?;
                    file.flush().await?;
                    tracing::debug!("Saved result {} for user {}", filename, user);
                    return Ok(filename);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(AppError::IoError(e)),
            }
        }
    }

    async fn read_text(&self, user: &UserId, filename: &str) -> Result<Option<String>> {
        match self.existing_file(user, filename).await? {
            Some(path) => Ok(Some(fs::read_to_string(path).await?)),
            None => Ok(None),
        }
    }

    async fn read_bytes(&self, user: &UserId, filename: &str) -> Result<Option<Vec<u8>>> {
        match self.existing_file(user, filename).await? {
            Some(path) => Ok(Some(fs::read(path).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>> {
        let mut history = Vec::new();
        for path in self.result_files(user).await? {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let meta = fs::metadata(&path).await?;
            let created = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            let title = match fs::read_to_string(&path).await {
                Ok(contents) => title_from_contents(&contents, &filename),
                Err(_) => filename.clone(),
            };
            history.push(HistoryEntry {
                filename,
                created,
                size: meta.len(),
                title,
            });
        }

        // 新的在前
        history.sort_by(|a, b| b.created.total_cmp(&a.created));
        Ok(history)
    }

    async fn delete(&self, user: &UserId, filename: &str) -> Result<bool> {
        match self.existing_file(user, filename).await? {
            Some(path) => {
                fs::remove_file(path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self, user: &UserId) -> Result<usize> {
        let files = self.result_files(user).await?;
        for path in &files {
            fs::remove_file(path).await?;
        }
        tracing::info!("Cleared {} results for user {}", files.len(), user);
        Ok(files.len())
    }
}
