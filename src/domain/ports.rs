use crate::domain::model::{HistoryEntry, UserId};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 每位使用者的結果檔存放處
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 存下一份結果，回傳產生的檔名
    async fn save(&self, user: &UserId, contents: &str) -> Result<String>;
    async fn read_text(&self, user: &UserId, filename: &str) -> Result<Option<String>>;
    async fn read_bytes(&self, user: &UserId, filename: &str) -> Result<Option<Vec<u8>>>;
    async fn list(&self, user: &UserId) -> Result<Vec<HistoryEntry>>;
    async fn delete(&self, user: &UserId, filename: &str) -> Result<bool>;
    async fn clear(&self, user: &UserId) -> Result<usize>;
}

/// 啟動時切換身分所需的作業系統操作
pub trait Privileges: Send + Sync {
    fn effective_uid(&self) -> u32;
    fn chown(&self, path: &Path, uid: u32, gid: u32) -> std::io::Result<()>;
    fn drop_to(&self, uid: u32, gid: u32) -> std::io::Result<()>;
}
