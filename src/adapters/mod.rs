// 介面卡：本機結果目錄、libc 身分切換、axum 網頁 API

pub mod http;
pub mod privileges;
pub mod storage;
