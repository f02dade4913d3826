use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Mode::Major),
            "minor" => Ok(Mode::Minor),
            other => Err(format!("unknown mode '{}', expected major or minor", other)),
        }
    }
}

/// 一個調性：正規化後的主音、調式、表格中的標籤，以及和弦到級數 (1..=7) 的對照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tonality {
    pub key: String,
    pub mode: Mode,
    pub label: &'static str,
    pub chord_map: HashMap<String, u8>,
}

impl Tonality {
    pub fn degree_of(&self, chord: &str) -> Option<u8> {
        self.chord_map.get(chord).copied()
    }

    /// 例如 "Am (minor)"
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.label, self.mode)
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub annotated_text: String,
    pub tonality: Tonality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub filename: String,
    /// 檔案修改時間 (Unix 秒，含小數)
    pub created: f64,
    pub size: u64,
    pub title: String,
}
