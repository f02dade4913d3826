use crate::core::chord::normalize_chord_symbol;
use crate::domain::model::{Mode, Tonality};
use crate::utils::error::{AppError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

type ScaleTable = &'static [(&'static str, [&'static str; 7])];

const MAJOR_SCALES: ScaleTable = &[
    ("C", ["C", "Dm", "Em", "F", "G", "Am", "Bm"]),
    ("C#", ["C#", "D#m", "Fm", "F#", "G#", "A#m", "Cm"]),
    ("D", ["D", "Em", "F#m", "G", "A", "Bm", "C#m"]),
    ("D#", ["D#", "Fm", "Gm", "G#", "A#", "Cm", "Dm"]),
    ("E", ["E", "F#m", "G#m", "A", "B", "C#m", "D#m"]),
    ("F", ["F", "Gm", "Am", "A#", "C", "Dm", "Em"]),
    ("F#", ["F#", "G#m", "A#m", "B", "C#", "D#m", "Fm"]),
    ("G", ["G", "Am", "Bm", "C", "D", "Em", "F#m"]),
    ("G#", ["G#", "A#m", "Cm", "C#", "D#", "Fm", "Gm"]),
    ("A", ["A", "Bm", "C#m", "D", "E", "F#m", "G#m"]),
    ("A#", ["A#", "Cm", "Dm", "D#", "F", "Gm", "Am"]),
    ("B", ["B", "C#m", "D#m", "E", "F#", "G#m", "A#m"]),
];

const MINOR_SCALES: ScaleTable = &[
    ("F#m", ["F#m", "G#", "Am", "Bm", "C#", "D", "E"]),
    ("Gm", ["Gm", "A", "A#m", "Cm", "D", "D#m", "F"]),
    ("G#m", ["G#m", "A#", "Bm", "C#m", "D#", "Em", "F#"]),
    ("Am", ["Am", "B", "Cm", "Dm", "E", "Fm", "G"]),
    ("A#m", ["A#m", "C", "C#m", "D#m", "F", "F#m", "G#"]),
    ("Bm", ["Bm", "C#", "Dm", "Em", "F#", "Gm", "A"]),
];

static STANDARD_CATALOG: LazyLock<TonalityCatalog> = LazyLock::new(TonalityCatalog::build);

/// 正規化調名：大調去掉結尾的 `m`，小調補上 `m`
pub fn normalize_key_name(name: &str, mode: Mode) -> Option<String> {
    let symbol = normalize_chord_symbol(name)?;
    match mode {
        Mode::Major => match symbol.strip_suffix('m') {
            Some("") => None,
            Some(stripped) => Some(stripped.to_string()),
            None => Some(symbol),
        },
        Mode::Minor if !symbol.ends_with('m') => Some(format!("{}m", symbol)),
        Mode::Minor => Some(symbol),
    }
}

/// 所有已知調性 (依表格順序：先大調後小調) 以及 (主音, 調式) 索引
#[derive(Debug)]
pub struct TonalityCatalog {
    tonalities: Vec<Tonality>,
    by_key: HashMap<(String, Mode), usize>,
}

impl TonalityCatalog {
    pub fn standard() -> &'static TonalityCatalog {
        &STANDARD_CATALOG
    }

    fn build() -> Self {
        let mut tonalities = Vec::new();
        let mut by_key = HashMap::new();

        for (mode, scales) in [(Mode::Major, MAJOR_SCALES), (Mode::Minor, MINOR_SCALES)] {
            for (label, chords) in scales {
                let Some(key) = normalize_key_name(label, mode) else {
                    continue;
                };
                let mut chord_map = HashMap::new();
                for (idx, chord) in chords.iter().enumerate() {
                    if let Some(normalized) = normalize_chord_symbol(chord) {
                        // 同一列重複出現時保留第一個級數
                        chord_map.entry(normalized).or_insert(idx as u8 + 1);
                    }
                }
                by_key.insert((key.clone(), mode), tonalities.len());
                tonalities.push(Tonality {
                    key,
                    mode,
                    label: *label,
                    chord_map,
                });
            }
        }

        Self { tonalities, by_key }
    }

    pub fn all(&self) -> &[Tonality] {
        &self.tonalities
    }

    pub fn get(&self, key: &str, mode: Mode) -> Option<&Tonality> {
        self.by_key
            .get(&(key.to_string(), mode))
            .map(|&idx| &self.tonalities[idx])
    }

    /// 排序後的標籤，給 `/tonalities` 使用
    pub fn labels(&self, mode: Mode) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = self
            .tonalities
            .iter()
            .filter(|t| t.mode == mode)
            .map(|t| t.label)
            .collect();
        labels.sort_unstable();
        labels
    }

    /// 指定調名時直接查表；否則依命中數、不重複命中數、主和弦命中數挑選最符合的調性
    pub fn select(&self, key: Option<&str>, mode: Option<Mode>, chords: &[String]) -> Result<&Tonality> {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            let mode = mode.unwrap_or(Mode::Major);
            let normalized = normalize_key_name(key, mode)
                .ok_or_else(|| AppError::tonality("Invalid tonality name."))?;
            return self
                .get(&normalized, mode)
                .ok_or_else(|| AppError::tonality("No table data for the requested tonality."));
        }

        if chords.is_empty() {
            return Err(AppError::tonality("No chords found in the input text."));
        }

        let mut best: Option<((usize, usize, usize), &Tonality)> = None;
        for tonality in &self.tonalities {
            if mode.is_some_and(|m| m != tonality.mode) {
                continue;
            }
            let hits = chords
                .iter()
                .filter(|c| tonality.chord_map.contains_key(c.as_str()))
                .count();
            if hits == 0 {
                continue;
            }
            let unique_hits = chords
                .iter()
                .filter(|c| tonality.chord_map.contains_key(c.as_str()))
                .collect::<HashSet<_>>()
                .len();
            let tonic_hits = chords
                .iter()
                .filter(|c| tonality.degree_of(c.as_str()) == Some(1))
                .count();

            let score = (hits, unique_hits, tonic_hits);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, tonality));
            }
        }

        best.map(|(_, tonality)| tonality)
            .ok_or_else(|| AppError::tonality("Could not detect the tonality automatically."))
    }
}
