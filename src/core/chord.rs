//! 和弦記號的掃描與正規化。
//!
//! 掃描規則：單字邊界上的音名 (`A`-`G`、`H`，大小寫皆可)，可接一個升降記號，
//! 之後接任意數量的和弦後綴 (`m`/`maj`/`min`、`sus`、`dim`、`aug`、`add`、數字、
//! `/低音`、`+`、`-`)。整段之後不能緊接 ASCII 小寫字母；最長的候選不成立時，
//! 會依序退回較短的候選。

use regex::Regex;
use std::sync::LazyLock;

static TRAILING_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,:;!?]+$").expect("valid trailing punctuation regex"));

static CHORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Ga-gHh])([#b]?)(.*)$").expect("valid chord token regex"));

/// 等音對照：把降記號與少見的升記號統一成表格使用的寫法
const ENHARMONIC_EQUIVALENTS: &[(&str, &str)] = &[
    ("AB", "G#"),
    ("BB", "A#"),
    ("CB", "B"),
    ("DB", "C#"),
    ("EB", "D#"),
    ("FB", "E"),
    ("GB", "F#"),
    ("E#", "F"),
    ("B#", "C"),
];

const FIXED_SUFFIXES: [&[u8]; 4] = [b"sus", b"dim", b"aug", b"add"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

pub fn is_note_letter(b: u8) -> bool {
    matches!(b, b'A'..=b'G' | b'a'..=b'g' | b'H' | b'h')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 從 `pos` 開始可以吃下的單一後綴，依優先順序回傳結束位置
fn suffix_steps(bytes: &[u8], pos: usize) -> Vec<usize> {
    let rest = &bytes[pos..];
    let mut steps = Vec::new();
    let Some(&first) = rest.first() else {
        return steps;
    };

    if first == b'm' {
        if rest[1..].starts_with(b"aj") || rest[1..].starts_with(b"in") {
            steps.push(pos + 3);
        }
        steps.push(pos + 1);
    }
    for suffix in FIXED_SUFFIXES {
        if rest.starts_with(suffix) {
            steps.push(pos + suffix.len());
        }
    }
    if first.is_ascii_digit() {
        steps.push(pos + 1);
    }
    if first == b'/' && rest.len() > 1 && is_note_letter(rest[1]) {
        if matches!(rest.get(2), Some(b'#') | Some(b'b')) {
            steps.push(pos + 3);
        }
        steps.push(pos + 2);
    }
    if first == b'+' || first == b'-' {
        steps.push(pos + 1);
    }
    steps
}

struct Frame {
    pos: usize,
    steps: Vec<usize>,
    next: usize,
}

/// 依回溯順序 (先嘗試更長的後綴鏈) 找出第一個滿足 `accept` 的結束位置
fn first_accepted_end(bytes: &[u8], from: usize, accept: impl Fn(usize) -> bool) -> Option<usize> {
    let mut stack = vec![Frame {
        pos: from,
        steps: suffix_steps(bytes, from),
        next: 0,
    }];

    loop {
        let frame = stack.last_mut()?;
        if frame.next < frame.steps.len() {
            let next = frame.steps[frame.next];
            frame.next += 1;
            let steps = suffix_steps(bytes, next);
            stack.push(Frame {
                pos: next,
                steps,
                next: 0,
            });
        } else {
            let pos = frame.pos;
            stack.pop();
            if accept(pos) {
                return Some(pos);
            }
        }
    }
}

/// 嘗試在 `start` (位元組位置) 比對一個和弦，回傳結束位置
fn match_at(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if !is_note_letter(bytes[start]) {
        return None;
    }
    if let Some(prev) = text[..start].chars().next_back() {
        if is_word_char(prev) {
            return None;
        }
    }

    let not_followed_by_lowercase =
        |end: usize| !matches!(bytes.get(end), Some(b) if b.is_ascii_lowercase());

    let root_end = start + 1;
    if matches!(bytes.get(root_end), Some(b'#') | Some(b'b')) {
        if let Some(end) = first_accepted_end(bytes, root_end + 1, not_followed_by_lowercase) {
            return Some(end);
        }
    }
    first_accepted_end(bytes, root_end, not_followed_by_lowercase)
}

pub struct ChordScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for ChordScanner<'a> {
    type Item = ChordMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let start = self.pos;
            if let Some(end) = match_at(self.text, start) {
                self.pos = end;
                return Some(ChordMatch {
                    start,
                    end,
                    text: &self.text[start..end],
                });
            }
            // 前進一個字元 (注意 UTF-8 多位元組)
            let width = self.text[start..].chars().next().map_or(1, char::len_utf8);
            self.pos = start + width;
        }
        None
    }
}

pub fn scan_chords(text: &str) -> ChordScanner<'_> {
    ChordScanner { text, pos: 0 }
}

/// 把和弦記號正規化成「根音 + 性質」，例如 `Bbm7/F` → `A#m`、`H7` → `B`
pub fn normalize_chord_symbol(symbol: &str) -> Option<String> {
    let cleaned = symbol.trim();
    if cleaned.is_empty() {
        return None;
    }
    let cleaned = TRAILING_PUNCTUATION.replace(cleaned, "");
    let base = cleaned.split('/').next().unwrap_or_default();
    let caps = CHORD_TOKEN.captures(base)?;

    let mut note = format!("{}{}", &caps[1], &caps[2]).to_uppercase();
    // 德式/俄式記譜：H 即 B
    if note == "H" {
        note = "B".to_string();
    }

    let tail = caps[3].to_lowercase();
    let quality = if tail.starts_with("maj") {
        ""
    } else if tail.starts_with("min") || tail.starts_with('m') {
        "m"
    } else {
        ""
    };

    let canonical = ENHARMONIC_EQUIVALENTS
        .iter()
        .find(|(from, _)| *from == note)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(note);

    Some(format!("{}{}", canonical, quality))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(text: &str) -> Vec<&str> {
        scan_chords(text).map(|m| m.text).collect()
    }

    #[test]
    fn test_scan_simple_progression() {
        assert_eq!(scanned("Am F C G"), vec!["Am", "F", "C", "G"]);
        assert_eq!(scanned("C#m7 Bbmaj7 Dsus4 E7/G#"), vec!["C#m7", "Bbmaj7", "Dsus4", "E7/G#"]);
    }

    #[test]
    fn test_scan_skips_ordinary_words() {
        assert_eq!(scanned("Everything changes"), Vec::<&str>::new());
        assert_eq!(scanned("Amazing Grace"), Vec::<&str>::new());
    }

    #[test]
    fn test_scan_backtracks_to_shorter_chord() {
        assert_eq!(scanned("C7susx"), vec!["C"]);
        assert_eq!(scanned("C#x"), vec!["C"]);
    }

    #[test]
    fn test_scan_requires_word_boundary() {
        assert_eq!(scanned("xC"), Vec::<&str>::new());
        assert_eq!(scanned("(G)"), vec!["G"]);
        assert_eq!(scanned("C#D"), vec!["C#", "D"]);
    }

    #[test]
    fn test_scan_handles_non_ascii_text() {
        assert_eq!(scanned("Припев: Am Dm"), vec!["Am", "Dm"]);
        assert_eq!(scanned("пA"), Vec::<&str>::new());
    }

    #[test]
    fn test_scan_reports_byte_offsets() {
        let text = "ля Em";
        let m = scan_chords(text).next().unwrap();
        assert_eq!(&text[m.start..m.end], "Em");
    }

    #[test]
    fn test_normalize_chord_symbol() {
        assert_eq!(normalize_chord_symbol("Am7").as_deref(), Some("Am"));
        assert_eq!(normalize_chord_symbol("Bbm7/F").as_deref(), Some("A#m"));
        assert_eq!(normalize_chord_symbol("Cmaj7").as_deref(), Some("C"));
        assert_eq!(normalize_chord_symbol("Dmin").as_deref(), Some("Dm"));
        assert_eq!(normalize_chord_symbol("H7").as_deref(), Some("B"));
        assert_eq!(normalize_chord_symbol("e#").as_deref(), Some("F"));
        assert_eq!(normalize_chord_symbol("G,").as_deref(), Some("G"));
        assert_eq!(normalize_chord_symbol("Dsus4").as_deref(), Some("D"));
    }

    #[test]
    fn test_normalize_rejects_non_chords() {
        assert_eq!(normalize_chord_symbol(""), None);
        assert_eq!(normalize_chord_symbol("   "), None);
        assert_eq!(normalize_chord_symbol("X7"), None);
        assert_eq!(normalize_chord_symbol("/G"), None);
    }
}
