use crate::core::chord::{normalize_chord_symbol, scan_chords};
use std::collections::HashMap;

/// 下一個單字可能是和弦時允許出現的字元
const CHORD_WORD_CHARS: &str = "ABCDEFGHabcdefgh#bmsujdiaog0123456789/+-";
const MAX_CHORD_WORD_LEN: usize = 6;

/// 依出現順序取出所有和弦的正規化寫法 (保留重複)
pub fn extract_chords(text: &str) -> Vec<String> {
    scan_chords(text)
        .filter_map(|m| normalize_chord_symbol(m.text))
        .collect()
}

/// 和弦後面 (略過空白) 是否已經有 `(數字)` 標記
fn already_has_degree(rest: &str) -> bool {
    let Some(inner) = rest.trim_start().strip_prefix('(') else {
        return false;
    };
    let digits = inner.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && inner[digits..].starts_with(')')
}

fn looks_like_chord_word(word: &str) -> bool {
    let len = word.chars().count();
    if len == 0 || len > MAX_CHORD_WORD_LEN {
        return false;
    }
    let starts_with_note = word
        .chars()
        .next()
        .is_some_and(|c| matches!(c.to_ascii_uppercase(), 'A'..='H'));
    starts_with_note && word.chars().all(|c| CHORD_WORD_CHARS.contains(c))
}

/// 單一字母後接空白時，可能只是英文冠詞或一般文字；看下一個單字像不像和弦來判斷
fn is_standalone_letter(chord: &str, rest: &str) -> bool {
    if chord.chars().count() != 1 || !rest.starts_with(' ') {
        return false;
    }
    let after_spaces = rest.trim_start_matches(' ');
    if after_spaces.is_empty() {
        return false;
    }
    let next_word = after_spaces
        .split(char::is_whitespace)
        .next()
        .unwrap_or_default();
    !looks_like_chord_word(next_word)
}

/// 在每個屬於 `chord_map` 的和弦後面加上 ` (級數)`
pub fn annotate_text(text: &str, chord_map: &HashMap<String, u8>) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut last = 0;

    for m in scan_chords(text) {
        out.push_str(&text[last..m.start]);
        out.push_str(m.text);
        last = m.end;

        let rest = &text[m.end..];
        // 後面緊接小寫字母：是單字的一部分
        if rest.chars().next().is_some_and(|c| c.is_lowercase() && c.is_alphabetic()) {
            continue;
        }
        if is_standalone_letter(m.text, rest) || already_has_degree(rest) {
            continue;
        }
        if let Some(degree) = normalize_chord_symbol(m.text).and_then(|n| chord_map.get(&n).copied()) {
            out.push_str(&format!(" ({})", degree));
        }
    }

    out.push_str(&text[last..]);
    out
}
