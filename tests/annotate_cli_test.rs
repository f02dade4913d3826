use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;

fn annotate_chords(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_annotate-chords"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // 參數錯誤時程式可能不讀 STDIN 就結束
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn file_with(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

#[test]
fn test_reads_stdin_and_detects_key() {
    let output = annotate_chords(&[], "C Am F G\n");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "C (1) Am (6) F (4) G (5)\n");
    assert!(!stderr(&output).contains("Tonality used"));
}

#[test]
fn test_show_tonality_goes_to_stderr() {
    let output = annotate_chords(&["--show-tonality"], "Am Dm E Am");
    assert!(output.status.success());
    assert!(stderr(&output).contains("Tonality used: Am (minor)"));
    assert!(!stdout(&output).contains("Tonality used"));
}

#[test]
fn test_explicit_key_and_mode() {
    let output = annotate_chords(&["--key", "G", "--mode", "minor"], "Gm Cm D7 Gm");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Gm (1) Cm (4) D7 (5) Gm (1)");
}

#[test]
fn test_missing_table_is_a_usage_error() {
    let output = annotate_chords(&["--key", "C", "--mode", "minor"], "C F G");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("No table data for the requested tonality."));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_text_without_chords_is_a_usage_error() {
    let output = annotate_chords(&[], "la la la\n");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("No chords found in the input text."));
}

#[test]
fn test_unknown_mode_is_rejected() {
    let output = annotate_chords(&["--mode", "dorian"], "C F G");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_decodes_cp1251_input_file() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Припев: Am Dm E Am\n");
    let file = file_with(&bytes);
    let path = file.path().to_str().unwrap();

    let output = annotate_chords(&["--input", path, "--encoding", "cp1251"], "");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Припев: Am (1) Dm (4) E (5) Am (1)\n");
}

#[test]
fn test_wrong_encoding_fails_instead_of_guessing() {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Припев: Am Dm E Am\n");
    let file = file_with(&bytes);
    let path = file.path().to_str().unwrap();

    let output = annotate_chords(&["--input", path], "");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("is not valid UTF-8"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_unknown_encoding_label_fails() {
    let file = file_with("Am Dm".as_bytes());
    let path = file.path().to_str().unwrap();

    let output = annotate_chords(&["--input", path, "--encoding", "klingon"], "");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown encoding 'klingon'"));
}

#[test]
fn test_koi8_r_label_is_accepted() {
    let (bytes, _, _) = encoding_rs::KOI8_R.encode("Куплет: G Em C D");
    let file = file_with(&bytes);
    let path = file.path().to_str().unwrap();

    let output = annotate_chords(&["--input", path, "--encoding", "koi8-r"], "");
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Куплет: G (1) Em (6) C (4) D (5)");
}
