use anyhow::{bail, Context, Result};
use chord_degrees::core::annotate::{annotate_text, extract_chords};
use chord_degrees::core::tonality::TonalityCatalog;
use chord_degrees::domain::model::Mode;
use chord_degrees::utils::logger;
use clap::{error::ErrorKind, CommandFactory, Parser};
use encoding_rs::Encoding;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "annotate-chords")]
#[command(about = "Adds scale degree numbers from the tonality table to a chord sheet")]
struct Args {
    /// Tonality, e.g. F, Bb, C#
    #[arg(long)]
    key: Option<String>,

    /// Mode for --key, or a filter for automatic detection (major|minor)
    #[arg(long)]
    mode: Option<Mode>,

    /// Path to the chord sheet; reads STDIN when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Encoding of the input file, e.g. utf-8, cp1251, koi8-r
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Print the selected tonality to stderr
    #[arg(long)]
    show_tonality: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// 依 `--encoding` 解碼輸入檔；無法對應的位元組視為錯誤，不做替換
fn decode(bytes: &[u8], label: &str, path: &Path) -> Result<String> {
    let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
        bail!("unknown encoding '{}'", label);
    };
    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => Ok(text.into_owned()),
        None => bail!("{} is not valid {}", path.display(), encoding.name()),
    }
}

fn read_text(path: Option<&Path>, encoding: &str) -> Result<String> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            decode(&bytes, encoding, path)
        }
        // STDIN 一律以 UTF-8 讀取
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read STDIN")?;
            Ok(text)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let text = read_text(args.input.as_deref(), &args.encoding)?;
    let chords = extract_chords(&text);
    tracing::debug!("Found {} chords", chords.len());

    let tonality = match TonalityCatalog::standard().select(args.key.as_deref(), args.mode, &chords) {
        Ok(tonality) => tonality,
        // 與參數錯誤相同：印出用法並以 2 結束
        Err(e) => Args::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let annotated = annotate_text(&text, &tonality.chord_map);
    if args.show_tonality {
        eprintln!("Tonality used: {}", tonality.display_name());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(annotated.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
