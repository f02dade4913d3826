use crate::core::annotate::{annotate_text, extract_chords};
use crate::core::tonality::TonalityCatalog;
use crate::domain::model::{Annotation, Mode};
use crate::utils::error::{AppError, Result};

/// 和弦級數標註：找和弦、決定調性、加上級數
#[derive(Debug, Clone, Copy)]
pub struct AnnotationService {
    catalog: &'static TonalityCatalog,
}

impl Default for AnnotationService {
    fn default() -> Self {
        Self::new(TonalityCatalog::standard())
    }
}

impl AnnotationService {
    pub fn new(catalog: &'static TonalityCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'static TonalityCatalog {
        self.catalog
    }

    /// 標註一段文字；`key` 為空時自動判斷調性，`mode` 可限制候選調式
    pub fn annotate(&self, text: &str, key: Option<&str>, mode: Option<Mode>) -> Result<Annotation> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Text cannot be empty"));
        }

        let chords = extract_chords(text);
        if chords.is_empty() {
            return Err(AppError::validation("No chords found in the text"));
        }
        tracing::debug!("Found {} chords", chords.len());

        let tonality = self.catalog.select(key, mode, &chords)?;
        tracing::debug!("Selected tonality: {}", tonality.display_name());

        Ok(Annotation {
            annotated_text: annotate_text(text, &tonality.chord_map),
            tonality: tonality.clone(),
        })
    }
}
