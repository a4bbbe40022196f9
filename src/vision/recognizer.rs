//! Text recognition boundary
//!
//! The OCR engine is an external collaborator; this module defines the
//! lifecycle contract the scan pipeline drives. Construction loads a
//! language-specific model restricted to the facility character whitelist;
//! `terminate` releases the model and must be called exactly once, after
//! which the instance is unusable.

use anyhow::Result;
use async_trait::async_trait;
use image::GrayImage;

use super::vocabulary;

/// A block of recognized text with its position in the image.
#[derive(Debug, Clone)]
pub struct TextBlock {
    /// Recognized text content
    pub text: String,
    /// Bounding box (x, y, width, height)
    pub bounds: (u32, u32, u32, u32),
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Model-load parameters for a recognizer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSettings {
    /// Recognition language tag (e.g. "jpn")
    pub language: String,
    /// Characters recognition is restricted to
    pub char_whitelist: String,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            language: "jpn".to_string(),
            char_whitelist: vocabulary::char_whitelist(),
        }
    }
}

/// A loaded recognition model.
#[async_trait]
pub trait TextRecognizer: Send {
    /// Recognize text blocks in a binarized image.
    async fn recognize(&mut self, image: &GrayImage) -> Result<Vec<TextBlock>>;

    /// Release the model. Must be called exactly once per instance; any use
    /// after termination is an error.
    async fn terminate(&mut self) -> Result<()>;
}

/// Creates recognizer instances; the scan pipeline makes one per scan and
/// terminates it when the scan completes.
#[async_trait]
pub trait RecognizerFactory: Send + Sync {
    async fn create(&self, settings: &RecognizerSettings) -> Result<Box<dyn TextRecognizer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_use_japanese_model_and_whitelist() {
        let settings = RecognizerSettings::default();
        assert_eq!(settings.language, "jpn");
        assert_eq!(settings.char_whitelist, vocabulary::char_whitelist());
        assert!(settings.char_whitelist.contains('館'));
    }
}
