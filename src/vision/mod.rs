//! Vision pipeline
//!
//! Sequential scan chain from a captured preview frame: binarization, text
//! recognition against the facility character whitelist, and resolution of
//! the recognized text to a known facility name.

pub mod binarize;
pub mod recognizer;
pub mod vocabulary;

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use crate::render::Snapshot;

pub use binarize::{BinarizeSettings, Binarizer};
pub use recognizer::{RecognizerFactory, RecognizerSettings, TextBlock, TextRecognizer};

/// Outcome of scanning one captured frame.
#[derive(Debug)]
pub struct ScanResult {
    /// Recognized text blocks
    pub blocks: Vec<TextBlock>,
    /// All recognized text, joined line by line
    pub text: String,
    /// The facility the text resolved to, if any
    pub facility: Option<&'static str>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Binarize-then-recognize pipeline over captured frames.
///
/// A fresh recognizer is created per scan and terminated when the scan
/// completes, on success and on failure alike, so model resources never
/// accumulate across scans.
pub struct ScanPipeline {
    binarizer: Binarizer,
    factory: Box<dyn RecognizerFactory>,
    recognizer_settings: RecognizerSettings,
}

impl ScanPipeline {
    pub fn new(
        binarizer: Binarizer,
        factory: Box<dyn RecognizerFactory>,
        recognizer_settings: RecognizerSettings,
    ) -> Self {
        Self {
            binarizer,
            factory,
            recognizer_settings,
        }
    }

    /// Scan a captured frame for a facility name.
    pub async fn scan(&self, frame: &Snapshot) -> Result<ScanResult> {
        let start = Instant::now();

        let binary = self.binarizer.run(frame).context("binarization failed")?;

        let mut recognizer = self
            .factory
            .create(&self.recognizer_settings)
            .await
            .context("recognition model load failed")?;

        // Terminate even when recognition fails; the model must be released
        // on every exit path.
        let recognized = recognizer.recognize(&binary).await;
        let terminated = recognizer.terminate().await;

        let blocks = recognized.context("text recognition failed")?;
        terminated.context("recognizer teardown failed")?;

        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let facility = vocabulary::resolve(&text);

        let processing_time = start.elapsed();
        debug!(
            "scan complete in {:?}: {} blocks, facility {:?}",
            processing_time,
            blocks.len(),
            facility
        );

        Ok(ScanResult {
            blocks,
            text,
            facility,
            processing_time_ms: processing_time.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ColorSpace;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubRecognizer {
        text: Option<String>,
        terminated: bool,
        terminations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextRecognizer for StubRecognizer {
        async fn recognize(&mut self, _image: &GrayImage) -> Result<Vec<TextBlock>> {
            if self.terminated {
                bail!("recognizer used after terminate");
            }
            match &self.text {
                Some(text) => Ok(vec![TextBlock {
                    text: text.clone(),
                    bounds: (0, 0, 10, 10),
                    confidence: 0.9,
                }]),
                None => bail!("recognition failed"),
            }
        }

        async fn terminate(&mut self) -> Result<()> {
            if self.terminated {
                bail!("recognizer terminated twice");
            }
            self.terminated = true;
            self.terminations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubFactory {
        text: Option<String>,
        terminations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RecognizerFactory for StubFactory {
        async fn create(&self, _settings: &RecognizerSettings) -> Result<Box<dyn TextRecognizer>> {
            Ok(Box::new(StubRecognizer {
                text: self.text.clone(),
                terminated: false,
                terminations: Arc::clone(&self.terminations),
            }))
        }
    }

    fn white_snapshot() -> Snapshot {
        Snapshot::new(vec![255u8; 16 * 16 * 4], 16, 16, ColorSpace::Srgb)
    }

    fn pipeline(text: Option<&str>, terminations: &Arc<AtomicUsize>) -> ScanPipeline {
        ScanPipeline::new(
            Binarizer::default(),
            Box::new(StubFactory {
                text: text.map(str::to_string),
                terminations: Arc::clone(terminations),
            }),
            RecognizerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_scan_resolves_recognized_text() {
        let terminations = Arc::new(AtomicUsize::new(0));
        let result = pipeline(Some("天地館 1F"), &terminations)
            .scan(&white_snapshot())
            .await
            .unwrap();

        assert_eq!(result.facility, Some("天地館"));
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.text, "天地館 1F");
        assert_eq!(terminations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scan_without_match_yields_no_facility() {
        let terminations = Arc::new(AtomicUsize::new(0));
        let result = pipeline(Some("exit"), &terminations)
            .scan(&white_snapshot())
            .await
            .unwrap();

        assert_eq!(result.facility, None);
    }

    #[tokio::test]
    async fn test_recognizer_released_when_recognition_fails() {
        let terminations = Arc::new(AtomicUsize::new(0));
        let result = pipeline(None, &terminations).scan(&white_snapshot()).await;

        assert!(result.is_err());
        // The model is still terminated exactly once.
        assert_eq!(terminations.load(Ordering::SeqCst), 1);
    }
}
