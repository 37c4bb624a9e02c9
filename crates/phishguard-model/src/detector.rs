//! URL phishing detector: encoder and transformer behind one call.

use std::path::PathBuf;

use candle_core::Device;
use phishguard_core::{ModelConfig, PhishGuardError, Result};

use crate::tokenizer;
use crate::transformer::UrlTransformer;

/// Where the detector's parameters came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    /// Trained weights loaded from disk.
    File(PathBuf),
    /// Freshly initialised, untrained weights.
    Random,
}

impl std::fmt::Display for WeightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Scores URLs for phishing probability.
///
/// Holds no mutable state. Wrap in an `Arc` to share across request handlers.
///
/// # Example
///
/// ```
/// use candle_core::Device;
/// use phishguard_model::{PhishDetector, DEFAULT_VOCAB_SIZE};
///
/// let detector = PhishDetector::new_random(DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap();
/// let score = detector.classify("https://example.com").unwrap();
/// assert!((0.0..=1.0).contains(&score));
/// ```
pub struct PhishDetector {
    model: UrlTransformer,
    source: WeightSource,
}

impl PhishDetector {
    /// Build a detector from the service's model configuration.
    ///
    /// Fails when no weights path is configured unless
    /// `allow_random_weights` is set.
    pub fn load(config: &ModelConfig, device: &Device) -> Result<Self> {
        match &config.weights_path {
            Some(path) => {
                let model = UrlTransformer::load(path, config.vocab_size, device)?;
                tracing::info!(
                    path = %path,
                    vocab_size = config.vocab_size,
                    "Loaded phishing model weights"
                );
                Ok(Self {
                    model,
                    source: WeightSource::File(PathBuf::from(path)),
                })
            }
            None if config.allow_random_weights => {
                tracing::warn!("No weights configured, using randomly initialised model");
                Self::new_random(config.vocab_size, device)
            }
            None => Err(PhishGuardError::Config(
                "No model weights configured (set model.weights_path or PHISHGUARD_WEIGHTS)"
                    .to_string(),
            )),
        }
    }

    /// Detector with freshly initialised weights.
    pub fn new_random(vocab_size: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            model: UrlTransformer::new_random(vocab_size, device)?,
            source: WeightSource::Random,
        })
    }

    /// Phishing probability for one URL.
    pub fn classify(&self, url: &str) -> Result<f64> {
        self.model.score(&tokenizer::encode(url))
    }

    /// Phishing probabilities for several URLs, in input order.
    pub fn classify_batch<S: AsRef<str>>(&self, urls: &[S]) -> Result<Vec<f64>> {
        self.model.score_batch(&tokenizer::encode_batch(urls))
    }

    /// The underlying model.
    pub fn model(&self) -> &UrlTransformer {
        &self.model
    }

    /// Where the weights came from.
    pub fn source(&self) -> &WeightSource {
        &self.source
    }
}
