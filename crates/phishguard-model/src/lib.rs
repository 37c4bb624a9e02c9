//! Phishing URL scoring.
//!
//! Two pieces make up the inference path:
//!
//! - [`tokenizer`] turns a URL into a fixed-width [`TokenSequence`].
//! - [`UrlTransformer`] maps token sequences to phishing probabilities.
//!
//! [`PhishDetector`] composes the two and is what the server holds.

pub mod detector;
pub mod device;
pub mod layers;
pub mod tokenizer;
pub mod transformer;

pub use candle_core::Device;
pub use detector::{PhishDetector, WeightSource};
pub use device::{device_label, select_device, DevicePreference};
pub use layers::{ModelDims, DIMS};
pub use tokenizer::{encode, TokenSequence, DEFAULT_VOCAB_SIZE, MAX_LEN, PAD, UNK};
pub use transformer::UrlTransformer;
