//! Character-level transformer that scores encoded URLs.
//!
//! # Architecture
//!
//! ```text
//! ids [B, 75]
//!   → Embedding(vocab, 32) · √32
//!   → + positional table [75, 32]
//!   → 2 × EncoderLayer (2 heads, ff 64, post-norm)
//!   → max over sequence → [B, 32]
//!   → Linear(32, 1) → 1 − sigmoid
//! ```
//!
//! The trained head is oriented towards "benign", so the complement of the
//! sigmoid is the phishing probability.
//!
//! Parameters are fixed once the model is built. Scoring takes `&self` and the
//! type is `Send + Sync`, so one instance can serve many threads.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Embedding, Init, Linear, VarBuilder, VarMap};
use phishguard_core::{PhishGuardError, Result};

use crate::layers::{EncoderLayer, ModelDims, DIMS};
use crate::tokenizer::{TokenSequence, MAX_LEN};

/// Sequence classifier over [`TokenSequence`]s.
pub struct UrlTransformer {
    embedding: Embedding,
    pos_enc: Tensor,
    layers: Vec<EncoderLayer>,
    fc: Linear,
    embed_scale: f64,
    vocab_size: usize,
    device: Device,
    /// Owned variables, present only for freshly initialised models.
    varmap: Option<VarMap>,
}

impl UrlTransformer {
    /// Create a model with freshly initialised weights.
    ///
    /// Suitable for architecture validation and smoke tests. For serving,
    /// use [`UrlTransformer::load`] with trained weights.
    pub fn new_random(vocab_size: usize, device: &Device) -> Result<Self> {
        check_vocab_size(vocab_size)?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let mut model = Self::build(vb, vocab_size, device)
            .map_err(|e| PhishGuardError::Model(format!("Failed to initialise model: {e}")))?;
        model.varmap = Some(varmap);
        Ok(model)
    }

    /// Load a model from a safetensors file.
    ///
    /// Returns an error if the file cannot be read or any tensor is missing
    /// or has the wrong shape for the fixed architecture.
    pub fn load(path: impl AsRef<Path>, vocab_size: usize, device: &Device) -> Result<Self> {
        check_vocab_size(vocab_size)?;
        let path: PathBuf = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(PhishGuardError::Config(format!(
                "Weights file not found: {}",
                path.display()
            )));
        }

        // SAFETY: memory-mapping safetensors is the standard candle pattern.
        // The file must not be modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&path], DType::F32, device).map_err(|e| {
                PhishGuardError::Config(format!(
                    "Failed to read weights {}: {e}",
                    path.display()
                ))
            })?
        };

        Self::build(vb, vocab_size, device).map_err(|e| {
            PhishGuardError::Config(format!(
                "Weights in {} do not match the model architecture: {e}",
                path.display()
            ))
        })
    }

    fn build(vb: VarBuilder, vocab_size: usize, device: &Device) -> candle_core::Result<Self> {
        let dims = DIMS;
        let embedding =
            candle_nn::embedding(vocab_size, dims.d_model, vb.pp("embedding").pp("emb"))?;
        let pos_enc = vb.get_with_hints(
            (dims.max_len, dims.d_model),
            "pos_enc",
            Init::Randn {
                mean: 0.0,
                stdev: 1.0,
            },
        )?;

        let layers = (0..dims.num_layers)
            .map(|i| EncoderLayer::new(&dims, vb.pp("encoder").pp("layers").pp(i)))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let fc = candle_nn::linear(dims.d_model, 1, vb.pp("fc"))?;

        Ok(Self {
            embedding,
            pos_enc,
            layers,
            fc,
            embed_scale: (dims.d_model as f64).sqrt(),
            vocab_size,
            device: device.clone(),
            varmap: None,
        })
    }

    /// Write the weights of a freshly initialised model as safetensors.
    ///
    /// Models built with [`UrlTransformer::load`] do not own their variables
    /// and cannot be saved.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let varmap = self.varmap.as_ref().ok_or_else(|| {
            PhishGuardError::Config("Only freshly initialised models can be saved".to_string())
        })?;
        varmap.save(path.as_ref()).map_err(|e| {
            PhishGuardError::Model(format!(
                "Failed to save weights to {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Score a single sequence.
    pub fn score(&self, ids: &TokenSequence) -> Result<f64> {
        self.score_batch(std::slice::from_ref(ids))?
            .into_iter()
            .next()
            .ok_or_else(|| PhishGuardError::Model("Empty model output".to_string()))
    }

    /// Score a batch of sequences, one probability per input.
    ///
    /// Rows never interact, so the result for each sequence is the same as
    /// scoring it alone.
    pub fn score_batch(&self, batch: &[TokenSequence]) -> Result<Vec<f64>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.check_tokens(batch)?;

        let flat: Vec<u32> = batch.iter().flat_map(|seq| seq.iter().copied()).collect();
        let ids = Tensor::from_vec(flat, (batch.len(), MAX_LEN), &self.device)
            .map_err(|e| PhishGuardError::Model(format!("Failed to create input tensor: {e}")))?;

        let probs = self
            .forward(&ids)
            .map_err(|e| PhishGuardError::Model(format!("Forward pass failed: {e}")))?;
        let probs: Vec<f32> = probs
            .to_dtype(DType::F32)
            .and_then(|t| t.to_vec1())
            .map_err(|e| PhishGuardError::Model(format!("Failed to extract scores: {e}")))?;

        probs
            .into_iter()
            .map(|p| {
                if p.is_finite() {
                    Ok(f64::from(p).clamp(0.0, 1.0))
                } else {
                    Err(PhishGuardError::Model(format!("Non-finite score: {p}")))
                }
            })
            .collect()
    }

    /// `[B, MAX_LEN]` u32 ids -> `[B]` phishing probabilities.
    fn forward(&self, ids: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.embedding.forward(ids)?.affine(self.embed_scale, 0.0)?;
        let mut x = x.broadcast_add(&self.pos_enc)?;
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }

        let pooled = x.max(1)?;
        let logits = self.fc.forward(&pooled)?.squeeze(1)?;
        candle_nn::ops::sigmoid(&logits)?.affine(-1.0, 1.0)
    }

    fn check_tokens(&self, batch: &[TokenSequence]) -> Result<()> {
        let limit = self.vocab_size as u32;
        for (row, seq) in batch.iter().enumerate() {
            if let Some(pos) = seq.iter().position(|&id| id >= limit) {
                return Err(PhishGuardError::Model(format!(
                    "Token {} at row {row}, position {pos} is outside the embedding table (size {})",
                    seq[pos], self.vocab_size
                )));
            }
        }
        Ok(())
    }

    /// Rows in the embedding table.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Architecture hyperparameters.
    pub fn dims(&self) -> ModelDims {
        DIMS
    }

    /// Returns a reference to the device this model runs on.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

fn check_vocab_size(vocab_size: usize) -> Result<()> {
    if vocab_size == 0 || vocab_size > u32::MAX as usize {
        return Err(PhishGuardError::Config(format!(
            "Invalid vocab_size {vocab_size}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{encode, DEFAULT_VOCAB_SIZE, PAD, UNK};

    fn model() -> UrlTransformer {
        UrlTransformer::new_random(DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap()
    }

    fn pseudo_random_batch(n: usize, seed: u32) -> Vec<TokenSequence> {
        // Small LCG so the test is reproducible without pulling in rand.
        let mut state = seed;
        (0..n)
            .map(|_| {
                let mut seq = [PAD; MAX_LEN];
                for slot in seq.iter_mut() {
                    state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    *slot = (state >> 16) % (UNK + 1);
                }
                seq
            })
            .collect()
    }

    #[test]
    fn test_new_random_creates_model() {
        let m = model();
        assert_eq!(m.vocab_size(), 97);
        assert_eq!(m.dims().d_model, 32);
    }

    #[test]
    fn test_output_shape_and_range() {
        let m = model();
        let batch = pseudo_random_batch(7, 1);
        let scores = m.score_batch(&batch).unwrap();
        assert_eq!(scores.len(), 7);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_empty_batch() {
        assert!(model().score_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_batch_matches_individual_scores() {
        let m = model();
        let batch = pseudo_random_batch(5, 42);
        let batched = m.score_batch(&batch).unwrap();
        for (seq, expected) in batch.iter().zip(&batched) {
            let single = m.score(seq).unwrap();
            assert!(
                (single - expected).abs() < 1e-5,
                "batched {expected} vs single {single}"
            );
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let m = model();
        let ids = encode("http://secure-login-paypal.com.verify-account-update.co/login");
        let a = m.score(&ids).unwrap();
        let b = m.score(&ids).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_padding_sequence_scores() {
        let s = model().score(&[PAD; MAX_LEN]).unwrap();
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn test_out_of_range_token_is_an_error() {
        let m = UrlTransformer::new_random(96, &Device::Cpu).unwrap();
        let ids = encode("https://exämple.com");
        let err = m.score(&ids).unwrap_err();
        assert!(matches!(err, PhishGuardError::Model(_)));
        assert!(err.to_string().contains("outside the embedding table"));
    }

    #[test]
    fn test_zero_vocab_rejected() {
        assert!(UrlTransformer::new_random(0, &Device::Cpu).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let original = model();
        original.save(&path).unwrap();
        let loaded = UrlTransformer::load(&path, DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap();

        let batch = pseudo_random_batch(3, 7);
        assert_eq!(
            original.score_batch(&batch).unwrap(),
            loaded.score_batch(&batch).unwrap()
        );
    }

    #[test]
    fn test_loaded_model_cannot_be_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        model().save(&path).unwrap();

        let loaded = UrlTransformer::load(&path, DEFAULT_VOCAB_SIZE, &Device::Cpu).unwrap();
        assert!(loaded.save(dir.path().join("copy.safetensors")).is_err());
    }

    #[test]
    fn test_load_with_mismatched_vocab_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        model().save(&path).unwrap();

        let result = UrlTransformer::load(&path, 96, &Device::Cpu);
        assert!(matches!(result, Err(PhishGuardError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_path_fails() {
        let result = UrlTransformer::load("/nonexistent/model.safetensors", 97, &Device::Cpu);
        assert!(matches!(result, Err(PhishGuardError::Config(_))));
    }

    #[test]
    fn test_load_garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.safetensors");
        std::fs::write(&path, b"definitely not safetensors").unwrap();
        assert!(UrlTransformer::load(&path, 97, &Device::Cpu).is_err());
    }

    #[test]
    fn test_model_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UrlTransformer>();
    }

    // -----------------------------------------------------------------------
    // Plain-loop forward pass over the same parameters
    // -----------------------------------------------------------------------

    type Matrix = Vec<Vec<f64>>;

    struct Reference {
        params: std::collections::HashMap<String, Tensor>,
    }

    impl Reference {
        fn new(model: &UrlTransformer) -> Self {
            let varmap = model.varmap.as_ref().unwrap();
            let params = varmap
                .data()
                .lock()
                .unwrap()
                .iter()
                .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
                .collect();
            Self { params }
        }

        fn vector(&self, name: &str) -> Vec<f64> {
            self.params[name]
                .to_vec1::<f32>()
                .unwrap()
                .into_iter()
                .map(f64::from)
                .collect()
        }

        fn matrix(&self, name: &str) -> Matrix {
            self.params[name]
                .to_vec2::<f32>()
                .unwrap()
                .into_iter()
                .map(|row| row.into_iter().map(f64::from).collect())
                .collect()
        }

        /// `x · Wᵀ + b` row by row, with PyTorch `[out, in]` weight layout.
        fn linear(&self, prefix: &str, x: &[Vec<f64>]) -> Matrix {
            let w = self.matrix(&format!("{prefix}.weight"));
            let b = self.vector(&format!("{prefix}.bias"));
            affine_rows(x, &w, &b)
        }

        fn add_and_norm(&self, prefix: &str, x: &[Vec<f64>], y: &[Vec<f64>]) -> Matrix {
            let gamma = self.vector(&format!("{prefix}.weight"));
            let beta = self.vector(&format!("{prefix}.bias"));
            x.iter()
                .zip(y)
                .map(|(a, b)| {
                    let sum: Vec<f64> = a.iter().zip(b).map(|(p, q)| p + q).collect();
                    layer_norm(&sum, &gamma, &beta)
                })
                .collect()
        }

        fn score(&self, ids: &TokenSequence) -> f64 {
            let d = 32;
            let head_dim = 16;
            let emb = self.matrix("embedding.emb.weight");
            let pos = self.matrix("pos_enc");

            let mut x: Matrix = ids
                .iter()
                .enumerate()
                .map(|(t, &id)| {
                    (0..d)
                        .map(|j| emb[id as usize][j] * 32f64.sqrt() + pos[t][j])
                        .collect()
                })
                .collect();

            for layer in 0..2 {
                let p = format!("encoder.layers.{layer}");
                let qkv = affine_rows(
                    &x,
                    &self.matrix(&format!("{p}.self_attn.in_proj_weight")),
                    &self.vector(&format!("{p}.self_attn.in_proj_bias")),
                );

                let len = x.len();
                let mut context = vec![vec![0.0; d]; len];
                for head in 0..2 {
                    let off = head * head_dim;
                    for s in 0..len {
                        let logits: Vec<f64> = (0..len)
                            .map(|u| {
                                (0..head_dim)
                                    .map(|k| qkv[s][off + k] * qkv[u][d + off + k])
                                    .sum::<f64>()
                                    * 0.25
                            })
                            .collect();
                        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
                        let z: f64 = exps.iter().sum();
                        for k in 0..head_dim {
                            context[s][off + k] = (0..len)
                                .map(|u| exps[u] / z * qkv[u][2 * d + off + k])
                                .sum();
                        }
                    }
                }

                let attn = self.linear(&format!("{p}.self_attn.out_proj"), &context);
                x = self.add_and_norm(&format!("{p}.norm1"), &x, &attn);

                let hidden: Matrix = self
                    .linear(&format!("{p}.linear1"), &x)
                    .into_iter()
                    .map(|row| row.into_iter().map(|v| v.max(0.0)).collect())
                    .collect();
                let ff = self.linear(&format!("{p}.linear2"), &hidden);
                x = self.add_and_norm(&format!("{p}.norm2"), &x, &ff);
            }

            let pooled: Vec<f64> = (0..d)
                .map(|j| x.iter().map(|row| row[j]).fold(f64::NEG_INFINITY, f64::max))
                .collect();
            let logit = self.linear("fc", &[pooled])[0][0];
            1.0 - 1.0 / (1.0 + (-logit).exp())
        }
    }

    fn affine_rows(x: &[Vec<f64>], w: &[Vec<f64>], b: &[f64]) -> Matrix {
        x.iter()
            .map(|row| {
                w.iter()
                    .zip(b)
                    .map(|(w_row, bias)| {
                        w_row.iter().zip(row).map(|(a, c)| a * c).sum::<f64>() + bias
                    })
                    .collect()
            })
            .collect()
    }

    fn layer_norm(x: &[f64], gamma: &[f64], beta: &[f64]) -> Vec<f64> {
        let n = x.len() as f64;
        let mean = x.iter().sum::<f64>() / n;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let inv_std = 1.0 / (var + 1e-5).sqrt();
        x.iter()
            .zip(gamma)
            .zip(beta)
            .map(|((v, g), b)| (v - mean) * inv_std * g + b)
            .collect()
    }

    #[test]
    fn test_forward_matches_reference_implementation() {
        let m = model();
        let reference = Reference::new(&m);
        let long = format!("http://{}.example/login", "a".repeat(90));
        for url in [
            "https://example.com",
            "http://paypal-secure-login.ru/verify?id=1",
            "",
            "https://exämple.com/ü",
            long.as_str(),
        ] {
            let ids = encode(url);
            let expected = reference.score(&ids);
            let actual = m.score(&ids).unwrap();
            assert!(
                (actual - expected).abs() < 1e-4,
                "{url:?}: candle {actual} vs reference {expected}"
            );
        }
    }

    #[test]
    fn test_head_reports_complement_of_sigmoid() {
        // Zero fc weights leave only the bias, so every input gets
        // 1 - sigmoid(2.0) = 0.11920292.
        let mut m = model();
        let varmap = m.varmap.as_mut().unwrap();
        varmap
            .set_one("fc.weight", Tensor::zeros((1, 32), DType::F32, &Device::Cpu).unwrap())
            .unwrap();
        varmap
            .set_one("fc.bias", Tensor::new(&[2.0f32], &Device::Cpu).unwrap())
            .unwrap();

        for url in ["https://example.com", "http://paypal-secure-login.ru"] {
            let score = m.score(&encode(url)).unwrap();
            assert!((score - 0.119_202_92).abs() < 1e-6, "{url}: {score}");
        }
    }
}
