//! Transformer encoder layer used by [`UrlTransformer`](crate::UrlTransformer).
//!
//! Post-norm composition, matching the trained artifact:
//!
//! ```text
//! x = norm1(x + self_attn(x))
//! x = norm2(x + linear2(relu(linear1(x))))
//! ```
//!
//! Attention is unmasked. Every position, padding included, attends to every
//! other position.

use candle_core::{Module, Tensor, D};
use candle_nn::{Init, LayerNorm, Linear, VarBuilder};

/// Fixed architecture hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    /// Width of the residual stream.
    pub d_model: usize,
    /// Number of attention heads.
    pub num_heads: usize,
    /// Hidden width of the feed-forward sub-block.
    pub ff_dim: usize,
    /// Number of stacked encoder layers.
    pub num_layers: usize,
    /// Sequence length (rows of the positional table).
    pub max_len: usize,
}

impl ModelDims {
    /// Width of each attention head.
    pub const fn head_dim(&self) -> usize {
        self.d_model / self.num_heads
    }
}

/// The architecture the serving path is built for.
pub const DIMS: ModelDims = ModelDims {
    d_model: 32,
    num_heads: 2,
    ff_dim: 64,
    num_layers: 2,
    max_len: crate::tokenizer::MAX_LEN,
};

/// LayerNorm epsilon used by the trained artifact.
pub const LAYER_NORM_EPS: f64 = 1e-5;

/// Multi-head self-attention with a packed q/k/v input projection.
#[derive(Debug, Clone)]
struct SelfAttention {
    in_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn new(dims: &ModelDims, vb: VarBuilder) -> candle_core::Result<Self> {
        let d = dims.d_model;
        let in_w = vb.get_with_hints(
            (3 * d, d),
            "in_proj_weight",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let in_b = vb.get_with_hints(3 * d, "in_proj_bias", Init::Const(0.0))?;
        let out_proj = candle_nn::linear(d, d, vb.pp("out_proj"))?;
        let head_dim = dims.head_dim();

        Ok(Self {
            in_proj: Linear::new(in_w, Some(in_b)),
            out_proj,
            num_heads: dims.num_heads,
            head_dim,
            scale: 1.0 / (head_dim as f64).sqrt(),
        })
    }

    /// `[batch, seq, d_model]` -> `[batch, heads, seq, head_dim]`
    fn split_heads(&self, x: &Tensor, b: usize, t: usize) -> candle_core::Result<Tensor> {
        x.reshape((b, t, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (b, t, d) = x.dims3()?;
        let qkv = self.in_proj.forward(x)?;

        let q = self.split_heads(&qkv.narrow(D::Minus1, 0, d)?, b, t)?;
        let k = self.split_heads(&qkv.narrow(D::Minus1, d, d)?, b, t)?;
        let v = self.split_heads(&qkv.narrow(D::Minus1, 2 * d, d)?, b, t)?;

        // [b, h, t, t]
        let scores = q.matmul(&k.t()?)?.affine(self.scale, 0.0)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b, t, d))?;
        self.out_proj.forward(&context)
    }
}

/// One encoder layer: attention and feed-forward, each wrapped in a
/// residual connection followed by LayerNorm.
#[derive(Debug, Clone)]
pub(crate) struct EncoderLayer {
    self_attn: SelfAttention,
    linear1: Linear,
    linear2: Linear,
    norm1: LayerNorm,
    norm2: LayerNorm,
}

impl EncoderLayer {
    pub(crate) fn new(dims: &ModelDims, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            self_attn: SelfAttention::new(dims, vb.pp("self_attn"))?,
            linear1: candle_nn::linear(dims.d_model, dims.ff_dim, vb.pp("linear1"))?,
            linear2: candle_nn::linear(dims.ff_dim, dims.d_model, vb.pp("linear2"))?,
            norm1: candle_nn::layer_norm(dims.d_model, LAYER_NORM_EPS, vb.pp("norm1"))?,
            norm2: candle_nn::layer_norm(dims.d_model, LAYER_NORM_EPS, vb.pp("norm2"))?,
        })
    }

    pub(crate) fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let attn = self.self_attn.forward(x)?;
        let x = self.norm1.forward(&(x + attn)?)?;

        let ff = self
            .linear2
            .forward(&self.linear1.forward(&x)?.relu()?)?;
        self.norm2.forward(&(&x + ff)?)
    }
}
