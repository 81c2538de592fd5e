use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};
use hfembed_core::types::{Pooling, PoolingOptions};

/// Reduce `hidden` `[B,T,H]` to `[B,H]` according to `options`.
pub fn pool(hidden: &Tensor, attention_mask: &Tensor, options: PoolingOptions) -> Result<Tensor> {
    let pooled = match options.pooling {
        Pooling::Mean => mean_pool(hidden, attention_mask)?,
        Pooling::Cls => cls_pool(hidden)?,
    };
    if options.normalize { l2_normalize(&pooled) } else { Ok(pooled) }
}

/// Arithmetic mean over the tokens whose mask is non-zero.
pub fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    ensure!(hidden.dims().len() == 3, "hidden shape must be [B,T,H], got {:?}", hidden.dims());
    let (batch, _time, hidden_dim) = hidden.dims3()?;

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = mask_3d.broadcast_as(hidden.shape()).or_else(|_| mask_3d.repeat((1, 1, hidden_dim)))?;
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    ensure!(mean.dims() == [batch, hidden_dim], "pooled shape mismatch: {:?}", mean.dims());
    Ok(mean)
}

/// Hidden state of the first (CLS) token.
pub fn cls_pool(hidden: &Tensor) -> Result<Tensor> {
    let (_batch, time, _hidden_dim) = hidden.dims3()?;
    ensure!(time > 0, "cannot pool an empty sequence");
    Ok(hidden.narrow(1, 0, 1)?.squeeze(1)?)
}

/// Divide each row of `[B,H]` by its L2 norm plus a small epsilon.
pub fn l2_normalize(t: &Tensor) -> Result<Tensor> {
    let eps_val = match t.dtype() { DType::F16 | DType::BF16 => 1e-6f64, _ => 1e-12f64 };
    let norm = t.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = (norm + eps_val)?;
    Ok(t.broadcast_div(&norm)?)
}

/// Slice variant of [`l2_normalize`]; a zero vector is left unchanged.
pub fn normalize_in_place(vec: &mut [f32]) {
    let sum: f32 = vec.iter().map(|v| v * v).sum();
    if sum <= 0.0 {
        return;
    }
    let inv = sum.sqrt().recip();
    for v in vec.iter_mut() {
        *v *= inv;
    }
}
