use candle_core::{DType, Device, Tensor};
use hfembed_core::types::{Pooling, PoolingOptions};
use hfembed_embed::pool::pool;
use hfembed_embed::{cls_pool, l2_normalize, mean_pool, normalize_in_place};

fn hidden(dev: &Device) -> Tensor {
    // Two tokens with hidden dim 4.
    Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,  // token 0
                         5.0, 6.0, 7.0, 8.0],    // token 1
                       (1, 2, 4), dev).unwrap()
}

#[test]
fn mean_pool_then_normalize_ignores_masked_tokens() {
    let dev = Device::Cpu;
    let mask = Tensor::from_slice(&[1i64, 0i64], (1, 2), &dev).unwrap()
        .to_dtype(DType::F32).unwrap();
    let out = pool(&hidden(&dev), &mask, PoolingOptions::mean_normalized()).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let v = &v[0];
    // Mean over unmasked tokens = first token [1,2,3,4], then L2 normalize
    let norm: f32 = (1.0f32*1.0 + 2.0*2.0 + 3.0*3.0 + 4.0*4.0).sqrt();
    let expected = [1.0/norm, 2.0/norm, 3.0/norm, 4.0/norm];
    for (a,b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn mean_pool_averages_attended_tokens() {
    let dev = Device::Cpu;
    let mask = Tensor::from_slice(&[1u32, 1u32], (1, 2), &dev).unwrap();
    let out = mean_pool(&hidden(&dev), &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    assert_eq!(v[0], vec![3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn unnormalized_pooling_keeps_magnitude() {
    let dev = Device::Cpu;
    let mask = Tensor::from_slice(&[1u32, 1u32], (1, 2), &dev).unwrap();
    let options = PoolingOptions { pooling: Pooling::Mean, normalize: false };
    let v: Vec<Vec<f32>> = pool(&hidden(&dev), &mask, options).unwrap().to_vec2().unwrap();
    let norm: f32 = v[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!(norm > 1.5, "norm={norm}");
}

#[test]
fn cls_pool_takes_first_token() {
    let dev = Device::Cpu;
    let v: Vec<Vec<f32>> = cls_pool(&hidden(&dev)).unwrap().to_vec2().unwrap();
    assert_eq!(v[0], vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn l2_normalize_yields_unit_rows() {
    let dev = Device::Cpu;
    let t = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 5.0], (2, 2), &dev).unwrap();
    let v: Vec<Vec<f32>> = l2_normalize(&t).unwrap().to_vec2().unwrap();
    assert!((v[0][0] - 0.6).abs() < 1e-6 && (v[0][1] - 0.8).abs() < 1e-6);
    assert!((v[1][1] - 1.0).abs() < 1e-6);
}

#[test]
fn normalize_in_place_leaves_zero_vector() {
    let mut zero = vec![0.0f32; 4];
    normalize_in_place(&mut zero);
    assert_eq!(zero, vec![0.0; 4]);

    let mut v = vec![3.0f32, 4.0];
    normalize_in_place(&mut v);
    assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
}
