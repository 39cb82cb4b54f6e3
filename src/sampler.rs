use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::Rng;
use rand::rngs::StdRng;

use crate::error::{PinnError, Result};

/// 問題領域となる閉区間 [start, end]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    start: f32,
    end: f32,
}

impl Domain {
    pub fn new(start: f32, end: f32) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(PinnError::invalid_config(format!(
                "領域の端点が有限ではありません: [{start}, {end}]"
            )));
        }
        if start >= end {
            return Err(PinnError::invalid_config(format!(
                "領域が空です: [{start}, {end}]"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }
}

/// 毎ステップ新しいコロケーション点を引くサンプラー。
///
/// 乱数生成器は呼び出しごとに所有され、他の呼び出しと共有されません。
pub struct CollocationSampler {
    domain: Domain,
    batch_size: usize,
    rng: StdRng,
}

impl CollocationSampler {
    pub fn new(domain: Domain, batch_size: usize, rng: StdRng) -> Result<Self> {
        if batch_size == 0 {
            return Err(PinnError::invalid_config("バッチサイズは 1 以上が必要です"));
        }
        Ok(Self {
            domain,
            batch_size,
            rng,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 領域上の一様分布から独立に引いた `[batch_size, 1]` の点を返します。
    pub fn sample<B: Backend>(&mut self, device: &B::Device) -> Tensor<B, 2> {
        let Domain { start, end } = self.domain;
        let points: Vec<f32> = (0..self.batch_size)
            .map(|_| self.rng.random_range(start..=end))
            .collect();
        Tensor::<B, 2>::from_data(TensorData::new(points, [self.batch_size, 1]), device)
            .require_grad()
    }
}
