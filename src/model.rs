use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{Linear, Tanh};
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::Rng;

use crate::error::{self, PinnError};

/// 入力の次元（スカラー x）。
pub const INPUT_DIM: usize = 1;
/// 出力の次元（スカラー y）。
pub const OUTPUT_DIM: usize = 1;

/// ネットワークの構成。
///
/// 入力と出力は常にスカラーで、隠れ層の幅だけを宣言的に指定します。
/// 活性化関数は tanh に固定です。
#[derive(Config, Debug)]
pub struct ApproximatorConfig {
    /// 隠れ層ごとの幅
    #[config(default = "vec![20, 20]")]
    pub hidden_widths: Vec<usize>,
}

impl ApproximatorConfig {
    /// 隠れ層が一つもない、または幅 0 の層を含む構成を拒否します。
    pub fn validate(&self) -> error::Result<()> {
        if self.hidden_widths.is_empty() {
            return Err(PinnError::invalid_config("隠れ層が一つもありません"));
        }
        if self.hidden_widths.contains(&0) {
            return Err(PinnError::invalid_config("幅 0 の隠れ層があります"));
        }
        Ok(())
    }

    /// 新しいモデルを初期化します。
    ///
    /// 重みとバイアスは `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` から `rng` で引きます。
    /// バックエンドの共有乱数を使わないため、同じシードなら同じ初期値になります。
    pub fn init<B: Backend, R: Rng>(&self, rng: &mut R, device: &B::Device) -> Model<B> {
        let mut hidden = Vec::with_capacity(self.hidden_widths.len());
        let mut fan_in = INPUT_DIM;
        for &width in &self.hidden_widths {
            hidden.push(init_linear(fan_in, width, rng, device));
            fan_in = width;
        }
        Model {
            hidden,
            output: init_linear(fan_in, OUTPUT_DIM, rng, device),
            activation: Tanh::new(),
        }
    }
}

fn init_linear<B: Backend, R: Rng>(
    d_input: usize,
    d_output: usize,
    rng: &mut R,
    device: &B::Device,
) -> Linear<B> {
    let bound = 1.0 / (d_input as f32).sqrt();
    let mut uniform = |n: usize| -> Vec<f32> {
        (0..n).map(|_| rng.random_range(-bound..=bound)).collect()
    };
    let weight = TensorData::new(uniform(d_input * d_output), [d_input, d_output]);
    let bias = TensorData::new(uniform(d_output), [d_output]);
    Linear {
        weight: Param::from_tensor(Tensor::from_data(weight, device)),
        bias: Some(Param::from_tensor(Tensor::from_data(bias, device))),
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 点 x を入力とし、その点における解 y(x) を予測する多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> Model<B> {
    /// モデルの順伝播を実行します。入力・出力の形状は `[n, 1]` です。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for linear in &self.hidden {
            x = self.activation.forward(linear.forward(x));
        }
        self.output.forward(x)
    }

    /// 出力 y と、その入力に関する導関数 dy/dx を同時に計算します。
    ///
    /// 単位接ベクトルを各層に通して微分を前進的に伝播します。
    /// どちらの結果も通常のテンソル演算だけで構成されるため、Autodiff バックエンドでは
    /// パラメータに関してさらに微分できます（残差損失が必要とする二階微分）。
    pub fn forward_with_derivative(&self, input: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let mut dx = Tensor::ones_like(&input);
        let mut x = input;
        for linear in &self.hidden {
            dx = dx.matmul(linear.weight.val());
            x = self.activation.forward(linear.forward(x));
            // d tanh(z) = (1 - tanh(z)^2) dz
            let slope = x.clone().mul(x.clone()).neg().add_scalar(1.0);
            dx = dx.mul(slope);
        }
        let dy_dx = dx.matmul(self.output.weight.val());
        (self.output.forward(x), dy_dx)
    }

    /// 隠れ層の幅。
    pub fn hidden_widths(&self) -> Vec<usize> {
        self.hidden
            .iter()
            .map(|linear| linear.weight.val().dims()[1])
            .collect()
    }
}
