//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 常微分方程式 dy/dx + y = 0, y(0) = 1 を領域 [0, 2] で解くための主要なコンポーネントを提供します。
//! 解析解は y = e^{-x} です。
//!
//! ラベル付きデータは使わず、方程式の残差と境界条件だけから学習します。

pub mod cli;
pub mod error;
pub mod inference;
pub mod model;
pub mod optimize;
pub mod pinn;
pub mod sampler;
pub mod training;
pub mod worker;

use burn::backend::{Autodiff, NdArray};

pub use error::{PinnError, Result};
pub use inference::EvaluationPoint;
pub use optimize::{EvaluationRecord, optimize, optimize_on};
pub use training::TrainingConfig;

/// 学習に使うバックエンド
pub type TrainBackend = Autodiff<NdArray<f32>>;
/// 推論に使うバックエンド
pub type InferenceBackend = NdArray<f32>;

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "pinn_model.mpk";
/// 学習設定を保存するファイル名
pub const CONFIG_FILENAME: &str = "pinn_config.json";
/// 損失グラフのファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
