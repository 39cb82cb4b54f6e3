use crate::error::{PinnError, Result};
use crate::training::TrainingConfig;
use burn::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) solving dy/dx = -y with Burn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（train / infer / optimize）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、結果をファイルに保存します
    Train {
        #[command(flatten)]
        training: TrainingArgs,
        /// モデル・設定・損失グラフの保存先
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// 保存されたPINNモデルを使い、推論を実行します
    Infer {
        /// `train` の保存先
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// 評価点（省略時は保存された設定の評価点）
        #[arg(long, num_args = 1.., allow_negative_numbers = true)]
        points: Vec<f32>,
    },
    /// 別スレッドで学習から評価までを実行し、結果をJSONで出力します
    Optimize {
        #[command(flatten)]
        training: TrainingArgs,
        /// この秒数を過ぎたら結果を待たずに失敗します
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// 学習設定の指定。ファイルの値をフラグで上書きします。
#[derive(Args, Debug, Clone, Default)]
pub struct TrainingArgs {
    /// 学習設定のJSONファイル
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub iterations: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainingArgs {
    pub fn resolve(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)
                .map_err(|e| PinnError::ConfigFile(format!("{}: {e:?}", path.display())))?,
            None => TrainingConfig::new(),
        };
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}
