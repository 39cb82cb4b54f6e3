use crate::TrainBackend;
use crate::error::Result;
use crate::inference::{EvaluationPoint, evaluate};
use crate::training::{TrainingConfig, train};
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use log::info;
use serde::{Deserialize, Serialize};

pub const STATUS_MESSAGE: &str = "PINN optimization complete.";
pub const NOTE: &str = "This is a simplified example. The output represents the solution to dy/dx = -y with y(0)=1.";

/// 最適化の結果として外部に渡す唯一の成果物。
///
/// JSON では `{"message", "note", "evaluation_points": [{"x", "predicted_y"}]}` の形になります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(rename = "message")]
    pub status_message: String,
    pub note: String,
    pub evaluation_points: Vec<EvaluationPoint>,
}

/// CPU バックエンドで学習し、評価点での予測値を返します。
///
/// 同期的にブロックします。イベントループなどから呼ぶ場合は `worker::OptimizationJob` を使ってください。
pub fn optimize(config: &TrainingConfig) -> Result<EvaluationRecord> {
    optimize_on::<TrainBackend>(config, &Default::default())
}

/// 任意の Autodiff バックエンドで `optimize` を実行します。
pub fn optimize_on<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<EvaluationRecord> {
    info!("PINN による最適化を開始します...");
    let outcome = train::<B>(config, device)?;
    info!(
        "PINN の学習が完了しました。最終的な総損失: {:.6}",
        outcome.final_loss.total
    );

    let model = outcome.model.valid();
    let evaluation_points = evaluate(&model, &config.query_points, device)?;

    Ok(EvaluationRecord {
        status_message: STATUS_MESSAGE.to_string(),
        note: NOTE.to_string(),
        evaluation_points,
    })
}
