use crate::error::{PinnError, Result};
use crate::model::Model;
use crate::training::TrainingConfig;
use crate::{CONFIG_FILENAME, InferenceBackend, MODEL_FILENAME};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::{Tensor, TensorData};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// 評価点 x とその予測値。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPoint {
    pub x: f32,
    pub predicted_y: f32,
}

/// 学習済みモデルを評価点で評価します。
///
/// 勾配を追跡しないよう、学習済みモデルは `valid()` で内部バックエンドに移してから渡します。
/// 一点でも有限でない予測値があれば、評価全体を失敗とします。
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    points: &[f32],
    device: &B::Device,
) -> Result<Vec<EvaluationPoint>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }
    let input = Tensor::<B, 2>::from_data(TensorData::new(points.to_vec(), [points.len(), 1]), device);
    let predictions = model
        .forward(input)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PinnError::Data(format!("{e:?}")))?;

    points
        .iter()
        .zip(predictions)
        .map(|(&x, predicted_y)| {
            if predicted_y.is_finite() {
                Ok(EvaluationPoint { x, predicted_y })
            } else {
                Err(PinnError::NonFiniteEvaluation {
                    x,
                    value: predicted_y,
                })
            }
        })
        .collect()
}

/// `infer`サブコマンドを実行します。
///
/// `points` が空なら、保存された設定の評価点を使います。
pub fn run(out_dir: &Path, points: &[f32]) -> Result<()> {
    let device: <InferenceBackend as Backend>::Device = Default::default();

    let model_path = out_dir.join(MODEL_FILENAME);
    if !model_path.exists() {
        return Err(PinnError::MissingModel(model_path));
    }
    let config_path = out_dir.join(CONFIG_FILENAME);
    let config = TrainingConfig::load(&config_path)
        .map_err(|e| PinnError::ConfigFile(format!("{}: {e:?}", config_path.display())))?;

    info!("推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    info!("保存済みモデルを '{}' からロード中...", model_path.display());
    // 形を揃えるためだけの初期値で、ロードで上書きされます
    let model: Model<InferenceBackend> = config
        .model
        .init(&mut StdRng::seed_from_u64(0), &device)
        .load_file(
            model_path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            &device,
        )?;

    let points = if points.is_empty() {
        config.query_points.as_slice()
    } else {
        points
    };
    let evaluation_points = evaluate(&model, points, &device)?;
    info!(
        "推論が完了しました。評価点数: {} => 推論時間: {:.2?}",
        evaluation_points.len(),
        inference_start.elapsed()
    );

    println!("{}", serde_json::to_string_pretty(&evaluation_points)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApproximatorConfig;

    #[test]
    fn evaluation_keeps_point_order() {
        let device = Default::default();
        let model: Model<InferenceBackend> =
            ApproximatorConfig::new().init(&mut StdRng::seed_from_u64(4), &device);
        let points = [1.5, 0.5, 1.0];
        let evaluated = evaluate(&model, &points, &device).unwrap();
        let xs: Vec<f32> = evaluated.iter().map(|p| p.x).collect();
        assert_eq!(xs, points);
        assert!(evaluated.iter().all(|p| p.predicted_y.is_finite()));
    }

    #[test]
    fn evaluation_matches_forward_pass() {
        let device = Default::default();
        let model: Model<InferenceBackend> =
            ApproximatorConfig::new().init(&mut StdRng::seed_from_u64(8), &device);
        let evaluated = evaluate(&model, &[0.75], &device).unwrap();
        let expected = model
            .forward(Tensor::from_floats([[0.75]], &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(evaluated[0].predicted_y, expected[0]);
    }

    #[test]
    fn non_finite_prediction_fails_the_whole_evaluation() {
        let device = Default::default();
        let model: Model<InferenceBackend> =
            ApproximatorConfig::new().init(&mut StdRng::seed_from_u64(4), &device);
        let err = evaluate(&model, &[0.5, f32::NAN], &device).unwrap_err();
        assert!(matches!(err, PinnError::NonFiniteEvaluation { .. }));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let dir = std::env::temp_dir().join(format!("ode-pinn-missing-{}", std::process::id()));
        let err = run(&dir, &[]).unwrap_err();
        assert!(matches!(err, PinnError::MissingModel(_)));
    }
}
