use crate::error::{self, PinnError};
use crate::model::{ApproximatorConfig, Model};
use crate::pinn::{BoundaryCondition, boundary_loss, residual_loss};
use crate::sampler::{CollocationSampler, Domain};
use crate::{CONFIG_FILENAME, LOSS_GRAPH_FILENAME, MODEL_FILENAME, TrainBackend};
use burn::config::Config;
use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use log::{debug, info, warn};
use plotters::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// 1回の呼び出しで許す反復回数の上限。
pub const MAX_ITERATIONS: usize = 100_000;

/// 学習の設定。
#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = "ApproximatorConfig::new()")]
    pub model: ApproximatorConfig,
    #[config(default = "AdamConfig::new().with_epsilon(1e-8)")]
    pub optimizer: AdamConfig,
    #[config(default = 500)]
    pub iterations: usize,
    #[config(default = 100)]
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 0.0)]
    pub domain_start: f32,
    #[config(default = 2.0)]
    pub domain_end: f32,
    #[config(default = 0.0)]
    pub boundary_x: f32,
    #[config(default = 1.0)]
    pub boundary_y: f32,
    #[config(default = "vec![0.5, 1.0, 1.5]")]
    pub query_points: Vec<f32>,
    /// 進捗を記録する間隔。0 なら途中経過を記録しません。
    #[config(default = 100)]
    pub log_every: usize,
    /// `None` の場合は OS の乱数で初期化します。
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// 計算を始める前に設定を検査します。
    pub fn validate(&self) -> error::Result<()> {
        self.model.validate()?;
        if self.iterations == 0 {
            return Err(PinnError::invalid_config("反復回数は 1 以上が必要です"));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(PinnError::invalid_config(format!(
                "反復回数 {} は上限 {} を超えています",
                self.iterations, MAX_ITERATIONS
            )));
        }
        if self.batch_size == 0 {
            return Err(PinnError::invalid_config("バッチサイズは 1 以上が必要です"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(PinnError::invalid_config(format!(
                "学習率が不正です: {}",
                self.learning_rate
            )));
        }
        self.domain()?;
        if !self.boundary_x.is_finite() || !self.boundary_y.is_finite() {
            return Err(PinnError::invalid_config("境界条件が有限ではありません"));
        }
        if self.query_points.is_empty() {
            return Err(PinnError::invalid_config("評価点がありません"));
        }
        if self.query_points.iter().any(|x| !x.is_finite()) {
            return Err(PinnError::invalid_config("有限でない評価点があります"));
        }
        Ok(())
    }

    pub fn domain(&self) -> error::Result<Domain> {
        Domain::new(self.domain_start, self.domain_end)
    }

    pub fn boundary(&self) -> BoundaryCondition {
        BoundaryCondition {
            x: self.boundary_x,
            y: self.boundary_y,
        }
    }
}

/// ある反復での損失の値。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossRecord {
    pub iteration: usize,
    pub residual: f32,
    pub boundary: f32,
    pub total: f32,
}

/// 学習の結果。
pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: Model<B>,
    /// `log_every` ごとの損失と、最後の反復の損失
    pub history: Vec<LossRecord>,
    pub final_loss: LossRecord,
    pub elapsed: Duration,
}

fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f32 {
    loss.into_scalar().elem()
}

/// 固定回数だけ学習を行います。
///
/// 早期終了はありません。総損失が有限でなくなった時点で、最適化ステップの前に
/// `PinnError::Diverged` を返します。モデル・オプティマイザ・乱数はすべてこの呼び出しが所有します。
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> error::Result<TrainingOutcome<B>> {
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut model: Model<B> = config.model.init(&mut rng, device);
    let mut sampler = CollocationSampler::new(config.domain()?, config.batch_size, rng)?;
    let boundary = config.boundary();
    let mut optim = config.optimizer.init::<B, Model<B>>();

    debug!(
        "parameters: {}, batch size: {}, learning rate: {}",
        model.num_params(),
        sampler.batch_size(),
        config.learning_rate
    );
    info!(
        "学習を開始します (dy/dx + y = 0, y({}) = {}) - 反復回数: {}",
        boundary.x, boundary.y, config.iterations
    );

    let mut history = Vec::new();
    let mut last = None;
    let training_start = Instant::now();

    for iteration in 1..=config.iterations {
        let points = sampler.sample::<B>(device);
        let loss_residual = residual_loss(&model, points)?;
        let loss_boundary = boundary_loss(&model, &boundary, device);
        let total_loss = loss_residual.clone() + loss_boundary.clone();

        let record = LossRecord {
            iteration,
            residual: scalar(loss_residual),
            boundary: scalar(loss_boundary),
            total: scalar(total_loss.clone()),
        };
        if !record.total.is_finite() {
            warn!("[Iteration {}] 総損失が有限ではありません: {}", iteration, record.total);
            return Err(PinnError::Diverged {
                iteration,
                loss: record.total,
            });
        }

        let checkpoint = config.log_every > 0 && iteration % config.log_every == 0;
        if checkpoint {
            info!(
                "[Iteration {}] Total Loss: {:.6}, Residual Loss: {:.6}, Boundary Loss: {:.6}",
                iteration, record.total, record.residual, record.boundary
            );
        }
        if checkpoint || iteration == config.iterations {
            history.push(record);
        }
        last = Some(record);

        // backward() は毎回新しい勾配を返し、step で消費されるため累積はありません
        let grads = total_loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(config.learning_rate, model, grads);
    }

    let elapsed = training_start.elapsed();
    let final_loss =
        last.ok_or_else(|| PinnError::invalid_config("反復回数は 1 以上が必要です"))?;
    info!("学習が完了しました。=> 学習時間: {:.2?}", elapsed);

    Ok(TrainingOutcome {
        model,
        history,
        final_loss,
        elapsed,
    })
}

/// `train`サブコマンドを実行します。
///
/// 学習後、損失グラフ・設定・モデルを `out_dir` に保存します。
pub fn run(config: &TrainingConfig, out_dir: &Path) -> error::Result<()> {
    let device = Default::default();
    info!("バックエンド: NdArray (CPU)");
    let outcome = train::<TrainBackend>(config, &device)?;

    fs::create_dir_all(out_dir)?;

    let graph_path = out_dir.join(LOSS_GRAPH_FILENAME);
    plot_loss_history(&outcome.history, &graph_path).map_err(|e| PinnError::Plot(e.to_string()))?;
    info!("=> 損失グラフを '{}' に保存しました。", graph_path.display());

    let config_path = out_dir.join(CONFIG_FILENAME);
    config.save(&config_path)?;

    let model_path = out_dir.join(MODEL_FILENAME);
    outcome.model.save_file(
        model_path.clone(),
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    )?;
    info!(
        "=> モデルを '{}' に、設定を '{}' に保存しました。",
        model_path.display(),
        config_path.display()
    );

    println!("{}", serde_json::to_string_pretty(&outcome.final_loss)?);
    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(
    history: &[LossRecord],
    path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if history.is_empty() {
        return Err("損失の履歴が空です".into());
    }
    let log10 = |v: f32| v.max(f32::MIN_POSITIVE).log10();
    let (min_log_loss, max_log_loss) = history
        .iter()
        .flat_map(|r| [r.total, r.residual, r.boundary])
        .map(log10)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let last_iteration = history.last().map_or(1, |r| r.iteration);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..last_iteration + 1, min_log_loss - 0.5..max_log_loss + 0.5)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Iteration")
        .draw()?;

    let series: [(&str, &RGBColor, fn(&LossRecord) -> f32); 3] = [
        ("Total Loss", &RED, |r| r.total),
        ("Residual Loss", &BLUE, |r| r.residual),
        ("Boundary Loss", &GREEN, |r| r.boundary),
    ];
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                history.iter().map(|r| (r.iteration, log10(value(r)))),
                color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(iterations: usize) -> TrainingConfig {
        TrainingConfig::new()
            .with_iterations(iterations)
            .with_seed(Some(17))
    }

    #[test]
    fn defaults_follow_the_reference_problem() {
        let config = TrainingConfig::new();
        assert_eq!(config.iterations, 500);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.domain().unwrap(), Domain::new(0.0, 2.0).unwrap());
        assert_eq!(config.boundary(), BoundaryCondition { x: 0.0, y: 1.0 });
        assert_eq!(config.query_points, vec![0.5, 1.0, 1.5]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_iterations_is_a_configuration_error() {
        let err = train::<TrainBackend>(&seeded(0), &Default::default()).err();
        assert!(matches!(err, Some(PinnError::InvalidConfig(_))));
    }

    #[test]
    fn absurd_settings_fail_fast() {
        assert!(seeded(MAX_ITERATIONS + 1).validate().is_err());
        assert!(seeded(10).with_batch_size(0).validate().is_err());
        assert!(seeded(10).with_learning_rate(0.0).validate().is_err());
        assert!(seeded(10).with_learning_rate(f64::NAN).validate().is_err());
        assert!(seeded(10).with_domain_end(-1.0).validate().is_err());
        assert!(seeded(10).with_query_points(vec![]).validate().is_err());
        assert!(seeded(10).with_query_points(vec![f32::NAN]).validate().is_err());
    }

    #[test]
    fn history_holds_checkpoints_and_the_last_iteration() {
        let config = seeded(25).with_log_every(10);
        let outcome = train::<TrainBackend>(&config, &Default::default()).unwrap();
        let iterations: Vec<usize> = outcome.history.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![10, 20, 25]);
        assert_eq!(outcome.final_loss.iteration, 25);
        let last = outcome.final_loss;
        assert!((last.total - (last.residual + last.boundary)).abs() < 1e-5);
    }

    #[test]
    fn diverging_run_is_reported() {
        let config = seeded(20).with_learning_rate(1e30);
        let err = train::<TrainBackend>(&config, &Default::default()).err();
        assert!(matches!(err, Some(PinnError::Diverged { .. })), "{err:?}");
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = std::env::temp_dir().join(format!("ode-pinn-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILENAME);
        let config = seeded(42).with_batch_size(7);
        config.save(&path).unwrap();
        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.iterations, 42);
        assert_eq!(loaded.batch_size, 7);
        assert_eq!(loaded.seed, Some(17));
        fs::remove_dir_all(&dir).unwrap();
    }
}
