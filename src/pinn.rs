use crate::error::{PinnError, Result};
use crate::model::Model;
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 既知の境界値 y(x) = y_b。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCondition {
    pub x: f32,
    pub y: f32,
}

impl Default for BoundaryCondition {
    /// y(0) = 1
    fn default() -> Self {
        Self { x: 0.0, y: 1.0 }
    }
}

/// 物理損失を計算します。
///
/// 常微分方程式 dy/dx + y = 0 の残差を各コロケーション点で求め、
/// その二乗平均誤差を損失として返します。結果はパラメータに関して微分可能です。
pub fn residual_loss<B: Backend>(model: &Model<B>, points: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
    if points.dims()[0] == 0 {
        return Err(PinnError::EmptyBatch);
    }
    let (y, dy_dx) = model.forward_with_derivative(points);
    let residual = dy_dx + y;
    let target = Tensor::zeros_like(&residual);
    Ok(MseLoss::new().forward(residual, target, Reduction::Mean))
}

/// 境界損失を計算します。
///
/// パラメータは毎ステップ変わるため、固定された一点でも毎回評価し直します。
pub fn boundary_loss<B: Backend>(
    model: &Model<B>,
    condition: &BoundaryCondition,
    device: &B::Device,
) -> Tensor<B, 1> {
    let x = Tensor::<B, 2>::from_floats([[condition.x]], device);
    let target = Tensor::<B, 2>::from_floats([[condition.y]], device);
    MseLoss::new().forward(model.forward(x), target, Reduction::Mean)
}

/// 逆伝播で dy/dx を求めます（出力の総和、すなわち単位ベクトルを種にします）。
///
/// 得られる勾配は内部バックエンドのテンソルで、計算グラフから切り離されています。
/// 損失には `Model::forward_with_derivative` を使い、こちらはテストでの照合にだけ使います。
#[cfg(test)]
pub(crate) fn input_gradient<B: burn::tensor::backend::AutodiffBackend>(
    model: &Model<B>,
    points: Tensor<B, 2>,
) -> Result<Tensor<B::InnerBackend, 2>> {
    let points = points.require_grad();
    let y = model.forward(points.clone());
    let grads = y.sum().backward();
    points
        .grad(&grads)
        .ok_or_else(|| PinnError::Data("入力に勾配が記録されていません".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApproximatorConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{ElementConversion, TensorData};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn model(seed: u64) -> Model<TestBackend> {
        ApproximatorConfig::new().init(&mut StdRng::seed_from_u64(seed), &Default::default())
    }

    fn column(values: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len(), 1]), &Default::default())
    }

    #[test]
    fn single_point_residual_is_finite_and_non_negative() {
        let loss = residual_loss(&model(0), column(&[1.3])).unwrap();
        let value: f32 = loss.into_scalar().elem();
        assert!(value.is_finite());
        assert!(value >= 0.0);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let points = Tensor::<TestBackend, 2>::zeros([0, 1], &Default::default());
        assert!(matches!(residual_loss(&model(0), points), Err(PinnError::EmptyBatch)));
    }

    #[test]
    fn propagated_derivative_agrees_with_reverse_mode() {
        let model = model(7);
        let xs = [0.0_f32, 0.4, 1.1, 2.0];
        let reverse = input_gradient(&model, column(&xs)).unwrap();
        let (_, forward) = model.forward_with_derivative(column(&xs));
        let reverse = reverse.into_data().to_vec::<f32>().unwrap();
        let forward = forward.into_data().to_vec::<f32>().unwrap();
        for (r, f) in reverse.iter().zip(&forward) {
            assert!((r - f).abs() < 1e-5, "reverse={r} forward={f}");
        }
    }

    #[test]
    fn boundary_loss_matches_squared_error() {
        let model = model(5);
        let device = Default::default();
        let condition = BoundaryCondition::default();
        let y0: f32 = model
            .forward(Tensor::from_floats([[0.0]], &device))
            .into_scalar()
            .elem();
        let loss: f32 = boundary_loss(&model, &condition, &device).into_scalar().elem();
        assert!((loss - (y0 - 1.0).powi(2)).abs() < 1e-6);
    }
}
