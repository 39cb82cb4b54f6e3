use std::path::PathBuf;
use std::time::Duration;

use burn::record::RecorderError;
use thiserror::Error;

/// このクレートの処理で発生しうるエラー。
///
/// 再試行は一切行いません。発散した学習をやり直すかどうかは呼び出し側が判断します。
#[derive(Debug, Error)]
pub enum PinnError {
    /// 計算を始める前に検出される設定の誤り。
    #[error("設定が不正です: {0}")]
    InvalidConfig(String),

    /// 残差損失に空のバッチが渡されました。
    #[error("コロケーション点のバッチが空です")]
    EmptyBatch,

    /// 学習中に総損失が有限でなくなりました。
    #[error("学習が発散しました (iteration {iteration}, total loss {loss})")]
    Diverged { iteration: usize, loss: f32 },

    /// 評価点で有限な予測値が得られませんでした。
    #[error("評価点 x = {x} で有限な予測値が得られません: {value}")]
    NonFiniteEvaluation { x: f32, value: f32 },

    /// テンソルデータの変換に失敗しました。
    #[error("テンソルデータの変換に失敗しました: {0}")]
    Data(String),

    #[error("モデルの保存・読み込みに失敗しました: {0}")]
    Recorder(#[from] RecorderError),

    /// 学習済みのモデルファイルがありません。
    #[error("モデルファイル '{}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。", .0.display())]
    MissingModel(PathBuf),

    #[error("設定ファイルを扱えません: {0}")]
    ConfigFile(String),

    #[error("グラフの描画に失敗しました: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// ワーカーが制限時間内に結果を返しませんでした。
    #[error("{0:?} 以内に最適化が完了しませんでした")]
    Timeout(Duration),

    /// ワーカースレッドが結果を返さずに終了しました。
    #[error("最適化ワーカーが結果を返さずに終了しました")]
    WorkerLost,
}

pub type Result<T> = std::result::Result<T, PinnError>;

impl PinnError {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
