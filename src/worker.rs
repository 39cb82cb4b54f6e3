use crate::error::{PinnError, Result};
use crate::optimize::{EvaluationRecord, optimize};
use crate::training::TrainingConfig;
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 専用スレッドで実行中の最適化。
///
/// 学習は重い同期処理なので、非同期の呼び出し側はスレッドをブロックせずにここへ処理を渡し、
/// 結果をチャネル経由で受け取ります。学習ループには中断点がないため、
/// タイムアウトしてもスレッドは自然に終わるまで走り続けます。
pub struct OptimizationJob {
    receiver: Receiver<Result<EvaluationRecord>>,
    handle: JoinHandle<()>,
}

impl OptimizationJob {
    /// 新しいスレッドで最適化を開始します。
    pub fn spawn(config: TrainingConfig) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("pinn-optimizer".to_string())
            .spawn(move || {
                let result = optimize(&config);
                if sender.send(result).is_err() {
                    debug!("最適化の結果を受け取る相手がいません");
                }
            })?;
        Ok(Self { receiver, handle })
    }

    /// 結果が出るまで待ちます。
    pub fn wait(self) -> Result<EvaluationRecord> {
        let result = self.receiver.recv().map_err(|_| PinnError::WorkerLost)?;
        if self.handle.join().is_err() {
            warn!("最適化スレッドが異常終了しました");
        }
        result
    }

    /// 最大 `timeout` だけ待ちます。
    pub fn wait_timeout(self, timeout: Duration) -> Result<EvaluationRecord> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("{:?} 以内に最適化が完了しませんでした", timeout);
                Err(PinnError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(PinnError::WorkerLost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_comes_back_from_the_worker() {
        let config = TrainingConfig::new().with_iterations(5).with_seed(Some(2));
        let record = OptimizationJob::spawn(config).unwrap().wait().unwrap();
        assert_eq!(record.evaluation_points.len(), 3);
    }

    #[test]
    fn errors_are_delivered_unchanged() {
        let config = TrainingConfig::new().with_batch_size(0);
        let err = OptimizationJob::spawn(config).unwrap().wait().unwrap_err();
        assert!(matches!(err, PinnError::InvalidConfig(_)));
    }

    #[test]
    fn waiting_too_short_times_out() {
        let config = TrainingConfig::new().with_iterations(2_000).with_seed(Some(3));
        let job = OptimizationJob::spawn(config).unwrap();
        let err = job.wait_timeout(Duration::ZERO).unwrap_err();
        assert!(matches!(err, PinnError::Timeout(_)));
    }
}
