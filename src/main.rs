//! # 物理情報ニューラルネットワーク (PINN) プログラム
//!
//! `burn` フレームワークを使用して、常微分方程式 dy/dx = -y, y(0) = 1 を解きます。
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）、`infer`（推論）、
//! `optimize`（学習と評価をまとめて実行）の機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --iterations 1000 --out-dir artifacts
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer --out-dir artifacts --points 0.5 1.0 1.5
//! ```
//!
//! ### 最適化
//! ```bash
//! cargo run --release -- optimize --seed 42 --timeout-secs 120
//! ```
//!
//! ログの詳細度は `RUST_LOG` で変更できます。

use clap::Parser;
use ode_pinn::cli::{Cli, Commands};
use ode_pinn::worker::OptimizationJob;
use ode_pinn::{inference, training};
use std::time::Duration;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、各サブコマンドの処理に振り分けます。
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> ode_pinn::Result<()> {
    match cli.command {
        Commands::Train {
            training: args,
            out_dir,
        } => training::run(&args.resolve()?, &out_dir),
        Commands::Infer { out_dir, points } => inference::run(&out_dir, &points),
        Commands::Optimize {
            training: args,
            timeout_secs,
        } => {
            let job = OptimizationJob::spawn(args.resolve()?)?;
            let record = match timeout_secs {
                Some(secs) => job.wait_timeout(Duration::from_secs(secs))?,
                None => job.wait()?,
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}
