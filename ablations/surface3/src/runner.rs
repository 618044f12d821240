//! 程序运行函数.

use crate::result::AblationResult;
use log::info;
use nucleus_berry::measure::SurfaceEstimator;
use std::thread;
use utils::phantoms;

/// 实际运行. 每种估计方法一个线程.
pub fn run() -> AblationResult {
    let phantoms = phantoms::phantoms_from_env();
    assert!(!phantoms.is_empty(), "No phantom fits into the grid");
    let p = phantoms.as_slice();

    info!(
        "Running surface ablation on {} phantoms ({} cpus)...",
        p.len(),
        utils::cpus()
    );
    thread::scope(|s| {
        use super::estimators::measure_all;

        let handles = SurfaceEstimator::ALL.map(|e| s.spawn(move || measure_all(e, p)));

        AblationResult::from_iter(
            SurfaceEstimator::ALL.map(SurfaceEstimator::name).into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
