mod profile;

use log::{debug, warn};
use nucleus_berry::measure::{Measure3d, SurfaceEstimator};
use utils::phantoms::{Phantom, INSIDE};

pub use profile::Profile;

/// 以 `estimator` 测量全部样本, 统计其表面积误差与耗时.
///
/// 掩膜在计时之外生成; 计时只覆盖描述计算.
pub fn measure_all(estimator: SurfaceEstimator, phantoms: &[Phantom]) -> Profile {
    let mut profile = Profile::new();
    for p in phantoms {
        let mask = p.raw.binarize(u32::from(INSIDE));
        let measure = Measure3d::new(&p.raw, &mask);
        profile.measure_start();
        let descriptor = measure.descriptor_with(estimator);
        match descriptor {
            Ok(d) => {
                profile.measure_elapsed();
                debug!(
                    "{}: {} surface = {:.3} (exact {:.3})",
                    estimator.name(),
                    p.raw.name(),
                    d.surface_area,
                    p.surface
                );
                profile.count_measured(d.surface_area, p.surface, d.sphericity);
            }
            Err(e) => {
                warn!("{}: {} failed: {e}", estimator.name(), p.raw.name());
                profile.count_failed();
            }
        }
    }
    profile.finish()
}
