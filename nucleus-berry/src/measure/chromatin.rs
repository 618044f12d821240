//! 异染色质 (染色中心) 比例.

use ndarray::Zip;

use super::{MeasureError, MeasureResult};
use crate::consts::gray::is_marked;
use crate::data::assert_same_shape;
use crate::labeling::{label_components, Connectivity};
use crate::{NucleusMask, RawStack, StackAttr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 细胞核内染色中心的统计结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Heterochromatin {
    /// 染色中心个数 (26-连通域).
    pub count: usize,
    /// 每个染色中心的物理体积, 按扫描顺序.
    pub volumes: Vec<f64>,
    /// 染色中心总体积 / 细胞核体积.
    pub rhf_volume: f64,
    /// 染色中心内原图强度和 / 细胞核内原图强度和.
    pub rhf_intensity: f64,
}

/// 统计 `nucleus` 中标签为 `label` 的细胞核内的染色中心.
///
/// `chromocenters` 中任意非背景体素视为染色中心, 细胞核外的部分被忽略.
pub(super) fn heterochromatin(
    raw: &RawStack,
    nucleus: &NucleusMask,
    label: u8,
    chromocenters: &NucleusMask,
) -> MeasureResult<Heterochromatin> {
    assert_same_shape(nucleus, chromocenters);
    let (_, h, w) = nucleus.shape();
    let slice = h * w;
    let nucleus_data = nucleus.data();
    let cc_data = chromocenters.data();
    let at = |i: usize| (i / slice, (i % slice) / w, i % w);

    let nucleus_voxels = nucleus.count(label);
    if nucleus_voxels == 0 {
        return Err(MeasureError::EmptyObject(label));
    }

    let labeling = label_components(
        [nucleus.len_z(), h, w],
        |i| {
            let p = at(i);
            nucleus_data[p] == label && is_marked(cc_data[p])
        },
        Connectivity::Full,
    );

    let voxel = nucleus.voxel();
    let volumes: Vec<f64> = labeling
        .ids()
        .into_iter()
        .map(|id| labeling.size_of(id) as f64 * voxel)
        .collect();
    let cc_voxels: usize = labeling.ids().into_iter().map(|id| labeling.size_of(id)).sum();

    let (mut in_nucleus, mut in_cc) = (0.0f64, 0.0f64);
    Zip::from(raw.data())
        .and(nucleus_data)
        .and(cc_data)
        .for_each(|&r, &n, &c| {
            if n == label {
                in_nucleus += r as f64;
                if is_marked(c) {
                    in_cc += r as f64;
                }
            }
        });

    Ok(Heterochromatin {
        count: labeling.len(),
        volumes,
        rhf_volume: cc_voxels as f64 / nucleus_voxels as f64,
        rhf_intensity: if in_nucleus > 0.0 {
            in_cc / in_nucleus
        } else {
            0.0
        },
    })
}
