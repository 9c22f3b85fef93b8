//! 分割掩膜的空间度量.
//!
//! 所有函数都只读取掩膜, 二维掩膜按 `(高, 宽)`, 三维掩膜按 `(层, 高, 宽)` 解释.

use log::debug;
use ndarray::{ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, Dimension};

use crate::consts::DIAMETER_SAMPLE_LIMIT;
use crate::morph::for_each_lane;
use crate::ImageSpacing;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    } else {
        use itertools::Itertools;
    }
}

/// 分割的几何度量.
///
/// 对二维掩膜, `surface_area_mm2` 实为周长 (毫米), `sphericity` 实为圆度.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentationMetrics {
    /// 体积, 立方毫米.
    pub volume_mm3: f64,
    /// 表面积 (三维) 或周长 (二维).
    pub surface_area_mm2: f64,
    /// 最大径, 毫米.
    pub max_diameter_mm: f64,
    /// 球形度 (三维) 或圆度 (二维), 见 [`sphericity`].
    pub sphericity: f64,
    /// 紧致度, 见 [`compactness`].
    pub compactness: f64,
    /// 前景体素个数.
    pub voxel_count: usize,
}

impl SegmentationMetrics {
    /// 与分割体积相同的球体直径. 体积非正时返回 `0.0`.
    pub fn equivalent_sphere_diameter(&self) -> f64 {
        if self.volume_mm3 <= 0.0 {
            return 0.0;
        }
        2.0 * (3.0 * self.volume_mm3 / (4.0 * std::f64::consts::PI)).cbrt()
    }
}

/// 计算全部几何度量. 空掩膜的所有度量都为 0.
pub fn compute(mask: &ArrayViewD<'_, bool>, spacing: &ImageSpacing) -> SegmentationMetrics {
    let voxel_count = voxel_count(mask);
    if voxel_count == 0 {
        return SegmentationMetrics::default();
    }
    let volume_mm3 = voxel_count as f64 * spacing.voxel_volume();
    let surface_area_mm2 = surface_area(mask, spacing);
    let ndim = mask.ndim();
    SegmentationMetrics {
        volume_mm3,
        surface_area_mm2,
        max_diameter_mm: max_diameter(mask, spacing),
        sphericity: sphericity(ndim, volume_mm3, surface_area_mm2),
        compactness: compactness(ndim, volume_mm3, surface_area_mm2),
        voxel_count,
    }
}

/// 前景体素个数.
#[inline]
pub fn voxel_count(mask: &ArrayViewD<'_, bool>) -> usize {
    mask.iter().filter(|&&b| b).count()
}

/// 每个轴上前景体素索引的 `(最小值, 最大值)`. 空掩膜返回全 0.
pub fn bounding_box(mask: &ArrayViewD<'_, bool>) -> Vec<(usize, usize)> {
    let ndim = mask.ndim();
    let mut bbox: Option<Vec<(usize, usize)>> = None;
    for (idx, _) in mask.indexed_iter().filter(|(_, &b)| b) {
        let idx = idx.slice();
        match bbox.as_mut() {
            None => bbox = Some(idx.iter().map(|&i| (i, i)).collect()),
            Some(b) => b.iter_mut().zip(idx).for_each(|((lo, hi), &i)| {
                *lo = (*lo).min(i);
                *hi = (*hi).max(i);
            }),
        }
    }
    bbox.unwrap_or_else(|| vec![(0, 0); ndim])
}

/// 每个轴上前景体素索引的平均值. 空掩膜返回全 0.
pub fn centroid(mask: &ArrayViewD<'_, bool>) -> Vec<f64> {
    let mut sums = vec![0usize; mask.ndim()];
    let mut cnt = 0usize;
    for (idx, _) in mask.indexed_iter().filter(|(_, &b)| b) {
        sums.iter_mut().zip(idx.slice()).for_each(|(s, &i)| *s += i);
        cnt += 1;
    }
    if cnt == 0 {
        return vec![0.0; sums.len()];
    }
    sums.into_iter().map(|s| s as f64 / cnt as f64).collect()
}

/// 前景体素按 `(层, 高, 宽)` 排列的整数坐标, 行优先顺序. 二维掩膜的层坐标恒为 0.
fn foreground_coords(mask: &ArrayViewD<'_, bool>) -> Vec<[i64; 3]> {
    mask.indexed_iter()
        .filter(|(_, &b)| b)
        .map(|(idx, _)| match *idx.slice() {
            [z, y, x] => [z as i64, y as i64, x as i64],
            [y, x] => [0, y as i64, x as i64],
            _ => unreachable!("mask rank is validated on construction"),
        })
        .collect()
}

/// 两个坐标之间物理距离的平方.
#[inline]
fn squared_distance(a: &[i64; 3], b: &[i64; 3], spacing: &ImageSpacing) -> f64 {
    let dx = (a[2] - b[2]) as f64 * spacing.x();
    let dy = (a[1] - b[1]) as f64 * spacing.y();
    let dz = (a[0] - b[0]) as f64 * spacing.z();
    dx * dx + dy * dy + dz * dz
}

/// 任意两个前景体素之间的最大物理距离, 毫米.
///
/// 坐标个数 `n` 超过 [`DIAMETER_SAMPLE_LIMIT`] 时, 按行优先顺序每隔
/// `n / DIAMETER_SAMPLE_LIMIT` 个取一个, 因此大掩膜上的结果只是近似.
/// 少于 2 个前景体素时返回 `0.0`.
pub fn max_diameter(mask: &ArrayViewD<'_, bool>, spacing: &ImageSpacing) -> f64 {
    let mut coords = foreground_coords(mask);
    if coords.len() < 2 {
        return 0.0;
    }
    if coords.len() > DIAMETER_SAMPLE_LIMIT {
        let step = coords.len() / DIAMETER_SAMPLE_LIMIT;
        debug!("最大径: {} 个坐标, 每隔 {step} 个采样", coords.len());
        coords = coords.into_iter().step_by(step).collect();
    }
    max_pairwise_squared(&coords, spacing).sqrt()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        fn max_pairwise_squared(coords: &[[i64; 3]], spacing: &ImageSpacing) -> f64 {
            (0..coords.len())
                .into_par_iter()
                .map(|i| {
                    coords[i + 1..]
                        .iter()
                        .map(|c| squared_distance(&coords[i], c, spacing))
                        .fold(0.0, f64::max)
                })
                .reduce(|| 0.0, f64::max)
        }
    } else {
        fn max_pairwise_squared(coords: &[[i64; 3]], spacing: &ImageSpacing) -> f64 {
            coords
                .iter()
                .tuple_combinations()
                .map(|(a, b)| squared_distance(a, b, spacing))
                .fold(0.0, f64::max)
        }
    }
}

/// 标记单条轴向线上离散梯度非零的位置.
///
/// 内部点使用中心差分 `(b[i+1] - b[i-1]) / 2`, 两端使用单侧差分.
/// 长度为 1 的线梯度恒为 0.
fn mark_gradient_lane(mut out: ArrayViewMut1<'_, bool>, lane: ArrayView1<'_, bool>) {
    let n = lane.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(n - 1);
        if lane[lo] != lane[hi] {
            out[i] = true;
        }
    }
}

/// 离散梯度模长非零的体素. 任一轴上梯度分量非零即为表面体素.
pub fn surface_voxels(mask: &ArrayViewD<'_, bool>) -> ArrayD<bool> {
    let mut out = ArrayD::from_elem(mask.raw_dim(), false);
    for axis in 0..mask.ndim() {
        for_each_lane(&mut out, mask, axis, mark_gradient_lane);
    }
    out
}

/// 表面积 (三维, 平方毫米) 或周长 (二维, 毫米).
///
/// 表面体素个数乘以平均体素面面积 (三维) 或平均像素边长 (二维).
/// 这是一个粗略近似, 并非几何精确的表面积.
pub fn surface_area(mask: &ArrayViewD<'_, bool>, spacing: &ImageSpacing) -> f64 {
    if !mask.iter().any(|&b| b) {
        return 0.0;
    }
    let count = surface_voxels(mask).iter().filter(|&&b| b).count() as f64;
    if mask.ndim() == 3 {
        count * spacing.mean_face_area()
    } else {
        count * spacing.mean_edge_length()
    }
}

/// 球形度 (三维) `π^(1/3) (6V)^(2/3) / A`, 或圆度 (二维) `4πA / P²`.
/// 体积或表面积非正时返回 `0.0`.
pub fn sphericity(ndim: usize, volume: f64, surface: f64) -> f64 {
    use std::f64::consts::PI;

    if volume <= 0.0 || surface <= 0.0 {
        return 0.0;
    }
    if ndim == 3 {
        PI.powf(1.0 / 3.0) * (6.0 * volume).powf(2.0 / 3.0) / surface
    } else {
        4.0 * PI * volume / (surface * surface)
    }
}

/// 紧致度: 三维为 `V / A^1.5`, 二维为 `V / P²`.
/// 体积或表面积非正时返回 `0.0`.
pub fn compactness(ndim: usize, volume: f64, surface: f64) -> f64 {
    if volume <= 0.0 || surface <= 0.0 {
        return 0.0;
    }
    if ndim == 3 {
        volume / surface.powf(1.5)
    } else {
        volume / surface.powi(2)
    }
}
