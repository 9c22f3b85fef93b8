//! 分割区域内的强度统计.

use ndarray::{ArrayViewD, Zip};

use crate::consts::HISTOGRAM_BINS;
use crate::error::{CoreError, Result};
use crate::stats;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 掩膜区域内影像强度的统计量. 空掩膜时全部为 0.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntensityStatistics {
    /// 均值.
    pub mean_intensity: f64,
    /// 总体标准差.
    pub std_intensity: f64,
    /// 最小值.
    pub min_intensity: f64,
    /// 最大值.
    pub max_intensity: f64,
    /// 中位数.
    pub median_intensity: f64,
    /// 线性插值的第 25 百分位数.
    pub percentile_25: f64,
    /// 线性插值的第 75 百分位数.
    pub percentile_75: f64,
    /// 256 柱密度直方图的香农熵 (以 2 为底).
    pub entropy: f64,
    /// 同一直方图的 `Σ p²`.
    pub uniformity: f64,
}

impl IntensityStatistics {
    /// `max - min`.
    #[inline]
    pub fn intensity_range(&self) -> f64 {
        self.max_intensity - self.min_intensity
    }
}

/// 计算 `mask` 为真处 `image` 的强度统计. 两者形状不同时返回
/// `Err(CoreError::DimensionMismatch)`.
pub fn compute(
    mask: &ArrayViewD<'_, bool>,
    image: &ArrayViewD<'_, f32>,
) -> Result<IntensityStatistics> {
    if mask.shape() != image.shape() {
        return Err(CoreError::mismatch(mask.shape(), image.shape()));
    }

    let mut values = Vec::new();
    Zip::from(mask).and(image).for_each(|&m, &v| {
        if m {
            values.push(v as f64);
        }
    });
    if values.is_empty() {
        return Ok(IntensityStatistics::default());
    }

    let mean = stats::mean(&values);
    let sorted = stats::sorted(&values);
    let hist = stats::density_histogram(&values, HISTOGRAM_BINS);
    Ok(IntensityStatistics {
        mean_intensity: mean,
        std_intensity: stats::std(&values, mean),
        min_intensity: sorted[0],
        max_intensity: sorted[sorted.len() - 1],
        median_intensity: stats::median_sorted(&sorted),
        percentile_25: stats::percentile_sorted(&sorted, 25.0),
        percentile_75: stats::percentile_sorted(&sorted, 75.0),
        entropy: stats::entropy(&hist),
        uniformity: stats::uniformity(&hist),
    })
}
