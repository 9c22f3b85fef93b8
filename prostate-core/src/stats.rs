//! 一维样本的描述统计. 影像和分割的强度统计共用这些函数.
//!
//! 百分位数按线性插值计算; 直方图按 "密度" 归一化,
//! 即每柱的值为 `count / (n * bin_width)`, 各柱值与柱宽乘积之和为 1.

use ordered_float::OrderedFloat;

/// 算术平均. 空样本返回 `0.0`.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 总体标准差 (除以 `n`). 空样本返回 `0.0`.
pub(crate) fn std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// 升序排列后的副本.
pub(crate) fn sorted(values: &[f64]) -> Vec<f64> {
    let mut buf: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    buf.sort_unstable();
    buf.into_iter().map(|v| v.0).collect()
}

/// 中位数. `sorted` 必须已升序排列. 偶数个样本时取中间两数的平均值.
pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// 第 `q` (0 <= q <= 100) 百分位数, 线性插值. `sorted` 必须已升序排列.
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!((0.0..=100.0).contains(&q));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let pos = q / 100.0 * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let t = pos - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi.min(n - 1)]);
    // 与常见数值库一致: t >= 0.5 时从右端点回退, 减小舍入误差.
    if t >= 0.5 {
        b - (b - a) * (1.0 - t)
    } else {
        a + (b - a) * t
    }
}

/// `bins` 柱的密度直方图, 范围为样本的 `[min, max]`.
///
/// 当 `min == max` 时范围扩展为 `[min - 0.5, max + 0.5]`. 空样本返回全 0.
pub(crate) fn density_histogram(values: &[f64], bins: usize) -> Vec<f64> {
    debug_assert!(bins >= 1);
    if values.is_empty() {
        return vec![0.0; bins];
    }
    let (mut first, mut last) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if first == last {
        first -= 0.5;
        last += 0.5;
    }

    let step = (last - first) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|k| first + k as f64 * step).collect();
    edges[bins] = last;

    let norm = bins as f64 / (last - first);
    let mut counts = vec![0u64; bins];
    for &v in values {
        let mut i = ((v - first) * norm) as usize;
        if i >= bins {
            i = bins - 1;
        }
        // 浮点边界修正
        if v < edges[i] && i > 0 {
            i -= 1;
        } else if i + 1 < bins && v >= edges[i + 1] {
            i += 1;
        }
        counts[i] += 1;
    }

    let n = values.len() as f64;
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&c, e)| c as f64 / (n * (e[1] - e[0])))
        .collect()
}

/// 香农熵 `-Σ p·log2(p)`, 只统计 `p > 0` 的柱.
pub(crate) fn entropy(hist: &[f64]) -> f64 {
    -hist
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
}

/// 均匀度 (能量) `Σ p²`.
pub(crate) fn uniformity(hist: &[f64]) -> f64 {
    hist.iter().map(|p| p * p).sum()
}
