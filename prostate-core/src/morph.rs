//! 二值形态学操作.
//!
//! 结构元为连通度 1 的十字形 (三维下为 6 邻域, 二维下为 4 邻域),
//! 数组边界外视为背景. 因此腐蚀会剥掉贴边的前景.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, Axis, Zip};

use crate::error::{CoreError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 形态学操作.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MorphOp {
    /// 腐蚀.
    Erode,
    /// 膨胀.
    Dilate,
    /// 开运算: 先腐蚀再膨胀.
    Open,
    /// 闭运算: 先膨胀再腐蚀.
    Close,
}

impl MorphOp {
    /// 小写名称, 与 `FromStr` 接受的字符串一致.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Erode => "erode",
            Self::Dilate => "dilate",
            Self::Open => "open",
            Self::Close => "close",
        }
    }

    /// 首字母大写的名称, 用于生成分割描述.
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Erode => "Erode",
            Self::Dilate => "Dilate",
            Self::Open => "Open",
            Self::Close => "Close",
        }
    }
}

impl fmt::Display for MorphOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MorphOp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "erode" => Ok(Self::Erode),
            "dilate" => Ok(Self::Dilate),
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            _ => Err(CoreError::UnsupportedOperation(format!(
                "未知形态学操作 `{s}`"
            ))),
        }
    }
}

/// 对 `mask` 执行 `iterations` 次 `op`, 返回新掩膜.
///
/// `iterations == 0` 时重复执行直至结果不再变化. 开/闭运算的两个阶段各执行
/// `iterations` 次.
pub fn apply(mask: &ArrayViewD<'_, bool>, op: MorphOp, iterations: usize) -> ArrayD<bool> {
    match op {
        MorphOp::Erode => repeat(mask.to_owned(), iterations, erode_once),
        MorphOp::Dilate => repeat(mask.to_owned(), iterations, dilate_once),
        MorphOp::Open => {
            let tmp = repeat(mask.to_owned(), iterations, erode_once);
            repeat(tmp, iterations, dilate_once)
        }
        MorphOp::Close => {
            let tmp = repeat(mask.to_owned(), iterations, dilate_once);
            repeat(tmp, iterations, erode_once)
        }
    }
}

fn repeat<F>(mut mask: ArrayD<bool>, iterations: usize, step: F) -> ArrayD<bool>
where
    F: Fn(&ArrayViewD<'_, bool>) -> ArrayD<bool>,
{
    if iterations == 0 {
        loop {
            let next = step(&mask.view());
            if next == mask {
                return next;
            }
            mask = next;
        }
    }
    for _ in 0..iterations {
        mask = step(&mask.view());
    }
    mask
}

/// 腐蚀一条轴向线: 两侧邻居 (越界视为背景) 不全为前景的位置清零.
fn erode_lane(mut out: ArrayViewMut1<'_, bool>, lane: ArrayView1<'_, bool>) {
    let n = lane.len();
    for i in 0..n {
        let left = i > 0 && lane[i - 1];
        let right = i + 1 < n && lane[i + 1];
        if !(left && right) {
            out[i] = false;
        }
    }
}

/// 膨胀一条轴向线: 任一侧邻居为前景的位置置位.
fn dilate_lane(mut out: ArrayViewMut1<'_, bool>, lane: ArrayView1<'_, bool>) {
    let n = lane.len();
    for i in 0..n {
        if (i > 0 && lane[i - 1]) || (i + 1 < n && lane[i + 1]) {
            out[i] = true;
        }
    }
}

/// 以原掩膜为输入, 逐轴把 `lane_op` 的结果叠加到输出上.
fn per_axis<F>(mask: &ArrayViewD<'_, bool>, lane_op: F) -> ArrayD<bool>
where
    F: Fn(ArrayViewMut1<'_, bool>, ArrayView1<'_, bool>) + Sync + Send,
{
    let mut out = mask.to_owned();
    for axis in 0..mask.ndim() {
        for_each_lane(&mut out, mask, axis, &lane_op);
    }
    out
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon`, 并行地沿 `axis` 逐条轴向线执行 `lane_op`.
        /// `out` 与 `mask` 形状必须相同.
        pub(crate) fn for_each_lane<F>(
            out: &mut ArrayD<bool>,
            mask: &ArrayViewD<'_, bool>,
            axis: usize,
            lane_op: F,
        ) where
            F: Fn(ArrayViewMut1<'_, bool>, ArrayView1<'_, bool>) + Sync + Send,
        {
            Zip::from(out.lanes_mut(Axis(axis)))
                .and(mask.lanes(Axis(axis)))
                .par_for_each(lane_op);
        }
    } else {
        /// 沿 `axis` 逐条轴向线执行 `lane_op`. `out` 与 `mask` 形状必须相同.
        pub(crate) fn for_each_lane<F>(
            out: &mut ArrayD<bool>,
            mask: &ArrayViewD<'_, bool>,
            axis: usize,
            lane_op: F,
        ) where
            F: Fn(ArrayViewMut1<'_, bool>, ArrayView1<'_, bool>),
        {
            Zip::from(out.lanes_mut(Axis(axis)))
                .and(mask.lanes(Axis(axis)))
                .for_each(lane_op);
        }
    }
}

#[inline]
fn erode_once(mask: &ArrayViewD<'_, bool>) -> ArrayD<bool> {
    per_axis(mask, erode_lane)
}

#[inline]
fn dilate_once(mask: &ArrayViewD<'_, bool>) -> ArrayD<bool> {
    per_axis(mask, dilate_lane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2, Array3};

    fn count(m: &ArrayD<bool>) -> usize {
        m.iter().filter(|&&b| b).count()
    }

    fn cube() -> ArrayD<bool> {
        let mut m = Array3::from_elem((9, 9, 9), false);
        m.slice_mut(s![2..7, 2..7, 2..7]).fill(true);
        m.into_dyn()
    }

    #[test]
    fn test_erode_and_dilate() {
        let m = cube();
        let eroded = apply(&m.view(), MorphOp::Erode, 1);
        assert_eq!(count(&eroded), 27);
        let dilated = apply(&m.view(), MorphOp::Dilate, 1);
        // 125 + 6 个面各 25 个体素.
        assert_eq!(count(&dilated), 125 + 6 * 25);
        assert!(dilated[[1, 4, 4]]);
        assert!(!dilated[[1, 1, 4]]);
    }

    #[test]
    fn test_open_close_cube() {
        let m = cube();
        // 立方体在十字结构元下的开运算不会恢复棱.
        let opened = apply(&m.view(), MorphOp::Open, 1);
        assert_eq!(count(&opened), 27 + 6 * 9);
        let closed = apply(&m.view(), MorphOp::Close, 1);
        assert_eq!(closed, m);
    }

    #[test]
    fn test_border_erodes() {
        let m = Array2::from_elem((4, 4), true).into_dyn();
        let eroded = apply(&m.view(), MorphOp::Erode, 1);
        assert_eq!(count(&eroded), 4);
        assert!(eroded[[1, 1]] && eroded[[2, 2]]);
        // 重复直至稳定.
        let gone = apply(&m.view(), MorphOp::Erode, 0);
        assert_eq!(count(&gone), 0);
    }

    #[test]
    fn test_dilate_until_stable() {
        let mut m = Array2::from_elem((5, 5), false);
        m[[2, 2]] = true;
        let full = apply(&m.into_dyn().view(), MorphOp::Dilate, 0);
        assert_eq!(count(&full), 25);
    }

    #[test]
    fn test_parse() {
        assert_eq!("close".parse::<MorphOp>().unwrap(), MorphOp::Close);
        assert!(matches!(
            "skeletonize".parse::<MorphOp>(),
            Err(CoreError::UnsupportedOperation(_))
        ));
        assert_eq!(MorphOp::Open.title(), "Open");
    }
}
