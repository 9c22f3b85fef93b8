//! 手工编辑: 球形画笔与多分割合并.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use ndarray::{s, Array3, ArrayD, Ix3, Zip};

use crate::error::{CoreError, Result};
use crate::segmentation::MedicalSegmentation;
use crate::Idx3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 画笔编辑模式.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EditMode {
    /// 并入画笔区域.
    Add,
    /// 擦除画笔区域.
    Remove,
    /// 先擦除画笔区域再并入画笔区域.
    Replace,
}

impl EditMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }

    /// 单个体素的编辑结果. `current` 为原值, `brush` 表示该体素是否在画笔内.
    #[inline]
    pub const fn apply(&self, current: bool, brush: bool) -> bool {
        match self {
            Self::Add => current | brush,
            Self::Remove => current & !brush,
            Self::Replace => (current & !brush) | brush,
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "replace" => Ok(Self::Replace),
            _ => Err(CoreError::UnsupportedOperation(format!("未知编辑模式 `{s}`"))),
        }
    }
}

/// 多分割合并策略.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MergeStrategy {
    /// 逐个求并.
    Union,
    /// 逐个求交.
    Intersection,
    /// 取前景体素最多的一个. 并列时取最靠前的.
    Largest,
}

impl MergeStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::Intersection => "intersection",
            Self::Largest => "largest",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "union" => Ok(Self::Union),
            "intersection" => Ok(Self::Intersection),
            "largest" => Ok(Self::Largest),
            _ => Err(CoreError::UnsupportedOperation(format!("未知合并策略 `{s}`"))),
        }
    }
}

/// 半径为 `radius` 的球形画笔, 裁剪到形状 `shape` 之内.
///
/// 与中心的整数欧氏距离不超过 `radius` 的体素为真.
pub fn spherical_brush(shape: Idx3d, center: Idx3d, radius: usize) -> Array3<bool> {
    let mut brush = Array3::from_elem(shape, false);
    stamp(&mut brush, center, radius, EditMode::Add);
    brush
}

/// 在 `mask` 上以 `mode` 盖一次球形画笔. 只遍历画笔的外接立方体.
///
/// 距离在 `u128` 上饱和计算, 任意大的半径或越界中心都不会溢出.
fn stamp(mask: &mut Array3<bool>, (cz, cy, cx): Idx3d, radius: usize, mode: EditMode) {
    let (d, h, w) = mask.dim();
    let lo = |c: usize| c.saturating_sub(radius);
    let hi = |c: usize, len: usize| c.saturating_add(radius).saturating_add(1).min(len);
    let (z0, z1) = (lo(cz), hi(cz, d));
    let (y0, y1) = (lo(cy), hi(cy, h));
    let (x0, x1) = (lo(cx), hi(cx, w));
    if z0 >= z1 || y0 >= y1 || x0 >= x1 {
        return;
    }
    let r2 = (radius as u128).pow(2);
    let sq = |a: usize, b: usize| (a.abs_diff(b) as u128).pow(2);
    mask.slice_mut(s![z0..z1, y0..y1, x0..x1])
        .indexed_iter_mut()
        .for_each(|((z, y, x), v)| {
            let dist2 = sq(z + z0, cz)
                .saturating_add(sq(y + y0, cy))
                .saturating_add(sq(x + x0, cx));
            *v = mode.apply(*v, dist2 <= r2);
        });
}

/// 编辑服务. 以编辑者身份生成新的手工分割.
#[derive(Debug, Clone)]
pub struct SegmentationEditor {
    editor_id: String,
}

impl SegmentationEditor {
    /// 以 `editor_id` 身份编辑.
    pub fn new(editor_id: impl Into<String>) -> Self {
        Self {
            editor_id: editor_id.into(),
        }
    }

    /// 编辑者标识.
    #[inline]
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }

    /// 依次在 `centers` 处以 `mode` 施加半径 `radius` 的球形画笔, 返回新分割.
    ///
    /// 锁定的分割返回 `Err(CoreError::Locked)`, 二维分割返回
    /// `Err(CoreError::UnsupportedOperation)`, 两种情况都不做任何修改.
    /// 成功时在 `segmentation` 的修改历史中追加一条派生记录.
    pub fn apply_brush_edit(
        &self,
        segmentation: &mut MedicalSegmentation,
        centers: &[Idx3d],
        radius: usize,
        mode: EditMode,
    ) -> Result<MedicalSegmentation> {
        if segmentation.is_locked() {
            warn!(
                "{} 试图编辑已锁定的分割 {}",
                self.editor_id,
                segmentation.id()
            );
            return Err(CoreError::Locked(segmentation.segmentation_id()));
        }
        let mut mask = segmentation
            .mask()
            .to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|_| CoreError::UnsupportedOperation("画笔编辑需要三维掩膜".to_owned()))?;

        for &center in centers {
            stamp(&mut mask, center, radius, mode);
        }

        let description = format!("Manual edit of {}", segmentation.description());
        let edited = segmentation.derive(mask.into_dyn(), &self.editor_id, description)?;
        segmentation.record_derivation(&self.editor_id, &edited);
        Ok(edited)
    }

    /// 按 `strategy` 合并多个分割, 返回新分割. 区域与来源影像取自第一个分割.
    ///
    /// 输入为空时返回 `Err(CoreError::Validation)`; 形状不一致时返回
    /// `Err(CoreError::DimensionMismatch)`.
    pub fn merge_segmentations(
        &self,
        segmentations: &[MedicalSegmentation],
        strategy: MergeStrategy,
    ) -> Result<MedicalSegmentation> {
        let (first, rest) = segmentations
            .split_first()
            .ok_or_else(|| CoreError::Validation("至少需要一个分割才能合并".to_owned()))?;
        if let Some(bad) = rest.iter().find(|s| s.dimensions() != first.dimensions()) {
            return Err(CoreError::mismatch(first.dimensions(), bad.dimensions()));
        }

        let mask: ArrayD<bool> = match strategy {
            MergeStrategy::Union => fold_masks(first, rest, |a, b| *a |= b),
            MergeStrategy::Intersection => fold_masks(first, rest, |a, b| *a &= b),
            MergeStrategy::Largest => {
                let mut largest = first;
                let mut best = first.voxel_count();
                for seg in rest {
                    let cnt = seg.voxel_count();
                    if cnt > best {
                        largest = seg;
                        best = cnt;
                    }
                }
                largest.mask().to_owned()
            }
        };

        let description = format!("Merged segmentation ({strategy})");
        let merged = first.derive(mask, &self.editor_id, description)?;
        info!(
            "{} 以 {strategy} 合并了 {} 个分割",
            self.editor_id,
            segmentations.len()
        );
        Ok(merged)
    }
}

fn fold_masks<F>(first: &MedicalSegmentation, rest: &[MedicalSegmentation], f: F) -> ArrayD<bool>
where
    F: Fn(&mut bool, bool),
{
    let mut acc = first.mask().to_owned();
    for seg in rest {
        Zip::from(&mut acc).and(&seg.mask()).for_each(|a, &b| f(a, b));
    }
    acc
}
