//! 分割实体与掩膜代数.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use ndarray::{ArcArray, ArrayD, ArrayView2, ArrayViewD, IxDyn, Zip};
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::consts::{confidence, creator};
use crate::data::plane_slice;
use crate::error::{CoreError, Result};
use crate::morph::{self, MorphOp};
use crate::{ImagePlane, ImageSpacing, MedicalImage};

pub mod intensity;
pub mod metrics;

pub use intensity::IntensityStatistics;
pub use metrics::SegmentationMetrics;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 前列腺相关的解剖区域.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnatomicalRegion {
    /// 整个前列腺.
    ProstateWhole,
    /// 外周带.
    PeripheralZone,
    /// 移行带.
    TransitionZone,
    /// 中央带.
    CentralZone,
    /// 可疑病灶.
    SuspiciousLesion,
    /// 确诊癌灶.
    ConfirmedCancer,
    /// 良性增生.
    BenignHyperplasia,
    /// 尿道.
    Urethra,
    /// 精囊.
    SeminalVesicles,
}

impl AnatomicalRegion {
    /// 全部区域.
    pub const ALL: [AnatomicalRegion; 9] = [
        Self::ProstateWhole,
        Self::PeripheralZone,
        Self::TransitionZone,
        Self::CentralZone,
        Self::SuspiciousLesion,
        Self::ConfirmedCancer,
        Self::BenignHyperplasia,
        Self::Urethra,
        Self::SeminalVesicles,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProstateWhole => "prostate_whole",
            Self::PeripheralZone => "prostate_peripheral_zone",
            Self::TransitionZone => "prostate_transition_zone",
            Self::CentralZone => "prostate_central_zone",
            Self::SuspiciousLesion => "suspicious_lesion",
            Self::ConfirmedCancer => "confirmed_cancer",
            Self::BenignHyperplasia => "benign_hyperplasia",
            Self::Urethra => "urethra",
            Self::SeminalVesicles => "seminal_vesicles",
        }
    }

    /// 叠加显示时使用的 RGB 颜色.
    pub const fn display_color(&self) -> [u8; 3] {
        match self {
            Self::ProstateWhole => [204, 153, 102],
            Self::PeripheralZone => [102, 204, 102],
            Self::TransitionZone => [102, 102, 204],
            Self::SuspiciousLesion => [255, 204, 0],
            Self::ConfirmedCancer => [255, 51, 51],
            Self::BenignHyperplasia => [153, 204, 153],
            Self::Urethra => [204, 102, 204],
            Self::SeminalVesicles => [204, 204, 102],
            Self::CentralZone => [179, 179, 179],
        }
    }

    /// 自动分割的置信度低于该值时需要人工复核. 没有阈值的区域返回 `None`.
    pub const fn review_threshold(&self) -> Option<f64> {
        match self {
            Self::ProstateWhole => Some(0.85),
            Self::SuspiciousLesion => Some(0.70),
            Self::ConfirmedCancer => Some(0.80),
            Self::PeripheralZone | Self::TransitionZone => Some(0.75),
            Self::CentralZone | Self::BenignHyperplasia | Self::Urethra | Self::SeminalVesicles => {
                None
            }
        }
    }
}

impl fmt::Display for AnatomicalRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnatomicalRegion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedOperation(format!("未知解剖区域 `{s}`")))
    }
}

/// 分割来源.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentationType {
    /// 手工勾画, 或由已有分割运算得到.
    Manual,
    /// 自动预测.
    Automatic,
    /// 自动预测后人工修正.
    SemiAutomatic,
    /// 从其它系统导入.
    Imported,
}

impl SegmentationType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
            Self::SemiAutomatic => "semi_automatic",
            Self::Imported => "imported",
        }
    }
}

impl fmt::Display for SegmentationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 置信度分级. 区间左闭右开.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfidenceLevel {
    /// `[0, 0.3)`
    VeryLow,
    /// `[0.3, 0.5)`
    Low,
    /// `[0.5, 0.7)`
    Moderate,
    /// `[0.7, 0.9)`
    High,
    /// `[0.9, 1]`
    VeryHigh,
}

impl ConfidenceLevel {
    /// 由置信度分数分级.
    pub fn from_score(score: f64) -> Self {
        if score < confidence::VERY_LOW_BELOW {
            Self::VeryLow
        } else if score < confidence::LOW_BELOW {
            Self::Low
        } else if score < confidence::MODERATE_BELOW {
            Self::Moderate
        } else if score < confidence::HIGH_BELOW {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

/// 修改记录的类别.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModificationKind {
    Locked,
    Unlocked,
    /// 以该分割为输入生成了新分割.
    Derived,
}

/// 分割修改历史中的一条记录. 历史只追加, 不删除.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModificationRecord {
    /// 修改时间.
    pub at: DateTime<Utc>,
    /// 修改类别.
    pub kind: ModificationKind,
    /// 执行修改的用户或系统标识.
    pub actor: String,
    /// 附加说明.
    pub note: String,
}

/// 医学影像上某个解剖区域的二值分割.
///
/// 掩膜构造后不可变. 所有掩膜运算 (并, 交, 形态学, 画笔编辑, 合并)
/// 都返回新的分割; 唯一可变的状态是锁定标志和修改历史.
///
/// 几何度量与强度统计在第一次计算后被缓存, 可以用 [`Self::invalidate_cache`] 清空.
#[derive(Debug, Clone)]
pub struct MedicalSegmentation {
    id: Uuid,
    mask: ArcArray<bool, IxDyn>,
    anatomical_region: AnatomicalRegion,
    segmentation_type: SegmentationType,
    creation_date: DateTime<Utc>,
    creator_id: String,
    confidence_score: Option<f64>,
    parent_image_uid: Option<String>,
    description: String,
    is_locked: bool,
    history: Vec<ModificationRecord>,
    metrics_cache: OnceCell<(ImageSpacing, SegmentationMetrics)>,
    intensity_cache: OnceCell<(String, IntensityStatistics)>,
}

impl MedicalSegmentation {
    /// 构建分割. 掩膜必须是非空的二维或三维数组.
    ///
    /// 生成新的 id, 创建时间为当前时间, 描述默认为 `"{region} segmentation"`.
    pub fn new(
        mask: ArrayD<bool>,
        anatomical_region: AnatomicalRegion,
        segmentation_type: SegmentationType,
        creator_id: impl Into<String>,
    ) -> Result<Self> {
        if !(2..=3).contains(&mask.ndim()) {
            return Err(CoreError::Validation(format!(
                "掩膜必须是二维或三维, 实际为 {} 维",
                mask.ndim()
            )));
        }
        if mask.is_empty() {
            return Err(CoreError::Validation("掩膜不能为空".to_owned()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            mask: mask.into_shared(),
            anatomical_region,
            segmentation_type,
            creation_date: Utc::now(),
            creator_id: creator_id.into(),
            confidence_score: None,
            parent_image_uid: None,
            description: format!("{anatomical_region} segmentation"),
            is_locked: false,
            history: Vec::new(),
            metrics_cache: OnceCell::new(),
            intensity_cache: OnceCell::new(),
        })
    }

    /// 设置置信度分数. 分数不在 `[0, 1]` 内时返回 `Err(CoreError::Validation)`.
    pub fn with_confidence(mut self, score: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&score) {
            return Err(CoreError::Validation(format!(
                "置信度必须在 [0, 1] 内, 实际为 {score}"
            )));
        }
        self.confidence_score = Some(score);
        Ok(self)
    }

    /// 设置来源影像的序列 UID.
    pub fn with_parent_image_uid(mut self, uid: impl Into<String>) -> Self {
        self.parent_image_uid = Some(uid.into());
        self
    }

    /// 设置描述.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 设置创建时间.
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = date;
        self
    }

    /// 恢复持久化的 id, 锁定状态与历史.
    #[cfg(feature = "serde")]
    pub(crate) fn restored(
        mut self,
        id: Uuid,
        is_locked: bool,
        history: Vec<ModificationRecord>,
    ) -> Self {
        self.id = id;
        self.is_locked = is_locked;
        self.history = history;
        self
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// id 的字符串形式.
    #[inline]
    pub fn segmentation_id(&self) -> String {
        self.id.to_string()
    }

    /// 掩膜的只读视图.
    #[inline]
    pub fn mask(&self) -> ArrayViewD<'_, bool> {
        self.mask.view()
    }

    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        self.mask.shape()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.mask.ndim()
    }

    #[inline]
    pub fn anatomical_region(&self) -> AnatomicalRegion {
        self.anatomical_region
    }

    #[inline]
    pub fn segmentation_type(&self) -> SegmentationType {
        self.segmentation_type
    }

    #[inline]
    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    #[inline]
    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    #[inline]
    pub fn confidence_score(&self) -> Option<f64> {
        self.confidence_score
    }

    /// 置信度分级. 没有置信度分数时返回 `None`.
    #[inline]
    pub fn confidence_level(&self) -> Option<ConfidenceLevel> {
        self.confidence_score.map(ConfidenceLevel::from_score)
    }

    #[inline]
    pub fn parent_image_uid(&self) -> Option<&str> {
        self.parent_image_uid.as_deref()
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// 修改历史, 按时间顺序.
    #[inline]
    pub fn history(&self) -> &[ModificationRecord] {
        &self.history
    }

    /// 锁定分割, 之后编辑服务会拒绝编辑.
    pub fn lock(&mut self, actor: impl Into<String>) {
        self.is_locked = true;
        self.push_record(ModificationKind::Locked, actor, String::new());
    }

    /// 解除锁定.
    pub fn unlock(&mut self, actor: impl Into<String>) {
        self.is_locked = false;
        self.push_record(ModificationKind::Unlocked, actor, String::new());
    }

    /// 记录以该分割为输入派生出了 `derived`.
    pub(crate) fn record_derivation(&mut self, actor: &str, derived: &MedicalSegmentation) {
        let note = format!("{} -> {}", derived.description, derived.id);
        self.push_record(ModificationKind::Derived, actor, note);
    }

    fn push_record(&mut self, kind: ModificationKind, actor: impl Into<String>, note: String) {
        self.history.push(ModificationRecord {
            at: Utc::now(),
            kind,
            actor: actor.into(),
            note,
        });
    }

    /// 清空几何度量与强度统计缓存.
    pub fn invalidate_cache(&mut self) {
        self.metrics_cache.take();
        self.intensity_cache.take();
    }

    /// 前景体素个数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        metrics::voxel_count(&self.mask())
    }

    /// 掩膜是否没有前景.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&b| b)
    }

    /// 每个轴上前景索引的 `(最小值, 最大值)`. 空掩膜返回全 0.
    #[inline]
    pub fn bounding_box(&self) -> Vec<(usize, usize)> {
        metrics::bounding_box(&self.mask())
    }

    /// 每个轴上前景索引的平均值. 空掩膜返回全 0.
    #[inline]
    pub fn centroid(&self) -> Vec<f64> {
        metrics::centroid(&self.mask())
    }

    /// 三维掩膜在 `plane` 平面上第 `index` 张切片.
    pub fn get_mask_slice(&self, plane: ImagePlane, index: usize) -> Result<ArrayView2<'_, bool>> {
        plane_slice(self.mask(), plane, index)
    }

    /// 以 `spacing` 计算几何度量.
    ///
    /// 结果按第一次请求时的间距缓存. 以不同间距请求时重新计算, 但不覆盖缓存.
    pub fn calculate_metrics(&self, spacing: &ImageSpacing) -> SegmentationMetrics {
        if let Some((cached, m)) = self.metrics_cache.get() {
            if cached == spacing {
                trace!("分割 {} 几何度量命中缓存", self.id);
                return *m;
            }
            debug!("分割 {} 以不同间距 {spacing:?} 重新计算几何度量", self.id);
            return metrics::compute(&self.mask(), spacing);
        }
        let m = metrics::compute(&self.mask(), spacing);
        debug!("分割 {} 几何度量: {m:?}", self.id);
        let _ = self.metrics_cache.set((*spacing, m));
        m
    }

    /// 计算分割区域内 `image` 的强度统计, 并按影像序列 UID 缓存.
    ///
    /// 掩膜与影像形状不同时返回 `Err(CoreError::DimensionMismatch)`.
    pub fn calculate_intensity_statistics(
        &self,
        image: &MedicalImage,
    ) -> Result<IntensityStatistics> {
        if self.dimensions() != image.dimensions() {
            return Err(CoreError::mismatch(self.dimensions(), image.dimensions()));
        }
        let uid = image.series_instance_uid();
        if let Some((cached, s)) = self.intensity_cache.get() {
            if cached == uid {
                trace!("分割 {} 强度统计命中缓存", self.id);
                return Ok(*s);
            }
            return self.intensity_statistics_of(&image.data());
        }
        let s = self.intensity_statistics_of(&image.data())?;
        let _ = self.intensity_cache.set((uid.to_owned(), s));
        Ok(s)
    }

    /// 计算分割区域内任意强度数组的统计量, 不使用缓存.
    pub fn intensity_statistics_of(
        &self,
        data: &ArrayViewD<'_, f32>,
    ) -> Result<IntensityStatistics> {
        intensity::compute(&self.mask(), data)
    }

    /// 需要人工复核: 区域有复核阈值, 且没有置信度或置信度低于阈值.
    pub fn requires_review(&self) -> bool {
        match self.anatomical_region.review_threshold() {
            None => false,
            Some(t) => self.confidence_score.map_or(true, |s| s < t),
        }
    }

    /// 并集. 两个掩膜形状必须相同.
    pub fn union_with(&self, other: &MedicalSegmentation) -> Result<MedicalSegmentation> {
        let mask = self.combine(other, |a, b| a | b)?;
        let description = format!("Union of {} and {}", self.description, other.description);
        self.derive(mask, creator::UNION, description)
    }

    /// 交集. 两个掩膜形状必须相同.
    pub fn intersection_with(&self, other: &MedicalSegmentation) -> Result<MedicalSegmentation> {
        let mask = self.combine(other, |a, b| a & b)?;
        let description = format!(
            "Intersection of {} and {}",
            self.description, other.description
        );
        self.derive(mask, creator::INTERSECTION, description)
    }

    /// 执行 `iterations` 次形态学操作 `op`, 见 [`crate::morph::apply`].
    pub fn apply_morphological_operation(
        &self,
        op: MorphOp,
        iterations: usize,
    ) -> Result<MedicalSegmentation> {
        let mask = morph::apply(&self.mask(), op, iterations);
        let description = format!("{} of {}", op.title(), self.description);
        self.derive(mask, creator::MORPHOLOGY, description)
    }

    fn combine<F>(&self, other: &MedicalSegmentation, f: F) -> Result<ArrayD<bool>>
    where
        F: Fn(bool, bool) -> bool,
    {
        if self.dimensions() != other.dimensions() {
            return Err(CoreError::mismatch(self.dimensions(), other.dimensions()));
        }
        Ok(Zip::from(&self.mask)
            .and(&other.mask)
            .map_collect(|&a, &b| f(a, b)))
    }

    /// 由 `self` 派生的新手工分割: 保留区域和来源影像.
    pub(crate) fn derive(
        &self,
        mask: ArrayD<bool>,
        creator_id: &str,
        description: String,
    ) -> Result<MedicalSegmentation> {
        let mut seg = MedicalSegmentation::new(
            mask,
            self.anatomical_region,
            SegmentationType::Manual,
            creator_id,
        )?
        .with_description(description);
        seg.parent_image_uid = self.parent_image_uid.clone();
        info!("由分割 {} 生成 {}: {}", self.id, seg.id, seg.description);
        Ok(seg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageIdentity, Modality};
    use ndarray::{s, Array, Array3};

    fn seg_from(mask: Array3<bool>) -> MedicalSegmentation {
        MedicalSegmentation::new(
            mask.into_dyn(),
            AnatomicalRegion::ProstateWhole,
            SegmentationType::Automatic,
            "tester",
        )
        .unwrap()
    }

    fn block(range: std::ops::Range<usize>) -> MedicalSegmentation {
        let mut m = Array3::from_elem((8, 8, 8), false);
        m.slice_mut(s![range.clone(), range.clone(), range]).fill(true);
        seg_from(m)
    }

    #[test]
    fn test_construction() {
        let seg = block(2..4);
        assert_eq!(seg.description(), "prostate_whole segmentation");
        assert_eq!(seg.voxel_count(), 8);
        assert!(!seg.is_locked());
        assert!(seg.confidence_level().is_none());

        let flat = Array::from_elem(5, true).into_dyn();
        assert!(matches!(
            MedicalSegmentation::new(
                flat,
                AnatomicalRegion::Urethra,
                SegmentationType::Manual,
                "x"
            ),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            block(1..3).with_confidence(1.2),
            Err(CoreError::Validation(_))
        ));
        assert!(block(1..3).with_confidence(-0.01).is_err());
        assert!(block(2..4).id() != block(2..4).id());
    }

    #[test]
    fn test_confidence_levels() {
        let level = |s: f64| block(1..2).with_confidence(s).unwrap().confidence_level();
        // 分界点 0.9 左闭右开, 0.92 已属于 VeryHigh.
        assert_eq!(level(0.92), Some(ConfidenceLevel::VeryHigh));
        assert_eq!(level(0.85), Some(ConfidenceLevel::High));
        assert_eq!(level(0.95), Some(ConfidenceLevel::VeryHigh));
        assert_eq!(level(0.65), Some(ConfidenceLevel::Moderate));
        assert_eq!(level(0.3), Some(ConfidenceLevel::Low));
        assert_eq!(level(0.0), Some(ConfidenceLevel::VeryLow));
        assert_eq!(level(1.0), Some(ConfidenceLevel::VeryHigh));
    }

    #[test]
    fn test_union_intersection_bounds() {
        let a = block(1..5);
        let b = block(3..7);
        let u = a.union_with(&b).unwrap();
        let i = a.intersection_with(&b).unwrap();
        assert_eq!(i.voxel_count(), 8);
        assert_eq!(u.voxel_count(), 64 + 64 - 8);
        assert!(i.voxel_count() <= a.voxel_count().min(b.voxel_count()));
        assert!(a.voxel_count().min(b.voxel_count()) <= u.voxel_count());

        assert_eq!(u.segmentation_type(), SegmentationType::Manual);
        assert_eq!(u.creator_id(), "system_union");
        assert_eq!(i.creator_id(), "system_intersection");
        assert_eq!(
            u.description(),
            "Union of prostate_whole segmentation and prostate_whole segmentation"
        );
        assert!(u.id() != a.id());
        // 输入不变
        assert_eq!(a.voxel_count(), 64);
    }

    #[test]
    fn test_algebra_shape_mismatch() {
        let a = block(1..3);
        let b = seg_from(Array3::from_elem((8, 8, 9), false));
        assert_eq!(
            a.union_with(&b).unwrap_err(),
            CoreError::DimensionMismatch {
                expected: vec![8, 8, 8],
                found: vec![8, 8, 9],
            }
        );
        assert!(a.intersection_with(&b).is_err());
    }

    #[test]
    fn test_morphology_derivation() {
        let a = block(2..7).with_parent_image_uid("1.2.3");
        let eroded = a.apply_morphological_operation(MorphOp::Erode, 1).unwrap();
        assert_eq!(eroded.voxel_count(), 27);
        assert_eq!(eroded.creator_id(), "system_morphology");
        assert_eq!(eroded.description(), "Erode of prostate_whole segmentation");
        assert_eq!(eroded.parent_image_uid(), Some("1.2.3"));
        assert_eq!(eroded.anatomical_region(), AnatomicalRegion::ProstateWhole);
    }

    #[test]
    fn test_lock_history() {
        let mut a = block(2..4);
        a.lock("dr_who");
        assert!(a.is_locked());
        a.unlock("dr_who");
        assert!(!a.is_locked());
        let kinds: Vec<_> = a.history().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ModificationKind::Locked, ModificationKind::Unlocked]);
        assert_eq!(a.history()[0].actor, "dr_who");
    }

    #[test]
    fn test_metrics_cache() {
        let a = block(2..4);
        let unit = ImageSpacing::unit();
        let first = a.calculate_metrics(&unit);
        assert_eq!(first.voxel_count, 8);
        assert_eq!(a.calculate_metrics(&unit), first);

        let thick = ImageSpacing::new(1.0, 1.0, 2.0).unwrap();
        let other = a.calculate_metrics(&thick);
        assert_eq!(other.volume_mm3, 16.0);
        // 缓存仍然是第一次的结果.
        assert_eq!(a.calculate_metrics(&unit).volume_mm3, 8.0);

        let mut a = a;
        a.invalidate_cache();
        assert_eq!(a.calculate_metrics(&thick).volume_mm3, 16.0);
        // 清空后缓存以新的间距为键.
        assert_eq!(a.calculate_metrics(&unit).volume_mm3, 8.0);
    }

    #[test]
    fn test_intensity_with_image() {
        let data = Array::from_shape_fn((8, 8, 8), |(z, _, _)| z as f32).into_dyn();
        let image = MedicalImage::new(
            data,
            ImageSpacing::unit(),
            Modality::Mri,
            ImageIdentity::new("P1", "1.2", "1.2.3"),
            Utc::now(),
        )
        .unwrap();
        let a = block(2..4);
        let s = a.calculate_intensity_statistics(&image).unwrap();
        assert_eq!(s.mean_intensity, 2.5);
        assert_eq!(s.min_intensity, 2.0);
        assert_eq!(s.max_intensity, 3.0);
        assert_eq!(a.calculate_intensity_statistics(&image).unwrap(), s);

        let empty = seg_from(Array3::from_elem((8, 8, 8), false));
        assert_eq!(
            empty.calculate_intensity_statistics(&image).unwrap(),
            IntensityStatistics::default()
        );
        let wrong = seg_from(Array3::from_elem((4, 8, 8), true));
        assert!(matches!(
            wrong.calculate_intensity_statistics(&image),
            Err(CoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_review_and_colors() {
        let low = block(2..4).with_confidence(0.8).unwrap();
        assert!(low.requires_review());
        let high = block(2..4).with_confidence(0.9).unwrap();
        assert!(!high.requires_review());
        assert!(block(2..4).requires_review());
        assert_eq!(AnatomicalRegion::CentralZone.review_threshold(), None);
        assert_eq!(
            AnatomicalRegion::ConfirmedCancer.display_color(),
            [255, 51, 51]
        );
        assert_eq!(
            "seminal_vesicles".parse::<AnatomicalRegion>().unwrap(),
            AnatomicalRegion::SeminalVesicles
        );
    }

    #[test]
    fn test_mask_slice() {
        let a = block(2..4);
        let sl = a.get_mask_slice(ImagePlane::Axial, 2).unwrap();
        assert_eq!(sl.iter().filter(|&&b| b).count(), 4);
        assert!(a.get_mask_slice(ImagePlane::Coronal, 8).is_err());
    }
}
