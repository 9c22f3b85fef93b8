//! 医学影像实体.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{
    Array2, Array3, ArcArray, ArrayBase, ArrayD, ArrayView2, ArrayView3, ArrayViewD, Axis, Data,
    Dimension, Ix3, IxDyn, Slice,
};
use num::ToPrimitive;

use super::{ImageSpacing, PresetName, WindowLevel};
use crate::consts::{ct, tag, MIN_LOADED_DIM, MIN_PROSTATE_DIMS};
use crate::error::{CoreError, Result};
use crate::stats;
use crate::Idx2d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 影像模态.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Modality {
    /// 计算机断层扫描.
    Ct,
    /// 磁共振.
    Mri,
    /// 超声.
    Ultrasound,
    /// X 光.
    Xray,
    /// 正电子发射断层扫描.
    Pet,
}

impl Modality {
    /// DICOM 模态代码.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Ct => "CT",
            Self::Mri => "MRI",
            Self::Ultrasound => "US",
            Self::Xray => "XR",
            Self::Pet => "PT",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CT" => Ok(Self::Ct),
            "MRI" | "MR" => Ok(Self::Mri),
            "US" => Ok(Self::Ultrasound),
            "XR" => Ok(Self::Xray),
            "PT" => Ok(Self::Pet),
            _ => Err(CoreError::UnsupportedOperation(format!("未知模态代码 `{s}`"))),
        }
    }
}

/// 解剖平面.
///
/// 三维数据按 `(层, 高, 宽)` 排列: 轴位面沿第 0 维切, 冠状面沿第 1 维切,
/// 矢状面沿第 2 维切.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImagePlane {
    /// 轴位面 (水平面).
    Axial,
    /// 矢状面.
    Sagittal,
    /// 冠状面.
    Coronal,
    /// 斜切面. 目前不支持提取.
    Oblique,
}

impl ImagePlane {
    /// 小写名称.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Axial => "axial",
            Self::Sagittal => "sagittal",
            Self::Coronal => "coronal",
            Self::Oblique => "oblique",
        }
    }

    /// 该平面在三维数组上对应的切分轴. 斜切面没有对应轴.
    const fn axis(&self) -> Option<usize> {
        match self {
            Self::Axial => Some(0),
            Self::Coronal => Some(1),
            Self::Sagittal => Some(2),
            Self::Oblique => None,
        }
    }
}

impl fmt::Display for ImagePlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImagePlane {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "axial" => Ok(Self::Axial),
            "sagittal" => Ok(Self::Sagittal),
            "coronal" => Ok(Self::Coronal),
            "oblique" => Ok(Self::Oblique),
            _ => Err(CoreError::UnsupportedOperation(format!("未知平面 `{s}`"))),
        }
    }
}

/// 影像所属的患者, 检查与序列.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageIdentity {
    /// 患者 id.
    pub patient_id: String,
    /// 检查实例 UID.
    pub study_instance_uid: String,
    /// 序列实例 UID. 影像的唯一标识.
    pub series_instance_uid: String,
}

impl ImageIdentity {
    /// 构建标识.
    pub fn new(
        patient_id: impl Into<String>,
        study_instance_uid: impl Into<String>,
        series_instance_uid: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            study_instance_uid: study_instance_uid.into(),
            series_instance_uid: series_instance_uid.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.patient_id.trim().is_empty() {
            return Err(CoreError::Validation("患者 id 不能为空".to_owned()));
        }
        for (name, uid) in [
            ("study_instance_uid", &self.study_instance_uid),
            ("series_instance_uid", &self.series_instance_uid),
        ] {
            if uid.trim().is_empty() {
                return Err(CoreError::Validation(format!("{name} 不能为空")));
            }
            if !uid.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(CoreError::Validation(format!(
                    "{name} `{uid}` 只能包含数字和 `.`"
                )));
            }
        }
        Ok(())
    }
}

/// 整幅影像的强度统计.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageIntensityStatistics {
    /// 最小值.
    pub min: f64,
    /// 最大值.
    pub max: f64,
    /// 均值.
    pub mean: f64,
    /// 总体标准差.
    pub std: f64,
    /// 中位数.
    pub median: f64,
}

/// 某个平面上单张切片的几何信息.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SliceGeometry {
    /// 切片内像素间距 `(水平, 垂直)`, 毫米.
    pub pixel_spacing: (f64, f64),
    /// 层厚, 毫米.
    pub slice_thickness: f64,
    /// 切片尺寸 `(宽, 高)`, 像素.
    pub dimensions: Idx2d,
    /// 切片沿法向的物理位置, 毫米.
    pub position: f64,
}

/// 二维或三维医学影像.
///
/// 强度数组构造后不可变, 只能通过只读视图访问; 克隆影像只增加引用计数.
/// 三维数组按 `(层, 高, 宽)`, 二维数组按 `(高, 宽)` 排列.
/// 唯一可变的状态是当前显示窗.
#[derive(Debug, Clone)]
pub struct MedicalImage {
    data: ArcArray<f32, IxDyn>,
    spacing: ImageSpacing,
    modality: Modality,
    identity: ImageIdentity,
    acquisition_date: DateTime<Utc>,
    metadata: HashMap<String, String>,
    default_window_level: WindowLevel,
    current_window_level: WindowLevel,
}

impl MedicalImage {
    /// 构建影像, 校验秩, 非空, 有限值和身份标识.
    ///
    /// 当前显示窗初始化为模态默认窗.
    pub fn new(
        data: ArrayD<f32>,
        spacing: ImageSpacing,
        modality: Modality,
        identity: ImageIdentity,
        acquisition_date: DateTime<Utc>,
    ) -> Result<Self> {
        if !(2..=3).contains(&data.ndim()) {
            return Err(CoreError::Validation(format!(
                "影像必须是二维或三维, 实际为 {} 维",
                data.ndim()
            )));
        }
        if data.is_empty() {
            return Err(CoreError::Validation("影像数组不能为空".to_owned()));
        }
        if let Some(v) = data.iter().find(|v| !v.is_finite()) {
            return Err(CoreError::Validation(format!("影像包含非有限值 {v}")));
        }
        identity.validate()?;

        let default_window_level = default_window_level(modality, &data.view());
        debug!(
            "载入影像 {} ({modality}), 形状 {:?}, 默认窗 {:?}",
            identity.series_instance_uid,
            data.shape(),
            default_window_level
        );

        Ok(Self {
            data: data.into_shared(),
            spacing,
            modality,
            identity,
            acquisition_date,
            metadata: HashMap::new(),
            default_window_level,
            current_window_level: default_window_level,
        })
    }

    /// 由任意可转换为 `f32` 的数组构建影像.
    ///
    /// 强度统一以 `f32` 存储: 绝对值超过 `2^24` 的整数以及 `f64` 的多余精度
    /// 会按 `f32` 舍入 (例如 `16_777_217` 变为 `16_777_216`).
    /// 元素无法转换或不是有限值时返回 `Err(CoreError::Validation)`.
    pub fn from_array<S, D>(
        array: &ArrayBase<S, D>,
        spacing: ImageSpacing,
        modality: Modality,
        identity: ImageIdentity,
        acquisition_date: DateTime<Utc>,
    ) -> Result<Self>
    where
        S: Data,
        S::Elem: ToPrimitive,
        D: Dimension,
    {
        let values = array
            .iter()
            .map(|v| v.to_f32().filter(|f| f.is_finite()))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| CoreError::Validation("影像包含无法表示为有限 f32 的值".to_owned()))?;
        let data = ArrayD::from_shape_vec(IxDyn(array.shape()), values)
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Self::new(data, spacing, modality, identity, acquisition_date)
    }

    /// 附加元数据 (DICOM 标签名 -> 值).
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// 强度数组的只读视图.
    #[inline]
    pub fn data(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// 三维强度数组的只读视图. 二维影像返回 `None`.
    #[inline]
    pub fn volume(&self) -> Option<ArrayView3<'_, f32>> {
        self.data.view().into_dimensionality::<Ix3>().ok()
    }

    /// 数组形状.
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        self.data.shape()
    }

    /// 维数, 2 或 3.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    #[inline]
    pub fn spacing(&self) -> ImageSpacing {
        self.spacing
    }

    #[inline]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    #[inline]
    pub fn identity(&self) -> &ImageIdentity {
        &self.identity
    }

    #[inline]
    pub fn patient_id(&self) -> &str {
        &self.identity.patient_id
    }

    #[inline]
    pub fn study_instance_uid(&self) -> &str {
        &self.identity.study_instance_uid
    }

    #[inline]
    pub fn series_instance_uid(&self) -> &str {
        &self.identity.series_instance_uid
    }

    #[inline]
    pub fn acquisition_date(&self) -> DateTime<Utc> {
        self.acquisition_date
    }

    #[inline]
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// 查找 DICOM 标签. 标签不存在时返回 `None`.
    #[inline]
    pub fn get_dicom_tag(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }

    /// 合并元数据, 同名标签被覆盖.
    pub fn merge_metadata(&mut self, tags: HashMap<String, String>) {
        self.metadata.extend(tags);
    }

    /// 当前显示窗.
    #[inline]
    pub fn current_window_level(&self) -> WindowLevel {
        self.current_window_level
    }

    /// 模态默认显示窗.
    #[inline]
    pub fn default_window_level(&self) -> WindowLevel {
        self.default_window_level
    }

    /// 设置当前显示窗. 窗宽非正 (或为 NaN) 时返回 `Err(CoreError::Validation)`, 不修改状态.
    pub fn set_window_level(&mut self, window: f64, level: f64) -> Result<()> {
        if !(window > 0.0) {
            return Err(CoreError::Validation(format!(
                "窗宽必须为正, 实际为 {window}"
            )));
        }
        self.current_window_level = WindowLevel::new(window, level);
        Ok(())
    }

    /// 原样恢复先前保存的显示窗, 不做窗宽校验.
    ///
    /// 常数强度的非 CT 影像默认窗宽为 0, 这样的窗也必须能被还原.
    #[cfg(feature = "serde")]
    #[inline]
    pub(crate) fn restore_window_level(&mut self, wl: WindowLevel) {
        self.current_window_level = wl;
    }

    /// 恢复模态默认显示窗.
    #[inline]
    pub fn reset_window_level(&mut self) {
        self.current_window_level = self.default_window_level;
    }

    /// 将当前显示窗设置为模态预设窗, 并返回该窗.
    pub fn apply_preset(&mut self, name: PresetName) -> Result<WindowLevel> {
        let wl = WindowLevel::preset(self.modality, name)?;
        self.set_window_level(wl.window(), wl.level())?;
        Ok(wl)
    }

    /// 提取 `plane` 平面上第 `index` 张切片, 返回只读视图.
    ///
    /// 只支持三维影像的轴位, 冠状和矢状面. 二维影像或斜切面返回
    /// `Err(CoreError::UnsupportedOperation)`; 索引越界返回 `Err(CoreError::IndexRange)`.
    pub fn get_slice(&self, plane: ImagePlane, index: usize) -> Result<ArrayView2<'_, f32>> {
        plane_slice(self.data(), plane, index)
    }

    /// 以 `window_level` (缺省为当前显示窗) 映射后的切片, 值域 `[0, 1]`.
    pub fn display_slice(
        &self,
        plane: ImagePlane,
        index: usize,
        window_level: Option<WindowLevel>,
    ) -> Result<Array2<f32>> {
        let slice = self.get_slice(plane, index)?;
        let wl = window_level.unwrap_or(self.current_window_level);
        Ok(wl.apply_to_array(&slice))
    }

    /// 物理尺寸 `(宽, 高, 深)`, 毫米. 二维影像深度为 `0`.
    pub fn get_physical_dimensions(&self) -> (f64, f64, f64) {
        let s = self.spacing;
        match *self.dimensions() {
            [d, h, w] => (w as f64 * s.x(), h as f64 * s.y(), d as f64 * s.z()),
            [h, w] => (w as f64 * s.x(), h as f64 * s.y(), 0.0),
            _ => unreachable!("rank is validated on construction"),
        }
    }

    /// 整幅影像的强度统计.
    pub fn get_intensity_statistics(&self) -> ImageIntensityStatistics {
        let values = self.values();
        let mean = stats::mean(&values);
        let (min, max) = min_max(&self.data.view());
        ImageIntensityStatistics {
            min,
            max,
            mean,
            std: stats::std(&values, mean),
            median: stats::median_sorted(&stats::sorted(&values)),
        }
    }

    /// 由强度百分位数估计显示窗, 不修改当前窗.
    ///
    /// 窗宽为两个百分位数之差, 窗位为其中点. 窗宽小于 1 时改用三倍标准差.
    pub fn optimal_window_level(&self, low_pct: f64, high_pct: f64) -> Result<WindowLevel> {
        if !(0.0 <= low_pct && low_pct < high_pct && high_pct <= 100.0) {
            return Err(CoreError::Validation(format!(
                "百分位数必须满足 0 <= low < high <= 100, 实际为 ({low_pct}, {high_pct})"
            )));
        }
        let values = self.values();
        let sorted = stats::sorted(&values);
        let lo = stats::percentile_sorted(&sorted, low_pct);
        let hi = stats::percentile_sorted(&sorted, high_pct);
        let mut window = hi - lo;
        let level = (lo + hi) / 2.0;
        if window < 1.0 {
            let mean = stats::mean(&values);
            window = stats::std(&values, mean) * 3.0;
        }
        Ok(WindowLevel::new(window, level))
    }

    /// `plane` 平面上的切片总数.
    pub fn total_slices(&self, plane: ImagePlane) -> Result<usize> {
        let volume = self.volume().ok_or_else(|| {
            CoreError::UnsupportedOperation("切片计数需要三维影像".to_owned())
        })?;
        let axis = plane.axis().ok_or_else(|| {
            CoreError::UnsupportedOperation(format!("不支持 {plane} 切片计数"))
        })?;
        Ok(volume.len_of(Axis(axis)))
    }

    /// `plane` 平面上第 `index` 张切片的几何信息.
    pub fn slice_geometry(&self, plane: ImagePlane, index: usize) -> Result<SliceGeometry> {
        let total = self.total_slices(plane)?;
        if index >= total {
            return Err(CoreError::IndexRange {
                axis: plane.as_str(),
                index,
                max: total - 1,
            });
        }
        let s = self.spacing;
        let (d, h, w) = match *self.dimensions() {
            [d, h, w] => (d, h, w),
            _ => unreachable!("checked by total_slices"),
        };
        let i = index as f64;
        let geometry = match plane {
            ImagePlane::Axial => SliceGeometry {
                pixel_spacing: (s.x(), s.y()),
                slice_thickness: s.z(),
                dimensions: (w, h),
                position: i * s.z(),
            },
            ImagePlane::Sagittal => SliceGeometry {
                pixel_spacing: (s.y(), s.z()),
                slice_thickness: s.x(),
                dimensions: (h, d),
                position: i * s.x(),
            },
            ImagePlane::Coronal => SliceGeometry {
                pixel_spacing: (s.x(), s.z()),
                slice_thickness: s.y(),
                dimensions: (w, d),
                position: i * s.y(),
            },
            ImagePlane::Oblique => unreachable!("checked by total_slices"),
        };
        Ok(geometry)
    }

    /// 每个方向每隔 `factor` 个体素取一个, 返回降采样数组和相应放大的间距.
    ///
    /// 只支持三维影像. `factor == 0` 时返回 `Err(CoreError::Validation)`.
    pub fn downsampled(&self, factor: usize) -> Result<(Array3<f32>, ImageSpacing)> {
        if factor == 0 {
            return Err(CoreError::Validation("降采样倍数必须至少为 1".to_owned()));
        }
        let volume = self
            .volume()
            .ok_or_else(|| CoreError::UnsupportedOperation("降采样需要三维影像".to_owned()))?;
        let step = factor as isize;
        let out = volume
            .slice_each_axis(|_| Slice::new(0, None, step))
            .to_owned();
        Ok((out, self.spacing.scaled(factor)))
    }

    fn values(&self) -> Vec<f64> {
        self.data.iter().map(|&v| v as f64).collect()
    }
}

/// 从三维数组中取出 `plane` 平面上第 `index` 张切片. 影像与掩膜共用.
pub(crate) fn plane_slice<A>(
    data: ArrayViewD<'_, A>,
    plane: ImagePlane,
    index: usize,
) -> Result<ArrayView2<'_, A>> {
    let ndim = data.ndim();
    let volume = data.into_dimensionality::<Ix3>().map_err(|_| {
        CoreError::UnsupportedOperation(format!("切片提取需要三维数据, 实际为 {ndim} 维"))
    })?;
    let axis = plane
        .axis()
        .ok_or_else(|| CoreError::UnsupportedOperation(format!("不支持提取 {plane} 切片")))?;
    let len = volume.len_of(Axis(axis));
    if index >= len {
        return Err(CoreError::IndexRange {
            axis: plane.as_str(),
            index,
            max: len - 1,
        });
    }
    Ok(volume.index_axis_move(Axis(axis), index))
}

fn min_max(data: &ArrayViewD<'_, f32>) -> (f64, f64) {
    let (lo, hi) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    (lo as f64, hi as f64)
}

/// 模态默认显示窗. CT 使用软组织窗; 其它模态以强度范围的中点为窗位,
/// MRI 取范围的 80% 为窗宽, 其余取整个范围.
fn default_window_level(modality: Modality, data: &ArrayViewD<'_, f32>) -> WindowLevel {
    if modality == Modality::Ct {
        return WindowLevel::new(ct::DEFAULT_WINDOW, ct::DEFAULT_LEVEL);
    }
    let (min, max) = min_max(data);
    let ratio = if modality == Modality::Mri { 0.8 } else { 1.0 };
    WindowLevel::new((max - min) * ratio, (max + min) / 2.0)
}

/// 外部加载的影像必须满足的条件: 每个维度至少 [`MIN_LOADED_DIM`] 个体素,
/// 且强度不全相同.
pub fn validate_loaded_image(image: &MedicalImage) -> Result<()> {
    if let Some(&dim) = image.dimensions().iter().find(|&&d| d < MIN_LOADED_DIM) {
        return Err(CoreError::Validation(format!(
            "影像形状 {:?} 过小: 维度 {dim} < {MIN_LOADED_DIM}",
            image.dimensions()
        )));
    }
    let (min, max) = min_max(&image.data());
    if min == max {
        return Err(CoreError::Validation(format!(
            "影像强度全部为 {min}, 没有可用信息"
        )));
    }
    Ok(())
}

/// 前列腺分析的前置条件: 模态为 MRI 或 CT, 形状与 [`MIN_PROSTATE_DIMS`]
/// 逐轴比较 (二维影像只比较前两轴) 均不小于下限, 若记录了非空的检查部位
/// 则必须包含 pelvis 或 prostate.
pub fn validate_prostate_image(image: &MedicalImage) -> Result<()> {
    if !matches!(image.modality(), Modality::Mri | Modality::Ct) {
        return Err(CoreError::Validation(format!(
            "前列腺分析需要 MRI 或 CT, 实际为 {}",
            image.modality()
        )));
    }
    let dims = image.dimensions();
    let too_small = dims.iter().zip(MIN_PROSTATE_DIMS).any(|(&d, min)| d < min);
    if too_small {
        return Err(CoreError::Validation(format!(
            "前列腺分析需要形状至少为 {MIN_PROSTATE_DIMS:?}, 实际为 {dims:?}"
        )));
    }
    let body_part = image
        .get_dicom_tag(tag::BODY_PART_EXAMINED)
        .filter(|b| !b.is_empty());
    if let Some(body_part) = body_part {
        let lower = body_part.to_lowercase();
        if !(lower.contains("pelvis") || lower.contains("prostate")) {
            return Err(CoreError::Validation(format!(
                "检查部位 `{body_part}` 不是盆腔或前列腺"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::{stack, Array, Array3};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn identity() -> ImageIdentity {
        ImageIdentity::new("P001", "1.2.840.1", "1.2.840.1.1")
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    /// `(d, h, w)` 体数据, 值为行优先线性索引.
    fn ramp(d: usize, h: usize, w: usize) -> ArrayD<f32> {
        Array::from_shape_fn((d, h, w), |(z, y, x)| ((z * h + y) * w + x) as f32).into_dyn()
    }

    fn image(data: ArrayD<f32>, modality: Modality) -> MedicalImage {
        let spacing = ImageSpacing::new(0.5, 0.5, 3.0).unwrap();
        MedicalImage::new(data, spacing, modality, identity(), date()).unwrap()
    }

    #[test]
    fn test_construction_validation() {
        let spacing = ImageSpacing::unit();
        let bad_rank = Array::<f32, _>::zeros(4).into_dyn();
        assert!(matches!(
            MedicalImage::new(bad_rank, spacing, Modality::Ct, identity(), date()),
            Err(CoreError::Validation(_))
        ));
        let empty = Array::<f32, _>::zeros((0, 4, 4)).into_dyn();
        assert!(matches!(
            MedicalImage::new(empty, spacing, Modality::Ct, identity(), date()),
            Err(CoreError::Validation(_))
        ));
        for id in [
            ImageIdentity::new("  ", "1.2", "1.2.3"),
            ImageIdentity::new("P", "", "1.2.3"),
            ImageIdentity::new("P", "1.2", "1.2.a"),
        ] {
            assert!(matches!(
                MedicalImage::new(ramp(2, 2, 2), spacing, Modality::Ct, id, date()),
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_from_array_generic() {
        let raw = Array3::<i16>::from_elem((2, 3, 4), -1000);
        let img = MedicalImage::from_array(
            &raw,
            ImageSpacing::unit(),
            Modality::Ct,
            identity(),
            date(),
        )
        .unwrap();
        assert_eq!(img.dimensions(), &[2, 3, 4]);
        assert!(img.data().iter().all(|&v| v == -1000.0));

        let nan = Array3::<f64>::from_elem((2, 2, 2), f64::NAN);
        assert!(MedicalImage::from_array(
            &nan,
            ImageSpacing::unit(),
            Modality::Ct,
            identity(),
            date()
        )
        .is_err());

        let big = Array3::<i32>::from_elem((1, 2, 2), 16_777_217);
        let img =
            MedicalImage::from_array(&big, ImageSpacing::unit(), Modality::Ct, identity(), date())
                .unwrap();
        assert!(img.data().iter().all(|&v| v == 16_777_216.0));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let mut data = ramp(2, 2, 2);
        data[[1, 1, 1]] = f32::NAN;
        assert!(matches!(
            MedicalImage::new(data, ImageSpacing::unit(), Modality::Mri, identity(), date()),
            Err(CoreError::Validation(_))
        ));
        let mut data = ramp(2, 2, 2);
        data[[0, 0, 0]] = f32::INFINITY;
        assert!(MedicalImage::new(data, ImageSpacing::unit(), Modality::Mri, identity(), date())
            .is_err());
    }

    #[test]
    fn test_default_window_levels() {
        let ct = image(ramp(2, 5, 10), Modality::Ct);
        assert_eq!(ct.current_window_level(), WindowLevel::new(400.0, 40.0));

        // 强度范围 [0, 99]
        let mri = image(ramp(2, 5, 10), Modality::Mri);
        let wl = mri.current_window_level();
        assert!(f64_eq(wl.window(), 99.0 * 0.8));
        assert!(f64_eq(wl.level(), 49.5));

        let us = image(ramp(2, 5, 10), Modality::Ultrasound);
        assert!(f64_eq(us.current_window_level().window(), 99.0));
    }

    #[test]
    fn test_set_and_reset_window_level() {
        let mut img = image(ramp(2, 5, 10), Modality::Ct);
        img.set_window_level(1500.0, 300.0).unwrap();
        assert_eq!(img.current_window_level(), WindowLevel::new(1500.0, 300.0));
        assert!(matches!(
            img.set_window_level(0.0, 10.0),
            Err(CoreError::Validation(_))
        ));
        assert!(img.set_window_level(-5.0, 10.0).is_err());
        assert_eq!(img.current_window_level(), WindowLevel::new(1500.0, 300.0));
        img.reset_window_level();
        assert_eq!(img.current_window_level(), WindowLevel::new(400.0, 40.0));

        let lung = img.apply_preset(PresetName::Lung).unwrap();
        assert_eq!(img.current_window_level(), lung);
        assert!(img.apply_preset(PresetName::T2).is_err());
        assert_eq!(img.current_window_level(), lung);
    }

    #[test]
    fn test_get_slice() {
        let img = image(ramp(4, 5, 6), Modality::Mri);
        let axial = img.get_slice(ImagePlane::Axial, 2).unwrap();
        assert_eq!(axial.shape(), &[5, 6]);
        assert_eq!(axial[[1, 3]], ((2 * 5 + 1) * 6 + 3) as f32);

        let coronal = img.get_slice(ImagePlane::Coronal, 4).unwrap();
        assert_eq!(coronal.shape(), &[4, 6]);
        assert_eq!(coronal[[3, 0]], ((3 * 5 + 4) * 6) as f32);

        let sagittal = img.get_slice(ImagePlane::Sagittal, 5).unwrap();
        assert_eq!(sagittal.shape(), &[4, 5]);

        assert_eq!(
            img.get_slice(ImagePlane::Axial, 4),
            Err(CoreError::IndexRange {
                axis: "axial",
                index: 4,
                max: 3
            })
        );
        assert!(matches!(
            img.get_slice(ImagePlane::Oblique, 0),
            Err(CoreError::UnsupportedOperation(_))
        ));

        let flat = image(Array::from_elem((8, 8), 1.0f32).into_dyn(), Modality::Xray);
        assert!(matches!(
            flat.get_slice(ImagePlane::Axial, 0),
            Err(CoreError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_axial_restack() {
        let data = ramp(3, 4, 5);
        let img = image(data.clone(), Modality::Ct);
        let n = img.total_slices(ImagePlane::Axial).unwrap();
        let slices: Vec<_> = (0..n)
            .map(|i| img.get_slice(ImagePlane::Axial, i).unwrap())
            .collect();
        let restacked = stack(Axis(0), &slices).unwrap();
        assert_eq!(restacked.into_dyn(), data);
    }

    #[test]
    fn test_physical_dimensions() {
        let img = image(ramp(10, 20, 30), Modality::Mri);
        assert_eq!(img.get_physical_dimensions(), (15.0, 10.0, 30.0));
        let flat = image(Array::from_elem((8, 6), 1.0f32).into_dyn(), Modality::Xray);
        assert_eq!(flat.get_physical_dimensions(), (3.0, 4.0, 0.0));
    }

    #[test]
    fn test_intensity_statistics() {
        let data = Array::from_shape_vec((2, 2), vec![1.0f32, 2.0, 3.0, 4.0])
            .unwrap()
            .into_dyn();
        let s = image(data, Modality::Pet).get_intensity_statistics();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!(f64_eq(s.mean, 2.5));
        assert!(f64_eq(s.std, 1.25f64.sqrt()));
        assert!(f64_eq(s.median, 2.5));
    }

    #[test]
    fn test_display_slice() {
        let img = image(ramp(2, 2, 2), Modality::Mri);
        let out = img
            .display_slice(ImagePlane::Axial, 1, Some(WindowLevel::new(4.0, 6.0)))
            .unwrap();
        // 第二层值为 4..8, 显示范围 [4, 8].
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[1, 1]], 0.75);
    }

    #[test]
    fn test_slice_geometry() {
        let img = image(ramp(10, 20, 30), Modality::Mri);
        let axial = img.slice_geometry(ImagePlane::Axial, 4).unwrap();
        assert_eq!(axial.pixel_spacing, (0.5, 0.5));
        assert_eq!(axial.slice_thickness, 3.0);
        assert_eq!(axial.dimensions, (30, 20));
        assert!(f64_eq(axial.position, 12.0));

        let sagittal = img.slice_geometry(ImagePlane::Sagittal, 2).unwrap();
        assert_eq!(sagittal.pixel_spacing, (0.5, 3.0));
        assert_eq!(sagittal.dimensions, (20, 10));
        assert!(f64_eq(sagittal.position, 1.0));

        let coronal = img.slice_geometry(ImagePlane::Coronal, 0).unwrap();
        assert_eq!(coronal.dimensions, (30, 10));
        assert_eq!(img.total_slices(ImagePlane::Sagittal).unwrap(), 30);
        assert!(img.slice_geometry(ImagePlane::Coronal, 20).is_err());
    }

    #[test]
    fn test_optimal_window_level() {
        let img = image(ramp(1, 10, 10), Modality::Mri);
        let wl = img.optimal_window_level(0.0, 100.0).unwrap();
        assert!(f64_eq(wl.window(), 99.0));
        assert!(f64_eq(wl.level(), 49.5));
        assert!(img.optimal_window_level(60.0, 40.0).is_err());

        // 窗宽 < 1 时退回三倍标准差.
        let mut values = vec![5.0f32; 100];
        values[0] = 0.0;
        let data = Array::from_shape_vec((1, 10, 10), values).unwrap().into_dyn();
        let wl = image(data, Modality::Mri)
            .optimal_window_level(1.0, 99.0)
            .unwrap();
        assert!(wl.window() > 0.0 && wl.window() < 3.0);
    }

    #[test]
    fn test_downsampled() {
        let img = image(ramp(5, 6, 7), Modality::Ct);
        let (small, spacing) = img.downsampled(2).unwrap();
        assert_eq!(small.shape(), &[3, 3, 4]);
        assert_eq!(small[[1, 1, 1]], ((2 * 6 + 2) * 7 + 2) as f32);
        assert_eq!(spacing, ImageSpacing::new(1.0, 1.0, 6.0).unwrap());
        assert!(img.downsampled(0).is_err());
    }

    #[test]
    fn test_validate_loaded_image() {
        assert!(validate_loaded_image(&image(ramp(32, 32, 32), Modality::Ct)).is_ok());
        assert!(validate_loaded_image(&image(ramp(8, 32, 32), Modality::Ct)).is_err());
        let flat = Array::from_elem((32, 32, 32), 7.0f32).into_dyn();
        assert!(validate_loaded_image(&image(flat, Modality::Ct)).is_err());
    }

    #[test]
    fn test_validate_prostate_image() {
        let ok = image(ramp(64, 64, 8), Modality::Mri);
        assert!(validate_prostate_image(&ok).is_ok());
        assert!(validate_prostate_image(&image(ramp(64, 64, 8), Modality::Pet)).is_err());
        assert!(validate_prostate_image(&image(ramp(8, 64, 64), Modality::Mri)).is_err());

        let mut tags = HashMap::new();
        tags.insert(tag::BODY_PART_EXAMINED.to_owned(), "CHEST".to_owned());
        let chest = image(ramp(64, 64, 8), Modality::Ct).with_metadata(tags);
        assert_eq!(chest.get_dicom_tag(tag::BODY_PART_EXAMINED), Some("CHEST"));
        assert!(validate_prostate_image(&chest).is_err());

        let mut tags = HashMap::new();
        tags.insert(tag::BODY_PART_EXAMINED.to_owned(), "Pelvis".to_owned());
        let pelvis = image(ramp(64, 64, 8), Modality::Ct).with_metadata(tags);
        assert!(validate_prostate_image(&pelvis).is_ok());

        let mut tags = HashMap::new();
        tags.insert(tag::BODY_PART_EXAMINED.to_owned(), String::new());
        let untagged = image(ramp(64, 64, 8), Modality::Mri).with_metadata(tags);
        assert!(validate_prostate_image(&untagged).is_ok());
    }

    #[test]
    fn test_validate_prostate_image_2d() {
        let planar = |h, w| {
            let data = Array::from_shape_fn((h, w), |(y, x)| (y * w + x) as f32).into_dyn();
            image(data, Modality::Mri)
        };
        assert!(validate_prostate_image(&planar(64, 64)).is_ok());
        assert!(validate_prostate_image(&planar(64, 32)).is_err());
    }

    #[test]
    fn test_modality_codes() {
        for m in [
            Modality::Ct,
            Modality::Mri,
            Modality::Ultrasound,
            Modality::Xray,
            Modality::Pet,
        ] {
            assert_eq!(m.code().parse::<Modality>().unwrap(), m);
        }
        assert_eq!("sagittal".parse::<ImagePlane>().unwrap(), ImagePlane::Sagittal);
        assert!("diagonal".parse::<ImagePlane>().is_err());
    }
}
