use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array, ArrayBase, Data, Dimension};
use once_cell::sync::Lazy;

use super::Modality;
use crate::error::{CoreError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 显示窗, 包含窗宽 (window) 和窗位 (level).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
/// 构造时不做任何校验; 面向用户的入口 ([`crate::MedicalImage::set_window_level`])
/// 负责拒绝非正窗宽.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowLevel {
    window: f64,
    level: f64,
}

impl WindowLevel {
    /// 直接构建显示窗.
    #[inline]
    pub const fn new(window: f64, level: f64) -> Self {
        Self { window, level }
    }

    /// 窗宽.
    #[inline]
    pub fn window(&self) -> f64 {
        self.window
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f64 {
        self.level
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f64 {
        self.level - self.window / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f64 {
        self.level + self.window / 2.0
    }

    /// 显示范围 `(下限, 上限)`.
    #[inline]
    pub fn display_range(&self) -> (f64, f64) {
        (self.lower_bound(), self.upper_bound())
    }

    /// 将单个强度值截断到显示范围内, 并线性映射到 `[0, 1]`.
    ///
    /// 上下限相等时恒返回 `0.0`. `NaN` 原样传播.
    pub fn apply(&self, value: f64) -> f64 {
        let (lb, ub) = self.display_range();
        if value.is_nan() {
            return f64::NAN;
        }
        if ub == lb {
            return 0.0;
        }
        // 与先 max 再 min 的截断顺序保持一致, 上下限颠倒时结果为上限.
        let clipped = value.max(lb).min(ub);
        (clipped - lb) / (ub - lb)
    }

    /// 对整个数组逐元素执行 [`Self::apply`], 返回新数组. 输入不会被修改.
    pub fn apply_to_array<S, D>(&self, array: &ArrayBase<S, D>) -> Array<f32, D>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        let (lb, ub) = self.display_range();
        if ub == lb {
            return Array::zeros(array.raw_dim());
        }
        array.mapv(|v| self.apply(v as f64) as f32)
    }

    /// 求当前窗设置下 `value` 对应的 8-bit 灰度值 (0 <= value <= 255).
    ///
    /// 如果 `value` 无意义 (如 NaN), 则返回 `None`.
    pub fn eval_u8(&self, value: f32) -> Option<u8> {
        let v = self.apply(value as f64);
        // 255, not 256.
        (!v.is_nan()).then(|| (v * 255.0) as u8)
    }

    /// 查找 `modality` 下名为 `name` 的预设窗.
    ///
    /// 预设表中没有该组合时返回 `Err(CoreError::UnsupportedOperation)`.
    pub fn preset(modality: Modality, name: PresetName) -> Result<Self> {
        PRESETS.get(&(modality, name)).copied().ok_or_else(|| {
            CoreError::UnsupportedOperation(format!(
                "模态 {modality} 没有预设窗 `{name}`, 可用预设: {:?}",
                Self::available_presets(modality)
            ))
        })
    }

    /// 获取 `modality` 可用的全部预设名, 按 [`PresetName::ALL`] 的顺序.
    pub fn available_presets(modality: Modality) -> Vec<PresetName> {
        PresetName::ALL
            .into_iter()
            .filter(|n| PRESETS.contains_key(&(modality, *n)))
            .collect()
    }
}

/// 预设窗名称.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PresetName {
    /// 软组织窗.
    SoftTissue,
    /// 骨窗.
    Bone,
    /// 肺窗.
    Lung,
    /// 脑窗.
    Brain,
    /// 肝窗.
    Liver,
    /// T1 加权.
    T1,
    /// T2 加权.
    T2,
    /// FLAIR.
    Flair,
    /// 弥散加权.
    Dwi,
}

impl PresetName {
    /// 全部预设名.
    pub const ALL: [PresetName; 9] = [
        Self::SoftTissue,
        Self::Bone,
        Self::Lung,
        Self::Brain,
        Self::Liver,
        Self::T1,
        Self::T2,
        Self::Flair,
        Self::Dwi,
    ];

    /// 字符串形式.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SoftTissue => "soft_tissue",
            Self::Bone => "bone",
            Self::Lung => "lung",
            Self::Brain => "brain",
            Self::Liver => "liver",
            Self::T1 => "t1",
            Self::T2 => "t2",
            Self::Flair => "flair",
            Self::Dwi => "dwi",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedOperation(format!("未知预设窗 `{s}`")))
    }
}

/// (模态, 预设名) -> 显示窗.
static PRESETS: Lazy<HashMap<(Modality, PresetName), WindowLevel>> = Lazy::new(|| {
    use Modality::*;
    use PresetName::*;

    HashMap::from([
        ((Ct, SoftTissue), WindowLevel::new(400.0, 40.0)),
        ((Ct, Bone), WindowLevel::new(1500.0, 300.0)),
        ((Ct, Lung), WindowLevel::new(1600.0, -600.0)),
        ((Ct, Brain), WindowLevel::new(100.0, 40.0)),
        ((Ct, Liver), WindowLevel::new(150.0, 60.0)),
        ((Mri, T1), WindowLevel::new(600.0, 300.0)),
        ((Mri, T2), WindowLevel::new(1000.0, 500.0)),
        ((Mri, Flair), WindowLevel::new(800.0, 400.0)),
        ((Mri, Dwi), WindowLevel::new(1200.0, 600.0)),
    ])
});

#[cfg(test)]
mod tests {
    use super::{PresetName, WindowLevel};
    use crate::{CoreError, Modality};
    use ndarray::{array, Array1};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_display_range() {
        let wl = WindowLevel::new(400.0, 40.0);
        assert_eq!(wl.display_range(), (-160.0, 240.0));
    }

    #[test]
    fn test_apply_to_array_generic() {
        // [-160, 240]
        let wl = WindowLevel::new(400.0, 40.0);
        let a = array![[-1000.0f32, -160.0, 40.0], [140.0, 240.0, 3000.0]];
        let out = wl.apply_to_array(&a);
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[0, 1]], 0.0);
        assert_eq!(out[[0, 2]], 0.5);
        assert_eq!(out[[1, 0]], 0.75);
        assert_eq!(out[[1, 1]], 1.0);
        assert_eq!(out[[1, 2]], 1.0);
        // 输入不变
        assert_eq!(a[[0, 0]], -1000.0);
    }

    #[test]
    fn test_level_maps_to_half() {
        for (w, l) in [(400.0, 40.0), (1.0, 0.0), (2000.0, -1000.0), (8.0, 3.0)] {
            let wl = WindowLevel::new(w, l);
            let values = Array1::from(vec![l as f32, (l - w) as f32, (l + w) as f32]);
            let out = wl.apply_to_array(&values);
            assert_eq!(out[0], 0.5);
            assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_degenerate_window() {
        let wl = WindowLevel::new(0.0, 10.0);
        let out = wl.apply_to_array(&array![1.0f32, 10.0, 100.0]);
        assert!(out.iter().all(|&v| v == 0.0));
        assert!(f64_eq(wl.apply(100.0), 0.0));
    }

    #[test]
    fn test_eval_u8() {
        let wl = WindowLevel::new(40.0, 80.0);
        assert_eq!(wl.eval_u8(f32::NAN), None);
        assert_eq!(wl.eval_u8(f32::MIN), Some(0));
        assert_eq!(wl.eval_u8(f32::MAX), Some(255));
        assert_eq!(wl.eval_u8(70.0), Some((255.0 * 0.25) as u8));
        assert_eq!(wl.eval_u8(100.0), Some(255));
    }

    #[test]
    fn test_presets() {
        let bone = WindowLevel::preset(Modality::Ct, PresetName::Bone).unwrap();
        assert_eq!(bone, WindowLevel::new(1500.0, 300.0));
        assert_eq!(
            WindowLevel::available_presets(Modality::Mri),
            vec![
                PresetName::T1,
                PresetName::T2,
                PresetName::Flair,
                PresetName::Dwi
            ]
        );
        assert!(WindowLevel::available_presets(Modality::Pet).is_empty());
        assert!(matches!(
            WindowLevel::preset(Modality::Mri, PresetName::Lung),
            Err(CoreError::UnsupportedOperation(_))
        ));
        assert_eq!("t2".parse::<PresetName>().unwrap(), PresetName::T2);
        assert!("t3".parse::<PresetName>().is_err());
    }
}
