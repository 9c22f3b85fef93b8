//! 体素物理间距.

use crate::consts::ISOTROPIC_TOLERANCE;
use crate::error::{CoreError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 相邻体素中心之间的物理距离, 以毫米为单位.
///
/// `x` 对应数组最后一维 (宽), `y` 对应倒数第二维 (高), `z` 对应三维数组的第一维 (层).
/// 三个分量都必须是正的有限值.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageSpacing {
    x: f64,
    y: f64,
    z: f64,
}

impl ImageSpacing {
    /// 构建间距. 任一分量非正或非有限时返回 `Err(CoreError::Validation)`.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self> {
        for (name, v) in [("x", x), ("y", y), ("z", z)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CoreError::Validation(format!(
                    "间距分量 {name} 必须为正有限值, 实际为 {v}"
                )));
            }
        }
        Ok(Self { x, y, z })
    }

    /// 各向同性的单位间距 (1mm, 1mm, 1mm).
    #[inline]
    pub const fn unit() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }

    /// 宽方向间距.
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// 高方向间距.
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// 层方向间距 (层厚).
    #[inline]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// 单个体素的体积, 以立方毫米为单位.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// 以默认容差判断是否各向同性.
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        self.is_isotropic_within(ISOTROPIC_TOLERANCE)
    }

    /// 三个分量两两之差的绝对值都严格小于 `tolerance` 时认为各向同性.
    pub fn is_isotropic_within(&self, tolerance: f64) -> bool {
        (self.x - self.y).abs() < tolerance
            && (self.y - self.z).abs() < tolerance
            && (self.x - self.z).abs() < tolerance
    }

    /// 每个分量乘以 `factor`. 用于降采样后的间距.
    pub fn scaled(&self, factor: usize) -> Self {
        debug_assert!(factor >= 1);
        let f = factor as f64;
        Self {
            x: self.x * f,
            y: self.y * f,
            z: self.z * f,
        }
    }

    /// 平均体素面面积: 三个两两乘积的算术平均.
    #[inline]
    pub(crate) fn mean_face_area(&self) -> f64 {
        (self.x * self.y + self.y * self.z + self.x * self.z) / 3.0
    }

    /// 平均像素边长: 面内 `x`, `y` 的算术平均.
    #[inline]
    pub(crate) fn mean_edge_length(&self) -> f64 {
        (self.x + self.y) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::ImageSpacing;
    use crate::CoreError;

    #[test]
    fn test_voxel_volume() {
        let s = ImageSpacing::new(1.0, 1.0, 3.0).unwrap();
        assert_eq!(s.voxel_volume(), 3.0);
        assert!(!s.is_isotropic());
        assert!(ImageSpacing::new(1.0, 1.0, 1.0).unwrap().is_isotropic());
        assert!(ImageSpacing::new(1.0, 1.05, 0.98).unwrap().is_isotropic());
    }

    #[test]
    fn test_invalid_spacing() {
        for (x, y, z) in [(0.0, 1.0, 1.0), (1.0, -2.0, 1.0), (1.0, 1.0, f64::NAN)] {
            assert!(matches!(
                ImageSpacing::new(x, y, z),
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_face_and_edge() {
        let s = ImageSpacing::new(1.0, 2.0, 3.0).unwrap();
        assert!((s.mean_face_area() - (2.0 + 6.0 + 3.0) / 3.0).abs() < 1e-12);
        assert!((s.mean_edge_length() - 1.5).abs() < 1e-12);
        assert_eq!(s.scaled(2), ImageSpacing::new(2.0, 4.0, 6.0).unwrap());
    }
}
