//! 确定性的盆腔体模.
//!
//! 腺体是一个位于体积中心的椭球, 比背景更亮; 背景和腺体上叠加了固定的纹理,
//! 因此同样的配置总是得到同样的体模.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use ndarray::Array3;
use prostate_core::consts::tag;
use prostate_core::{Idx3d, ImageIdentity, MedicalImage, Modality, Result};

use crate::PhantomConfig;

/// 以体素为单位的椭球几何, 中心与半径都按 `(z, y, x)` 排列.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub center: (f64, f64, f64),
    pub radii: (f64, f64, f64),
}

impl Ellipsoid {
    /// 居中于 `shape`, 三个半径分别为对应维度长度乘以 `ratio`.
    pub fn centered(shape: Idx3d, ratio: (f64, f64, f64)) -> Self {
        let (d, h, w) = shape;
        let c = |n: usize| (n as f64 - 1.0) / 2.0;
        Self {
            center: (c(d), c(h), c(w)),
            radii: (d as f64 * ratio.0, h as f64 * ratio.1, w as f64 * ratio.2),
        }
    }

    /// 同心缩放.
    pub fn scaled(&self, factor: f64) -> Self {
        let (a, b, c) = self.radii;
        Self {
            center: self.center,
            radii: (a * factor, b * factor, c * factor),
        }
    }

    #[inline]
    pub fn contains(&self, (z, y, x): Idx3d) -> bool {
        let q = |p: usize, c: f64, r: f64| ((p as f64 - c) / r).powi(2);
        q(z, self.center.0, self.radii.0)
            + q(y, self.center.1, self.radii.1)
            + q(x, self.center.2, self.radii.2)
            <= 1.0
    }

    /// 在 `shape` 上栅格化.
    pub fn rasterize(&self, shape: Idx3d) -> Array3<bool> {
        Array3::from_shape_fn(shape, |idx| self.contains(idx))
    }
}

/// 体模腺体: 各轴半径为对应维度的 30%.
#[inline]
pub fn gland(shape: Idx3d) -> Ellipsoid {
    Ellipsoid::centered(shape, (0.3, 0.3, 0.3))
}

/// 取值 `[0, 10]` 的固定纹理.
#[inline]
fn texture((z, y, x): Idx3d) -> f32 {
    ((z * 7 + y * 13 + x * 17) % 11) as f32
}

/// `(背景, 腺体)` 基础强度.
fn base_intensity(modality: Modality) -> (f32, f32) {
    match modality {
        Modality::Ct => (-60.0, 45.0),
        _ => (120.0, 380.0),
    }
}

/// 按配置生成体模影像. 患者为 `PHANTOM`, 序列 UID 随模态不同.
pub fn phantom_image(cfg: &PhantomConfig, modality: Modality) -> Result<MedicalImage> {
    let g = gland(cfg.shape);
    let (bg, fg) = base_intensity(modality);
    let data = Array3::from_shape_fn(cfg.shape, |idx| {
        let base = if g.contains(idx) { fg } else { bg };
        base + texture(idx)
    });
    let series = match modality {
        Modality::Ct => "1.2.826.0.1.3680043.1.1",
        _ => "1.2.826.0.1.3680043.1.2",
    };
    let tags = HashMap::from([(tag::BODY_PART_EXAMINED.to_owned(), "PELVIS".to_owned())]);
    let date = Utc
        .with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    Ok(MedicalImage::new(
        data.into_dyn(),
        cfg.spacing,
        modality,
        ImageIdentity::new("PHANTOM", "1.2.826.0.1.3680043.1", series),
        date,
    )?
    .with_metadata(tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prostate_core::ImageSpacing;
    use std::path::PathBuf;

    const SHAPE: Idx3d = (64, 64, 64);

    fn cfg() -> PhantomConfig {
        PhantomConfig {
            shape: SHAPE,
            spacing: ImageSpacing::new(0.5, 0.5, 3.0).unwrap(),
            out_dir: PathBuf::from("."),
            log_level: log::LevelFilter::Off,
        }
    }

    #[test]
    fn test_gland_brighter() {
        let img = phantom_image(&cfg(), Modality::Mri).unwrap();
        let g = gland(SHAPE);
        let data = img.data();
        assert!(data[[32, 32, 32]] > data[[0, 0, 0]] + 200.0);
        assert!(g.contains((32, 32, 32)));
        assert!(!g.contains((0, 0, 0)));
        assert_eq!(img.get_dicom_tag("BodyPartExamined"), Some("PELVIS"));
        assert!(prostate_core::validate_prostate_image(&img).is_ok());
    }

    #[test]
    fn test_deterministic() {
        let a = phantom_image(&cfg(), Modality::Ct).unwrap();
        let b = phantom_image(&cfg(), Modality::Ct).unwrap();
        assert_eq!(a.data(), b.data());
        assert_ne!(
            a.series_instance_uid(),
            phantom_image(&cfg(), Modality::Mri)
                .unwrap()
                .series_instance_uid()
        );
    }

    #[test]
    fn test_scaled_ellipsoid_nested() {
        let g = gland(SHAPE);
        let outer = g.rasterize(SHAPE);
        let inner = g.scaled(0.6).rasterize(SHAPE);
        assert!(inner.iter().zip(outer.iter()).all(|(&i, &o)| !i || o));
        assert!(inner.iter().filter(|&&b| b).count() < outer.iter().filter(|&&b| b).count());
    }
}
