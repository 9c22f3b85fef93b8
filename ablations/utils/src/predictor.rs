//! 体模上的模拟预测器.
//!
//! 直接由体模几何得到各区域掩膜, 置信度图为常数, 用来驱动完整的分析流程.

use ndarray::{Array3, Zip};
use prostate_core::edit::spherical_brush;
use prostate_core::predict::{RawPrediction, SegmentationPredictor};
use prostate_core::{AnatomicalRegion, CoreError, Idx3d, MedicalImage, Result};

use crate::phantom::gland;

/// 移行带占腺体半径的比例.
const TRANSITION_RATIO: f64 = 0.6;

/// 掩膜外的置信度.
const BACKGROUND_CONFIDENCE: f32 = 0.05;

/// 模拟预测器. 病灶是腺体外周带内的一个球.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPredictor;

impl SimulatedPredictor {
    /// 区域内部的置信度. 病灶置信度低于复核阈值.
    pub const fn confidence(region: AnatomicalRegion) -> f32 {
        match region {
            AnatomicalRegion::ProstateWhole => 0.92,
            AnatomicalRegion::PeripheralZone | AnatomicalRegion::TransitionZone => 0.78,
            AnatomicalRegion::SuspiciousLesion => 0.64,
            _ => 0.5,
        }
    }

    /// 病灶球心与半径: 位于腺体中心层, 偏向后方 (高度方向) 的外周带内.
    pub fn lesion(shape: Idx3d) -> (Idx3d, usize) {
        let g = gland(shape);
        let (cz, cy, cx) = g.center;
        let ry = g.radii.1;
        let center = (
            cz.round() as usize,
            (cy + ry * 0.8).round() as usize,
            cx.round() as usize,
        );
        let radius = ((ry * 0.15).round() as usize).max(1);
        (center, radius)
    }

    /// `region` 在 `shape` 上的掩膜. 体模中不存在的区域为空掩膜.
    pub fn region_mask(shape: Idx3d, region: AnatomicalRegion) -> Array3<bool> {
        let g = gland(shape);
        match region {
            AnatomicalRegion::ProstateWhole => g.rasterize(shape),
            AnatomicalRegion::TransitionZone => g.scaled(TRANSITION_RATIO).rasterize(shape),
            AnatomicalRegion::PeripheralZone => {
                let mut outer = g.rasterize(shape);
                let inner = g.scaled(TRANSITION_RATIO).rasterize(shape);
                Zip::from(&mut outer).and(&inner).for_each(|o, &i| *o &= !i);
                outer
            }
            AnatomicalRegion::SuspiciousLesion => {
                let (center, radius) = Self::lesion(shape);
                spherical_brush(shape, center, radius)
            }
            _ => Array3::from_elem(shape, false),
        }
    }
}

impl SegmentationPredictor for SimulatedPredictor {
    fn predict(&self, image: &MedicalImage, region: AnatomicalRegion) -> Result<RawPrediction> {
        let shape = match *image.dimensions() {
            [d, h, w] => (d, h, w),
            _ => {
                return Err(CoreError::UnsupportedOperation(
                    "模拟预测器只支持三维影像".to_owned(),
                ))
            }
        };
        let mask = Self::region_mask(shape, region);
        let inside = Self::confidence(region);
        let confidence_map = mask.mapv(|m| if m { inside } else { BACKGROUND_CONFIDENCE });
        Ok(RawPrediction {
            mask: mask.into_dyn(),
            confidence_map: confidence_map.into_dyn(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: Idx3d = (64, 96, 96);

    fn count(m: &Array3<bool>) -> usize {
        m.iter().filter(|&&b| b).count()
    }

    #[test]
    fn test_zones_partition_gland() {
        let whole = SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::ProstateWhole);
        let pz = SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::PeripheralZone);
        let tz = SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::TransitionZone);
        assert_eq!(count(&pz) + count(&tz), count(&whole));
        assert!(Zip::from(&pz).and(&tz).all(|&p, &t| !(p && t)));
    }

    #[test]
    fn test_lesion_inside_peripheral_zone() {
        let (center, radius) = SimulatedPredictor::lesion(SHAPE);
        assert!(radius >= 1);
        let pz = SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::PeripheralZone);
        assert!(pz[center]);
        let lesion = SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::SuspiciousLesion);
        assert!(count(&lesion) > 0);
        assert!(count(&SimulatedPredictor::region_mask(SHAPE, AnatomicalRegion::Urethra)) == 0);
    }
}
