//! 程序运行函数.

use std::f64::consts::PI;
use std::fs;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use prostate_core::data::save::{save_mask_overlay, save_windowed_slice};
use prostate_core::edit::spherical_brush;
use prostate_core::predict::predict_segmentations;
use prostate_core::segmentation::metrics;
use prostate_core::store::{
    ImageStore, MemoryImageStore, MemorySegmentationStore, SegmentationStore,
};
use prostate_core::{
    AnatomicalRegion, CoreError, ImagePlane, ImageSpacing, MedicalSegmentation, MergeStrategy,
    Modality, Result, SegmentationEditor, SegmentationMetrics,
};
use utils::{phantom, PhantomConfig, SimulatedPredictor};

use crate::result::{AblationResult, RegionRow, SphereRow};

/// 参与球体实验的半径 (体素). 最大的两个会触发最大径采样.
const RADII: [usize; 5] = [4, 6, 8, 12, 16];

/// 体模上预测的区域.
const REGIONS: [AnatomicalRegion; 4] = [
    AnatomicalRegion::ProstateWhole,
    AnatomicalRegion::PeripheralZone,
    AnatomicalRegion::TransitionZone,
    AnatomicalRegion::SuspiciousLesion,
];

/// 实际运行.
pub fn run(cfg: &PhantomConfig) -> Result<AblationResult> {
    println!("Running ablation studies...");
    let spheres = sphere_rows(ImageSpacing::new(1.0, 1.0, 1.0)?);
    let (regions, zone_coverage) = phantom_rows(cfg)?;
    Ok(AblationResult {
        spheres,
        regions,
        zone_coverage,
    })
}

/// 单位间距下半径为 `radius` 的理想球体.
fn sphere_row(radius: usize, spacing: ImageSpacing) -> SphereRow {
    let n = 2 * radius + 5;
    let c = n / 2;
    let mask = spherical_brush((n, n, n), (c, c, c), radius).into_dyn();

    let t = Instant::now();
    let m = metrics::compute(&mask.view(), &spacing);
    let elapsed_us = t.elapsed().as_micros() as u64;
    debug!("半径 {radius} 的球体度量耗时 {elapsed_us} us");

    let r = radius as f64;
    SphereRow {
        radius,
        voxels: m.voxel_count,
        surface_area: m.surface_area_mm2,
        ideal_surface_area: 4.0 * PI * r * r,
        max_diameter: m.max_diameter_mm,
        ideal_diameter: 2.0 * r,
        sphericity: m.sphericity,
        elapsed_us,
    }
}

/// 每个半径一个线程.
fn sphere_rows(spacing: ImageSpacing) -> Vec<SphereRow> {
    thread::scope(|s| {
        let handles = RADII.map(|r| s.spawn(move || sphere_row(r, spacing)));
        handles
            .into_iter()
            .map(|th| th.join().expect("Thread joining error"))
            .collect()
    })
}

/// 保存分割, 计算度量并单独保存度量. 度量未能写入时返回错误.
fn record_metrics<S: SegmentationStore>(
    store: &S,
    seg: &MedicalSegmentation,
    spacing: &ImageSpacing,
) -> Result<SegmentationMetrics> {
    store.save_segmentation(seg)?;
    let id = seg.segmentation_id();
    let m = seg.calculate_metrics(spacing);
    if !store.save_segmentation_metrics(&id, m) {
        warn!("分割 {id} 不在存储中, 度量未写入");
        return Err(CoreError::Validation(format!("分割 {id} 的度量未能写入")));
    }
    debug!("分割 {id} 的度量已写入");
    Ok(m)
}

/// 体模 MR 上预测全部区域, 计算度量和强度统计, 并在中间轴位层导出预览.
///
/// 同时返回外周带与移行带合并后对整腺的覆盖率.
fn phantom_rows(cfg: &PhantomConfig) -> Result<(Vec<RegionRow>, f64)> {
    let image = phantom::phantom_image(cfg, Modality::Mri)?;
    let images = MemoryImageStore::new();
    images.save_image(&image)?;

    let segs = predict_segmentations(&SimulatedPredictor, &image, &REGIONS)?;
    let store = MemorySegmentationStore::new();

    fs::create_dir_all(&cfg.out_dir).map_err(|e| CoreError::Export(e.to_string()))?;
    let mid = image.dimensions()[0] / 2;
    save_windowed_slice(
        &image,
        ImagePlane::Axial,
        mid,
        None,
        cfg.out_dir.join("axial.png"),
    )?;

    let spacing = image.spacing();
    let mut rows = Vec::with_capacity(segs.len());
    for seg in segs.iter() {
        let m = record_metrics(&store, seg, &spacing)?;
        let stats = seg.calculate_intensity_statistics(&image)?;

        let name = format!("{}.png", seg.anatomical_region());
        save_mask_overlay(&image, seg, ImagePlane::Axial, mid, cfg.out_dir.join(name))?;

        rows.push(RegionRow {
            region: seg.anatomical_region(),
            voxels: m.voxel_count,
            volume_ml: m.volume_mm3 / 1000.0,
            surface_area: m.surface_area_mm2,
            max_diameter: m.max_diameter_mm,
            sphericity: m.sphericity,
            mean_intensity: stats.mean_intensity,
            entropy: stats.entropy,
            confidence: seg.confidence_score(),
            requires_review: seg.requires_review(),
        });
    }
    info!(
        "体模分析完成, 预览已写入 {}",
        cfg.out_dir.as_path().display()
    );

    let zones: Vec<_> = store
        .find_by_image_uid(image.series_instance_uid())
        .into_iter()
        .filter(|s| {
            matches!(
                s.anatomical_region(),
                AnatomicalRegion::PeripheralZone | AnatomicalRegion::TransitionZone
            )
        })
        .collect();
    let merged =
        SegmentationEditor::new("ablation").merge_segmentations(&zones, MergeStrategy::Union)?;
    let whole = store
        .find_by_anatomical_region(
            AnatomicalRegion::ProstateWhole,
            Some(image.series_instance_uid()),
        )
        .into_iter()
        .next()
        .map_or(0, |s| s.voxel_count());
    let coverage = if whole == 0 {
        0.0
    } else {
        merged.voxel_count() as f64 / whole as f64
    };
    Ok((rows, coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prostate_core::SegmentationType;

    #[test]
    fn test_record_metrics() {
        let store = MemorySegmentationStore::new();
        let mask = spherical_brush((9, 9, 9), (4, 4, 4), 2).into_dyn();
        let seg = MedicalSegmentation::new(
            mask,
            AnatomicalRegion::SuspiciousLesion,
            SegmentationType::Manual,
            "ablation",
        )
        .unwrap();
        let spacing = ImageSpacing::new(1.0, 1.0, 1.0).unwrap();
        let m = record_metrics(&store, &seg, &spacing).unwrap();
        assert_eq!(m.voxel_count, seg.voxel_count());
        assert_eq!(
            store.find_segmentation_metrics(&seg.segmentation_id()),
            Some(m)
        );
        assert!(!store.save_segmentation_metrics("missing", m));
    }
}

