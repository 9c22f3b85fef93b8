//! 影像与分割的存储接口, 以及线程安全的内存实现.
//!
//! 存储交出的都是克隆. 影像与分割的数组是共享的, 克隆只增加引用计数.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::data::validate_loaded_image;
use crate::error::Result;
use crate::segmentation::{
    AnatomicalRegion, MedicalSegmentation, ModificationRecord, SegmentationMetrics,
    SegmentationType,
};
use crate::MedicalImage;

#[cfg(feature = "serde")]
pub mod snapshot;

/// 影像存储.
pub trait ImageStore {
    /// 保存影像. 同一序列 UID 的旧影像被替换.
    fn save_image(&self, image: &MedicalImage) -> Result<()>;

    /// 按序列 UID 查找.
    fn find_by_series_uid(&self, series_uid: &str) -> Option<MedicalImage>;

    /// 按检查 UID 查找该检查下的所有序列.
    fn find_by_study_uid(&self, study_uid: &str) -> Vec<MedicalImage>;

    /// 按患者查找.
    fn find_by_patient_id(&self, patient_id: &str) -> Vec<MedicalImage>;

    /// 查找采集时间落在 `[start, end]` 内的影像.
    fn find_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MedicalImage>;

    /// 合并元数据. 影像不存在时返回 `false`.
    fn update_image_metadata(&self, series_uid: &str, tags: HashMap<String, String>) -> bool;

    /// 删除影像. 影像不存在时返回 `false`.
    fn delete_image(&self, series_uid: &str) -> bool;

    /// 影像是否存在.
    fn exists_image(&self, series_uid: &str) -> bool;
}

/// 分割存储.
pub trait SegmentationStore {
    /// 保存分割. 同一 id 的旧分割被替换.
    fn save_segmentation(&self, segmentation: &MedicalSegmentation) -> Result<()>;

    /// 按分割 id 查找.
    fn find_by_segmentation_id(&self, id: &str) -> Option<MedicalSegmentation>;

    /// 查找某影像 (序列 UID) 上的所有分割.
    fn find_by_image_uid(&self, image_uid: &str) -> Vec<MedicalSegmentation>;

    /// 按解剖区域查找, 可选地限定影像.
    fn find_by_anatomical_region(
        &self,
        region: AnatomicalRegion,
        image_uid: Option<&str>,
    ) -> Vec<MedicalSegmentation>;

    /// 按创建者查找.
    fn find_by_creator(&self, creator_id: &str) -> Vec<MedicalSegmentation>;

    /// 置信度不低于 `min_confidence` 的自动分割.
    fn find_automatic_segmentations(&self, min_confidence: f64) -> Vec<MedicalSegmentation>;

    /// 替换已有分割. 分割不存在时返回 `false`, 且不会插入.
    fn update_segmentation(&self, segmentation: &MedicalSegmentation) -> bool;

    /// 单独保存一份度量结果. 分割不存在时返回 `false`.
    fn save_segmentation_metrics(&self, id: &str, metrics: SegmentationMetrics) -> bool;

    /// 读取单独保存的度量结果.
    fn find_segmentation_metrics(&self, id: &str) -> Option<SegmentationMetrics>;

    /// 分割的修改历史. 分割不存在时为空.
    fn get_segmentation_history(&self, id: &str) -> Vec<ModificationRecord>;

    /// 删除分割及其单独保存的度量. 分割不存在时返回 `false`.
    fn delete_segmentation(&self, id: &str) -> bool;
}

#[inline]
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// 以序列 UID 为键的内存影像存储.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<String, MedicalImage>>,
}

impl MemoryImageStore {
    /// 空存储.
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的影像个数.
    pub fn len(&self) -> usize {
        read(&self.images).len()
    }

    /// 是否为空.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filter<P>(&self, pred: P) -> Vec<MedicalImage>
    where
        P: Fn(&MedicalImage) -> bool,
    {
        read(&self.images)
            .values()
            .filter(|img| pred(img))
            .cloned()
            .collect()
    }
}

impl ImageStore for MemoryImageStore {
    /// 保存前执行 [`validate_loaded_image`], 不合格的影像不会入库.
    fn save_image(&self, image: &MedicalImage) -> Result<()> {
        if let Err(e) = validate_loaded_image(image) {
            warn!("拒绝保存影像 {}: {e}", image.series_instance_uid());
            return Err(e);
        }
        let uid = image.series_instance_uid().to_owned();
        debug!("保存影像 {uid}");
        write(&self.images).insert(uid, image.clone());
        Ok(())
    }

    fn find_by_series_uid(&self, series_uid: &str) -> Option<MedicalImage> {
        read(&self.images).get(series_uid).cloned()
    }

    fn find_by_study_uid(&self, study_uid: &str) -> Vec<MedicalImage> {
        self.filter(|img| img.study_instance_uid() == study_uid)
    }

    fn find_by_patient_id(&self, patient_id: &str) -> Vec<MedicalImage> {
        self.filter(|img| img.patient_id() == patient_id)
    }

    fn find_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MedicalImage> {
        self.filter(|img| (start..=end).contains(&img.acquisition_date()))
    }

    fn update_image_metadata(&self, series_uid: &str, tags: HashMap<String, String>) -> bool {
        match write(&self.images).get_mut(series_uid) {
            Some(img) => {
                img.merge_metadata(tags);
                true
            }
            None => false,
        }
    }

    fn delete_image(&self, series_uid: &str) -> bool {
        write(&self.images).remove(series_uid).is_some()
    }

    fn exists_image(&self, series_uid: &str) -> bool {
        read(&self.images).contains_key(series_uid)
    }
}

/// 以分割 id 为键的内存分割存储.
#[derive(Debug, Default)]
pub struct MemorySegmentationStore {
    segmentations: RwLock<HashMap<String, MedicalSegmentation>>,
    metrics: RwLock<HashMap<String, SegmentationMetrics>>,
}

impl MemorySegmentationStore {
    /// 空存储.
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的分割个数.
    pub fn len(&self) -> usize {
        read(&self.segmentations).len()
    }

    /// 是否为空.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filter<P>(&self, pred: P) -> Vec<MedicalSegmentation>
    where
        P: Fn(&MedicalSegmentation) -> bool,
    {
        let mut found: Vec<_> = read(&self.segmentations)
            .values()
            .filter(|seg| pred(seg))
            .cloned()
            .collect();
        found.sort_by_key(MedicalSegmentation::creation_date);
        found
    }
}

impl SegmentationStore for MemorySegmentationStore {
    fn save_segmentation(&self, segmentation: &MedicalSegmentation) -> Result<()> {
        let id = segmentation.segmentation_id();
        debug!("保存分割 {id} ({})", segmentation.anatomical_region());
        write(&self.segmentations).insert(id, segmentation.clone());
        Ok(())
    }

    fn find_by_segmentation_id(&self, id: &str) -> Option<MedicalSegmentation> {
        read(&self.segmentations).get(id).cloned()
    }

    fn find_by_image_uid(&self, image_uid: &str) -> Vec<MedicalSegmentation> {
        self.filter(|seg| seg.parent_image_uid() == Some(image_uid))
    }

    fn find_by_anatomical_region(
        &self,
        region: AnatomicalRegion,
        image_uid: Option<&str>,
    ) -> Vec<MedicalSegmentation> {
        self.filter(|seg| {
            seg.anatomical_region() == region
                && image_uid.map_or(true, |uid| seg.parent_image_uid() == Some(uid))
        })
    }

    fn find_by_creator(&self, creator_id: &str) -> Vec<MedicalSegmentation> {
        self.filter(|seg| seg.creator_id() == creator_id)
    }

    fn find_automatic_segmentations(&self, min_confidence: f64) -> Vec<MedicalSegmentation> {
        self.filter(|seg| {
            seg.segmentation_type() == SegmentationType::Automatic
                && seg.confidence_score().map_or(false, |s| s >= min_confidence)
        })
    }

    fn update_segmentation(&self, segmentation: &MedicalSegmentation) -> bool {
        match write(&self.segmentations).get_mut(&segmentation.segmentation_id()) {
            Some(slot) => {
                *slot = segmentation.clone();
                true
            }
            None => {
                warn!("更新失败, 分割 {} 不存在", segmentation.segmentation_id());
                false
            }
        }
    }

    fn save_segmentation_metrics(&self, id: &str, metrics: SegmentationMetrics) -> bool {
        // 先分割后度量的加锁顺序与 `delete_segmentation` 一致.
        let segs = read(&self.segmentations);
        if !segs.contains_key(id) {
            return false;
        }
        write(&self.metrics).insert(id.to_owned(), metrics);
        true
    }

    fn find_segmentation_metrics(&self, id: &str) -> Option<SegmentationMetrics> {
        read(&self.metrics).get(id).copied()
    }

    fn get_segmentation_history(&self, id: &str) -> Vec<ModificationRecord> {
        read(&self.segmentations)
            .get(id)
            .map(|seg| seg.history().to_vec())
            .unwrap_or_default()
    }

    fn delete_segmentation(&self, id: &str) -> bool {
        let mut segs = write(&self.segmentations);
        write(&self.metrics).remove(id);
        segs.remove(id).is_some()
    }
}
