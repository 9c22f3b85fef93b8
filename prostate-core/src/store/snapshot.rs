//! 影像与分割的可持久化快照.
//!
//! 数组按行优先顺序展开后以 zlib 压缩, 整个记录再用 bincode 编码.
//! 恢复时重新走一遍构造校验, 损坏的快照不会得到非法实体.

use std::collections::HashMap;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::segmentation::{
    AnatomicalRegion, MedicalSegmentation, ModificationRecord, SegmentationType,
};
use crate::{ImageIdentity, ImageSpacing, MedicalImage, Modality, WindowLevel};

#[inline]
fn codec<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Codec(e.to_string())
}

/// 压缩存储的 n 维数组; 不透明类型.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompactArray {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    shape: Vec<usize>,
}

impl CompactArray {
    fn compress(shape: &[usize], raw: &[u8]) -> Result<Self> {
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        e.write_all(raw).map_err(codec)?;
        Ok(Self {
            buf: e.finish().map_err(codec)?,
            shape: shape.to_vec(),
        })
    }

    fn decompress(&self, elem_size: usize) -> Result<Vec<u8>> {
        let len = self.shape.iter().product::<usize>() * elem_size;
        let mut d = ZlibDecoder::new(self.buf.as_slice());
        let mut raw = Vec::with_capacity(len);
        d.read_to_end(&mut raw).map_err(codec)?;
        if raw.len() != len {
            return Err(CoreError::Codec(format!(
                "解压后长度 {} 与形状 {:?} 不符",
                raw.len(),
                self.shape
            )));
        }
        Ok(raw)
    }

    fn from_f32(view: &ArrayViewD<'_, f32>) -> Result<Self> {
        let raw: Vec<u8> = view.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::compress(view.shape(), &raw)
    }

    fn to_f32(&self) -> Result<ArrayD<f32>> {
        let raw = self.decompress(4)?;
        let v = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        ArrayD::from_shape_vec(IxDyn(&self.shape), v).map_err(codec)
    }

    fn from_bool(view: &ArrayViewD<'_, bool>) -> Result<Self> {
        let raw: Vec<u8> = view.iter().map(|&b| b as u8).collect();
        Self::compress(view.shape(), &raw)
    }

    fn to_bool(&self) -> Result<ArrayD<bool>> {
        let raw = self.decompress(1)?;
        let v = raw.into_iter().map(|b| b != 0).collect();
        ArrayD::from_shape_vec(IxDyn(&self.shape), v).map_err(codec)
    }
}

/// [`MedicalImage`] 的快照. 包含数组, 间距, 模态, 身份, 采集时间, 元数据和当前显示窗.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSnapshot {
    data: CompactArray,
    spacing: (f64, f64, f64),
    modality: Modality,
    identity: ImageIdentity,
    acquisition_date: DateTime<Utc>,
    metadata: HashMap<String, String>,
    current_window_level: WindowLevel,
}

impl ImageSnapshot {
    /// 捕获影像当前状态.
    pub fn capture(image: &MedicalImage) -> Result<Self> {
        let spacing = image.spacing();
        Ok(Self {
            data: CompactArray::from_f32(&image.data())?,
            spacing: (spacing.x(), spacing.y(), spacing.z()),
            modality: image.modality(),
            identity: image.identity().clone(),
            acquisition_date: image.acquisition_date(),
            metadata: image.metadata().clone(),
            current_window_level: image.current_window_level(),
        })
    }

    /// 恢复影像.
    pub fn restore(&self) -> Result<MedicalImage> {
        let (x, y, z) = self.spacing;
        let mut image = MedicalImage::new(
            self.data.to_f32()?,
            ImageSpacing::new(x, y, z)?,
            self.modality,
            self.identity.clone(),
            self.acquisition_date,
        )?
        .with_metadata(self.metadata.clone());
        image.restore_window_level(self.current_window_level);
        Ok(image)
    }

    /// 编码为字节流.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(codec)
    }

    /// 从字节流解码.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(codec)
    }
}

/// [`MedicalSegmentation`] 的快照. 缓存的度量不会被保存.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationSnapshot {
    id: Uuid,
    mask: CompactArray,
    anatomical_region: AnatomicalRegion,
    segmentation_type: SegmentationType,
    creation_date: DateTime<Utc>,
    creator_id: String,
    confidence_score: Option<f64>,
    parent_image_uid: Option<String>,
    description: String,
    is_locked: bool,
    history: Vec<ModificationRecord>,
}

impl SegmentationSnapshot {
    /// 捕获分割当前状态.
    pub fn capture(seg: &MedicalSegmentation) -> Result<Self> {
        Ok(Self {
            id: seg.id(),
            mask: CompactArray::from_bool(&seg.mask())?,
            anatomical_region: seg.anatomical_region(),
            segmentation_type: seg.segmentation_type(),
            creation_date: seg.creation_date(),
            creator_id: seg.creator_id().to_owned(),
            confidence_score: seg.confidence_score(),
            parent_image_uid: seg.parent_image_uid().map(str::to_owned),
            description: seg.description().to_owned(),
            is_locked: seg.is_locked(),
            history: seg.history().to_vec(),
        })
    }

    /// 恢复分割, 保留原 id, 锁定状态与历史.
    pub fn restore(&self) -> Result<MedicalSegmentation> {
        let mut seg = MedicalSegmentation::new(
            self.mask.to_bool()?,
            self.anatomical_region,
            self.segmentation_type,
            self.creator_id.as_str(),
        )?
        .with_creation_date(self.creation_date)
        .with_description(self.description.as_str());
        if let Some(score) = self.confidence_score {
            seg = seg.with_confidence(score)?;
        }
        if let Some(uid) = &self.parent_image_uid {
            seg = seg.with_parent_image_uid(uid.as_str());
        }
        Ok(seg.restored(self.id, self.is_locked, self.history.clone()))
    }

    /// 编码为字节流.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(codec)
    }

    /// 从字节流解码.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(codec)
    }
}
