#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供前列腺 MRI/CT 影像与分割掩膜的结构化表示, 几何度量, 强度统计和掩膜代数.
//!
//! 该 crate 只处理已经载入内存的体数据, 不负责 DICOM/NIfTI 文件解析,
//! 也不包含分割模型本身 (模型通过 [`predict::SegmentationPredictor`] 接入).
//!
//! # 注意
//!
//! 1. 数组轴顺序与载入时保持一致. 三维数据的轴 0, 1, 2 分别与间距的 z, y, x 对应;
//!   二维数据的轴 0, 1 分别与 y, x 对应.
//! 2. 所有输入校验都在操作边界上完成, 校验失败返回 [`CoreError`], 不会修改任何状态.
//!
//! # 开发计划
//!
//! ### 影像实体, 显示窗与预设 ✅
//!
//! 提供 `MedicalImage`, `ImageSpacing` 以及各模态的窗宽/窗位预设.
//!
//! 实现位于 `prostate-core/src/data`.
//!
//! ### 分割几何度量 ✅
//!
//! 体积, 表面积 (梯度法近似), 最大径 (采样近似), 球形度, 紧致度.
//!
//! 实现位于 `prostate-core/src/segmentation/metrics.rs`.
//!
//! ### 分割区域强度统计 ✅
//!
//! 均值, 标准差, 分位数, 以及 256 柱直方图上的熵与均匀度.
//!
//! 实现位于 `prostate-core/src/segmentation/intensity.rs`.
//!
//! ### 掩膜代数与形态学 ✅
//!
//! 并集, 交集, 十字结构元上的腐蚀/膨胀/开/闭.
//!
//! 实现位于 `prostate-core/src/morph.rs`.
//!
//! ### 画刷编辑与多分割合并 ✅
//!
//! 实现位于 `prostate-core/src/edit.rs`.
//!
//! ### 自动分割接入 ✅
//!
//! 实现位于 `prostate-core/src/predict.rs`.
//!
//! ### 存储与快照 ✅
//!
//! 内存存储, 以及 `serde` feature 下的 bincode + zlib 快照.
//!
//! 实现位于 `prostate-core/src/store`.
//!
//! ### 切片 PNG 导出 ✅
//!
//! 实现位于 `prostate-core/src/data/save.rs`.
//!
//! ### 更精确的表面积估计 ⌛️
//!
//! 目前按表面体素个数乘平均面面积估计, 对斜面偏差较大.

/// 二维索引.
pub type Idx2d = (usize, usize);

/// 三维索引, 顺序为 `(z, y, x)`.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;
pub use error::{CoreError, Result};

pub mod data;

pub use data::{
    validate_loaded_image, validate_prostate_image, ImageIdentity, ImageIntensityStatistics,
    ImagePlane, ImageSpacing, MedicalImage, Modality, PresetName, SliceGeometry, WindowLevel,
};

pub mod segmentation;

pub use segmentation::{
    AnatomicalRegion, ConfidenceLevel, IntensityStatistics, MedicalSegmentation,
    ModificationKind, ModificationRecord, SegmentationMetrics, SegmentationType,
};

pub mod morph;
pub use morph::MorphOp;

pub mod edit;
pub use edit::{EditMode, MergeStrategy, SegmentationEditor};

pub mod predict;

pub mod store;

mod stats;

pub mod prelude;
