//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{CoreError, Result};

pub use crate::data::save::{save_mask_overlay, save_windowed_slice};
pub use crate::data::{
    ImageIdentity, ImagePlane, ImageSpacing, MedicalImage, Modality, PresetName, WindowLevel,
};

pub use crate::segmentation::{
    AnatomicalRegion, ConfidenceLevel, IntensityStatistics, MedicalSegmentation,
    SegmentationMetrics, SegmentationType,
};

pub use crate::edit::{EditMode, MergeStrategy, SegmentationEditor};
pub use crate::morph::MorphOp;

pub use crate::predict::{predict_segmentations, RawPrediction, SegmentationPredictor};

pub use crate::store::{
    ImageStore, MemoryImageStore, MemorySegmentationStore, SegmentationStore,
};
