//! 影像数据, 体素间距, 显示窗以及切片导出.

mod medical;
pub mod save;
mod spacing;
pub mod window;

pub use medical::{
    validate_loaded_image, validate_prostate_image, ImageIdentity, ImageIntensityStatistics,
    ImagePlane, MedicalImage, Modality, SliceGeometry,
};
pub(crate) use medical::plane_slice;
pub use spacing::ImageSpacing;
pub use window::{PresetName, WindowLevel};
