//! 切片的可视化导出.
//!
//! 保存格式由路径扩展名决定 (通常为 `.png`).

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

use super::{ImagePlane, MedicalImage, WindowLevel};
use crate::consts::OVERLAY_ALPHA;
use crate::error::{CoreError, Result};
use crate::segmentation::MedicalSegmentation;

#[inline]
fn export_err(e: image::ImageError) -> CoreError {
    CoreError::Export(e.to_string())
}

/// 将 `image` 的一张切片以 `window_level` (缺省为当前显示窗) 映射为 8-bit 灰度图保存.
///
/// 无意义的像素 (NaN) 保存为黑色.
pub fn save_windowed_slice<P: AsRef<Path>>(
    image: &MedicalImage,
    plane: ImagePlane,
    index: usize,
    window_level: Option<WindowLevel>,
    path: P,
) -> Result<()> {
    let slice = image.get_slice(plane, index)?;
    let wl = window_level.unwrap_or_else(|| image.current_window_level());
    let (height, width) = slice.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in slice.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Luma([wl.eval_u8(v).unwrap_or(0)]));
    }
    buf.save(path).map_err(export_err)
}

/// 在当前显示窗下的灰度切片上, 用分割区域颜色半透明叠加掩膜后保存为 RGB 图.
///
/// 掩膜与影像形状不同时返回 `Err(CoreError::DimensionMismatch)`.
pub fn save_mask_overlay<P: AsRef<Path>>(
    image: &MedicalImage,
    segmentation: &MedicalSegmentation,
    plane: ImagePlane,
    index: usize,
    path: P,
) -> Result<()> {
    if segmentation.dimensions() != image.dimensions() {
        return Err(CoreError::mismatch(
            image.dimensions(),
            segmentation.dimensions(),
        ));
    }
    let slice = image.get_slice(plane, index)?;
    let mask = segmentation.get_mask_slice(plane, index)?;
    let wl = image.current_window_level();
    let color = segmentation.anatomical_region().display_color();

    let (height, width) = slice.dim();
    let mut buf = RgbImage::new(width as u32, height as u32);
    for ((h, w), &v) in slice.indexed_iter() {
        let gray = wl.eval_u8(v).unwrap_or(0);
        let pix = if mask[(h, w)] {
            color.map(|c| blend(c, gray))
        } else {
            [gray; 3]
        };
        buf.put_pixel(w as u32, h as u32, Rgb(pix));
    }
    buf.save(path).map_err(export_err)
}

/// 以 [`OVERLAY_ALPHA`] 把前景 `fg` 混合到背景 `bg` 上.
#[inline]
fn blend(fg: u8, bg: u8) -> u8 {
    let a = OVERLAY_ALPHA as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}
