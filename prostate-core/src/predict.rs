//! 自动分割预测器接口, 以及从原始预测到分割实体的转换.

use log::{debug, info};
use ndarray::{ArrayD, Zip};

use crate::consts::creator;
use crate::data::validate_prostate_image;
use crate::error::{CoreError, Result};
use crate::segmentation::{AnatomicalRegion, MedicalSegmentation, SegmentationType};
use crate::MedicalImage;

/// 预测器对单个解剖区域的原始输出. 两个数组形状必须与输入影像相同.
#[derive(Debug, Clone)]
pub struct RawPrediction {
    /// 二值掩膜.
    pub mask: ArrayD<bool>,
    /// 逐体素置信度, 取值 `[0, 1]`.
    pub confidence_map: ArrayD<f32>,
}

/// 自动分割预测器.
///
/// 实现者负责推理本身; 本库只负责校验输入影像并把输出转换为分割实体.
pub trait SegmentationPredictor {
    /// 对 `image` 预测 `region` 的掩膜与置信度图.
    fn predict(&self, image: &MedicalImage, region: AnatomicalRegion) -> Result<RawPrediction>;
}

impl MedicalSegmentation {
    /// 由预测器输出构建自动分割.
    ///
    /// 置信度为掩膜区域内置信度图的平均值, 空掩膜为 `0.0`.
    /// 掩膜, 置信度图与影像形状不同时返回 `Err(CoreError::DimensionMismatch)`;
    /// 平均置信度不在 `[0, 1]` 内时返回 `Err(CoreError::Validation)`.
    pub fn from_prediction(
        prediction: RawPrediction,
        region: AnatomicalRegion,
        image: &MedicalImage,
    ) -> Result<Self> {
        let RawPrediction {
            mask,
            confidence_map,
        } = prediction;
        if mask.shape() != image.dimensions() {
            return Err(CoreError::mismatch(image.dimensions(), mask.shape()));
        }
        if confidence_map.shape() != mask.shape() {
            return Err(CoreError::mismatch(mask.shape(), confidence_map.shape()));
        }

        let (sum, cnt) = Zip::from(&mask)
            .and(&confidence_map)
            .fold((0.0f64, 0usize), |(sum, cnt), &m, &c| {
                if m {
                    (sum + c as f64, cnt + 1)
                } else {
                    (sum, cnt)
                }
            });
        let score = if cnt == 0 { 0.0 } else { sum / cnt as f64 };
        debug!("{region} 预测: {cnt} 个体素, 平均置信度 {score:.4}");

        Ok(
            MedicalSegmentation::new(mask, region, SegmentationType::Automatic, creator::PREDICTOR)?
                .with_confidence(score)?
                .with_parent_image_uid(image.series_instance_uid())
                .with_description(format!("automatic {region} segmentation")),
        )
    }
}

/// 校验 `image` 适合前列腺分析后, 依次预测 `regions` 中的每个区域.
pub fn predict_segmentations<P>(
    predictor: &P,
    image: &MedicalImage,
    regions: &[AnatomicalRegion],
) -> Result<Vec<MedicalSegmentation>>
where
    P: SegmentationPredictor + ?Sized,
{
    validate_prostate_image(image)?;
    let segs = regions
        .iter()
        .map(|&region| {
            let raw = predictor.predict(image, region)?;
            MedicalSegmentation::from_prediction(raw, region, image)
        })
        .collect::<Result<Vec<_>>>()?;
    info!(
        "影像 {} 自动分割完成, 共 {} 个区域",
        image.series_instance_uid(),
        segs.len()
    );
    Ok(segs)
}
