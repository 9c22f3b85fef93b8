//! 通用常量.

/// 最大径计算时参与两两比较的采样点上限.
///
/// 前景体素坐标个数超过该值时, 按行优先顺序每隔 `n / DIAMETER_SAMPLE_LIMIT`
/// 个取一个. 这是一个近似, 对大掩膜并不精确.
pub const DIAMETER_SAMPLE_LIMIT: usize = 1000;

/// 计算熵和均匀度时使用的直方图柱数.
pub const HISTOGRAM_BINS: usize = 256;

/// 各向同性判定的默认容差, 以毫米为单位.
pub const ISOTROPIC_TOLERANCE: f64 = 0.1;

/// 外部加载的影像在每个空间维度上至少需要的体素个数.
pub const MIN_LOADED_DIM: usize = 32;

/// 前列腺分析所需的最小影像尺寸, 与影像形状逐轴比较.
pub const MIN_PROSTATE_DIMS: [usize; 3] = [64, 64, 8];

/// 半透明叠加层的 alpha 值.
pub const OVERLAY_ALPHA: u8 = 180;

/// 默认 CT 窗 (软组织窗).
pub mod ct {
    /// 默认窗宽.
    pub const DEFAULT_WINDOW: f64 = 400.0;

    /// 默认窗位.
    pub const DEFAULT_LEVEL: f64 = 40.0;
}

/// 置信度分级的分界点. 区间左闭右开.
pub mod confidence {
    /// 低于该值为 `VeryLow`.
    pub const VERY_LOW_BELOW: f64 = 0.3;

    /// 低于该值为 `Low`.
    pub const LOW_BELOW: f64 = 0.5;

    /// 低于该值为 `Moderate`.
    pub const MODERATE_BELOW: f64 = 0.7;

    /// 低于该值为 `High`, 否则为 `VeryHigh`.
    pub const HIGH_BELOW: f64 = 0.9;
}

/// 系统生成分割时使用的创建者标记.
pub mod creator {
    /// 并集运算.
    pub const UNION: &str = "system_union";

    /// 交集运算.
    pub const INTERSECTION: &str = "system_intersection";

    /// 形态学运算.
    pub const MORPHOLOGY: &str = "system_morphology";

    /// 自动预测器输出.
    pub const PREDICTOR: &str = "automatic_predictor";
}

/// DICOM 元数据中常用的标签名.
pub mod tag {
    /// 检查部位.
    pub const BODY_PART_EXAMINED: &str = "BodyPartExamined";

    /// 序列号.
    pub const SERIES_NUMBER: &str = "SeriesNumber";
}
