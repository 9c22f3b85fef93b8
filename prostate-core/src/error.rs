//! 运行时错误.

use thiserror::Error;

/// 核心库统一错误类型.
///
/// 所有校验都在接收输入的操作边界上立即进行, 失败时不会修改任何状态.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// 构造参数不合法 (秩错误, 空数组, 非正间距, UID 格式, 置信度越界, 非正窗宽等).
    #[error("校验失败: {0}")]
    Validation(String),

    /// 参与运算的两个数组形状不一致.
    #[error("形状不一致: 期望 {expected:?}, 实际 {found:?}")]
    DimensionMismatch {
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        found: Vec<usize>,
    },

    /// 切片索引越界.
    #[error("{axis} 索引 {index} 越界, 合法范围为 [0, {max}]")]
    IndexRange {
        /// 越界所在的平面或轴.
        axis: &'static str,
        /// 请求的索引.
        index: usize,
        /// 合法的最大索引.
        max: usize,
    },

    /// 未知的平面, 形态学操作, 合并策略, 编辑模式或预设.
    #[error("不支持的操作: {0}")]
    UnsupportedOperation(String),

    /// 分割已锁定, 拒绝编辑. 参数为分割 id.
    #[error("分割 {0} 已锁定, 拒绝编辑")]
    Locked(String),

    /// PNG 导出失败.
    #[error("图像导出失败: {0}")]
    Export(String),

    /// 快照编解码错误.
    #[cfg(feature = "serde")]
    #[error("快照编解码错误: {0}")]
    Codec(String),
}

impl CoreError {
    /// 由两个形状切片构造 [`CoreError::DimensionMismatch`].
    #[inline]
    pub(crate) fn mismatch(expected: &[usize], found: &[usize]) -> Self {
        Self::DimensionMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

/// 核心库运行时结果.
pub type Result<T> = std::result::Result<T, CoreError>;
