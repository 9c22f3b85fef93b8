//! 体模实验的运行配置. 全部来自环境变量, 缺省时使用家目录下的默认值.

use std::env;
use std::path::PathBuf;

use log::LevelFilter;
use prostate_core::{CoreError, Idx3d, ImageSpacing};
use thiserror::Error;

/// 读取配置错误.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `$PHANTOM_SHAPE` 不是 `DxHxW` 形式.
    #[error("无法解析体模形状 `{0}`, 应为 DxHxW")]
    Shape(String),

    /// `$PHANTOM_SPACING` 不是 `x,y,z` 形式.
    #[error("无法解析体素间距 `{0}`, 应为 x,y,z")]
    Spacing(String),

    /// 间距分量不合法.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// `$PHANTOM_LOG` 不是合法的日志级别.
    #[error("未知日志级别 `{0}`")]
    LogLevel(String),

    /// 没有设置输出目录, 也找不到家目录.
    #[error("无法确定输出目录")]
    NoHome,
}

/// 体模实验配置.
#[derive(Debug, Clone)]
pub struct PhantomConfig {
    /// 体模形状 `(层, 高, 宽)`.
    pub shape: Idx3d,
    pub spacing: ImageSpacing,
    /// PNG 预览输出目录.
    pub out_dir: PathBuf,
    pub log_level: LevelFilter,
}

impl PhantomConfig {
    /// 默认形状. 满足前列腺分析的最小尺寸要求.
    pub const DEFAULT_SHAPE: Idx3d = (64, 96, 96);

    /// 从环境变量读取配置.
    ///
    /// 1. `$PHANTOM_SHAPE`, 缺省为 `64x96x96`;
    /// 2. `$PHANTOM_SPACING`, 缺省为 `0.5,0.5,3.0`;
    /// 3. `$PHANTOM_OUT_DIR`, 缺省为 `$HOME/prostate-phantom`;
    /// 4. `$PHANTOM_LOG`, 缺省为 `info`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let shape = match env::var("PHANTOM_SHAPE") {
            Ok(s) => parse_shape(&s)?,
            Err(_) => Self::DEFAULT_SHAPE,
        };
        let spacing = match env::var("PHANTOM_SPACING") {
            Ok(s) => parse_spacing(&s)?,
            Err(_) => ImageSpacing::new(0.5, 0.5, 3.0)?,
        };
        let out_dir = match env::var("PHANTOM_OUT_DIR") {
            Ok(d) => PathBuf::from(d),
            Err(_) => home_out_dir().ok_or(ConfigError::NoHome)?,
        };
        let log_level = match env::var("PHANTOM_LOG") {
            Ok(l) => l.parse().map_err(|_| ConfigError::LogLevel(l))?,
            Err(_) => LevelFilter::Info,
        };
        Ok(Self {
            shape,
            spacing,
            out_dir,
            log_level,
        })
    }
}

/// `$HOME/prostate-phantom`.
fn home_out_dir() -> Option<PathBuf> {
    let mut dir = dirs::home_dir()?;
    dir.push("prostate-phantom");
    Some(dir)
}

/// 解析 `DxHxW`. 每个分量都必须为正整数.
pub fn parse_shape(s: &str) -> Result<Idx3d, ConfigError> {
    let err = || ConfigError::Shape(s.to_owned());
    let dims = s
        .split(['x', 'X'])
        .map(|p| p.trim().parse::<usize>().ok().filter(|&d| d > 0))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(err)?;
    match dims[..] {
        [d, h, w] => Ok((d, h, w)),
        _ => Err(err()),
    }
}

/// 解析 `x,y,z` 毫米间距.
pub fn parse_spacing(s: &str) -> Result<ImageSpacing, ConfigError> {
    let err = || ConfigError::Spacing(s.to_owned());
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(err)?;
    match parts[..] {
        [x, y, z] => Ok(ImageSpacing::new(x, y, z)?),
        _ => Err(err()),
    }
}
