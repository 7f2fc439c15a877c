//! 分帧策略的声明式配置。
//!
//! ## 设计背景（Why）
//! - 监听器按配置决定连接使用哪种分帧方式；配置以 TOML 书写，`kind` 字段区分策略：
//!
//! ```toml
//! kind = "prefixed"
//! width = 2
//! min = 2
//! max = 4096
//! ```
//!
//! ## 契约说明（What）
//! - [`FramingConfig::from_toml_str`] 只负责语法解码；
//! - `FramingStrategy::try_from(config)` 负责语义校验：前缀宽度只能是 1、2、4，`max` 必须能被前缀表示，
//!   `min <= max`，HTTP 上限必须大于 0。

use serde::{Deserialize, Serialize};

use crate::{ConfigError, FramingStrategy, HttpLimits, LengthWidth};

/// 分帧配置。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FramingConfig {
    /// 长度前缀帧。
    Prefixed {
        /// 前缀宽度（字节）。
        width: u8,
        /// 整帧长度下限，缺省为 0（即按前缀宽度计）。
        #[serde(default)]
        min: u32,
        /// 整帧长度上限。
        max: u32,
    },
    /// HTTP/1.x 消息。
    Http {
        /// 头部块上限。
        #[serde(default = "default_max_header_bytes")]
        max_header_bytes: usize,
        /// 整条消息上限。
        #[serde(default = "default_max_message_bytes")]
        max_message_bytes: usize,
    },
    /// 回显。
    Echo,
}

fn default_max_header_bytes() -> usize {
    HttpLimits::DEFAULT_MAX_HEADER_BYTES
}

fn default_max_message_bytes() -> usize {
    HttpLimits::DEFAULT_MAX_MESSAGE_BYTES
}

impl FramingConfig {
    /// 从 TOML 文本解码配置，不做语义校验。
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

impl TryFrom<FramingConfig> for FramingStrategy {
    type Error = ConfigError;

    fn try_from(config: FramingConfig) -> Result<Self, Self::Error> {
        match config {
            FramingConfig::Prefixed { width, min, max } => {
                let width = LengthWidth::from_bytes(usize::from(width))
                    .ok_or(ConfigError::UnsupportedWidth(width))?;
                if max > width.max_value() {
                    return Err(ConfigError::MaxExceedsWidth {
                        max,
                        width: width.bytes(),
                    });
                }
                if min > max {
                    return Err(ConfigError::InvertedBounds { min, max });
                }
                Ok(FramingStrategy::prefixed(width, min, max))
            }
            FramingConfig::Http {
                max_header_bytes,
                max_message_bytes,
            } => {
                if max_header_bytes == 0 {
                    return Err(ConfigError::ZeroLimit("max_header_bytes"));
                }
                if max_message_bytes == 0 {
                    return Err(ConfigError::ZeroLimit("max_message_bytes"));
                }
                Ok(FramingStrategy::Http(HttpLimits {
                    max_header_bytes,
                    max_message_bytes,
                }))
            }
            FramingConfig::Echo => Ok(FramingStrategy::Echo),
        }
    }
}
