//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 分帧只有三种结局：数据不足、得到一帧、流已损坏。前两者是正常流程，
//!   第三种对当前连接是致命的：损坏的长度前缀不提供任何可靠的重同步点，连接层只能关闭或重置连接。
//! - [`FrameError`] 承载“流已损坏”的具体原因，[`ConfigError`] 承载分帧配置的校验失败。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接用 `?` 传播；
//! - 每个 [`FrameError`] 变体提供稳定的 `code()`，遵循 `<域>.<语义>` 命名，便于日志与指标聚合。

use thiserror::Error;

/// 稳定错误码，遵循 `<域>.<语义>` 约定。
pub mod codes {
    /// 长度前缀声明的帧长超出 `[min, max]`。
    pub const FRAME_LENGTH: &str = "protocol.frame_length";
    /// HTTP 起始行非法。
    pub const HTTP_START_LINE: &str = "protocol.http_start_line";
    /// HTTP 头部行非法。
    pub const HTTP_HEADER: &str = "protocol.http_header";
    /// `Content-Length` 非法或相互矛盾。
    pub const HTTP_CONTENT_LENGTH: &str = "protocol.http_content_length";
    /// 不支持的 `Transfer-Encoding`。
    pub const HTTP_TRANSFER_ENCODING: &str = "protocol.http_transfer_encoding";
    /// chunked 编码体非法。
    pub const HTTP_CHUNK: &str = "protocol.http_chunk";
    /// 头部或整条消息超出配置上限。
    pub const BUDGET_EXCEEDED: &str = "protocol.budget_exceeded";
    /// 编码时帧长无法放入长度前缀。
    pub const ENCODE_OVERFLOW: &str = "protocol.encode_overflow";
}

/// 流已损坏的原因，对应分帧结果中的 `INVALID`。
///
/// # 教案式说明
/// - **意图 (Why)**：区分不同的损坏原因，便于排障与告警；但所有变体对连接层的处置完全相同：终止当前流。
/// - **契约 (What)**：返回该错误时输入缓冲保持调用前的状态，不会被部分消费。
/// - **风险 (Trade-offs)**：错误只携带长度等数值上下文，不复制原始报文，避免把对端可控的数据带入日志。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FrameError {
    /// 长度前缀声明的总帧长（含前缀）不在允许范围内。
    #[error("declared frame length {declared} outside allowed range [{min}, {max}]")]
    LengthOutOfBounds {
        /// 前缀中读出的总帧长。
        declared: u32,
        /// 生效的下限（已被前缀宽度抬高）。
        min: u32,
        /// 上限。
        max: u32,
    },

    /// 既不是请求行也不是状态行。
    #[error("malformed HTTP start line")]
    MalformedStartLine,

    /// 头部行缺少冒号、名称为空或包含非法字符。
    #[error("malformed HTTP header line {line}")]
    MalformedHeader {
        /// 出错的头部行序号（起始行之后从 1 开始计数）。
        line: usize,
    },

    /// `Content-Length` 不是十进制数字或溢出。
    #[error("invalid Content-Length value")]
    InvalidContentLength,

    /// 多个 `Content-Length` 头取值不一致。
    #[error("conflicting Content-Length values {first} and {second}")]
    ConflictingContentLength {
        /// 先出现的取值。
        first: usize,
        /// 与之冲突的取值。
        second: usize,
    },

    /// `Transfer-Encoding` 的最后一个编码不是 `chunked`，无法确定消息边界。
    #[error("unsupported Transfer-Encoding, final coding must be chunked")]
    UnsupportedTransferEncoding,

    /// chunk 大小行或 chunk 数据后的 CRLF 非法。
    #[error("malformed chunked body at offset {offset}")]
    MalformedChunk {
        /// 出错位置相对消息起点的偏移。
        offset: usize,
    },

    /// 头部块超过上限仍未结束。
    #[error("HTTP header block exceeds {limit} bytes")]
    HeaderTooLarge {
        /// 配置的头部上限。
        limit: usize,
    },

    /// 整条消息超过上限。
    #[error("HTTP message exceeds {limit} bytes")]
    MessageTooLarge {
        /// 配置的消息上限。
        limit: usize,
    },

    /// 编码时 `len + width` 超出前缀可表示的范围。
    #[error("frame body of {len} bytes does not fit a {width}-byte length prefix")]
    EncodeOverflow {
        /// 帧体长度。
        len: usize,
        /// 前缀宽度（字节）。
        width: usize,
    },
}

impl FrameError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::LengthOutOfBounds { .. } => codes::FRAME_LENGTH,
            FrameError::MalformedStartLine => codes::HTTP_START_LINE,
            FrameError::MalformedHeader { .. } => codes::HTTP_HEADER,
            FrameError::InvalidContentLength | FrameError::ConflictingContentLength { .. } => {
                codes::HTTP_CONTENT_LENGTH
            }
            FrameError::UnsupportedTransferEncoding => codes::HTTP_TRANSFER_ENCODING,
            FrameError::MalformedChunk { .. } => codes::HTTP_CHUNK,
            FrameError::HeaderTooLarge { .. } | FrameError::MessageTooLarge { .. } => {
                codes::BUDGET_EXCEEDED
            }
            FrameError::EncodeOverflow { .. } => codes::ENCODE_OVERFLOW,
        }
    }
}

/// 分帧配置解码或校验失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本无法解析为 [`FramingConfig`](crate::FramingConfig)。
    #[error("failed to parse framing config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 前缀宽度不是 1、2 或 4。
    #[error("unsupported length prefix width {0}, expected 1, 2 or 4")]
    UnsupportedWidth(u8),

    /// `max` 超出前缀宽度可表示的最大值。
    #[error("max frame length {max} cannot be expressed in a {width}-byte prefix")]
    MaxExceedsWidth {
        /// 配置的上限。
        max: u32,
        /// 前缀宽度（字节）。
        width: usize,
    },

    /// `min > max`。
    #[error("min frame length {min} is greater than max {max}")]
    InvertedBounds {
        /// 配置的下限。
        min: u32,
        /// 配置的上限。
        max: u32,
    },

    /// 某个上限被配置为 0。
    #[error("`{0}` must be greater than zero")]
    ZeroLimit(&'static str),
}
