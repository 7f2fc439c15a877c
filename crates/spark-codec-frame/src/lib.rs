#![warn(missing_docs)]

//! `spark-codec-frame` 在分片接收缓冲之上提供流式分帧策略。
//!
//! # 教案背景（Why）
//! - 传输层交付的字节分片与协议帧边界无关：一帧可能跨多个分片，一个分片也可能包含多帧；
//! - 本 crate 把“从 [`ChunkedBuffer`](spark_buffer::ChunkedBuffer) 开头判定并取出一帧”
//!   抽象为统一契约，连接层据此循环取帧、等待数据或关闭连接。
//!
//! # 使用概览（How）
//! - 长度前缀：[`parse_length_prefixed`] 及 [`parse_binary1`]/[`parse_binary2`]/[`parse_binary4`]，
//!   对应的编码端为 [`encode_length_prefixed`]；
//! - HTTP/1.x：[`parse_http`]，按 [`HttpLimits`] 约束头部与消息大小；
//! - 回显：[`parse_echo`]；
//! - 运行时选择：[`FramingStrategy`]（可由 [`FramingConfig`] 构造），或任意满足 [`FrameParser`] 的闭包；
//! - 连接循环：[`FrameParser::frames`] 迭代器或 [`drain_frames`]。
//!
//! # 合约说明（What）
//! - 每次分帧尝试返回 [`FrameResult`]：`Ok(Incomplete)` 不修改缓冲，`Ok(Complete)` 恰好消费一帧，
//!   `Err(FrameError)` 表示流已损坏且缓冲不被修改；
//! - 错误码遵循 [`codes`] 约定，便于在指标、日志中统一聚合。
//!
//! # 风险提示与后续（Trade-offs）
//! - 损坏的流不尝试重同步，调用方应关闭或重置连接；
//! - HTTP 分帧只确定消息边界，不解释头部语义，也不支持以连接关闭界定的响应体。

mod config;
mod echo;
mod error;
mod http;
mod outcome;
mod prefixed;
mod strategy;

pub use crate::config::FramingConfig;
pub use crate::echo::parse_echo;
pub use crate::error::{ConfigError, FrameError, codes};
pub use crate::http::{HttpLimits, parse_http};
pub use crate::outcome::{FrameOutcome, FrameResult, FrameStatus};
pub use crate::prefixed::{
    LengthWidth, encode_frame, encode_length_prefixed, parse_binary1, parse_binary2,
    parse_binary4, parse_length_prefixed,
};
pub use crate::strategy::{FrameParser, Frames, FramingStrategy, drain_frames};
