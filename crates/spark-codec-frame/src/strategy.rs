//! 分帧策略的统一契约。
//!
//! ## 设计背景（Why）
//! - 连接层只关心“从缓冲里取出下一帧”，不关心具体协议；所有策略共享同一个函数形状
//!   `(&mut ChunkedBuffer) -> FrameResult`，可以在运行时按配置选择，也可以传入任意闭包。
//!
//! ## 逻辑解析（How）
//! - [`FrameParser`] 是开放的扩展点，对满足签名的闭包提供了 blanket 实现；
//! - [`FramingStrategy`] 是内置策略的封闭集合，由配置构造，并在每次判定时输出结构化日志；
//! - [`Frames`] 把“反复调用直到不再得到帧”的循环包装成迭代器，[`drain_frames`] 则是其推送式版本。
//!
//! ## 契约说明（What）
//! - 解析函数返回 `Incomplete` 或 `Err` 时不得修改缓冲；返回 `Complete` 时缓冲恰好前进一帧；
//! - 一次 `Complete` 之后缓冲中可能仍有完整帧，调用方应继续调用直到 `Incomplete`。

use bytes::Bytes;
use spark_buffer::ChunkedBuffer;
use tracing::{debug, trace};

use crate::{
    FrameError, FrameOutcome, FrameResult, FrameStatus, HttpLimits, LengthWidth, parse_echo,
    parse_http, parse_length_prefixed,
};

/// 分帧函数契约。
///
/// # 契约说明（What）
/// - **前置条件**：`buf` 的开头即下一帧的起点；
/// - **后置条件**：`Ok(Incomplete)` 与 `Err(_)` 不修改缓冲，`Ok(Complete(frame))` 恰好消费一帧；
/// - 同一缓冲状态下重复调用必须得到相同结果。
pub trait FrameParser {
    /// 尝试从缓冲开头取出一帧。
    fn parse(&self, buf: &mut ChunkedBuffer) -> FrameResult;

    /// 以迭代器形式逐帧取出缓冲中已完整到达的帧。
    fn frames<'a>(&'a self, buf: &'a mut ChunkedBuffer) -> Frames<'a, Self>
    where
        Self: Sized,
    {
        Frames {
            parser: self,
            buf,
            done: false,
        }
    }
}

impl<F> FrameParser for F
where
    F: Fn(&mut ChunkedBuffer) -> FrameResult,
{
    fn parse(&self, buf: &mut ChunkedBuffer) -> FrameResult {
        self(buf)
    }
}

/// 内置分帧策略。
///
/// # 设计背景（Why）
/// - 协议在连接建立时按配置选定，之后不再变化；封闭枚举避免了动态分发，也便于从配置反序列化。
///
/// # 风险提示（Trade-offs）
/// - 直接构造的变体不做参数校验；需要校验时通过 [`FramingConfig`](crate::FramingConfig) 构造。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FramingStrategy {
    /// 长度前缀帧，返回帧体。
    Prefixed {
        /// 前缀宽度。
        width: LengthWidth,
        /// 整帧长度下限（含前缀）。
        min: u32,
        /// 整帧长度上限（含前缀）。
        max: u32,
    },
    /// HTTP/1.x 消息，返回整条消息。
    Http(HttpLimits),
    /// 把当前缓冲的全部字节作为一帧。
    Echo,
}

impl FramingStrategy {
    /// 长度前缀策略。
    pub fn prefixed(width: LengthWidth, min: u32, max: u32) -> Self {
        FramingStrategy::Prefixed { width, min, max }
    }

    /// 使用默认上限的 HTTP 策略。
    pub fn http() -> Self {
        FramingStrategy::Http(HttpLimits::default())
    }

    /// 策略名称，用于日志字段。
    pub fn name(&self) -> &'static str {
        match self {
            FramingStrategy::Prefixed { .. } => "prefixed",
            FramingStrategy::Http(_) => "http",
            FramingStrategy::Echo => "echo",
        }
    }

    fn dispatch(&self, buf: &mut ChunkedBuffer) -> FrameResult {
        match self {
            FramingStrategy::Prefixed { width, min, max } => {
                parse_length_prefixed(buf, *width, *min, *max)
            }
            FramingStrategy::Http(limits) => parse_http(buf, limits),
            FramingStrategy::Echo => parse_echo(buf),
        }
    }
}

impl FrameParser for FramingStrategy {
    fn parse(&self, buf: &mut ChunkedBuffer) -> FrameResult {
        let buffered = buf.len();
        let result = self.dispatch(buf);
        match &result {
            Ok(FrameOutcome::Complete(frame)) => trace!(
                strategy = self.name(),
                frame_len = frame.len(),
                remaining = buf.len(),
                "frame complete"
            ),
            Ok(FrameOutcome::Incomplete) => trace!(
                strategy = self.name(),
                buffered,
                status = FrameStatus::Incomplete.as_str(),
                "awaiting more bytes"
            ),
            Err(error) => debug!(
                strategy = self.name(),
                code = error.code(),
                buffered,
                %error,
                "stream rejected"
            ),
        }
        result
    }
}

/// 逐帧迭代器，由 [`FrameParser::frames`] 创建。
///
/// 遇到 `Incomplete` 时结束；遇到损坏时产出一次 `Err` 后结束，之后始终返回 `None`。
#[derive(Debug)]
pub struct Frames<'a, P> {
    parser: &'a P,
    buf: &'a mut ChunkedBuffer,
    done: bool,
}

impl<P: FrameParser> Iterator for Frames<'_, P> {
    type Item = Result<Bytes, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.parse(self.buf) {
            Ok(FrameOutcome::Complete(frame)) => Some(Ok(frame)),
            Ok(FrameOutcome::Incomplete) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

impl<P: FrameParser> std::iter::FusedIterator for Frames<'_, P> {}

/// 把缓冲中所有已完整到达的帧依次交给 `sink`，返回交付的帧数。
///
/// 流损坏时立即返回错误，此前已交付的帧不受影响，损坏点之后的字节仍留在缓冲中。
pub fn drain_frames<P, F>(
    buf: &mut ChunkedBuffer,
    parser: &P,
    mut sink: F,
) -> Result<usize, FrameError>
where
    P: FrameParser + ?Sized,
    F: FnMut(Bytes),
{
    let mut delivered = 0;
    while let FrameOutcome::Complete(frame) = parser.parse(buf)? {
        sink(frame);
        delivered += 1;
    }
    Ok(delivered)
}
