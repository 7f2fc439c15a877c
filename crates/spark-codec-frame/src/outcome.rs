use bytes::Bytes;

use crate::FrameError;

/// 一次分帧尝试在“未损坏”时的结果。
///
/// - `Incomplete`：数据不足，缓冲保持原样，等待更多输入后原样重试；
/// - `Complete`：取出恰好一帧，缓冲游标已越过该帧。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FrameOutcome<T> {
    /// 需要更多数据。
    Incomplete,
    /// 得到一帧。
    Complete(T),
}

impl<T> FrameOutcome<T> {
    /// 是否得到了一帧。
    pub fn is_complete(&self) -> bool {
        matches!(self, FrameOutcome::Complete(_))
    }

    /// 取出帧内容；数据不足时返回 `None`。
    pub fn into_frame(self) -> Option<T> {
        match self {
            FrameOutcome::Complete(frame) => Some(frame),
            FrameOutcome::Incomplete => None,
        }
    }

    /// 转换帧内容的类型。
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FrameOutcome<U> {
        match self {
            FrameOutcome::Complete(frame) => FrameOutcome::Complete(f(frame)),
            FrameOutcome::Incomplete => FrameOutcome::Incomplete,
        }
    }
}

/// 分帧尝试的完整结果：`Err` 即流已损坏（`INVALID`）。
pub type FrameResult<T = Bytes> = Result<FrameOutcome<T>, FrameError>;

/// 三态分帧结果的扁平视图，供连接层做分支决策或打点。
///
/// # 契约说明（What）
/// - `Incomplete`：瞬时状态，继续等待 I/O，不应作为错误记录；
/// - `Complete`：成功；若同一分片可能包含多帧，应立即再次调用分帧；
/// - `Invalid`：致命，关闭或重置连接，不尝试重同步。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FrameStatus {
    /// 数据不足。
    Incomplete,
    /// 得到一帧。
    Complete,
    /// 流已损坏。
    Invalid,
}

impl FrameStatus {
    /// 从分帧结果提取状态。
    pub fn of<T>(result: &FrameResult<T>) -> Self {
        match result {
            Ok(FrameOutcome::Incomplete) => FrameStatus::Incomplete,
            Ok(FrameOutcome::Complete(_)) => FrameStatus::Complete,
            Err(_) => FrameStatus::Invalid,
        }
    }

    /// 日志与指标使用的小写名称。
    pub fn as_str(self) -> &'static str {
        match self {
            FrameStatus::Incomplete => "incomplete",
            FrameStatus::Complete => "complete",
            FrameStatus::Invalid => "invalid",
        }
    }
}
