//! 长度前缀分帧。
//!
//! ## 线格式（What）
//! - 帧头是宽度为 1、2 或 4 字节的大端无符号整数，取值为**整帧**长度（含前缀本身）；
//! - 帧头之后紧跟 `取值 - 宽度` 字节的帧体；
//! - 取值落在调用方声明的 `[min, max]` 之外即视为流已损坏。
//!
//! ## 关键流程（How）
//! 1. 前缀未到齐返回 `Incomplete`；
//! 2. 只窥视前缀，按 `max(min, 宽度)` 与 `max` 校验；
//! 3. 整帧未到齐返回 `Incomplete`，游标不动，下次到达数据后重新检查同一批字节；
//! 4. 到齐后消费前缀，再切出帧体返回。

use bytes::{BufMut, Bytes, BytesMut};
use spark_buffer::ChunkedBuffer;

use crate::{FrameError, FrameOutcome, FrameResult};

/// 长度前缀宽度。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LengthWidth {
    /// 1 字节。
    One,
    /// 2 字节，大端。
    Two,
    /// 4 字节，大端。
    Four,
}

impl LengthWidth {
    /// 由字节数构造，仅接受 1、2、4。
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(LengthWidth::One),
            2 => Some(LengthWidth::Two),
            4 => Some(LengthWidth::Four),
            _ => None,
        }
    }

    /// 前缀占用的字节数。
    pub const fn bytes(self) -> usize {
        match self {
            LengthWidth::One => 1,
            LengthWidth::Two => 2,
            LengthWidth::Four => 4,
        }
    }

    /// 前缀可表示的最大整帧长度。
    pub const fn max_value(self) -> u32 {
        match self {
            LengthWidth::One => u8::MAX as u32,
            LengthWidth::Two => u16::MAX as u32,
            LengthWidth::Four => u32::MAX,
        }
    }

    fn peek_declared(self, buf: &ChunkedBuffer) -> u32 {
        match self {
            LengthWidth::One => u32::from(buf.read_u8()),
            LengthWidth::Two => u32::from(buf.read_u16()),
            LengthWidth::Four => buf.read_u32(),
        }
    }
}

/// 从缓冲开头尝试切出一个长度前缀帧，成功时只返回帧体（不含前缀）。
///
/// ### 契约说明（What）
/// - `min`/`max` 约束的是**整帧**长度（含前缀）；`min` 小于前缀宽度时按前缀宽度计；
/// - 整帧长度恰为 `max` 时成功，`max + 1` 返回 [`FrameError::LengthOutOfBounds`]；
/// - `Incomplete` 与 `Err` 两条路径都不修改缓冲。
pub fn parse_length_prefixed(
    buf: &mut ChunkedBuffer,
    width: LengthWidth,
    min: u32,
    max: u32,
) -> FrameResult {
    let prefix = width.bytes();
    if buf.len() < prefix {
        return Ok(FrameOutcome::Incomplete);
    }

    let declared = width.peek_declared(buf);
    let min = min.max(prefix as u32);
    if declared < min || declared > max {
        return Err(FrameError::LengthOutOfBounds { declared, min, max });
    }

    let Ok(total) = usize::try_from(declared) else {
        return Err(FrameError::LengthOutOfBounds { declared, min, max });
    };
    if buf.len() < total {
        return Ok(FrameOutcome::Incomplete);
    }

    buf.consume(prefix);
    Ok(FrameOutcome::Complete(buf.split_frame(total - prefix)))
}

/// 1 字节长度前缀。
pub fn parse_binary1(buf: &mut ChunkedBuffer, min: u8, max: u8) -> FrameResult {
    parse_length_prefixed(buf, LengthWidth::One, u32::from(min), u32::from(max))
}

/// 2 字节大端长度前缀。
pub fn parse_binary2(buf: &mut ChunkedBuffer, min: u16, max: u16) -> FrameResult {
    parse_length_prefixed(buf, LengthWidth::Two, u32::from(min), u32::from(max))
}

/// 4 字节大端长度前缀。
pub fn parse_binary4(buf: &mut ChunkedBuffer, min: u32, max: u32) -> FrameResult {
    parse_length_prefixed(buf, LengthWidth::Four, min, max)
}

/// 把 `body` 编码为长度前缀帧追加到 `dst`：前缀取值为 `body.len() + 宽度`。
///
/// 整帧长度超出前缀可表示范围时返回 [`FrameError::EncodeOverflow`]，`dst` 不被修改。
pub fn encode_length_prefixed(
    width: LengthWidth,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<(), FrameError> {
    let overflow = || FrameError::EncodeOverflow {
        len: body.len(),
        width: width.bytes(),
    };
    let total = body.len().checked_add(width.bytes()).ok_or_else(overflow)?;

    dst.reserve(total);
    match width {
        LengthWidth::One => dst.put_u8(u8::try_from(total).map_err(|_| overflow())?),
        LengthWidth::Two => dst.put_u16(u16::try_from(total).map_err(|_| overflow())?),
        LengthWidth::Four => dst.put_u32(u32::try_from(total).map_err(|_| overflow())?),
    }
    dst.put_slice(body);
    Ok(())
}

/// [`encode_length_prefixed`] 的便捷形式，返回独立的 [`Bytes`]。
pub fn encode_frame(width: LengthWidth, body: &[u8]) -> Result<Bytes, FrameError> {
    let mut dst = BytesMut::new();
    encode_length_prefixed(width, body, &mut dst)?;
    Ok(dst.freeze())
}
