//! 回显分帧：把当前缓冲的全部字节视为一帧。

use spark_buffer::ChunkedBuffer;

use crate::{FrameOutcome, FrameResult};

/// 取走缓冲中的全部字节；缓冲为空时返回 `Incomplete`，从不判定非法。
pub fn parse_echo(buf: &mut ChunkedBuffer) -> FrameResult {
    if buf.is_empty() {
        return Ok(FrameOutcome::Incomplete);
    }
    let len = buf.len();
    Ok(FrameOutcome::Complete(buf.split_frame(len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_everything_across_chunks() {
        let mut buf = ChunkedBuffer::new();
        buf.append_copy(b"ab");
        buf.append_copy(b"cd");
        buf.consume(1);
        assert_eq!(
            parse_echo(&mut buf),
            Ok(FrameOutcome::Complete(bytes::Bytes::from_static(b"bcd")))
        );
        assert!(buf.is_empty());
        assert_eq!(parse_echo(&mut buf), Ok(FrameOutcome::Incomplete));
    }
}
