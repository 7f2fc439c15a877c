//! HTTP/1.x 消息分帧。
//!
//! ## 模块目的（Why）
//! - 连接层只需要知道“一条完整的 HTTP 消息在哪里结束”，头部语义（方法、状态码、各类头字段）
//!   交给下游处理；本模块只负责找出消息边界并拒绝明显畸形的报文。
//!
//! ## 关键流程（How）
//! 1. 在 `max_header_bytes` 范围内跨分片查找 `\r\n\r\n`，未找到且已超限即判定非法；
//! 2. 只把头部块复制成一段连续内存，校验起始行与每个头部行；
//! 3. 根据 `Transfer-Encoding` / `Content-Length` / 响应状态码确定消息体长度；
//!    chunked 编码逐个定位 chunk 边界，消息体本身在最终切分前不复制；
//! 4. 整条消息到齐后原样切出（含起始行、头部与消息体）。
//!
//! ## 风险提示（Trade-offs）
//! - 每次 `Incomplete` 后重新从头扫描：头部扫描成本受 `max_header_bytes` 约束，
//!   chunked 消息体由只进游标单趟遍历，chunk 数据直接跳过，单次调用成本与已缓冲的分片数及 chunk 行数成线性；
//! - 不支持“读到连接关闭为止”的响应体：没有长度信息的响应视为空体，
//!   最终编码不是 chunked 的 `Transfer-Encoding` 直接判为非法。

use spark_buffer::{ChunkedBuffer, ChunkedCursor};

use crate::{FrameError, FrameOutcome, FrameResult};

const CRLF: &[u8; 2] = b"\r\n";
const HEADER_END: &[u8; 4] = b"\r\n\r\n";

/// chunk 大小行与 trailer 行的长度上限。
const MAX_CHUNK_LINE: usize = 4096;

/// HTTP 分帧的尺寸上限。
///
/// # 契约说明（What）
/// - `max_header_bytes`：起始行 + 头部 + 结束空行的总字节数上限；
/// - `max_message_bytes`：整条消息（含消息体）的字节数上限。
/// - 超出任一上限均视为流已损坏，防止对端用超长报文耗尽内存。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HttpLimits {
    /// 头部块上限。
    pub max_header_bytes: usize,
    /// 整条消息上限。
    pub max_message_bytes: usize,
}

impl HttpLimits {
    /// 默认头部上限：64 KiB。
    pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;
    /// 默认消息上限：16 MiB。
    pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: Self::DEFAULT_MAX_HEADER_BYTES,
            max_message_bytes: Self::DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// 起始行类型，决定消息体长度的推断规则。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StartLine {
    Request,
    Response { status: u16 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BodyKind {
    Empty,
    Sized(usize),
    Chunked,
}

/// 从缓冲开头尝试切出一条完整的 HTTP/1.x 消息。
///
/// 成功时返回整条消息的原始字节；`Incomplete` 与 `Err` 路径都不修改缓冲。
pub fn parse_http(buf: &mut ChunkedBuffer, limits: &HttpLimits) -> FrameResult {
    let head_len = match buf.find_within(0, limits.max_header_bytes, HEADER_END) {
        Some(pos) => pos + HEADER_END.len(),
        None if buf.len() >= limits.max_header_bytes => {
            return Err(FrameError::HeaderTooLarge {
                limit: limits.max_header_bytes,
            });
        }
        None => return Ok(FrameOutcome::Incomplete),
    };

    let mut head = vec![0u8; head_len - HEADER_END.len()];
    let copied = buf.peek_into(&mut head);
    debug_assert!(copied, "头部块已在缓冲中定位");
    let body = inspect_head(&head)?;

    let total = match body {
        BodyKind::Empty => head_len,
        BodyKind::Sized(len) => head_len
            .checked_add(len)
            .ok_or(FrameError::MessageTooLarge {
                limit: limits.max_message_bytes,
            })?,
        BodyKind::Chunked => match chunked_message_len(buf, head_len, limits)? {
            Some(total) => total,
            None => return Ok(FrameOutcome::Incomplete),
        },
    };

    if total > limits.max_message_bytes {
        return Err(FrameError::MessageTooLarge {
            limit: limits.max_message_bytes,
        });
    }
    if buf.len() < total {
        return Ok(FrameOutcome::Incomplete);
    }
    Ok(FrameOutcome::Complete(buf.split_frame(total)))
}

/// 校验起始行与头部行，并推断消息体形态。
fn inspect_head(head: &[u8]) -> Result<BodyKind, FrameError> {
    let mut lines = crlf_lines(head);
    let start = parse_start_line(lines.next().unwrap_or_default())?;

    let mut content_length: Option<usize> = None;
    let mut final_coding_chunked: Option<bool> = None;
    for (idx, line) in lines.enumerate() {
        let (name, value) = split_field_line(line, idx + 1)?;
        if name.eq_ignore_ascii_case(b"content-length") {
            let parsed = parse_content_length(value)?;
            match content_length {
                Some(first) if first != parsed => {
                    return Err(FrameError::ConflictingContentLength {
                        first,
                        second: parsed,
                    });
                }
                _ => content_length = Some(parsed),
            }
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            let last = value
                .split(|byte| *byte == b',')
                .map(trim_ows)
                .rfind(|coding| !coding.is_empty())
                .ok_or(FrameError::UnsupportedTransferEncoding)?;
            final_coding_chunked = Some(last.eq_ignore_ascii_case(b"chunked"));
        }
    }

    if let StartLine::Response { status } = start
        && (status < 200 || status == 204 || status == 304)
    {
        return Ok(BodyKind::Empty);
    }

    match (final_coding_chunked, content_length) {
        (Some(true), _) => Ok(BodyKind::Chunked),
        (Some(false), _) => Err(FrameError::UnsupportedTransferEncoding),
        (None, Some(len)) => Ok(BodyKind::Sized(len)),
        (None, None) => Ok(BodyKind::Empty),
    }
}

fn parse_start_line(line: &[u8]) -> Result<StartLine, FrameError> {
    if line.starts_with(b"HTTP/") {
        let mut parts = line.splitn(3, |byte| *byte == b' ');
        let version = parts.next().unwrap_or_default();
        let status = parts.next().unwrap_or_default();
        let reason = parts.next().unwrap_or_default();
        if !is_http_version(version)
            || status.len() != 3
            || !status.iter().all(u8::is_ascii_digit)
            || !reason.iter().all(|byte| is_field_byte(*byte))
        {
            return Err(FrameError::MalformedStartLine);
        }
        let status = status
            .iter()
            .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
        return Ok(StartLine::Response { status });
    }

    let mut parts = line.split(|byte| *byte == b' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(FrameError::MalformedStartLine);
    };
    if !is_token(method)
        || target.is_empty()
        || !target.iter().all(|byte| byte.is_ascii_graphic() || *byte >= 0x80)
        || !is_http_version(version)
    {
        return Err(FrameError::MalformedStartLine);
    }
    Ok(StartLine::Request)
}

/// 拆分 `name ":" OWS value OWS`；拒绝折行与非法字符。
fn split_field_line(line: &[u8], index: usize) -> Result<(&[u8], &[u8]), FrameError> {
    let malformed = FrameError::MalformedHeader { line: index };
    let colon = line
        .iter()
        .position(|byte| *byte == b':')
        .ok_or_else(|| malformed.clone())?;
    let name = &line[..colon];
    let value = trim_ows(&line[colon + 1..]);
    if !is_token(name) || !value.iter().all(|byte| is_field_byte(*byte)) {
        return Err(malformed);
    }
    Ok((name, value))
}

fn parse_content_length(value: &[u8]) -> Result<usize, FrameError> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidContentLength);
    }
    value.iter().try_fold(0usize, |acc, digit| {
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(usize::from(digit - b'0')))
            .ok_or(FrameError::InvalidContentLength)
    })
}

/// 从 `start` 起逐个定位 chunk，返回整条消息（含 trailer 与结束空行）的长度。
///
/// 数据不足时返回 `Ok(None)`；chunk 数据只跳过不复制。
fn chunked_message_len(
    buf: &ChunkedBuffer,
    start: usize,
    limits: &HttpLimits,
) -> Result<Option<usize>, FrameError> {
    let mut cursor = buf.cursor();
    if !cursor.skip(start) {
        return Ok(None);
    }
    chunked_body_end(&mut cursor, limits)
}

/// 以单趟只进游标遍历 chunked 消息体，成功时游标停在消息末尾。
fn chunked_body_end(
    cursor: &mut ChunkedCursor<'_>,
    limits: &HttpLimits,
) -> Result<Option<usize>, FrameError> {
    let too_large = FrameError::MessageTooLarge {
        limit: limits.max_message_bytes,
    };
    let mut line = [0u8; MAX_CHUNK_LINE];

    loop {
        let line_start = cursor.position();
        let Some(len) = next_line(cursor, &mut line, limits)? else {
            return Ok(None);
        };
        let size = parse_chunk_size(&line[..len], line_start)?;
        if size == 0 {
            break;
        }

        let data_end = cursor
            .position()
            .checked_add(size)
            .ok_or_else(|| too_large.clone())?;
        if data_end.saturating_add(CRLF.len()) > limits.max_message_bytes {
            return Err(too_large);
        }
        let mut delimiter = [0u8; 2];
        if !cursor.skip(size) || !cursor.read_into(&mut delimiter) {
            return Ok(None);
        }
        if &delimiter != CRLF {
            return Err(FrameError::MalformedChunk { offset: data_end });
        }
    }

    let mut trailer_index = 0;
    loop {
        let Some(len) = next_line(cursor, &mut line, limits)? else {
            return Ok(None);
        };
        if len == 0 {
            return Ok(Some(cursor.position()));
        }
        trailer_index += 1;
        split_field_line(&line[..len], trailer_index)?;
    }
}

/// 把下一行（不含 CRLF）复制进 `scratch` 并让游标越过该行的 CRLF，返回行长度。
fn next_line(
    cursor: &mut ChunkedCursor<'_>,
    scratch: &mut [u8; MAX_CHUNK_LINE],
    limits: &HttpLimits,
) -> Result<Option<usize>, FrameError> {
    let from = cursor.position();
    let line_limit = from.saturating_add(MAX_CHUNK_LINE);
    let window_end = line_limit.min(limits.max_message_bytes);
    let Some(end) = cursor.find(window_end, CRLF) else {
        let buffered = from + cursor.remaining();
        return if buffered >= window_end && window_end < line_limit {
            Err(FrameError::MessageTooLarge {
                limit: limits.max_message_bytes,
            })
        } else if buffered >= window_end {
            Err(FrameError::MalformedChunk { offset: from })
        } else {
            Ok(None)
        };
    };

    let len = end - from;
    let consumed = cursor.read_into(&mut scratch[..len]) && cursor.skip(CRLF.len());
    debug_assert!(consumed, "find 已确认整行与 CRLF 均已缓冲");
    Ok(Some(len))
}

fn parse_chunk_size(line: &[u8], offset: usize) -> Result<usize, FrameError> {
    let malformed = || FrameError::MalformedChunk { offset };
    let size_field = line
        .split(|byte| *byte == b';')
        .next()
        .map(trim_ows)
        .unwrap_or_default();
    if size_field.is_empty()
        || size_field.len() > 16
        || !size_field.iter().all(u8::is_ascii_hexdigit)
    {
        return Err(malformed());
    }
    let size = size_field.iter().fold(0u64, |acc, digit| {
        let nibble = match digit {
            b'0'..=b'9' => digit - b'0',
            b'a'..=b'f' => digit - b'a' + 10,
            _ => digit - b'A' + 10,
        };
        (acc << 4) | u64::from(nibble)
    });
    usize::try_from(size).map_err(|_| malformed())
}

fn crlf_lines(block: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(block);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.windows(CRLF.len()).position(|window| window == CRLF) {
            Some(idx) => {
                rest = Some(&current[idx + CRLF.len()..]);
                Some(&current[..idx])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn trim_ows(value: &[u8]) -> &[u8] {
    let is_ows = |byte: &u8| *byte == b' ' || *byte == b'\t';
    let start = value.iter().position(|byte| !is_ows(byte)).unwrap_or(value.len());
    let end = value
        .iter()
        .rposition(|byte| !is_ows(byte))
        .map_or(start, |idx| idx + 1);
    &value[start..end]
}

fn is_http_version(version: &[u8]) -> bool {
    matches!(version, [b'H', b'T', b'T', b'P', b'/', major, b'.', minor]
        if major.is_ascii_digit() && minor.is_ascii_digit())
}

fn is_token(value: &[u8]) -> bool {
    !value.is_empty()
        && value.iter().all(|byte| {
            byte.is_ascii_alphanumeric()
                || matches!(
                    byte,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// 字段值允许的字节：HTAB、可见 ASCII、空格与 obs-text。
fn is_field_byte(byte: u8) -> bool {
    byte == b'\t' || byte == b' ' || byte.is_ascii_graphic() || byte >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pieces: &[&[u8]]) -> (FrameResult, ChunkedBuffer) {
        let mut buf = ChunkedBuffer::new();
        for piece in pieces {
            buf.append_copy(piece);
        }
        let result = parse_http(&mut buf, &HttpLimits::default());
        (result, buf)
    }

    fn complete(result: FrameResult) -> Vec<u8> {
        match result {
            Ok(FrameOutcome::Complete(frame)) => frame.to_vec(),
            other => panic!("预期完整消息，实际: {other:?}"),
        }
    }

    #[test]
    fn request_without_body_completes_at_blank_line() {
        let (result, buf) = parse(&[b"GET /index HTTP/1.1\r\nHost: a\r\n\r\nGET"]);
        assert_eq!(complete(result), b"GET /index HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(buf.snapshot_all(), b"GET", "后续流水线请求保持缓冲");
    }

    #[test]
    fn content_length_body_waits_for_all_bytes() {
        let (result, buf) = parse(&[b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n", b"\r\nhel"]);
        assert_eq!(result, Ok(FrameOutcome::Incomplete));
        assert_eq!(buf.len(), 42);

        let (result, _) = parse(&[
            b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n",
            b"\r\nhel",
            b"lo",
        ]);
        assert!(complete(result).ends_with(b"\r\n\r\nhello"));
    }

    #[test]
    fn header_terminator_split_across_chunks() {
        let (result, _) = parse(&[b"HTTP/1.0 200 OK\r", b"\n", b"\r", b"\n"]);
        assert_eq!(complete(result), b"HTTP/1.0 200 OK\r\n\r\n");
    }

    #[test]
    fn chunked_body_with_trailer() {
        let message: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n\
4;ext=1\r\nWiki\r\n5\r\npedia\r\n0\r\nExpires: never\r\n\r\n";
        let (partial, _) = parse(&[&message[..message.len() - 2]]);
        assert_eq!(partial, Ok(FrameOutcome::Incomplete));

        let (result, buf) = parse(&[&message[..30], &message[30..], b"NEXT"]);
        assert_eq!(complete(result), message);
        assert_eq!(buf.snapshot_all(), b"NEXT");
    }

    #[test]
    fn chunk_without_trailing_crlf_is_invalid() {
        let (result, _) = parse(&[b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabcX\r\n"]);
        assert!(matches!(result, Err(FrameError::MalformedChunk { .. })));
    }

    #[test]
    fn bad_chunk_size_is_invalid() {
        let (result, _) = parse(&[b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n"]);
        assert!(matches!(result, Err(FrameError::MalformedChunk { .. })));
    }

    const CHUNKED_HEAD: &[u8] = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";

    #[test]
    fn fragmented_chunked_body_is_walked_in_one_pass() {
        let mut buf = ChunkedBuffer::new();
        buf.append_copy(CHUNKED_HEAD);
        for _ in 0..2000 {
            for byte in b"1\r\nx\r\n" {
                buf.append_copy(&[*byte]);
            }
        }
        for byte in b"0\r\n\r\n" {
            buf.append_copy(&[*byte]);
        }

        let mut cursor = buf.cursor();
        assert!(cursor.skip(CHUNKED_HEAD.len()));
        let end = chunked_body_end(&mut cursor, &HttpLimits::default()).expect("合法 chunked 消息体");
        assert_eq!(end, Some(buf.len()));
        assert!(
            cursor.segments_visited() <= 4 * buf.chunk_count(),
            "分片访问次数应与分片数成线性：{} 次 / {} 个分片",
            cursor.segments_visited(),
            buf.chunk_count()
        );

        let frame = complete(parse_http(&mut buf, &HttpLimits::default()));
        assert_eq!(frame.len(), CHUNKED_HEAD.len() + 2000 * 6 + 5);
        assert!(buf.is_empty());
    }

    #[test]
    fn overlong_chunk_size_line_is_invalid() {
        let mut buf = ChunkedBuffer::new();
        buf.append_copy(CHUNKED_HEAD);
        buf.append_copy(b"1;");
        buf.append_copy(&[b'a'; MAX_CHUNK_LINE - 8]);
        assert_eq!(
            parse_http(&mut buf, &HttpLimits::default()),
            Ok(FrameOutcome::Incomplete),
            "未达行长上限前继续等待"
        );

        buf.append_copy(&[b'a'; 8]);
        assert_eq!(
            parse_http(&mut buf, &HttpLimits::default()),
            Err(FrameError::MalformedChunk {
                offset: CHUNKED_HEAD.len()
            })
        );
    }

    #[test]
    fn trailer_without_colon_is_invalid() {
        let (result, buf) = parse(&[CHUNKED_HEAD, b"0\r\nExpires never\r\n\r\n"]);
        assert_eq!(result, Err(FrameError::MalformedHeader { line: 1 }));
        assert_eq!(buf.len(), CHUNKED_HEAD.len() + 20, "非法报文不应被消费");
    }

    #[test]
    fn chunked_body_crossing_message_limit_mid_line_is_invalid() {
        let limits = HttpLimits {
            max_header_bytes: 64,
            max_message_bytes: CHUNKED_HEAD.len() + 13,
        };
        let mut buf = ChunkedBuffer::new();
        buf.append_copy(CHUNKED_HEAD);
        buf.append_copy(b"5\r\nhello\r\n");
        buf.append_copy(b"ff");
        assert_eq!(parse_http(&mut buf, &limits), Ok(FrameOutcome::Incomplete));

        buf.append_copy(b"ffff");
        assert_eq!(
            parse_http(&mut buf, &limits),
            Err(FrameError::MessageTooLarge {
                limit: CHUNKED_HEAD.len() + 13
            })
        );
    }

    #[test]
    fn no_content_status_ignores_content_length() {
        let (result, _) = parse(&[b"HTTP/1.1 304 Not Modified\r\nContent-Length: 10\r\n\r\n"]);
        assert_eq!(
            complete(result),
            b"HTTP/1.1 304 Not Modified\r\nContent-Length: 10\r\n\r\n"
        );
    }

    #[test]
    fn malformed_start_lines_are_invalid() {
        for line in [
            &b"GARBAGE\r\n\r\n"[..],
            b"GET /\r\n\r\n",
            b"GET / HTTP/1.1 extra\r\n\r\n",
            b"HTTP/1.1 2000 OK\r\n\r\n",
            b"G(T / HTTP/1.1\r\n\r\n",
            b"\r\n\r\n",
        ] {
            let (result, buf) = parse(&[line]);
            assert_eq!(result, Err(FrameError::MalformedStartLine), "{line:?}");
            assert_eq!(buf.len(), line.len(), "非法报文不应被消费");
        }
    }

    #[test]
    fn malformed_headers_are_invalid() {
        let (missing_colon, _) = parse(&[b"GET / HTTP/1.1\r\nHost a\r\n\r\n"]);
        assert_eq!(missing_colon, Err(FrameError::MalformedHeader { line: 1 }));

        let (folded, _) = parse(&[b"GET / HTTP/1.1\r\nA: b\r\n  c\r\n\r\n"]);
        assert_eq!(folded, Err(FrameError::MalformedHeader { line: 2 }));
    }

    #[test]
    fn content_length_must_be_consistent_digits() {
        let (bad, _) = parse(&[b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n"]);
        assert_eq!(bad, Err(FrameError::InvalidContentLength));

        let (conflict, _) =
            parse(&[b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab"]);
        assert_eq!(
            conflict,
            Err(FrameError::ConflictingContentLength {
                first: 1,
                second: 2
            })
        );
    }

    #[test]
    fn non_chunked_transfer_encoding_is_rejected() {
        let (result, _) = parse(&[b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n"]);
        assert_eq!(result, Err(FrameError::UnsupportedTransferEncoding));
    }

    #[test]
    fn limits_bound_header_and_message() {
        let limits = HttpLimits {
            max_header_bytes: 32,
            max_message_bytes: 64,
        };
        let mut endless = ChunkedBuffer::new();
        endless.append_copy(&[b'a'; 40]);
        assert_eq!(
            parse_http(&mut endless, &limits),
            Err(FrameError::HeaderTooLarge { limit: 32 })
        );

        let mut big = ChunkedBuffer::new();
        big.append_copy(b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\n");
        let limits = HttpLimits {
            max_header_bytes: 64,
            max_message_bytes: 80,
        };
        assert_eq!(
            parse_http(&mut big, &limits),
            Err(FrameError::MessageTooLarge { limit: 80 })
        );
    }
}
