//! `framing_contract` 集成测试：验证分帧结果与分片方式无关，且三态判定符合契约。
//!
//! # 测试目标（Why）
//! - 同一字节流无论被传输层切成怎样的分片，取出的帧序列都必须一致；
//! - `Incomplete` 与 `Err` 不得修改缓冲，同一状态下重复调用结果相同。

use bytes::BytesMut;
use proptest::prelude::*;
use spark_buffer::{ChunkedBuffer, SendBuffer};
use spark_codec_frame::{
    FrameError, FrameOutcome, FrameParser, FrameResult, FrameStatus, FramingStrategy, HttpLimits,
    LengthWidth, drain_frames, encode_length_prefixed, parse_binary1, parse_binary2,
};

/// 按切分点把 `stream` 喂给 `parser`，每次到达数据后取尽已完整的帧。
fn frames_under_cuts(
    parser: &impl FrameParser,
    stream: &[u8],
    cuts: &[usize],
) -> Result<Vec<Vec<u8>>, FrameError> {
    let mut points: Vec<usize> = cuts.iter().map(|cut| cut % (stream.len() + 1)).collect();
    points.push(0);
    points.push(stream.len());
    points.sort_unstable();
    points.dedup();

    let mut buf = ChunkedBuffer::new();
    let mut frames = Vec::new();
    for window in points.windows(2) {
        buf.append_copy(&stream[window[0]..window[1]]);
        drain_frames(&mut buf, parser, |frame| frames.push(frame.to_vec()))?;
    }
    Ok(frames)
}

#[test]
fn split_delivery_reports_incomplete_then_complete() {
    let mut buf = ChunkedBuffer::new();
    buf.append_copy(&[0x00, 0x05]);
    assert_eq!(parse_binary2(&mut buf, 2, 10), Ok(FrameOutcome::Incomplete));
    buf.append_copy(&[0x41, 0x42]);
    assert_eq!(parse_binary2(&mut buf, 2, 10), Ok(FrameOutcome::Incomplete));
    buf.append_copy(&[0x43]);
    let frame = parse_binary2(&mut buf, 2, 10)
        .expect("合法帧")
        .into_frame()
        .expect("应得到一帧");
    assert_eq!(&frame[..], &[0x41, 0x42, 0x43]);
}

#[test]
fn multiple_frames_in_one_chunk() {
    let mut buf = ChunkedBuffer::new();
    buf.append_copy(&[0x02, 0x10, 0x03, 0x20, 0x21]);
    assert!(parse_binary1(&mut buf, 1, 8).expect("第一帧").is_complete());
    assert!(parse_binary1(&mut buf, 1, 8).expect("第二帧").is_complete());
    assert_eq!(parse_binary1(&mut buf, 1, 8), Ok(FrameOutcome::Incomplete));
}

#[test]
fn non_complete_results_are_idempotent() {
    let strategies = [
        FramingStrategy::prefixed(LengthWidth::Two, 2, 10),
        FramingStrategy::http(),
    ];
    let inputs: [&[u8]; 4] = [
        &[0x00, 0x09, 0x01],
        &[0x00, 0x20],
        b"GET / HTTP/1.1\r\nHost",
        b"GET / HTTP/1.1 trailing\r\n\r\n",
    ];
    for strategy in &strategies {
        for input in inputs {
            let mut buf = ChunkedBuffer::from(input.to_vec());
            let first = strategy.parse(&mut buf);
            if FrameStatus::of(&first) == FrameStatus::Complete {
                continue;
            }
            let second = strategy.parse(&mut buf);
            assert_eq!(first, second, "{} 对 {input:?} 的判定不稳定", strategy.name());
            assert_eq!(buf.snapshot_all(), input, "非 Complete 结果不得修改缓冲");
        }
    }
}

#[test]
fn http_pipeline_under_arbitrary_delivery() {
    let stream: &[u8] = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc\
GET /b HTTP/1.1\r\n\r\n\
HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\n\r\n";
    let strategy = FramingStrategy::Http(HttpLimits::default());
    let whole = frames_under_cuts(&strategy, stream, &[]).expect("合法流");
    assert_eq!(whole.len(), 3);
    assert_eq!(whole.concat(), stream, "HTTP 分帧返回原始报文");

    for cut in 1..stream.len() {
        let split = frames_under_cuts(&strategy, stream, &[cut, cut / 2]).expect("合法流");
        assert_eq!(split, whole, "在 {cut} 处切分后帧序列发生变化");
    }
}

#[test]
fn echo_round_trip_through_send_buffer() {
    let strategy = FramingStrategy::Echo;
    let mut inbound = ChunkedBuffer::new();
    let mut outbound = SendBuffer::new();

    inbound.append_copy(b"ping ");
    inbound.append_move(&mut b"pong".to_vec());
    drain_frames(&mut inbound, &strategy, |frame| outbound.append_copy(&frame)).expect("回显不会失败");

    assert!(inbound.is_empty());
    assert_eq!(outbound.remaining(), b"ping pong");
    assert_eq!(strategy.parse(&mut inbound), Ok(FrameOutcome::Incomplete));
}

#[test]
fn closure_parser_uses_buffer_primitives() {
    // 以换行结尾的文本行，最长 16 字节。
    let line = |buf: &mut ChunkedBuffer| -> FrameResult {
        match buf.find_within(0, 16, b"\n") {
            Some(end) => Ok(FrameOutcome::Complete(buf.split_frame(end + 1))),
            None if buf.len() >= 16 => Err(FrameError::MessageTooLarge { limit: 16 }),
            None => Ok(FrameOutcome::Incomplete),
        }
    };
    let frames = frames_under_cuts(&line, b"one\ntwo\nthree\n", &[2, 5, 9]).expect("合法流");
    assert_eq!(frames, vec![b"one\n".to_vec(), b"two\n".to_vec(), b"three\n".to_vec()]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// 编码后的帧流在任意切分下都能被还原为原始帧体序列。
    #[test]
    fn prop_prefixed_frames_survive_any_split(
        bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..8),
        cuts in prop::collection::vec(any::<usize>(), 0..12),
        width in prop::sample::select(vec![LengthWidth::One, LengthWidth::Two, LengthWidth::Four]),
    ) {
        let mut stream = BytesMut::new();
        for body in &bodies {
            encode_length_prefixed(width, body, &mut stream).expect("帧体足够短");
        }
        let strategy = FramingStrategy::prefixed(width, 0, 64);
        let frames = frames_under_cuts(&strategy, &stream, &cuts).expect("合法流");
        prop_assert_eq!(frames, bodies);
    }

    /// 声明长度越界时，无论帧体是否到达都立即判定为非法，且缓冲保持原样。
    #[test]
    fn prop_out_of_bounds_prefix_is_invalid(declared in 11u16.., tail in prop::collection::vec(any::<u8>(), 0..4)) {
        let mut input = declared.to_be_bytes().to_vec();
        input.extend_from_slice(&tail);
        let mut buf = ChunkedBuffer::from(input.clone());
        let result = parse_binary2(&mut buf, 2, 10);
        let is_length_error = matches!(result, Err(FrameError::LengthOutOfBounds { .. }));
        prop_assert!(is_length_error);
        prop_assert_eq!(buf.snapshot_all(), input);
    }
}
