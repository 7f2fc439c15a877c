//! 模拟一条连接的收发循环：分片到达 → 分帧 → 回写编码后的应答 → 按配额刷出。
//!
//! 运行：`RUST_LOG=spark_codec_frame=trace cargo run -p spark-codec-frame --example frame_loop`
//! 可选参数为一个 TOML 配置文件路径，缺省使用 2 字节长度前缀。

use std::{env, error::Error, fs};

use bytes::BytesMut;
use spark_buffer::{ChunkedBuffer, SendBuffer};
use spark_codec_frame::{
    FrameParser, FramingConfig, FramingStrategy, LengthWidth, encode_length_prefixed,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = r#"
kind = "prefixed"
width = 2
min = 2
max = 1024
"#;

/// 单次写调用最多接受的字节数。
const WRITE_QUOTA: usize = 5;

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter())
        .init();

    let raw = match env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => DEFAULT_CONFIG.to_owned(),
    };
    let strategy = FramingStrategy::try_from(FramingConfig::from_toml_str(&raw)?)?;
    info!(strategy = strategy.name(), "framing strategy selected");

    let mut wire = BytesMut::new();
    for body in [&b"hello"[..], b"spark", b""] {
        encode_length_prefixed(LengthWidth::Two, body, &mut wire)?;
    }

    let mut inbound = ChunkedBuffer::new();
    let mut outbound = SendBuffer::new();
    for piece in wire.chunks(3) {
        inbound.append_copy(piece);
        for frame in strategy.frames(&mut inbound) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(code = error.code(), %error, "closing connection");
                    return Ok(());
                }
            };
            info!(frame_len = frame.len(), "frame received");
            let mut reply = BytesMut::new();
            encode_length_prefixed(LengthWidth::Two, &frame, &mut reply)?;
            outbound.append_copy(&reply);
        }
    }

    let mut writes = 0;
    while !outbound.is_empty() {
        let accepted = outbound.remaining_len().min(WRITE_QUOTA);
        outbound.advance(accepted);
        writes += 1;
    }
    info!(writes, buffered = inbound.len(), "connection drained");
    Ok(())
}
