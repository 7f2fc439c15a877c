#![warn(missing_docs)]

//! `spark-buffer` 提供连接层收发两侧的字节缓冲。
//!
//! # 模块定位（Why）
//! - 套接字读取得到的字节块大小是任意的，协议帧可能跨越多个块，也可能一个块里有多个帧；
//!   接收侧需要一个“像连续内存一样可窥视、可消费”但不急于合并的缓冲。
//! - 发送侧需要记录一次写调用只写出了多少字节，以便下次从剩余部分继续。
//!
//! # 设计概要（How）
//! - `chunked` 模块实现 [`ChunkedBuffer`]：以 `bytes::Bytes` 分片队列 + 首分片偏移表示未消费字节，
//!   提供跨分片 `peek`/`consume`、大端标量读取与零拷贝帧切分；[`ChunkedCursor`] 支持从当前位置连续查找与读取；
//! - `send` 模块实现 [`SendBuffer`]：单块可增长存储 + 发送游标；
//! - 两者都实现 `bytes::Buf`，可直接交给基于 `bytes` 生态的编解码与传输组件。
//!
//! # 契约（What）
//! - 所有操作都是同步、无阻塞、无内部锁的纯内存计算，不执行 I/O；
//! - 越界消费/越界推进视为调用方编程错误，直接 panic，与协议层的“非法帧”严格区分。

mod chunked;
mod send;

pub use chunked::{ChunkedBuffer, ChunkedCursor};
pub use send::SendBuffer;
