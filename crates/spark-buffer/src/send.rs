use std::mem;

use bytes::Buf;

/// `SendBuffer` 暂存待发送字节，并记录已写出到传输层的前缀长度。
///
/// # 设计动机（Why）
/// - 传输层的一次 `write` 往往只接受部分字节；连接层需要记住“已经发出多少”，
///   下次从剩余部分继续写，而不是重新拷贝未发送的尾部。
///
/// # 契约说明（What）
/// - 不变式：`0 <= pos <= data.len()`，剩余待发送长度为 `data.len() - pos`；
/// - [`advance`](Self::advance) 上报实际写出的字节数，全部写完后自动清空存储（保留容量）；
/// - [`swap_out`](Self::swap_out) 以 O(1) 交换整块存储，便于把待发送数据整体交给传输层。
///
/// # 风险提示（Trade-offs）
/// - 发送游标与 [`ChunkedBuffer`](crate::ChunkedBuffer) 的首分片偏移各自独立维护，
///   二者语义相近但绝不能共用，否则会同时破坏收发两条路径。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl SendBuffer {
    /// 创建空的发送缓冲。
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 `src` 的副本预填充发送缓冲。
    pub fn from_slice(src: &[u8]) -> Self {
        Self {
            data: src.to_vec(),
            pos: 0,
        }
    }

    /// 整体替换内容，游标归零。
    pub fn assign(&mut self, src: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(src);
        self.pos = 0;
    }

    /// 在末尾追加字节，不影响游标。
    pub fn append_copy(&mut self, src: &[u8]) {
        self.data.extend_from_slice(src);
    }

    /// 与调用方交换底层存储（双向所有权转移），游标归零。
    ///
    /// 交换出去的是完整存储，包括已发送的前缀；调用方通常在缓冲刚组装完毕、
    /// 尚未发送任何字节时使用。
    pub fn swap_out(&mut self, other: &mut Vec<u8>) {
        mem::swap(&mut self.data, other);
        self.pos = 0;
    }

    /// 用 `data` 替换存储，并把游标设为 `pos`。
    ///
    /// # Panics
    /// `pos > data.len()` 时 panic。
    pub fn set_buffer(&mut self, data: Vec<u8>, pos: usize) {
        assert!(
            pos <= data.len(),
            "SendBuffer::set_buffer 游标越界：pos {pos}，长度 {}",
            data.len()
        );
        self.data = data;
        self.pos = pos;
    }

    /// 暴露完整的底层存储（含已发送前缀），供调用方原地组装数据。
    ///
    /// 调用方不得把存储截断到游标之前。
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// 记录从游标起又有 `n` 个字节已被写出；全部写完时自动清空存储。
    ///
    /// # Panics
    /// `n` 会让游标越过末尾时 panic，这表示调用方上报了错误的写出字节数。
    pub fn advance(&mut self, n: usize) {
        let remaining = self.remaining_len();
        assert!(
            n <= remaining,
            "SendBuffer::advance 越界：上报 {n} 字节，剩余 {remaining} 字节"
        );
        self.pos += n;
        if self.pos == self.data.len() {
            self.clear();
        }
    }

    /// 尚未发送的后缀，可直接交给传输层的写调用。
    pub fn remaining(&self) -> &[u8] {
        debug_assert!(self.pos <= self.data.len(), "存储被截断到游标之前");
        self.data.get(self.pos..).unwrap_or_default()
    }

    /// 尚未发送的字节数。
    pub fn remaining_len(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// 已发送的字节数（即游标位置）。
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 游标是否已经到达末尾。
    pub fn is_empty(&self) -> bool {
        self.data.len() <= self.pos
    }

    /// 丢弃全部内容并将游标归零，保留已分配的容量。
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }
}

impl From<Vec<u8>> for SendBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Buf for SendBuffer {
    fn remaining(&self) -> usize {
        self.remaining_len()
    }

    fn chunk(&self) -> &[u8] {
        SendBuffer::remaining(self)
    }

    fn advance(&mut self, cnt: usize) {
        SendBuffer::advance(self, cnt);
    }
}
