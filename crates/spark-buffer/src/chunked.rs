use std::{collections::VecDeque, fmt, io::IoSlice, mem};

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// `ChunkedBuffer` 以分片队列累积接收到的字节，在逻辑上呈现为一段连续字节流。
///
/// # 设计动机（Why）
/// - 传输层每次 `read` 得到的字节块大小与协议帧边界毫无关系：一个完整帧可能跨越多个块，
///   一个块也可能包含多个帧；
/// - 若每次到达都把新字节拼接到一块连续内存上，长连接在高吞吐下会反复搬运已缓冲的数据，
///   因此这里保留分片，只在确有需要时复制被请求的那一段。
///
/// # 结构与不变式（How）
/// - `chunks`：按到达顺序保存的 `Bytes` 分片，追加后不再修改；
/// - `front_offset`：首个分片中已被消费的字节数，部分消费只移动该偏移而不复制；
/// - `len`：未消费字节总数，随追加/消费增量维护，读取为 O(1)。
/// - 队列中不存在空分片：空追加直接忽略，读尽的首分片立即弹出，
///   因而 `front_offset < chunks[0].len()` 恒成立，队列为空时 `front_offset == 0`。
///
/// # 契约说明（What）
/// - 追加：[`append_copy`](Self::append_copy) 复制借入的切片；
///   [`append_move`](Self::append_move) / [`append_bytes`](Self::append_bytes) 转移所有权，不复制；
/// - 观察：[`peek`](Self::peek)、[`peek_into`](Self::peek_into)、`read_u*` 只读不前移游标；
/// - 消费：[`consume`](Self::consume)、[`split_frame`](Self::split_frame) 前移游标，
///   越界属于调用方编程错误，直接 panic。
///
/// # 风险提示（Trade-offs）
/// - 实例不做内部同步，约定“一条连接一个缓冲”，由持有连接 I/O 的任务独占访问；
/// - [`snapshot_all`](Self::snapshot_all) 会完整复制所有剩余字节，仅在确实需要连续视图时使用。
#[derive(Default, Clone)]
pub struct ChunkedBuffer {
    chunks: VecDeque<Bytes>,
    front_offset: usize,
    len: usize,
}

impl ChunkedBuffer {
    /// 创建空缓冲。
    pub fn new() -> Self {
        Self::default()
    }

    /// 复制 `src` 为新的尾部分片。
    pub fn append_copy(&mut self, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        self.push_chunk(Bytes::copy_from_slice(src));
    }

    /// 取走 `src` 的所有权作为新的尾部分片，调用方的 `Vec` 被置空。
    ///
    /// 与 [`append_copy`](Self::append_copy) 的可观察结果完全一致，只是省去一次内存复制，
    /// 适合“刚填满的接收缓冲不再复用”的场景。
    pub fn append_move(&mut self, src: &mut Vec<u8>) {
        let owned = mem::take(src);
        self.append_bytes(owned);
    }

    /// 以所有权转移方式追加任意可转换为 [`Bytes`] 的分片（`Vec<u8>`、`BytesMut`、`Bytes`）。
    pub fn append_bytes(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.push_chunk(chunk);
    }

    fn push_chunk(&mut self, chunk: Bytes) {
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// 丢弃全部分片，并把总长度与首分片偏移归零。
    pub fn clear(&mut self) {
        if !self.chunks.is_empty() {
            tracing::trace!(
                discarded = self.len,
                chunks = self.chunks.len(),
                "chunked buffer cleared"
            );
        }
        self.chunks.clear();
        self.front_offset = 0;
        self.len = 0;
    }

    /// 是否没有任何未消费字节。
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 未消费字节总数。
    pub fn len(&self) -> usize {
        self.len
    }

    /// 当前仍持有的分片数量。
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// 返回首个分片中尚未消费的部分，供发送路径直接交给传输层而无需复制。
    ///
    /// 只有整个缓冲为空时才返回空切片。
    pub fn front_chunk(&self) -> &[u8] {
        match self.chunks.front() {
            Some(chunk) => &chunk[self.front_offset..],
            None => &[],
        }
    }

    /// 把所有剩余字节按顺序复制到一块新分配的连续内存。
    ///
    /// 这是唯一一个复制全部数据的操作，代价与缓冲长度成正比。
    pub fn snapshot_all(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in self.segments() {
            out.extend_from_slice(segment);
        }
        out
    }

    /// 复制接下来的 `len` 个字节而不前移游标；数据不足时返回 `None` 且无副作用。
    pub fn peek(&self, len: usize) -> Option<Vec<u8>> {
        if len > self.len {
            return None;
        }
        let mut out = vec![0u8; len];
        self.peek_into(&mut out).then_some(out)
    }

    /// 与 [`peek`](Self::peek) 相同，但以字符串形式返回，非 UTF-8 字节按替换字符处理。
    pub fn peek_string(&self, len: usize) -> Option<String> {
        self.peek(len).map(|raw| match String::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    /// 把开头 `dst.len()` 个字节写入 `dst`，不前移游标。
    ///
    /// 只复制请求的字节，必要时跨越多个分片拼接；数据不足时返回 `false` 且不修改 `dst`。
    pub fn peek_into(&self, dst: &mut [u8]) -> bool {
        self.peek_at(0, dst)
    }

    /// 从逻辑偏移 `offset` 起复制 `dst.len()` 个字节，不前移游标。
    pub fn peek_at(&self, offset: usize, dst: &mut [u8]) -> bool {
        match offset.checked_add(dst.len()) {
            Some(end) if end <= self.len => {}
            _ => return false,
        }
        let mut cursor = self.cursor();
        cursor.skip(offset) && cursor.read_into(dst)
    }

    /// 在 `[from, limit)` 范围内查找 `needle` 首次出现的逻辑偏移，可跨越分片边界。
    ///
    /// `limit` 超过缓冲长度时按缓冲长度截断；查找过程中不复制任何分片。
    /// 需要从同一位置连续查找多次时，改用 [`cursor`](Self::cursor) 避免每次从队首重新定位。
    pub fn find_within<const N: usize>(
        &self,
        from: usize,
        limit: usize,
        needle: &[u8; N],
    ) -> Option<usize> {
        let mut cursor = self.cursor();
        if !cursor.skip(from) {
            return None;
        }
        cursor.find(limit, needle)
    }

    /// 创建位于缓冲开头的只进游标。
    pub fn cursor(&self) -> ChunkedCursor<'_> {
        ChunkedCursor {
            buffer: self,
            index: 0,
            offset: self.front_offset,
            position: 0,
            visited: usize::from(!self.chunks.is_empty()),
        }
    }

    /// 将游标前移 `len` 字节。
    ///
    /// 完整读尽的首部分片直接出队；终点落在某个分片内部时，只更新该分片的偏移。
    ///
    /// # Panics
    /// `len` 大于 [`len`](Self::len) 时 panic：调用方应先检查缓冲长度，
    /// 越界消费意味着调用方逻辑错误而非网络输入异常。
    pub fn consume(&mut self, len: usize) {
        assert!(
            len <= self.len,
            "ChunkedBuffer::consume 越界：请求 {len} 字节，仅缓冲 {} 字节",
            self.len
        );

        let mut left = len;
        while left > 0 {
            let Some(front) = self.chunks.front() else {
                break;
            };
            let available = front.len() - self.front_offset;
            if left >= available {
                self.chunks.pop_front();
                self.front_offset = 0;
                left -= available;
            } else {
                self.front_offset += left;
                left = 0;
            }
        }
        self.len -= len;
    }

    /// 取出开头 `len` 个字节并前移游标，等价于 `peek` + `consume`。
    ///
    /// 请求区间完全位于首分片内时返回共享原分片的 [`Bytes`] 视图（零拷贝），
    /// 跨分片时复制一次被请求的字节。
    ///
    /// # Panics
    /// 与 [`consume`](Self::consume) 相同。
    pub fn split_frame(&mut self, len: usize) -> Bytes {
        assert!(
            len <= self.len,
            "ChunkedBuffer::split_frame 越界：请求 {len} 字节，仅缓冲 {} 字节",
            self.len
        );
        if len == 0 {
            return Bytes::new();
        }

        let frame = match self.chunks.front() {
            Some(front) if front.len() - self.front_offset >= len => {
                front.slice(self.front_offset..self.front_offset + len)
            }
            _ => {
                let mut stitched = BytesMut::with_capacity(len);
                for segment in self.segments() {
                    let take = segment.len().min(len - stitched.len());
                    stitched.put_slice(&segment[..take]);
                    if stitched.len() == len {
                        break;
                    }
                }
                stitched.freeze()
            }
        };
        self.consume(len);
        frame
    }

    /// 以大端序读取 1 字节无符号整数，不前移游标；数据不足时返回 `0`。
    pub fn read_u8(&self) -> u8 {
        self.read_be::<1>().map_or(0, u8::from_be_bytes)
    }

    /// 以大端序读取 2 字节无符号整数，不前移游标；数据不足时返回 `0`。
    pub fn read_u16(&self) -> u16 {
        self.read_be::<2>().map_or(0, u16::from_be_bytes)
    }

    /// 以大端序读取 4 字节无符号整数，不前移游标；数据不足时返回 `0`。
    ///
    /// 返回 `0` 不能区分“数据不足”与“真实的零值”，调用方需先检查 [`len`](Self::len)。
    pub fn read_u32(&self) -> u32 {
        self.read_be::<4>().map_or(0, u32::from_be_bytes)
    }

    fn read_be<const N: usize>(&self) -> Option<[u8; N]> {
        let mut raw = [0u8; N];
        self.peek_into(&mut raw).then_some(raw)
    }

    fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let offset = self.front_offset;
        self.chunks.iter().enumerate().map(move |(idx, chunk)| {
            if idx == 0 {
                &chunk[offset..]
            } else {
                &chunk[..]
            }
        })
    }
}

/// [`ChunkedBuffer`] 上的只进游标，由 [`ChunkedBuffer::cursor`] 创建。
///
/// # 设计动机（Why）
/// - 按逻辑偏移的 `peek_at`/`find_within` 每次都要从队首逐个分片定位，
///   在高度碎片化的缓冲上连续解析多段结构时，定位成本会随分片数成倍放大；
/// - 游标记住“当前分片下标 + 分片内偏移”，后续查找与读取都从当前位置继续。
///
/// # 契约说明（What）
/// - 游标只借用缓冲，不修改缓冲；`skip`/`read_into` 只移动游标自身；
/// - 数据不足时 `skip`/`read_into` 返回 `false`，游标与 `dst` 均保持不变；
/// - [`segments_visited`](Self::segments_visited) 统计游标进入或扫描过的分片次数，用于约束解析成本。
#[derive(Clone, Debug)]
pub struct ChunkedCursor<'a> {
    buffer: &'a ChunkedBuffer,
    index: usize,
    offset: usize,
    position: usize,
    visited: usize,
}

impl<'a> ChunkedCursor<'a> {
    /// 游标相对缓冲开头的逻辑偏移。
    pub fn position(&self) -> usize {
        self.position
    }

    /// 游标之后尚余的字节数。
    pub fn remaining(&self) -> usize {
        self.buffer.len - self.position
    }

    /// 累计访问过的分片次数。
    pub fn segments_visited(&self) -> usize {
        self.visited
    }

    /// 前移 `n` 字节；数据不足时返回 `false` 且不移动。
    pub fn skip(&mut self, n: usize) -> bool {
        if n > self.remaining() {
            return false;
        }
        let mut left = n;
        while left > 0 {
            let take = self.current().len().min(left);
            self.step(take);
            left -= take;
        }
        true
    }

    /// 复制接下来的 `dst.len()` 个字节并前移；数据不足时返回 `false` 且不修改 `dst`。
    pub fn read_into(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() > self.remaining() {
            return false;
        }
        let mut filled = 0;
        while filled < dst.len() {
            let segment = self.current();
            let take = segment.len().min(dst.len() - filled);
            dst[filled..filled + take].copy_from_slice(&segment[..take]);
            self.step(take);
            filled += take;
        }
        true
    }

    /// 从当前位置起，在逻辑区间 `[position, limit)` 内查找 `needle`，返回匹配起点的逻辑偏移。
    ///
    /// 不移动游标；`limit` 超过缓冲长度时按缓冲长度截断。
    pub fn find<const N: usize>(&mut self, limit: usize, needle: &[u8; N]) -> Option<usize> {
        let end = limit.min(self.buffer.len);
        if N == 0 {
            return (self.position <= end).then_some(self.position);
        }

        let mut window = [0u8; N];
        let mut seen = 0usize;
        let mut pos = self.position;
        let mut index = self.index;
        let mut offset = self.offset;
        while pos < end {
            let Some(chunk) = self.buffer.chunks.get(index) else {
                break;
            };
            self.visited += 1;
            for &byte in &chunk[offset..] {
                if pos >= end {
                    return None;
                }
                window.rotate_left(1);
                window[N - 1] = byte;
                seen += 1;
                pos += 1;
                if seen >= N && window == *needle {
                    return Some(pos - N);
                }
            }
            index += 1;
            offset = 0;
        }
        None
    }

    fn current(&self) -> &'a [u8] {
        match self.buffer.chunks.get(self.index) {
            Some(chunk) => &chunk[self.offset..],
            None => &[],
        }
    }

    /// 在当前分片内前移 `n` 字节，读尽时切换到下一个分片。
    fn step(&mut self, n: usize) {
        self.offset += n;
        self.position += n;
        let exhausted = self
            .buffer
            .chunks
            .get(self.index)
            .is_some_and(|chunk| self.offset == chunk.len());
        if exhausted {
            self.index += 1;
            self.offset = 0;
            if self.index < self.buffer.chunks.len() {
                self.visited += 1;
            }
        }
    }
}

impl fmt::Debug for ChunkedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedBuffer")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .field("front_offset", &self.front_offset)
            .finish()
    }
}

impl From<Vec<u8>> for ChunkedBuffer {
    fn from(value: Vec<u8>) -> Self {
        let mut buffer = Self::new();
        buffer.append_bytes(value);
        buffer
    }
}

impl From<Bytes> for ChunkedBuffer {
    fn from(value: Bytes) -> Self {
        let mut buffer = Self::new();
        buffer.append_bytes(value);
        buffer
    }
}

/// 让接收缓冲可以直接交给基于 `bytes::Buf` 的消费者，同时支持向量化写出。
impl Buf for ChunkedBuffer {
    fn remaining(&self) -> usize {
        self.len
    }

    fn chunk(&self) -> &[u8] {
        self.front_chunk()
    }

    fn advance(&mut self, cnt: usize) {
        self.consume(cnt);
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let mut filled = 0;
        for (slot, segment) in dst.iter_mut().zip(self.segments()) {
            *slot = IoSlice::new(segment);
            filled += 1;
        }
        filled
    }

    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        self.split_frame(len)
    }
}
