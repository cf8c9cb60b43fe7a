//! 日志专用环形缓冲区
//!
//! 保留最近的 N 条记录，出错时转储，用于事后分析。

use crate::logger::LogSink;
use crate::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// 环形缓冲区统计信息
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RingBufferStats {
    /// 当前记录数
    pub record_count: usize,
    /// 因缓冲区满而丢弃的记录数
    pub dropped_count: usize,
    /// 缓冲区容量
    pub capacity: usize,
}

#[derive(Default)]
struct Window {
    records: VecDeque<Record>,
    dropped: usize,
}

/// 日志环形缓冲区
///
/// 满了以后新记录挤掉最旧的记录。记录和丢弃计数在同一把锁下更新，
/// 统计信息总是一致的。
pub struct LogRingBuffer {
    window: Mutex<Window>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(LogRingBuffer {
            window: Mutex::new(Window {
                records: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            capacity,
        })
    }

    fn push(&self, record: Record) {
        let mut window = self.window.lock();
        if self.capacity == 0 {
            window.dropped += 1;
            return;
        }
        if window.records.len() == self.capacity {
            window.records.pop_front();
            window.dropped += 1;
        }
        window.records.push_back(record);
    }

    /// 当前所有记录，按时间顺序
    pub fn dump_records(&self) -> Vec<Record> {
        self.window.lock().records.iter().cloned().collect()
    }

    /// 全部记录，每行一条
    pub fn dump(&self) -> String {
        self.dump_tail(usize::MAX)
    }

    /// 最近的 `limit` 条记录；有更早的记录被省略或丢弃时，第一行说明条数
    pub fn dump_tail(&self, limit: usize) -> String {
        let window = self.window.lock();
        let skip = window.records.len().saturating_sub(limit);
        let omitted = skip + window.dropped;
        let mut lines = Vec::with_capacity(window.records.len() - skip + 1);
        if omitted > 0 {
            lines.push(format!("... {} earlier records omitted", omitted));
        }
        lines.extend(window.records.iter().skip(skip).map(Record::format));
        lines.join("\n")
    }

    pub fn clear(&self) {
        *self.window.lock() = Window::default();
    }

    pub fn stats(&self) -> RingBufferStats {
        let window = self.window.lock();
        RingBufferStats {
            record_count: window.records.len(),
            dropped_count: window.dropped,
            capacity: self.capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.window.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> usize {
        self.window.lock().dropped
    }
}

impl LogSink for Arc<LogRingBuffer> {
    fn write(&self, record: &Record) {
        self.push(record.clone());
    }
}
