//! 日志器实现

use crate::record::{Level, Record};
use crate::span::{self, Span, SpanId};
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// 日志输出目标 trait
pub trait LogSink: Send + Sync {
    /// 写入日志记录
    fn write(&self, record: &Record);
}

/// 日志器配置和状态
pub struct Logger {
    /// 当前日志级别（原子存储）
    level: AtomicU8,
    /// 输出目标列表（写日志只需读锁）
    sinks: RwLock<Vec<Box<dyn LogSink>>>,
    /// 下一个 Span ID
    next_span_id: AtomicU64,
}

impl Logger {
    /// 创建新的日志器
    pub fn new(level: Level) -> Arc<Self> {
        Arc::new(Logger {
            level: AtomicU8::new(level as u8),
            sinks: RwLock::new(Vec::new()),
            next_span_id: AtomicU64::new(1),
        })
    }

    /// 添加输出目标
    pub fn with_sink<S: LogSink + 'static>(self: Arc<Self>, sink: S) -> Arc<Self> {
        self.add_sink(sink);
        self
    }

    /// 添加 sink
    pub fn add_sink<S: LogSink + 'static>(&self, sink: S) {
        self.sinks.write().push(Box::new(sink));
    }

    /// 动态设置日志级别
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// 获取当前日志级别
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    /// 检查指定级别是否启用
    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// 记录日志（宏的落点）
    #[inline(never)]
    pub fn log(&self, level: Level, target: &'static str, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }

        let mut record = Record::new(level, target, message);
        if let Some(id) = span::current() {
            record = record.with_span(id.0);
        }

        for sink in self.sinks.read().iter() {
            sink.write(&record);
        }
    }

    /// 进入一个新的 span，返回守卫对象
    pub fn enter_span(&self, name: &'static str) -> SpanGuard {
        let id = SpanId(self.next_span_id.fetch_add(1, Ordering::Relaxed));
        span::push(Span::new(id, name));
        SpanGuard { id }
    }

    /// 当前线程的 span 栈深度
    pub fn span_depth(&self) -> usize {
        span::depth()
    }

    /// 创建静默日志器（Error 级别，且没有任何 sink）
    pub fn noop() -> Arc<Self> {
        Self::new(Level::Error)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

/// Span 守卫，退出时自动弹出 span
#[must_use = "span 在守卫被丢弃时结束"]
pub struct SpanGuard {
    id: SpanId,
}

impl SpanGuard {
    pub fn id(&self) -> SpanId {
        self.id
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        span::pop(self.id);
    }
}

// 为 Arc<Logger> 实现 LogSink，支持链式日志器
impl LogSink for Arc<Logger> {
    fn write(&self, record: &Record) {
        self.log(record.level, record.target, record.message.clone());
    }
}

/// 标准输出 sink
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, record: &Record) {
        println!("{}", record.format());
    }
}

/// 标准错误 sink
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, record: &Record) {
        eprintln!("{}", record.format());
    }
}

/// 文件 sink（追加模式）
pub struct FileSink {
    file: Mutex<std::fs::File>,
}

impl FileSink {
    pub fn new(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(FileSink {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    #[inline(never)]
    fn write(&self, record: &Record) {
        let mut file = self.file.lock();
        // 日志写失败不影响调用方
        let _ = writeln!(file, "{}", record.format());
    }
}
