//! konfig-log - 结构化日志系统
//!
//! 为 konfig 编译器和运行时设计的结构化日志系统，特点：
//! - **显式传递**：无全局 logger，`Arc<Logger>` 通过配置传入各组件
//! - **线程安全**：sink 列表与环形缓冲区由 `parking_lot` 锁保护，可在多线程共享
//! - **崩溃恢复**：环形缓冲区保留最后 N 条日志
//!
//! # 快速开始
//!
//! ```
//! use konfig_log::{LogConfig, Level, debug};
//!
//! let (logger, ring) = LogConfig::new(Level::Debug).with_ring_buffer(128).init();
//! debug!(logger, "编译开始: {} 个文件", 2);
//! debug!(logger, target: "konfig::resolver", "跳过模块 {}", "big_pkg");
//! assert_eq!(ring.unwrap().len(), 2);
//! ```

mod config;
mod logger;
mod macros;
mod record;
mod ring_buffer;
mod span;

pub use config::{LogConfig, OutputConfig};
pub use logger::{FileSink, LogSink, Logger, SpanGuard, StderrSink, StdoutSink};
pub use record::{Level, Record};
pub use ring_buffer::{LogRingBuffer, RingBufferStats};
pub use span::{Span, SpanId};

// 宏通过 #[macro_export] 自动导出到 crate 根：
// trace!, debug!, info!, warn!, error!, log!

/// 日志结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// 日志系统错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO 错误（文件 sink）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 无法解析的日志级别
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),
}
