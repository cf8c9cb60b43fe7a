//! 日志配置
//!
//! 提供便捷的日志初始化配置。

use crate::logger::{FileSink, StderrSink, StdoutSink};
use crate::{Level, LogRingBuffer, Logger};
use std::sync::Arc;

/// 日志输出目标配置
#[derive(Clone, Debug, PartialEq)]
pub enum OutputConfig {
    /// 输出到标准输出
    Stdout,
    /// 输出到标准错误
    Stderr,
    /// 输出到文件（路径）
    File(String),
    /// 输出到环形缓冲区（容量）
    RingBuffer(usize),
}

/// 日志配置
///
/// 用于一键初始化日志系统
///
/// # 示例
///
/// ```
/// use konfig_log::{LogConfig, Level};
///
/// let config = LogConfig::new(Level::Debug)
///     .with_ring_buffer(10000);
///
/// let (logger, ring) = config.init();
/// ```
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// 日志级别
    pub level: Level,
    /// 输出目标列表
    pub outputs: Vec<OutputConfig>,
}

impl LogConfig {
    /// 创建配置（无输出）
    pub fn new(level: Level) -> Self {
        LogConfig {
            level,
            outputs: Vec::new(),
        }
    }

    /// 开发环境推荐配置
    ///
    /// - Debug 级别
    /// - 输出到 stderr（stdout 留给程序输出）
    /// - 环形缓冲区 10000 条（用于崩溃转储）
    pub fn dev() -> Self {
        LogConfig {
            level: Level::Debug,
            outputs: vec![OutputConfig::Stderr, OutputConfig::RingBuffer(10000)],
        }
    }

    /// 生产环境推荐配置
    ///
    /// - Warn 级别
    /// - 输出到 stderr
    /// - 环形缓冲区 1000 条
    pub fn production() -> Self {
        LogConfig {
            level: Level::Warn,
            outputs: vec![OutputConfig::Stderr, OutputConfig::RingBuffer(1000)],
        }
    }

    /// 测试环境配置（静默）
    pub fn test() -> Self {
        LogConfig {
            level: Level::Error,
            outputs: Vec::new(),
        }
    }

    /// 添加 stdout 输出
    pub fn with_stdout(mut self) -> Self {
        if !self.outputs.contains(&OutputConfig::Stdout) {
            self.outputs.push(OutputConfig::Stdout);
        }
        self
    }

    /// 添加 stderr 输出
    pub fn with_stderr(mut self) -> Self {
        if !self.outputs.contains(&OutputConfig::Stderr) {
            self.outputs.push(OutputConfig::Stderr);
        }
        self
    }

    /// 添加文件输出
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.outputs.push(OutputConfig::File(path.into()));
        self
    }

    /// 添加环形缓冲区输出
    pub fn with_ring_buffer(mut self, capacity: usize) -> Self {
        self.outputs.push(OutputConfig::RingBuffer(capacity));
        self
    }

    /// 初始化日志系统
    ///
    /// 返回 (logger, Option<ring_buffer>)。
    /// 文件无法打开时跳过该输出，不影响其余 sink。
    pub fn init(self) -> (Arc<Logger>, Option<Arc<LogRingBuffer>>) {
        let logger = Logger::new(self.level);
        let mut ring_buffer: Option<Arc<LogRingBuffer>> = None;

        for output in self.outputs {
            match output {
                OutputConfig::Stdout => logger.add_sink(StdoutSink),
                OutputConfig::Stderr => logger.add_sink(StderrSink),
                OutputConfig::File(path) => {
                    if let Ok(sink) = FileSink::new(&path) {
                        logger.add_sink(sink);
                    }
                }
                OutputConfig::RingBuffer(capacity) => {
                    let ring = LogRingBuffer::new(capacity);
                    ring_buffer = Some(Arc::clone(&ring));
                    logger.add_sink(ring);
                }
            }
        }

        (logger, ring_buffer)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig::production()
    }
}
