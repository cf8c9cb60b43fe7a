//! 日志宏实现

/// 记录 Trace 级别日志
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Trace, $($arg)+)
    };
}

/// 记录 Debug 级别日志
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Debug, $($arg)+)
    };
}

/// 记录 Info 级别日志
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Info, $($arg)+)
    };
}

/// 记录 Warn 级别日志
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Warn, $($arg)+)
    };
}

/// 记录 Error 级别日志
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Error, $($arg)+)
    };
}

/// 通用日志宏
///
/// 支持 `target: "..."` 显式指定目标，默认使用调用处的 `module_path!()`。
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, target: $target:expr, $($arg:tt)+) => {{
        // 惰性求值：先检查级别，只有启用时才格式化消息
        if $logger.is_enabled($level) {
            let message = ::std::format!($($arg)+);
            $logger.log($level, $target, message);
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $crate::log!($logger, $level, target: ::std::module_path!(), $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Level, LogRingBuffer, Logger};

    #[test]
    fn test_trace_macro() {
        let ring = LogRingBuffer::new(100);
        let logger = Logger::new(Level::Trace).with_sink(ring.clone());

        trace!(logger, "test trace");
        trace!(logger, "formatted {}", "value");

        let records = ring.dump_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.level == Level::Trace));
    }

    #[test]
    fn test_explicit_target() {
        let ring = LogRingBuffer::new(100);
        let logger = Logger::new(Level::Debug).with_sink(ring.clone());

        debug!(logger, target: "konfig::resolver", "skip {}", "pkg");

        let records = ring.dump_records();
        assert_eq!(records[0].target, "konfig::resolver");
        assert_eq!(records[0].message, "skip pkg");
    }

    #[test]
    fn test_default_target_is_module_path() {
        let ring = LogRingBuffer::new(100);
        let logger = Logger::new(Level::Debug).with_sink(ring.clone());

        info!(logger, "hello");

        assert_eq!(ring.dump_records()[0].target, module_path!());
    }

    #[test]
    fn test_level_filtering_in_macros() {
        let ring = LogRingBuffer::new(100);
        let logger = Logger::new(Level::Warn).with_sink(ring.clone());

        trace!(logger, "trace msg");
        debug!(logger, "debug msg");
        info!(logger, "info msg");

        warn!(logger, "warn msg");
        error!(logger, "error msg");

        let records = ring.dump_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::Warn);
        assert_eq!(records[1].level, Level::Error);
    }
}
