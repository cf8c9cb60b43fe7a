//! API layer configuration
//!
//! `RunConfig` bundles the compiler settings, execution limits and the
//! logger. The logger is usually built from a [`LogConfig`] preset, whose
//! ring buffer (if any) is kept for post-mortem dumps. A process-wide
//! singleton backs [`NativeServiceClient::new`]; library users can pass an
//! explicit config instead.
//!
//! [`NativeServiceClient::new`]: crate::NativeServiceClient::new

use konfig_config::{CompilerConfig, LimitConfig};
use konfig_log::{LogConfig, LogRingBuffer, Logger};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Execution configuration
#[derive(Clone)]
pub struct RunConfig {
    /// Compiler configuration
    pub compiler: CompilerConfig,
    /// Parser and evaluator limits
    pub limits: LimitConfig,
    /// Logger shared by every operation of a client
    pub logger: Arc<Logger>,
    /// Most recent log records, when the logger feeds a ring buffer
    pub log_ring: Option<Arc<LogRingBuffer>>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("compiler", &self.compiler)
            .field("limits", &self.limits)
            .field("log_level", &self.logger.level())
            .field("log_ring", &self.log_ring.as_ref().map(|r| r.capacity()))
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),
            limits: LimitConfig::default(),
            logger: Logger::noop(),
            log_ring: None,
        }
    }
}

impl RunConfig {
    /// Default settings with a logger built from `log`
    pub fn from_log_config(log: LogConfig) -> Self {
        Self::default().with_log_config(log)
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        let (logger, ring) = log.init();
        self.logger = logger;
        self.log_ring = ring;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self.log_ring = None;
        self
    }

    /// The last `limit` buffered log lines, oldest first
    pub fn recent_log(&self, limit: usize) -> Option<String> {
        self.log_ring.as_ref().map(|ring| ring.dump_tail(limit))
    }

    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_limits(mut self, limits: LimitConfig) -> Self {
        self.limits = limits;
        self
    }
}

static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Install the global configuration.
///
/// Returns `false` if a configuration was already installed; the existing one
/// is kept.
pub fn init(config: RunConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// Global configuration, installing the default on first use
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use konfig_config::UnreferencedImports;
    use konfig_log::Level;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(cfg.compiler.emit_debug_info);
        assert_eq!(cfg.compiler.lazy.unreferenced_imports, UnreferencedImports::Skip);
        assert_eq!(cfg.limits.max_recursion_depth, 256);
        assert_eq!(cfg.limits.max_eval_depth, 512);
        assert_eq!(cfg.limits.max_collection_len, 1 << 24);
    }

    #[test]
    fn test_run_config_debug() {
        let cfg = RunConfig::default().with_logger(Logger::new(Level::Debug));
        let debug_str = format!("{:?}", cfg);
        assert!(debug_str.contains("compiler"));
        assert!(debug_str.contains("limits"));
        assert!(debug_str.contains("Debug"));
    }

    #[test]
    fn test_run_config_from_log_preset() {
        let cfg = RunConfig::from_log_config(LogConfig::dev());
        assert_eq!(cfg.logger.level(), Level::Debug);
        assert_eq!(cfg.log_ring.as_ref().map(|r| r.capacity()), Some(10000));

        konfig_log::debug!(cfg.logger, target: "konfig::service", "hello");
        let dump = cfg.recent_log(10).unwrap();
        assert!(dump.contains("konfig::service: hello"), "{dump}");

        let quiet = RunConfig::from_log_config(LogConfig::test());
        assert_eq!(quiet.logger.level(), Level::Error);
        assert!(quiet.recent_log(10).is_none());

        let replaced = cfg.with_logger(Logger::noop());
        assert!(replaced.log_ring.is_none());
    }

    #[test]
    fn test_run_config_logs_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("konfig.log");
        let cfg = RunConfig::from_log_config(
            LogConfig::new(Level::Info).with_file(path.display().to_string()),
        );
        konfig_log::info!(cfg.logger, target: "konfig::service", "to file");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("to file"));
    }

    #[test]
    fn test_global_config_is_set_once() {
        let first = config().clone();
        assert!(is_initialized());
        let mut other = RunConfig::default();
        other.limits.max_eval_depth = 7;
        assert!(!init(other));
        assert_eq!(config().limits, first.limits);
    }
}
