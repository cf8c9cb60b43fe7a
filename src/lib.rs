//! konfig - 配置语言的并发构建与执行引擎
//!
//! # 架构
//!
//! ```text
//! konfig-api/     - 服务客户端、产物存储、共享产物加载
//! konfig-core/    - 词法、语法、惰性模块解析、IR、产物格式、求值器
//! konfig-config/  - 编译与执行配置
//! konfig-log/     - 日志
//! konfig-vfs/     - 文件系统抽象
//! ```
//!
//! # 快速开始
//!
//! ```no_run
//! use konfig::{ExecProgramArgs, NativeServiceClient, ServiceClient};
//!
//! let client = NativeServiceClient::new();
//! let args = ExecProgramArgs::with_code("main.k", "v = option(\"foo\")").arg("foo", "1");
//! let result = client.exec_program(&args).unwrap();
//! assert_eq!(result.json_result, r#"{"v": 1}"#);
//! konfig::shutdown();
//! ```

pub use konfig_api::*;
