//! 构建流水线
//!
//! ```text
//! SourceProgram ─> 惰性解析 ─> 降级 ─> 静态检查 ─> Program ─> 产物字节
//! ```
//!
//! 每次构建独占自己的解析器、模块图、符号表和 IR，不存在进程级的编译
//! 缓存，因此多个构建可以完全并行。内联代码通过覆盖层文件系统遮盖磁盘
//! 上的同名文件，磁盘本身不会被修改。

use crate::binary::{current_timestamp, encode_artifact, Artifact, ArtifactMetadata, DebugInfo, WriteOptions};
use crate::checker::check_program;
use crate::error::{CompileError, Error, Result};
use crate::ir::{lower, ConstIr, ExprIr, Program};
use crate::lexer::Coordinate;
use crate::parser::{self, ast};
use crate::resolver::{reach, Resolution, Resolver};
use konfig_config::{CompilerConfig, LimitConfig, Phase};
use konfig_log::{debug, info, Logger};
use konfig_vfs::{NativeFileSystem, OverlayFileSystem, VirtualFileSystem};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 只给出代码、没有文件名时使用的文件名
pub const DEFAULT_FILENAME: &str = "main.k";

/// 一个入口文件；`content` 为 `None` 时从磁盘读取
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub filename: String,
    pub content: Option<String>,
}

/// 一组入口文件，共同组成主包
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceProgram {
    pub work_dir: Option<PathBuf>,
    pub files: Vec<SourceFile>,
}

impl SourceProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn with_code(mut self, filename: impl Into<String>, code: impl Into<String>) -> Self {
        self.files.push(SourceFile {
            filename: filename.into(),
            content: Some(code.into()),
        });
        self
    }

    pub fn with_file(mut self, filename: impl Into<String>) -> Self {
        self.files.push(SourceFile {
            filename: filename.into(),
            content: None,
        });
        self
    }

    /// 文件名列表与代码列表按下标对应；缺少的代码从磁盘读取
    pub fn from_lists(work_dir: Option<&str>, filenames: &[String], codes: &[String]) -> Result<Self> {
        if codes.len() > filenames.len() && !filenames.is_empty() {
            return Err(invalid_input(format!(
                "{} code entries but only {} filenames",
                codes.len(),
                filenames.len()
            )));
        }
        let mut program = SourceProgram {
            work_dir: work_dir.filter(|d| !d.is_empty()).map(PathBuf::from),
            files: Vec::new(),
        };
        if filenames.is_empty() {
            for (i, code) in codes.iter().enumerate() {
                let filename = if i == 0 {
                    DEFAULT_FILENAME.to_string()
                } else {
                    format!("main_{}.k", i)
                };
                program = program.with_code(filename, code.clone());
            }
        } else {
            for (i, filename) in filenames.iter().enumerate() {
                program.files.push(SourceFile {
                    filename: filename.clone(),
                    content: codes.get(i).cloned(),
                });
            }
        }
        Ok(program)
    }

    pub fn filenames(&self) -> Vec<String> {
        self.files.iter().map(|f| f.filename.clone()).collect()
    }

    /// 至少一个入口，文件名互不相同
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(invalid_input("no input files"));
        }
        let mut seen = HashSet::new();
        for file in &self.files {
            if file.filename.is_empty() {
                return Err(invalid_input("empty filename"));
            }
            if !seen.insert(file.filename.as_str()) {
                return Err(invalid_input(format!("duplicate filename '{}'", file.filename)));
            }
        }
        Ok(())
    }
}

fn invalid_input(message: impl Into<String>) -> Error {
    CompileError::new(Phase::Compiler, "<input>", Coordinate::default(), message).into()
}

/// 一次编译的结果
#[derive(Debug, Clone)]
pub struct Compilation {
    pub program: Program,
    /// `Pos::file` 指向的文件表
    pub files: Vec<String>,
    pub filenames: Vec<String>,
    pub source_digest: String,
}

/// `option()` 的静态描述
#[derive(Debug, Clone, PartialEq)]
pub struct OptionInfo {
    pub name: String,
    pub ty: Option<String>,
    pub required: bool,
    /// 默认值是字面量时的文本形式
    pub default: Option<String>,
    pub help: Option<String>,
}

/// 单个文件的语法分析结果
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub module: ast::Module,
    /// 导入路径，按出现顺序
    pub deps: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 不影响编译的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
    limits: LimitConfig,
    logger: Arc<Logger>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default(), LimitConfig::default())
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig, limits: LimitConfig) -> Self {
        Self {
            config,
            limits,
            logger: Logger::noop(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// 入口文件映射到覆盖层文件系统上的绝对路径
    fn prepare(&self, source: &SourceProgram) -> Result<(OverlayFileSystem, Vec<PathBuf>, PathBuf)> {
        source.validate()?;
        let work_dir = match &source.work_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map_err(|e| Error::Internal(format!("cannot determine working directory: {}", e)))?,
        };

        let mut vfs = OverlayFileSystem::new(Arc::new(NativeFileSystem::new()));
        let mut entries = Vec::with_capacity(source.files.len());
        for file in &source.files {
            let path = work_dir.join(&file.filename);
            if let Some(content) = &file.content {
                vfs = vfs.with_file(&path, content.as_bytes());
            } else if !vfs.is_file(&path) {
                return Err(CompileError::new(
                    Phase::Compiler,
                    file.filename.clone(),
                    Coordinate::default(),
                    format!("cannot find the entry file '{}'", path.display()),
                )
                .into());
            }
            entries.push(path);
        }

        // 入口文件给出了绝对路径时，从它所在的目录开始查找清单
        let start = match (&source.work_dir, entries.first()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(first)) => first.parent().map(Path::to_path_buf).unwrap_or(work_dir),
            (None, None) => work_dir,
        };
        Ok((vfs, entries, start))
    }

    pub fn resolve(&self, source: &SourceProgram) -> Result<Resolution> {
        let (vfs, entries, start) = self.prepare(source)?;
        Resolver::new(&vfs, &self.config, &self.limits, Arc::clone(&self.logger)).resolve(&entries, &start)
    }

    /// 解析、降级并检查
    pub fn compile(&self, source: &SourceProgram) -> Result<Compilation> {
        let resolution = self.resolve(source)?;
        let program = lower(&resolution)?;
        check_program(&program, &resolution.files)?;

        debug!(
            self.logger,
            target: Phase::Compiler.target(),
            "compiled {} packages, {} schemas from {} files",
            program.packages.len(),
            program.schemas.len(),
            resolution.files.len()
        );
        Ok(Compilation {
            program,
            files: resolution.files,
            filenames: source.filenames(),
            source_digest: resolution.source_digest,
        })
    }

    pub fn build(&self, source: &SourceProgram) -> Result<Artifact> {
        let compilation = self.compile(source)?;
        Ok(Artifact {
            metadata: ArtifactMetadata {
                filenames: compilation.filenames,
                source_digest: compilation.source_digest,
                created_at: current_timestamp(),
                compiler_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            program: compilation.program,
            debug_info: self.config.emit_debug_info.then(|| DebugInfo {
                files: compilation.files,
            }),
        })
    }

    /// 构建并编码为产物字节
    pub fn build_bytes(&self, source: &SourceProgram) -> Result<Vec<u8>> {
        let artifact = self.build(source)?;
        let bytes = encode_artifact(
            &artifact,
            &WriteOptions {
                emit_debug_info: self.config.emit_debug_info,
                checksum: true,
                created_at: Some(artifact.metadata.created_at),
            },
        )
        .map_err(|e| Error::Internal(format!("failed to encode artifact: {}", e)))?;
        info!(
            self.logger,
            target: Phase::Compiler.target(),
            "built artifact for {:?} ({} bytes)",
            artifact.metadata.filenames,
            bytes.len()
        );
        Ok(bytes)
    }

    /// 可达程序中声明的所有 `option()`
    pub fn list_options(&self, source: &SourceProgram) -> Result<Vec<OptionInfo>> {
        let compilation = self.compile(source)?;
        let program = &compilation.program;
        Ok(program
            .options()
            .into_iter()
            .map(|option| OptionInfo {
                name: option.name.clone(),
                ty: option.ty.as_ref().map(|t| t.display(&program.schemas)),
                required: option.required,
                default: option.default.as_ref().and_then(literal_text),
                help: option.help.clone(),
            })
            .collect())
    }

    /// 只做语法分析，不解析导入
    pub fn parse_file(&self, filename: &str, source: Option<&str>) -> Result<ParsedSource> {
        let text = match source {
            Some(text) => text.to_string(),
            None => NativeFileSystem::new()
                .read_to_string(Path::new(filename))
                .map_err(|e| {
                    CompileError::new(Phase::Parser, filename, Coordinate::default(), e.to_string())
                })?,
        };
        let module = parser::parse_source(filename, &text, self.limits.max_recursion_depth)
            .map_err(|e| CompileError::from_parser(filename, &e))?;

        let deps = module.imports().map(|(import, _)| import.path.clone()).collect();
        let diagnostics = reach::unused_imports(&module)
            .into_iter()
            .map(|(import, pos)| Diagnostic {
                file: filename.to_string(),
                line: pos.line,
                column: pos.column,
                message: format!("module '{}' imported but unused", import.path),
            })
            .collect();
        Ok(ParsedSource {
            module,
            deps,
            diagnostics,
        })
    }
}

fn literal_text(expr: &ExprIr) -> Option<String> {
    match expr {
        ExprIr::Const(ConstIr::None) => Some("None".to_string()),
        ExprIr::Const(ConstIr::Bool(b)) => Some(if *b { "True" } else { "False" }.to_string()),
        ExprIr::Const(ConstIr::Int(n)) => Some(n.to_string()),
        ExprIr::Const(ConstIr::Float(f)) => Some(crate::runtime::Value::Float(*f).to_string()),
        ExprIr::Const(ConstIr::Str(s)) => Some(format!("{:?}", s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> Compiler {
        Compiler::default()
    }

    #[test]
    fn test_from_lists() {
        let names = vec!["a.k".to_string(), "b.k".to_string()];
        let codes = vec!["x = 1".to_string()];
        let program = SourceProgram::from_lists(Some("/w"), &names, &codes).unwrap();
        assert_eq!(program.work_dir, Some(PathBuf::from("/w")));
        assert_eq!(program.files[0].content.as_deref(), Some("x = 1"));
        assert_eq!(program.files[1].content, None);

        let only_code = SourceProgram::from_lists(None, &[], &codes).unwrap();
        assert_eq!(only_code.filenames(), vec![DEFAULT_FILENAME.to_string()]);

        let too_many = vec!["1".to_string(), "2".to_string()];
        assert!(SourceProgram::from_lists(None, &names[..1], &too_many).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        assert!(SourceProgram::new().validate().is_err());
        let dup = SourceProgram::new().with_code("a.k", "").with_code("a.k", "");
        let err = dup.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate filename 'a.k'"));
    }

    #[test]
    fn test_compile_inline_code() {
        let source = SourceProgram::new()
            .with_work_dir("/nonexistent")
            .with_code("main.k", "a = 1\nb = a + 1\n");
        let compilation = compiler().compile(&source).unwrap();
        assert_eq!(compilation.program.entry_package().bindings.len(), 2);
        assert_eq!(compilation.files, vec!["main.k".to_string()]);
        assert_eq!(compilation.source_digest.len(), 64);
    }

    #[test]
    fn test_missing_entry_file() {
        let source = SourceProgram::new()
            .with_work_dir("/nonexistent")
            .with_file("main.k");
        let err = compiler().compile(&source).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.to_string().contains("cannot find the entry file"));
    }

    #[test]
    fn test_build_respects_debug_info_setting() {
        let source = SourceProgram::new().with_code("main.k", "a = 1\n");
        let with_debug = compiler().build(&source).unwrap();
        assert!(with_debug.debug_info.is_some());

        let config = CompilerConfig {
            emit_debug_info: false,
            ..CompilerConfig::default()
        };
        let without = Compiler::new(config, LimitConfig::default())
            .build(&source)
            .unwrap();
        assert!(without.debug_info.is_none());
    }

    #[test]
    fn test_list_options() {
        let source = SourceProgram::new().with_code(
            "main.k",
            "port: int = option(\"port\", default=8080, help=\"listen port\")\nname = option(\"name\", required=True)\n",
        );
        let options = compiler().list_options(&source).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "port");
        assert_eq!(options[0].ty.as_deref(), Some("int"));
        assert_eq!(options[0].default.as_deref(), Some("8080"));
        assert_eq!(options[0].help.as_deref(), Some("listen port"));
        assert!(options[1].required);
        assert_eq!(options[1].ty, None);
    }

    #[test]
    fn test_parse_file_reports_deps_and_unused_imports() {
        let parsed = compiler()
            .parse_file("main.k", Some("import a\nimport b.c\nx = a.y\n"))
            .unwrap();
        assert_eq!(parsed.deps, vec!["a".to_string(), "b.c".to_string()]);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].message, "module 'b.c' imported but unused");
        assert_eq!(parsed.diagnostics[0].line, 2);
    }

    #[test]
    fn test_parse_file_syntax_error() {
        let err = compiler().parse_file("bad.k", Some("x = (1 +\n")).unwrap_err();
        match err {
            Error::Compile(e) => {
                assert_eq!(e.file, "bad.k");
                assert!(e.line >= 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
