//! 惰性模块解析
//!
//! 解析分两遍：
//!
//! 1. 从入口包出发，按语句收集读取的名字（[`reach`]）。`alias.member`
//!    引用目标模块并检查成员，裸别名同样引用整个模块。
//! 2. 用全局工作队列闭包这些引用。模块第一次被引用时才被定位和解析
//!    (`Unresolved -> Resolving`)，随后整个模块被展开：所有绑定都参与
//!    检查，顶层语句按依赖顺序在入口之前执行，和关闭惰性解析时一致。
//!
//! 队列清空后，被加载的模块进入 `Resolved`；从未被读取的导入只做定位
//! （缺失仍然是编译错误），然后进入 `Skipped`，既不解析也不求值。

mod graph;
mod locate;
mod manifest;
pub mod reach;

pub use graph::{ModuleGraph, ModuleKind, ModuleNode, ModuleState};
pub use locate::{Location, Locator, SOURCE_EXT};
pub use manifest::{find_manifest, Manifest, PackageSection, MANIFEST_FILE};

use crate::error::{CompileError, Result};
use crate::ir::{SystemModule, MAIN_PACKAGE, PLUGIN_PREFIX};
use crate::lexer::Coordinate;
use crate::parser::{self, ast};
use konfig_config::{CompilerConfig, LimitConfig, Phase, UnreferencedImports};
use konfig_log::{debug, trace, Logger};
use konfig_vfs::VirtualFileSystem;
use reach::{stmt_references, Reference};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 已解析的源文件
#[derive(Debug)]
pub struct ParsedFile {
    /// 全局文件表中的下标
    pub index: u32,
    pub name: String,
    pub module: ast::Module,
    /// 本文件的导入：别名 -> 导入
    pub imports: HashMap<String, ImportRef>,
}

#[derive(Debug, Clone)]
pub struct ImportRef {
    pub path: String,
    pub pos: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Binding,
    Schema,
}

/// 包级名字的定义位置
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// `Package::files` 中的下标
    pub file: usize,
    /// 文件中的语句下标
    pub stmt: usize,
}

/// 一个包：单个 `.k` 文件，或一个目录中的全部 `.k` 文件
#[derive(Debug)]
pub struct Package {
    pub path: String,
    pub files: Vec<ParsedFile>,
    pub scope: HashMap<String, Symbol>,
    /// 整个包是否已展开
    pub expanded: bool,
}

impl Package {
    pub fn symbol(&self, name: &str) -> Option<(Symbol, &ast::Stmt)> {
        let symbol = *self.scope.get(name)?;
        let stmt = self.files.get(symbol.file)?.module.body.get(symbol.stmt)?;
        Some((symbol, stmt))
    }
}

/// 解析结果
#[derive(Debug)]
pub struct Resolution {
    pub graph: ModuleGraph,
    pub packages: Vec<Package>,
    /// 全局文件表
    pub files: Vec<String>,
    pub main: usize,
    /// 入口之前需要执行顶层语句的包（依赖在前）
    pub init_order: Vec<usize>,
    pub root: PathBuf,
    pub manifest: Option<Manifest>,
    /// 所有已读取源文件的 Blake3 摘要
    pub source_digest: String,
}

impl Resolution {
    pub fn package_index(&self, path: &str) -> Option<usize> {
        self.packages.iter().position(|p| p.path == path)
    }
}

/// 导入目标的种类
fn classify(path: &str) -> ModuleKind {
    if let Some(module) = SystemModule::from_path(path) {
        ModuleKind::System(module)
    } else if let Some(name) = path.strip_prefix(PLUGIN_PREFIX) {
        ModuleKind::Plugin(name.to_string())
    } else {
        ModuleKind::User { location: None }
    }
}

/// 根目录：向上找到 `konfig.mod` 的目录，否则为起点本身
pub fn find_root(
    vfs: &dyn VirtualFileSystem,
    start: &Path,
) -> Result<(PathBuf, Option<Manifest>)> {
    match find_manifest(vfs, start) {
        Ok(Some((root, manifest))) => Ok((root, Some(manifest))),
        Ok(None) => Ok((start.to_path_buf(), None)),
        Err(message) => Err(CompileError::resolver(
            MANIFEST_FILE,
            Coordinate::default(),
            message,
        )
        .into()),
    }
}

pub struct Resolver<'a> {
    vfs: &'a dyn VirtualFileSystem,
    config: &'a CompilerConfig,
    limits: &'a LimitConfig,
    logger: Arc<Logger>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        vfs: &'a dyn VirtualFileSystem,
        config: &'a CompilerConfig,
        limits: &'a LimitConfig,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            vfs,
            config,
            limits,
            logger,
        }
    }

    /// 解析入口文件及其实际需要的模块
    ///
    /// `start` 是向上查找 `konfig.mod` 的起点。
    pub fn resolve(&self, entries: &[PathBuf], start: &Path) -> Result<Resolution> {
        let (root, manifest) = find_root(self.vfs, start)?;
        let package_name = manifest.as_ref().map(|m| m.package.name.clone());
        debug!(
            self.logger,
            target: Phase::Resolver.target(),
            "module root {} ({} entry files)",
            root.display(),
            entries.len()
        );

        let mut state = State {
            resolver: self,
            locator: Locator::new(self.vfs, root.clone(), package_name),
            graph: ModuleGraph::new(),
            packages: Vec::new(),
            by_path: HashMap::new(),
            files: Vec::new(),
            hasher: blake3::Hasher::new(),
            worklist: VecDeque::new(),
            edge_sites: HashMap::new(),
        };

        state.graph.ensure(MAIN_PACKAGE, ModuleKind::Main);
        state.graph.transition(MAIN_PACKAGE, ModuleState::Resolving)?;
        let main = state.load_files(MAIN_PACKAGE, entries)?;
        state.worklist.push_back(Work::All(main));
        state.drain()?;
        state.finish_graph()?;
        state.check_cycles()?;

        let init_order = state
            .graph
            .dependency_order(MAIN_PACKAGE)
            .iter()
            .filter_map(|path| state.by_path.get(path).copied())
            .collect();

        Ok(Resolution {
            graph: state.graph,
            packages: state.packages,
            files: state.files,
            main,
            init_order,
            root,
            manifest,
            source_digest: state.hasher.finalize().to_hex().to_string(),
        })
    }
}

enum Work {
    /// 整个包
    All(usize),
    /// `alias.member` 引用的成员；`site` 是引用处，用于报告缺失成员
    Member {
        package: usize,
        name: String,
        site: (String, Coordinate),
    },
}

struct State<'r, 'a> {
    resolver: &'r Resolver<'a>,
    locator: Locator<'a>,
    graph: ModuleGraph,
    packages: Vec<Package>,
    by_path: HashMap<String, usize>,
    files: Vec<String>,
    hasher: blake3::Hasher,
    worklist: VecDeque<Work>,
    /// 导入边 -> 导入语句所在位置
    edge_sites: HashMap<(String, String), (String, Coordinate)>,
}

impl<'r, 'a> State<'r, 'a> {
    fn logger(&self) -> &Arc<Logger> {
        &self.resolver.logger
    }

    /// 解析一组文件，建立包作用域
    fn load_files(&mut self, path: &str, sources: &[PathBuf]) -> Result<usize> {
        let mut package = Package {
            path: path.to_string(),
            files: Vec::with_capacity(sources.len()),
            scope: HashMap::new(),
            expanded: false,
        };

        for source_path in sources {
            let name = self.locator.display_name(source_path);
            let source = self.resolver.vfs.read_to_string(source_path).map_err(|e| {
                CompileError::resolver(name.clone(), Coordinate::default(), e.to_string())
            })?;
            self.hasher.update(name.as_bytes());
            self.hasher.update(&[0]);
            self.hasher.update(source.as_bytes());

            let module =
                parser::parse_source(&name, &source, self.resolver.limits.max_recursion_depth)
                    .map_err(|e| CompileError::from_parser(name.clone(), &e))?;

            let index = self.files.len() as u32;
            self.files.push(name.clone());
            let file = package.files.len();
            let imports = collect_imports(&name, &module)?;
            declare(&mut package, file, &name, &module, &imports)?;
            package.files.push(ParsedFile {
                index,
                name,
                module,
                imports,
            });
        }

        let id = self.packages.len();
        self.by_path.insert(path.to_string(), id);
        self.packages.push(package);

        if self.resolver.config.lazy.unreferenced_imports == UnreferencedImports::Resolve {
            self.reference_all_imports(id)?;
        }
        Ok(id)
    }

    fn reference_all_imports(&mut self, package: usize) -> Result<()> {
        let mut all = Vec::new();
        for (file, parsed) in self.packages[package].files.iter().enumerate() {
            for (import, pos) in parsed.module.imports() {
                all.push((file, import.name().to_string(), pos));
            }
        }
        for (file, alias, pos) in all {
            self.reference_import(package, file, &alias, None, pos)?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(work) = self.worklist.pop_front() {
            match work {
                Work::All(package) => self.expand(package)?,
                Work::Member {
                    package,
                    name,
                    site,
                } => self.check_member(package, &name, site)?,
            }
        }
        Ok(())
    }

    fn expand(&mut self, package: usize) -> Result<()> {
        if self.packages[package].expanded {
            return Ok(());
        }
        self.packages[package].expanded = true;
        trace!(
            self.logger(),
            target: Phase::Resolver.target(),
            "expanding {}",
            self.packages[package].path
        );

        let mut refs = Vec::new();
        for (file, parsed) in self.packages[package].files.iter().enumerate() {
            for stmt in &parsed.module.body {
                refs.extend(stmt_references(stmt).into_iter().map(|r| (file, r)));
            }
        }
        for (file, reference) in refs {
            self.dispatch(package, file, reference)?;
        }
        Ok(())
    }

    fn check_member(&mut self, package: usize, name: &str, site: (String, Coordinate)) -> Result<()> {
        let pkg = &self.packages[package];
        if pkg.symbol(name).is_none() {
            return Err(CompileError::resolver(
                site.0,
                site.1,
                format!("module '{}' has no member '{}'", pkg.path, name),
            )
            .into());
        }
        Ok(())
    }

    /// 包内的名字随整个包展开，这里只需处理导入
    fn dispatch(&mut self, package: usize, file: usize, reference: Reference) -> Result<()> {
        let pkg = &self.packages[package];
        let parsed = &pkg.files[file];
        match reference {
            Reference::Name { name, pos } => {
                if !pkg.scope.contains_key(&name) && parsed.imports.contains_key(&name) {
                    self.reference_import(package, file, &name, None, pos)?;
                }
            }
            Reference::Member { alias, member, pos } => {
                if !pkg.scope.contains_key(&alias) && parsed.imports.contains_key(&alias) {
                    self.reference_import(package, file, &alias, Some(member), pos)?;
                }
            }
        }
        Ok(())
    }

    fn reference_import(
        &mut self,
        package: usize,
        file: usize,
        alias: &str,
        member: Option<String>,
        pos: Coordinate,
    ) -> Result<()> {
        let parsed = &self.packages[package].files[file];
        let Some(import) = parsed.imports.get(alias) else {
            return Ok(());
        };
        let import_path = import.path.clone();
        let import_pos = import.pos;
        let from_file = parsed.name.clone();
        let from_path = self.packages[package].path.clone();

        self.edge_sites
            .entry((from_path.clone(), import_path.clone()))
            .or_insert((from_file.clone(), import_pos));

        match classify(&import_path) {
            ModuleKind::System(module) => {
                if let Some(member) = &member {
                    if !module.has_function(member) {
                        return Err(CompileError::resolver(
                            from_file,
                            pos,
                            format!("module '{}' has no member '{}'", module.name(), member),
                        )
                        .into());
                    }
                }
                self.mark_resolved(&import_path, ModuleKind::System(module))
            }
            kind @ ModuleKind::Plugin(_) => self.mark_resolved(&import_path, kind),
            _ => {
                let target = self.load_module(&import_path, &from_file, import_pos)?;
                self.graph.add_edge(&from_path, &import_path);
                if let Some(name) = member {
                    self.worklist.push_back(Work::Member {
                        package: target,
                        name,
                        site: (from_file, pos),
                    });
                }
                self.worklist.push_back(Work::All(target));
                Ok(())
            }
        }
    }

    fn mark_resolved(&mut self, path: &str, kind: ModuleKind) -> Result<()> {
        if self.graph.ensure(path, kind).state == ModuleState::Unresolved {
            self.graph.transition(path, ModuleState::Resolving)?;
            self.graph.transition(path, ModuleState::Resolved)?;
        }
        Ok(())
    }

    /// 第一次需要时定位并解析用户模块
    fn load_module(&mut self, path: &str, from_file: &str, pos: Coordinate) -> Result<usize> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        let location = self.locate(path, from_file, pos)?;
        let sources = self.locator.source_files(location.path());
        debug!(
            self.logger(),
            target: Phase::Resolver.target(),
            "resolving module {} ({} files)",
            path,
            sources.len()
        );

        self.graph.ensure(
            path,
            ModuleKind::User {
                location: Some(location.path().to_path_buf()),
            },
        );
        self.graph.transition(path, ModuleState::Resolving)?;
        self.load_files(path, &sources)
    }

    fn locate(&self, path: &str, from_file: &str, pos: Coordinate) -> Result<Location> {
        self.locator.locate(path).map_err(|tried| {
            let tried = tried
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            CompileError::resolver(
                from_file,
                pos,
                format!("cannot find module '{}' (tried {})", path, tried),
            )
            .into()
        })
    }

    /// 已加载的包进入 Resolved，其余导入定位后进入 Skipped
    fn finish_graph(&mut self) -> Result<()> {
        for package in &self.packages {
            self.graph.transition(&package.path, ModuleState::Resolved)?;
        }

        let mut unreferenced = Vec::new();
        for package in &self.packages {
            for parsed in &package.files {
                for (import, pos) in parsed.module.imports() {
                    if self.graph.get(&import.path).is_none() {
                        unreferenced.push((import.path.clone(), parsed.name.clone(), pos));
                    }
                }
            }
        }

        for (path, from_file, pos) in unreferenced {
            if self.graph.get(&path).is_some() {
                continue;
            }
            let kind = match classify(&path) {
                ModuleKind::User { .. } => {
                    let location = self.locate(&path, &from_file, pos)?;
                    ModuleKind::User {
                        location: Some(location.path().to_path_buf()),
                    }
                }
                other => other,
            };
            self.graph.ensure(&path, kind);
            self.graph.transition(&path, ModuleState::Skipped)?;
            debug!(
                self.logger(),
                target: Phase::Resolver.target(),
                "skipping unreferenced module {}",
                path
            );
        }
        Ok(())
    }

    fn check_cycles(&self) -> Result<()> {
        let Some(cycle) = self.graph.find_cycle(MAIN_PACKAGE) else {
            return Ok(());
        };
        let (file, pos) = self
            .edge_sites
            .get(&(cycle[0].clone(), cycle[1].clone()))
            .cloned()
            .unwrap_or_else(|| (cycle[0].clone(), Coordinate::default()));
        Err(CompileError::resolver(
            file,
            pos,
            format!("circular import: {}", cycle.join(" -> ")),
        )
        .into())
    }
}

/// 收集文件中的导入；同一别名指向不同模块是错误
fn collect_imports(file: &str, module: &ast::Module) -> Result<HashMap<String, ImportRef>> {
    let mut imports: HashMap<String, ImportRef> = HashMap::new();
    for (import, pos) in module.imports() {
        let name = import.name().to_string();
        if let Some(previous) = imports.get(&name) {
            if previous.path != import.path {
                return Err(CompileError::resolver(
                    file,
                    pos,
                    format!(
                        "import alias '{}' already refers to module '{}'",
                        name, previous.path
                    ),
                )
                .into());
            }
            continue;
        }
        imports.insert(
            name,
            ImportRef {
                path: import.path.clone(),
                pos,
            },
        );
    }
    Ok(imports)
}

/// 登记文件中的顶层定义
fn declare(
    package: &mut Package,
    file: usize,
    file_name: &str,
    module: &ast::Module,
    imports: &HashMap<String, ImportRef>,
) -> Result<()> {
    for (index, stmt) in module.body.iter().enumerate() {
        let (name, kind) = match &stmt.kind {
            ast::StmtKind::Assign(assign) => (&assign.target, SymbolKind::Binding),
            ast::StmtKind::Schema(schema) => (&schema.name, SymbolKind::Schema),
            _ => continue,
        };
        if imports.contains_key(name) {
            return Err(CompileError::checker(
                file_name,
                stmt.pos,
                format!("cannot reassign imported module '{}'", name),
            )
            .into());
        }
        if let Some(previous) = package.scope.get(name) {
            let where_ = if previous.file == file {
                let line = module
                    .body
                    .get(previous.stmt)
                    .map(|s| s.pos.line)
                    .unwrap_or_default();
                format!("line {}", line)
            } else {
                "another file of the same package".to_string()
            };
            return Err(CompileError::checker(
                file_name,
                stmt.pos,
                format!("'{}' is already defined at {}", name, where_),
            )
            .into());
        }
        package.scope.insert(
            name.clone(),
            Symbol {
                kind,
                file,
                stmt: index,
            },
        );
    }
    Ok(())
}
