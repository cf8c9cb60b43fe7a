//! 导入路径到文件的映射
//!
//! `import a.b` 依次尝试 `<root>/a/b.k` 与目录 `<root>/a/b/`（目录中所有
//! 非 `_test.k` 的 `.k` 文件组成一个包）。如果路径首段等于清单中的包名，
//! 还会去掉首段再尝试一次。

use konfig_vfs::VirtualFileSystem;
use std::path::{Path, PathBuf};

pub const SOURCE_EXT: &str = "k";
const TEST_SUFFIX: &str = "_test.k";

/// 定位结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Dir(PathBuf),
}

impl Location {
    pub fn path(&self) -> &Path {
        match self {
            Location::File(p) | Location::Dir(p) => p,
        }
    }
}

pub struct Locator<'a> {
    vfs: &'a dyn VirtualFileSystem,
    root: PathBuf,
    package_name: Option<String>,
}

impl<'a> Locator<'a> {
    pub fn new(vfs: &'a dyn VirtualFileSystem, root: PathBuf, package_name: Option<String>) -> Self {
        Self {
            vfs,
            root,
            package_name,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 定位模块；失败时返回尝试过的所有路径
    pub fn locate(&self, import_path: &str) -> Result<Location, Vec<PathBuf>> {
        let mut tried = Vec::new();
        for segments in self.candidates(import_path) {
            let mut base = self.root.clone();
            for segment in &segments {
                base.push(segment);
            }

            let file = base.with_extension(SOURCE_EXT);
            if self.vfs.is_file(&file) {
                return Ok(Location::File(file));
            }
            tried.push(file);

            if self.vfs.is_dir(&base) && !self.source_files(&base).is_empty() {
                return Ok(Location::Dir(base));
            }
            tried.push(base);
        }
        Err(tried)
    }

    fn candidates<'p>(&self, import_path: &'p str) -> Vec<Vec<&'p str>> {
        let segments: Vec<&str> = import_path.split('.').collect();
        let mut candidates = vec![segments.clone()];
        if let Some(name) = &self.package_name {
            if segments.len() > 1 && segments[0] == name {
                candidates.push(segments[1..].to_vec());
            }
        }
        candidates
    }

    /// 包的源文件，按路径排序
    pub fn source_files(&self, location: &Path) -> Vec<PathBuf> {
        if self.vfs.is_file(location) {
            return vec![location.to_path_buf()];
        }
        let Ok(entries) = self.vfs.read_dir(location) else {
            return Vec::new();
        };
        entries
            .into_iter()
            .filter(|p| is_source_file(p) && self.vfs.is_file(p))
            .collect()
    }

    /// 用于诊断信息的文件名：能去掉根目录前缀时使用相对路径
    pub fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) && !name.ends_with(TEST_SUFFIX)
}
