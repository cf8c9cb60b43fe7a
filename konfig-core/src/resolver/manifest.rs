//! 项目清单 `konfig.mod`
//!
//! ```toml
//! [package]
//! name = "app"
//! version = "0.1.0"
//! edition = "v0.9.0"
//! ```

use konfig_vfs::VirtualFileSystem;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "konfig.mod";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    pub package: PackageSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageSection {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub edition: Option<String>,
}

impl Manifest {
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

/// 从 `start` 向上查找 `konfig.mod`，返回所在目录及其内容
pub fn find_manifest(
    vfs: &dyn VirtualFileSystem,
    start: &Path,
) -> Result<Option<(PathBuf, Manifest)>, String> {
    for dir in start.ancestors() {
        let candidate = dir.join(MANIFEST_FILE);
        if !vfs.is_file(&candidate) {
            continue;
        }
        let source = vfs
            .read_to_string(&candidate)
            .map_err(|e| format!("cannot read {}: {}", candidate.display(), e))?;
        let manifest = Manifest::parse(&source)
            .map_err(|e| format!("invalid {}: {}", candidate.display(), e))?;
        return Ok(Some((dir.to_path_buf(), manifest)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use konfig_vfs::MemoryFileSystem;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(
            "[package]\nname = \"app\"\nversion = \"0.1.0\"\nedition = \"v0.9.0\"\n",
        )
        .unwrap();
        assert_eq!(manifest.package.name, "app");
        assert_eq!(manifest.package.version.as_deref(), Some("0.1.0"));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        assert!(Manifest::parse("[package]\nversion = \"1\"\n").is_err());
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let vfs = MemoryFileSystem::with_files([
            ("/proj/konfig.mod", "[package]\nname = \"proj\"\n"),
            ("/proj/app/main.k", "a = 1\n"),
        ]);
        let (root, manifest) = find_manifest(&vfs, Path::new("/proj/app"))
            .unwrap()
            .unwrap();
        assert_eq!(root, PathBuf::from("/proj"));
        assert_eq!(manifest.package.name, "proj");

        assert!(find_manifest(&vfs, Path::new("/other")).unwrap().is_none());
    }

    #[test]
    fn test_invalid_manifest_reports_path() {
        let vfs = MemoryFileSystem::with_files([("/p/konfig.mod", "not toml [")]);
        let err = find_manifest(&vfs, Path::new("/p")).unwrap_err();
        assert!(err.contains("konfig.mod"));
    }
}
