//! 构建产物格式
//!
//! # 文件格式
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           File Header (64 bytes)          │
//! ├──────────────────────────────────────────┤
//! │  Metadata   │ 源文件名、源码摘要、编译器版本 │
//! ├──────────────────────────────────────────┤
//! │  Schemas    │ schema 定义                  │
//! ├──────────────────────────────────────────┤
//! │  Code       │ 包、绑定、入口、初始化顺序     │
//! ├──────────────────────────────────────────┤
//! │  DebugInfo  │ 文件表（可选）                │
//! ├──────────────────────────────────────────┤
//! │           Section Directory               │
//! └──────────────────────────────────────────┘
//! ```
//!
//! 各 section 的内容由 bincode 编码，整个文件由 Blake3 校验。

mod header;
mod reader;
mod section;
mod writer;

pub use header::{FeatureFlags, FileHeader, HeaderError, HEADER_SIZE, MAGIC};
pub(crate) use header::current_timestamp;
pub use reader::{BinaryReader, ReadError};
pub use section::{SectionDirectory, SectionEntry, SectionError, SectionKind};
pub use writer::{BinaryWriter, WriteOptions};

use crate::error::{LoadError, LoadErrorKind};
use crate::ir::{PackageIr, Program, SchemaIr};
use serde::{Deserialize, Serialize};

/// 构建产物的推荐扩展名
pub const ARTIFACT_EXT: &str = "kfig";

/// 元数据段：仅用于诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub filenames: Vec<String>,
    /// 所有源文件内容的 Blake3 摘要（十六进制）
    pub source_digest: String,
    pub created_at: u64,
    pub compiler_version: String,
}

/// 调试信息段：`Pos::file` 指向的文件表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub files: Vec<String>,
}

impl DebugInfo {
    pub fn file(&self, index: u32) -> Option<&str> {
        self.files.get(index as usize).map(String::as_str)
    }
}

/// 解码后的构建产物
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub metadata: ArtifactMetadata,
    pub program: Program,
    pub debug_info: Option<DebugInfo>,
}

/// 编码为产物字节
pub fn encode_artifact(artifact: &Artifact, options: &WriteOptions) -> Result<Vec<u8>, bincode::Error> {
    let mut writer = BinaryWriter::new(options);
    let program = &artifact.program;

    writer.write_section(SectionKind::Metadata, &bincode::serialize(&artifact.metadata)?);
    writer.write_section(SectionKind::Schemas, &bincode::serialize(&program.schemas)?);
    writer.write_section(
        SectionKind::Code,
        &bincode::serialize(&(&program.packages, program.entry, &program.init_order))?,
    );
    if options.emit_debug_info {
        if let Some(debug_info) = &artifact.debug_info {
            writer.write_section(SectionKind::DebugInfo, &bincode::serialize(debug_info)?);
        }
    }

    Ok(writer.finish())
}

/// 从产物字节解码
pub fn decode_artifact(bytes: Vec<u8>) -> Result<Artifact, LoadError> {
    let reader = BinaryReader::from_bytes(bytes)?;

    let metadata: ArtifactMetadata = decode_section(&reader, SectionKind::Metadata)?;
    let schemas: Vec<SchemaIr> = decode_section(&reader, SectionKind::Schemas)?;
    let (packages, entry, init_order): (Vec<PackageIr>, usize, Vec<usize>) =
        decode_section(&reader, SectionKind::Code)?;
    let debug_info = if reader.has_section(SectionKind::DebugInfo) {
        Some(decode_section(&reader, SectionKind::DebugInfo)?)
    } else {
        None
    };

    let program = Program {
        packages,
        schemas,
        entry,
        init_order,
    };
    program
        .validate()
        .map_err(|message| LoadError::new(LoadErrorKind::Inconsistent(message)))?;

    Ok(Artifact {
        metadata,
        program,
        debug_info,
    })
}

fn decode_section<T: serde::de::DeserializeOwned>(
    reader: &BinaryReader,
    kind: SectionKind,
) -> Result<T, LoadError> {
    let data = reader.read_section(kind)?;
    bincode::deserialize(data).map_err(|e| {
        LoadError::new(LoadErrorKind::Payload {
            section: kind,
            message: e.to_string(),
        })
    })
}
