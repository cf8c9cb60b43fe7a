//! 构建产物写入器

use super::header::{current_timestamp, FeatureFlags, FileHeader, HASH_OFFSET, HEADER_SIZE};
use super::section::{SectionDirectory, SectionEntry, SectionKind};

/// 二进制写入器
pub struct BinaryWriter {
    header: FileHeader,
    sections: SectionDirectory,
    /// 整个文件的缓冲区，开头预留文件头
    buffer: Vec<u8>,
}

/// 写入选项
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// 是否写入调试信息段
    pub emit_debug_info: bool,
    /// 是否计算校验和
    pub checksum: bool,
    /// 写入文件头的创建时间，`None` 表示当前时间
    pub created_at: Option<u64>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            checksum: true,
            created_at: None,
        }
    }
}

impl BinaryWriter {
    pub fn new(options: &WriteOptions) -> Self {
        let mut header = FileHeader::new(options.created_at.unwrap_or_else(current_timestamp));
        if options.emit_debug_info {
            header.flags.insert(FeatureFlags::HAS_DEBUG_INFO);
        }
        if options.checksum {
            header.flags.insert(FeatureFlags::HAS_CHECKSUM);
        }

        let mut buffer = Vec::with_capacity(4096);
        buffer.resize(HEADER_SIZE, 0);

        Self {
            header,
            sections: SectionDirectory::new(),
            buffer,
        }
    }

    pub fn current_offset(&self) -> usize {
        self.buffer.len()
    }

    /// 对齐到指定边界
    pub fn align_to(&mut self, alignment: usize) {
        let rem = self.buffer.len() % alignment;
        if rem != 0 {
            self.buffer.resize(self.buffer.len() + alignment - rem, 0);
        }
    }

    /// 写入 section 数据，返回其在文件中的偏移
    pub fn write_section(&mut self, kind: SectionKind, data: &[u8]) -> u32 {
        self.align_to(8);

        let offset = self.buffer.len() as u32;
        self.sections
            .add(SectionEntry::new(kind, offset, data.len() as u32));
        self.buffer.extend_from_slice(data);

        offset
    }

    /// 完成写入：追加 section directory，回填文件头和校验和
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to(8);
        let section_dir_offset = self.buffer.len() as u32;
        let section_dir_data = self.sections.to_bytes();

        self.buffer.extend_from_slice(&section_dir_data);

        self.header.section_count = self.sections.count() as u16;
        self.header.section_dir_offset = section_dir_offset;
        self.header.section_dir_size = section_dir_data.len() as u32;

        // 先写入不含校验和的文件头，校验和覆盖除 hash 字段外的全部字节
        self.buffer[..HEADER_SIZE].copy_from_slice(&self.header.to_bytes());
        if self.header.flags.contains(FeatureFlags::HAS_CHECKSUM) {
            self.header.blake3_hash = compute_blake3_hash(&self.buffer);
            self.buffer[..HEADER_SIZE].copy_from_slice(&self.header.to_bytes());
        }

        self.buffer
    }

    pub fn sections(&self) -> &SectionDirectory {
        &self.sections
    }
}

/// 计算 Blake3 校验和，跳过文件头中的 hash 字段
pub(crate) fn compute_blake3_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&data[..HASH_OFFSET]);
    if data.len() > HEADER_SIZE {
        hasher.update(&data[HEADER_SIZE..]);
    }
    *hasher.finalize().as_bytes()
}
