//! 构建产物读取器

use super::header::{FeatureFlags, FileHeader, HeaderError, HASH_OFFSET, HEADER_SIZE};
use super::section::{SectionDirectory, SectionError, SectionKind};
use super::writer::compute_blake3_hash;

/// 二进制读取器
#[derive(Debug)]
pub struct BinaryReader {
    data: Vec<u8>,
    header: FileHeader,
    sections: SectionDirectory,
}

/// 读取错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// 文件头错误
    Header(HeaderError),
    /// Section 错误
    Section(SectionError),
    /// 数据太短
    TooShort,
    /// 无效的偏移
    InvalidOffset,
    /// section 越界
    InvalidSectionSize(SectionKind),
    /// 校验和不匹配
    ChecksumMismatch,
    /// Section 未找到
    SectionNotFound(SectionKind),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Header(e) => write!(f, "header error: {}", e),
            ReadError::Section(e) => write!(f, "section error: {}", e),
            ReadError::TooShort => write!(f, "data too short"),
            ReadError::InvalidOffset => write!(f, "section directory out of bounds"),
            ReadError::InvalidSectionSize(k) => write!(f, "section {:?} out of bounds", k),
            ReadError::ChecksumMismatch => write!(f, "checksum mismatch"),
            ReadError::SectionNotFound(k) => write!(f, "section not found: {:?}", k),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Header(e) => Some(e),
            ReadError::Section(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeaderError> for ReadError {
    fn from(e: HeaderError) -> Self {
        ReadError::Header(e)
    }
}

impl From<SectionError> for ReadError {
    fn from(e: SectionError) -> Self {
        ReadError::Section(e)
    }
}

impl BinaryReader {
    /// 解析并校验整个文件
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ReadError> {
        if data.len() < HEADER_SIZE {
            return Err(ReadError::TooShort);
        }

        let header = FileHeader::from_bytes(&data[..HEADER_SIZE])?;
        header.validate()?;

        if header.flags.contains(FeatureFlags::HAS_CHECKSUM)
            && compute_blake3_hash(&data) != data[HASH_OFFSET..HEADER_SIZE]
        {
            return Err(ReadError::ChecksumMismatch);
        }

        let section_dir_start = header.section_dir_offset as usize;
        let section_dir_end = section_dir_start + header.section_dir_size as usize;
        if section_dir_start < HEADER_SIZE || section_dir_end > data.len() {
            return Err(ReadError::InvalidOffset);
        }

        let sections = SectionDirectory::from_bytes(&data[section_dir_start..section_dir_end])?;
        if sections.count() != header.section_count as usize {
            return Err(ReadError::Section(SectionError::InvalidSize));
        }
        for entry in &sections.entries {
            if (entry.offset as usize) < HEADER_SIZE || entry.end() > section_dir_start {
                return Err(ReadError::InvalidSectionSize(entry.kind));
            }
        }

        Ok(Self {
            data,
            header,
            sections,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn sections(&self) -> &SectionDirectory {
        &self.sections
    }

    /// 读取指定 section 的数据
    pub fn read_section(&self, kind: SectionKind) -> Result<&[u8], ReadError> {
        let entry = self
            .sections
            .find(kind)
            .ok_or(ReadError::SectionNotFound(kind))?;
        Ok(&self.data[entry.offset as usize..entry.end()])
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.sections.find(kind).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::{BinaryWriter, WriteOptions};
    use super::*;

    fn create_test_binary() -> Vec<u8> {
        let mut writer = BinaryWriter::new(&WriteOptions::default());
        writer.write_section(SectionKind::Metadata, b"test metadata");
        writer.write_section(SectionKind::Code, &[0x01, 0x02, 0x03, 0x04]);
        writer.finish()
    }

    #[test]
    fn test_reader_basic() {
        let reader = BinaryReader::from_bytes(create_test_binary()).unwrap();
        assert_eq!(reader.header().magic, super::super::header::MAGIC);
        assert_eq!(reader.sections().count(), 2);
        assert!(reader.has_section(SectionKind::Code));
        assert!(!reader.has_section(SectionKind::DebugInfo));
    }

    #[test]
    fn test_read_section() {
        let reader = BinaryReader::from_bytes(create_test_binary()).unwrap();
        assert_eq!(
            reader.read_section(SectionKind::Metadata).unwrap(),
            b"test metadata"
        );
        assert_eq!(
            reader.read_section(SectionKind::Code).unwrap(),
            &[0x01, 0x02, 0x03, 0x04]
        );
        assert!(matches!(
            reader.read_section(SectionKind::DebugInfo),
            Err(ReadError::SectionNotFound(SectionKind::DebugInfo))
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = create_test_binary();
        data[0] = b'X';
        assert!(matches!(
            BinaryReader::from_bytes(data),
            Err(ReadError::Header(HeaderError::InvalidMagic(_)))
        ));
    }

    #[test]
    fn test_corrupted_payload() {
        let mut data = create_test_binary();
        data[HEADER_SIZE + 2] ^= 0xff;
        assert_eq!(
            BinaryReader::from_bytes(data).unwrap_err(),
            ReadError::ChecksumMismatch
        );
    }

    #[test]
    fn test_truncated() {
        let data = create_test_binary();
        assert_eq!(
            BinaryReader::from_bytes(data[..10].to_vec()).unwrap_err(),
            ReadError::TooShort
        );
        assert!(BinaryReader::from_bytes(data[..data.len() - 4].to_vec()).is_err());
    }
}
