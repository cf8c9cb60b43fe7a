//! Section 定义和管理
//!
//! Section Directory 记录文件中每个 section 的类型、偏移和大小

/// Section 类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// 元数据：源文件名、源码摘要、编译器版本
    Metadata = 0x01,
    /// schema 定义
    Schemas = 0x02,
    /// 包、绑定和入口
    Code = 0x03,
    /// 调试信息（文件表）
    DebugInfo = 0x04,
}

impl SectionKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(SectionKind::Metadata),
            0x02 => Some(SectionKind::Schemas),
            0x03 => Some(SectionKind::Code),
            0x04 => Some(SectionKind::DebugInfo),
            _ => None,
        }
    }
}

/// Section Directory 条目 (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionEntry {
    /// Section 类型 (1 byte)
    pub kind: SectionKind,
    /// 对齐填充 (1 byte)
    pub padding: u8,
    /// 标志 (2 bytes)，目前未使用
    pub flags: u16,
    /// 在文件中的偏移 (4 bytes)
    pub offset: u32,
    /// 数据大小 (4 bytes)
    pub size: u32,
    /// 保留 (4 bytes)
    pub reserved: u32,
}

impl SectionEntry {
    pub const ENTRY_SIZE: usize = 16;

    pub fn new(kind: SectionKind, offset: u32, size: u32) -> Self {
        Self {
            kind,
            padding: 0,
            flags: 0,
            offset,
            size,
            reserved: 0,
        }
    }

    pub fn end(&self) -> usize {
        self.offset as usize + self.size as usize
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0] = self.kind as u8;
        bytes[1] = self.padding;
        bytes[2..4].copy_from_slice(&self.flags.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SectionError> {
        if bytes.len() < Self::ENTRY_SIZE {
            return Err(SectionError::TooShort);
        }

        let kind = SectionKind::from_u8(bytes[0]).ok_or(SectionError::InvalidKind(bytes[0]))?;

        Ok(Self {
            kind,
            padding: bytes[1],
            flags: u16::from_le_bytes([bytes[2], bytes[3]]),
            offset: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            reserved: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// Section Directory
#[derive(Debug, Clone, Default)]
pub struct SectionDirectory {
    pub entries: Vec<SectionEntry>,
}

impl SectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: SectionEntry) {
        self.entries.push(entry);
    }

    /// 查找指定类型的 section
    pub fn find(&self, kind: SectionKind) -> Option<&SectionEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() * SectionEntry::ENTRY_SIZE);
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SectionError> {
        if bytes.len() % SectionEntry::ENTRY_SIZE != 0 {
            return Err(SectionError::InvalidSize);
        }

        let entries = bytes
            .chunks_exact(SectionEntry::ENTRY_SIZE)
            .map(SectionEntry::from_bytes)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }
}

/// Section 错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// 数据太短
    TooShort,
    /// 无效的 section 类型
    InvalidKind(u8),
    /// 无效的数据大小
    InvalidSize,
}

impl std::fmt::Display for SectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionError::TooShort => write!(f, "section data too short"),
            SectionError::InvalidKind(k) => write!(f, "invalid section kind: {}", k),
            SectionError::InvalidSize => write!(f, "invalid section directory size"),
        }
    }
}

impl std::error::Error for SectionError {}
