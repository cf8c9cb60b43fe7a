//! 构建产物文件头
//!
//! 64 字节固定大小：Magic、版本、标志、时间戳、Section Directory 位置、校验和

/// 文件头魔数: "KFIG"
pub const MAGIC: [u8; 4] = [b'K', b'F', b'I', b'G'];

/// 当前文件格式版本
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// 文件头大小: 64 字节
pub const HEADER_SIZE: usize = 64;

/// 校验和字段在文件头中的偏移
pub const HASH_OFFSET: usize = HEADER_SIZE - 32;

/// 特性标志位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags(pub u16);

impl FeatureFlags {
    /// 包含调试信息段
    pub const HAS_DEBUG_INFO: u16 = 0x0001;
    /// 包含 Blake3 校验和
    pub const HAS_CHECKSUM: u16 = 0x0002;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn insert(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn remove(&mut self, flag: u16) {
        self.0 &= !flag;
    }
}

/// 文件头 (64 字节)
///
/// ```text
/// [0..4]   magic
/// [4..6]   version major / minor
/// [6..8]   flags
/// [8..16]  created_at (unix 秒)
/// [16..20] section directory 偏移
/// [20..24] section directory 大小
/// [24..26] section 数量
/// [26..32] 保留
/// [32..64] blake3 校验和（不含本字段）
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: FeatureFlags,
    pub created_at: u64,
    pub section_dir_offset: u32,
    pub section_dir_size: u32,
    pub section_count: u16,
    pub blake3_hash: [u8; 32],
}

impl FileHeader {
    pub fn new(created_at: u64) -> Self {
        Self {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            flags: FeatureFlags::empty(),
            created_at,
            section_dir_offset: 0,
            section_dir_size: 0,
            section_count: 0,
            blake3_hash: [0; 32],
        }
    }

    /// 序列化为字节数组
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version_major;
        bytes[5] = self.version_minor;
        bytes[6..8].copy_from_slice(&self.flags.0.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.created_at.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.section_dir_offset.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.section_dir_size.to_le_bytes());
        bytes[24..26].copy_from_slice(&self.section_count.to_le_bytes());
        bytes[HASH_OFFSET..].copy_from_slice(&self.blake3_hash);
        bytes
    }

    /// 从字节数组反序列化
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort);
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        let mut created_at = [0u8; 8];
        created_at.copy_from_slice(&bytes[8..16]);
        let mut blake3_hash = [0u8; 32];
        blake3_hash.copy_from_slice(&bytes[HASH_OFFSET..HEADER_SIZE]);

        Ok(Self {
            magic,
            version_major: bytes[4],
            version_minor: bytes[5],
            flags: FeatureFlags(u16::from_le_bytes([bytes[6], bytes[7]])),
            created_at: u64::from_le_bytes(created_at),
            section_dir_offset: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            section_dir_size: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
            section_count: u16::from_le_bytes([bytes[24], bytes[25]]),
            blake3_hash,
        })
    }

    /// 验证文件头
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.magic != MAGIC {
            return Err(HeaderError::InvalidMagic(self.magic));
        }

        if self.version_major != VERSION_MAJOR {
            return Err(HeaderError::UnsupportedVersion {
                major: self.version_major,
                minor: self.version_minor,
            });
        }

        Ok(())
    }
}

/// 文件头错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// 数据太短
    TooShort,
    /// 无效的 Magic
    InvalidMagic([u8; 4]),
    /// 不支持的版本
    UnsupportedVersion { major: u8, minor: u8 },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderError::TooShort => write!(f, "header too short"),
            HeaderError::InvalidMagic(m) => {
                write!(f, "invalid magic: {:02x?} (expected KFIG)", m)
            }
            HeaderError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported artifact version: {}.{}", major, minor)
            }
        }
    }
}

impl std::error::Error for HeaderError {}

/// 当前 Unix 时间戳（秒）
pub(crate) fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut header = FileHeader::new(1_700_000_000);
        header.flags.insert(FeatureFlags::HAS_CHECKSUM);
        header.section_count = 3;
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let parsed = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"XXXX");
        let result = FileHeader::from_bytes(&bytes);
        assert!(matches!(result, Err(HeaderError::InvalidMagic(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = FileHeader::new(0);
        header.version_major = VERSION_MAJOR + 1;
        assert!(matches!(
            header.validate(),
            Err(HeaderError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_feature_flags() {
        let mut flags = FeatureFlags::empty();
        assert!(!flags.contains(FeatureFlags::HAS_DEBUG_INFO));

        flags.insert(FeatureFlags::HAS_DEBUG_INFO);
        assert!(flags.contains(FeatureFlags::HAS_DEBUG_INFO));

        flags.remove(FeatureFlags::HAS_DEBUG_INFO);
        assert!(!flags.contains(FeatureFlags::HAS_DEBUG_INFO));
    }
}
