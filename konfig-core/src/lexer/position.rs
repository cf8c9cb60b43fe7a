//! 通用位置类型

use serde::{Deserialize, Serialize};

/// 源代码坐标（1-based）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 源代码范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Coordinate,
    pub end: Coordinate,
}

impl Span {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        Self { start, end }
    }

    /// 从单个坐标创建 span（用于单 token）
    pub fn at(coord: Coordinate) -> Self {
        Self {
            start: coord,
            end: coord,
        }
    }
}
