//! 错误类型定义
//!
//! 提供日志恢复与目录修复操作的错误类型。

use core::fmt;

/// 修复/恢复操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（设备读写失败）
    Io,
    /// 无效参数，或设备内容根本不是日志
    InvalidInput,
    /// 磁盘结构损坏（magic、计数、哈希顺序、兄弟指针等）
    Corrupted,
    /// 内存不足（扫描缓冲区减半到 0 仍无法分配）
    OutOfMemory,
    /// 目录块未映射
    NotFound,
    /// 内部不变量被破坏（游标误用等）
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为结构损坏
    pub const fn is_corrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::Corrupted)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
