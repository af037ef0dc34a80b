//! xfs_repair_core: XFS 日志恢复与目录修复核心
//!
//! 离线检查/修复工具的两个核心子系统：
//! - **日志恢复**：在环形预写日志上定位头部和尾部，重组并重放已提交的事务
//! - **目录修复**：检查短格式、单块、叶子和节点格式目录，清除坏目录项，
//!   修正 "."/".."，校验哈希 B 树路径
//!
//! 库本身是 `no_std` + `alloc`，通过 [`BlockDevice`] trait 访问底层设备，
//! 通过 `log` 门面输出修复报告（不安装 logger）。
//!
//! # 示例
//!
//! ```rust,ignore
//! use xfs_repair_core::{BlockDev, read_superblock, Result};
//! use xfs_repair_core::xlog::{recover, Xlog, XlogConfig};
//!
//! fn replay(device: MyDevice) -> Result<()> {
//!     let mut bdev = BlockDev::new(device)?;
//!     let sb = read_superblock(&mut bdev)?;
//!     let mut log = Xlog::from_superblock(&sb, XlogConfig::default())?;
//!     recover(&mut log, &mut bdev, &mut |trans, pass| {
//!         // 按 pass 应用事务
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象、缓冲区和 I/O
//! - [`cache`] - 基本块缓存
//! - [`consts`] - 磁盘格式常量
//! - [`superblock`] - Superblock 解析
//! - [`blkmap`] - 目录逻辑块映射
//! - [`xlog`] - 日志恢复
//! - [`dir`] - 目录修复

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// Superblock 操作
pub mod superblock;

/// 块缓存
pub mod cache;

/// 目录块映射
pub mod blkmap;

/// 日志恢复
pub mod xlog;

/// 目录修复
pub mod dir;

/// CRC32 校验和计算
pub(crate) mod crc;

#[cfg(test)]
mod test_util;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDev, BlockDevice, Buf, BufMap, BufOps, BufStatus};

// Superblock
pub use superblock::{read_superblock, Superblock};

// 块映射
pub use blkmap::{BlockMap, BmapExtent};

// Cache
pub use cache::{BlockCache, CacheBuffer, CacheFlags, CacheStats, DEFAULT_CACHE_SIZE};

// 日志恢复
pub use xlog::{recover, Xlog, XlogConfig};

// 目录修复
pub use dir::{DirInode, DirOutcome, DirRepairer, InodeOracle, InodeTree, RepairConfig};
