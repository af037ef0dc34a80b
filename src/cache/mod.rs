//! 基本块缓存模块
//!
//! 对应 libxfs 缓冲区缓存中按设备地址索引的那一层，单位为基本块（512 字节）。
//!
//! # 主要组件
//!
//! - [`CacheBuffer`] - 单个缓存块，包含数据和状态标志
//! - [`BlockCache`] - 缓存管理器，使用 lru crate 提供 LRU 驱逐
//! - [`CacheFlags`] - 缓存块状态标志
//! - [`CacheStats`] - 缓存统计信息
//!
//! 脏块在 [`crate::BlockDev::flush`] 时写回；被驱逐的脏块交还调用方立即写回，
//! 缓存从不丢弃未写回的数据。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use xfs_repair_core::BlockDev;
//!
//! let mut bdev = BlockDev::new_with_cache(device, 1024)?;
//! bdev.read_bbs(0, 8, &mut buf)?;
//! bdev.flush()?;
//! ```

mod buffer;
mod block_cache;

pub use buffer::{CacheBuffer, CacheFlags};
pub use block_cache::{BlockCache, CacheStats, DEFAULT_CACHE_SIZE};
