//! 目录检查与修复模块
//!
//! 逐个检查 v2 格式目录，清除引用非法 inode 的目录项，修正 "."/".."，
//! 重建数据块的 best-free 表，并校验节点格式目录的哈希 B 树。
//!
//! ## 模块结构
//!
//! - `types` - 目录各种磁盘结构的编解码（大端）
//! - `context` - 修复配置、inode 分配表接口、[`DirRepairer`]
//! - `classify` - 目录形态判定与分派（[`DirRepairer::process_dir`]）
//! - `shortform` - 短格式（内联）目录
//! - `data` - 数据块、单块目录和叶子/节点目录的数据块
//! - `node` - 哈希 B 树路径校验
//!
//! ## 示例
//!
//! ```rust,ignore
//! use xfs_repair_core::dir::{DirRepairer, InodeTree, RepairConfig};
//!
//! let mut repairer = DirRepairer::new(bdev, sb, inode_tree, RepairConfig::default());
//! let outcome = repairer.process_dir(&mut dir_inode)?;
//! if outcome.junk {
//!     // 整个目录需要清除
//! }
//! for ino in repairer.bad_dirs() {
//!     // 留给重建阶段
//! }
//! ```

pub mod classify;
pub mod context;
pub mod data;
pub mod node;
mod shortform;
pub mod types;

pub use classify::DirForm;
pub use context::{
    DirGeometry, DirInode, DirOutcome, DirRepairer, DirVerifiers, ForkFormat, InodeOracle,
    InodeRecord, InodeTree, RepairConfig,
};
pub use data::bestfree_rebuild;
pub use node::TreeCheck;
