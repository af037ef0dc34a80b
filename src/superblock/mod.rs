//! Superblock 模块
//!
//! 只解码日志恢复与目录修复用到的字段，并提供地址与 inode 号换算。

mod read;

pub use read::*;
