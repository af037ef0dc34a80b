//! 目录形态判定与分派
//!
//! 对应 xfs_repair 的 `process_dir2`：按 inode 大小、数据分支格式和块映射
//! 末尾判断目录是短格式、单块、叶子还是节点格式，再交给对应的检查。

use crate::block::BlockDevice;
use crate::error::Result;

use super::context::{DirInode, DirOutcome, DirRepairer, ForkFormat, InodeOracle};

/// 目录的存储形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirForm {
    /// 内联在 inode 中
    ShortForm,
    /// 单个目录块
    Block,
    /// 数据块 + 单个叶子块
    Leaf,
    /// 数据块 + 哈希 B 树
    Node,
}

impl<D: BlockDevice, O: InodeOracle> DirRepairer<D, O> {
    /// 判定目录形态，无法判定时返回 `None`
    pub fn classify_dir(&self, inode: &DirInode) -> Option<DirForm> {
        let last = inode.blkmap.as_ref().map(|m| m.last_off()).unwrap_or(0);
        let mapped = matches!(inode.format, ForkFormat::Extents | ForkFormat::Btree);
        let leaf_end = self.geo.leafblk + self.geo.fsbcount;

        if inode.size <= inode.fork.len() as u64 && inode.format == ForkFormat::Local {
            Some(DirForm::ShortForm)
        } else if mapped && last == self.geo.fsbcount {
            Some(DirForm::Block)
        } else if mapped && last == leaf_end {
            Some(DirForm::Leaf)
        } else if mapped && last > leaf_end {
            Some(DirForm::Node)
        } else {
            None
        }
    }

    /// 检查并修复一个目录
    ///
    /// 只有块设备写失败才返回 `Err`；目录本身的损坏体现在结果的 `junk`
    /// 和坏目录列表中。短格式目录的 inode 内容可能被改写
    /// （此时 `dino_dirty` 置位）。
    pub fn process_dir(&mut self, inode: &mut DirInode) -> Result<DirOutcome> {
        let ino = inode.ino;
        let mut out = DirOutcome::default();

        match self.classify_dir(inode) {
            Some(DirForm::ShortForm) => {
                // 短格式目录的 "." 是隐含的，".." 就是头部的父目录号
                out.dot = true;
                out.dotdot = true;
                self.process_sf_dir(inode, &mut out);
            }
            Some(DirForm::Block) => self.process_block_dir(inode, &mut out)?,
            Some(DirForm::Leaf) => self.process_leaf_node_dir(inode, false, &mut out)?,
            Some(DirForm::Node) => self.process_leaf_node_dir(inode, true, &mut out)?,
            None => {
                log::warn!("[DIR] bad size/format for directory {}", ino);
                out.junk = true;
                return Ok(out);
            }
        }
        if out.junk {
            return Ok(out);
        }

        if !out.dot {
            log::warn!("[DIR] no . entry for directory {}", ino);
        }
        if !out.dotdot {
            if ino == self.sb.rootino {
                log::warn!("[DIR] no .. entry for root directory {}", ino);
                self.need_root_dotdot = true;
            } else {
                log::warn!("[DIR] no .. entry for directory {}", ino);
            }
        }
        Ok(out)
    }
}
