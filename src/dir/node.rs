//! 哈希 B 树路径校验
//!
//! 节点格式目录的叶子块按哈希排序，由一棵索引节点树覆盖。每个节点项记录
//! 子块中**最大**的哈希值和子块号。
//!
//! 校验分三步：
//!
//! 1. 沿最左路径下降到第一个叶子块，沿途把每层节点块放进游标
//! 2. 从左到右遍历叶子块，每跨过一个块边界就向上校验一次路径
//!    （子块号必须匹配，哈希值不匹配时就地修正）
//! 3. 最后一个叶子块校验最右路径：每层必须恰好用完所有项且没有后继块
//!
//! 游标按层持有节点块缓冲区；失败时全部直接丢弃，不写回。

use crate::block::{BlockDevice, Buf, BufOps, BufStatus};
use crate::blkmap::{extents_to_buf_maps, BlockMap};
use crate::consts::{
    XFS_DA_NODE_MAGIC, XFS_DA_NODE_MAXDEPTH, XFS_DIR2_LEAFN_MAGIC, XFS_DIR2_NULL_DATAPTR,
};
use crate::error::{Error, ErrorKind, Result};

use super::context::{DirRepairer, InodeOracle};
use super::types::{leaf_entry_pos, LeafEntry, LeafHdr, NodeEntry, NodeHdr, LEAF_ENTRY_SIZE};

/// 游标中的一层
#[derive(Debug, Default)]
struct CursorLevel {
    /// 该层当前持有的节点块（叶子层不持有）
    buf: Option<Buf>,
    /// 块号
    bno: u32,
    /// 该块中最大（已校验部分）的哈希值
    hashval: u32,
    /// 下一个待校验的项
    index: usize,
    dirty: bool,
}

/// 哈希树游标
#[derive(Debug, Default)]
struct DaCursor {
    /// 根所在的层号
    active: usize,
    levels: [CursorLevel; XFS_DA_NODE_MAXDEPTH],
    greatest_bno: u32,
    corrections: u32,
    repair: bool,
}

impl DaCursor {
    fn node(&self, level: usize) -> Result<&[u8]> {
        self.levels[level]
            .buf
            .as_ref()
            .map(Buf::data)
            .ok_or(Error::new(ErrorKind::InvalidState, "cursor level holds no block"))
    }

    fn node_mut(&mut self, level: usize) -> Result<&mut [u8]> {
        self.levels[level]
            .buf
            .as_mut()
            .map(Buf::data_mut)
            .ok_or(Error::new(ErrorKind::InvalidState, "cursor level holds no block"))
    }

    fn note_bno(&mut self, level: usize) {
        self.greatest_bno = self.greatest_bno.max(self.levels[level].bno);
    }

    /// 丢弃所有层持有的块
    fn release_all(&mut self) {
        for level in self.levels.iter_mut() {
            level.buf = None;
            level.dirty = false;
        }
    }
}

/// 哈希树检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeCheck {
    /// 树结构完好（可能做过哈希修正）
    pub ok: bool,
    /// 修正（或 dry-run 时应修正）的节点哈希值个数
    pub corrections: u32,
    /// 遇到的最大节点块号
    pub greatest_bno: u32,
    /// 有块被写回
    pub repair: bool,
}

/// 最左下降的结果
enum Descent {
    /// 第一个叶子块号
    Leaf(u32),
    /// 根就是叶子块，没有索引树
    NoTree,
    Bad,
}

impl<D: BlockDevice, O: InodeOracle> DirRepairer<D, O> {
    /// 校验节点格式目录的哈希树
    ///
    /// 路径上可修正的哈希值会被修正并写回（dry-run 时只计数）。
    pub fn check_node_tree(&mut self, ino: u64, blkmap: &BlockMap) -> Result<TreeCheck> {
        let mut cursor = DaCursor::default();
        let ok = match self.descend_leftmost(ino, &mut cursor, blkmap) {
            Descent::Bad => false,
            Descent::NoTree => true,
            Descent::Leaf(_) => self.walk_leaf_level(ino, &mut cursor, blkmap)?,
        };
        cursor.release_all();

        log::debug!(
            "[DIR] hash tree of dir {}: ok={} corrections={}",
            ino,
            ok,
            cursor.corrections
        );
        Ok(TreeCheck {
            ok,
            corrections: cursor.corrections,
            greatest_bno: cursor.greatest_bno,
            repair: cursor.repair,
        })
    }

    fn read_da_block(&mut self, ino: u64, blkmap: &BlockMap, bno: u32, ops: BufOps) -> Option<Buf> {
        let Some(extents) = blkmap.get_n(bno as u64, self.geo.fsbcount) else {
            log::warn!("[DIR] can't get map info for block {} of directory inode {}", bno, ino);
            return None;
        };
        let maps = extents_to_buf_maps(&self.sb, &extents);
        match self.bdev.read_buf_map(&maps, Some(&ops)) {
            Ok(buf) => Some(buf),
            Err(e) => {
                log::warn!("[DIR] can't read block {} for directory inode {}: {}", bno, ino, e);
                None
            }
        }
    }

    /// 沿最左路径下降，建立游标
    fn descend_leftmost(&mut self, ino: u64, cursor: &mut DaCursor, blkmap: &BlockMap) -> Descent {
        let mut bno = self.geo.leafblk as u32;
        let mut level: Option<usize> = None;
        cursor.active = 0;

        loop {
            let ops = self.verifiers.node;
            let Some(buf) = self.read_da_block(ino, blkmap, bno, ops) else {
                return Descent::Bad;
            };
            let hdr = NodeHdr::decode(buf.data());

            if hdr.magic == XFS_DIR2_LEAFN_MAGIC {
                if level.is_some() {
                    log::warn!("[DIR] found non-root LEAFN node in inode {} bno = {}", ino, bno);
                }
                return Descent::NoTree;
            }
            if hdr.magic != XFS_DA_NODE_MAGIC {
                log::warn!(
                    "[DIR] bad dir magic number {:#x} in inode {} bno = {}",
                    hdr.magic,
                    ino,
                    bno
                );
                return Descent::Bad;
            }
            if matches!(buf.status(), BufStatus::BadCrc | BufStatus::Corrupted) {
                log::warn!("[DIR] corrupt tree block {} for directory inode {}", bno, ino);
                return Descent::Bad;
            }
            if hdr.count as usize > self.geo.node_ents || hdr.count == 0 {
                log::warn!(
                    "[DIR] bad record count in inode {}, count = {}, max = {}",
                    ino,
                    hdr.count,
                    self.geo.node_ents
                );
                return Descent::Bad;
            }

            let this = match level {
                None => {
                    let depth = hdr.level as usize;
                    if depth < 1 || depth >= XFS_DA_NODE_MAXDEPTH {
                        log::warn!("[DIR] bad header depth for directory inode {}", ino);
                        return Descent::Bad;
                    }
                    cursor.active = depth;
                    depth
                }
                // 每向下一层，层号必须恰好减一
                Some(prev) if hdr.level as usize + 1 == prev => prev - 1,
                Some(_) => {
                    log::warn!("[DIR] bad directory btree for directory inode {}", ino);
                    return Descent::Bad;
                }
            };

            let first = NodeEntry::decode(buf.data(), 0);
            cursor.levels[this] = CursorLevel {
                buf: Some(buf),
                bno,
                hashval: first.hashval,
                index: 0,
                dirty: false,
            };
            bno = first.before;
            level = Some(this);
            if this <= 1 {
                break;
            }
        }

        cursor.levels[0].bno = bno;
        Descent::Leaf(bno)
    }

    /// 从左到右遍历所有叶子块
    fn walk_leaf_level(&mut self, ino: u64, cursor: &mut DaCursor, blkmap: &BlockMap) -> Result<bool> {
        let mut da_bno = cursor.levels[0].bno;
        let mut prev_bno = 0u32;
        let mut current_hashval = 0u32;
        let mut greatest_hashval = 0u32;

        loop {
            // 0 是根块号，叶子不可能位于 0
            if da_bno == 0 {
                log::warn!("[DIR] null leaf block pointer in directory inode {}", ino);
                return Ok(false);
            }
            let ops = self.verifiers.leafn;
            let Some(buf) = self.read_da_block(ino, blkmap, da_bno, ops) else {
                return Ok(false);
            };
            let hdr = LeafHdr::decode(buf.data());
            if hdr.magic != XFS_DIR2_LEAFN_MAGIC {
                log::warn!(
                    "[DIR] bad directory leaf magic # {:#x} for directory inode {} block {}",
                    hdr.magic,
                    ino,
                    da_bno
                );
                return Ok(false);
            }
            if !check_leaf_block(ino, buf.data(), da_bno, current_hashval, &mut greatest_hashval) {
                return Ok(false);
            }

            cursor.levels[0] = CursorLevel {
                buf: None,
                bno: da_bno,
                hashval: greatest_hashval,
                index: hdr.count as usize,
                dirty: false,
            };

            if hdr.back != prev_bno {
                log::warn!(
                    "[DIR] bad sibling back pointer for block {} in directory inode {}",
                    da_bno,
                    ino
                );
                return Ok(false);
            }
            prev_bno = da_bno;
            da_bno = hdr.forw;
            if da_bno != 0 && !self.verify_path(ino, cursor, blkmap, 0)? {
                return Ok(false);
            }
            current_hashval = greatest_hashval;

            if !self.config.no_modify && buf.status() == BufStatus::BadCrc {
                self.bdev.write_buf(&buf)?;
                cursor.repair = true;
            }
            if da_bno == 0 {
                break;
            }
        }

        if !self.verify_final_path(ino, cursor, blkmap, 0)? {
            log::warn!("[DIR] bad hash path in directory {}", ino);
            return Ok(false);
        }
        Ok(true)
    }

    /// 子块跨过边界时校验它在父节点中的项，必要时先换到父节点的后继块
    fn verify_path(
        &mut self,
        ino: u64,
        cursor: &mut DaCursor,
        blkmap: &BlockMap,
        p_level: usize,
    ) -> Result<bool> {
        let this = p_level + 1;
        if this > cursor.active {
            // 根已经用完
            return Ok(false);
        }

        let hdr = NodeHdr::decode(cursor.node(this)?);
        let mut entry = cursor.levels[this].index;
        if entry >= hdr.count as usize {
            if !self.advance_node(ino, cursor, blkmap, this, &hdr)? {
                return Ok(false);
            }
            entry = 0;
        }

        if !self.check_child_entry(ino, cursor, p_level, entry)? {
            return Ok(false);
        }
        cursor.levels[this].index += 1;
        Ok(true)
    }

    /// 校验最右路径
    fn verify_final_path(
        &mut self,
        ino: u64,
        cursor: &mut DaCursor,
        blkmap: &BlockMap,
        p_level: usize,
    ) -> Result<bool> {
        let this = p_level + 1;
        if this > cursor.active {
            return Ok(false);
        }

        let mut hdr = NodeHdr::decode(cursor.node(this)?);
        let mut entry = cursor.levels[this].index;

        // 最后一个子块挂在本层的后继节点下
        if entry >= hdr.count as usize && hdr.forw != 0 {
            if !self.advance_node(ino, cursor, blkmap, this, &hdr)? {
                return Ok(false);
            }
            hdr = NodeHdr::decode(cursor.node(this)?);
            entry = 0;
        }

        let mut bad = false;
        if entry + 1 != hdr.count as usize {
            log::warn!(
                "[DIR] directory block used/count inconsistency - {} / {}",
                entry,
                hdr.count
            );
            bad = true;
        } else if entry > 0 {
            let ent = NodeEntry::decode(cursor.node(this)?, entry);
            if cursor.levels[this].hashval >= ent.hashval {
                log::warn!(
                    "[DIR] directory block hashvalue inconsistency, expected > {} / saw {}",
                    cursor.levels[this].hashval,
                    ent.hashval
                );
                bad = true;
            }
        }
        if hdr.forw != 0 {
            log::warn!(
                "[DIR] bad directory forward block pointer, expected 0, saw {}",
                hdr.forw
            );
            bad = true;
        }
        if bad {
            log::warn!("[DIR] bad directory block in inode {}", ino);
            return Ok(false);
        }

        cursor.note_bno(this);
        if !self.check_child_entry(ino, cursor, p_level, entry)? {
            return Ok(false);
        }
        let ent = NodeEntry::decode(cursor.node(this)?, entry);
        self.put_level(cursor, this)?;

        if this >= cursor.active {
            return Ok(true);
        }
        cursor.levels[this].hashval = ent.hashval;
        self.verify_final_path(ino, cursor, blkmap, this)
    }

    /// 本层节点块已用完：向上校验它，然后换成同层后继块
    fn advance_node(
        &mut self,
        ino: u64,
        cursor: &mut DaCursor,
        blkmap: &BlockMap,
        this: usize,
        hdr: &NodeHdr,
    ) -> Result<bool> {
        if hdr.count == 0 {
            return Ok(false);
        }
        let last = NodeEntry::decode(cursor.node(this)?, hdr.count as usize - 1);
        cursor.levels[this].hashval = last.hashval;
        cursor.note_bno(this);

        if !self.verify_path(ino, cursor, blkmap, this)? {
            return Ok(false);
        }

        let dabno = hdr.forw;
        if dabno == 0 {
            log::warn!(
                "[DIR] node block {} of directory inode {} has no right sibling",
                cursor.levels[this].bno,
                ino
            );
            return Ok(false);
        }
        let ops = self.verifiers.node;
        let Some(newbuf) = self.read_da_block(ino, blkmap, dabno, ops) else {
            return Ok(false);
        };

        let next = NodeHdr::decode(newbuf.data());
        let mut bad = false;
        if next.magic != XFS_DA_NODE_MAGIC {
            log::warn!(
                "[DIR] bad magic number {:#x} in block {} for directory inode {}",
                next.magic,
                dabno,
                ino
            );
            bad = true;
        }
        if next.back != cursor.levels[this].bno {
            log::warn!("[DIR] bad back pointer in block {} for directory inode {}", dabno, ino);
            bad = true;
        }
        if next.count as usize > self.geo.node_ents || next.count == 0 {
            log::warn!(
                "[DIR] entry count {} out of range in block {} for directory inode {}",
                next.count,
                dabno,
                ino
            );
            bad = true;
        }
        if next.level as usize != this {
            log::warn!(
                "[DIR] bad level {} in block {} for directory inode {}",
                next.level,
                dabno,
                ino
            );
            bad = true;
        }
        if bad {
            return Ok(false);
        }

        self.put_level(cursor, this)?;
        let first = NodeEntry::decode(newbuf.data(), 0);
        cursor.levels[this] = CursorLevel {
            buf: Some(newbuf),
            bno: dabno,
            hashval: first.hashval,
            index: 0,
            dirty: false,
        };
        Ok(true)
    }

    /// 父节点第 `entry` 项必须指向子块；哈希值以子块为准
    fn check_child_entry(
        &mut self,
        ino: u64,
        cursor: &mut DaCursor,
        p_level: usize,
        entry: usize,
    ) -> Result<bool> {
        let this = p_level + 1;
        let ent = NodeEntry::decode(cursor.node(this)?, entry);
        let child = &cursor.levels[p_level];
        if child.bno != ent.before {
            log::debug!(
                "[DIR] dir {} level {} entry {} points to {}, expected {}",
                ino,
                this,
                entry,
                ent.before,
                child.bno
            );
            return Ok(false);
        }

        let want = child.hashval;
        if want != ent.hashval {
            cursor.corrections += 1;
            if self.config.no_modify {
                log::warn!(
                    "[DIR] would correct bad hashval in interior dir block in (level {}) in inode {}",
                    this,
                    ino
                );
            } else {
                log::warn!(
                    "[DIR] correcting bad hashval in interior dir block in (level {}) in inode {}",
                    this,
                    ino
                );
                NodeEntry::put_hashval(cursor.node_mut(this)?, entry, want);
                cursor.levels[this].dirty = true;
            }
        }
        Ok(true)
    }

    /// 释放一层持有的块，有修改（或校验和不符）时写回
    fn put_level(&mut self, cursor: &mut DaCursor, level: usize) -> Result<()> {
        let dirty = core::mem::take(&mut cursor.levels[level].dirty);
        let Some(buf) = cursor.levels[level].buf.take() else {
            return Ok(());
        };
        if !self.config.no_modify && (dirty || buf.status() == BufStatus::BadCrc) {
            self.bdev.write_buf(&buf)?;
            cursor.repair = true;
        }
        Ok(())
    }
}

/// 检查叶子块内容：哈希非递减（陈旧项除外）、陈旧项计数、项数不越界
fn check_leaf_block(ino: u64, data: &[u8], da_bno: u32, last_hashval: u32, next_hashval: &mut u32) -> bool {
    let hdr = LeafHdr::decode(data);
    let mut last = last_hashval;
    let mut stale = 0usize;

    for i in 0..hdr.count as usize {
        let pos = leaf_entry_pos(i);
        if pos + LEAF_ENTRY_SIZE > data.len() {
            log::warn!("[DIR] bad entry count in block {} of directory inode {}", da_bno, ino);
            return false;
        }
        let ent = LeafEntry::decode(data, pos);
        if ent.address == XFS_DIR2_NULL_DATAPTR {
            stale += 1;
        } else if ent.hashval < last {
            log::warn!("[DIR] bad hash ordering in block {} of directory inode {}", da_bno, ino);
            return false;
        }
        last = ent.hashval;
        *next_hashval = last;
    }

    if stale != hdr.stale as usize {
        log::warn!("[DIR] bad stale count in block {} of directory inode {}", da_bno, ino);
        return false;
    }
    true
}

/// 测试用：按 (哈希, 数据地址) 生成叶子块
#[cfg(test)]
pub(crate) fn leaf_block(blksize: usize, forw: u32, back: u32, ents: &[(u32, u32)]) -> alloc::vec::Vec<u8> {
    let mut blk = alloc::vec![0u8; blksize];
    let stale = ents.iter().filter(|(_, a)| *a == XFS_DIR2_NULL_DATAPTR).count();
    LeafHdr {
        forw,
        back,
        magic: XFS_DIR2_LEAFN_MAGIC,
        count: ents.len() as u16,
        stale: stale as u16,
    }
    .encode(&mut blk);
    for (i, (hashval, address)) in ents.iter().enumerate() {
        LeafEntry { hashval: *hashval, address: *address }.encode(&mut blk, leaf_entry_pos(i));
    }
    blk
}

/// 测试用：生成节点块
#[cfg(test)]
pub(crate) fn node_block(blksize: usize, forw: u32, back: u32, level: u16, ents: &[(u32, u32)]) -> alloc::vec::Vec<u8> {
    let mut blk = alloc::vec![0u8; blksize];
    NodeHdr {
        forw,
        back,
        magic: XFS_DA_NODE_MAGIC,
        count: ents.len() as u16,
        level,
    }
    .encode(&mut blk);
    for (i, (hashval, before)) in ents.iter().enumerate() {
        NodeEntry { hashval: *hashval, before: *before }.encode(&mut blk, i);
    }
    blk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blkmap::BmapExtent;
    use crate::block::BlockDev;
    use crate::dir::context::{InodeTree, RepairConfig};
    use crate::superblock::{test_superblock, Superblock};
    use crate::test_util::MemDevice;
    use alloc::vec;
    use alloc::vec::Vec;

    const DIR_INO: u64 = 133;
    const BLKSIZE: usize = 4096;
    /// 目录逻辑块 leafblk 映射到的物理块
    const PHYS: u64 = 20;
    const L: u32 = 1 << 23;

    struct Tree {
        sb: Superblock,
        dev: MemDevice,
        nblocks: u64,
    }

    impl Tree {
        fn new() -> Self {
            Self { sb: test_superblock(), dev: MemDevice::new(512), nblocks: 0 }
        }

        /// 写入逻辑块 L + idx
        fn put(&mut self, idx: u32, blk: Vec<u8>) {
            let daddr = self.sb.fsb_to_daddr(PHYS + idx as u64);
            self.dev.bytes_mut(daddr, BLKSIZE).copy_from_slice(&blk);
            self.nblocks = self.nblocks.max(idx as u64 + 1);
        }

        fn open(self, config: RepairConfig) -> (DirRepairer<MemDevice, InodeTree>, BlockMap) {
            let map = BlockMap::new(vec![BmapExtent {
                startoff: L as u64,
                startblock: PHYS,
                blockcount: self.nblocks,
            }])
            .unwrap();
            let bdev = BlockDev::new(self.dev).unwrap();
            (DirRepairer::new(bdev, self.sb, InodeTree::new(), config), map)
        }
    }

    /// 根（level 1）下挂两个叶子块
    fn one_level(root_hashes: [u32; 2], root_forw: u32) -> Tree {
        let mut t = Tree::new();
        t.put(0, node_block(BLKSIZE, root_forw, 0, 1, &[(root_hashes[0], L + 1), (root_hashes[1], L + 2)]));
        t.put(1, leaf_block(BLKSIZE, L + 2, 0, &[(10, 2), (20, 3), (30, 4)]));
        t.put(2, leaf_block(BLKSIZE, 0, L + 1, &[(40, 5), (50, 6)]));
        t
    }

    fn root_entry(r: &DirRepairer<MemDevice, InodeTree>, i: usize) -> NodeEntry {
        let sb = test_superblock();
        let bb = r.bdev.device().bb(sb.fsb_to_daddr(PHYS));
        NodeEntry::decode(bb, i)
    }

    #[test]
    fn test_single_level_tree_ok() {
        let (mut r, map) = one_level([30, 50], 0).open(RepairConfig::default());
        let check = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(check.ok);
        assert_eq!(check.corrections, 0);
        assert_eq!(check.greatest_bno, L);
        assert!(!check.repair);
    }

    #[test]
    fn test_hash_correction_is_idempotent() {
        let (mut r, map) = one_level([25, 50], 0).open(RepairConfig::default());

        let first = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(first.ok);
        assert_eq!(first.corrections, 1);
        assert!(first.repair);
        assert_eq!(root_entry(&r, 0).hashval, 30);

        let second = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(second.ok);
        assert_eq!(second.corrections, 0);
    }

    #[test]
    fn test_no_modify_counts_without_writing() {
        let config = RepairConfig { no_modify: true, ino_discovery: true };
        let (mut r, map) = one_level([30, 55], 0).open(config);

        let first = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(first.ok);
        assert_eq!(first.corrections, 1);
        assert_eq!(root_entry(&r, 1).hashval, 55);
        assert_eq!(r.bdev.write_count(), 0);

        let second = r.check_node_tree(DIR_INO, &map).unwrap();
        assert_eq!(second.corrections, 1);
    }

    #[test]
    fn test_final_forward_pointer_fails() {
        let (mut r, map) = one_level([30, 50], L + 7).open(RepairConfig::default());
        let check = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(!check.ok);
    }

    #[test]
    fn test_two_level_tree() {
        let mut t = Tree::new();
        t.put(0, node_block(BLKSIZE, 0, 0, 2, &[(50, L + 1), (70, L + 2)]));
        t.put(1, node_block(BLKSIZE, L + 2, 0, 1, &[(30, L + 3), (50, L + 4)]));
        t.put(2, node_block(BLKSIZE, 0, L + 1, 1, &[(70, L + 5)]));
        t.put(3, leaf_block(BLKSIZE, L + 4, 0, &[(10, 2), (30, 3)]));
        t.put(4, leaf_block(BLKSIZE, L + 5, L + 3, &[(40, 4), (50, 5)]));
        t.put(5, leaf_block(BLKSIZE, 0, L + 4, &[(60, 6), (70, 7)]));
        let (mut r, map) = t.open(RepairConfig::default());

        let check = r.check_node_tree(DIR_INO, &map).unwrap();
        assert!(check.ok);
        assert_eq!(check.corrections, 0);
        assert_eq!(check.greatest_bno, L + 2);
    }

    #[test]
    fn test_leaf_hash_order_violation() {
        let mut t = one_level([30, 50], 0);
        t.put(2, leaf_block(BLKSIZE, 0, L + 1, &[(25, 5), (50, 6)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(!r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_stale_entries_exempt_from_order() {
        let mut t = one_level([30, 50], 0);
        t.put(2, leaf_block(BLKSIZE, 0, L + 1, &[(5, XFS_DIR2_NULL_DATAPTR), (50, 6)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_bad_stale_count() {
        let mut t = one_level([30, 50], 0);
        let mut leaf = leaf_block(BLKSIZE, 0, L + 1, &[(40, 5), (50, 6)]);
        let mut hdr = LeafHdr::decode(&leaf);
        hdr.stale = 1;
        hdr.encode(&mut leaf);
        t.put(2, leaf);
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(!r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_bad_back_pointer() {
        let mut t = one_level([30, 50], 0);
        t.put(2, leaf_block(BLKSIZE, 0, L + 9, &[(40, 5), (50, 6)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(!r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_root_is_leaf() {
        let mut t = Tree::new();
        t.put(0, leaf_block(BLKSIZE, 0, 0, &[(10, 2)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_bad_root_depth() {
        let mut t = Tree::new();
        t.put(0, node_block(BLKSIZE, 0, 0, XFS_DA_NODE_MAXDEPTH as u16, &[(10, L + 1)]));
        t.put(1, leaf_block(BLKSIZE, 0, 0, &[(10, 2)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(!r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }

    #[test]
    fn test_wrong_child_pointer() {
        let mut t = Tree::new();
        t.put(0, node_block(BLKSIZE, 0, 0, 1, &[(30, L + 1), (50, L + 3)]));
        t.put(1, leaf_block(BLKSIZE, L + 2, 0, &[(10, 2), (30, 3)]));
        t.put(2, leaf_block(BLKSIZE, 0, L + 1, &[(40, 4), (50, 5)]));
        t.put(3, leaf_block(BLKSIZE, 0, 0, &[(60, 6)]));
        let (mut r, map) = t.open(RepairConfig::default());
        assert!(!r.check_node_tree(DIR_INO, &map).unwrap().ok);
    }
}
