//! 目录数据块修复
//!
//! 数据块由定长头（魔数 + best-free 表）和一串 8 字节对齐的目录项/空闲区组成。
//! 先做结构检查（每个项的尾部 tag 必须指向自身），结构完整后再逐项检查
//! inode 号、名字和 "."/".."，最后核对 best-free 表。
//!
//! 坏项不会被移除，只把名字首字节改成 `/`，由后续阶段删除。

use alloc::string::String;

use crate::block::{BlockDevice, BufStatus};
use crate::blkmap::{extents_to_buf_maps, BlockMap};
use crate::consts::{
    dir2_data_entsize, DIR_ENTRY_CLEARED, XFS_DIR2_BLOCK_MAGIC, XFS_DIR2_DATA_ALIGN,
    XFS_DIR2_DATA_FD_COUNT, XFS_DIR2_DATA_MAGIC,
};
use crate::error::Result;

use super::context::{DirInode, DirOutcome, DirRepairer, InodeOracle};
use super::types::{
    data_entry_namelen, data_entry_put_inumber, data_tag, data_unused_length, is_data_unused,
    namecheck, BlockTail, DataEntry, DataFree, DataHdr, DATA_ENTRY_START,
};

/// 在 best-free 表中查找以 `off` 开始的空闲区
///
/// 表按长度排序且空槽在末尾，遇到空槽即可停止。
fn bestfree_find(bf: &[DataFree; XFS_DIR2_DATA_FD_COUNT], off: usize) -> Option<usize> {
    for (i, f) in bf.iter().enumerate() {
        if f.offset == 0 {
            return None;
        }
        if f.offset as usize == off {
            return Some(i);
        }
    }
    None
}

/// 把一个空闲区插入 best-free 表，保持长度非递增
///
/// 与已有项等长时排在后面。
fn bestfree_insert(bf: &mut [DataFree; XFS_DIR2_DATA_FD_COUNT], offset: usize, length: usize) {
    let new = DataFree {
        offset: offset as u16,
        length: length as u16,
    };
    if new.length > bf[0].length {
        bf[2] = bf[1];
        bf[1] = bf[0];
        bf[0] = new;
    } else if new.length > bf[1].length {
        bf[2] = bf[1];
        bf[1] = new;
    } else if new.length > bf[2].length {
        bf[2] = new;
    }
}

/// 重新扫描数据区，重建 best-free 表
///
/// 对应 `xfs_dir2_data_freescan`。调用前结构必须已经检查通过。
pub fn bestfree_rebuild(block: &mut [u8], end: usize) {
    let mut bf = [DataFree::default(); XFS_DIR2_DATA_FD_COUNT];
    let mut ptr = DATA_ENTRY_START;
    while ptr < end {
        if is_data_unused(block, ptr) {
            let len = data_unused_length(block, ptr);
            bestfree_insert(&mut bf, ptr, len);
            ptr += len;
        } else {
            ptr += dir2_data_entsize(data_entry_namelen(block, ptr));
        }
    }
    let mut hdr = DataHdr::decode(block);
    hdr.bestfree = bf;
    hdr.encode_bestfree(block);
}

/// 数据区结构检查：返回最后到达的位置和 best-free 表是否有误
fn scan_structure(block: &[u8], end: usize) -> (usize, bool, u8) {
    let hdr = DataHdr::decode(block);
    let bf = hdr.bestfree;

    let mut badbest = false;
    let mut freeseen = 0u8;
    for (i, f) in bf.iter().enumerate() {
        if f.length == 0 {
            badbest |= f.offset != 0;
            freeseen |= 1 << i;
        }
    }
    badbest |= bf[0].length < bf[1].length;
    badbest |= bf[1].length < bf[2].length;

    let mut lastfree = false;
    let mut ptr = DATA_ENTRY_START;
    while ptr < end {
        if ptr + 4 > end {
            break;
        }
        if is_data_unused(block, ptr) {
            let len = data_unused_length(block, ptr);
            if ptr + len > end || len == 0 || len % XFS_DIR2_DATA_ALIGN != 0 {
                break;
            }
            if data_tag(block, ptr, len) != ptr {
                break;
            }
            // 相邻的空闲区应已合并
            badbest |= lastfree;
            match bestfree_find(&bf, ptr) {
                Some(i) => {
                    badbest |= freeseen & (1 << i) != 0;
                    badbest |= bf[i].length as usize != len;
                    freeseen |= 1 << i;
                }
                None => badbest |= len > bf[2].length as usize,
            }
            ptr += len;
            lastfree = true;
            continue;
        }

        if ptr + DataEntry::NAME_OFF > end {
            break;
        }
        let size = dir2_data_entsize(data_entry_namelen(block, ptr));
        if ptr + size > end || data_tag(block, ptr, size) != ptr {
            break;
        }
        ptr += size;
        lastfree = false;
    }
    (ptr, badbest, freeseen)
}

impl<D: BlockDevice, O: InodeOracle> DirRepairer<D, O> {
    /// 检查一个数据块（或单块目录的数据区 `[.., end)`）
    ///
    /// 结构损坏时返回 `true`，调用方应丢弃该块（或整个单块目录）。
    /// 任何改动都会把 `dirty` 置位，由调用方负责写回。
    pub(super) fn process_data_block(
        &mut self,
        ino: u64,
        block: &mut [u8],
        da_bno: u64,
        end: usize,
        out: &mut DirOutcome,
        dirty: &mut bool,
    ) -> bool {
        let no_modify = self.config.no_modify;
        let ino_discovery = self.config.ino_discovery;

        let (ptr, badbest, freeseen) = scan_structure(block, end);
        if ptr != end {
            log::warn!(
                "[DIR] corrupt block {} in directory inode {}, {}",
                da_bno,
                ino,
                if no_modify { "would junk block" } else { "will junk block" }
            );
            return true;
        }

        let mut ptr = DATA_ENTRY_START;
        while ptr < end {
            if is_data_unused(block, ptr) {
                ptr += data_unused_length(block, ptr);
                continue;
            }

            let entry = DataEntry::decode(block, ptr);
            let ent_ino = entry.inumber;
            let name0 = ptr + DataEntry::NAME_OFF;

            // 已经清除过的项在发现阶段之后不再检查
            let mut clearino = if !ino_discovery && block[name0] == DIR_ENTRY_CLEARED {
                false
            } else if let Some(reason) = self.classify_entry_inum(ent_ino) {
                log::warn!(
                    "[DIR] entry \"{}\" at block {} offset {} in directory inode {} references {} inode {}",
                    String::from_utf8_lossy(&entry.name),
                    da_bno,
                    ptr,
                    ino,
                    reason,
                    ent_ino
                );
                true
            } else {
                false
            };

            // "." 和 ".." 在下面单独修正
            if entry.is_dot() || entry.is_dotdot() {
                clearino = false;
            }

            let mut namelen = entry.name.len();
            if namelen == 0 {
                log::warn!(
                    "[DIR] entry at block {} offset {} in directory inode {} has 0 namelength",
                    da_bno,
                    ptr,
                    ino
                );
                if !no_modify {
                    block[ptr + DataEntry::NAMELEN_OFF] = 1;
                    namelen = 1;
                }
                clearino = true;
            }

            if clearino {
                if !no_modify {
                    log::warn!("[DIR] clearing inode number in entry at offset {}", ptr);
                    block[name0] = DIR_ENTRY_CLEARED;
                    *dirty = true;
                } else {
                    log::warn!("[DIR] would clear inode number in entry at offset {}", ptr);
                }
            }

            let mut junkit = block[name0] == DIR_ENTRY_CLEARED;
            if ino_discovery && namecheck(&block[name0..name0 + namelen]) {
                log::warn!(
                    "[DIR] entry at block {} offset {} in directory inode {} has illegal name \"{}\"",
                    da_bno,
                    ptr,
                    ino,
                    String::from_utf8_lossy(&block[name0..name0 + namelen])
                );
                junkit = true;
            }

            // 已清除的项原样写回，留给后续阶段删除
            if !no_modify && block[name0] == DIR_ENTRY_CLEARED {
                *dirty = true;
                junkit = false;
            }

            let name = block[name0..name0 + namelen].to_vec();
            if name == b".." {
                if !out.dotdot {
                    out.dotdot = true;
                    out.parent = Some(ent_ino);
                    if ino == ent_ino && ino != self.sb.rootino {
                        // 只有根目录的 ".." 可以指向自身
                        out.parent = None;
                        log::warn!("[DIR] bad .. entry in directory inode {}, points to self", ino);
                        junkit = true;
                    } else if ino != ent_ino && ino == self.sb.rootino {
                        log::warn!(
                            "[DIR] bad .. entry in root directory inode {}, was {}, {}",
                            ino,
                            ent_ino,
                            if no_modify { "would correct" } else { "correcting" }
                        );
                        if !no_modify {
                            data_entry_put_inumber(block, ptr, ino);
                            *dirty = true;
                        }
                        out.parent = Some(ino);
                    }
                } else {
                    // 无法判断哪个才是对的，保留第一个
                    log::warn!("[DIR] multiple .. entries in directory inode {}", ino);
                    junkit = true;
                }
            } else if name == b"." {
                if !out.dot {
                    out.dot = true;
                    if ent_ino != ino {
                        log::warn!(
                            "[DIR] bad . entry in directory inode {}, was {}, {}",
                            ino,
                            ent_ino,
                            if no_modify { "would correct" } else { "correcting" }
                        );
                        if !no_modify {
                            data_entry_put_inumber(block, ptr, ino);
                            *dirty = true;
                        }
                    }
                } else {
                    log::warn!("[DIR] multiple . entries in directory inode {}", ino);
                    junkit = true;
                }
            } else if ent_ino == ino {
                log::warn!(
                    "[DIR] entry \"{}\" in directory inode {} points to self",
                    String::from_utf8_lossy(&name),
                    ino
                );
                junkit = true;
            }

            if junkit {
                if !no_modify {
                    block[name0] = DIR_ENTRY_CLEARED;
                    *dirty = true;
                    log::warn!("[DIR] clearing entry at offset {} in directory inode {}", ptr, ino);
                } else {
                    log::warn!("[DIR] would clear entry at offset {} in directory inode {}", ptr, ino);
                }
            }

            ptr += dir2_data_entsize(namelen);
        }

        if freeseen != 0b111 || badbest {
            log::warn!(
                "[DIR] bad bestfree table in block {} in directory inode {}, {}",
                da_bno,
                ino,
                if no_modify { "would repair table" } else { "repairing table" }
            );
            if !no_modify {
                bestfree_rebuild(block, end);
                *dirty = true;
            }
        }
        false
    }

    /// 检查单块目录
    ///
    /// 整个目录只有一个目录块：数据区之后是叶子表和尾部。
    pub(super) fn process_block_dir(&mut self, inode: &DirInode, out: &mut DirOutcome) -> Result<()> {
        let ino = inode.ino;
        let Some(blkmap) = inode.blkmap.as_ref() else {
            log::warn!("[DIR] block directory inode {} has no block map", ino);
            out.junk = true;
            return Ok(());
        };
        let Some(extents) = blkmap.get_n(self.geo.datablk, self.geo.fsbcount) else {
            log::warn!("[DIR] block {} for directory inode {} is missing", self.geo.datablk, ino);
            out.junk = true;
            return Ok(());
        };

        let maps = extents_to_buf_maps(&self.sb, &extents);
        let ops = self.verifiers.block;
        let mut buf = match self.bdev.read_buf_map(&maps, Some(&ops)) {
            Ok(buf) => buf,
            Err(e) => {
                log::warn!(
                    "[DIR] can't read block {} for directory inode {}: {}",
                    self.geo.datablk,
                    ino,
                    e
                );
                out.junk = true;
                return Ok(());
            }
        };

        let hdr = DataHdr::decode(buf.data());
        if hdr.magic != XFS_DIR2_BLOCK_MAGIC {
            log::warn!(
                "[DIR] bad directory block magic # {:#x} in block {} for directory inode {}",
                hdr.magic,
                self.geo.datablk,
                ino
            );
        }

        let tail = BlockTail::decode(buf.data());
        let end = match tail.leaf_start(buf.len()) {
            Some(end) if end >= DATA_ENTRY_START => end,
            _ => {
                log::warn!(
                    "[DIR] bad leaf count {} in block directory inode {}",
                    tail.count,
                    ino
                );
                out.junk = true;
                return Ok(());
            }
        };

        let mut dirty = false;
        let junk = self.process_data_block(ino, buf.data_mut(), self.geo.datablk, end, out, &mut dirty);
        if !junk && buf.status() == BufStatus::BadCrc {
            dirty = true;
        }
        if dirty && !self.config.no_modify {
            out.repair = true;
            self.bdev.write_buf(&buf)?;
        }
        out.junk = junk;
        Ok(())
    }

    /// 检查叶子/节点格式目录：先检查所有数据块，节点格式再校验哈希树
    pub(super) fn process_leaf_node_dir(
        &mut self,
        inode: &DirInode,
        is_node: bool,
        out: &mut DirOutcome,
    ) -> Result<()> {
        let ino = inode.ino;
        let Some(blkmap) = inode.blkmap.as_ref() else {
            log::warn!("[DIR] directory inode {} has no block map", ino);
            out.junk = true;
            return Ok(());
        };

        let good = self.process_data_blocks(ino, blkmap, out)?;
        if good == 0 {
            out.junk = true;
            return Ok(());
        }
        if !is_node || self.is_bad_dir(ino) {
            return Ok(());
        }

        let check = self.check_node_tree(ino, blkmap)?;
        out.repair |= check.repair;
        if !check.ok {
            self.add_bad_dir(ino);
        }
        Ok(())
    }

    /// 依次检查叶子区之前的所有数据块，返回结构完好的块数
    fn process_data_blocks(&mut self, ino: u64, blkmap: &BlockMap, out: &mut DirOutcome) -> Result<usize> {
        let fsbcount = self.geo.fsbcount;
        let mut good = 0usize;
        let mut next: Option<u64> = None;

        loop {
            let dbno = match blkmap.next_off(next) {
                Some(dbno) if dbno < self.geo.leafblk => dbno,
                _ => break,
            };

            // 跳到这个目录块覆盖范围内最后一个已映射的块
            let mut last = dbno;
            let mut exhausted = false;
            while last < dbno + fsbcount - 1 {
                match blkmap.next_off(Some(last)) {
                    Some(n) => last = n,
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            next = Some(last);

            match blkmap.get_n(dbno, fsbcount) {
                Some(extents) => {
                    let maps = extents_to_buf_maps(&self.sb, &extents);
                    let ops = self.verifiers.data;
                    match self.bdev.read_buf_map(&maps, Some(&ops)) {
                        Ok(mut buf) => {
                            let magic = DataHdr::decode(buf.data()).magic;
                            if magic != XFS_DIR2_DATA_MAGIC {
                                log::warn!(
                                    "[DIR] bad directory block magic # {:#x} in block {} for directory inode {}",
                                    magic,
                                    dbno,
                                    ino
                                );
                            }
                            let mut dirty = false;
                            let end = buf.len();
                            let junk = self.process_data_block(ino, buf.data_mut(), dbno, end, out, &mut dirty);
                            if !junk {
                                good += 1;
                                if buf.status() == BufStatus::BadCrc {
                                    dirty = true;
                                }
                            }
                            if dirty && !self.config.no_modify {
                                out.repair = true;
                                self.bdev.write_buf(&buf)?;
                            }
                        }
                        Err(e) => {
                            log::warn!(
                                "[DIR] can't read block {} for directory inode {}: {}",
                                dbno,
                                ino,
                                e
                            );
                        }
                    }
                }
                None => {
                    log::warn!("[DIR] block {} for directory inode {} is missing", dbno, ino);
                }
            }

            if exhausted {
                break;
            }
        }
        Ok(good)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDev;
    use crate::dir::context::{InodeRecord, InodeTree, RepairConfig};
    use crate::superblock::test_superblock;
    use crate::test_util::MemDevice;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::super::types::put_data_unused;

    const DIR_INO: u64 = 133;
    const BLKSIZE: usize = 4096;

    fn repairer(config: RepairConfig) -> DirRepairer<MemDevice, InodeTree> {
        let mut tree = InodeTree::new();
        tree.insert(0, InodeRecord { startnum: 128, free: 0, confirmed: !0 });
        let bdev = BlockDev::new(MemDevice::new(16)).unwrap();
        DirRepairer::new(bdev, test_superblock(), tree, config)
    }

    #[derive(Clone, Copy)]
    enum Item<'a> {
        Entry(u64, &'a [u8]),
        Free(usize),
    }

    /// 按顺序排布项，最后一个空闲区填满到块末尾；best-free 表按实际内容生成
    fn data_block(items: &[Item]) -> Vec<u8> {
        let mut blk = vec![0u8; BLKSIZE];
        DataHdr { magic: XFS_DIR2_DATA_MAGIC, bestfree: Default::default() }.encode(&mut blk);
        let mut pos = DATA_ENTRY_START;
        for item in items {
            match item {
                Item::Entry(ino, name) => pos += DataEntry::new(*ino, name).encode(&mut blk, pos),
                Item::Free(len) => {
                    put_data_unused(&mut blk, pos, *len);
                    pos += len;
                }
            }
        }
        if pos < BLKSIZE {
            put_data_unused(&mut blk, pos, BLKSIZE - pos);
        }
        bestfree_rebuild(&mut blk, BLKSIZE);
        blk
    }

    fn bestfree(blk: &[u8]) -> [DataFree; 3] {
        DataHdr::decode(blk).bestfree
    }

    fn name0(blk: &[u8], pos: usize) -> u8 {
        blk[pos + DataEntry::NAME_OFF]
    }

    fn dot_block(dot: u64, dotdot: u64, rest: &[Item]) -> Vec<u8> {
        let mut items = vec![Item::Entry(dot, b"."), Item::Entry(dotdot, b"..")];
        items.extend_from_slice(rest);
        data_block(&items)
    }

    #[test]
    fn test_clean_block_untouched() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(DIR_INO, 128, &[Item::Entry(140, b"file")]);
        let before = blk.clone();
        let mut out = DirOutcome::default();
        let mut dirty = false;

        assert!(!r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty));
        assert!(!dirty);
        assert_eq!(blk, before);
        assert!(out.dot && out.dotdot);
        assert_eq!(out.parent, Some(128));
    }

    #[test]
    fn test_bestfree_rebuilt_sorted() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(
            DIR_INO,
            128,
            &[
                Item::Entry(140, b"file"),
                Item::Free(64),
                Item::Entry(141, b"g"),
                Item::Free(32),
                Item::Entry(142, b"h"),
            ],
        );
        let expected = bestfree(&blk);
        assert_eq!(expected[0], DataFree { offset: 192, length: 3904 });

        // 打乱顺序
        let mut hdr = DataHdr::decode(&blk);
        hdr.bestfree = [expected[2], expected[1], expected[0]];
        hdr.encode(&mut blk);

        let mut out = DirOutcome::default();
        let mut dirty = false;
        assert!(!r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty));
        assert!(dirty);

        let bf = bestfree(&blk);
        assert_eq!(bf, expected);
        assert!(bf[0].length >= bf[1].length && bf[1].length >= bf[2].length);
        let total: usize = bf.iter().map(|f| f.length as usize).sum();
        assert_eq!(total, 3904 + 64 + 32);
    }

    #[test]
    fn test_bestfree_missing_region() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(
            DIR_INO,
            128,
            &[Item::Free(64), Item::Entry(141, b"g"), Item::Free(32), Item::Entry(142, b"h")],
        );
        let expected = bestfree(&blk);
        let mut hdr = DataHdr::decode(&blk);
        hdr.bestfree[2] = DataFree::default();
        hdr.encode(&mut blk);

        let mut out = DirOutcome::default();
        let mut dirty = false;
        r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty);
        assert_eq!(bestfree(&blk), expected);
    }

    #[test]
    fn test_bad_inode_cleared_in_place() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(DIR_INO, 128, &[Item::Entry(129, b"rtbitmap"), Item::Entry(140, b"ok")]);
        let mut out = DirOutcome::default();
        let mut dirty = false;

        assert!(!r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty));
        assert!(dirty);
        // "." 16，".." 16，"rtbitmap" 24
        assert_eq!(name0(&blk, 48), DIR_ENTRY_CLEARED);
        assert_eq!(name0(&blk, 72), b'o');
    }

    #[test]
    fn test_dotdot_self_in_subdir() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(DIR_INO, DIR_INO, &[]);
        let mut out = DirOutcome::default();
        let mut dirty = false;

        r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty);
        assert!(out.dotdot);
        assert_eq!(out.parent, None);
        assert_eq!(name0(&blk, 32), DIR_ENTRY_CLEARED);
        assert_eq!(name0(&blk, 16), b'.');
    }

    #[test]
    fn test_root_dotdot_rewritten() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(128, 140, &[]);
        let mut out = DirOutcome::default();
        let mut dirty = false;

        r.process_data_block(128, &mut blk, 0, BLKSIZE, &mut out, &mut dirty);
        assert!(dirty);
        assert_eq!(out.parent, Some(128));
        assert_eq!(DataEntry::decode(&blk, 32).inumber, 128);
    }

    #[test]
    fn test_first_dotdot_wins() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(DIR_INO, 140, &[Item::Entry(141, b"..")]);
        let mut out = DirOutcome::default();
        let mut dirty = false;

        r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty);
        assert_eq!(out.parent, Some(140));
        assert_eq!(name0(&blk, 32), b'.');
        assert_eq!(name0(&blk, 48), DIR_ENTRY_CLEARED);
    }

    #[test]
    fn test_wrong_dot_corrected() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(141, 128, &[]);
        let mut out = DirOutcome::default();
        let mut dirty = false;

        r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty);
        assert!(out.dot && dirty);
        assert_eq!(DataEntry::decode(&blk, 16).inumber, DIR_INO);
    }

    #[test]
    fn test_no_modify_leaves_block() {
        let mut r = repairer(RepairConfig { no_modify: true, ino_discovery: true });
        let mut blk = dot_block(141, DIR_INO, &[Item::Entry(0, b"bad")]);
        let mut hdr = DataHdr::decode(&blk);
        hdr.bestfree.swap(0, 1);
        hdr.encode(&mut blk);
        let before = blk.clone();
        let mut out = DirOutcome::default();
        let mut dirty = false;

        assert!(!r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty));
        assert!(!dirty);
        assert_eq!(blk, before);
    }

    #[test]
    fn test_bad_tag_junks_block() {
        let mut r = repairer(RepairConfig::default());
        let mut blk = dot_block(DIR_INO, 128, &[Item::Entry(140, b"file")]);
        // "file" 项的尾部 tag 不再指向自身
        blk[48 + 14] = 0xAA;
        let mut out = DirOutcome::default();
        let mut dirty = false;

        assert!(r.process_data_block(DIR_INO, &mut blk, 0, BLKSIZE, &mut out, &mut dirty));
        assert!(!dirty);
    }

    #[test]
    fn test_bestfree_insert_order() {
        let mut bf = [DataFree::default(); 3];
        bestfree_insert(&mut bf, 16, 32);
        bestfree_insert(&mut bf, 64, 64);
        bestfree_insert(&mut bf, 200, 32);
        bestfree_insert(&mut bf, 300, 8);
        assert_eq!(bf[0], DataFree { offset: 64, length: 64 });
        assert_eq!(bf[1], DataFree { offset: 16, length: 32 });
        assert_eq!(bf[2], DataFree { offset: 200, length: 32 });
        assert_eq!(bestfree_find(&bf, 200), Some(2));
        assert_eq!(bestfree_find(&bf, 300), None);
    }
}
