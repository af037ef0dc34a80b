//! 短格式目录修复
//!
//! 目录项直接存放在 inode 数据分支中，没有 "." 项，".." 只是头部的父目录
//! inode 号。检查每个目录项，就地删除坏项，然后同步项数、宽 inode 号计数、
//! 目录大小和偏移。
//!
//! 对应 xfs_repair 的 `process_sf_dir2`。

use alloc::string::String;
use alloc::vec;

use crate::block::BlockDevice;
use crate::consts::{
    dir2_data_entsize, XFS_DIR2_DATA_FIRST_OFFSET, XFS_DIR2_MAX_SHORT_INUM,
};

use super::context::{DirInode, DirOutcome, DirRepairer, InodeOracle};
use super::types::{
    namecheck, sf_entry_offset, sf_entry_put_offset, sf_entsize, sf_get_inumber, sf_hdr_size,
    sf_put_inumber, SfEntry, SfHdr, BLOCK_TAIL_SIZE, LEAF_ENTRY_SIZE,
};

impl<D: BlockDevice, O: InodeOracle> DirRepairer<D, O> {
    /// 检查并修复短格式目录
    ///
    /// 短格式目录不会被整体丢弃：坏项被删除，计数和大小按实际内容重算。
    pub(super) fn process_sf_dir(&mut self, inode: &mut DirInode, out: &mut DirOutcome) {
        let ino = inode.ino;
        let no_modify = self.config.no_modify;
        let max_size = inode.fork.len();

        let Some(hdr) = SfHdr::decode(&inode.fork) else {
            log::warn!("[DIR] shortform dir {} too small for its header", ino);
            out.junk = true;
            return;
        };
        let i8count = hdr.i8count;

        // 父目录号需要 8 字节时也计入
        let mut i8 = (hdr.parent > XFS_DIR2_MAX_SHORT_INUM) as usize;

        let mut num_entries = hdr.count as usize;
        if num_entries * sf_entsize(i8count, 1) + sf_hdr_size(0) > max_size || num_entries == 0 {
            num_entries = 0xFF;
        }

        let mut ino_dir_size = (inode.size as usize).min(max_size);
        let mut offset = XFS_DIR2_DATA_FIRST_OFFSET;
        let mut bad_offset = false;
        let mut pos = sf_hdr_size(i8count);
        let mut kept = 0usize;

        while kept < num_entries && ino_dir_size > pos {
            let namelen = inode.fork[pos] as usize;
            let entsize = sf_entsize(i8count, namelen);

            // 长度为 0 或越过目录末尾：丢弃这一项及其后所有项
            let bad_namelen = if namelen == 0 {
                Some("is zero length")
            } else if pos + entsize > ino_dir_size {
                Some("extends past end of dir")
            } else {
                None
            };
            if let Some(reason) = bad_namelen {
                log::warn!(
                    "[DIR] entry #{} {} in shortform dir {}, {} {} entries",
                    kept,
                    reason,
                    ino,
                    if no_modify { "would junk" } else { "junking" },
                    num_entries - kept
                );
                break;
            }

            let name = inode.fork[pos + 3..pos + 3 + namelen].to_vec();
            let lino = sf_get_inumber(&inode.fork[pos + 3 + namelen..], i8count);

            // 短格式中没有 "." 和 ".."，指向自身的项一定是坏的
            let reason = if lino == ino {
                Some("current")
            } else {
                self.classify_entry_inum(lino)
            };
            let mut junkit = reason.is_some();
            if let Some(reason) = reason {
                log::warn!(
                    "[DIR] entry \"{}\" in shortform directory {} references {} inode {}",
                    String::from_utf8_lossy(&name),
                    ino,
                    reason,
                    lino
                );
            }

            if namecheck(&name) {
                log::warn!("[DIR] entry contains illegal character in shortform dir {}", ino);
                junkit = true;
            }

            let entoff = sf_entry_offset(&inode.fork[pos..]) as usize;
            if entoff < offset {
                log::warn!("[DIR] entry contains offset out of order in shortform dir {}", ino);
                bad_offset = true;
            }
            offset = entoff + dir2_data_entsize(namelen);

            if junkit {
                if !no_modify {
                    // 后面的内容整体前移，末尾补零
                    inode.size -= entsize as u64;
                    ino_dir_size -= entsize;
                    inode.fork.copy_within(pos + entsize..max_size, pos);
                    inode.fork[max_size - entsize..].fill(0);
                    inode.fork[0] -= 1;
                    num_entries -= 1;
                    out.dino_dirty = true;
                    out.repair = true;
                    log::warn!(
                        "[DIR] junking entry \"{}\" in directory inode {}",
                        String::from_utf8_lossy(&name),
                        ino
                    );
                    continue;
                }
                log::warn!(
                    "[DIR] would have junked entry \"{}\" in directory inode {}",
                    String::from_utf8_lossy(&name),
                    ino
                );
            } else if lino > XFS_DIR2_MAX_SHORT_INUM {
                i8 += 1;
            }

            pos += entsize;
            kept += 1;
        }

        // 同步项数、i8 计数和大小
        let count = inode.fork[0] as usize;
        if count != kept {
            if no_modify {
                log::warn!(
                    "[DIR] would have corrected entry count in directory {} from {} to {}",
                    ino,
                    count,
                    kept
                );
            } else {
                log::warn!(
                    "[DIR] corrected entry count in directory {}, was {}, now {}",
                    ino,
                    count,
                    kept
                );
                inode.fork[0] = kept as u8;
                out.dino_dirty = true;
                out.repair = true;
            }
        }

        if i8count as usize != i8 {
            if no_modify {
                log::warn!(
                    "[DIR] would have corrected i8 count in directory {} from {} to {}",
                    ino,
                    i8count,
                    i8
                );
            } else {
                log::warn!(
                    "[DIR] corrected i8 count in directory {}, was {}, now {}",
                    ino,
                    i8count,
                    i8
                );
                if i8 == 0 {
                    pos = sf_fix_i8(&mut inode.fork, pos);
                } else {
                    inode.fork[1] = i8.min(u8::MAX as usize) as u8;
                }
                out.dino_dirty = true;
                out.repair = true;
            }
        }

        if pos != ino_dir_size {
            if no_modify {
                log::warn!(
                    "[DIR] would have corrected directory {} size from {} to {}",
                    ino,
                    ino_dir_size,
                    pos
                );
            } else {
                log::warn!(
                    "[DIR] corrected directory {} size, was {}, now {}",
                    ino,
                    ino_dir_size,
                    pos
                );
                inode.size = pos as u64;
                out.dino_dirty = true;
                out.repair = true;
            }
        }

        // 转换成块格式后叶子表和尾部必须放得下
        let count = inode.fork[0] as usize;
        if offset + (count + 2) * LEAF_ENTRY_SIZE + BLOCK_TAIL_SIZE > self.geo.blksize {
            log::warn!("[DIR] directory {} offsets too high", ino);
            bad_offset = true;
        }
        if bad_offset {
            if no_modify {
                log::warn!("[DIR] would have corrected entry offsets in directory {}", ino);
            } else {
                log::warn!("[DIR] corrected entry offsets in directory {}", ino);
                sf_fix_offsets(&mut inode.fork);
                out.dino_dirty = true;
                out.repair = true;
            }
        }

        self.check_sf_parent(inode, out);
    }

    /// 检查头部的父目录号
    fn check_sf_parent(&mut self, inode: &mut DirInode, out: &mut DirOutcome) {
        let ino = inode.ino;
        let no_modify = self.config.no_modify;
        let i8count = inode.fork[1];
        let parent = sf_get_inumber(&inode.fork[2..], i8count);
        out.parent = Some(parent);

        let clear = if self.sb.is_bad_inum(parent) {
            log::warn!("[DIR] bogus .. inode number ({}) in directory inode {}", parent, ino);
            true
        } else if ino == self.sb.rootino && ino != parent {
            // 根目录的 ".." 必须指向自身
            if no_modify {
                log::warn!(
                    "[DIR] would have corrected root directory {} .. entry from {} to {}",
                    ino,
                    parent,
                    ino
                );
            } else {
                log::warn!(
                    "[DIR] corrected root directory {} .. entry, was {}, now {}",
                    ino,
                    parent,
                    ino
                );
                out.parent = Some(ino);
                sf_put_inumber(&mut inode.fork[2..], i8count, ino);
                out.dino_dirty = true;
                out.repair = true;
            }
            false
        } else if ino == parent && ino != self.sb.rootino {
            log::warn!("[DIR] bad .. entry in directory inode {}, points to self", ino);
            true
        } else {
            false
        };

        if clear {
            out.parent = None;
            if no_modify {
                log::warn!("[DIR] would clear .. inode number in directory {}", ino);
            } else {
                log::warn!("[DIR] clearing .. inode number in directory {}", ino);
                sf_put_inumber(&mut inode.fork[2..], i8count, 0);
                out.dino_dirty = true;
                out.repair = true;
            }
        }
    }
}

/// 把 8 字节 inode 号格式改写为 4 字节格式
///
/// `end` 是旧格式数据的末尾，返回新格式数据的末尾。释放出来的空间补零。
fn sf_fix_i8(fork: &mut [u8], end: usize) -> usize {
    let old = fork[..end].to_vec();
    let Some(hdr) = SfHdr::decode(&old) else {
        return end;
    };

    let mut new = vec![0u8; fork.len()];
    SfHdr { count: hdr.count, i8count: 0, parent: hdr.parent }.encode(&mut new);

    let mut oldpos = sf_hdr_size(hdr.i8count);
    let mut newpos = sf_hdr_size(0);
    while oldpos < end {
        let Some(entry) = SfEntry::decode(&old[oldpos..], hdr.i8count) else {
            break;
        };
        entry.encode(&mut new[newpos..], 0);
        oldpos += entry.entsize(hdr.i8count);
        newpos += entry.entsize(0);
    }

    fork.copy_from_slice(&new);
    newpos
}

/// 按项顺序重新生成最小的合法偏移
fn sf_fix_offsets(fork: &mut [u8]) {
    let count = fork[0] as usize;
    let i8count = fork[1];
    let mut pos = sf_hdr_size(i8count);
    let mut offset = XFS_DIR2_DATA_FIRST_OFFSET;

    for _ in 0..count {
        let Some(&namelen) = fork.get(pos) else {
            break;
        };
        let entsize = sf_entsize(i8count, namelen as usize);
        if pos + entsize > fork.len() {
            break;
        }
        sf_entry_put_offset(&mut fork[pos..], offset as u16);
        offset += dir2_data_entsize(namelen as usize);
        pos += entsize;
    }
}
