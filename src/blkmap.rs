//! 目录块映射
//!
//! 对应 repair 的 `blkmap`：目录文件逻辑块号（fs 块）到物理 fs 块号的 extent 列表。
//! 由调用方从 inode 的 extent/btree 数据分支构建。

use alloc::vec::Vec;

use crate::block::BufMap;
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::Superblock;

/// 一段映射
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmapExtent {
    /// 逻辑起始块
    pub startoff: u64,
    /// 物理起始块（fs 块号）
    pub startblock: u64,
    /// 块数
    pub blockcount: u64,
}

impl BmapExtent {
    fn end(&self) -> u64 {
        self.startoff + self.blockcount
    }
}

/// 逻辑块映射表（按逻辑块排序，互不重叠）
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    extents: Vec<BmapExtent>,
}

impl BlockMap {
    /// 由 extent 列表构建，拒绝空 extent 和重叠
    pub fn new(mut extents: Vec<BmapExtent>) -> Result<Self> {
        extents.sort_by_key(|e| e.startoff);
        for (i, ext) in extents.iter().enumerate() {
            if ext.blockcount == 0 {
                return Err(Error::new(ErrorKind::Corrupted, "zero-length extent"));
            }
            if i > 0 && extents[i - 1].end() > ext.startoff {
                return Err(Error::new(ErrorKind::Corrupted, "overlapping extents"));
            }
        }
        Ok(Self { extents })
    }

    /// extent 列表
    pub fn extents(&self) -> &[BmapExtent] {
        &self.extents
    }

    /// 查找单个逻辑块对应的物理块
    pub fn get(&self, off: u64) -> Option<u64> {
        self.find(off).map(|e| e.startblock + (off - e.startoff))
    }

    fn find(&self, off: u64) -> Option<&BmapExtent> {
        let idx = self.extents.partition_point(|e| e.end() <= off);
        self.extents.get(idx).filter(|e| e.startoff <= off)
    }

    /// 取得覆盖 `[off, off + count)` 的物理区间
    ///
    /// 对应 `blkmap_getn`。区间内任何一块未映射时返回 `None`。
    pub fn get_n(&self, off: u64, count: u64) -> Option<Vec<BmapExtent>> {
        let mut out = Vec::new();
        let mut cur = off;
        let end = off + count;
        while cur < end {
            let ext = self.find(cur)?;
            let delta = cur - ext.startoff;
            let len = (ext.end() - cur).min(end - cur);
            out.push(BmapExtent {
                startoff: cur,
                startblock: ext.startblock + delta,
                blockcount: len,
            });
            cur += len;
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// 大于 `prev` 的下一个已映射逻辑块；`prev` 为 `None` 时返回第一个
    pub fn next_off(&self, prev: Option<u64>) -> Option<u64> {
        let want = match prev {
            None => 0,
            Some(p) => p.checked_add(1)?,
        };
        let idx = self.extents.partition_point(|e| e.end() <= want);
        let ext = self.extents.get(idx)?;
        Some(want.max(ext.startoff))
    }

    /// 映射末尾之后的第一个逻辑块（即最高已映射块 + 1）
    pub fn last_off(&self) -> u64 {
        self.extents.last().map(|e| e.end()).unwrap_or(0)
    }
}

/// 把 fs 块区间换算为缓冲区映射
pub fn extents_to_buf_maps(sb: &Superblock, extents: &[BmapExtent]) -> Vec<BufMap> {
    extents
        .iter()
        .map(|e| BufMap {
            daddr: sb.fsb_to_daddr(e.startblock),
            bblen: sb.fsb_to_bb(e.blockcount) as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample() -> BlockMap {
        BlockMap::new(vec![
            BmapExtent { startoff: 4, startblock: 200, blockcount: 2 },
            BmapExtent { startoff: 0, startblock: 100, blockcount: 2 },
        ])
        .unwrap()
    }

    #[test]
    fn test_get() {
        let map = sample();
        assert_eq!(map.get(0), Some(100));
        assert_eq!(map.get(1), Some(101));
        assert_eq!(map.get(2), None);
        assert_eq!(map.get(5), Some(201));
    }

    #[test]
    fn test_get_n_spanning() {
        let map = BlockMap::new(vec![
            BmapExtent { startoff: 0, startblock: 100, blockcount: 1 },
            BmapExtent { startoff: 1, startblock: 300, blockcount: 3 },
        ])
        .unwrap();
        let got = map.get_n(0, 2).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].startblock, 100);
        assert_eq!(got[1].startblock, 300);
        assert_eq!(got[1].blockcount, 1);
    }

    #[test]
    fn test_get_n_hole() {
        let map = sample();
        assert!(map.get_n(1, 2).is_none());
        assert!(map.get_n(3, 1).is_none());
    }

    #[test]
    fn test_next_and_last_off() {
        let map = sample();
        assert_eq!(map.next_off(None), Some(0));
        assert_eq!(map.next_off(Some(0)), Some(1));
        assert_eq!(map.next_off(Some(1)), Some(4));
        assert_eq!(map.next_off(Some(5)), None);
        assert_eq!(map.last_off(), 6);
    }

    #[test]
    fn test_overlap_rejected() {
        let err = BlockMap::new(vec![
            BmapExtent { startoff: 0, startblock: 100, blockcount: 4 },
            BmapExtent { startoff: 2, startblock: 300, blockcount: 1 },
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }
}
