//! 恢复事务组装
//!
//! 按事务 ID 把日志操作聚合成内存中的恢复事务。每个事务拥有一组有序的
//! 恢复项，每个恢复项拥有若干区域的副本。事务在 COMMIT 时从表中移除并交给
//! 调用方提供的应用步骤，随后整体释放。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};

use crate::consts::{XFS_TRANS_HEADER_MAGIC, XLOG_MAX_REGIONS_IN_ITEM};
use crate::error::{Error, ErrorKind, Result};

use super::types::{ItemFormat, Lsn, TransHeader, TRANS_HEADER_SIZE};

/// 恢复项：一个日志项的全部区域
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryItem {
    /// 格式描述声明的区域总数（0 表示还没有收到第一个区域）
    total: usize,
    /// 已收到的区域，`regions[0]` 是格式描述
    regions: Vec<Vec<u8>>,
}

impl RecoveryItem {
    /// 声明的区域总数
    pub fn total(&self) -> usize {
        self.total
    }

    /// 已收到的区域
    pub fn regions(&self) -> &[Vec<u8>] {
        &self.regions
    }

    /// 是否已收齐所有区域
    pub fn is_complete(&self) -> bool {
        self.total != 0 && self.regions.len() == self.total
    }

    /// 日志项类型（取自格式描述）
    pub fn item_type(&self) -> Option<u16> {
        self.regions
            .first()
            .and_then(|r| ItemFormat::decode(r))
            .map(|f| f.item_type)
    }
}

/// 恢复事务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredTransaction {
    tid: u32,
    /// 首次出现该事务的记录 LSN
    lsn: Lsn,
    /// 事务头原始字节（可能跨两个操作拼接）
    header: [u8; TRANS_HEADER_SIZE],
    items: Vec<RecoveryItem>,
}

impl RecoveredTransaction {
    fn new(tid: u32, lsn: Lsn) -> Self {
        Self {
            tid,
            lsn,
            header: [0; TRANS_HEADER_SIZE],
            items: Vec::new(),
        }
    }

    /// 事务 ID
    pub fn tid(&self) -> u32 {
        self.tid
    }

    /// 事务开始所在记录的 LSN
    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    /// 事务头
    pub fn header(&self) -> TransHeader {
        TransHeader::decode(&self.header)
    }

    /// 恢复项列表（按日志顺序）
    pub fn items(&self) -> &[RecoveryItem] {
        &self.items
    }

    /// 加入一个新区域
    ///
    /// 事务还没有恢复项时，区域是事务头（可能只有前半部分）。否则当最后一项
    /// 已收齐时开启新项；新项的第一个区域是格式描述，其前 4 字节给出区域总数。
    /// 区域内容总是复制，日志缓冲区随后可以复用。
    pub fn add_region(&mut self, dp: &[u8]) -> Result<()> {
        if dp.is_empty() {
            return Ok(());
        }

        if self.items.is_empty() {
            if dp.len() > TRANS_HEADER_SIZE {
                return Err(Error::new(ErrorKind::Corrupted, "transaction header region too long"));
            }
            if dp.len() >= 4 && BigEndian::read_u32(dp) != XFS_TRANS_HEADER_MAGIC {
                log::warn!("[LOG] tid {:#x}: bad transaction header magic", self.tid);
                return Err(Error::new(ErrorKind::Corrupted, "bad transaction header magic"));
            }
            self.header[..dp.len()].copy_from_slice(dp);
            // 事务头不完整时等待续接操作补齐
            if dp.len() == TRANS_HEADER_SIZE {
                self.items.push(RecoveryItem::default());
            }
            return Ok(());
        }

        if self.items.last().is_some_and(RecoveryItem::is_complete) {
            self.items.push(RecoveryItem::default());
        }
        let item = self
            .items
            .last_mut()
            .ok_or(Error::new(ErrorKind::InvalidState, "recovery item list empty"))?;

        if item.total == 0 {
            let fmt = ItemFormat::decode(dp)
                .ok_or(Error::new(ErrorKind::Corrupted, "log item format region too short"))?;
            let total = fmt.size as usize;
            if total == 0 || total > XLOG_MAX_REGIONS_IN_ITEM {
                log::warn!("[LOG] tid {:#x}: bad region count {} in log item", self.tid, total);
                return Err(Error::new(ErrorKind::Corrupted, "bad region count in log item"));
            }
            item.total = total;
            item.regions.reserve_exact(total);
        }
        if item.regions.len() >= item.total {
            return Err(Error::new(ErrorKind::Corrupted, "too many regions in log item"));
        }
        item.regions.push(dp.to_vec());
        Ok(())
    }

    /// 把续接数据追加到最后一个区域
    ///
    /// 事务还没有恢复项时，续接数据是事务头的剩余部分。
    pub fn add_continued_region(&mut self, dp: &[u8]) -> Result<()> {
        if self.items.is_empty() {
            if dp.len() > TRANS_HEADER_SIZE {
                return Err(Error::new(ErrorKind::Corrupted, "transaction header region too long"));
            }
            self.header[TRANS_HEADER_SIZE - dp.len()..].copy_from_slice(dp);
            self.items.push(RecoveryItem::default());
            return Ok(());
        }

        let region = self
            .items
            .last_mut()
            .and_then(|item| item.regions.last_mut())
            .ok_or(Error::new(ErrorKind::Corrupted, "continued region without a region"))?;
        region.extend_from_slice(dp);
        Ok(())
    }
}

/// 事务应用步骤
///
/// 恢复过程本身只负责组装；提交的事务交给实现者处理。`pass` 为 1 或 2。
pub trait RecoverApply {
    /// 应用一个已提交的事务
    fn apply_trans(&mut self, trans: &RecoveredTransaction, pass: u32) -> Result<()>;
}

impl<F> RecoverApply for F
where
    F: FnMut(&RecoveredTransaction, u32) -> Result<()>,
{
    fn apply_trans(&mut self, trans: &RecoveredTransaction, pass: u32) -> Result<()> {
        self(trans, pass)
    }
}

/// 未提交事务表
///
/// 独占持有所有未提交的事务及其恢复项，直到提交或本轮结束。
#[derive(Debug, Default)]
pub struct RecoveryTable {
    pending: BTreeMap<u32, RecoveredTransaction>,
}

impl RecoveryTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 ID 查找事务
    pub fn find_mut(&mut self, tid: u32) -> Option<&mut RecoveredTransaction> {
        self.pending.get_mut(&tid)
    }

    /// 事务是否在表中
    pub fn contains(&self, tid: u32) -> bool {
        self.pending.contains_key(&tid)
    }

    /// 开始一个新事务
    pub fn start(&mut self, tid: u32, lsn: Lsn) {
        log::trace!("[LOG] new transaction tid={:#x} lsn={:#x}", tid, lsn);
        self.pending.insert(tid, RecoveredTransaction::new(tid, lsn));
    }

    /// 提交事务：移出表、交给应用步骤，然后释放
    pub fn commit(&mut self, tid: u32, pass: u32, apply: &mut dyn RecoverApply) -> Result<()> {
        let trans = self
            .pending
            .remove(&tid)
            .ok_or(Error::new(ErrorKind::InvalidState, "committing unknown transaction"))?;
        log::debug!(
            "[LOG] commit tid={:#x} items={} pass={}",
            tid,
            trans.items.len(),
            pass
        );
        apply.apply_trans(&trans, pass)
    }

    /// 卸载记录：只记录，不做任何处理
    pub fn unmount(&mut self, tid: u32) {
        log::warn!("[LOG] unmount log record in transaction {:#x}", tid);
    }

    /// 未提交事务数
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 丢弃所有未提交事务，返回丢弃的数量
    pub fn discard_pending(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn trans_header(tid: u32) -> [u8; TRANS_HEADER_SIZE] {
        TransHeader::new(1, tid, 1).encode()
    }

    fn format_region(size: u16, extra: usize) -> Vec<u8> {
        let mut r = vec![0xAB; 4 + extra];
        ItemFormat { item_type: 0x123b, size }.encode(&mut r);
        r
    }

    #[test]
    fn test_header_then_items() {
        let mut t = RecoveredTransaction::new(9, 0);
        t.add_region(&trans_header(9)).unwrap();
        assert_eq!(t.header().tid, 9);
        assert_eq!(t.items().len(), 1);

        t.add_region(&format_region(2, 4)).unwrap();
        t.add_region(b"data").unwrap();
        assert!(t.items()[0].is_complete());

        // 上一项已收齐，新区域开启第二项
        t.add_region(&format_region(1, 0)).unwrap();
        assert_eq!(t.items().len(), 2);
        assert_eq!(t.items()[1].total(), 1);
        assert_eq!(t.items()[0].item_type(), Some(0x123b));
    }

    #[test]
    fn test_split_transaction_header() {
        let hdr = trans_header(3);
        let mut t = RecoveredTransaction::new(3, 0);
        t.add_region(&hdr[..10]).unwrap();
        assert!(t.items().is_empty());
        t.add_continued_region(&hdr[10..]).unwrap();
        assert_eq!(t.header(), TransHeader::new(1, 3, 1));
        assert_eq!(t.items().len(), 1);
    }

    #[test]
    fn test_continued_region_concatenates() {
        let mut t = RecoveredTransaction::new(1, 0);
        t.add_region(&trans_header(1)).unwrap();
        t.add_region(&format_region(2, 0)).unwrap();
        t.add_region(b"abc").unwrap();
        t.add_continued_region(b"def").unwrap();
        assert_eq!(t.items()[0].regions()[1], b"abcdef".to_vec());
    }

    #[test]
    fn test_bad_regions_rejected() {
        let mut t = RecoveredTransaction::new(1, 0);
        assert!(t.add_region(&[0u8; 16]).is_err());

        t.add_region(&trans_header(1)).unwrap();
        assert!(t.add_region(&format_region(0, 0)).is_err());
        assert!(t.add_region(&format_region(300, 0)).is_err());
        assert!(t.add_region(&[1, 2]).is_err());

        // 空区域直接忽略
        t.add_region(&[]).unwrap();
        assert_eq!(t.items()[0].regions().len(), 0);
    }

    #[test]
    fn test_continued_without_region() {
        let mut t = RecoveredTransaction::new(1, 0);
        t.add_region(&trans_header(1)).unwrap();
        let err = t.add_continued_region(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_commit_removes_and_applies() {
        let mut table = RecoveryTable::new();
        table.start(7, 0x100);
        table.find_mut(7).unwrap().add_region(&trans_header(7)).unwrap();
        assert_eq!(table.pending_count(), 1);

        let mut seen = Vec::new();
        let mut apply = |t: &RecoveredTransaction, pass: u32| -> Result<()> {
            seen.push((t.tid(), t.lsn(), pass));
            Ok(())
        };
        table.commit(7, 1, &mut apply).unwrap();
        assert_eq!(table.pending_count(), 0);
        let err = table.commit(7, 1, &mut apply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(seen, vec![(7, 0x100, 1)]);
    }

    #[test]
    fn test_discard_pending() {
        let mut table = RecoveryTable::new();
        table.start(1, 0);
        table.start(2, 0);
        assert_eq!(table.discard_pending(), 2);
        assert!(!table.contains(1));
    }
}
