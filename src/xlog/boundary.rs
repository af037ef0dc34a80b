//! 日志边界定位
//!
//! 找出环形日志的头部（下一次写入位置）和尾部（最早的未完成记录），
//! 以及检测全零/部分清零的日志。

use alloc::vec;

use crate::block::{BlockDev, BlockDevice};
use crate::consts::{btobb, BBSIZE, XLOG_MAX_ICLOGS, XLOG_MAX_RECORD_BSHIFT, XLOG_MAX_RECORD_BSIZE};
use crate::error::{Error, ErrorKind, Result};

use super::scan::{find_cycle_start, find_verify_cycle, find_verify_log_record, read_cycle, RecordSearch};
use super::state::Xlog;
use super::types::{block_lsn, is_record_header, make_lsn, OpFlags, OpHeader, RecordHeader};

/// 全零检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroedLog {
    /// 日志已被完整写过一遍，不需要特殊处理
    Written,
    /// 日志（部分）为零，`first_blk` 是第一个周期号为 0 的块；
    /// 全零日志时为 0
    Zeroed {
        /// 作为日志起点使用的块
        first_blk: u64,
    },
}

/// 头部与尾部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBounds {
    /// 头部块号
    pub head_blk: u64,
    /// 尾部块号
    pub tail_blk: u64,
}

impl LogBounds {
    /// 头尾重合表示日志是干净的
    pub fn is_clean(&self) -> bool {
        self.head_blk == self.tail_blk
    }
}

/// 可能同时在途的所有记录覆盖的块数（不超过日志长度）
fn iclog_scan_bblks(log: &Xlog) -> u64 {
    btobb(XLOG_MAX_ICLOGS << XLOG_MAX_RECORD_BSHIFT).min(log.size())
}

/// 单条记录可能覆盖的块数（不超过日志长度）
fn record_scan_bblks(log: &Xlog) -> u64 {
    btobb(XLOG_MAX_RECORD_BSIZE).min(log.size())
}

/// 检测全零或部分清零的日志
///
/// 第一块周期号为 0 表示整个日志从未写过；最后一块周期号非 0 表示日志已完整写过；
/// 否则第一块周期号必须为 1，二分查找零/非零边界并在边界前回退到完整记录。
pub fn find_zeroed<D: BlockDevice>(log: &Xlog, bdev: &mut BlockDev<D>) -> Result<ZeroedLog> {
    let log_bbnum = log.size();

    let first_cycle = read_cycle(log, bdev, 0)?;
    if first_cycle == 0 {
        return Ok(ZeroedLog::Zeroed { first_blk: 0 });
    }

    let last_cycle = read_cycle(log, bdev, log_bbnum - 1)?;
    if last_cycle != 0 {
        return Ok(ZeroedLog::Written);
    }
    if first_cycle != 1 {
        // 只有第一遍写日志时才会出现尾部为零的情况
        log::warn!("[LOG] log inconsistent or not a log (last==0, first!=1)");
        return Err(Error::new(ErrorKind::InvalidInput, "log inconsistent or not a log"));
    }

    let mut last_blk = find_cycle_start(log, bdev, 0, log_bbnum - 1, 0)?;

    // 边界之前可能还有没写完的零块
    let num_scan_bblks = iclog_scan_bblks(log).min(last_blk);
    let start_blk = last_blk - num_scan_bblks;
    if let Some(new_blk) = find_verify_cycle(log, bdev, start_blk, num_scan_bblks, 0)? {
        last_blk = new_blk;
    }

    // 回退到不完整记录之前
    // 扫到起点仍未找到记录头时保留二分得到的边界
    let _ = find_verify_log_record(log, bdev, start_blk, &mut last_blk, 0)?;

    log::debug!("[LOG] partially zeroed log, first zero block {}", last_blk);
    Ok(ZeroedLog::Zeroed { first_blk: last_blk })
}

/// 查找日志头部
///
/// 返回下一次写入的块号。等于日志长度的哨兵值归一化为 0。
pub fn find_head<D: BlockDevice>(log: &Xlog, bdev: &mut BlockDev<D>) -> Result<u64> {
    let log_bbnum = log.size();

    match find_zeroed(log, bdev) {
        Ok(ZeroedLog::Zeroed { first_blk }) => {
            if first_blk == 0 {
                log::warn!("[LOG] totally zeroed log");
            }
            return Ok(first_blk);
        }
        Ok(ZeroedLog::Written) => {}
        Err(err) => {
            log::warn!("[LOG] empty log check failed");
            return Err(err);
        }
    }

    let first_half_cycle = read_cycle(log, bdev, 0)?;
    let last_blk = log_bbnum - 1;
    let last_half_cycle = read_cycle(log, bdev, last_blk)?;
    debug_assert!(last_half_cycle != 0);

    // 整个日志周期号相同时头部暂定为 log_bbnum（与 0 在环上等价），
    // 接下来的扫描只需要找 last_half_cycle - 1 的空洞
    let (mut head_blk, stop_on_cycle) = if first_half_cycle == last_half_cycle {
        (log_bbnum, last_half_cycle.wrapping_sub(1))
    } else {
        let head = find_cycle_start(log, bdev, 0, last_blk, last_half_cycle)?;
        (head, last_half_cycle)
    };

    // 在头部之前一个窗口内查找更早的不完整写入
    let num_scan_bblks = iclog_scan_bblks(log);
    if head_blk >= num_scan_bblks {
        let start_blk = head_blk - num_scan_bblks;
        if let Some(new_blk) = find_verify_cycle(log, bdev, start_blk, num_scan_bblks, stop_on_cycle)? {
            head_blk = new_blk;
        }
    } else {
        // 窗口跨过物理起点，分两段扫描：
        // 先扫物理末尾找 stop_on_cycle - 1 的空洞，再扫开头找 stop_on_cycle
        let start_blk = log_bbnum - num_scan_bblks + head_blk;
        match find_verify_cycle(
            log,
            bdev,
            start_blk,
            num_scan_bblks - head_blk,
            stop_on_cycle.wrapping_sub(1),
        )? {
            Some(new_blk) => head_blk = new_blk,
            None => {
                if let Some(new_blk) = find_verify_cycle(log, bdev, 0, head_blk, stop_on_cycle)? {
                    head_blk = new_blk;
                }
            }
        }
    }

    // 确认头部不在某条记录中间
    let num_scan_bblks = record_scan_bblks(log);
    if head_blk >= num_scan_bblks {
        let start_blk = head_blk - num_scan_bblks;
        if find_verify_log_record(log, bdev, start_blk, &mut head_blk, 0)? == RecordSearch::HitStart {
            return Err(Error::new(ErrorKind::Corrupted, "log head record not found"));
        }
    } else if find_verify_log_record(log, bdev, 0, &mut head_blk, 0)? == RecordSearch::HitStart {
        // 扫到了物理起点，继续从物理末尾往回找
        let start_blk = log_bbnum - num_scan_bblks + head_blk;
        let mut new_blk = log_bbnum;
        if find_verify_log_record(log, bdev, start_blk, &mut new_blk, head_blk)?
            == RecordSearch::HitStart
        {
            return Err(Error::new(ErrorKind::Corrupted, "log head record not found"));
        }
        if new_blk != log_bbnum {
            head_blk = new_blk;
        }
    }

    if head_blk == log_bbnum {
        head_blk = 0;
    }
    log::debug!("[LOG] head block {}", head_blk);
    Ok(head_blk)
}

/// 查找日志尾部
///
/// 先定位头部，再从头部向前查找最近的记录头（必要时回绕到物理末尾，
/// 此时当前周期号加一），取其中记录的尾部 LSN。若该记录恰好是紧贴头部的
/// 单操作卸载记录，尾部推进到卸载记录之后，日志即为干净。
///
/// 同时设置日志的 `prev_block`、`curr_block`、`curr_cycle`、`tail_lsn`、`last_sync_lsn`。
pub fn find_tail<D: BlockDevice>(log: &mut Xlog, bdev: &mut BlockDev<D>) -> Result<LogBounds> {
    let head_blk = match find_head(log, bdev) {
        Ok(head) => head,
        Err(err) => {
            log::warn!("[LOG] failed to locate log tail");
            return Err(err);
        }
    };
    let log_bbnum = log.size();
    let mut buf = vec![0u8; BBSIZE];

    if head_blk == 0 && read_cycle(log, bdev, 0)? == 0 {
        // 全零日志，保持其它状态不变
        return Ok(LogBounds { head_blk: 0, tail_blk: 0 });
    }

    let mut found = None;
    for i in (0..head_blk).rev() {
        log.bread(bdev, i, 1, &mut buf)?;
        if is_record_header(&buf) {
            found = Some((i, false));
            break;
        }
    }
    if found.is_none() {
        for i in (head_blk..log_bbnum).rev() {
            log.bread(bdev, i, 1, &mut buf)?;
            if is_record_header(&buf) {
                found = Some((i, true));
                break;
            }
        }
    }
    let (rec_blk, wrapped) = match found {
        Some(hit) => hit,
        None => {
            log::warn!("[LOG] couldn't find sync record, not a valid log");
            return Err(Error::new(ErrorKind::Corrupted, "log inconsistent: no sync record"));
        }
    };

    let rhead = RecordHeader::decode(&buf);

    log.prev_block = rec_blk;
    log.curr_block = head_blk;
    log.curr_cycle = if wrapped {
        rhead.cycle.wrapping_add(1)
    } else {
        rhead.cycle
    };
    log.tail_lsn = rhead.tail_lsn;
    log.last_sync_lsn = rhead.lsn;

    let mut tail_blk = block_lsn(rhead.tail_lsn) as u64;

    // 紧贴头部的卸载记录：头部 = 记录头 + 1 个负载块之后
    let after_umount_blk = (rec_blk + 2) % log_bbnum;
    if head_blk == after_umount_blk && rhead.num_logops == 1 {
        let umount_data_blk = (rec_blk + 1) % log_bbnum;
        log.bread(bdev, umount_data_blk, 1, &mut buf)?;
        let op = OpHeader::decode(&buf);
        if op.flags.contains(OpFlags::UNMOUNT) {
            log.tail_lsn = make_lsn(log.curr_cycle, after_umount_blk as u32);
            log.last_sync_lsn = log.tail_lsn;
            tail_blk = after_umount_blk;
            log::debug!("[LOG] clean unmount record at block {}", rec_blk);
        }
    }

    if tail_blk >= log_bbnum {
        log::warn!("[LOG] tail block {} beyond end of log", tail_blk);
        return Err(Error::new(ErrorKind::Corrupted, "log tail beyond end of log"));
    }

    log::info!("[LOG] head block {}, tail block {}", head_blk, tail_blk);
    Ok(LogBounds { head_blk, tail_blk })
}
