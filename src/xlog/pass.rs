//! 恢复遍历
//!
//! 从尾部到头部读取日志记录（处理物理末尾回绕），解包负载后把其中的每个
//! 操作交给事务组装。整个恢复分两轮执行，两轮之间的行为差异由应用步骤决定。

use crate::block::{BlockDev, BlockDevice};
use crate::consts::{btobb, BBSIZE, XFS_LOG, XFS_TRANSACTION, XLOG_MAX_RECORD_BSIZE};
use crate::crc::record_checksum;
use crate::error::{Error, ErrorKind, Result};

use super::assembler::{RecoverApply, RecoveredTransaction, RecoveryTable};
use super::boundary::{find_tail, LogBounds};
use super::state::Xlog;
use super::types::{unpack_payload, OpFlags, OpHeader, RecordHeader, OP_HEADER_SIZE};

/// 读取并检查一个记录头
fn read_record_header<D: BlockDevice>(
    log: &Xlog,
    bdev: &mut BlockDev<D>,
    blk: u64,
    hbuf: &mut [u8],
) -> Result<RecordHeader> {
    log.bread(bdev, blk, 1, hbuf)?;
    RecordHeader::decode_checked(hbuf).map_err(|err| {
        log::warn!("[LOG] bad record header at block {}", blk);
        err
    })
}

/// 检查负载校验和，不匹配时每个日志只报告一次
fn check_payload_crc(log: &mut Xlog, rhead: &RecordHeader, payload: &[u8]) {
    if rhead.chksum == 0 {
        return;
    }
    if record_checksum(payload) != rhead.chksum {
        if !log.chksum_mismatch {
            log::warn!(
                "[LOG] record at lsn {:#x}: payload checksum mismatch, continuing",
                rhead.lsn
            );
            log.chksum_mismatch = true;
        } else {
            log::debug!("[LOG] record at lsn {:#x}: payload checksum mismatch", rhead.lsn);
        }
    }
}

/// 处理一条记录负载中的所有操作
///
/// `dp` 是已解包的负载，长度至少为记录头声明的 `len`。
pub fn process_data(
    log: &Xlog,
    table: &mut RecoveryTable,
    rhead: &RecordHeader,
    dp: &[u8],
    pass: u32,
    apply: &mut dyn RecoverApply,
) -> Result<()> {
    // 格式或身份不符时无法恢复
    log.header_check_recover(rhead)?;

    let end = rhead.len as usize;
    if dp.len() < end {
        return Err(Error::new(ErrorKind::InvalidInput, "payload buffer shorter than record"));
    }

    let mut pos = 0;
    while pos < end {
        if pos + OP_HEADER_SIZE > end {
            log::warn!("[LOG] lsn {:#x}: op header past end of record", rhead.lsn);
            return Err(Error::new(ErrorKind::Corrupted, "log op header past end of record"));
        }
        let ohead = OpHeader::decode(&dp[pos..pos + OP_HEADER_SIZE]);
        pos += OP_HEADER_SIZE;

        if ohead.clientid != XFS_TRANSACTION && ohead.clientid != XFS_LOG {
            log::warn!("[LOG] bad clientid {:#x}", ohead.clientid);
            return Err(Error::new(ErrorKind::Corrupted, "bad clientid in log op"));
        }

        let len = ohead.len as usize;
        if len > end - pos {
            log::warn!("[LOG] tid {:#x}: op length {} past end of record", ohead.tid, len);
            return Err(Error::new(ErrorKind::Corrupted, "log op length past end of record"));
        }
        let region = &dp[pos..pos + len];
        pos += len;

        let tid = ohead.tid;
        if !table.contains(tid) {
            // 不认识的事务只在带 START 时才开始跟踪
            if ohead.flags.contains(OpFlags::START) {
                table.start(tid, rhead.lsn);
            }
            continue;
        }

        let mut flags = ohead.flags - OpFlags::END;
        if flags.contains(OpFlags::WAS_CONT) {
            flags.remove(OpFlags::CONTINUE);
        }

        if flags == OpFlags::COMMIT {
            table.commit(tid, pass, apply)?;
        } else if flags == OpFlags::UNMOUNT {
            table.unmount(tid);
        } else if flags == OpFlags::WAS_CONT {
            trans_mut(table, tid)?.add_continued_region(region)?;
        } else if flags == OpFlags::START {
            log::warn!("[LOG] tid {:#x}: START on a transaction already in progress", tid);
            return Err(Error::new(ErrorKind::Corrupted, "bad transaction"));
        } else if flags.is_empty() || flags == OpFlags::CONTINUE {
            trans_mut(table, tid)?.add_region(region)?;
        } else {
            log::warn!("[LOG] tid {:#x}: bad op flags {:#x}", tid, ohead.flags.bits());
            return Err(Error::new(ErrorKind::Corrupted, "bad flag in log op"));
        }
    }
    Ok(())
}

fn trans_mut(table: &mut RecoveryTable, tid: u32) -> Result<&mut RecoveredTransaction> {
    table
        .find_mut(tid)
        .ok_or(Error::new(ErrorKind::InvalidState, "transaction vanished from table"))
}

/// 执行一轮恢复
///
/// `tail_blk <= head_blk` 时顺序处理 `[tail, head)`；否则先处理尾部到物理末尾
/// （负载可能跨越物理末尾，分两次读入同一缓冲区），再从块 0 处理到头部。
/// 本轮结束时仍未提交的事务被丢弃。
pub fn do_recovery_pass<D: BlockDevice>(
    log: &mut Xlog,
    bdev: &mut BlockDev<D>,
    head_blk: u64,
    tail_blk: u64,
    pass: u32,
    apply: &mut dyn RecoverApply,
) -> Result<()> {
    let log_bbnum = log.size();
    let mut hbuf = log
        .get_bp(1)
        .ok_or(Error::new(ErrorKind::OutOfMemory, "no memory for log record header"))?;
    let dbuf_bblks = btobb(XLOG_MAX_RECORD_BSIZE).min(log_bbnum);
    let mut dbuf = log
        .get_bp(dbuf_bblks)
        .ok_or(Error::new(ErrorKind::OutOfMemory, "no memory for log record data"))?;
    let mut table = RecoveryTable::new();

    log::debug!("[LOG] recovery pass {}: tail {} head {}", pass, tail_blk, head_blk);

    if tail_blk <= head_blk {
        let mut blk = tail_blk;
        while blk < head_blk {
            blk = process_record_at(log, bdev, blk, &mut hbuf, &mut dbuf, &mut table, pass, apply)?;
        }
    } else {
        // 活动区域跨过日志物理末尾
        let mut blk = tail_blk;
        while blk < log_bbnum {
            let rhead = read_record_header(log, bdev, blk, &mut hbuf)?;
            let bblks = rhead.bblks();
            if bblks == 0 || bblks > dbuf_bblks {
                return Err(Error::new(ErrorKind::Corrupted, "bad log record length"));
            }
            blk += 1;

            let data = &mut dbuf[..bblks as usize * BBSIZE];
            if blk + bblks <= log_bbnum {
                log.bread(bdev, blk, bblks, data)?;
            } else {
                // 负载被物理末尾截成两段
                let split_bblks = log_bbnum - blk;
                let (before, after) = data.split_at_mut(split_bblks as usize * BBSIZE);
                if split_bblks > 0 {
                    log.bread(bdev, blk, split_bblks, before)?;
                }
                log.bread(bdev, 0, bblks - split_bblks, after)?;
            }
            process_record(log, &rhead, data, &mut table, pass, apply)?;
            blk += bblks;
        }

        blk -= log_bbnum;
        while blk < head_blk {
            blk = process_record_at(log, bdev, blk, &mut hbuf, &mut dbuf, &mut table, pass, apply)?;
        }
    }

    let dropped = table.discard_pending();
    if dropped > 0 {
        log::debug!("[LOG] pass {}: dropped {} uncommitted transactions", pass, dropped);
    }
    Ok(())
}

/// 处理不跨物理末尾的一条记录，返回下一条记录的块号
#[allow(clippy::too_many_arguments)]
fn process_record_at<D: BlockDevice>(
    log: &mut Xlog,
    bdev: &mut BlockDev<D>,
    blk: u64,
    hbuf: &mut [u8],
    dbuf: &mut [u8],
    table: &mut RecoveryTable,
    pass: u32,
    apply: &mut dyn RecoverApply,
) -> Result<u64> {
    let rhead = read_record_header(log, bdev, blk, hbuf)?;
    let bblks = rhead.bblks();
    if bblks > 0 {
        if bblks as usize * BBSIZE > dbuf.len() {
            return Err(Error::new(ErrorKind::Corrupted, "bad log record length"));
        }
        let data = &mut dbuf[..bblks as usize * BBSIZE];
        log.bread(bdev, blk + 1, bblks, data)?;
        process_record(log, &rhead, data, table, pass, apply)?;
    }
    Ok(blk + bblks + 1)
}

fn process_record(
    log: &mut Xlog,
    rhead: &RecordHeader,
    data: &mut [u8],
    table: &mut RecoveryTable,
    pass: u32,
    apply: &mut dyn RecoverApply,
) -> Result<()> {
    unpack_payload(rhead, data);
    check_payload_crc(log, rhead, &data[..rhead.len as usize]);
    process_data(log, table, rhead, data, pass, apply)
}

/// 恢复日志
///
/// 定位头尾；日志不干净时依次执行第 1 轮和第 2 轮恢复。返回定位到的边界。
pub fn recover<D: BlockDevice>(
    log: &mut Xlog,
    bdev: &mut BlockDev<D>,
    apply: &mut dyn RecoverApply,
) -> Result<LogBounds> {
    let bounds = find_tail(log, bdev)?;
    if bounds.is_clean() {
        log::info!("[LOG] log is clean, nothing to recover");
        return Ok(bounds);
    }

    log::info!(
        "[LOG] starting recovery (head {}, tail {})",
        bounds.head_blk,
        bounds.tail_blk
    );
    for pass in 1..=2 {
        do_recovery_pass(log, bdev, bounds.head_blk, bounds.tail_blk, pass, apply)?;
    }
    log::info!("[LOG] recovery completed");
    Ok(bounds)
}
