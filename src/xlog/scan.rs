//! 周期号/记录头扫描
//!
//! 在环形日志上按周期号二分查找和线性扫描，以及向后查找记录头。

use alloc::vec;

use crate::block::{BlockDev, BlockDevice};
use crate::consts::BBSIZE;
use crate::error::{Error, ErrorKind, Result};

use super::state::Xlog;
use super::types::{get_cycle, is_record_header, RecordHeader};

/// 向后查找记录头的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSearch {
    /// 找到了记录头（边界可能已被修正）
    Found,
    /// 一直扫到日志第 0 块仍未找到，调用方应在另一段范围继续查找
    HitStart,
}

/// 读取单个块的周期号
pub(crate) fn read_cycle<D: BlockDevice>(log: &Xlog, bdev: &mut BlockDev<D>, blk: u64) -> Result<u32> {
    let mut buf = vec![0u8; BBSIZE];
    log.bread(bdev, blk, 1, &mut buf)?;
    Ok(get_cycle(&buf))
}

/// 二分查找 `[first_blk, last_blk]` 中第一个周期号等于 `cycle` 的块
///
/// 要求 `last_blk` 的周期号就是 `cycle`，且区间内周期号只有一处不连续。
/// 返回找到的边界块号。
pub fn find_cycle_start<D: BlockDevice>(
    log: &Xlog,
    bdev: &mut BlockDev<D>,
    first_blk: u64,
    last_blk: u64,
    cycle: u32,
) -> Result<u64> {
    let mut first = first_blk;
    let mut last = last_blk;
    let mut mid = (first + last) >> 1;

    while mid != first && mid != last {
        let mid_cycle = read_cycle(log, bdev, mid)?;
        if mid_cycle == cycle {
            last = mid;
        } else {
            first = mid;
        }
        mid = (first + last) >> 1;
    }
    log::trace!("[LOG] cycle {} starts at block {}", cycle, last);
    Ok(last)
}

/// 线性扫描 `[start_blk, start_blk + nbblks)`，查找第一个周期号等于 `stop_on_cycle` 的块
///
/// 按可用内存分块读取，分配失败时块数减半，减到 0 返回内存不足错误。
///
/// # 返回
///
/// 找到返回 `Some(块号)`，扫完整个范围未找到返回 `None`
pub fn find_verify_cycle<D: BlockDevice>(
    log: &Xlog,
    bdev: &mut BlockDev<D>,
    start_blk: u64,
    nbblks: u64,
    stop_on_cycle: u32,
) -> Result<Option<u64>> {
    if nbblks == 0 {
        return Ok(None);
    }

    let mut bufblks = nbblks.next_power_of_two();
    let mut buf = loop {
        if let Some(buf) = log.get_bp(bufblks.min(nbblks)) {
            break buf;
        }
        bufblks >>= 1;
        if bufblks == 0 {
            return Err(Error::new(ErrorKind::OutOfMemory, "no memory for log scan buffer"));
        }
    };
    let bufblks = bufblks.min(nbblks);

    let end = start_blk + nbblks;
    let mut i = start_blk;
    while i < end {
        let bcount = bufblks.min(end - i);
        log.bread(bdev, i, bcount, &mut buf)?;
        for j in 0..bcount {
            let off = j as usize * BBSIZE;
            if get_cycle(&buf[off..off + BBSIZE]) == stop_on_cycle {
                return Ok(Some(i + j));
            }
        }
        i += bcount;
    }
    Ok(None)
}

/// 从 `*last_blk - 1` 向 `start_blk` 反向查找记录头
///
/// 找到后做挂载身份检查；若该记录的负载长度（加上 `extra_bblks`）不能恰好
/// 覆盖记录头到原边界之间的块，说明原边界指向记录中间，把 `*last_blk` 修正为
/// 记录头位置。
///
/// `start_blk > 0` 时越过 `start_blk` 仍未找到是日志不一致错误；
/// `start_blk == 0` 时返回 [`RecordSearch::HitStart`]。
pub fn find_verify_log_record<D: BlockDevice>(
    log: &Xlog,
    bdev: &mut BlockDev<D>,
    start_blk: u64,
    last_blk: &mut u64,
    extra_bblks: u64,
) -> Result<RecordSearch> {
    debug_assert!(start_blk <= *last_blk);
    let num_blks = *last_blk - start_blk;

    // 内存不足时退化为逐块读取
    let (mut buf, smallmem) = match log.get_bp(num_blks) {
        Some(mut buf) => {
            log.bread(bdev, start_blk, num_blks, &mut buf)?;
            (buf, false)
        }
        None => match log.get_bp(1) {
            Some(buf) => (buf, true),
            None => {
                return Err(Error::new(ErrorKind::OutOfMemory, "no memory for log record scan"))
            }
        },
    };

    let mut found = None;
    for i in (start_blk..*last_blk).rev() {
        let off = if smallmem {
            log.bread(bdev, i, 1, &mut buf)?;
            0
        } else {
            (i - start_blk) as usize * BBSIZE
        };
        if is_record_header(&buf[off..off + BBSIZE]) {
            found = Some((i, RecordHeader::decode(&buf[off..off + BBSIZE])));
            break;
        }
    }

    let (i, head) = match found {
        Some(hit) => hit,
        None if start_blk == 0 => return Ok(RecordSearch::HitStart),
        None => {
            log::warn!("[LOG] previous log record header not found before block {}", start_blk);
            return Err(Error::new(ErrorKind::Corrupted, "log inconsistent: record header not found"));
        }
    };

    log.header_check_mount(&head)?;

    if *last_blk - i + extra_bblks != head.bblks() + 1 {
        log::debug!("[LOG] boundary {} is inside record at {}", *last_blk, i);
        *last_blk = i;
    }
    Ok(RecordSearch::Found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemDevice;
    use crate::xlog::state::XlogConfig;
    use crate::xlog::testlog::TestLog;

    #[test]
    fn test_find_cycle_start_every_boundary() {
        let n = 37u64;
        for k in 1..n {
            let mut tl = TestLog::new(n);
            tl.stamp_range(0, k, 4);
            tl.stamp_range(k, n, 5);
            let (log, mut bdev) = tl.open();
            let got = find_cycle_start(&log, &mut bdev, 0, n - 1, 5).unwrap();
            assert_eq!(got, k, "boundary {}", k);
        }
    }

    #[test]
    fn test_find_verify_cycle() {
        let mut tl = TestLog::new(64);
        tl.stamp_range(0, 64, 3);
        tl.stamp_range(40, 41, 2);
        let (log, mut bdev) = tl.open();
        assert_eq!(find_verify_cycle(&log, &mut bdev, 10, 50, 2).unwrap(), Some(40));
        assert_eq!(find_verify_cycle(&log, &mut bdev, 0, 40, 2).unwrap(), None);
        assert_eq!(find_verify_cycle(&log, &mut bdev, 0, 0, 2).unwrap(), None);
    }

    #[test]
    fn test_find_verify_cycle_halves_buffer() {
        let mut tl = TestLog::new(64);
        tl.stamp_range(0, 64, 3);
        tl.stamp_range(60, 61, 9);
        let log = Xlog::new(0, 64, tl.uuid, XlogConfig { max_buf_bblks: 3 }).unwrap();
        let mut bdev = BlockDev::new(tl.into_device()).unwrap();
        assert_eq!(find_verify_cycle(&log, &mut bdev, 0, 64, 9).unwrap(), Some(60));
    }

    #[test]
    fn test_find_verify_cycle_out_of_memory() {
        let tl = TestLog::new(16);
        let log = Xlog::new(0, 16, tl.uuid, XlogConfig { max_buf_bblks: 0 }).unwrap();
        let mut bdev = BlockDev::new(MemDevice::new(16)).unwrap();
        let err = find_verify_cycle(&log, &mut bdev, 0, 8, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_find_verify_log_record_complete() {
        let mut tl = TestLog::new(64);
        // 记录头在 10，负载 3 块，记录结束于 14
        tl.write_raw_record(10, 1, 3);
        let (log, mut bdev) = tl.open();
        let mut last = 14;
        let res = find_verify_log_record(&log, &mut bdev, 0, &mut last, 0).unwrap();
        assert_eq!(res, RecordSearch::Found);
        assert_eq!(last, 14);
    }

    #[test]
    fn test_find_verify_log_record_backs_up_over_partial() {
        let mut tl = TestLog::new(64);
        tl.write_raw_record(10, 1, 3);
        let (log, mut bdev) = tl.open();
        // 边界落在记录中间
        let mut last = 12;
        find_verify_log_record(&log, &mut bdev, 2, &mut last, 0).unwrap();
        assert_eq!(last, 10);
    }

    #[test]
    fn test_find_verify_log_record_smallmem() {
        let mut tl = TestLog::new(64);
        tl.write_raw_record(10, 1, 3);
        let log = Xlog::new(0, 64, tl.uuid, XlogConfig { max_buf_bblks: 1 }).unwrap();
        let mut bdev = BlockDev::new(tl.into_device()).unwrap();
        let mut last = 12;
        find_verify_log_record(&log, &mut bdev, 0, &mut last, 0).unwrap();
        assert_eq!(last, 10);
    }

    #[test]
    fn test_find_verify_log_record_not_found() {
        let mut tl = TestLog::new(64);
        tl.stamp_range(0, 64, 1);
        let (log, mut bdev) = tl.open();
        let mut last = 20;
        let res = find_verify_log_record(&log, &mut bdev, 0, &mut last, 0).unwrap();
        assert_eq!(res, RecordSearch::HitStart);

        let err = find_verify_log_record(&log, &mut bdev, 5, &mut last, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_find_verify_log_record_uuid_mismatch() {
        let mut tl = TestLog::new(64);
        tl.uuid = [0x99; 16];
        tl.write_raw_record(4, 1, 1);
        let log = Xlog::new(0, 64, [0x11; 16], XlogConfig::default()).unwrap();
        let mut bdev = BlockDev::new(tl.into_device()).unwrap();
        let mut last = 6;
        let err = find_verify_log_record(&log, &mut bdev, 0, &mut last, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }
}
