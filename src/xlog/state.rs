//! 日志实例
//!
//! 对应 xfs 的 `xlog_t`：日志在设备上的位置、所属文件系统的身份，以及
//! 尾部定位后得到的运行时状态。

use alloc::vec::Vec;

use crate::block::{BlockDev, BlockDevice};
use crate::consts::{BBSIZE, XLOG_FMT_LINUX_BE};
use crate::error::{Error, ErrorKind, Result};
use crate::superblock::Superblock;

use super::types::{Lsn, RecordHeader};

/// 日志扫描配置
#[derive(Debug, Clone, Copy)]
pub struct XlogConfig {
    /// 单次扫描缓冲区允许的最大基本块数
    ///
    /// 超过时分配视为失败，扫描会把块数减半重试。
    pub max_buf_bblks: u64,
}

impl Default for XlogConfig {
    fn default() -> Self {
        Self {
            max_buf_bblks: u64::MAX,
        }
    }
}

/// 日志实例
#[derive(Debug, Clone)]
pub struct Xlog {
    /// 日志起始基本块地址
    logbb_start: u64,
    /// 日志长度（基本块）
    logbb_size: u64,
    /// 文件系统 UUID
    uuid: [u8; 16],
    config: XlogConfig,

    /// 最后一条记录头所在块
    pub(crate) prev_block: u64,
    /// 下一次写入的块（头部）
    pub(crate) curr_block: u64,
    /// 当前周期号
    pub(crate) curr_cycle: u32,
    /// 尾部 LSN
    pub(crate) tail_lsn: Lsn,
    /// 最后同步到磁盘的 LSN
    pub(crate) last_sync_lsn: Lsn,
    /// 已报告过负载校验和不匹配
    pub(crate) chksum_mismatch: bool,
}

impl Xlog {
    /// 创建日志实例
    ///
    /// # 参数
    ///
    /// * `logbb_start` - 日志起始基本块地址
    /// * `logbb_size` - 日志长度（基本块）
    /// * `uuid` - 文件系统 UUID
    pub fn new(logbb_start: u64, logbb_size: u64, uuid: [u8; 16], config: XlogConfig) -> Result<Self> {
        if logbb_size < 2 {
            return Err(Error::new(ErrorKind::InvalidInput, "log too small"));
        }
        Ok(Self {
            logbb_start,
            logbb_size,
            uuid,
            config,
            prev_block: 0,
            curr_block: 0,
            curr_cycle: 1,
            tail_lsn: 0,
            last_sync_lsn: 0,
            chksum_mismatch: false,
        })
    }

    /// 由 superblock 描述的内部日志创建实例
    pub fn from_superblock(sb: &Superblock, config: XlogConfig) -> Result<Self> {
        Self::new(sb.log_start_daddr(), sb.log_bbs(), sb.uuid, config)
    }

    /// 日志长度（基本块）
    pub fn size(&self) -> u64 {
        self.logbb_size
    }

    /// 日志起始基本块地址
    pub fn start_daddr(&self) -> u64 {
        self.logbb_start
    }

    /// 最后一条记录头所在块
    pub fn prev_block(&self) -> u64 {
        self.prev_block
    }

    /// 头部块号
    pub fn curr_block(&self) -> u64 {
        self.curr_block
    }

    /// 当前周期号
    pub fn curr_cycle(&self) -> u32 {
        self.curr_cycle
    }

    /// 尾部 LSN
    pub fn tail_lsn(&self) -> Lsn {
        self.tail_lsn
    }

    /// 最后同步的 LSN
    pub fn last_sync_lsn(&self) -> Lsn {
        self.last_sync_lsn
    }

    /// 分配扫描缓冲区
    ///
    /// 对应 `xlog_get_bp`。块数为 0、超过日志长度、超过配置上限或内存不足时返回 `None`。
    pub(crate) fn get_bp(&self, nbblks: u64) -> Option<Vec<u8>> {
        if nbblks == 0 || nbblks > self.logbb_size {
            log::warn!("[LOG] invalid block length ({}) for buffer", nbblks);
            return None;
        }
        if nbblks > self.config.max_buf_bblks {
            return None;
        }
        let bytes = usize::try_from(nbblks).ok()?.checked_mul(BBSIZE)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).ok()?;
        buf.resize(bytes, 0);
        Some(buf)
    }

    /// 读取日志内的连续块
    ///
    /// 对应 `xlog_bread`，`blk` 是相对日志起点的块号，区间不得越过日志末尾。
    pub(crate) fn bread<D: BlockDevice>(
        &self,
        bdev: &mut BlockDev<D>,
        blk: u64,
        nbblks: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        if nbblks == 0 || blk + nbblks > self.logbb_size {
            log::warn!("[LOG] invalid read: blk {} count {}", blk, nbblks);
            return Err(Error::new(ErrorKind::Corrupted, "invalid log read request"));
        }
        let count = u32::try_from(nbblks)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "log read too large"))?;
        bdev.read_bbs(self.logbb_start + blk, count, buf)
    }

    /// 挂载时的记录头检查：UUID 为空或与文件系统一致
    pub(crate) fn header_check_mount(&self, head: &RecordHeader) -> Result<()> {
        if head.fs_uuid == [0u8; 16] {
            log::warn!("[LOG] null uuid in log record header");
            return Ok(());
        }
        if head.fs_uuid != self.uuid {
            log::warn!("[LOG] log has mismatched uuid, can't recover");
            return Err(Error::new(ErrorKind::Corrupted, "log has mismatched uuid"));
        }
        Ok(())
    }

    /// 恢复时的记录头检查：格式必须是原生格式且 UUID 一致
    pub(crate) fn header_check_recover(&self, head: &RecordHeader) -> Result<()> {
        if head.fmt != XLOG_FMT_LINUX_BE {
            log::warn!("[LOG] dirty log written in incompatible format ({})", head.fmt);
            return Err(Error::new(ErrorKind::Corrupted, "log written in incompatible format"));
        }
        if head.fs_uuid != self.uuid {
            log::warn!("[LOG] dirty log entry has mismatched uuid");
            return Err(Error::new(ErrorKind::Corrupted, "log has mismatched uuid"));
        }
        Ok(())
    }
}
