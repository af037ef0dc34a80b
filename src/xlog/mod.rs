//! 日志恢复模块
//!
//! 在崩溃卷的环形日志上定位活动区域并重放其中的事务。
//!
//! ## 流程
//!
//! 1. [`find_tail`]：先定位头部（下一次写入位置），再从头部向前找到最近的
//!    记录头，取出其中记录的尾部 LSN
//! 2. [`do_recovery_pass`]：从尾部到头部读取记录，解包负载，把每个操作交给
//!    [`RecoveryTable`] 组装成事务
//! 3. 已提交的事务交给调用方实现的 [`RecoverApply`]
//!
//! [`recover`] 把以上步骤串起来并执行两轮。
//!
//! ## 示例
//!
//! ```rust,ignore
//! use xfs_repair_core::xlog::{recover, Xlog, XlogConfig};
//!
//! let mut log = Xlog::from_superblock(&sb, XlogConfig::default())?;
//! let bounds = recover(&mut log, &mut bdev, &mut |trans, pass| {
//!     println!("pass {} tid {:#x}", pass, trans.tid());
//!     Ok(())
//! })?;
//! ```

pub mod assembler;
pub mod boundary;
pub mod pass;
pub mod scan;
pub mod state;
pub mod types;

#[cfg(test)]
mod testlog;

pub use assembler::{RecoverApply, RecoveredTransaction, RecoveryItem, RecoveryTable};
pub use boundary::{find_head, find_tail, find_zeroed, LogBounds, ZeroedLog};
pub use pass::{do_recovery_pass, process_data, recover};
pub use scan::{find_cycle_start, find_verify_cycle, find_verify_log_record, RecordSearch};
pub use state::{Xlog, XlogConfig};
pub use types::{
    block_lsn, cycle_lsn, make_lsn, ItemFormat, Lsn, OpFlags, OpHeader, RecordHeader,
    TransHeader,
};
