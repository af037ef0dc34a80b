//! XFS 磁盘格式常量定义
//!
//! 这个模块包含了日志恢复与目录修复用到的常量，包括：
//! - 基本块（basic block）相关常量
//! - 日志记录/操作头常量
//! - 目录 v2 格式常量
//!
//! 所有多字节磁盘字段均为大端序。

//=============================================================================
// 基本块
//=============================================================================

/// 基本块移位（512 字节）
pub const BBSHIFT: u32 = 9;

/// 基本块大小（字节）
pub const BBSIZE: usize = 1 << BBSHIFT;

/// 字节数向上取整为基本块数
#[inline]
pub const fn btobb(bytes: u64) -> u64 {
    (bytes + BBSIZE as u64 - 1) >> BBSHIFT
}

/// 基本块数转字节数
#[inline]
pub const fn bbtob(bblks: u64) -> u64 {
    bblks << BBSHIFT
}

/// 最小块大小（512 字节）
pub const XFS_MIN_BLOCKSIZE: u32 = 512;

/// 最大块大小（64K）
pub const XFS_MAX_BLOCKSIZE: u32 = 64 * 1024;

/// 空 inode 号（未知）
pub const NULLFSINO: u64 = u64::MAX;

//=============================================================================
// 日志
//=============================================================================

/// 日志记录头魔数
pub const XLOG_HEADER_MAGIC_NUM: u32 = 0xFEED_BABE;

/// 日志记录头版本
pub const XLOG_VERSION_1: u32 = 1;

/// 日志格式：Linux 大端（本 crate 写出的原生格式）
pub const XLOG_FMT_LINUX_BE: u32 = 2;

/// 单个日志记录最大字节数
pub const XLOG_MAX_RECORD_BSIZE: u64 = 32 * 1024;

/// 单个日志记录最大字节数的移位
pub const XLOG_MAX_RECORD_BSHIFT: u32 = 15;

/// 同时在途的内存日志记录（iclog）最大数
pub const XLOG_MAX_ICLOGS: u64 = 8;

/// 记录头中每扇区周期数组覆盖的字节数
pub const XLOG_HEADER_CYCLE_SIZE: usize = 32 * 1024;

/// 记录头周期数组长度（每个基本块一项）
pub const XLOG_CYCLE_DATA_COUNT: usize = XLOG_HEADER_CYCLE_SIZE / BBSIZE;

/// 单个恢复项允许的最大区域数
pub const XLOG_MAX_REGIONS_IN_ITEM: usize = (XFS_MAX_BLOCKSIZE as usize / 128) / 2 + 1;

/// 事务头魔数 ("TRAN")
pub const XFS_TRANS_HEADER_MAGIC: u32 = 0x5452_414E;

/// 事务客户端 ID
pub const XFS_TRANSACTION: u8 = 0x69;

/// 日志客户端 ID
pub const XFS_LOG: u8 = 0xaa;

//=============================================================================
// 目录 v2
//=============================================================================

/// 数据块魔数 ("XD2D")
pub const XFS_DIR2_DATA_MAGIC: u32 = 0x5844_3244;

/// 单块目录魔数 ("XD2B")
pub const XFS_DIR2_BLOCK_MAGIC: u32 = 0x5844_3242;

/// 单叶子块魔数
pub const XFS_DIR2_LEAF1_MAGIC: u16 = 0xd2f1;

/// 节点形式叶子块魔数
pub const XFS_DIR2_LEAFN_MAGIC: u16 = 0xd2ff;

/// 哈希索引内部节点魔数
pub const XFS_DA_NODE_MAGIC: u16 = 0xfebe;

/// 索引树最大深度
pub const XFS_DA_NODE_MAXDEPTH: usize = 5;

/// 空闲区标记
pub const XFS_DIR2_DATA_FREE_TAG: u16 = 0xffff;

/// 目录项对齐（字节）
pub const XFS_DIR2_DATA_ALIGN: usize = 8;

/// best-free 表项数
pub const XFS_DIR2_DATA_FD_COUNT: usize = 3;

/// 空数据指针（叶子中的陈旧项）
pub const XFS_DIR2_NULL_DATAPTR: u32 = 0;

/// 叶子区在目录地址空间中的字节偏移（32G）
pub const XFS_DIR2_LEAF_OFFSET: u64 = 1 << 35;

/// 空闲索引区在目录地址空间中的字节偏移（64G）
pub const XFS_DIR2_FREE_OFFSET: u64 = 2 << 35;

/// 短格式能用 4 字节表示的最大 inode 号
pub const XFS_DIR2_MAX_SHORT_INUM: u64 = 0xffff_ffff;

/// 已被清除的目录项名字首字节标记
pub const DIR_ENTRY_CLEARED: u8 = b'/';

/// 数据块头大小（magic + bestfree[3]）
pub const XFS_DIR2_DATA_HDR_SIZE: usize = 4 + XFS_DIR2_DATA_FD_COUNT * 4;

/// 目录数据项大小（8 字节对齐）
#[inline]
pub const fn dir2_data_entsize(namelen: usize) -> usize {
    (8 + 1 + namelen + 2 + XFS_DIR2_DATA_ALIGN - 1) & !(XFS_DIR2_DATA_ALIGN - 1)
}

/// 数据块中第一个普通项的偏移（跳过 "." 与 ".."）
pub const XFS_DIR2_DATA_FIRST_OFFSET: usize =
    XFS_DIR2_DATA_HDR_SIZE + dir2_data_entsize(1) + dir2_data_entsize(2);
