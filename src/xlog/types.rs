//! 日志磁盘格式定义
//!
//! 记录头、操作头、事务头和日志项格式描述的显式编解码。
//!
//! # 重要说明
//!
//! - **所有字段都是大端序（big-endian）**，通过 `byteorder` 读写
//! - 记录负载中每个基本块的第一个字被替换为周期号，原值保存在记录头的
//!   `cycle_data` 数组中（用于检测不完整写入），见 [`pack_payload`] / [`unpack_payload`]

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};

use crate::consts::{
    btobb, BBSIZE, XFS_TRANS_HEADER_MAGIC, XLOG_CYCLE_DATA_COUNT, XLOG_FMT_LINUX_BE,
    XLOG_HEADER_MAGIC_NUM, XLOG_MAX_RECORD_BSIZE, XLOG_VERSION_1,
};
use crate::error::{Error, ErrorKind, Result};

// =============================================================================
// LSN
// =============================================================================

/// 日志序列号：高 32 位为周期号，低 32 位为块号
pub type Lsn = u64;

/// 由周期号和块号构造 LSN
#[inline]
pub const fn make_lsn(cycle: u32, block: u32) -> Lsn {
    ((cycle as u64) << 32) | block as u64
}

/// LSN 的周期号
#[inline]
pub const fn cycle_lsn(lsn: Lsn) -> u32 {
    (lsn >> 32) as u32
}

/// LSN 的块号
#[inline]
pub const fn block_lsn(lsn: Lsn) -> u32 {
    lsn as u32
}

/// 读取日志块的周期号
///
/// 记录头块的第一个字是魔数，周期号在第二个字；其余块的第一个字就是周期号。
#[inline]
pub fn get_cycle(block: &[u8]) -> u32 {
    let first = BigEndian::read_u32(block);
    if first == XLOG_HEADER_MAGIC_NUM {
        BigEndian::read_u32(&block[4..])
    } else {
        first
    }
}

/// 块是否以记录头魔数开头
#[inline]
pub fn is_record_header(block: &[u8]) -> bool {
    BigEndian::read_u32(block) == XLOG_HEADER_MAGIC_NUM
}

// =============================================================================
// Record Header
// =============================================================================

/// 记录头在磁盘上的字节数
pub const RECORD_HEADER_SIZE: usize = 320;

/// 日志记录头
///
/// 占用一个完整的基本块，之后紧跟 `btobb(len)` 个负载块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// 写入该记录时的周期号
    pub cycle: u32,
    /// 格式版本
    pub version: u32,
    /// 负载字节数
    pub len: u32,
    /// 本记录的 LSN
    pub lsn: Lsn,
    /// 写入时日志尾部的 LSN
    pub tail_lsn: Lsn,
    /// 负载 CRC32（0 表示未计算）
    pub chksum: u32,
    /// 上一条记录的块号
    pub prev_block: u32,
    /// 负载中的操作数
    pub num_logops: u32,
    /// 负载各基本块被替换掉的第一个字
    pub cycle_data: [u32; XLOG_CYCLE_DATA_COUNT],
    /// 写入方格式标识
    pub fmt: u32,
    /// 文件系统 UUID
    pub fs_uuid: [u8; 16],
}

impl RecordHeader {
    /// 创建新记录头（负载与周期数组稍后由 [`pack_payload`] 填充）
    pub fn new(cycle: u32, block: u32, tail_lsn: Lsn, fs_uuid: [u8; 16]) -> Self {
        Self {
            cycle,
            version: XLOG_VERSION_1,
            len: 0,
            lsn: make_lsn(cycle, block),
            tail_lsn,
            chksum: 0,
            prev_block: 0,
            num_logops: 0,
            cycle_data: [0; XLOG_CYCLE_DATA_COUNT],
            fmt: XLOG_FMT_LINUX_BE,
            fs_uuid,
        }
    }

    /// 从磁盘字节解码（不检查魔数，见 [`RecordHeader::decode_checked`]）
    pub fn decode(buf: &[u8]) -> Self {
        let mut cycle_data = [0u32; XLOG_CYCLE_DATA_COUNT];
        BigEndian::read_u32_into(&buf[44..44 + XLOG_CYCLE_DATA_COUNT * 4], &mut cycle_data);
        let mut fs_uuid = [0u8; 16];
        fs_uuid.copy_from_slice(&buf[304..320]);

        Self {
            cycle: BigEndian::read_u32(&buf[4..]),
            version: BigEndian::read_u32(&buf[8..]),
            len: BigEndian::read_u32(&buf[12..]),
            lsn: BigEndian::read_u64(&buf[16..]),
            tail_lsn: BigEndian::read_u64(&buf[24..]),
            chksum: BigEndian::read_u32(&buf[32..]),
            prev_block: BigEndian::read_u32(&buf[36..]),
            num_logops: BigEndian::read_u32(&buf[40..]),
            cycle_data,
            fmt: BigEndian::read_u32(&buf[300..]),
            fs_uuid,
        }
    }

    /// 解码并检查魔数和负载长度
    pub fn decode_checked(buf: &[u8]) -> Result<Self> {
        if !is_record_header(buf) {
            return Err(Error::new(ErrorKind::Corrupted, "bad log record header magic"));
        }
        let head = Self::decode(buf);
        if head.len as u64 > XLOG_MAX_RECORD_BSIZE {
            return Err(Error::new(ErrorKind::Corrupted, "log record length too large"));
        }
        Ok(head)
    }

    /// 编码到磁盘字节（整块清零后写入）
    pub fn encode(&self, buf: &mut [u8]) {
        buf[..BBSIZE].fill(0);
        BigEndian::write_u32(&mut buf[0..], XLOG_HEADER_MAGIC_NUM);
        BigEndian::write_u32(&mut buf[4..], self.cycle);
        BigEndian::write_u32(&mut buf[8..], self.version);
        BigEndian::write_u32(&mut buf[12..], self.len);
        BigEndian::write_u64(&mut buf[16..], self.lsn);
        BigEndian::write_u64(&mut buf[24..], self.tail_lsn);
        BigEndian::write_u32(&mut buf[32..], self.chksum);
        BigEndian::write_u32(&mut buf[36..], self.prev_block);
        BigEndian::write_u32(&mut buf[40..], self.num_logops);
        BigEndian::write_u32_into(
            &self.cycle_data,
            &mut buf[44..44 + XLOG_CYCLE_DATA_COUNT * 4],
        );
        BigEndian::write_u32(&mut buf[300..], self.fmt);
        buf[304..320].copy_from_slice(&self.fs_uuid);
    }

    /// 负载占用的基本块数
    pub fn bblks(&self) -> u64 {
        btobb(self.len as u64)
    }
}

/// 打包负载：保存每个基本块的第一个字到 `cycle_data`，并写入周期号
///
/// 同时设置 `len` 和负载校验和。`payload` 长度必须是基本块的整数倍。
pub fn pack_payload(head: &mut RecordHeader, payload: &mut [u8], len: u32) {
    head.len = len;
    head.chksum = crate::crc::record_checksum(&payload[..len as usize]);
    for i in 0..head.bblks() as usize {
        let word = &mut payload[i * BBSIZE..i * BBSIZE + 4];
        head.cycle_data[i] = BigEndian::read_u32(word);
        BigEndian::write_u32(word, head.cycle);
    }
}

/// 解包负载：把 `cycle_data` 中保存的原值写回每个基本块的第一个字
pub fn unpack_payload(head: &RecordHeader, payload: &mut [u8]) {
    for i in 0..head.bblks() as usize {
        BigEndian::write_u32(&mut payload[i * BBSIZE..], head.cycle_data[i]);
    }
}

// =============================================================================
// Operation Header
// =============================================================================

/// 操作头字节数
pub const OP_HEADER_SIZE: usize = 12;

bitflags! {
    /// 操作头标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u8 {
        /// 事务开始
        const START    = 0x01;
        /// 事务提交
        const COMMIT   = 0x02;
        /// 区域在下一个操作中继续
        const CONTINUE = 0x04;
        /// 本操作是上一个区域的延续
        const WAS_CONT = 0x08;
        /// 记录中该事务的最后一个操作
        const END      = 0x10;
        /// 卸载记录
        const UNMOUNT  = 0x20;
    }
}

/// 操作头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpHeader {
    /// 事务 ID
    pub tid: u32,
    /// 紧随其后的区域字节数
    pub len: u32,
    /// 客户端 ID
    pub clientid: u8,
    /// 标志
    pub flags: OpFlags,
}

impl OpHeader {
    /// 从磁盘字节解码（未知标志位保留）
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            tid: BigEndian::read_u32(&buf[0..]),
            len: BigEndian::read_u32(&buf[4..]),
            clientid: buf[8],
            flags: OpFlags::from_bits_retain(buf[9]),
        }
    }

    /// 编码到磁盘字节
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(&mut buf[0..], self.tid);
        BigEndian::write_u32(&mut buf[4..], self.len);
        buf[8] = self.clientid;
        buf[9] = self.flags.bits();
        buf[10] = 0;
        buf[11] = 0;
    }
}

// =============================================================================
// Transaction Header / Item Format
// =============================================================================

/// 事务头字节数
pub const TRANS_HEADER_SIZE: usize = 16;

/// 事务头（每个恢复事务的第一个区域）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransHeader {
    /// 魔数
    pub magic: u32,
    /// 事务类型
    pub trans_type: u32,
    /// 事务 ID
    pub tid: u32,
    /// 日志项数
    pub num_items: u32,
}

impl TransHeader {
    /// 创建事务头
    pub fn new(trans_type: u32, tid: u32, num_items: u32) -> Self {
        Self {
            magic: XFS_TRANS_HEADER_MAGIC,
            trans_type,
            tid,
            num_items,
        }
    }

    /// 从磁盘字节解码
    pub fn decode(buf: &[u8; TRANS_HEADER_SIZE]) -> Self {
        Self {
            magic: BigEndian::read_u32(&buf[0..]),
            trans_type: BigEndian::read_u32(&buf[4..]),
            tid: BigEndian::read_u32(&buf[8..]),
            num_items: BigEndian::read_u32(&buf[12..]),
        }
    }

    /// 编码为磁盘字节
    pub fn encode(&self) -> [u8; TRANS_HEADER_SIZE] {
        let mut buf = [0u8; TRANS_HEADER_SIZE];
        BigEndian::write_u32(&mut buf[0..], self.magic);
        BigEndian::write_u32(&mut buf[4..], self.trans_type);
        BigEndian::write_u32(&mut buf[8..], self.tid);
        BigEndian::write_u32(&mut buf[12..], self.num_items);
        buf
    }
}

/// 日志项格式描述的公共前缀
///
/// 所有日志项格式结构的前 32 位都是 (类型, 区域总数)，因此只要区域至少有
/// 4 个字节就能得知该项共有多少个区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFormat {
    /// 日志项类型
    pub item_type: u16,
    /// 该项的区域总数（包括格式描述本身）
    pub size: u16,
}

impl ItemFormat {
    /// 从区域开头解码，不足 4 字节时返回 `None`
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 {
            return None;
        }
        Some(Self {
            item_type: BigEndian::read_u16(&buf[0..]),
            size: BigEndian::read_u16(&buf[2..]),
        })
    }

    /// 编码到区域开头
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u16(&mut buf[0..], self.item_type);
        BigEndian::write_u16(&mut buf[2..], self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_lsn_parts() {
        let lsn = make_lsn(7, 1234);
        assert_eq!(cycle_lsn(lsn), 7);
        assert_eq!(block_lsn(lsn), 1234);
    }

    #[test]
    fn test_get_cycle_header_and_data() {
        let mut blk = vec![0u8; BBSIZE];
        let head = RecordHeader::new(5, 10, make_lsn(5, 0), [1; 16]);
        head.encode(&mut blk);
        assert!(is_record_header(&blk));
        assert_eq!(get_cycle(&blk), 5);

        let mut data = vec![0u8; BBSIZE];
        BigEndian::write_u32(&mut data, 9);
        assert!(!is_record_header(&data));
        assert_eq!(get_cycle(&data), 9);
    }

    #[test]
    fn test_record_header_codec() {
        let mut head = RecordHeader::new(3, 40, make_lsn(2, 100), [0xAA; 16]);
        head.num_logops = 4;
        head.cycle_data[63] = 0xdead_beef;
        let mut blk = vec![0u8; BBSIZE];
        head.encode(&mut blk);
        assert_eq!(RecordHeader::decode_checked(&blk).unwrap(), head);
    }

    #[test]
    fn test_record_header_rejects_bad_magic_and_len() {
        let blk = vec![0u8; BBSIZE];
        assert!(RecordHeader::decode_checked(&blk).is_err());

        let mut head = RecordHeader::new(1, 0, 0, [0; 16]);
        head.len = (XLOG_MAX_RECORD_BSIZE + 1) as u32;
        let mut blk = vec![0u8; BBSIZE];
        head.encode(&mut blk);
        let err = RecordHeader::decode_checked(&blk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_pack_unpack_restores_payload() {
        let mut payload = vec![0u8; 2 * BBSIZE];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let original = payload.clone();

        let mut head = RecordHeader::new(6, 0, 0, [0; 16]);
        pack_payload(&mut head, &mut payload, 2 * BBSIZE as u32 - 8);
        assert_eq!(head.bblks(), 2);
        assert_eq!(get_cycle(&payload[BBSIZE..]), 6);
        assert_ne!(head.chksum, 0);

        unpack_payload(&head, &mut payload);
        assert_eq!(payload, original);
    }

    #[test]
    fn test_op_header_keeps_unknown_flags() {
        let mut buf = [0u8; OP_HEADER_SIZE];
        buf[9] = 0x80 | OpFlags::COMMIT.bits();
        let op = OpHeader::decode(&buf);
        assert!(op.flags.contains(OpFlags::COMMIT));
        assert_eq!(op.flags.bits(), 0x82);
    }

    #[test]
    fn test_trans_header_and_format() {
        let th = TransHeader::new(1, 77, 2);
        assert_eq!(TransHeader::decode(&th.encode()), th);

        let mut region = [0u8; 8];
        ItemFormat { item_type: 0x123b, size: 3 }.encode(&mut region);
        assert_eq!(ItemFormat::decode(&region).unwrap().size, 3);
        assert!(ItemFormat::decode(&region[..2]).is_none());
    }
}
