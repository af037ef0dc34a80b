//! 目录 v2 磁盘格式
//!
//! 短格式、数据块、单块目录尾部、叶子块和索引节点块的显式编解码。
//!
//! # 重要说明
//!
//! - **所有字段都是大端序（big-endian）**，通过 `byteorder` 读写
//! - 数据块中的目录项和空闲区都以 8 字节对齐，末尾 2 字节是指向自身起点的 tag

use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};

use crate::consts::{
    dir2_data_entsize, XFS_DIR2_DATA_FD_COUNT, XFS_DIR2_DATA_FREE_TAG, XFS_DIR2_DATA_HDR_SIZE,
};

// =============================================================================
// 短格式
// =============================================================================

/// 短格式中 inode 号的字节数
#[inline]
pub const fn sf_inumber_size(i8count: u8) -> usize {
    if i8count != 0 {
        8
    } else {
        4
    }
}

/// 短格式头大小
#[inline]
pub const fn sf_hdr_size(i8count: u8) -> usize {
    2 + sf_inumber_size(i8count)
}

/// 短格式目录项大小（namelen + offset + name + inumber）
#[inline]
pub const fn sf_entsize(i8count: u8, namelen: usize) -> usize {
    1 + 2 + namelen + sf_inumber_size(i8count)
}

/// 按宽度读取 inode 号
pub fn sf_get_inumber(buf: &[u8], i8count: u8) -> u64 {
    if i8count != 0 {
        BigEndian::read_u64(buf)
    } else {
        BigEndian::read_u32(buf) as u64
    }
}

/// 按宽度写入 inode 号（4 字节时截断）
pub fn sf_put_inumber(buf: &mut [u8], i8count: u8, ino: u64) {
    if i8count != 0 {
        BigEndian::write_u64(buf, ino);
    } else {
        BigEndian::write_u32(buf, ino as u32);
    }
}

/// 短格式头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfHdr {
    /// 目录项数
    pub count: u8,
    /// 需要 8 字节表示的 inode 号个数（非 0 时全部使用 8 字节）
    pub i8count: u8,
    /// 父目录 inode 号
    pub parent: u64,
}

impl SfHdr {
    /// 从数据分支开头解码，空间不足时返回 `None`
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        let i8count = buf[1];
        if buf.len() < sf_hdr_size(i8count) {
            return None;
        }
        Some(Self {
            count: buf[0],
            i8count,
            parent: sf_get_inumber(&buf[2..], i8count),
        })
    }

    /// 编码到数据分支开头
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.count;
        buf[1] = self.i8count;
        sf_put_inumber(&mut buf[2..], self.i8count, self.parent);
    }
}

/// 短格式目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfEntry {
    /// 在等价的块格式目录中的偏移
    pub offset: u16,
    /// 名字
    pub name: Vec<u8>,
    /// 目标 inode 号
    pub inumber: u64,
}

impl SfEntry {
    /// 从目录项起点解码，越过 `buf` 末尾时返回 `None`
    pub fn decode(buf: &[u8], i8count: u8) -> Option<Self> {
        let namelen = *buf.first()? as usize;
        if buf.len() < sf_entsize(i8count, namelen) {
            return None;
        }
        Some(Self {
            offset: BigEndian::read_u16(&buf[1..]),
            name: buf[3..3 + namelen].to_vec(),
            inumber: sf_get_inumber(&buf[3 + namelen..], i8count),
        })
    }

    /// 编码到目录项起点
    pub fn encode(&self, buf: &mut [u8], i8count: u8) {
        let namelen = self.name.len();
        buf[0] = namelen as u8;
        BigEndian::write_u16(&mut buf[1..], self.offset);
        buf[3..3 + namelen].copy_from_slice(&self.name);
        sf_put_inumber(&mut buf[3 + namelen..], i8count, self.inumber);
    }

    /// 编码后的大小
    pub fn entsize(&self, i8count: u8) -> usize {
        sf_entsize(i8count, self.name.len())
    }
}

/// 读取目录项中的偏移字段
pub fn sf_entry_offset(entry: &[u8]) -> u16 {
    BigEndian::read_u16(&entry[1..])
}

/// 改写目录项中的偏移字段
pub fn sf_entry_put_offset(entry: &mut [u8], offset: u16) {
    BigEndian::write_u16(&mut entry[1..], offset);
}

// =============================================================================
// 数据块
// =============================================================================

/// best-free 表项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFree {
    /// 空闲区起点（块内字节偏移）
    pub offset: u16,
    /// 空闲区长度
    pub length: u16,
}

/// 数据块头（单块目录与普通数据块共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHdr {
    /// 魔数
    pub magic: u32,
    /// 最大的三个空闲区，按长度非递增
    pub bestfree: [DataFree; XFS_DIR2_DATA_FD_COUNT],
}

impl DataHdr {
    /// 解码
    pub fn decode(buf: &[u8]) -> Self {
        let mut bestfree = [DataFree::default(); XFS_DIR2_DATA_FD_COUNT];
        for (i, bf) in bestfree.iter_mut().enumerate() {
            let off = 4 + i * 4;
            bf.offset = BigEndian::read_u16(&buf[off..]);
            bf.length = BigEndian::read_u16(&buf[off + 2..]);
        }
        Self {
            magic: BigEndian::read_u32(buf),
            bestfree,
        }
    }

    /// 编码
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(buf, self.magic);
        self.encode_bestfree(buf);
    }

    /// 只写回 best-free 表
    pub fn encode_bestfree(&self, buf: &mut [u8]) {
        for (i, bf) in self.bestfree.iter().enumerate() {
            let off = 4 + i * 4;
            BigEndian::write_u16(&mut buf[off..], bf.offset);
            BigEndian::write_u16(&mut buf[off + 2..], bf.length);
        }
    }
}

/// `pos` 处是否是空闲区（freetag 标记）
#[inline]
pub fn is_data_unused(buf: &[u8], pos: usize) -> bool {
    BigEndian::read_u16(&buf[pos..]) == XFS_DIR2_DATA_FREE_TAG
}

/// 空闲区长度
#[inline]
pub fn data_unused_length(buf: &[u8], pos: usize) -> usize {
    BigEndian::read_u16(&buf[pos + 2..]) as usize
}

/// 写入一个空闲区（freetag、长度和尾部 tag）
pub fn put_data_unused(buf: &mut [u8], pos: usize, length: usize) {
    BigEndian::write_u16(&mut buf[pos..], XFS_DIR2_DATA_FREE_TAG);
    BigEndian::write_u16(&mut buf[pos + 2..], length as u16);
    BigEndian::write_u16(&mut buf[pos + length - 2..], pos as u16);
}

/// 读取长度为 `len` 的项末尾的 tag
#[inline]
pub fn data_tag(buf: &[u8], pos: usize, len: usize) -> usize {
    BigEndian::read_u16(&buf[pos + len - 2..]) as usize
}

/// 数据块目录项
///
/// 布局：inumber(8) namelen(1) name(namelen) pad tag(2)，总长 8 字节对齐。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    /// 目标 inode 号
    pub inumber: u64,
    /// 名字
    pub name: Vec<u8>,
}

impl DataEntry {
    /// 名字长度在块内的字节偏移
    pub const NAMELEN_OFF: usize = 8;
    /// 名字在块内的字节偏移
    pub const NAME_OFF: usize = 9;

    /// 创建目录项
    pub fn new(inumber: u64, name: &[u8]) -> Self {
        Self {
            inumber,
            name: name.to_vec(),
        }
    }

    /// 从块内 `pos` 解码
    pub fn decode(buf: &[u8], pos: usize) -> Self {
        let namelen = buf[pos + Self::NAMELEN_OFF] as usize;
        let start = pos + Self::NAME_OFF;
        let end = (start + namelen).min(buf.len());
        Self {
            inumber: BigEndian::read_u64(&buf[pos..]),
            name: buf[start..end].to_vec(),
        }
    }

    /// 编码到块内 `pos`（包括尾部 tag），返回项大小
    pub fn encode(&self, buf: &mut [u8], pos: usize) -> usize {
        let size = self.entsize();
        buf[pos..pos + size].fill(0);
        BigEndian::write_u64(&mut buf[pos..], self.inumber);
        buf[pos + Self::NAMELEN_OFF] = self.name.len() as u8;
        buf[pos + Self::NAME_OFF..pos + Self::NAME_OFF + self.name.len()].copy_from_slice(&self.name);
        BigEndian::write_u16(&mut buf[pos + size - 2..], pos as u16);
        size
    }

    /// 项大小
    pub fn entsize(&self) -> usize {
        dir2_data_entsize(self.name.len())
    }

    /// 是否是 "."
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    /// 是否是 ".."
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// 改写块内目录项的 inode 号
pub fn data_entry_put_inumber(buf: &mut [u8], pos: usize, ino: u64) {
    BigEndian::write_u64(&mut buf[pos..], ino);
}

/// 读取块内目录项的名字长度
#[inline]
pub fn data_entry_namelen(buf: &[u8], pos: usize) -> usize {
    buf[pos + DataEntry::NAMELEN_OFF] as usize
}

/// 数据区第一个项的偏移
pub const DATA_ENTRY_START: usize = XFS_DIR2_DATA_HDR_SIZE;

// =============================================================================
// 单块目录尾部 / 叶子项
// =============================================================================

/// 单块目录尾部大小
pub const BLOCK_TAIL_SIZE: usize = 8;

/// 叶子项大小
pub const LEAF_ENTRY_SIZE: usize = 8;

/// 单块目录尾部（位于块末尾）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTail {
    /// 叶子项数
    pub count: u32,
    /// 陈旧叶子项数
    pub stale: u32,
}

impl BlockTail {
    /// 从目录块末尾解码
    pub fn decode(block: &[u8]) -> Self {
        let off = block.len() - BLOCK_TAIL_SIZE;
        Self {
            count: BigEndian::read_u32(&block[off..]),
            stale: BigEndian::read_u32(&block[off + 4..]),
        }
    }

    /// 编码到目录块末尾
    pub fn encode(&self, block: &mut [u8]) {
        let off = block.len() - BLOCK_TAIL_SIZE;
        BigEndian::write_u32(&mut block[off..], self.count);
        BigEndian::write_u32(&mut block[off + 4..], self.stale);
    }

    /// 叶子项起点；项数超出块大小时返回 `None`
    pub fn leaf_start(&self, blksize: usize) -> Option<usize> {
        let tail = blksize.checked_sub(BLOCK_TAIL_SIZE)?;
        let ents = (self.count as usize).checked_mul(LEAF_ENTRY_SIZE)?;
        tail.checked_sub(ents)
    }
}

/// 叶子项（哈希 + 数据地址）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    /// 名字哈希
    pub hashval: u32,
    /// 数据地址（8 字节为单位），0 表示陈旧项
    pub address: u32,
}

impl LeafEntry {
    /// 从 `pos` 解码
    pub fn decode(buf: &[u8], pos: usize) -> Self {
        Self {
            hashval: BigEndian::read_u32(&buf[pos..]),
            address: BigEndian::read_u32(&buf[pos + 4..]),
        }
    }

    /// 编码到 `pos`
    pub fn encode(&self, buf: &mut [u8], pos: usize) {
        BigEndian::write_u32(&mut buf[pos..], self.hashval);
        BigEndian::write_u32(&mut buf[pos + 4..], self.address);
    }
}

// =============================================================================
// 叶子块 / 索引节点块
// =============================================================================

/// 兄弟链表头 + 魔数（叶子块和节点块共用前 12 字节）
pub const DA_BLKINFO_SIZE: usize = 12;

/// 叶子块和节点块头大小
pub const DA_HDR_SIZE: usize = 16;

/// 叶子块头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafHdr {
    /// 后继块
    pub forw: u32,
    /// 前驱块
    pub back: u32,
    /// 魔数
    pub magic: u16,
    /// 项数
    pub count: u16,
    /// 陈旧项数
    pub stale: u16,
}

impl LeafHdr {
    /// 解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            forw: BigEndian::read_u32(&buf[0..]),
            back: BigEndian::read_u32(&buf[4..]),
            magic: BigEndian::read_u16(&buf[8..]),
            count: BigEndian::read_u16(&buf[12..]),
            stale: BigEndian::read_u16(&buf[14..]),
        }
    }

    /// 编码
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(&mut buf[0..], self.forw);
        BigEndian::write_u32(&mut buf[4..], self.back);
        BigEndian::write_u16(&mut buf[8..], self.magic);
        BigEndian::write_u16(&mut buf[10..], 0);
        BigEndian::write_u16(&mut buf[12..], self.count);
        BigEndian::write_u16(&mut buf[14..], self.stale);
    }
}

/// 叶子块第 `i` 项的偏移
#[inline]
pub const fn leaf_entry_pos(i: usize) -> usize {
    DA_HDR_SIZE + i * LEAF_ENTRY_SIZE
}

/// 索引节点块头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHdr {
    /// 同层后继块
    pub forw: u32,
    /// 同层前驱块
    pub back: u32,
    /// 魔数
    pub magic: u16,
    /// 项数
    pub count: u16,
    /// 层号（叶子之上第一层为 1）
    pub level: u16,
}

impl NodeHdr {
    /// 解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            forw: BigEndian::read_u32(&buf[0..]),
            back: BigEndian::read_u32(&buf[4..]),
            magic: BigEndian::read_u16(&buf[8..]),
            count: BigEndian::read_u16(&buf[12..]),
            level: BigEndian::read_u16(&buf[14..]),
        }
    }

    /// 编码
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(&mut buf[0..], self.forw);
        BigEndian::write_u32(&mut buf[4..], self.back);
        BigEndian::write_u16(&mut buf[8..], self.magic);
        BigEndian::write_u16(&mut buf[10..], 0);
        BigEndian::write_u16(&mut buf[12..], self.count);
        BigEndian::write_u16(&mut buf[14..], self.level);
    }
}

/// 索引节点项：子块中最大的哈希值和子块号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    /// 子块中最大的哈希值
    pub hashval: u32,
    /// 子块号（目录逻辑块）
    pub before: u32,
}

impl NodeEntry {
    /// 读取第 `i` 项
    pub fn decode(buf: &[u8], i: usize) -> Self {
        let pos = DA_HDR_SIZE + i * 8;
        Self {
            hashval: BigEndian::read_u32(&buf[pos..]),
            before: BigEndian::read_u32(&buf[pos + 4..]),
        }
    }

    /// 写入第 `i` 项
    pub fn encode(&self, buf: &mut [u8], i: usize) {
        let pos = DA_HDR_SIZE + i * 8;
        BigEndian::write_u32(&mut buf[pos..], self.hashval);
        BigEndian::write_u32(&mut buf[pos + 4..], self.before);
    }

    /// 只改写第 `i` 项的哈希值
    pub fn put_hashval(buf: &mut [u8], i: usize, hashval: u32) {
        BigEndian::write_u32(&mut buf[DA_HDR_SIZE + i * 8..], hashval);
    }
}

/// 名字是否含非法字符（'/' 或 NUL）
pub fn namecheck(name: &[u8]) -> bool {
    name.iter().any(|&c| c == b'/' || c == 0)
}
