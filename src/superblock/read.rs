//! Superblock 读取、解码和地址换算

use alloc::vec;
use byteorder::{BigEndian, ByteOrder};

use crate::{
    block::{BlockDev, BlockDevice},
    consts::{BBSHIFT, BBSIZE, NULLFSINO, XFS_MAX_BLOCKSIZE, XFS_MIN_BLOCKSIZE},
    error::{Error, ErrorKind, Result},
};

/// Superblock 魔数 ("XFSB")
pub const XFS_SB_MAGIC: u32 = 0x5846_5342;

/// Superblock（只含引用到的字段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// 文件系统块大小（字节）
    pub blocksize: u32,
    /// 数据块总数
    pub dblocks: u64,
    /// 文件系统 UUID
    pub uuid: [u8; 16],
    /// 内部日志起始块（fs 块号）
    pub logstart: u64,
    /// 根目录 inode
    pub rootino: u64,
    /// 实时位图 inode
    pub rbmino: u64,
    /// 实时摘要 inode
    pub rsumino: u64,
    /// 每个 AG 的块数
    pub agblocks: u32,
    /// AG 数量
    pub agcount: u32,
    /// 日志块数
    pub logblocks: u32,
    /// inode 大小（字节）
    pub inodesize: u16,
    /// log2(blocksize)
    pub blocklog: u8,
    /// log2(每块 inode 数)
    pub inopblog: u8,
    /// log2(agblocks) 向上取整
    pub agblklog: u8,
    /// 用户配额 inode
    pub uquotino: u64,
    /// 组配额 inode
    pub gquotino: u64,
    /// 项目配额 inode
    pub pquotino: u64,
    /// log2(目录块 / fs 块)
    pub dirblklog: u8,
}

/// 从块设备读取 superblock（daddr 0）
pub fn read_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<Superblock> {
    let mut sb_buf = vec![0u8; BBSIZE];
    bdev.read_bbs(0, 1, &mut sb_buf)?;
    Superblock::decode(&sb_buf)
}

impl Superblock {
    /// 从磁盘字节解码
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 240 {
            return Err(Error::new(ErrorKind::InvalidInput, "superblock buffer too small"));
        }
        if BigEndian::read_u32(&buf[0..]) != XFS_SB_MAGIC {
            return Err(Error::new(ErrorKind::Corrupted, "bad superblock magic"));
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[32..48]);

        let sb = Self {
            blocksize: BigEndian::read_u32(&buf[4..]),
            dblocks: BigEndian::read_u64(&buf[8..]),
            uuid,
            logstart: BigEndian::read_u64(&buf[48..]),
            rootino: BigEndian::read_u64(&buf[56..]),
            rbmino: BigEndian::read_u64(&buf[64..]),
            rsumino: BigEndian::read_u64(&buf[72..]),
            agblocks: BigEndian::read_u32(&buf[84..]),
            agcount: BigEndian::read_u32(&buf[88..]),
            logblocks: BigEndian::read_u32(&buf[96..]),
            inodesize: BigEndian::read_u16(&buf[104..]),
            blocklog: buf[120],
            inopblog: buf[123],
            agblklog: buf[124],
            uquotino: BigEndian::read_u64(&buf[160..]),
            gquotino: BigEndian::read_u64(&buf[168..]),
            dirblklog: buf[192],
            pquotino: BigEndian::read_u64(&buf[232..]),
        };
        sb.validate()?;
        Ok(sb)
    }

    /// 编码到磁盘字节（只写引用到的字段）
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u32(&mut buf[0..], XFS_SB_MAGIC);
        BigEndian::write_u32(&mut buf[4..], self.blocksize);
        BigEndian::write_u64(&mut buf[8..], self.dblocks);
        buf[32..48].copy_from_slice(&self.uuid);
        BigEndian::write_u64(&mut buf[48..], self.logstart);
        BigEndian::write_u64(&mut buf[56..], self.rootino);
        BigEndian::write_u64(&mut buf[64..], self.rbmino);
        BigEndian::write_u64(&mut buf[72..], self.rsumino);
        BigEndian::write_u32(&mut buf[84..], self.agblocks);
        BigEndian::write_u32(&mut buf[88..], self.agcount);
        BigEndian::write_u32(&mut buf[96..], self.logblocks);
        BigEndian::write_u16(&mut buf[104..], self.inodesize);
        buf[120] = self.blocklog;
        buf[123] = self.inopblog;
        buf[124] = self.agblklog;
        BigEndian::write_u64(&mut buf[160..], self.uquotino);
        BigEndian::write_u64(&mut buf[168..], self.gquotino);
        buf[192] = self.dirblklog;
        BigEndian::write_u64(&mut buf[232..], self.pquotino);
    }

    fn validate(&self) -> Result<()> {
        if self.blocksize < XFS_MIN_BLOCKSIZE
            || self.blocksize > XFS_MAX_BLOCKSIZE
            || self.blocksize != 1 << self.blocklog
        {
            return Err(Error::new(ErrorKind::Corrupted, "bad superblock block size"));
        }
        if self.agcount == 0 || self.agblocks == 0 {
            return Err(Error::new(ErrorKind::Corrupted, "bad superblock AG geometry"));
        }
        if (self.blocksize as u64) << self.dirblklog > XFS_MAX_BLOCKSIZE as u64 {
            return Err(Error::new(ErrorKind::Corrupted, "bad superblock dir block size"));
        }
        Ok(())
    }

    /// 目录块大小（字节）
    pub fn dir_blocksize(&self) -> u32 {
        self.blocksize << self.dirblklog
    }

    /// fs 块号转基本块地址
    ///
    /// fs 块号高位为 AG 号（`agblklog` 位之上），低位为 AG 内块号。
    pub fn fsb_to_daddr(&self, fsb: u64) -> u64 {
        let agno = fsb >> self.agblklog;
        let agbno = fsb & ((1u64 << self.agblklog) - 1);
        (agno * self.agblocks as u64 + agbno) << (self.blocklog as u32 - BBSHIFT)
    }

    /// fs 块数转基本块数
    pub fn fsb_to_bb(&self, count: u64) -> u64 {
        count << (self.blocklog as u32 - BBSHIFT)
    }

    /// 内部日志的起始基本块地址
    pub fn log_start_daddr(&self) -> u64 {
        self.fsb_to_daddr(self.logstart)
    }

    /// 日志长度（基本块）
    pub fn log_bbs(&self) -> u64 {
        self.fsb_to_bb(self.logblocks as u64)
    }

    fn ino_agino_bits(&self) -> u32 {
        self.inopblog as u32 + self.agblklog as u32
    }

    /// inode 号所在 AG
    pub fn ino_to_agno(&self, ino: u64) -> u32 {
        (ino >> self.ino_agino_bits()) as u32
    }

    /// inode 号的 AG 内相对编号
    pub fn ino_to_agino(&self, ino: u64) -> u32 {
        (ino & ((1u64 << self.ino_agino_bits()) - 1)) as u32
    }

    /// 由 AG 号和 AG 内编号构造 inode 号
    pub fn agino_to_ino(&self, agno: u32, agino: u32) -> u64 {
        ((agno as u64) << self.ino_agino_bits()) | agino as u64
    }

    /// inode 号是否越界或不可能存在
    ///
    /// 对应 repair 的 `verify_inum`，返回 true 表示非法。
    pub fn is_bad_inum(&self, ino: u64) -> bool {
        if ino == 0 || ino == NULLFSINO {
            return true;
        }
        let agno = self.ino_to_agno(ino);
        if agno >= self.agcount {
            return true;
        }
        let agino = self.ino_to_agino(ino);
        if ino != self.agino_to_ino(agno, agino) {
            return true;
        }
        let agbno = (agino >> self.inopblog) as u64;
        if agbno == 0 {
            return true;
        }
        if agno < self.agcount - 1 {
            agbno >= self.agblocks as u64
        } else {
            agbno >= self.dblocks - agno as u64 * self.agblocks as u64
        }
    }

    /// 是否为保留的元数据 inode（实时位图/摘要、配额）
    pub fn is_reserved_inode(&self, ino: u64) -> bool {
        ino == self.rbmino
            || ino == self.rsumino
            || ino == self.uquotino
            || ino == self.gquotino
            || ino == self.pquotino
    }
}

#[cfg(test)]
pub(crate) fn test_superblock() -> Superblock {
    // 4K 块，4 个 AG，每 AG 4096 块，每块 16 个 inode
    Superblock {
        blocksize: 4096,
        dblocks: 4 * 4096,
        uuid: [0x42; 16],
        logstart: 1024,
        rootino: 128,
        rbmino: 129,
        rsumino: 130,
        agblocks: 4096,
        agcount: 4,
        logblocks: 64,
        inodesize: 256,
        blocklog: 12,
        inopblog: 4,
        agblklog: 12,
        uquotino: 131,
        gquotino: 132,
        pquotino: 0,
        dirblklog: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let sb = test_superblock();
        let mut buf = vec![0u8; BBSIZE];
        sb.encode(&mut buf);
        assert_eq!(Superblock::decode(&buf).unwrap(), sb);
    }

    #[test]
    fn test_bad_magic() {
        let buf = vec![0u8; BBSIZE];
        let err = Superblock::decode(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_fsb_to_daddr() {
        let sb = test_superblock();
        assert_eq!(sb.fsb_to_daddr(10), 80);
        // AG 1 的第 0 块
        assert_eq!(sb.fsb_to_daddr(1 << 12), 4096 * 8);
        assert_eq!(sb.log_bbs(), 64 * 8);
    }

    #[test]
    fn test_bad_inum() {
        let sb = test_superblock();
        assert!(sb.is_bad_inum(0));
        assert!(sb.is_bad_inum(NULLFSINO));
        assert!(!sb.is_bad_inum(128));
        // AG 内块号 0 不可能存放 inode
        assert!(sb.is_bad_inum(3));
        // AG 号越界
        assert!(sb.is_bad_inum(sb.agino_to_ino(4, 200)));
        assert!(!sb.is_bad_inum(sb.agino_to_ino(3, 200)));
    }

    #[test]
    fn test_reserved_inode() {
        let sb = test_superblock();
        assert!(sb.is_reserved_inode(131));
        assert!(!sb.is_reserved_inode(128));
    }
}
