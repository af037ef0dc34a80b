//! 测试用合成日志

use alloc::vec;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};

use crate::block::BlockDev;
use crate::consts::{btobb, BBSIZE, XFS_TRANSACTION};
use crate::test_util::MemDevice;

use super::state::{Xlog, XlogConfig};
use super::types::{make_lsn, pack_payload, Lsn, OpFlags, OpHeader, RecordHeader, OP_HEADER_SIZE};

/// 从块 0 开始、占满整个内存设备的日志
pub struct TestLog {
    pub dev: MemDevice,
    pub nbbs: u64,
    pub uuid: [u8; 16],
}

/// 一个操作：(tid, 标志, 区域数据)
pub type TestOp<'a> = (u32, OpFlags, &'a [u8]);

impl TestLog {
    pub fn new(nbbs: u64) -> Self {
        Self {
            dev: MemDevice::new(nbbs as usize),
            nbbs,
            uuid: [0x42; 16],
        }
    }

    pub fn open(self) -> (Xlog, BlockDev<MemDevice>) {
        let log = Xlog::new(0, self.nbbs, self.uuid, XlogConfig::default()).unwrap();
        (log, BlockDev::new(self.dev).unwrap())
    }

    pub fn into_device(self) -> MemDevice {
        self.dev
    }

    /// 把 `[from, to)` 的块清零并写入周期号
    pub fn stamp_range(&mut self, from: u64, to: u64, cycle: u32) {
        for blk in from..to {
            let bb = self.dev.bytes_mut(blk, BBSIZE);
            bb.fill(0);
            BigEndian::write_u32(bb, cycle);
        }
    }

    /// 写一个负载全零的记录（用于边界扫描测试）
    pub fn write_raw_record(&mut self, blk: u64, cycle: u32, payload_bbs: u64) {
        let mut head = RecordHeader::new(cycle, blk as u32, make_lsn(cycle, 0), self.uuid);
        let mut payload = vec![0u8; payload_bbs as usize * BBSIZE];
        pack_payload(&mut head, &mut payload, (payload_bbs as usize * BBSIZE) as u32);
        self.put_record(blk, &head, &payload);
    }

    /// 写一个由操作组成的记录，负载可跨越日志物理末尾
    ///
    /// 返回记录之后的下一个块号（已回绕）。
    pub fn write_record(&mut self, blk: u64, cycle: u32, tail_lsn: Lsn, ops: &[TestOp<'_>]) -> u64 {
        let mut bytes = Vec::new();
        for (tid, flags, data) in ops {
            let mut oh = [0u8; OP_HEADER_SIZE];
            OpHeader {
                tid: *tid,
                len: data.len() as u32,
                clientid: XFS_TRANSACTION,
                flags: *flags,
            }
            .encode(&mut oh);
            bytes.extend_from_slice(&oh);
            bytes.extend_from_slice(data);
        }
        let len = bytes.len() as u32;
        let bblks = btobb(len as u64);
        bytes.resize(bblks as usize * BBSIZE, 0);

        let mut head = RecordHeader::new(cycle, blk as u32, tail_lsn, self.uuid);
        head.num_logops = ops.len() as u32;
        pack_payload(&mut head, &mut bytes, len);
        self.put_record(blk, &head, &bytes);
        (blk + 1 + bblks) % self.nbbs
    }

    fn put_record(&mut self, blk: u64, head: &RecordHeader, payload: &[u8]) {
        head.encode(self.dev.bytes_mut(blk, BBSIZE));
        for (i, chunk) in payload.chunks(BBSIZE).enumerate() {
            let pos = (blk + 1 + i as u64) % self.nbbs;
            self.dev.bytes_mut(pos, BBSIZE).copy_from_slice(chunk);
        }
    }
}
