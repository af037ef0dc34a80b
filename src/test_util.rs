//! 测试用内存设备

use alloc::vec;
use alloc::vec::Vec;

use crate::block::BlockDevice;
use crate::consts::BBSIZE;
use crate::error::{Error, ErrorKind, Result};

/// 512 字节扇区的内存块设备
pub struct MemDevice {
    data: Vec<u8>,
}

impl MemDevice {
    pub fn new(nbbs: usize) -> Self {
        Self {
            data: vec![0u8; nbbs * BBSIZE],
        }
    }

    pub fn bb(&self, daddr: u64) -> &[u8] {
        let off = daddr as usize * BBSIZE;
        &self.data[off..off + BBSIZE]
    }

    pub fn bytes_mut(&mut self, daddr: u64, len: usize) -> &mut [u8] {
        let off = daddr as usize * BBSIZE;
        &mut self.data[off..off + len]
    }
}

impl BlockDevice for MemDevice {
    fn sector_size(&self) -> u32 {
        BBSIZE as u32
    }

    fn total_blocks(&self) -> u64 {
        (self.data.len() / BBSIZE) as u64
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let start = lba as usize * BBSIZE;
        let len = count as usize * BBSIZE;
        if start + len > self.data.len() {
            return Err(Error::new(ErrorKind::Io, "read out of range"));
        }
        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        let start = lba as usize * BBSIZE;
        let len = count as usize * BBSIZE;
        if start + len > self.data.len() {
            return Err(Error::new(ErrorKind::Io, "write out of range"));
        }
        self.data[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }
}
