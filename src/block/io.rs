//! 基本块 I/O 操作实现

use alloc::vec;
use alloc::vec::Vec;

use super::{BlockDev, BlockDevice, Buf, BufMap, BufOps, BufStatus};
use crate::consts::BBSIZE;
use crate::error::{Error, ErrorKind, Result};

impl<D: BlockDevice> BlockDev<D> {
    /// 读取连续基本块
    ///
    /// 如果启用了缓存，缓存中的块（包括尚未写回的脏块）优先于磁盘内容；
    /// 未命中的块从设备读取并填充缓存。
    ///
    /// # 参数
    ///
    /// * `daddr` - 起始基本块地址
    /// * `count` - 基本块数
    /// * `buf` - 目标缓冲区（大小至少为 count * 512）
    pub fn read_bbs(&mut self, daddr: u64, count: u32, buf: &mut [u8]) -> Result<()> {
        let need = count as usize * BBSIZE;
        if buf.len() < need {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for requested blocks",
            ));
        }

        self.inc_read_count();

        let all_cached = match &mut self.bcache {
            Some(cache) => (0..count as u64).all(|i| cache.contains(daddr + i)),
            None => false,
        };

        if !all_cached {
            self.read_bbs_direct(daddr, count, buf)?;
        }

        let mut evicted = Vec::new();
        if let Some(cache) = &mut self.bcache {
            for i in 0..count as usize {
                let bb = &mut buf[i * BBSIZE..(i + 1) * BBSIZE];
                let bno = daddr + i as u64;
                match cache.lookup(bno) {
                    Some(data) => bb.copy_from_slice(data),
                    None => {
                        if let Some(victim) = cache.insert_clean(bno, bb) {
                            evicted.push(victim);
                        }
                    }
                }
            }
        }
        for (bno, data) in evicted {
            self.write_bbs_direct(bno, 1, &data)?;
        }

        Ok(())
    }

    /// 写入连续基本块
    ///
    /// 启用缓存时写入缓存并标记为脏（由 [`BlockDev::flush`] 或驱逐时写回），
    /// 否则直接写入设备。
    pub fn write_bbs(&mut self, daddr: u64, count: u32, buf: &[u8]) -> Result<()> {
        let need = count as usize * BBSIZE;
        if buf.len() < need {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for requested blocks",
            ));
        }

        self.inc_write_count();

        let mut evicted = Vec::new();
        match &mut self.bcache {
            Some(cache) => {
                for i in 0..count as usize {
                    let bno = daddr + i as u64;
                    if let Some(victim) = cache.write(bno, &buf[i * BBSIZE..(i + 1) * BBSIZE]) {
                        evicted.push(victim);
                    }
                }
            }
            None => return self.write_bbs_direct(daddr, count, buf),
        }
        for (bno, data) in evicted {
            self.write_bbs_direct(bno, 1, &data)?;
        }
        Ok(())
    }

    /// 读取一段连续区间为 [`Buf`]
    ///
    /// 对应 libxfs 的 `libxfs_readbuf`
    pub fn read_buf(&mut self, daddr: u64, bblen: u32, ops: Option<&BufOps>) -> Result<Buf> {
        self.read_buf_map(&[BufMap { daddr, bblen }], ops)
    }

    /// 读取多段区间并拼接为一个逻辑连续的 [`Buf`]
    ///
    /// 对应 libxfs 的 `libxfs_readbuf_map`。读操作成功后由 `ops` 计算校验状态。
    pub fn read_buf_map(&mut self, maps: &[BufMap], ops: Option<&BufOps>) -> Result<Buf> {
        if maps.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty buffer map"));
        }
        let total: usize = maps.iter().map(|m| m.bblen as usize * BBSIZE).sum();
        let mut data = vec![0u8; total];

        let mut off = 0usize;
        for m in maps {
            let len = m.bblen as usize * BBSIZE;
            self.read_bbs(m.daddr, m.bblen, &mut data[off..off + len])?;
            off += len;
        }

        let mut buf = Buf::new(maps.to_vec(), data);
        if let Some(ops) = ops {
            let status = (ops.verify)(buf.data());
            if status != BufStatus::Ok {
                log::debug!(
                    "[BUF] {} verifier reports {:?} at daddr {:#x}",
                    ops.name,
                    status,
                    buf.daddr()
                );
            }
            buf.set_status(status);
        }
        Ok(buf)
    }

    /// 写回缓冲区到其映射的所有区间
    ///
    /// 对应 libxfs 的 `libxfs_writebuf`
    pub fn write_buf(&mut self, buf: &Buf) -> Result<()> {
        let segments: Vec<(BufMap, Vec<u8>)> =
            buf.segments().map(|(m, seg)| (m, seg.to_vec())).collect();
        for (m, seg) in segments {
            self.write_bbs(m.daddr, m.bblen, &seg)?;
        }
        Ok(())
    }

    /// 刷新所有脏缓存块到设备
    ///
    /// # 返回
    ///
    /// 写回的基本块数
    pub fn flush(&mut self) -> Result<usize> {
        let dirty = match &mut self.bcache {
            Some(cache) => cache.take_dirty(),
            None => Vec::new(),
        };
        let count = dirty.len();
        for (bno, data) in dirty {
            self.write_bbs_direct(bno, 1, &data)?;
        }
        self.device_mut().flush()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemDevice;

    fn verify_first_byte(data: &[u8]) -> BufStatus {
        if data[0] == 0xAB {
            BufStatus::Ok
        } else {
            BufStatus::Corrupted
        }
    }

    const TEST_OPS: BufOps = BufOps {
        name: "test",
        verify: verify_first_byte,
    };

    #[test]
    fn test_read_write_bbs_direct() {
        let mut bdev = BlockDev::new(MemDevice::new(64)).unwrap();
        let data = vec![0x5Au8; 2 * BBSIZE];
        bdev.write_bbs(10, 2, &data).unwrap();

        let mut out = vec![0u8; 2 * BBSIZE];
        bdev.read_bbs(10, 2, &mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(bdev.physical_write_count(), 1);
    }

    #[test]
    fn test_read_beyond_end() {
        let mut bdev = BlockDev::new(MemDevice::new(8)).unwrap();
        let mut out = vec![0u8; 2 * BBSIZE];
        let err = bdev.read_bbs(7, 2, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_cached_write_back() {
        let mut bdev = BlockDev::new_with_cache(MemDevice::new(64), 4).unwrap();
        let data = vec![0x11u8; BBSIZE];
        bdev.write_bbs(3, 1, &data).unwrap();
        assert_eq!(bdev.physical_write_count(), 0);

        // 缓存中的脏块优先于磁盘内容
        let mut out = vec![0u8; BBSIZE];
        bdev.read_bbs(3, 1, &mut out).unwrap();
        assert_eq!(out, data);

        assert_eq!(bdev.flush().unwrap(), 1);
        assert_eq!(bdev.device().bb(3)[0], 0x11);
    }

    #[test]
    fn test_cache_eviction_writes_dirty() {
        let mut bdev = BlockDev::new_with_cache(MemDevice::new(64), 2).unwrap();
        bdev.write_bbs(0, 1, &vec![1u8; BBSIZE]).unwrap();
        bdev.write_bbs(1, 1, &vec![2u8; BBSIZE]).unwrap();
        bdev.write_bbs(2, 1, &vec![3u8; BBSIZE]).unwrap();
        // 最旧的脏块被驱逐时写回
        assert_eq!(bdev.device().bb(0)[0], 1);
    }

    #[test]
    fn test_read_buf_map_and_status() {
        let mut bdev = BlockDev::new(MemDevice::new(64)).unwrap();
        bdev.write_bbs(4, 1, &vec![0xABu8; BBSIZE]).unwrap();
        bdev.write_bbs(20, 1, &vec![0xCDu8; BBSIZE]).unwrap();

        let maps = [
            BufMap { daddr: 4, bblen: 1 },
            BufMap { daddr: 20, bblen: 1 },
        ];
        let mut buf = bdev.read_buf_map(&maps, Some(&TEST_OPS)).unwrap();
        assert_eq!(buf.status(), BufStatus::Ok);
        assert_eq!(buf.len(), 2 * BBSIZE);
        assert_eq!(buf.data()[BBSIZE], 0xCD);

        buf.data_mut()[BBSIZE] = 0xEE;
        bdev.write_buf(&buf).unwrap();
        assert_eq!(bdev.device().bb(20)[0], 0xEE);
        assert_eq!(bdev.device().bb(4)[0], 0xAB);

        let bad = bdev.read_buf(20, 1, Some(&TEST_OPS)).unwrap();
        assert_eq!(bad.status(), BufStatus::Corrupted);
    }
}
