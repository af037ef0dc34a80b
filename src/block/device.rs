//! 块设备核心类型

use crate::consts::BBSIZE;
use crate::error::{Error, ErrorKind, Result};

/// 块设备接口
///
/// 实现此 trait 以提供底层扇区访问。上层一律以基本块（512 字节）寻址，
/// 由 [`BlockDev`] 换算为设备扇区。
///
/// # 示例
///
/// ```rust,ignore
/// use xfs_repair_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_blocks(&self) -> u64 {
///         1000000
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         Ok(count as usize * self.sector_size() as usize)
///     }
///
///     fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         Ok(count as usize * self.sector_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 物理扇区大小（必须整除 512）
    fn sector_size(&self) -> u32;

    /// 总扇区数
    fn total_blocks(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始地址（以扇区为单位）
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 写入扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始地址（以扇区为单位）
    /// * `count` - 要写入的扇区数
    /// * `buf` - 源缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 刷新设备缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 是否只读
    fn is_read_only(&self) -> bool {
        false
    }
}

/// 块设备包装器
///
/// 以基本块地址（daddr）访问底层设备，包含统计信息和可选的基本块缓存。
///
/// 整个修复/恢复过程在调用方持有的独占锁下单线程运行，`BlockDev` 本身不加锁。
pub struct BlockDev<D> {
    /// 底层设备
    device: D,
    /// 分区偏移（字节）
    partition_offset: u64,
    /// 逻辑读取次数（包括缓存命中）
    read_count: u64,
    /// 逻辑写入次数
    write_count: u64,
    /// 物理读取次数（实际设备操作）
    physical_read_count: u64,
    /// 物理写入次数（实际设备操作）
    physical_write_count: u64,
    /// 基本块缓存（可选）
    pub(super) bcache: Option<crate::cache::BlockCache>,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器（无缓存）
    pub fn new(device: D) -> Result<Self> {
        let sector_size = device.sector_size() as usize;

        if sector_size == 0 || sector_size > BBSIZE || BBSIZE % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "sector size must divide the basic block size",
            ));
        }

        Ok(Self {
            device,
            partition_offset: 0,
            read_count: 0,
            write_count: 0,
            physical_read_count: 0,
            physical_write_count: 0,
            bcache: None,
        })
    }

    /// 创建带缓存的块设备包装器
    ///
    /// # 参数
    ///
    /// * `device` - 底层块设备
    /// * `cache_bbs` - 缓存的基本块数量
    pub fn new_with_cache(device: D, cache_bbs: usize) -> Result<Self> {
        let mut bd = Self::new(device)?;
        bd.bcache = Some(crate::cache::BlockCache::new(cache_bbs));
        Ok(bd)
    }

    /// 创建指定分区的块设备包装器（无缓存）
    ///
    /// * `offset` - 分区起始偏移（字节，必须按扇区对齐）
    pub fn new_partition(device: D, offset: u64) -> Result<Self> {
        let mut bd = Self::new(device)?;
        if offset % bd.sector_size() as u64 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "partition offset must be sector aligned",
            ));
        }
        bd.partition_offset = offset;
        Ok(bd)
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 获取物理扇区大小
    pub fn sector_size(&self) -> u32 {
        self.device.sector_size()
    }

    /// 设备总基本块数
    pub fn total_bbs(&self) -> u64 {
        let bytes = self.device.total_blocks() * self.sector_size() as u64;
        bytes.saturating_sub(self.partition_offset) / BBSIZE as u64
    }

    /// 获取逻辑读取次数（包括缓存命中）
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取逻辑写入次数
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// 获取物理读取次数（实际设备操作）
    pub fn physical_read_count(&self) -> u64 {
        self.physical_read_count
    }

    /// 获取物理写入次数（实际设备操作）
    pub fn physical_write_count(&self) -> u64 {
        self.physical_write_count
    }

    /// 获取缓存统计信息
    pub fn cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.bcache.as_ref().map(|cache| cache.stats())
    }

    // 内部辅助方法

    /// 将基本块地址转换为物理扇区地址
    pub(super) fn daddr_to_sector(&self, daddr: u64) -> u64 {
        (daddr * BBSIZE as u64 + self.partition_offset) / self.sector_size() as u64
    }

    /// 每个基本块包含的物理扇区数
    pub(super) fn sectors_per_bb(&self) -> u32 {
        BBSIZE as u32 / self.sector_size()
    }

    /// 直接从设备读取基本块（绕过缓存）
    pub(super) fn read_bbs_direct(&mut self, daddr: u64, count: u32, buf: &mut [u8]) -> Result<()> {
        let need = count as usize * BBSIZE;
        if buf.len() < need {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for requested blocks",
            ));
        }
        if daddr + count as u64 > self.total_bbs() {
            return Err(Error::new(ErrorKind::Io, "read beyond end of device"));
        }
        let lba = self.daddr_to_sector(daddr);
        let sectors = count * self.sectors_per_bb();
        self.physical_read_count += 1;
        let n = self.device.read_blocks(lba, sectors, &mut buf[..need])?;
        if n < need {
            return Err(Error::new(ErrorKind::Io, "short read"));
        }
        Ok(())
    }

    /// 直接向设备写入基本块（绕过缓存）
    pub(super) fn write_bbs_direct(&mut self, daddr: u64, count: u32, buf: &[u8]) -> Result<()> {
        let need = count as usize * BBSIZE;
        if buf.len() < need {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for requested blocks",
            ));
        }
        if self.device.is_read_only() {
            return Err(Error::new(ErrorKind::Io, "device is read-only"));
        }
        if daddr + count as u64 > self.total_bbs() {
            return Err(Error::new(ErrorKind::Io, "write beyond end of device"));
        }
        let lba = self.daddr_to_sector(daddr);
        let sectors = count * self.sectors_per_bb();
        self.physical_write_count += 1;
        let n = self.device.write_blocks(lba, sectors, &buf[..need])?;
        if n < need {
            return Err(Error::new(ErrorKind::Io, "short write"));
        }
        Ok(())
    }

    pub(super) fn inc_read_count(&mut self) {
        self.read_count += 1;
    }

    pub(super) fn inc_write_count(&mut self) {
        self.write_count += 1;
    }
}
