//! 缓存块结构

use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// 缓存块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u8 {
        /// 数据已更新（有效）
        const UPTODATE = 0x01;
        /// 数据已修改（脏）
        const DIRTY    = 0x02;
    }
}

/// 缓存块
#[derive(Debug, Clone)]
pub struct CacheBuffer {
    /// 基本块数据
    pub data: Vec<u8>,

    /// 块状态标志
    pub flags: CacheFlags,
}

impl CacheBuffer {
    /// 用已有数据创建缓存块
    pub fn new(data: &[u8], flags: CacheFlags) -> Self {
        Self {
            data: data.to_vec(),
            flags,
        }
    }

    /// 标记为脏（已修改）
    pub fn mark_dirty(&mut self) {
        self.flags.insert(CacheFlags::DIRTY);
    }

    /// 标记为干净（已写入磁盘）
    pub fn clear_dirty(&mut self) {
        self.flags.remove(CacheFlags::DIRTY);
    }

    /// 检查是否是脏块
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(CacheFlags::DIRTY)
    }

    /// 检查数据是否有效
    pub fn is_uptodate(&self) -> bool {
        self.flags.contains(CacheFlags::UPTODATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_buffer_flags() {
        let mut buf = CacheBuffer::new(&[0u8; 4], CacheFlags::UPTODATE);
        assert!(buf.is_uptodate());
        assert!(!buf.is_dirty());

        buf.mark_dirty();
        assert!(buf.is_dirty());

        buf.clear_dirty();
        assert!(!buf.is_dirty());
        assert!(buf.is_uptodate());
    }
}
