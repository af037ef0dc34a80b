//! 基本块缓存实现（使用 lru crate）

use super::buffer::{CacheBuffer, CacheFlags};
use alloc::vec::Vec;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存基本块数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 脏块写回次数（含驱逐时写回）
    pub writebacks: u64,
    /// 当前脏块数量
    pub dirty_blocks: usize,
}

/// 基本块缓存
///
/// `lru` crate 负责 LRU 顺序与驱逐：`push` 在满时弹出最久未使用的块。
/// 弹出的脏块返回给调用方写回。
pub struct BlockCache {
    /// LRU缓存核心
    cache: LruCache<u64, CacheBuffer>,

    /// 统计信息
    stats: CacheStats,
}

impl BlockCache {
    /// 创建新的基本块缓存
    ///
    /// `capacity` 为 0 时按 1 处理。
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            stats: CacheStats::default(),
        }
    }

    /// 块是否在缓存中（不影响 LRU 顺序）
    pub fn contains(&self, daddr: u64) -> bool {
        self.cache.contains(&daddr)
    }

    /// 查找块数据，命中时更新 LRU 顺序
    pub fn lookup(&mut self, daddr: u64) -> Option<&[u8]> {
        self.stats.total_accesses += 1;
        match self.cache.get(&daddr) {
            Some(buf) if buf.is_uptodate() => {
                self.stats.hits += 1;
                log::trace!("[CACHE] lookup daddr={:#x} HIT", daddr);
                Some(&buf.data)
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 插入刚从磁盘读入的干净块
    ///
    /// # 返回
    ///
    /// 若驱逐了一个脏块，返回其 (daddr, 数据)，调用方必须写回
    pub fn insert_clean(&mut self, daddr: u64, data: &[u8]) -> Option<(u64, Vec<u8>)> {
        let buf = CacheBuffer::new(data, CacheFlags::UPTODATE);
        self.push(daddr, buf)
    }

    /// 写入块数据并标记为脏
    ///
    /// # 返回
    ///
    /// 若驱逐了一个脏块，返回其 (daddr, 数据)，调用方必须写回
    pub fn write(&mut self, daddr: u64, data: &[u8]) -> Option<(u64, Vec<u8>)> {
        if let Some(buf) = self.cache.get_mut(&daddr) {
            buf.data.clear();
            buf.data.extend_from_slice(data);
            buf.flags.insert(CacheFlags::UPTODATE);
            buf.mark_dirty();
            return None;
        }
        let buf = CacheBuffer::new(data, CacheFlags::UPTODATE | CacheFlags::DIRTY);
        self.push(daddr, buf)
    }

    fn push(&mut self, daddr: u64, buf: CacheBuffer) -> Option<(u64, Vec<u8>)> {
        match self.cache.push(daddr, buf) {
            Some((victim, old)) if victim != daddr && old.is_dirty() => {
                log::debug!("[CACHE] evicting dirty daddr={:#x}", victim);
                self.stats.writebacks += 1;
                Some((victim, old.data))
            }
            Some((victim, _)) if victim != daddr => {
                log::trace!("[CACHE] evicted clean daddr={:#x}", victim);
                None
            }
            _ => None,
        }
    }

    /// 取出所有脏块并标记为干净
    ///
    /// 返回按地址排序的 (daddr, 数据)。
    pub fn take_dirty(&mut self) -> Vec<(u64, Vec<u8>)> {
        let mut dirty: Vec<(u64, Vec<u8>)> = Vec::new();
        for (daddr, buf) in self.cache.iter_mut() {
            if buf.is_dirty() {
                buf.clear_dirty();
                dirty.push((*daddr, buf.data.clone()));
            }
        }
        dirty.sort_by_key(|(daddr, _)| *daddr);
        self.stats.writebacks += dirty.len() as u64;
        log::debug!("[CACHE] flushing {} dirty blocks", dirty.len());
        dirty
    }

    /// 使块无效（从缓存中移除，脏数据被丢弃）
    pub fn invalidate(&mut self, daddr: u64) {
        self.cache.pop(&daddr);
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.dirty_blocks = self.dirty_count();
        stats
    }

    /// 获取当前缓存块数量
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// 获取脏块数量
    pub fn dirty_count(&self) -> usize {
        self.cache.iter().filter(|(_, buf)| buf.is_dirty()).count()
    }
}

impl core::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.cache.cap())
            .field("len", &self.cache.len())
            .field("dirty_count", &self.dirty_count())
            .field("stats", &self.stats)
            .finish()
    }
}
