//! 读缓冲区
//!
//! 对应 libxfs 的 `xfs_buf`：一次读入的一段或多段（目录块可能映射到不连续的区间）
//! 磁盘内容，附带读后校验状态。调用方即使读操作本身成功，也必须检查 [`Buf::status`]。

use alloc::vec::Vec;

use crate::consts::BBSIZE;

/// 缓冲区映射的一段连续磁盘区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufMap {
    /// 起始基本块地址
    pub daddr: u64,
    /// 基本块数
    pub bblen: u32,
}

/// 读后校验状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufStatus {
    /// 校验通过
    Ok,
    /// 校验和不匹配（结构本身可用）
    BadCrc,
    /// 结构损坏
    Corrupted,
}

/// 缓冲区校验操作
///
/// 对应 libxfs 的 `xfs_buf_ops`，读入后调用 `verify` 计算状态。
#[derive(Debug, Clone, Copy)]
pub struct BufOps {
    /// 名称（用于日志）
    pub name: &'static str,
    /// 校验函数
    pub verify: fn(&[u8]) -> BufStatus,
}

/// 读缓冲区
#[derive(Debug, Clone)]
pub struct Buf {
    maps: Vec<BufMap>,
    data: Vec<u8>,
    status: BufStatus,
}

impl Buf {
    pub(super) fn new(maps: Vec<BufMap>, data: Vec<u8>) -> Self {
        Self {
            maps,
            data,
            status: BufStatus::Ok,
        }
    }

    /// 第一段的起始基本块地址
    pub fn daddr(&self) -> u64 {
        self.maps.first().map(|m| m.daddr).unwrap_or(0)
    }

    /// 映射的区间
    pub fn maps(&self) -> &[BufMap] {
        &self.maps
    }

    /// 缓冲区长度（字节）
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 缓冲区是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 缓冲区内容
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 可变缓冲区内容
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 校验状态
    pub fn status(&self) -> BufStatus {
        self.status
    }

    /// 设置校验状态
    pub fn set_status(&mut self, status: BufStatus) {
        self.status = status;
    }

    /// 按映射区间切分的 (daddr, 数据片段) 序列
    pub(super) fn segments(&self) -> impl Iterator<Item = (BufMap, &[u8])> + '_ {
        let mut off = 0usize;
        self.maps.iter().map(move |m| {
            let len = m.bblen as usize * BBSIZE;
            let seg = &self.data[off..off + len];
            off += len;
            (*m, seg)
        })
    }
}
