//! 目录修复上下文
//!
//! 修复配置、inode 查询接口、目录几何参数，以及所有目录形态共用的
//! 目录项 inode 号分类。

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};

use crate::block::{BlockDev, BlockDevice, BufOps, BufStatus};
use crate::blkmap::BlockMap;
use crate::consts::{
    XFS_DA_NODE_MAGIC, XFS_DIR2_BLOCK_MAGIC, XFS_DIR2_DATA_MAGIC, XFS_DIR2_FREE_OFFSET,
    XFS_DIR2_LEAFN_MAGIC, XFS_DIR2_LEAF_OFFSET,
};
use crate::superblock::Superblock;

use super::types::DA_HDR_SIZE;

/// 修复配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairConfig {
    /// 只检查不修改（dry-run）：所有修复只报告 "would ..."，不写盘
    pub no_modify: bool,
    /// inode 发现模式：未知的 inode 号登记为待确认而不是清除
    pub ino_discovery: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            no_modify: false,
            ino_discovery: true,
        }
    }
}

/// 一个 inode chunk（64 个 inode）的分配状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeRecord {
    /// chunk 起始的 AG 内 inode 号
    pub startnum: u32,
    /// 空闲位图（第 i 位对应 startnum + i）
    pub free: u64,
    /// 已确认位图
    pub confirmed: u64,
}

impl InodeRecord {
    /// 每个 chunk 的 inode 数
    pub const INODES_PER_CHUNK: u32 = 64;

    /// chunk 内第 `offset` 个 inode 是否空闲
    pub fn is_free(&self, offset: u32) -> bool {
        self.free & (1u64 << offset) != 0
    }

    /// chunk 内第 `offset` 个 inode 是否已确认
    pub fn is_confirmed(&self, offset: u32) -> bool {
        self.confirmed & (1u64 << offset) != 0
    }
}

/// inode 分配状态查询
///
/// 由外部的 inode 扫描阶段提供，目录修复只通过这个接口询问
/// 目录项引用的 inode 是否存在、是否空闲。
pub trait InodeOracle {
    /// 查找包含 `agino` 的 chunk
    fn find_inode_rec(&self, agno: u32, agino: u32) -> Option<InodeRecord>;

    /// 登记一个待确认的 inode 号
    fn add_uncertain(&mut self, ino: u64);
}

/// 内存中的 inode 分配表
#[derive(Debug, Clone, Default)]
pub struct InodeTree {
    /// (agno, startnum) -> chunk
    records: BTreeMap<(u32, u32), InodeRecord>,
    uncertain: Vec<u64>,
}

impl InodeTree {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个 chunk
    pub fn insert(&mut self, agno: u32, record: InodeRecord) {
        self.records.insert((agno, record.startnum), record);
    }

    /// 已登记的待确认 inode 号
    pub fn uncertain(&self) -> &[u64] {
        &self.uncertain
    }
}

impl InodeOracle for InodeTree {
    fn find_inode_rec(&self, agno: u32, agino: u32) -> Option<InodeRecord> {
        self.records
            .range(..=(agno, agino))
            .next_back()
            .filter(|((a, start), _)| {
                *a == agno && agino < start + InodeRecord::INODES_PER_CHUNK
            })
            .map(|(_, rec)| *rec)
    }

    fn add_uncertain(&mut self, ino: u64) {
        self.uncertain.push(ino);
    }
}

/// 目录几何参数
///
/// 对应 `xfs_da_geometry`，全部由 superblock 导出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirGeometry {
    /// 目录块大小（字节）
    pub blksize: usize,
    /// 每个目录块的 fs 块数
    pub fsbcount: u64,
    /// 第一个数据块的逻辑块号
    pub datablk: u64,
    /// 第一个叶子（或索引根）块的逻辑块号
    pub leafblk: u64,
    /// 第一个空闲索引块的逻辑块号
    pub freeblk: u64,
    /// 每个节点块的最大项数
    pub node_ents: usize,
}

impl DirGeometry {
    /// 由 superblock 计算
    pub fn new(sb: &Superblock) -> Self {
        let blksize = sb.dir_blocksize() as usize;
        Self {
            blksize,
            fsbcount: 1u64 << sb.dirblklog,
            datablk: 0,
            leafblk: XFS_DIR2_LEAF_OFFSET >> sb.blocklog,
            freeblk: XFS_DIR2_FREE_OFFSET >> sb.blocklog,
            node_ents: (blksize - DA_HDR_SIZE) / 8,
        }
    }
}

/// 目录块读后校验
///
/// 默认只检查魔数。v5 格式或测试可以换成带校验和的版本。
#[derive(Debug, Clone, Copy)]
pub struct DirVerifiers {
    /// 普通数据块
    pub data: BufOps,
    /// 单块目录
    pub block: BufOps,
    /// 叶子块
    pub leafn: BufOps,
    /// 索引节点块（也接受叶子块魔数，根可能就是叶子）
    pub node: BufOps,
}

fn verify_data(buf: &[u8]) -> BufStatus {
    magic32_status(buf, XFS_DIR2_DATA_MAGIC)
}

fn verify_block(buf: &[u8]) -> BufStatus {
    magic32_status(buf, XFS_DIR2_BLOCK_MAGIC)
}

fn verify_leafn(buf: &[u8]) -> BufStatus {
    match buf.get(8..10).map(BigEndian::read_u16) {
        Some(XFS_DIR2_LEAFN_MAGIC) => BufStatus::Ok,
        _ => BufStatus::Corrupted,
    }
}

fn verify_node(buf: &[u8]) -> BufStatus {
    match buf.get(8..10).map(BigEndian::read_u16) {
        Some(XFS_DA_NODE_MAGIC) | Some(XFS_DIR2_LEAFN_MAGIC) => BufStatus::Ok,
        _ => BufStatus::Corrupted,
    }
}

fn magic32_status(buf: &[u8], magic: u32) -> BufStatus {
    match buf.get(0..4).map(BigEndian::read_u32) {
        Some(m) if m == magic => BufStatus::Ok,
        _ => BufStatus::Corrupted,
    }
}

impl Default for DirVerifiers {
    fn default() -> Self {
        Self {
            data: BufOps { name: "dir2_data", verify: verify_data },
            block: BufOps { name: "dir2_block", verify: verify_block },
            leafn: BufOps { name: "dir2_leafn", verify: verify_leafn },
            node: BufOps { name: "da_node", verify: verify_node },
        }
    }
}

/// 目录 inode 数据分支格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkFormat {
    /// 内联（短格式）
    Local,
    /// extent 列表
    Extents,
    /// extent B+ 树
    Btree,
    /// 其它（设备号等，目录不可能使用）
    Other,
}

/// 一个待检查的目录 inode
///
/// 修复过程可能改写 `size` 和 `fork`（短格式），调用方负责把它们写回 inode。
#[derive(Debug, Clone)]
pub struct DirInode {
    /// inode 号
    pub ino: u64,
    /// 目录大小（字节）
    pub size: u64,
    /// 数据分支格式
    pub format: ForkFormat,
    /// 数据分支内容，长度为分支容量
    pub fork: Vec<u8>,
    /// 块映射（extent/btree 格式时）
    pub blkmap: Option<BlockMap>,
}

/// 单个目录的检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirOutcome {
    /// 目录无法修复，应整个丢弃
    pub junk: bool,
    /// inode 本身（大小或内联数据）被改写
    pub dino_dirty: bool,
    /// 做过修复
    pub repair: bool,
    /// 父目录 inode 号，未知时为 `None`
    pub parent: Option<u64>,
    /// 找到了 "." 项
    pub dot: bool,
    /// 找到了 ".." 项
    pub dotdot: bool,
}

/// 目录修复器
///
/// 持有块设备、superblock、inode 分配表和运行配置；同时记录
/// 需要重建的目录（坏目录列表）和根目录缺少 ".." 的标记。
pub struct DirRepairer<D, O> {
    pub(super) bdev: BlockDev<D>,
    pub(super) sb: Superblock,
    pub(super) geo: DirGeometry,
    pub(super) oracle: O,
    pub(super) config: RepairConfig,
    pub(super) verifiers: DirVerifiers,
    bad_dirs: BTreeSet<u64>,
    pub(super) need_root_dotdot: bool,
}

impl<D: BlockDevice, O: InodeOracle> DirRepairer<D, O> {
    /// 创建修复器
    pub fn new(bdev: BlockDev<D>, sb: Superblock, oracle: O, config: RepairConfig) -> Self {
        let geo = DirGeometry::new(&sb);
        Self {
            bdev,
            sb,
            geo,
            oracle,
            config,
            verifiers: DirVerifiers::default(),
            bad_dirs: BTreeSet::new(),
            need_root_dotdot: false,
        }
    }

    /// 替换目录块校验
    pub fn with_verifiers(mut self, verifiers: DirVerifiers) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// 运行配置
    pub fn config(&self) -> RepairConfig {
        self.config
    }

    /// 目录几何参数
    pub fn geometry(&self) -> &DirGeometry {
        &self.geo
    }

    /// 块设备
    pub fn bdev_mut(&mut self) -> &mut BlockDev<D> {
        &mut self.bdev
    }

    /// inode 分配表
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// 目录是否在坏目录列表中
    pub fn is_bad_dir(&self, ino: u64) -> bool {
        self.bad_dirs.contains(&ino)
    }

    /// 坏目录列表（需要在后续阶段重建）
    pub fn bad_dirs(&self) -> impl Iterator<Item = u64> + '_ {
        self.bad_dirs.iter().copied()
    }

    pub(super) fn add_bad_dir(&mut self, ino: u64) {
        if self.bad_dirs.insert(ino) {
            log::debug!("[DIR] dir {} added to bad directory list", ino);
        }
    }

    /// 根目录是否缺少 ".."
    pub fn need_root_dotdot(&self) -> bool {
        self.need_root_dotdot
    }

    /// 拆出块设备和 inode 分配表
    pub fn into_parts(self) -> (BlockDev<D>, O) {
        (self.bdev, self.oracle)
    }

    /// 目录项引用的 inode 号是否应清除
    ///
    /// 依次检查：非法号、保留的元数据 inode、分配表。返回需要清除的原因。
    /// inode 发现模式下分配表中不存在的号登记为待确认而不是清除。
    pub(super) fn classify_entry_inum(&mut self, ino: u64) -> Option<&'static str> {
        let sb = &self.sb;
        if sb.is_bad_inum(ino) {
            return Some("invalid");
        }
        if ino == sb.rbmino {
            return Some("realtime bitmap");
        }
        if ino == sb.rsumino {
            return Some("realtime summary");
        }
        if ino == sb.uquotino {
            return Some("user quota");
        }
        if ino == sb.gquotino {
            return Some("group quota");
        }
        if ino == sb.pquotino {
            return Some("project quota");
        }

        let agno = sb.ino_to_agno(ino);
        let agino = sb.ino_to_agino(ino);
        match self.oracle.find_inode_rec(agno, agino) {
            None if self.config.ino_discovery => {
                self.oracle.add_uncertain(ino);
                None
            }
            None => Some("non-existent"),
            Some(rec) if rec.is_free(agino - rec.startnum) && !self.config.ino_discovery => {
                Some("free")
            }
            Some(_) => None,
        }
    }
}
