//! CRC32 校验和计算
//!
//! 为日志记录负载提供 CRC32 校验。记录头的 `h_chksum` 为 0 表示写入方未计算校验和。

/// 计算 CRC32 校验和（一次性计算）
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// 计算日志记录负载的校验和
///
/// 结果为 0 时替换为 1，因为 0 在磁盘上表示"未计算"。
pub fn record_checksum(payload: &[u8]) -> u32 {
    match crc32(payload) {
        0 => 1,
        crc => crc,
    }
}
