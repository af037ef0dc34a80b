//! 块设备抽象
//!
//! 提供扇区设备接口和以基本块（512 字节，daddr）为单位的 I/O 操作。
//! block/device.rs 提供设备接口和 `BlockDev` 包装器（地址换算、统计、可选缓存）

//! block/io.rs 提供基本块读写，读写都先经过缓存（若启用），未命中时调用设备接口
//! block/buf.rs 提供 `Buf`：一次读入的（可能由多段不连续区间拼接的）缓冲区及其校验状态

mod buf;
mod device;
mod io;

pub use buf::{Buf, BufMap, BufOps, BufStatus};
pub use device::{BlockDevice, BlockDev};
