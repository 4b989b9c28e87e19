//! 内核错误类型

use arch_trait::DeviceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("镜像过大: {name} 需要 {words} 个字, 上限 {max}")]
    ImageTooLarge { name: String, words: u32, max: usize },

    #[error("物理帧耗尽: 需要 {requested} 个连续帧, 空闲 {available}")]
    ResourceExhausted { requested: usize, available: usize },

    #[error("越界访问: 虚拟地址 {vaddr:#06x}")]
    OutOfBoundsAccess { vaddr: u16 },

    #[error("没有前台进程")]
    NoActiveProcess,

    #[error("前台进程 {pid} 仍在运行")]
    ForegroundBusy { pid: u32 },

    #[error("设备错误: {0}")]
    Device(#[from] DeviceError),
}
