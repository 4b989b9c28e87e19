//! 测试用内核装配

use std::rc::Rc;

use cpu::SimCpu;
use disk::MemDisk;
use terminal::ConsoleTerminal;

use super::Kernel;
use crate::config::KernelConfig;

pub type TestKernel = Kernel<SimCpu, ConsoleTerminal, MemDisk>;

/// `words` 个非零字组成的镜像
pub fn image(words: usize) -> Vec<u16> {
    (0..words).map(|i| (i % 0xfffe) as u16 + 1).collect()
}

/// 以缓存终端和内存磁盘启动内核
pub fn kernel_with(config: KernelConfig, images: &[(&str, Vec<u16>)]) -> TestKernel {
    let mut disk = MemDisk::new();
    for (name, words) in images {
        disk.insert(name, words.clone());
    }
    let cpu = SimCpu::new(config.memory.max_size);
    Kernel::boot(
        cpu,
        ConsoleTerminal::captured("test".to_string()),
        disk,
        Rc::new(config),
    )
}
