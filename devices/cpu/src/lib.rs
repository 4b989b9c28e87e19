//! 宿主侧 CPU 核心：寄存器文件、扁平物理内存与虚拟窗口
//!
//! 不执行指令，只提供内核需要的状态访问接口。

use arch_trait::{Cpu, GPR_COUNT};

/// 简化的 CPU 核心实现
#[derive(Debug, Clone)]
pub struct SimCpu {
    gprs: [u16; GPR_COUNT],
    pmem: Vec<u16>,
    vmem_paddr_init: u16,
    vmem_paddr_end: u16,
    pc: u16,
    powered: bool,
}

impl SimCpu {
    /// 创建 `mem_size` 个字的物理内存
    pub fn new(mem_size: usize) -> Self {
        let mem_size = mem_size.min(usize::from(u16::MAX) + 1);
        Self {
            gprs: [0; GPR_COUNT],
            pmem: vec![0; mem_size],
            vmem_paddr_init: 0,
            vmem_paddr_end: mem_size.saturating_sub(1) as u16,
            pc: 0,
            powered: true,
        }
    }

    pub fn mem_size(&self) -> usize {
        self.pmem.len()
    }

    pub fn is_on(&self) -> bool {
        self.powered
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// 当前虚拟窗口 (起始, 结束)
    pub fn vmem_window(&self) -> (u16, u16) {
        (self.vmem_paddr_init, self.vmem_paddr_end)
    }

    pub fn gprs(&self) -> &[u16; GPR_COUNT] {
        &self.gprs
    }
}

impl Cpu for SimCpu {
    fn get_gpr(&self, index: usize) -> u16 {
        self.gprs.get(index).copied().unwrap_or(0)
    }

    fn set_gpr(&mut self, index: usize, value: u16) {
        if let Some(reg) = self.gprs.get_mut(index) {
            *reg = value;
        }
    }

    fn pmem_read(&self, paddr: u16) -> u16 {
        // 越界读返回 0，与总线悬空一致
        self.pmem.get(usize::from(paddr)).copied().unwrap_or(0)
    }

    fn pmem_write(&mut self, paddr: u16, value: u16) {
        if let Some(word) = self.pmem.get_mut(usize::from(paddr)) {
            *word = value;
        }
    }

    fn set_vmem_paddr_init(&mut self, paddr: u16) {
        self.vmem_paddr_init = paddr;
    }

    fn set_vmem_paddr_end(&mut self, paddr: u16) {
        self.vmem_paddr_end = paddr;
    }

    fn set_pc(&mut self, addr: u16) {
        self.pc = addr;
    }

    fn turn_off(&mut self) {
        self.powered = false;
    }
}
