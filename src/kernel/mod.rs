//! 内核核心模块
//!
//! [`Kernel`] 是启动时创建的唯一上下文对象，持有协作者、帧分配器、进程表和行缓冲。
//! 中断和系统调用是仅有的两个入口，都以 `&mut self` 运行到结束，因此事件天然串行。

mod error;
pub mod frame;
mod interrupt;
pub mod line_editor;
mod loader;
pub mod process;
mod syscall;
pub mod translate;

#[cfg(test)]
pub(crate) mod testing;

use std::rc::Rc;

use arch_trait::{Channel, Cpu, Disk, GPR_COUNT, InterruptCode, Terminal};
use tracing::{debug, info, warn};

use crate::config::{Addressing, KernelConfig, OutOfBoundsPolicy};
use crate::utils::ringbuf::RingBuffer;

pub use error::KernelError;
pub use frame::{Frame, FrameAllocator};
pub use line_editor::{Command, LineEditor};
pub use process::{Pcb, Pid, ProcState, ProcessTable};
pub use syscall::Syscall;
pub use translate::{AddressSpace, translate};

/// 内核处理过的事件，供调试回看
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Event {
    #[default]
    None,
    Interrupt(InterruptCode),
    Syscall(u16),
    Loaded(Pid),
    Killed(Pid),
}

/// 内核上下文
pub struct Kernel<C: Cpu, T: Terminal, D: Disk> {
    cpu: C,
    terminal: T,
    disk: D,
    frames: FrameAllocator,
    processes: ProcessTable,
    line: LineEditor,
    config: Rc<KernelConfig>,
    event_list: RingBuffer<Event>,
}

impl<C: Cpu, T: Terminal, D: Disk> Kernel<C, T, D> {
    /// 启动内核
    pub fn boot(cpu: C, terminal: T, disk: D, config: Rc<KernelConfig>) -> Self {
        let frames = FrameAllocator::new(config.frame_pool_size());
        info!(
            frames = frames.capacity(),
            max_size = config.memory.max_size,
            addressing = ?config.memory.addressing,
            "内核启动"
        );
        let mut kernel = Self {
            cpu,
            terminal,
            disk,
            frames,
            processes: ProcessTable::new(),
            line: LineEditor::new(),
            event_list: RingBuffer::new(config.debug.event_list_size),
            config,
        };
        if kernel.config.terminal.banner {
            kernel.terminal.println(Channel::Command, "Type commands here");
            kernel.terminal.println(Channel::App, "Apps output here");
            kernel.terminal.println(Channel::Kernel, "Kernel output here");
        }
        kernel
    }

    #[inline(always)]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    #[inline(always)]
    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[inline(always)]
    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    #[inline(always)]
    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    #[inline(always)]
    pub fn frames(&self) -> &FrameAllocator {
        &self.frames
    }

    #[inline(always)]
    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    #[inline(always)]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// 行编辑器中尚未提交的内容
    pub fn pending_line(&self) -> &str {
        self.line.as_str()
    }

    /// 当前存活的前台进程
    pub fn current_process(&self) -> Option<&Pcb> {
        self.processes.current()
    }

    /// 前台进程是否可以被 CPU 核心调度（睡眠中的进程不行）
    pub fn foreground_runnable(&self) -> bool {
        self.processes
            .current()
            .is_some_and(|pcb| pcb.state() == ProcState::Active)
    }

    /// 取出事件列表
    pub fn get_events(&mut self) -> Vec<Event> {
        self.event_list.drain()
    }

    fn record(&mut self, event: Event) {
        self.event_list.push_overwrite(event);
    }

    fn kernel_log(&mut self, text: &str) {
        self.terminal.println(Channel::Kernel, text);
    }

    /// 把寄存器、虚拟窗口和 PC 恢复为默认值
    fn reset_cpu(&mut self) {
        for index in 0..GPR_COUNT {
            self.cpu.set_gpr(index, 0);
        }
        self.cpu.set_vmem_paddr_init(0);
        self.cpu
            .set_vmem_paddr_end(self.config.memory.max_size.saturating_sub(1) as u16);
        self.cpu.set_pc(0);
    }

    /// 翻译失败时按配置的策略处理
    fn out_of_bounds(&mut self, vaddr: u16, write: bool) -> Result<(), KernelError> {
        let pid = self.processes.current_pid();
        warn!(?pid, vaddr, write, "越界访问");
        self.kernel_log(&format!(
            "out of bounds {} at vaddr {:#06x}",
            if write { "write" } else { "read" },
            vaddr
        ));
        match self.config.process.out_of_bounds {
            OutOfBoundsPolicy::Ignore => Ok(()),
            OutOfBoundsPolicy::Fault => Err(KernelError::OutOfBoundsAccess { vaddr }),
        }
    }

    /// 经前台进程的页表读一个字
    ///
    /// 忽略策略下越界读返回 0。
    pub fn read_word(&mut self, vaddr: u16) -> Result<u16, KernelError> {
        let pcb = self.processes.current().ok_or(KernelError::NoActiveProcess)?;
        match translate(vaddr, pcb) {
            Some(paddr) => Ok(self.cpu.pmem_read(paddr)),
            None => self.out_of_bounds(vaddr, false).map(|_| 0),
        }
    }

    /// 经前台进程的页表写一个字
    ///
    /// 忽略策略下越界写被丢弃。
    pub fn write_word(&mut self, vaddr: u16, value: u16) -> Result<(), KernelError> {
        let pcb = self.processes.current().ok_or(KernelError::NoActiveProcess)?;
        match translate(vaddr, pcb) {
            Some(paddr) => {
                self.cpu.pmem_write(paddr, value);
                Ok(())
            }
            None => self.out_of_bounds(vaddr, true),
        }
    }

    /// 终止进程：清零映射的内存、归还帧、清空页表、复位 CPU
    ///
    /// 进程不存活时什么也不做。
    pub fn kill_process(&mut self, pid: Pid) {
        let Some(pcb) = self.processes.get(pid).filter(|pcb| pcb.is_live()) else {
            return;
        };
        let space = pcb.space().clone();
        let mut vaddr = space.first_vaddr();
        for _ in 0..space.mapped_words() {
            let Some(current) = vaddr else { break };
            if let Some(paddr) = space.translate(current) {
                self.cpu.pmem_write(paddr, 0);
            }
            vaddr = current.checked_add(1);
        }

        if let Some(released) = self.processes.terminate(pid) {
            debug!(pid, frames = released.len(), "归还物理帧");
            self.frames.release(&released);
        }
        self.reset_cpu();
        self.record(Event::Killed(pid));
        info!(pid, "进程已终止");
    }

    /// 终止前台进程，没有前台进程时返回 false
    pub fn kill_current(&mut self) -> bool {
        match self.processes.current_pid() {
            Some(pid) => {
                self.kill_process(pid);
                true
            }
            None => false,
        }
    }

    /// 让前台进程睡眠 `ticks` 个时钟 tick
    pub fn sleep_process(&mut self, ticks: u32) -> Result<(), KernelError> {
        let pcb = self
            .processes
            .current_mut()
            .ok_or(KernelError::NoActiveProcess)?;
        pcb.sleep(ticks);
        debug!(pid = pcb.pid(), ticks, state = %pcb.state(), "进程睡眠");
        Ok(())
    }

    /// 前台进程诊断信息
    pub fn process_info(&self) -> String {
        let Some(pcb) = self.processes.current() else {
            return "no active process".to_string();
        };
        let space = pcb.space();
        let layout = match (space.mode(), space.base()) {
            (Addressing::Flat, Some(base)) => {
                format!("base {:#06x} limit {}", base, space.limit())
            }
            _ => format!("pages {}", space.page_count()),
        };
        format!(
            "pid {} ({}) {} {} pc {:#06x}",
            pcb.pid(),
            pcb.name(),
            pcb.state(),
            layout,
            pcb.pc
        )
    }
}
