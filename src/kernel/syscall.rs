//! 系统调用分发

use arch_trait::{Channel, Cpu, Disk, Terminal};
use tracing::{debug, warn};

use super::{Event, Kernel, KernelError};

/// 字符串最长扫描的字数，等于整个 16 位地址空间
const MAX_STRING_WORDS: usize = 1 << 16;

/// 系统调用号
mod syscall_num {
    pub const SYS_HALT: u16 = 0;
    pub const SYS_PRINT_STRING: u16 = 1;
    pub const SYS_PRINT_NEWLINE: u16 = 2;
    pub const SYS_PRINT_NUMBER: u16 = 3;
    pub const SYS_EXIT: u16 = 4;
}

/// 从寄存器解码出的系统调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Halt,
    /// r1 指向以 0 结尾的字符串，每个字一个字符
    PrintString { addr: u16 },
    PrintNewline,
    /// 以无符号十进制打印 r1
    PrintNumber { value: u16 },
    Exit,
    Unknown(u16),
}

impl Syscall {
    /// r0 是调用号，r1..r3 是参数
    pub fn decode(regs: [u16; 4]) -> Syscall {
        let [number, arg0, _arg1, _arg2] = regs;
        match number {
            syscall_num::SYS_HALT => Syscall::Halt,
            syscall_num::SYS_PRINT_STRING => Syscall::PrintString { addr: arg0 },
            syscall_num::SYS_PRINT_NEWLINE => Syscall::PrintNewline,
            syscall_num::SYS_PRINT_NUMBER => Syscall::PrintNumber { value: arg0 },
            syscall_num::SYS_EXIT => Syscall::Exit,
            other => Syscall::Unknown(other),
        }
    }
}

impl<C: Cpu, T: Terminal, D: Disk> Kernel<C, T, D> {
    /// 处理 CPU 核心发出的系统调用陷入
    pub fn syscall(&mut self) {
        let regs = [0, 1, 2, 3].map(|index| self.cpu.get_gpr(index));
        let call = Syscall::decode(regs);
        self.record(Event::Syscall(regs[0]));
        debug!(?call, "系统调用");

        match self.dispatch_syscall(call) {
            Ok(()) => {}
            Err(KernelError::NoActiveProcess) => {
                warn!(?call, "没有前台进程");
                self.kernel_log("no active process");
            }
            Err(KernelError::OutOfBoundsAccess { vaddr }) => {
                warn!(?call, vaddr, "系统调用越界，按保护错误处理");
                self.handle_protection_fault();
            }
            Err(e) => {
                warn!(?call, error = %e, "系统调用失败");
                self.kernel_log(&format!("syscall failed: {}", e));
            }
        }
    }

    fn dispatch_syscall(&mut self, call: Syscall) -> Result<(), KernelError> {
        match call {
            Syscall::Halt => {
                self.cpu.turn_off();
            }
            Syscall::PrintString { addr } => {
                let text = self.read_string(addr)?;
                self.terminal.print(Channel::App, &text);
            }
            Syscall::PrintNewline => {
                self.terminal.println(Channel::App, "");
            }
            Syscall::PrintNumber { value } => {
                if self.processes.current().is_none() {
                    return Err(KernelError::NoActiveProcess);
                }
                self.terminal.print(Channel::App, &value.to_string());
            }
            Syscall::Exit => {
                if !self.kill_current() {
                    return Err(KernelError::NoActiveProcess);
                }
            }
            Syscall::Unknown(number) => {
                self.kernel_log(&format!("unknown syscall {}", number));
            }
        }
        Ok(())
    }

    /// 从虚拟地址 `addr` 读取以 0 结尾的字符串
    fn read_string(&mut self, addr: u16) -> Result<String, KernelError> {
        let mut text = String::new();
        let mut vaddr = addr;
        for _ in 0..MAX_STRING_WORDS {
            let word = self.read_word(vaddr)?;
            if word == 0 {
                break;
            }
            text.push(char::from_u32(u32::from(word)).unwrap_or(char::REPLACEMENT_CHARACTER));
            vaddr = vaddr.wrapping_add(1);
        }
        Ok(text)
    }
}
