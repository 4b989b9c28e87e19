//! 中断分发

use arch_trait::{Channel, Cpu, Disk, InterruptCode, Terminal};
use tracing::{debug, error, info, warn};

use super::{Command, Event, Kernel};
use crate::config::EraseMode;

impl<C: Cpu, T: Terminal, D: Disk> Kernel<C, T, D> {
    /// 处理一次中断，运行到结束
    pub fn interrupt(&mut self, code: InterruptCode) {
        self.record(Event::Interrupt(code));
        match code {
            InterruptCode::ProtectionFault => self.handle_protection_fault(),
            InterruptCode::Timer => self.handle_timer(),
            InterruptCode::Keyboard => self.handle_keyboard(),
        }
    }

    /// 杀死前台进程，必要时重新加载空闲程序，保证机器总有前台进程
    pub(super) fn handle_protection_fault(&mut self) {
        let pid = self.processes.current_pid();
        warn!(?pid, "保护错误");
        self.kernel_log("protection fault");
        if let Some(pid) = pid {
            self.kill_process(pid);
        }
        if self.processes.current_pid().is_some() {
            return;
        }

        let idle = self.config.process.idle_image.clone();
        match self.load_program(&idle) {
            Ok(pid) => info!(pid, image = %idle, "已重新加载空闲程序"),
            Err(e) => {
                error!(image = %idle, error = %e, "空闲程序加载失败");
                self.kernel_log(&format!("load failed: {}", e));
            }
        }
    }

    fn handle_timer(&mut self) {
        if let Some(pcb) = self.processes.current_mut() {
            if pcb.tick() {
                debug!(pid = pcb.pid(), "进程被唤醒");
            }
        }
    }

    fn handle_keyboard(&mut self) {
        let code = self.terminal.read_typed_char();

        if self.terminal.is_backspace(code) {
            if self.line.backspace() {
                self.echo_erase();
            }
            self.kernel_log("erase");
        } else if self.terminal.is_alpha(code)
            || self.terminal.is_num(code)
            || self.terminal.is_space(code)
        {
            // 谓词已保证是 ASCII
            if let Some(c) = char::from_u32(code) {
                self.line.push(c);
                self.terminal.print(Channel::Command, c.encode_utf8(&mut [0; 4]));
            }
        } else if self.terminal.is_return(code) {
            self.terminal.print(Channel::Command, "\n");
            self.kernel_log("enter");
            let line = self.line.take_line();
            self.terminal.println(Channel::App, &line);
            self.run_command(&line);
        } else {
            debug!(code, "忽略按键");
        }
    }

    fn echo_erase(&mut self) {
        match self.config.terminal.erase_mode {
            EraseMode::Cursor => self.terminal.print(Channel::Command, "\x08 \x08"),
            EraseMode::Redraw => {
                let redraw = format!("\r{} \r{}", self.line.as_str(), self.line.as_str());
                self.terminal.print(Channel::Command, &redraw);
            }
        }
    }

    fn run_command(&mut self, line: &str) {
        let Some(command) = Command::parse(line) else {
            if !line.trim().is_empty() {
                debug!(line = %line, "未知命令");
                self.kernel_log(&format!("unknown command: {}", line.trim()));
            }
            return;
        };

        info!(?command, "执行命令");
        match command {
            Command::Load(name) => {
                let file = format!("{}.bin", name);
                if let Err(e) = self.load_program(&file) {
                    warn!(image = %file, error = %e, "加载失败");
                    self.kernel_log(&format!("load failed: {}", e));
                }
            }
            Command::KillProcess => {
                if !self.kill_current() {
                    self.kernel_log("no active process");
                }
            }
            Command::InfoProcess => {
                let info = self.process_info();
                self.kernel_log(&info);
            }
            Command::Quit => self.cpu.turn_off(),
        }
    }
}
