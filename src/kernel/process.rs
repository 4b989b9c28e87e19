//! 进程控制块与进程表

use std::collections::HashMap;
use std::fmt;

use arch_trait::GPR_COUNT;
use nohash_hasher::BuildNoHashHasher;

use super::error::KernelError;
use super::frame::Frame;
use super::translate::AddressSpace;

pub type Pid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcState {
    #[default]
    Active,
    Sleeping,
    Terminated,
}

impl ProcState {
    /// Active 或 Sleeping
    pub fn is_live(self) -> bool {
        !matches!(self, ProcState::Terminated)
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcState::Active => "active",
            ProcState::Sleeping => "sleeping",
            ProcState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// 进程控制块
#[derive(Debug, Clone)]
pub struct Pcb {
    pid: Pid,
    name: String,
    space: AddressSpace,
    pub pc: u16,
    pub registers: [u16; GPR_COUNT],
    sleep_time: u32,
    state: ProcState,
}

impl Pcb {
    pub fn new(name: &str, space: AddressSpace, pc: u16) -> Self {
        Self {
            pid: 0,
            name: name.to_string(),
            space,
            pc,
            registers: [0; GPR_COUNT],
            sleep_time: 0,
            state: ProcState::Active,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn sleep_time(&self) -> u32 {
        self.sleep_time
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Active → Sleeping；0 个 tick 不改变状态
    pub fn sleep(&mut self, ticks: u32) {
        if self.state != ProcState::Active || ticks == 0 {
            return;
        }
        self.sleep_time = ticks;
        self.state = ProcState::Sleeping;
    }

    /// 处理一次时钟 tick，返回是否在这一拍被唤醒
    pub fn tick(&mut self) -> bool {
        if self.state != ProcState::Sleeping || self.sleep_time == 0 {
            return false;
        }
        self.sleep_time -= 1;
        if self.sleep_time == 0 {
            self.state = ProcState::Active;
            return true;
        }
        false
    }

    /// 进入 Terminated，返回需要归还的帧
    pub fn terminate(&mut self) -> Vec<Frame> {
        self.state = ProcState::Terminated;
        self.sleep_time = 0;
        self.registers = [0; GPR_COUNT];
        self.space.clear()
    }
}

/// 进程表
///
/// 前台槽 `current` 只会指向存活的进程；已终止的进程留在表里作为历史。
#[derive(Debug)]
pub struct ProcessTable {
    table: HashMap<Pid, Pcb, BuildNoHashHasher<Pid>>,
    current: Option<Pid>,
    next_pid: Pid,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            table: HashMap::with_hasher(BuildNoHashHasher::default()),
            current: None,
            next_pid: 1,
        }
    }

    /// 安装新的前台进程，已有存活前台进程时拒绝
    pub fn install(&mut self, mut pcb: Pcb) -> Result<Pid, KernelError> {
        if let Some(pid) = self.current {
            return Err(KernelError::ForegroundBusy { pid });
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        pcb.pid = pid;
        self.table.insert(pid, pcb);
        self.current = Some(pid);
        Ok(pid)
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    pub fn current(&self) -> Option<&Pcb> {
        self.current.and_then(|pid| self.table.get(&pid))
    }

    pub fn current_mut(&mut self) -> Option<&mut Pcb> {
        self.current.and_then(|pid| self.table.get_mut(&pid))
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.table.get(&pid)
    }

    /// 终止进程并让出前台槽，返回需要归还的帧；进程不存活时返回 None
    pub fn terminate(&mut self, pid: Pid) -> Option<Vec<Frame>> {
        let pcb = self.table.get_mut(&pid)?;
        if !pcb.is_live() {
            return None;
        }
        let frames = pcb.terminate();
        if self.current == Some(pid) {
            self.current = None;
        }
        Some(frames)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 存活的进程数，在单前台约束下最多为 1
    pub fn live_count(&self) -> usize {
        self.table.values().filter(|pcb| pcb.is_live()).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
