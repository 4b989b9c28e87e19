//! 物理帧分配器

use std::fmt;

use super::error::KernelError;
use crate::config::PAGE_SIZE;

/// 物理帧号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(u16);

impl Frame {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// 帧内第 `offset` 个字的物理地址，超出 16 位地址空间时返回 None
    pub fn paddr(self, offset: usize) -> Option<u16> {
        u16::try_from(self.index() * PAGE_SIZE + offset).ok()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 位图帧分配器
///
/// 总是返回最低的空闲帧，没有回收时分配序列就是 0, 1, 2, ...
#[derive(Debug, Clone)]
pub struct FrameAllocator {
    used: Vec<bool>,
    free: usize,
}

impl FrameAllocator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(usize::from(u16::MAX));
        Self {
            used: vec![false; capacity],
            free: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    pub fn available(&self) -> usize {
        self.free
    }

    /// 分配单个帧
    pub fn allocate_frame(&mut self) -> Result<Frame, KernelError> {
        let index = self
            .used
            .iter()
            .position(|used| !used)
            .ok_or(KernelError::ResourceExhausted {
                requested: 1,
                available: 0,
            })?;
        self.used[index] = true;
        self.free -= 1;
        Ok(Frame(index as u16))
    }

    /// 首次适应地分配 `count` 个连续帧，按帧号递增返回
    pub fn allocate_contiguous(&mut self, count: usize) -> Result<Vec<Frame>, KernelError> {
        let start = Self::find_run(&self.used, count).ok_or(KernelError::ResourceExhausted {
            requested: count,
            available: self.free,
        })?;
        let frames = (start..start + count)
            .map(|index| {
                self.used[index] = true;
                Frame(index as u16)
            })
            .collect();
        self.free -= count;
        Ok(frames)
    }

    /// 假设 `releasing` 先被释放，能否分配 `count` 个连续帧
    pub fn can_allocate_contiguous(&self, count: usize, releasing: &[Frame]) -> bool {
        let mut used = self.used.clone();
        for frame in releasing {
            if let Some(slot) = used.get_mut(frame.index()) {
                *slot = false;
            }
        }
        Self::find_run(&used, count).is_some()
    }

    /// 把帧归还给帧池，重复释放被忽略
    pub fn release(&mut self, frames: &[Frame]) {
        for frame in frames {
            if let Some(slot) = self.used.get_mut(frame.index()) {
                if *slot {
                    *slot = false;
                    self.free += 1;
                }
            }
        }
    }

    fn find_run(used: &[bool], count: usize) -> Option<usize> {
        if count == 0 {
            return Some(0);
        }
        let mut run = 0;
        for (index, slot) in used.iter().enumerate() {
            if *slot {
                run = 0;
                continue;
            }
            run += 1;
            if run == count {
                return Some(index + 1 - count);
            }
        }
        None
    }
}
