//! 虚拟地址翻译

use super::frame::Frame;
use super::process::Pcb;
use crate::config::{Addressing, PAGE_SIZE};

/// 进程地址空间
///
/// 页表下标是页号，值是承载该页的物理帧。平坦模式下同样持有帧，
/// 只是翻译退化为 (base, limit) 的边界检查。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    mode: Addressing,
    page_table: Vec<Frame>,
    limit: u16,
}

impl AddressSpace {
    pub fn new(mode: Addressing, page_table: Vec<Frame>, limit: u16) -> Self {
        Self {
            mode,
            page_table,
            limit,
        }
    }

    pub fn empty(mode: Addressing) -> Self {
        Self::new(mode, Vec::new(), 0)
    }

    pub fn mode(&self) -> Addressing {
        self.mode
    }

    pub fn page_table(&self) -> &[Frame] {
        &self.page_table
    }

    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// 镜像大小（字）
    pub fn limit(&self) -> u16 {
        self.limit
    }

    /// 平坦模式的基址：第一帧的首字
    pub fn base(&self) -> Option<u16> {
        self.page_table.first().and_then(|frame| frame.paddr(0))
    }

    /// 可访问的虚拟地址个数
    pub fn mapped_words(&self) -> usize {
        match self.mode {
            Addressing::Paged => self.page_table.len() * PAGE_SIZE,
            Addressing::Flat => usize::from(self.limit),
        }
    }

    /// 第一个可访问的虚拟地址
    pub fn first_vaddr(&self) -> Option<u16> {
        match self.mode {
            Addressing::Paged => (!self.page_table.is_empty()).then_some(0),
            Addressing::Flat => self.base(),
        }
    }

    /// 暴露给 CPU 核心的物理窗口 (起始, 结束)，结束地址包含在内
    pub fn window(&self) -> Option<(u16, u16)> {
        let first = self.page_table.first()?;
        let last = self.page_table.last()?;
        let init = first.paddr(0)?;
        let end = match self.mode {
            Addressing::Paged => last.paddr(PAGE_SIZE - 1)?,
            Addressing::Flat => init.checked_add(self.limit.max(1) - 1)?,
        };
        Some((init, end))
    }

    /// 虚拟地址到物理地址
    pub fn translate(&self, vaddr: u16) -> Option<u16> {
        match self.mode {
            Addressing::Paged => {
                let vaddr = usize::from(vaddr);
                let page = vaddr / PAGE_SIZE;
                let offset = vaddr % PAGE_SIZE;
                self.page_table.get(page)?.paddr(offset)
            }
            Addressing::Flat => {
                let base = self.base()?;
                let end = u32::from(base) + u32::from(self.limit);
                (vaddr >= base && u32::from(vaddr) < end).then_some(vaddr)
            }
        }
    }

    /// 清空页表，返回原先持有的帧
    pub fn clear(&mut self) -> Vec<Frame> {
        self.limit = 0;
        std::mem::take(&mut self.page_table)
    }
}

/// 按进程的页表翻译虚拟地址
pub fn translate(vaddr: u16, pcb: &Pcb) -> Option<u16> {
    pcb.space().translate(vaddr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::frame::FrameAllocator;

    fn paged(pages: usize, limit: u16) -> AddressSpace {
        let mut frames = FrameAllocator::new(15);
        // 先占掉一帧，使页号和帧号错开
        frames.allocate_frame().unwrap();
        AddressSpace::new(
            Addressing::Paged,
            frames.allocate_contiguous(pages).unwrap(),
            limit,
        )
    }

    #[test]
    fn test_paged_translation_follows_page_table() {
        let space = paged(2, 5000);
        let frames = space.page_table().to_vec();
        for vaddr in [0u16, 1, 4095, 4096, 4999, 8191] {
            let page = usize::from(vaddr) / PAGE_SIZE;
            let offset = usize::from(vaddr) % PAGE_SIZE;
            let expected = frames[page].index() * PAGE_SIZE + offset;
            assert_eq!(space.translate(vaddr), Some(expected as u16));
        }
        assert_ne!(frames[0], frames[1]);
    }

    #[test]
    fn test_paged_translation_miss() {
        let space = paged(2, 5000);
        assert_eq!(space.translate(8192), None);
        assert_eq!(space.translate(u16::MAX), None);
    }

    #[test]
    fn test_paged_window() {
        let space = paged(2, 5000);
        assert_eq!(space.window(), Some((4096, 3 * 4096 - 1)));
        assert_eq!(space.mapped_words(), 8192);
        assert_eq!(space.first_vaddr(), Some(0));
    }

    #[test]
    fn test_flat_translation_is_bounds_check() {
        let mut frames = FrameAllocator::new(15);
        frames.allocate_frame().unwrap();
        let space = AddressSpace::new(
            Addressing::Flat,
            frames.allocate_contiguous(1).unwrap(),
            100,
        );
        assert_eq!(space.base(), Some(4096));
        assert_eq!(space.translate(4096), Some(4096));
        assert_eq!(space.translate(4195), Some(4195));
        assert_eq!(space.translate(4196), None);
        assert_eq!(space.translate(4095), None);
        assert_eq!(space.window(), Some((4096, 4195)));
        assert_eq!(space.mapped_words(), 100);
    }

    #[test]
    fn test_empty_space_translates_nothing() {
        let space = AddressSpace::empty(Addressing::Paged);
        assert_eq!(space.translate(0), None);
        assert_eq!(space.window(), None);
        assert_eq!(space.first_vaddr(), None);
    }

    #[test]
    fn test_clear_returns_frames() {
        let mut space = paged(3, 9000);
        let frames = space.clear();
        assert_eq!(frames.len(), 3);
        assert_eq!(space.page_count(), 0);
        assert_eq!(space.translate(0), None);
    }
}
