//! 程序加载

use arch_trait::{Cpu, Disk, Terminal};
use tracing::{debug, info};

use super::{AddressSpace, Event, Kernel, KernelError, Pcb, Pid};
use crate::config::PAGE_SIZE;

impl<C: Cpu, T: Terminal, D: Disk> Kernel<C, T, D> {
    /// 镜像所需的字数，超过物理内存大小时拒绝
    pub fn get_process_limit(&mut self, name: &str) -> Result<u16, KernelError> {
        let words = self.disk.get_file_size_words(name)?;
        let max = self.config.memory.max_size;
        if words as usize > max {
            return Err(KernelError::ImageTooLarge {
                name: name.to_string(),
                words,
                max,
            });
        }
        u16::try_from(words).map_err(|_| KernelError::ImageTooLarge {
            name: name.to_string(),
            words,
            max,
        })
    }

    /// 加载镜像并安装为新的前台进程
    ///
    /// 所有可能失败的检查都在终止旧的前台进程之前完成，失败时旧进程保持原样。
    pub fn load_program(&mut self, name: &str) -> Result<Pid, KernelError> {
        let limit = self.get_process_limit(name)?;
        let words = self.disk.load_from_disk_to_16bit_buffer(name)?;
        let num_pages = usize::from(limit).div_ceil(PAGE_SIZE).max(1);

        let releasing = self
            .processes
            .current()
            .map(|pcb| pcb.space().page_table().to_vec())
            .unwrap_or_default();
        if !self.frames.can_allocate_contiguous(num_pages, &releasing) {
            return Err(KernelError::ResourceExhausted {
                requested: num_pages,
                available: self.frames.available() + releasing.len(),
            });
        }

        if let Some(previous) = self.processes.current_pid() {
            info!(pid = previous, "加载新程序前终止前台进程");
            self.kill_process(previous);
        }
        self.reset_cpu();

        let frames = self.frames.allocate_contiguous(num_pages)?;
        debug!(name = %name, pages = num_pages, first = %frames[0], "分配物理帧");
        let space = AddressSpace::new(self.config.memory.addressing, frames, limit);
        if let Some((init, end)) = space.window() {
            self.cpu.set_vmem_paddr_init(init);
            self.cpu.set_vmem_paddr_end(end);
        }

        let first = space.first_vaddr().unwrap_or(0);
        for (offset, word) in words.iter().take(usize::from(limit)).enumerate() {
            let paddr = u16::try_from(usize::from(first) + offset)
                .ok()
                .and_then(|vaddr| space.translate(vaddr));
            match paddr {
                Some(paddr) => self.cpu.pmem_write(paddr, *word),
                None => break,
            }
        }

        let pc = space
            .first_vaddr()
            .and_then(|vaddr| space.translate(vaddr))
            .unwrap_or(0);
        let pid = self.processes.install(Pcb::new(name, space, pc))?;
        self.cpu.set_pc(pc);
        self.record(Event::Loaded(pid));
        info!(pid, name = %name, words = limit, pages = num_pages, pc, "程序加载完成");
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use arch_trait::{Channel, Cpu};

    use crate::config::{Addressing, KernelConfig};
    use crate::kernel::testing::{image, kernel_with};
    use crate::kernel::{Event, KernelError, ProcState};

    #[test]
    fn test_5000_words_take_two_frames() {
        let mut kernel = kernel_with(KernelConfig::default(), &[("prog.bin", image(5000))]);
        let pid = kernel.load_program("prog.bin").unwrap();

        let pcb = kernel.current_process().unwrap();
        assert_eq!(pcb.pid(), pid);
        assert_eq!(pcb.space().page_count(), 2);
        assert_eq!(kernel.frames().available(), 13);
        assert_eq!(kernel.cpu().vmem_window(), (0, 8191));
        assert!(kernel.get_events().contains(&Event::Loaded(pid)));
    }

    #[test]
    fn test_image_is_written_through_translator() {
        let words = image(5000);
        let mut kernel = kernel_with(KernelConfig::default(), &[("prog.bin", words.clone())]);
        kernel.load_program("prog.bin").unwrap();
        for vaddr in [0u16, 1, 4095, 4096, 4999] {
            assert_eq!(kernel.read_word(vaddr).unwrap(), words[usize::from(vaddr)]);
        }
        // 镜像之外、页之内的字保持为 0
        assert_eq!(kernel.read_word(5000).unwrap(), 0);
    }

    #[test]
    fn test_load_resets_cpu_state() {
        let mut kernel = kernel_with(KernelConfig::default(), &[("prog.bin", image(10))]);
        kernel.cpu_mut().set_gpr(2, 99);
        kernel.load_program("prog.bin").unwrap();
        assert_eq!(kernel.cpu().get_gpr(2), 0);
        assert_eq!(kernel.cpu().pc(), kernel.current_process().unwrap().pc);
    }

    #[test]
    fn test_image_too_large_keeps_previous_process() {
        let mut kernel = kernel_with(
            KernelConfig::default(),
            &[("prog.bin", image(100)), ("huge.bin", image(65536))],
        );
        let pid = kernel.load_program("prog.bin").unwrap();

        let result = kernel.load_program("huge.bin");
        assert!(matches!(
            result,
            Err(KernelError::ImageTooLarge { words: 65536, .. })
        ));
        let pcb = kernel.current_process().unwrap();
        assert_eq!(pcb.pid(), pid);
        assert_eq!(pcb.state(), ProcState::Active);
        assert_eq!(kernel.read_word(0).unwrap(), 1);
        assert_eq!(kernel.frames().available(), 14);
    }

    #[test]
    fn test_resource_exhausted_keeps_previous_process() {
        // 61441 个字需要 16 帧，而帧池只有 15 帧
        let mut kernel = kernel_with(
            KernelConfig::default(),
            &[("prog.bin", image(100)), ("big.bin", image(61441))],
        );
        let pid = kernel.load_program("prog.bin").unwrap();

        let result = kernel.load_program("big.bin");
        assert!(matches!(
            result,
            Err(KernelError::ResourceExhausted { requested: 16, available: 15 })
        ));
        assert_eq!(kernel.processes().current_pid(), Some(pid));
        assert_eq!(kernel.read_word(99).unwrap(), 100);
    }

    #[test]
    fn test_largest_accepted_image_exceeds_frame_pool() {
        // 65535 个字通过大小检查，但第 16 帧放不进 65535 字的物理内存
        let mut kernel = kernel_with(KernelConfig::default(), &[("max.bin", image(65535))]);
        assert_eq!(kernel.frames().capacity(), 15);
        assert_eq!(kernel.get_process_limit("max.bin").unwrap(), 65535);
        assert!(matches!(
            kernel.load_program("max.bin"),
            Err(KernelError::ResourceExhausted { requested: 16, available: 15 })
        ));
        assert!(kernel.current_process().is_none());
        assert_eq!(kernel.frames().available(), 15);
    }

    #[test]
    fn test_missing_image_keeps_previous_process() {
        let mut kernel = kernel_with(KernelConfig::default(), &[("prog.bin", image(100))]);
        let pid = kernel.load_program("prog.bin").unwrap();
        assert!(matches!(
            kernel.load_program("nope.bin"),
            Err(KernelError::Device(_))
        ));
        assert_eq!(kernel.processes().current_pid(), Some(pid));
    }

    #[test]
    fn test_reload_reuses_frames_of_killed_process() {
        let mut kernel = kernel_with(
            KernelConfig::default(),
            &[("a.bin", image(5000)), ("b.bin", image(8000))],
        );
        let a = kernel.load_program("a.bin").unwrap();
        let a_frames = kernel.current_process().unwrap().space().page_table().to_vec();

        let b = kernel.load_program("b.bin").unwrap();
        assert_ne!(a, b);
        assert_eq!(kernel.processes().get(a).unwrap().state(), ProcState::Terminated);
        assert_eq!(kernel.current_process().unwrap().space().page_table(), &a_frames[..]);
        assert_eq!(kernel.processes().live_count(), 1);
        assert_eq!(kernel.frames().available(), 13);
    }

    #[test]
    fn test_full_pool_can_be_reloaded_repeatedly() {
        // 15 帧整池的程序反复加载，帧必须被回收
        let mut kernel = kernel_with(KernelConfig::default(), &[("full.bin", image(61440))]);
        for _ in 0..5 {
            kernel.load_program("full.bin").unwrap();
            assert_eq!(kernel.frames().available(), 0);
        }
    }

    #[test]
    fn test_empty_image_gets_one_page() {
        let mut kernel = kernel_with(KernelConfig::default(), &[("empty.bin", Vec::new())]);
        kernel.load_program("empty.bin").unwrap();
        assert_eq!(kernel.current_process().unwrap().space().page_count(), 1);
    }

    #[test]
    fn test_flat_mode_load() {
        let mut config = KernelConfig::default();
        config.memory.addressing = Addressing::Flat;
        let mut kernel = kernel_with(config, &[("a.bin", image(10)), ("b.bin", image(100))]);
        kernel.load_program("a.bin").unwrap();
        kernel.load_program("b.bin").unwrap();

        // a 的帧已回收，b 从帧 0 开始
        let pcb = kernel.current_process().unwrap();
        assert_eq!(pcb.space().base(), Some(0));
        assert_eq!(pcb.pc, 0);
        assert_eq!(kernel.cpu().vmem_window(), (0, 99));
        assert_eq!(kernel.read_word(99).unwrap(), 100);
        assert_eq!(kernel.read_word(100).unwrap(), 0);
        assert_eq!(
            kernel.process_info(),
            "pid 2 (b.bin) active base 0x0000 limit 100 pc 0x0000"
        );
        assert!(
            kernel
                .terminal()
                .output(Channel::Kernel)
                .contains("out of bounds read at vaddr 0x0064")
        );
    }
}
