//! 模拟机协作者 trait 定义
//!
//! 内核只通过这里的三个 trait 访问外部世界：CPU 核心、终端、磁盘。

use thiserror::Error;

/// 通用寄存器个数
pub const GPR_COUNT: usize = 8;

/// 设备错误类型
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("设备访问错误: {0}")]
    Access(String),
    #[error("文件不存在: {0}")]
    NotFound(String),
    #[error("镜像格式错误: {0}")]
    Format(String),
    #[error("设备 IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 中断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptCode {
    Keyboard,
    Timer,
    ProtectionFault,
}

/// 终端输出通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// 命令行回显
    Command,
    /// 应用程序输出
    App,
    /// 内核日志
    Kernel,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Command => "command",
            Channel::App => "app",
            Channel::Kernel => "kernel",
        }
    }
}

/// CPU 核心
///
/// 物理内存是 CPU 持有的一段扁平的 16 位字数组，内核只能通过
/// `pmem_read` / `pmem_write` 访问。
pub trait Cpu {
    /// 读取通用寄存器
    fn get_gpr(&self, index: usize) -> u16;

    /// 写入通用寄存器
    fn set_gpr(&mut self, index: usize, value: u16);

    /// 读取物理内存
    fn pmem_read(&self, paddr: u16) -> u16;

    /// 写入物理内存
    fn pmem_write(&mut self, paddr: u16, value: u16);

    /// 设置虚拟窗口起始物理地址
    fn set_vmem_paddr_init(&mut self, paddr: u16);

    /// 设置虚拟窗口结束物理地址（含）
    fn set_vmem_paddr_end(&mut self, paddr: u16);

    /// 设置程序计数器
    fn set_pc(&mut self, addr: u16);

    /// 关机
    fn turn_off(&mut self);
}

/// 终端
///
/// 按键分类谓词给出 ASCII 下的默认实现，具体终端可以覆盖。
pub trait Terminal {
    /// 读取一个已键入的按键码
    fn read_typed_char(&mut self) -> u32;

    /// 向通道输出文本
    fn print(&mut self, channel: Channel, text: &str);

    /// 向通道输出文本并换行
    fn println(&mut self, channel: Channel, text: &str) {
        self.print(channel, text);
        self.print(channel, "\n");
    }

    fn is_backspace(&self, code: u32) -> bool {
        code == 0x08 || code == 0x7f
    }

    fn is_alpha(&self, code: u32) -> bool {
        char::from_u32(code).is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn is_num(&self, code: u32) -> bool {
        char::from_u32(code).is_some_and(|c| c.is_ascii_digit())
    }

    fn is_return(&self, code: u32) -> bool {
        code == u32::from(b'\n') || code == u32::from(b'\r')
    }

    fn is_space(&self, code: u32) -> bool {
        code == u32::from(b' ')
    }
}

/// 磁盘（程序镜像加载器）
pub trait Disk {
    /// 镜像大小（以 16 位字计）
    fn get_file_size_words(&mut self, name: &str) -> Result<u32, DeviceError>;

    /// 把整个镜像读入一个 16 位字缓冲区
    fn load_from_disk_to_16bit_buffer(&mut self, name: &str) -> Result<Vec<u16>, DeviceError>;
}
