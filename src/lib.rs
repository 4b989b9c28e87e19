//! 16 位教学模拟机的内核层
pub mod config;
pub mod kernel;
pub mod utils;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use arch_trait::InterruptCode;
use clap::Parser;
use cpu::SimCpu;
use disk::DirDisk;
use terminal::ConsoleTerminal;
use tracing::{debug, info, warn};

use crate::config::KernelConfig;
use crate::kernel::Kernel;

/// 教学模拟机内核
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 配置文件地址
    #[arg(short, long, default_value = "profile/config.toml")]
    pub config: String,

    /// 磁盘目录，镜像以 `<name>.bin` 存放
    #[arg(short, long, default_value = "disk")]
    pub disk: String,

    /// 启动时加载的程序（不含 .bin 后缀），缺省加载空闲程序
    #[arg(short, long)]
    pub image: Option<String>,

    /// 不在每行输入后发送时钟中断
    #[arg(long)]
    pub no_timer: bool,
}

/// 相对路径按项目根目录解析
fn resolve(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
    }
}

pub fn build_kernel_run_blocking(args: Args) -> Result<()> {
    let config = Rc::new(KernelConfig::new(resolve(&args.config))?);
    let disk_root = resolve(&args.disk);
    info!(disk = %disk_root.display(), "挂载磁盘");

    let mut kernel = Kernel::boot(
        SimCpu::new(config.memory.max_size),
        ConsoleTerminal::default(),
        DirDisk::new(&disk_root),
        config.clone(),
    );

    match &args.image {
        Some(name) => {
            let file = format!("{}.bin", name);
            kernel
                .load_program(&file)
                .with_context(|| format!("无法加载程序 '{}'", file))?;
        }
        None => {
            if let Err(e) = kernel.load_program(&config.process.idle_image) {
                warn!(image = %config.process.idle_image, error = %e, "空闲程序加载失败");
            }
        }
    }

    // 每行输入逐键送入键盘中断，一次只处理一个事件
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("无法读取标准输入")?;
        kernel.terminal_mut().feed(&line);
        kernel.terminal_mut().feed_key(u32::from(b'\n'));

        while kernel.terminal().has_pending() && kernel.cpu().is_on() {
            kernel.interrupt(InterruptCode::Keyboard);
        }
        if !kernel.cpu().is_on() {
            break;
        }
        if !args.no_timer {
            kernel.interrupt(InterruptCode::Timer);
        }
    }

    for event in kernel.get_events() {
        debug!(?event, "事件");
    }
    info!("模拟机已关机");
    Ok(())
}
