use anyhow::{self, Context};
use serde::Deserialize;
use std::path::Path;

/// 页大小（16 位字）
pub const PAGE_SIZE: usize = 4096;
/// 帧池上限
pub const MAX_FRAMES: usize = 1024;
/// 物理内存默认大小（16 位字）
pub const DEFAULT_MAX_SIZE: usize = 65535;

/// 地址模式
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    /// 页表翻译
    #[default]
    Paged,
    /// 旧式 (base, limit) 连续窗口，虚拟地址即物理地址
    Flat,
}

/// 越界访问策略
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutOfBoundsPolicy {
    /// 记录到内核通道，读返回 0，写丢弃
    #[default]
    Ignore,
    /// 按保护错误处理，杀死进程
    Fault,
}

/// 退格回显方式
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EraseMode {
    /// 光标左移、空格、光标左移
    #[default]
    Cursor,
    /// 回车后重绘整行
    Redraw,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default)]
    pub addressing: Addressing,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProcessConfig {
    #[serde(default = "default_idle_image")]
    pub idle_image: String,
    #[serde(default)]
    pub out_of_bounds: OutOfBoundsPolicy,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TerminalConfig {
    #[serde(default)]
    pub erase_mode: EraseMode,
    #[serde(default = "default_true")]
    pub banner: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DebugConfig {
    #[serde(default = "default_event_list_size")]
    pub event_list_size: usize,
}

fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

fn default_idle_image() -> String {
    "idle.bin".to_string()
}

fn default_true() -> bool {
    true
}

fn default_event_list_size() -> usize {
    64
}

/// 内核配置（来自 profile/config.toml）
#[derive(Deserialize, Debug, Clone)]
pub struct KernelConfig {
    pub memory: MemoryConfig,
    pub process: ProcessConfig,
    pub terminal: TerminalConfig,
    pub debug: DebugConfig,
}

impl KernelConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<KernelConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取配置文件: {:?}", &path.as_ref().as_os_str()))?;
        let config = Self::parse(&toml_str)
            .with_context(|| format!("无法解析配置文件: {:?}", &path.as_ref().as_os_str()))?;
        anyhow::Ok(config)
    }

    pub fn parse(toml_str: &str) -> anyhow::Result<KernelConfig> {
        let config: KernelConfig = toml::from_str(toml_str)?;
        if config.memory.max_size < PAGE_SIZE || config.memory.max_size > usize::from(u16::MAX) {
            anyhow::bail!(
                "memory.max_size 必须在 {} 到 {} 之间, 实际为 {}",
                PAGE_SIZE,
                u16::MAX,
                config.memory.max_size
            );
        }
        if config.debug.event_list_size == 0 {
            anyhow::bail!("debug.event_list_size 不能为 0");
        }
        anyhow::Ok(config)
    }

    /// 帧池大小：不超过 MAX_FRAMES，且每一帧都要完整落在物理内存内
    pub fn frame_pool_size(&self) -> usize {
        (self.memory.max_size / PAGE_SIZE).min(MAX_FRAMES)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig {
                max_size: DEFAULT_MAX_SIZE,
                addressing: Addressing::Paged,
            },
            process: ProcessConfig {
                idle_image: default_idle_image(),
                out_of_bounds: OutOfBoundsPolicy::Ignore,
            },
            terminal: TerminalConfig {
                erase_mode: EraseMode::Cursor,
                banner: true,
            },
            debug: DebugConfig {
                event_list_size: default_event_list_size(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_profile() {
        let config = KernelConfig::parse(
            r#"
            [memory]
            max_size = 65535
            addressing = "flat"

            [process]
            idle_image = "shell.bin"
            out_of_bounds = "fault"

            [terminal]
            erase_mode = "redraw"
            banner = false

            [debug]
            event_list_size = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.memory.addressing, Addressing::Flat);
        assert_eq!(config.process.idle_image, "shell.bin");
        assert_eq!(config.process.out_of_bounds, OutOfBoundsPolicy::Fault);
        assert_eq!(config.terminal.erase_mode, EraseMode::Redraw);
        assert!(!config.terminal.banner);
        assert_eq!(config.debug.event_list_size, 8);
    }

    #[test]
    fn test_parse_defaults() {
        let config = KernelConfig::parse("[memory]\n[process]\n[terminal]\n[debug]\n").unwrap();
        assert_eq!(config.memory.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.memory.addressing, Addressing::Paged);
        assert_eq!(config.process.out_of_bounds, OutOfBoundsPolicy::Ignore);
        assert_eq!(config.terminal.erase_mode, EraseMode::Cursor);
        assert!(config.terminal.banner);
    }

    #[test]
    fn test_reject_oversized_memory() {
        let result = KernelConfig::parse(
            "[memory]\nmax_size = 70000\n[process]\n[terminal]\n[debug]\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_pool_size() {
        // 65535 个字只放得下 15 个完整的 4096 字帧
        assert_eq!(KernelConfig::default().frame_pool_size(), 15);
    }

    #[test]
    fn test_shipped_profile_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("profile/config.toml");
        let config = KernelConfig::new(path).unwrap();
        assert_eq!(config.memory.max_size, DEFAULT_MAX_SIZE);
    }
}
