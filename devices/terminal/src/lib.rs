//! 控制台终端设备实现

use arch_trait::{Channel, Terminal};
use colored::Colorize;
use std::collections::VecDeque;
use std::io::{self, Write};

/// 输出去向
#[derive(Debug)]
enum Sink {
    /// 写到标准输出
    Stdout,
    /// 按通道缓存（测试和无头运行）
    Capture([String; 3]),
}

fn channel_index(channel: Channel) -> usize {
    match channel {
        Channel::Command => 0,
        Channel::App => 1,
        Channel::Kernel => 2,
    }
}

/// 控制台终端
///
/// 按键由宿主通过 [`ConsoleTerminal::feed`] 压入队列，内核在键盘中断里逐个读取。
#[derive(Debug)]
pub struct ConsoleTerminal {
    name: String,
    keys: VecDeque<u32>,
    sink: Sink,
    last_channel: Option<Channel>,
    at_line_start: bool,
}

impl ConsoleTerminal {
    /// 创建输出到标准输出的终端
    pub fn new(name: String) -> Self {
        Self {
            name,
            keys: VecDeque::new(),
            sink: Sink::Stdout,
            last_channel: None,
            at_line_start: true,
        }
    }

    /// 创建只缓存输出的终端
    pub fn captured(name: String) -> Self {
        Self {
            sink: Sink::Capture(Default::default()),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 压入一串按键
    pub fn feed(&mut self, text: &str) {
        self.keys.extend(text.chars().map(u32::from));
    }

    /// 压入单个按键码
    pub fn feed_key(&mut self, code: u32) {
        self.keys.push_back(code);
    }

    pub fn has_pending(&self) -> bool {
        !self.keys.is_empty()
    }

    /// 读取某个通道缓存的输出，非缓存模式下返回空串
    pub fn output(&self, channel: Channel) -> &str {
        match &self.sink {
            Sink::Capture(buffers) => &buffers[channel_index(channel)],
            Sink::Stdout => "",
        }
    }

    /// 清空所有缓存输出
    pub fn clear_output(&mut self) {
        if let Sink::Capture(buffers) = &mut self.sink {
            buffers.iter_mut().for_each(String::clear);
        }
    }

    fn tag(channel: Channel) -> String {
        let tag = format!("[{:>7}] ", channel.name());
        match channel {
            Channel::Command => tag.cyan().to_string(),
            Channel::App => tag.green().to_string(),
            Channel::Kernel => tag.yellow().to_string(),
        }
    }

    fn write_stdout(&mut self, channel: Channel, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if self.last_channel != Some(channel) && !self.at_line_start {
            // 通道切换时先结束上一行
            writeln!(out)?;
            self.at_line_start = true;
        }
        for piece in text.split_inclusive('\n') {
            if self.at_line_start {
                write!(out, "{}", Self::tag(channel))?;
            }
            write!(out, "{}", piece)?;
            self.at_line_start = piece.ends_with('\n');
        }
        self.last_channel = Some(channel);
        out.flush()
    }
}

impl Default for ConsoleTerminal {
    fn default() -> Self {
        Self::new("console".to_string())
    }
}

impl Terminal for ConsoleTerminal {
    fn read_typed_char(&mut self) -> u32 {
        self.keys.pop_front().unwrap_or(0)
    }

    fn print(&mut self, channel: Channel, text: &str) {
        if let Sink::Capture(buffers) = &mut self.sink {
            buffers[channel_index(channel)].push_str(text);
            return;
        }
        // 终端输出失败不影响内核
        let _ = self.write_stdout(channel, text);
    }
}
