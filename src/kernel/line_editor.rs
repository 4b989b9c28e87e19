//! 键盘行编辑器与命令解析

/// 行编辑器命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `load <name>`，加载 `<name>.bin`
    Load(String),
    KillProcess,
    InfoProcess,
    Quit,
}

impl Command {
    /// 解析一行输入，空行和无法识别的输入返回 None
    pub fn parse(line: &str) -> Option<Command> {
        let mut words = line.split_whitespace();
        let command = match (words.next()?, words.next(), words.next()) {
            ("load", Some(name), None) => Command::Load(name.to_string()),
            ("killprocess", None, None) => Command::KillProcess,
            ("infoprocess", None, None) => Command::InfoProcess,
            ("quit", None, None) => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// 行缓冲
#[derive(Debug, Default, Clone)]
pub struct LineEditor {
    buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    /// 删除最后一个字符，缓冲为空时返回 false
    pub fn backspace(&mut self) -> bool {
        self.buffer.pop().is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 取出整行并清空缓冲
    pub fn take_line(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}
