//! 磁盘设备：程序镜像的来源
//!
//! 镜像格式：小端序 16 位字的扁平序列，文件长度必须是偶数字节。

use arch_trait::{DeviceError, Disk};
use rustc_hash::FxHashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 把原始字节解码为 16 位字
pub fn decode_words(name: &str, bytes: &[u8]) -> Result<Vec<u16>, DeviceError> {
    if bytes.len() % 2 != 0 {
        return Err(DeviceError::Format(format!(
            "{}: 长度 {} 不是 16 位字的整数倍",
            name,
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// 以目录为磁盘，每个镜像一个文件
#[derive(Debug)]
pub struct DirDisk {
    root: PathBuf,
    cache: FxHashMap<String, CachedImage>,
}

/// 解码后的镜像，文件长度和修改时间都未变时才复用
#[derive(Debug)]
struct CachedImage {
    len: u64,
    modified: Option<SystemTime>,
    words: Vec<u16>,
}

impl DirDisk {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: FxHashMap::default(),
        }
    }

    fn metadata(&self, name: &str) -> Result<(PathBuf, fs::Metadata), DeviceError> {
        let path = self.root.join(name);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok((path, meta)),
            Ok(_) => Err(DeviceError::NotFound(path.display().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DeviceError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Disk for DirDisk {
    /// 只看文件元数据，不读取内容
    fn get_file_size_words(&mut self, name: &str) -> Result<u32, DeviceError> {
        let (_, meta) = self.metadata(name)?;
        let bytes = meta.len();
        if bytes % 2 != 0 {
            return Err(DeviceError::Format(format!(
                "{}: 长度 {} 不是 16 位字的整数倍",
                name, bytes
            )));
        }
        u32::try_from(bytes / 2).map_err(|_| DeviceError::Format(format!("{}: 镜像过大", name)))
    }

    fn load_from_disk_to_16bit_buffer(&mut self, name: &str) -> Result<Vec<u16>, DeviceError> {
        let (path, meta) = self.metadata(name)?;
        let modified = meta.modified().ok();
        if let Some(cached) = self
            .cache
            .get(name)
            .filter(|cached| cached.len == meta.len() && cached.modified == modified)
        {
            return Ok(cached.words.clone());
        }

        let bytes = fs::read(&path)?;
        let words = decode_words(name, &bytes)?;
        self.cache.insert(
            name.to_string(),
            CachedImage {
                len: bytes.len() as u64,
                modified,
                words: words.clone(),
            },
        );
        Ok(words)
    }
}

/// 内存磁盘，镜像直接以字序列给出
#[derive(Debug, Default)]
pub struct MemDisk {
    images: FxHashMap<String, Vec<u16>>,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, words: Vec<u16>) {
        self.images.insert(name.to_string(), words);
    }

    pub fn with_image(mut self, name: &str, words: Vec<u16>) -> Self {
        self.insert(name, words);
        self
    }
}

impl Disk for MemDisk {
    fn get_file_size_words(&mut self, name: &str) -> Result<u32, DeviceError> {
        let image = self
            .images
            .get(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
        u32::try_from(image.len()).map_err(|_| DeviceError::Format(format!("{}: 镜像过大", name)))
    }

    fn load_from_disk_to_16bit_buffer(&mut self, name: &str) -> Result<Vec<u16>, DeviceError> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }
}
