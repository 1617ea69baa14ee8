//! 模块归档编解码
//!
//! 归档是 gzip 压缩的 tar 容器，第一个条目固定为 `META-INF/MANIFEST.MF`。
//! 条目头中的时间戳与权限固定，使相同内容得到相同字节。

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::module::manifest::{headers, Manifest, MANIFEST_PATH};
use crate::utils::{CoreError, Result};

/// 归档条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// 归档写入器
pub struct ArchiveWriter {
    builder: tar::Builder<GzEncoder<Vec<u8>>>,
    entries: usize,
}

impl ArchiveWriter {
    /// 以清单作为第一个条目开始写入
    pub fn new(manifest: &Manifest) -> Result<Self> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut writer = Self {
            builder: tar::Builder::new(encoder),
            entries: 0,
        };
        writer.append(MANIFEST_PATH, manifest.render().as_bytes())?;
        Ok(writer)
    }

    /// 追加条目
    pub fn append(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        self.builder
            .append_data(&mut header, name, bytes)
            .map_err(|e| CoreError::ArchiveBuild {
                entry: name.to_string(),
                reason: e.to_string(),
            })?;
        self.entries += 1;
        Ok(())
    }

    /// 结束写入并返回归档字节
    pub fn finish(self) -> Result<Vec<u8>> {
        let entries = self.entries;
        let mut encoder = self.builder.into_inner()?;
        encoder.flush()?;
        let bytes = encoder.finish()?;
        debug!(entries, size = bytes.len(), "Archive written");
        Ok(bytes)
    }
}

/// 读取后的模块归档
#[derive(Debug, Clone)]
pub struct ModuleArchive {
    manifest: Manifest,
    entries: Vec<ArchiveEntry>,
}

impl ModuleArchive {
    /// 从字节读取归档
    ///
    /// 第一个条目必须是清单，否则返回 [`CoreError::InvalidArchive`]。
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut manifest = None;
        let mut entries = Vec::new();

        let iter = archive
            .entries()
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        for entry in iter {
            let mut entry = entry.map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
            let name = entry
                .path()
                .map_err(|e| CoreError::InvalidArchive(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| CoreError::InvalidArchive(format!("条目 '{}': {}", name, e)))?;

            if manifest.is_none() {
                if name != MANIFEST_PATH {
                    return Err(CoreError::InvalidArchive(format!(
                        "第一个条目应为 '{}'，实际为 '{}'",
                        MANIFEST_PATH, name
                    )));
                }
                let text = String::from_utf8(data).map_err(|e| {
                    CoreError::InvalidManifest(format!("清单不是有效的 UTF-8: {}", e))
                })?;
                manifest = Some(Manifest::parse(&text)?);
                continue;
            }
            entries.push(ArchiveEntry { name, bytes: data });
        }

        let manifest = manifest
            .ok_or_else(|| CoreError::InvalidArchive("归档中没有任何条目".to_string()))?;
        Ok(Self { manifest, entries })
    }

    /// 清单
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 除清单外的全部条目（按写入顺序）
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// 条目名列表
    pub fn entry_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// 按名称取条目字节
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bytes.as_slice())
    }

    /// 把某个条目作为嵌套归档读取
    pub fn nested(&self, name: &str) -> Result<ModuleArchive> {
        let bytes = self
            .entry(name)
            .ok_or_else(|| CoreError::InvalidArchive(format!("没有嵌套条目 '{}'", name)))?;
        ModuleArchive::read(bytes)
    }

    /// Module-SymbolicName 的值
    pub fn symbolic_name(&self) -> Option<&str> {
        self.manifest.get(headers::MODULE_SYMBOLIC_NAME)
    }
}
