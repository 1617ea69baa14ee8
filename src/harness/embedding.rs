//! 探针模块定制
//!
//! 场景代码本身也被打包成一个"探针"模块安装到运行时。探针依赖的外部归档需要嵌入其中，
//! 并放到加载路径上：加载路径固定为 `.` 后跟各归档的文件名。

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::config::HarnessConfig;
use crate::module::descriptor::{ModuleDescriptor, DOT};
use crate::utils::{CoreError, Result};

/// 探针定制器
#[derive(Debug, Clone, Default)]
pub struct ProbeCustomizer {
    embedded: Vec<PathBuf>,
}

impl ProbeCustomizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从依赖列表文件创建：每行一个归档路径，空行跳过
    pub fn from_dependency_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigLoadFailed(format!(
                "无法读取探针依赖列表 '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut customizer = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() {
                customizer.add_embedded(line);
            }
        }
        debug!(
            path = %path.display(),
            archives = customizer.embedded.len(),
            "Dependency list loaded"
        );
        Ok(customizer)
    }

    /// 按配置创建，未配置依赖列表时返回 `None`
    pub fn from_config(config: &HarnessConfig) -> Result<Option<Self>> {
        config
            .dependency_file
            .as_deref()
            .map(Self::from_dependency_file)
            .transpose()
    }

    /// 添加要嵌入的归档
    pub fn add_embedded(&mut self, path: impl Into<PathBuf>) {
        self.embedded.push(path.into());
    }

    /// 要嵌入的归档
    pub fn embedded(&self) -> &[PathBuf] {
        &self.embedded
    }

    /// 嵌入全部归档并重写加载路径
    pub fn customize(&self, mut descriptor: ModuleDescriptor) -> Result<ModuleDescriptor> {
        let mut load_path = vec![DOT.to_string()];

        for path in &self.embedded {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| CoreError::ArchiveBuild {
                    entry: path.display().to_string(),
                    reason: "路径没有文件名".to_string(),
                })?;
            let bytes = std::fs::read(path).map_err(|e| CoreError::ArchiveBuild {
                entry: file_name.clone(),
                reason: format!("{}: {}", path.display(), e),
            })?;
            descriptor.add_bytes(file_name.clone(), bytes);
            load_path.push(file_name);
        }

        descriptor.set_load_path(load_path);
        info!(
            module = %descriptor.symbolic_name(),
            embedded = self.embedded.len(),
            "Probe customized"
        );
        Ok(descriptor)
    }
}
