//! 工具包配置
//!
//! 定义场景编排的配置结构、加载逻辑以及运行器属性文件。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::vendor::VendorSelection;
use crate::module::content::{ClassResource, DirectoryClassSource, InMemoryClassSource};
use crate::module::descriptor::{ActivatorSpec, DescriptorFactory};
use crate::utils::{CoreError, Result};

/// 环境变量：框架厂商选择串
pub const ENV_VENDORS: &str = "CHIPS_MODKIT_VENDORS";
/// 环境变量：框架定义目录
pub const ENV_DEFINITIONS_DIR: &str = "CHIPS_MODKIT_DEFINITIONS_DIR";
/// 环境变量：依赖归档列表文件
pub const ENV_DEPENDENCY_FILE: &str = "CHIPS_MODKIT_DEPENDENCY_FILE";
/// 环境变量：额外的虚拟机参数
pub const ENV_VM_OPTION: &str = "CHIPS_MODKIT_VM_OPTION";
/// 环境变量：运行器属性文件
pub const ENV_RUNNER_PROPERTIES: &str = "CHIPS_MODKIT_RUNNER_PROPERTIES";

/// 默认运行器属性文件
pub const DEFAULT_RUNNER_PROPERTIES: &str = "META-INF/runner.properties";

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

fn default_name_prefix() -> String {
    "testCase.".to_string()
}

fn default_imports() -> String {
    "org.osgi.framework".to_string()
}

fn default_activator_class() -> String {
    "chips.modkit.genericmodule.Activator".to_string()
}

/// 场景编排配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 生成模块的符号名前缀，清理时据此识别
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// 总是导入的默认能力
    #[serde(default = "default_imports")]
    pub default_imports: String,

    /// 通用激活器类名
    #[serde(default = "default_activator_class")]
    pub activator_class: String,

    /// 类文件目录（系统类来源）
    #[serde(default)]
    pub class_dir: Option<PathBuf>,

    /// 自定义框架定义目录
    #[serde(default)]
    pub definition_dir: Option<PathBuf>,

    /// 框架厂商选择串，如 `felix/1.8.0, equinox`
    #[serde(default)]
    pub vendors: Option<String>,

    /// 依赖归档列表文件
    #[serde(default)]
    pub dependency_file: Option<PathBuf>,

    /// 额外的虚拟机参数
    #[serde(default)]
    pub vm_option: Option<String>,

    /// 运行器属性文件
    #[serde(default)]
    pub runner_properties: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            name_prefix: default_name_prefix(),
            default_imports: default_imports(),
            activator_class: default_activator_class(),
            class_dir: None,
            definition_dir: None,
            vendors: None,
            dependency_file: None,
            vm_option: None,
            runner_properties: None,
            logging: LogConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// 创建配置构建器
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::new()
    }

    /// 从文件加载配置（按扩展名选择 JSON 或 YAML）
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;

        let mut config: HarnessConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// 用给定的查找函数覆盖配置，空值被忽略
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(vendors) = get(ENV_VENDORS) {
            self.vendors = Some(vendors);
        }
        if let Some(dir) = get(ENV_DEFINITIONS_DIR) {
            self.definition_dir = Some(PathBuf::from(dir));
        }
        if let Some(file) = get(ENV_DEPENDENCY_FILE) {
            self.dependency_file = Some(PathBuf::from(file));
        }
        if let Some(option) = get(ENV_VM_OPTION) {
            self.vm_option = Some(option);
        }
        if let Some(file) = get(ENV_RUNNER_PROPERTIES) {
            self.runner_properties = Some(PathBuf::from(file));
        }
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: HarnessConfig) {
        // 只覆盖非默认值的配置
        if other.name_prefix != default_name_prefix() {
            self.name_prefix = other.name_prefix;
        }
        if other.default_imports != default_imports() {
            self.default_imports = other.default_imports;
        }
        if other.activator_class != default_activator_class() {
            self.activator_class = other.activator_class;
        }
        if other.class_dir.is_some() {
            self.class_dir = other.class_dir;
        }
        if other.definition_dir.is_some() {
            self.definition_dir = other.definition_dir;
        }
        if other.vendors.is_some() {
            self.vendors = other.vendors;
        }
        if other.dependency_file.is_some() {
            self.dependency_file = other.dependency_file;
        }
        if other.vm_option.is_some() {
            self.vm_option = other.vm_option;
        }
        if other.runner_properties.is_some() {
            self.runner_properties = other.runner_properties;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.name_prefix.is_empty() {
            return Err(CoreError::InvalidConfigValue {
                key: "name_prefix".to_string(),
                reason: "前缀为空时清理会卸载全部模块".to_string(),
            });
        }
        if self.activator_class.trim().is_empty() {
            return Err(CoreError::InvalidConfigValue {
                key: "activator_class".to_string(),
                reason: "激活器类名不能为空".to_string(),
            });
        }
        Ok(())
    }

    /// 创建描述符工厂
    ///
    /// 配置了 `class_dir` 时从该目录读取类文件；否则激活器以空条目写入。
    pub fn descriptor_factory(&self) -> DescriptorFactory {
        match &self.class_dir {
            Some(dir) => DescriptorFactory::new(
                self.name_prefix.clone(),
                self.default_imports.clone(),
                ActivatorSpec::new(ClassResource::new(self.activator_class.clone())),
            )
            .with_system_source(Arc::new(DirectoryClassSource::new(dir))),
            None => {
                debug!(activator = %self.activator_class, "No class dir configured, packing empty activator entry");
                let placeholder = InMemoryClassSource::new("placeholder")
                    .with_class(self.activator_class.clone(), Vec::new());
                DescriptorFactory::new(
                    self.name_prefix.clone(),
                    self.default_imports.clone(),
                    ActivatorSpec::new(ClassResource::with_source(
                        self.activator_class.clone(),
                        Arc::new(placeholder),
                    )),
                )
            }
        }
    }

    /// 解析厂商选择串
    pub fn vendor_selection(&self) -> Option<VendorSelection> {
        self.vendors.as_deref().map(VendorSelection::parse)
    }

    /// 加载运行器属性
    pub fn load_runner_properties(&self) -> Result<RunnerProperties> {
        let path = self
            .runner_properties
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNNER_PROPERTIES));
        RunnerProperties::load(&path)
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置符号名前缀
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.name_prefix = prefix.into();
        self
    }

    /// 设置默认导入
    pub fn default_imports(mut self, imports: impl Into<String>) -> Self {
        self.config.default_imports = imports.into();
        self
    }

    /// 设置激活器类名
    pub fn activator_class(mut self, class_name: impl Into<String>) -> Self {
        self.config.activator_class = class_name.into();
        self
    }

    /// 设置类文件目录
    pub fn class_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.class_dir = Some(dir.into());
        self
    }

    /// 设置框架定义目录
    pub fn definition_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.definition_dir = Some(dir.into());
        self
    }

    /// 设置厂商选择串
    pub fn vendors(mut self, vendors: impl Into<String>) -> Self {
        self.config.vendors = Some(vendors.into());
        self
    }

    /// 设置依赖归档列表文件
    pub fn dependency_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.dependency_file = Some(file.into());
        self
    }

    /// 设置虚拟机参数
    pub fn vm_option(mut self, option: impl Into<String>) -> Self {
        self.config.vm_option = Some(option.into());
        self
    }

    /// 设置运行器属性文件
    pub fn runner_properties(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.runner_properties = Some(file.into());
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

// ============================================================================
// 运行器属性
// ============================================================================

/// 运行器属性
///
/// `key=value` 或 `key: value` 行，`#` / `!` 开头为注释。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerProperties {
    values: BTreeMap<String, String>,
}

impl RunnerProperties {
    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取运行器属性 '{}': {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    /// 从文本解析，无法识别的行被跳过
    pub fn parse(content: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = match (line.find('='), line.find(':')) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            if let Some(index) = split {
                let key = line[..index].trim();
                let value = line[index + 1..].trim();
                if !key.is_empty() {
                    values.insert(key.to_string(), value.to_string());
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 运行器是否内置支持该厂商版本（存在 `platform.<vendor>.<version>`）
    pub fn is_platform_supported(&self, vendor: &str, version: &str) -> bool {
        self.values
            .contains_key(&format!("platform.{}.{}", vendor, version))
    }
}
