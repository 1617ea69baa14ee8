//! 模块描述文件解析器
//!
//! 负责从 YAML / JSON 描述文件解析模块描述，并通过 [`DescriptorFactory`] 构建 [`ModuleDescriptor`]。
//!
//! # 文件格式
//!
//! ```yaml
//! name: provider
//! fragment_host: testCase.host
//! imports:
//!   - name: org.example.api
//!     version: "[1.0,2.0)"
//!     optional: true
//! exports:
//!   - name: org.example.impl
//!     version: 1.0.0
//!     attributes: { vendor: chips }
//!     mandatory: [vendor]
//!     uses: [org.example.api]
//! include_dot: true
//! files:
//!   - entry: data/readme.txt
//!     path: readme.txt
//! classes: [org.example.impl.Impl]
//! modules:
//!   - on_load_path: true
//!     module:
//!       name: nested
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::module::clause::{ExportClause, ImportClause, VERSION_ATTRIBUTE};
use crate::module::content::ClassResource;
use crate::module::descriptor::{DescriptorFactory, ModuleDescriptor};
use crate::utils::{CoreError, Result};

/// 导入子句声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    /// 能力名
    pub name: String,

    /// 版本范围
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// 其他属性
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// 是否可选解析
    #[serde(default)]
    pub optional: bool,
}

impl ImportSpec {
    pub fn to_clause(&self) -> ImportClause {
        let clause = self
            .attributes
            .iter()
            .fold(ImportClause::new(&self.name), |c, (k, v)| c.attribute(k, v));
        let clause = match &self.version {
            Some(version) => clause.version(version),
            None => clause,
        };
        clause.resolution_optional(self.optional)
    }
}

/// 导出子句声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpec {
    /// 能力名
    pub name: String,

    /// 导出版本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// 其他属性
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// 强制属性键
    #[serde(default)]
    pub mandatory: Vec<String>,

    /// uses 约束
    #[serde(default)]
    pub uses: Vec<String>,
}

impl ExportSpec {
    pub fn to_clause(&self) -> ExportClause {
        let clause = self
            .attributes
            .iter()
            .fold(ExportClause::new(&self.name), |c, (k, v)| {
                c.mandatory_attribute(k, v, self.mandatory.contains(k))
            });
        let clause = match &self.version {
            Some(version) => clause.mandatory_attribute(
                VERSION_ATTRIBUTE,
                version,
                self.mandatory.iter().any(|k| k == VERSION_ATTRIBUTE),
            ),
            None => clause,
        };
        self.uses.iter().fold(clause, |c, p| c.uses(p))
    }
}

/// 文件条目：归档内条目名 + 相对于描述文件的路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub entry: String,
    pub path: String,
}

/// 嵌套模块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSpec {
    #[serde(default)]
    pub on_load_path: bool,
    pub module: Box<DescriptorFile>,
}

/// 描述文件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorFile {
    /// 模块名（不含前缀）
    #[serde(default)]
    pub name: String,

    /// 片段宿主符号名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_host: Option<String>,

    #[serde(default)]
    pub imports: Vec<ImportSpec>,

    #[serde(default)]
    pub exports: Vec<ExportSpec>,

    /// 是否把 `.` 放到加载路径
    #[serde(default)]
    pub include_dot: bool,

    /// 额外的加载路径项
    #[serde(default)]
    pub load_path: Vec<String>,

    #[serde(default)]
    pub files: Vec<FileSpec>,

    /// 要打包的类名
    #[serde(default)]
    pub classes: Vec<String>,

    #[serde(default)]
    pub modules: Vec<NestedSpec>,
}

/// 描述文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Yaml,
    Json,
}

impl DescriptorFormat {
    /// 按扩展名判断格式，未知扩展名按 YAML 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => DescriptorFormat::Json,
            _ => DescriptorFormat::Yaml,
        }
    }
}

/// 模块描述文件解析器
#[derive(Debug, Clone, Default)]
pub struct ModuleParser;

impl ModuleParser {
    pub fn new() -> Self {
        Self
    }

    /// 从文件解析描述
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取时返回 IO 错误
    /// - 内容不符合 YAML / JSON 格式时返回相应错误
    /// - 验证失败时返回 `InvalidDescriptor` 错误
    pub async fn parse_file(path: &Path) -> Result<DescriptorFile> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_string(&content, DescriptorFormat::from_path(path))
    }

    /// 从文件同步解析描述
    pub fn parse_file_sync(path: &Path) -> Result<DescriptorFile> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_string(&content, DescriptorFormat::from_path(path))
    }

    /// 从字符串解析描述
    pub fn parse_string(content: &str, format: DescriptorFormat) -> Result<DescriptorFile> {
        let file: DescriptorFile = match format {
            DescriptorFormat::Yaml => serde_yaml::from_str(content)?,
            DescriptorFormat::Json => serde_json::from_str(content)?,
        };
        Self::validate(&file)?;
        Ok(file)
    }

    /// 验证描述
    ///
    /// 执行以下验证：
    /// - 子句能力名非空
    /// - 强制属性键必须出现在属性中
    /// - 文件条目名与路径非空
    /// - 嵌套模块递归验证
    pub fn validate(file: &DescriptorFile) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        Self::collect_errors(file, "", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidDescriptor(errors.join("; ")))
        }
    }

    fn collect_errors(file: &DescriptorFile, scope: &str, errors: &mut Vec<String>) {
        let scope = if scope.is_empty() {
            format!("模块 '{}'", file.name)
        } else {
            format!("{} > '{}'", scope, file.name)
        };

        for (index, import) in file.imports.iter().enumerate() {
            if import.name.trim().is_empty() {
                errors.push(format!("{} 的第 {} 个导入缺少能力名", scope, index + 1));
            }
        }

        for (index, export) in file.exports.iter().enumerate() {
            if export.name.trim().is_empty() {
                errors.push(format!("{} 的第 {} 个导出缺少能力名", scope, index + 1));
            }
            for key in &export.mandatory {
                let has_version = key == VERSION_ATTRIBUTE && export.version.is_some();
                if !has_version && !export.attributes.contains_key(key) {
                    errors.push(format!(
                        "{} 的导出 '{}' 声明了强制属性 '{}'，但没有给出该属性",
                        scope, export.name, key
                    ));
                }
            }
        }

        for file_spec in &file.files {
            if file_spec.entry.is_empty() || file_spec.path.is_empty() {
                errors.push(format!("{} 含有空的文件条目", scope));
            }
        }

        if file.classes.iter().any(|c| c.trim().is_empty()) {
            errors.push(format!("{} 含有空的类名", scope));
        }

        for nested in &file.modules {
            Self::collect_errors(&nested.module, &scope, errors);
        }
    }

    /// 构建描述符
    ///
    /// 文件条目的路径相对于 `base_dir` 解析，内容在此刻读入。
    pub fn build(
        file: &DescriptorFile,
        factory: &DescriptorFactory,
        base_dir: &Path,
    ) -> Result<ModuleDescriptor> {
        let mut descriptor = factory.create(&file.name);
        descriptor.set_fragment_host(file.fragment_host.clone());

        for import in &file.imports {
            descriptor.add_import(import.to_clause());
        }
        for export in &file.exports {
            descriptor.add_export(export.to_clause());
        }
        for class_name in &file.classes {
            descriptor.add_class(ClassResource::new(class_name));
        }
        for file_spec in &file.files {
            let path = base_dir.join(&file_spec.path);
            let bytes = std::fs::read(&path).map_err(|e| CoreError::ArchiveBuild {
                entry: file_spec.entry.clone(),
                reason: format!("{}: {}", path.display(), e),
            })?;
            descriptor.add_bytes(&file_spec.entry, bytes);
        }
        for nested in &file.modules {
            let child = Self::build(&nested.module, factory, base_dir)?;
            descriptor.add_module(child, nested.on_load_path);
        }
        if file.include_dot {
            descriptor.set_dot_on_load_path(true);
        }
        for item in &file.load_path {
            descriptor.add_load_path(item);
        }

        debug!(
            module = %descriptor.symbolic_name(),
            imports = file.imports.len(),
            exports = file.exports.len(),
            "Descriptor built from file"
        );
        Ok(descriptor)
    }
}
