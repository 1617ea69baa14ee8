//! 模块描述符
//!
//! [`ModuleDescriptor`] 以可链式调用的方式描述一个合成模块：名称、宿主、导入导出子句、
//! 加载路径以及要打包的内容，并负责把自身渲染为清单与归档字节。
//!
//! 归档名沿用 `.jar` 后缀，仅用于标识模块与安装位置；容器本身是 gzip 压缩的 tar，
//! 见 [`crate::module::archive`]。
//!
//! 条目名一律是归档内的相对路径：开头的 `/` 会被去掉，含 `..` 段或为空的条目名
//! 在 [`ModuleDescriptor::serialize`] 时返回 [`CoreError::InvalidDescriptor`]。
//!
//! # 示例
//!
//! ```rust
//! use chips_modkit::module::clause::ExportClause;
//! use chips_modkit::module::content::{ClassResource, InMemoryClassSource};
//! use chips_modkit::module::descriptor::{ActivatorSpec, ModuleDescriptor};
//! use std::sync::Arc;
//!
//! let source = Arc::new(InMemoryClassSource::new("mem").with_class("x.Activator", vec![0u8]));
//! let activator = ActivatorSpec::new(ClassResource::with_source("x.Activator", source));
//! let descriptor = ModuleDescriptor::new("a", "testCase.", activator, "org.osgi.framework")
//!     .export(ExportClause::new("x.y").version("1.0.0"));
//!
//! assert_eq!(descriptor.symbolic_name(), "testCase.a");
//! assert_eq!(descriptor.archive_name(), "testCase.a.jar");
//! let bytes = descriptor.serialize().unwrap();
//! assert!(!bytes.is_empty());
//! ```

use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::module::archive::ArchiveWriter;
use crate::module::clause::{render_exports, render_imports, ExportClause, ImportClause};
use crate::module::content::{ClassResource, ClassSource, ContentSource};
use crate::module::manifest::{
    headers, Manifest, MANIFEST_VERSION_VALUE, MODULE_MANIFEST_VERSION_VALUE,
};
use crate::utils::{CoreError, Result};
use crate::wiring::framework::ModuleHandle;

/// 归档文件后缀，只作为模块标识，不代表容器格式
pub const ARCHIVE_SUFFIX: &str = ".jar";

/// 加载路径中的"模块根目录"
pub const DOT: &str = ".";

/// 通用激活器
#[derive(Debug, Clone)]
pub struct ActivatorSpec {
    /// 激活器类名
    pub class_name: String,
    /// 激活器类资源
    pub resource: ClassResource,
}

impl ActivatorSpec {
    pub fn new(resource: ClassResource) -> Self {
        Self {
            class_name: resource.class_name().to_string(),
            resource,
        }
    }
}

/// 模块描述符
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: String,
    name_prefix: String,
    default_imports: String,
    activator: ActivatorSpec,
    fragment_host: Option<String>,
    imports: Vec<ImportClause>,
    exports: Vec<ExportClause>,
    load_path: Vec<String>,
    contents: Vec<(String, ContentSource)>,
    system_source: Option<Arc<dyn ClassSource>>,
}

impl ModuleDescriptor {
    /// 创建描述符，激活器立即被放入内容
    pub fn new(
        name: impl Into<String>,
        name_prefix: impl Into<String>,
        activator: ActivatorSpec,
        default_imports: impl Into<String>,
    ) -> Self {
        let mut descriptor = Self {
            name: name.into(),
            name_prefix: name_prefix.into(),
            default_imports: default_imports.into(),
            activator: activator.clone(),
            fragment_host: None,
            imports: Vec::new(),
            exports: Vec::new(),
            load_path: Vec::new(),
            contents: Vec::new(),
            system_source: None,
        };
        descriptor.add_class(activator.resource);
        descriptor
    }

    // ========================================================================
    // 链式构建
    // ========================================================================

    /// 设置名称（不含前缀）
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    /// 设置片段宿主的符号名
    pub fn fragment_host(mut self, host_symbolic_name: impl Into<String>) -> Self {
        self.set_fragment_host(Some(host_symbolic_name.into()));
        self
    }

    /// 以已安装模块作为片段宿主
    pub fn fragment_host_of(self, host: &ModuleHandle) -> Self {
        self.fragment_host(host.symbolic_name.clone())
    }

    /// 添加导入子句
    pub fn import(mut self, clause: ImportClause) -> Self {
        self.add_import(clause);
        self
    }

    /// 添加导出子句
    pub fn export(mut self, clause: ExportClause) -> Self {
        self.add_export(clause);
        self
    }

    /// 打包原始字节
    pub fn pack_bytes(mut self, entry_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.add_bytes(entry_name, bytes);
        self
    }

    /// 打包读取器中的内容（立即复制）
    pub fn pack_reader(mut self, entry_name: impl Into<String>, reader: impl Read) -> Result<Self> {
        self.add_reader(entry_name, reader)?;
        Ok(self)
    }

    /// 打包类资源，条目名由类名推导
    pub fn pack_class(mut self, resource: ClassResource) -> Self {
        self.add_class(resource);
        self
    }

    /// 打包嵌套模块，可选地放到加载路径上
    pub fn pack_module(mut self, descriptor: ModuleDescriptor, on_load_path: bool) -> Self {
        self.add_module(descriptor, on_load_path);
        self
    }

    /// 是否把 `.` 放到加载路径上
    pub fn include_dot_on_load_path(mut self, include: bool) -> Self {
        self.set_dot_on_load_path(include);
        self
    }

    /// 指定系统类来源，类资源自身来源未命中时使用
    pub fn system_source(mut self, source: Arc<dyn ClassSource>) -> Self {
        self.system_source = Some(source);
        self
    }

    // ========================================================================
    // 可变引用版本
    // ========================================================================

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// 设置或清除片段宿主，空串视为清除
    pub fn set_fragment_host(&mut self, host_symbolic_name: Option<String>) {
        self.fragment_host = host_symbolic_name.filter(|h| !h.is_empty());
    }

    pub fn add_import(&mut self, clause: ImportClause) {
        self.imports.push(clause);
    }

    pub fn add_export(&mut self, clause: ExportClause) {
        self.exports.push(clause);
    }

    pub fn add_bytes(&mut self, entry_name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.put_content(entry_name.into(), ContentSource::Bytes(bytes.into()));
    }

    pub fn add_reader(&mut self, entry_name: impl Into<String>, mut reader: impl Read) -> Result<()> {
        let entry_name = entry_name.into();
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| CoreError::ArchiveBuild {
                entry: entry_name.clone(),
                reason: e.to_string(),
            })?;
        self.put_content(entry_name, ContentSource::Bytes(bytes));
        Ok(())
    }

    pub fn add_class(&mut self, resource: ClassResource) {
        self.put_content(resource.entry_name(), ContentSource::Class(resource));
    }

    pub fn add_module(&mut self, descriptor: ModuleDescriptor, on_load_path: bool) {
        let entry_name = descriptor.archive_name();
        if on_load_path {
            self.add_load_path(entry_name.clone());
        }
        self.put_content(entry_name, ContentSource::Module(Box::new(descriptor)));
    }

    /// 添加加载路径项，重复项被忽略
    pub fn add_load_path(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.load_path.contains(&item) {
            self.load_path.push(item);
        }
    }

    /// 替换整个加载路径（去重，保持顺序）
    pub fn set_load_path<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_path.clear();
        for item in items {
            self.add_load_path(item);
        }
    }

    pub fn set_dot_on_load_path(&mut self, include: bool) {
        if include {
            self.add_load_path(DOT);
        } else {
            self.load_path.retain(|item| item != DOT);
        }
    }

    /// 同名条目后写覆盖先写，但保留首次出现的位置
    fn put_content(&mut self, entry_name: String, source: ContentSource) {
        let entry_name = if entry_name.starts_with('/') {
            entry_name.trim_start_matches('/').to_string()
        } else {
            entry_name
        };
        match self.contents.iter_mut().find(|(name, _)| *name == entry_name) {
            Some(entry) => entry.1 = source,
            None => self.contents.push((entry_name, source)),
        }
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 符号名：前缀 + 名称
    pub fn symbolic_name(&self) -> String {
        format!("{}{}", self.name_prefix, self.name)
    }

    /// 归档名：符号名 + `.jar`
    pub fn archive_name(&self) -> String {
        format!("{}{}", self.symbolic_name(), ARCHIVE_SUFFIX)
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn activator(&self) -> &ActivatorSpec {
        &self.activator
    }

    pub fn fragment_host_name(&self) -> Option<&str> {
        self.fragment_host.as_deref()
    }

    pub fn imports(&self) -> &[ImportClause] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportClause] {
        &self.exports
    }

    pub fn load_path(&self) -> &[String] {
        &self.load_path
    }

    /// 内容条目名（按插入顺序）
    pub fn content_names(&self) -> Vec<&str> {
        self.contents.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 按条目名取内容
    pub fn content(&self, entry_name: &str) -> Option<&ContentSource> {
        self.contents
            .iter()
            .find(|(name, _)| name == entry_name)
            .map(|(_, source)| source)
    }

    /// 已打包的类名
    pub fn class_resources(&self) -> Vec<&str> {
        self.contents
            .iter()
            .filter_map(|(_, source)| match source {
                ContentSource::Class(resource) => Some(resource.class_name()),
                _ => None,
            })
            .collect()
    }

    // ========================================================================
    // 渲染
    // ========================================================================

    /// 渲染清单
    pub fn render_metadata(&self) -> Manifest {
        let symbolic_name = self.symbolic_name();
        let mut manifest = Manifest::new();
        manifest.insert(headers::MANIFEST_VERSION, MANIFEST_VERSION_VALUE);
        manifest.insert(headers::MODULE_MANIFEST_VERSION, MODULE_MANIFEST_VERSION_VALUE);
        manifest.insert(headers::MODULE_NAME, symbolic_name.clone());
        manifest.insert(headers::MODULE_SYMBOLIC_NAME, symbolic_name);
        manifest.insert(
            headers::IMPORT_PACKAGE,
            render_imports(&self.default_imports, &self.imports),
        );
        if !self.exports.is_empty() {
            manifest.insert(headers::EXPORT_PACKAGE, render_exports(&self.exports));
        }
        if !self.load_path.is_empty() {
            manifest.insert(headers::MODULE_CLASSPATH, self.load_path.join(", "));
        }
        match &self.fragment_host {
            Some(host) => manifest.insert(headers::FRAGMENT_HOST, host.clone()),
            None => manifest.insert(headers::MODULE_ACTIVATOR, self.activator.class_name.clone()),
        }
        manifest
    }

    /// 序列化为归档字节
    ///
    /// 清单在前，随后按插入顺序写入每个内容条目；嵌套模块在此刻递归渲染。
    pub fn serialize(&self) -> Result<Vec<u8>> {
        for (entry_name, _) in &self.contents {
            check_entry_name(&self.symbolic_name(), entry_name)?;
        }
        let mut writer = ArchiveWriter::new(&self.render_metadata())?;
        for (entry_name, source) in &self.contents {
            let bytes = self.content_bytes(entry_name, source)?;
            writer.append(entry_name, &bytes)?;
        }
        let bytes = writer.finish()?;
        debug!(
            module = %self.symbolic_name(),
            entries = self.contents.len(),
            size = bytes.len(),
            "Module serialized"
        );
        Ok(bytes)
    }

    fn content_bytes(&self, entry_name: &str, source: &ContentSource) -> Result<Vec<u8>> {
        match source {
            ContentSource::Bytes(bytes) => Ok(bytes.clone()),
            ContentSource::Class(resource) => resource
                .read(self.system_source.as_deref())
                .map_err(|e| CoreError::ArchiveBuild {
                    entry: entry_name.to_string(),
                    reason: e.to_string(),
                })?
                .ok_or_else(|| CoreError::ArchiveBuild {
                    entry: entry_name.to_string(),
                    reason: format!("无法读取类 '{}'", resource.class_name()),
                }),
            ContentSource::Module(nested) => nested.serialize(),
        }
    }
}

fn check_entry_name(module: &str, entry_name: &str) -> Result<()> {
    if entry_name.is_empty() || entry_name.split('/').any(|segment| segment == "..") {
        return Err(CoreError::InvalidDescriptor(format!(
            "模块 '{}' 的条目名 '{}' 必须是归档内的相对路径且不含 '..'",
            module, entry_name
        )));
    }
    Ok(())
}

/// 描述符工厂
///
/// 保存前缀、默认导入、激活器与系统类来源，按名称批量创建描述符。
#[derive(Debug, Clone)]
pub struct DescriptorFactory {
    name_prefix: String,
    default_imports: String,
    activator: ActivatorSpec,
    system_source: Option<Arc<dyn ClassSource>>,
}

impl DescriptorFactory {
    pub fn new(
        name_prefix: impl Into<String>,
        default_imports: impl Into<String>,
        activator: ActivatorSpec,
    ) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            default_imports: default_imports.into(),
            activator,
            system_source: None,
        }
    }

    /// 设置系统类来源
    pub fn with_system_source(mut self, source: Arc<dyn ClassSource>) -> Self {
        self.system_source = Some(source);
        self
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// 创建描述符
    pub fn create(&self, name: impl Into<String>) -> ModuleDescriptor {
        let descriptor = ModuleDescriptor::new(
            name,
            self.name_prefix.clone(),
            self.activator.clone(),
            self.default_imports.clone(),
        );
        match &self.system_source {
            Some(source) => descriptor.system_source(Arc::clone(source)),
            None => descriptor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::archive::ModuleArchive;
    use crate::module::content::InMemoryClassSource;

    const ACTIVATOR: &str = "chips.modkit.genericmodule.Activator";

    fn descriptor(name: &str) -> ModuleDescriptor {
        let source: Arc<dyn ClassSource> =
            Arc::new(InMemoryClassSource::new("test").with_class(ACTIVATOR, vec![0xCA, 0xFE]));
        let activator = ActivatorSpec::new(ClassResource::with_source(ACTIVATOR, source));
        ModuleDescriptor::new(name, "testCase.", activator, "org.osgi.framework")
    }

    #[test]
    fn test_names() {
        let d = descriptor("a");
        assert_eq!(d.symbolic_name(), "testCase.a");
        assert_eq!(d.archive_name(), "testCase.a.jar");
        assert_eq!(descriptor("").symbolic_name(), "testCase.");
    }

    #[test]
    fn test_activator_always_packed() {
        let d = descriptor("a").fragment_host("testCase.host");
        assert_eq!(d.class_resources(), vec![ACTIVATOR]);
        let manifest = d.render_metadata();
        assert_eq!(manifest.get(headers::FRAGMENT_HOST), Some("testCase.host"));
        assert!(!manifest.contains_key(headers::MODULE_ACTIVATOR));
    }

    #[test]
    fn test_metadata_key_order() {
        let d = descriptor("a")
            .export(ExportClause::new("x"))
            .include_dot_on_load_path(true);
        assert_eq!(
            d.render_metadata().keys(),
            vec![
                headers::MANIFEST_VERSION,
                headers::MODULE_MANIFEST_VERSION,
                headers::MODULE_NAME,
                headers::MODULE_SYMBOLIC_NAME,
                headers::IMPORT_PACKAGE,
                headers::EXPORT_PACKAGE,
                headers::MODULE_CLASSPATH,
                headers::MODULE_ACTIVATOR,
            ]
        );
    }

    #[test]
    fn test_minimal_metadata() {
        let manifest = descriptor("a").render_metadata();
        assert_eq!(manifest.get(headers::IMPORT_PACKAGE), Some("org.osgi.framework"));
        assert!(!manifest.contains_key(headers::EXPORT_PACKAGE));
        assert!(!manifest.contains_key(headers::MODULE_CLASSPATH));
        assert_eq!(manifest.get(headers::MODULE_ACTIVATOR), Some(ACTIVATOR));
    }

    #[test]
    fn test_load_path_dedup_and_dot_removal() {
        let d = descriptor("outer")
            .include_dot_on_load_path(true)
            .include_dot_on_load_path(true)
            .pack_module(descriptor("inner"), true)
            .include_dot_on_load_path(false);
        assert_eq!(d.load_path(), &["testCase.inner.jar".to_string()]);
    }

    #[test]
    fn test_overwrite_keeps_first_position() {
        let d = descriptor("a")
            .pack_bytes("one", b"1".to_vec())
            .pack_bytes("two", b"2".to_vec())
            .pack_bytes("one", b"3".to_vec());
        let names = d.content_names();
        assert_eq!(names, vec!["chips/modkit/genericmodule/Activator.class", "one", "two"]);
        assert!(matches!(d.content("one"), Some(ContentSource::Bytes(b)) if b == b"3"));
    }

    #[test]
    fn test_pack_reader_copies_immediately() {
        let data = b"payload".to_vec();
        let d = descriptor("a").pack_reader("p.bin", &data[..]).unwrap();
        drop(data);
        assert!(matches!(d.content("p.bin"), Some(ContentSource::Bytes(b)) if b == b"payload"));
    }

    #[test]
    fn test_serialize_is_repeatable() {
        let d = descriptor("a").export(ExportClause::new("x").version("1.0"));
        let first = d.serialize().unwrap();
        let second = d.serialize().unwrap();
        assert_eq!(first, second);

        let archive = ModuleArchive::read(&first).unwrap();
        assert_eq!(archive.manifest(), &d.render_metadata());
        assert_eq!(
            archive.entry("chips/modkit/genericmodule/Activator.class"),
            Some(&[0xCA, 0xFE][..])
        );
    }

    #[test]
    fn test_nested_module_rendered_at_serialize_time() {
        let inner = descriptor("inner").export(ExportClause::new("inner.api"));
        let outer = descriptor("outer").pack_module(inner, true);
        let archive = ModuleArchive::read(&outer.serialize().unwrap()).unwrap();
        let nested = archive.nested("testCase.inner.jar").unwrap();
        assert_eq!(nested.symbolic_name(), Some("testCase.inner"));
        assert_eq!(
            archive.manifest().get(headers::MODULE_CLASSPATH),
            Some("testCase.inner.jar")
        );
    }

    #[test]
    fn test_missing_class_fails_with_entry_name() {
        let d = descriptor("a").pack_class(ClassResource::new("no.Such"));
        match d.serialize() {
            Err(CoreError::ArchiveBuild { entry, .. }) => assert_eq!(entry, "no/Such.class"),
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_factory_stamps_prefix_and_source() {
        let system: Arc<dyn ClassSource> =
            Arc::new(InMemoryClassSource::new("system").with_class(ACTIVATOR, vec![7u8]));
        let factory = DescriptorFactory::new(
            "testCase.",
            "org.osgi.framework",
            ActivatorSpec::new(ClassResource::new(ACTIVATOR)),
        )
        .with_system_source(system);

        let d = factory.create("b");
        assert_eq!(d.symbolic_name(), "testCase.b");
        let archive = ModuleArchive::read(&d.serialize().unwrap()).unwrap();
        assert_eq!(
            archive.entry("chips/modkit/genericmodule/Activator.class"),
            Some(&[7u8][..])
        );
    }

    #[test]
    fn test_system_source_fallback() {
        let system: Arc<dyn ClassSource> =
            Arc::new(InMemoryClassSource::new("system").with_class("no.Such", vec![1u8]));
        let d = descriptor("a")
            .pack_class(ClassResource::new("no.Such"))
            .system_source(system);
        assert!(d.serialize().is_ok());
    }

    #[test]
    fn test_leading_slash_is_stripped_from_entry_name() {
        let d = descriptor("a").pack_bytes("/etc/data.txt", "x");
        let archive = ModuleArchive::read(&d.serialize().unwrap()).unwrap();
        assert_eq!(archive.entry("etc/data.txt"), Some(&b"x"[..]));
    }

    #[test]
    fn test_parent_segment_in_entry_name_is_rejected() {
        let err = descriptor("a")
            .pack_bytes("lib/../data.txt", "x")
            .serialize()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDescriptor(_)));
        assert!(err.to_string().contains("lib/../data.txt"));

        let err = descriptor("b").pack_bytes("", "x").serialize().unwrap_err();
        assert!(matches!(err, CoreError::InvalidDescriptor(_)));
    }
}
