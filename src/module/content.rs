//! 模块内容源
//!
//! 描述符中的每个条目都由一个 [`ContentSource`] 提供字节：
//! 原始字节、通过 [`ClassSource`] 读取的类资源，或在序列化时递归渲染的嵌套模块。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::module::descriptor::ModuleDescriptor;
use crate::utils::Result;

/// 类名转换为归档内的资源路径：`a.b.C` → `a/b/C.class`
pub fn class_entry_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// 类字节来源
///
/// 命中返回 `Ok(Some(bytes))`，未命中返回 `Ok(None)`，读取出错返回 `Err`。
pub trait ClassSource: Send + Sync + fmt::Debug {
    /// 来源名称（用于日志和错误信息）
    fn name(&self) -> &str;

    /// 读取指定类的字节
    fn read_class(&self, class_name: &str) -> Result<Option<Vec<u8>>>;
}

/// 内存类来源
#[derive(Debug, Clone, Default)]
pub struct InMemoryClassSource {
    name: String,
    classes: HashMap<String, Vec<u8>>,
}

impl InMemoryClassSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: HashMap::new(),
        }
    }

    /// 添加一个类
    pub fn with_class(mut self, class_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.classes.insert(class_name.into(), bytes.into());
        self
    }

    /// 添加一个类（可变引用版本）
    pub fn insert(&mut self, class_name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.classes.insert(class_name.into(), bytes.into());
    }

    /// 类数量
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for InMemoryClassSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_class(&self, class_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.classes.get(class_name).cloned())
    }
}

/// 目录类来源
///
/// 在根目录下按 `a/b/C.class` 布局查找类文件。
#[derive(Debug, Clone)]
pub struct DirectoryClassSource {
    name: String,
    root: PathBuf,
}

impl DirectoryClassSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    /// 根目录
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl ClassSource for DirectoryClassSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_class(&self, class_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(class_entry_name(class_name));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// 类资源：类名 + 自身的类来源
#[derive(Debug, Clone)]
pub struct ClassResource {
    class_name: String,
    source: Option<Arc<dyn ClassSource>>,
}

impl ClassResource {
    /// 只有类名，序列化时由系统类来源提供字节
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            source: None,
        }
    }

    /// 指定自身类来源
    pub fn with_source(class_name: impl Into<String>, source: Arc<dyn ClassSource>) -> Self {
        Self {
            class_name: class_name.into(),
            source: Some(source),
        }
    }

    /// 类名
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// 归档内条目名
    pub fn entry_name(&self) -> String {
        class_entry_name(&self.class_name)
    }

    /// 读取类字节：先查自身来源，未命中再查系统来源
    pub fn read(&self, system: Option<&dyn ClassSource>) -> Result<Option<Vec<u8>>> {
        if let Some(source) = &self.source {
            if let Some(bytes) = source.read_class(&self.class_name)? {
                return Ok(Some(bytes));
            }
        }
        match system {
            Some(system) => system.read_class(&self.class_name),
            None => Ok(None),
        }
    }
}

/// 条目内容
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// 原始字节，按原样写入
    Bytes(Vec<u8>),
    /// 类资源，序列化时读取
    Class(ClassResource),
    /// 嵌套模块，序列化时递归渲染
    Module(Box<ModuleDescriptor>),
}

impl ContentSource {
    /// 内容种类名称
    pub fn kind(&self) -> &'static str {
        match self {
            ContentSource::Bytes(_) => "bytes",
            ContentSource::Class(_) => "class",
            ContentSource::Module(_) => "module",
        }
    }
}
