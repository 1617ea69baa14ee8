//! 模块运行时接口
//!
//! 定义外部模块运行时需要实现的接口。工具包自身不做解析，只通过 [`ModuleFramework`]
//! 观察运行时已经建立的连线图，并驱动安装、卸载、刷新与服务操作。
//!
//! 模块身份只由 [`ModuleHandle::id`] 决定，从不依赖对象相等。

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::event::{FrameworkListener, ListenerId, ModuleListener, ServiceListener};
use crate::utils::Result;

/// 模块 ID
pub type ModuleId = u64;

/// 已安装模块的句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleHandle {
    /// 运行时分配的唯一 ID
    pub id: ModuleId,
    /// 符号名
    pub symbolic_name: String,
    /// 安装位置
    #[serde(default)]
    pub location: String,
}

impl ModuleHandle {
    pub fn new(id: ModuleId, symbolic_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id,
            symbolic_name: symbolic_name.into(),
            location: location.into(),
        }
    }

    /// 是否为同一个模块（按 ID 比较）
    pub fn is_same(&self, other: &ModuleHandle) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id:{})", self.symbolic_name, self.id)
    }
}

/// 运行时中一个被导出的能力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedCapability {
    /// 能力名
    pub name: String,
    /// 导出版本
    pub version: String,
    /// 导出方
    pub exporter: ModuleHandle,
    /// 当前连线到此导出的导入方
    #[serde(default)]
    pub importers: Vec<ModuleHandle>,
}

impl ExportedCapability {
    /// 指定模块是否连线到此导出
    pub fn is_imported_by(&self, module: &ModuleHandle) -> bool {
        self.importers.iter().any(|m| m.is_same(module))
    }

    /// 是否有除导出方自身之外的导入方
    pub fn has_foreign_importers(&self) -> bool {
        self.importers.iter().any(|m| !m.is_same(&self.exporter))
    }
}

/// 已加载的类
///
/// 同名类若由不同模块定义，视为不同的类。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassHandle {
    /// 类名
    pub name: String,
    /// 定义该类的模块
    pub defining_module: ModuleId,
}

impl ClassHandle {
    pub fn new(name: impl Into<String>, defining_module: ModuleId) -> Self {
        Self {
            name: name.into(),
            defining_module,
        }
    }

    /// 服务对象能否赋值给此类型
    pub fn is_assignable_from(&self, service: &ServiceObject) -> bool {
        service.implementation == *self || service.types.contains(self)
    }
}

/// 服务引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceReference {
    /// 服务 ID
    pub id: u64,
    /// 注册时声明的接口名
    pub interfaces: Vec<String>,
    /// 注册该服务的模块
    pub provider: ModuleHandle,
}

/// 取得的服务对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObject {
    /// 实现类
    pub implementation: ClassHandle,
    /// 实现类可赋值到的全部类型
    #[serde(default)]
    pub types: BTreeSet<ClassHandle>,
}

/// 模块运行时接口
///
/// 由外部运行时实现。查询类方法用 `None` 表示"没有"，操作类方法用 `Result` 报告失败。
#[async_trait]
pub trait ModuleFramework: Send + Sync {
    /// 指定能力名的全部导出，没有任何导出时返回 `None`
    async fn exported_capabilities(&self, name: &str) -> Option<Vec<ExportedCapability>>;

    /// 指定模块的全部导出
    async fn exported_by(&self, module: &ModuleHandle) -> Option<Vec<ExportedCapability>>;

    /// 全部已安装模块
    async fn modules(&self) -> Vec<ModuleHandle>;

    /// 通过模块加载类，未找到时返回 `CoreError::ClassNotFound`
    async fn load_class(&self, module: &ModuleHandle, class_name: &str) -> Result<ClassHandle>;

    /// 在模块上下文中查询服务引用，没有匹配时返回 `Ok(None)`
    async fn service_references(
        &self,
        module: &ModuleHandle,
        interface: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Option<Vec<ServiceReference>>>;

    /// 取得服务对象
    async fn get_service(
        &self,
        module: &ModuleHandle,
        reference: &ServiceReference,
    ) -> Result<Option<ServiceObject>>;

    /// 释放服务对象
    async fn unget_service(&self, module: &ModuleHandle, reference: &ServiceReference)
        -> Result<bool>;

    /// 在模块上下文中以实现类实例注册服务
    async fn register_service(
        &self,
        module: &ModuleHandle,
        interface: &str,
        implementation: &str,
    ) -> Result<ServiceReference>;

    /// 安装归档
    async fn install(&self, location: &str, archive: Vec<u8>) -> Result<ModuleHandle>;

    /// 卸载模块
    async fn uninstall(&self, module: &ModuleHandle) -> Result<()>;

    /// 请求刷新包连线；完成后运行时发出 `PackagesRefreshed` 框架事件
    async fn refresh_packages(&self, modules: Option<&[ModuleHandle]>) -> Result<()>;

    /// 注册框架监听器
    async fn add_framework_listener(
        &self,
        listener: Arc<dyn FrameworkListener>,
    ) -> Result<ListenerId>;

    /// 注销框架监听器
    async fn remove_framework_listener(&self, id: ListenerId) -> Result<()>;

    /// 在模块上下文中注册模块监听器
    async fn add_module_listener(
        &self,
        context: &ModuleHandle,
        listener: Arc<dyn ModuleListener>,
    ) -> Result<ListenerId>;

    /// 在模块上下文中注册服务监听器，`filter` 为 `None` 时接收全部服务事件
    async fn add_service_listener(
        &self,
        context: &ModuleHandle,
        listener: Arc<dyn ServiceListener>,
        filter: Option<&str>,
    ) -> Result<ListenerId>;
}
