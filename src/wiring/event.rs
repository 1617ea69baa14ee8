//! 运行时事件与监听器接口
//!
//! 运行时可能在自己的线程里回调监听器，因此监听器接口是同步的，实现方需要自行保证线程安全。

use serde::{Deserialize, Serialize};

use super::framework::{ModuleHandle, ServiceReference};

/// 监听器注册 ID
pub type ListenerId = u64;

/// 模块事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleEventKind {
    Installed,
    Resolved,
    Starting,
    Started,
    Stopping,
    Stopped,
    Updated,
    Unresolved,
    Uninstalled,
}

/// 模块事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub kind: ModuleEventKind,
    pub module: ModuleHandle,
}

/// 框架事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkEventKind {
    Started,
    Error,
    /// 包刷新完成
    PackagesRefreshed,
    StartLevelChanged,
    Warning,
    Info,
}

/// 框架事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkEvent {
    pub kind: FrameworkEventKind,
    /// 事件来源模块
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ModuleHandle>,
}

impl FrameworkEvent {
    pub fn new(kind: FrameworkEventKind) -> Self {
        Self { kind, source: None }
    }

    pub fn packages_refreshed() -> Self {
        Self::new(FrameworkEventKind::PackagesRefreshed)
    }
}

/// 服务事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceEventKind {
    Registered,
    Modified,
    Unregistering,
}

/// 服务事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReference,
}

/// 模块事件监听器
pub trait ModuleListener: Send + Sync {
    fn module_changed(&self, event: &ModuleEvent);
}

/// 框架事件监听器
pub trait FrameworkListener: Send + Sync {
    fn framework_event(&self, event: &FrameworkEvent);
}

/// 服务事件监听器
pub trait ServiceListener: Send + Sync {
    fn service_changed(&self, event: &ServiceEvent);
}
