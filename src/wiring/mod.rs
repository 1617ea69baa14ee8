//! 连线模块
//!
//! 包含与外部模块运行时交互的组件：
//! - 运行时接口与句柄类型
//! - 事件与监听器接口
//! - 连线校验器

pub mod event;
pub mod framework;
pub mod verifier;

// 重导出常用类型
pub use event::{
    FrameworkEvent, FrameworkEventKind, FrameworkListener, ListenerId, ModuleEvent,
    ModuleEventKind, ModuleListener, ServiceEvent, ServiceEventKind, ServiceListener,
};
pub use framework::{
    ClassHandle, ExportedCapability, ModuleFramework, ModuleHandle, ModuleId, ServiceObject,
    ServiceReference,
};
pub use verifier::WiringVerifier;
