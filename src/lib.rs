//! # Chips Modkit - 合成模块工具包
//!
//! 为模块化运行时的一致性场景生成合成模块，并校验运行时实际建立的连线：
//!
//! - **模块构建**: 以链式 API 描述模块（导入、导出、片段宿主、加载路径、内容），
//!   渲染清单并打包为确定性的归档
//! - **声明式描述**: 从 YAML / JSON 描述文件构建模块
//! - **连线校验**: 通过运行时接口查询导出能力，断言连线、可见性和服务可用性
//! - **场景编排**: 安装、刷新等待、按前缀清理、事件记录
//! - **运行器配置**: 厂商选择、运行器属性、场景规范元数据
//!
//! ## 快速开始
//!
//! ```rust
//! use chips_modkit::{HarnessConfig, ImportClause, ModuleArchive};
//!
//! let factory = HarnessConfig::default().descriptor_factory();
//! let module = factory
//!     .create("consumer")
//!     .import(ImportClause::new("x.y").version("1.0.0"));
//!
//! let bytes = module.serialize().unwrap();
//! let archive = ModuleArchive::read(&bytes).unwrap();
//! assert_eq!(archive.symbolic_name(), Some("testCase.consumer"));
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 子句、清单、内容源、描述符与归档
//! - `wiring` - 运行时接口、事件与连线校验器
//! - `harness` - 场景编排与事件记录
//! - `core` - 配置、厂商选择与规范元数据
//! - `utils` - 错误类型与日志系统

#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod harness;
pub mod module;
pub mod utils;
pub mod wiring;

// 重导出常用类型，方便使用
pub use module::{
    ClassResource, ClassSource, DescriptorFactory, ExportClause, ImportClause, Manifest,
    ModuleArchive, ModuleDescriptor, ModuleParser,
};

pub use wiring::{
    ClassHandle, ExportedCapability, FrameworkEvent, FrameworkEventKind, ModuleEvent,
    ModuleEventKind, ModuleFramework, ModuleHandle, ServiceEvent, ServiceObject,
    ServiceReference, WiringVerifier,
};

pub use harness::{ListenerLog, ProbeCustomizer, RefreshListener, ScenarioHarness};

pub use core::config::{HarnessConfig, HarnessConfigBuilder, LogConfig, RunnerProperties};
pub use core::vendor::{FrameworkOption, FrameworkSelection, VendorSelection};

pub use utils::logger::{LogGuard, Logger, LoggerConfig, RotationStrategy};
pub use utils::{error_code, CoreError, Result};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
