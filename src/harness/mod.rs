//! 场景编排
//!
//! 面向场景代码的外层：
//! - 场景编排器（安装、刷新等待、清理、监听器注册）
//! - 事件记录与刷新等待监听器
//! - 探针模块定制

pub mod embedding;
pub mod listener;
pub mod scenario;

pub use embedding::ProbeCustomizer;
pub use listener::{ListenerLog, Recorded, RefreshListener};
pub use scenario::{object_class_filter, GenericListenerIds, ScenarioHarness};
