//! 场景编排
//!
//! [`ScenarioHarness`] 把描述符构建、安装、刷新等待、清理和监听器注册串成场景所需的步骤。
//!
//! # 示例
//!
//! ```rust,ignore
//! let harness = ScenarioHarness::new(framework, HarnessConfig::default())?;
//!
//! let provider = harness
//!     .install(&harness.create_descriptor("provider").export(harness.export_clause("x.y")))
//!     .await?;
//! let consumer = harness
//!     .install(&harness.create_descriptor("consumer").import(harness.import_clause("x.y")))
//!     .await?;
//!
//! harness.refresh_framework_and_wait(None).await?;
//! harness.verifier().check_wiring("x.y", &consumer, &provider, true).await?;
//! harness.cleanup_modules().await?;
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::embedding::ProbeCustomizer;
use super::listener::{ListenerLog, RefreshListener};
use crate::core::config::HarnessConfig;
use crate::module::clause::{ExportClause, ImportClause};
use crate::module::descriptor::{DescriptorFactory, ModuleDescriptor};
use crate::utils::Result;
use crate::wiring::event::ListenerId;
use crate::wiring::framework::{ModuleFramework, ModuleHandle};
use crate::wiring::verifier::WiringVerifier;

/// 服务监听过滤器：按接口名匹配
pub fn object_class_filter(interface: &str) -> String {
    format!("(objectClass={})", interface)
}

/// 通用监听器的三个注册 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericListenerIds {
    pub module: ListenerId,
    pub framework: ListenerId,
    pub service: ListenerId,
}

/// 场景编排器
pub struct ScenarioHarness {
    framework: Arc<dyn ModuleFramework>,
    config: HarnessConfig,
    factory: DescriptorFactory,
    verifier: WiringVerifier,
}

impl ScenarioHarness {
    /// 创建编排器，配置无效时失败
    pub fn new(framework: Arc<dyn ModuleFramework>, config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let factory = config.descriptor_factory();
        Ok(Self {
            verifier: WiringVerifier::new(Arc::clone(&framework)),
            framework,
            config,
            factory,
        })
    }

    /// 替换描述符工厂
    pub fn with_factory(mut self, factory: DescriptorFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn framework(&self) -> &Arc<dyn ModuleFramework> {
        &self.framework
    }

    /// 同一运行时上的连线校验器
    pub fn verifier(&self) -> &WiringVerifier {
        &self.verifier
    }

    // ========================================================================
    // 构建
    // ========================================================================

    /// 创建带前缀、默认导入和激活器的描述符
    pub fn create_descriptor(&self, name: impl Into<String>) -> ModuleDescriptor {
        self.factory.create(name)
    }

    /// 创建探针描述符，配置了依赖列表时嵌入依赖归档
    pub fn create_probe(&self, name: impl Into<String>) -> Result<ModuleDescriptor> {
        let probe = self.create_descriptor(name);
        match ProbeCustomizer::from_config(&self.config)? {
            Some(customizer) => customizer.customize(probe),
            None => Ok(probe),
        }
    }

    pub fn import_clause(&self, capability: impl Into<String>) -> ImportClause {
        ImportClause::new(capability)
    }

    pub fn export_clause(&self, capability: impl Into<String>) -> ExportClause {
        ExportClause::new(capability)
    }

    /// 生成归档字节
    pub fn generate(&self, descriptor: &ModuleDescriptor) -> Result<Vec<u8>> {
        descriptor.serialize()
    }

    // ========================================================================
    // 运行时操作
    // ========================================================================

    /// 以归档名为位置安装描述符
    pub async fn install(&self, descriptor: &ModuleDescriptor) -> Result<ModuleHandle> {
        let archive = self.generate(descriptor)?;
        let location = descriptor.archive_name();
        let size = archive.len();
        let handle = self.framework.install(&location, archive).await?;
        info!(module = %handle, location = %location, size, "Module installed");
        Ok(handle)
    }

    /// 卸载全部以前缀命名的模块，失败的跳过，最后刷新一次
    ///
    /// 返回成功卸载的数量。
    pub async fn cleanup_modules(&self) -> Result<usize> {
        let mut uninstalled = 0;
        for module in self.framework.modules().await {
            if !module.symbolic_name.starts_with(&self.config.name_prefix) {
                continue;
            }
            match self.framework.uninstall(&module).await {
                Ok(()) => {
                    debug!(module = %module, "Module uninstalled");
                    uninstalled += 1;
                }
                Err(e) => warn!(module = %module, error = %e, "Failed to uninstall module"),
            }
        }
        self.refresh_framework_and_wait(None).await?;
        info!(uninstalled, "Cleanup finished");
        Ok(uninstalled)
    }

    /// 请求刷新并等待 `PackagesRefreshed`（无超时）
    ///
    /// 一次性监听器在任何路径上都会被注销。
    pub async fn refresh_framework_and_wait(&self, modules: Option<&[ModuleHandle]>) -> Result<()> {
        let listener = Arc::new(RefreshListener::new());
        let id = self
            .framework
            .add_framework_listener(Arc::clone(&listener) as _)
            .await?;

        let outcome = match self.framework.refresh_packages(modules).await {
            Ok(()) => {
                listener.wait().await;
                Ok(())
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.framework.remove_framework_listener(id).await {
            warn!(listener_id = id, error = %e, "Failed to remove refresh listener");
        }
        debug!(subset = modules.map(|m| m.len()), "Refresh finished");
        outcome
    }

    // ========================================================================
    // 监听器注册
    // ========================================================================

    /// 在模块上下文中注册模块事件记录
    pub async fn register_module_listener(
        &self,
        log: &Arc<ListenerLog>,
        context: &ModuleHandle,
    ) -> Result<ListenerId> {
        self.framework
            .add_module_listener(context, Arc::clone(log) as _)
            .await
    }

    /// 注册框架事件记录
    pub async fn register_framework_listener(&self, log: &Arc<ListenerLog>) -> Result<ListenerId> {
        self.framework
            .add_framework_listener(Arc::clone(log) as _)
            .await
    }

    /// 在模块上下文中注册服务事件记录，`filter` 为 `None` 时接收全部服务事件
    pub async fn register_service_listener(
        &self,
        log: &Arc<ListenerLog>,
        context: &ModuleHandle,
        filter: Option<&str>,
    ) -> Result<ListenerId> {
        self.framework
            .add_service_listener(context, Arc::clone(log) as _, filter)
            .await
    }

    /// 只记录以指定接口注册的服务事件
    pub async fn register_service_listener_for(
        &self,
        log: &Arc<ListenerLog>,
        context: &ModuleHandle,
        interface: &str,
    ) -> Result<ListenerId> {
        let filter = object_class_filter(interface);
        self.register_service_listener(log, context, Some(&filter))
            .await
    }

    /// 同时注册三类事件记录
    pub async fn register_generic_listener(
        &self,
        log: &Arc<ListenerLog>,
        context: &ModuleHandle,
    ) -> Result<GenericListenerIds> {
        Ok(GenericListenerIds {
            module: self.register_module_listener(log, context).await?,
            framework: self.register_framework_listener(log).await?,
            service: self.register_service_listener(log, context, None).await?,
        })
    }
}
