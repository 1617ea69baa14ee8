//! 连线校验器
//!
//! 在模块安装并解析之后，通过 [`ModuleFramework`] 查询实时连线图：
//! 谁向谁提供了能力、能力是否私有、类是否可达、服务是否可见且可用。
//!
//! 查询类方法遇到不确定的情况返回 `None` / `false`；断言类方法 ([`WiringVerifier::check_wiring`])
//! 以 [`CoreError`] 报告失败，错误信息同时包含能力名与双方身份。

use std::sync::Arc;

use tracing::{debug, warn};

use super::framework::{ExportedCapability, ModuleFramework, ModuleHandle, ServiceReference};
use crate::utils::{CoreError, Result};

/// 连线校验器
#[derive(Clone)]
pub struct WiringVerifier {
    framework: Arc<dyn ModuleFramework>,
}

impl WiringVerifier {
    pub fn new(framework: Arc<dyn ModuleFramework>) -> Self {
        Self { framework }
    }

    /// 底层运行时
    pub fn framework(&self) -> &Arc<dyn ModuleFramework> {
        &self.framework
    }

    // ========================================================================
    // 包连线查询
    // ========================================================================

    /// 消费方通过指定能力连线到的导出
    pub async fn wired_capability(
        &self,
        capability: &str,
        consumer: &ModuleHandle,
    ) -> Option<ExportedCapability> {
        self.framework
            .exported_capabilities(capability)
            .await?
            .into_iter()
            .find(|export| export.is_imported_by(consumer))
    }

    /// 向消费方提供指定能力的模块
    pub async fn find_provider(
        &self,
        capability: &str,
        consumer: &ModuleHandle,
    ) -> Option<ModuleHandle> {
        self.wired_capability(capability, consumer)
            .await
            .map(|export| export.exporter)
    }

    /// 消费方连线到的导出版本，未连线时为空串
    pub async fn wired_version(&self, capability: &str, consumer: &ModuleHandle) -> String {
        self.wired_capability(capability, consumer)
            .await
            .map(|export| export.version)
            .unwrap_or_default()
    }

    /// 能力对模块而言是否私有：没有连线，或连线到自身
    pub async fn is_private(&self, capability: &str, module: &ModuleHandle) -> bool {
        match self.find_provider(capability, module).await {
            Some(provider) => provider.is_same(module),
            None => true,
        }
    }

    /// 运行时中是否有任何模块导出该能力
    pub async fn is_exported(&self, capability: &str) -> bool {
        self.framework
            .exported_capabilities(capability)
            .await
            .map_or(false, |exports| !exports.is_empty())
    }

    /// 模块是否向其他模块提供了能力（自连线不计）
    pub async fn is_providing_to_others(&self, module: &ModuleHandle) -> bool {
        self.framework
            .exported_by(module)
            .await
            .map_or(false, |exports| {
                exports
                    .iter()
                    .any(|export| export.importers.iter().any(|m| !m.is_same(module)))
            })
    }

    /// 断言连线
    ///
    /// `expected_wired = true` 时，消费方必须通过该能力连线到 `expected`；
    /// `expected_wired = false` 时，消费方不得连线到 `expected`（完全未连线视为通过）。
    pub async fn check_wiring(
        &self,
        capability: &str,
        consumer: &ModuleHandle,
        expected: &ModuleHandle,
        expected_wired: bool,
    ) -> Result<()> {
        let actual = self.find_provider(capability, consumer).await;
        debug!(
            capability,
            consumer = %consumer,
            expected = %expected,
            expected_wired,
            actual = ?actual.as_ref().map(|m| m.id),
            "Checking wiring"
        );

        match (expected_wired, actual) {
            (true, None) => Err(CoreError::NotWired {
                capability: capability.to_string(),
                consumer: consumer.to_string(),
                expected: expected.to_string(),
            }),
            (true, Some(actual)) if !actual.is_same(expected) => Err(CoreError::WiringMismatch {
                capability: capability.to_string(),
                consumer: consumer.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            (false, Some(actual)) if actual.is_same(expected) => {
                Err(CoreError::UnexpectedWiring {
                    capability: capability.to_string(),
                    consumer: consumer.to_string(),
                    provider: expected.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// 断言消费方通过该能力连线到 `expected`
    pub async fn assert_wired(
        &self,
        capability: &str,
        consumer: &ModuleHandle,
        expected: &ModuleHandle,
    ) -> Result<()> {
        self.check_wiring(capability, consumer, expected, true).await
    }

    // ========================================================================
    // 类可达性
    // ========================================================================

    /// 类是否能通过模块加载
    ///
    /// 只有 `ClassNotFound` 被视为不可达，其余错误原样返回。
    pub async fn is_reachable(&self, class_name: &str, module: &ModuleHandle) -> Result<bool> {
        match self.framework.load_class(module, class_name).await {
            Ok(_) => Ok(true),
            Err(CoreError::ClassNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // 服务
    // ========================================================================

    /// 模块能否看到以该接口注册的服务
    pub async fn sees_service(&self, interface: &str, module: &ModuleHandle) -> Result<bool> {
        let references = self
            .framework
            .service_references(module, Some(interface), None)
            .await?;
        Ok(references.is_some())
    }

    /// 模块能否使用以该接口注册的全部服务
    ///
    /// 每个服务对象都必须能赋值给模块自己加载到的接口类型。取得的每个引用在检查成功、
    /// 失败或出错后都会被释放；调用方中途丢弃该 future 时不保证释放。
    pub async fn can_use_service(&self, interface: &str, module: &ModuleHandle) -> Result<bool> {
        let references = match self
            .framework
            .service_references(module, Some(interface), None)
            .await?
        {
            Some(references) => references,
            None => return Ok(false),
        };

        let mut usable = true;
        for reference in &references {
            let lease = ServiceLease::new(self.framework.as_ref(), module, reference);
            let outcome = self.is_assignable(interface, module, reference).await;
            lease.release().await;
            if !outcome? {
                usable = false;
            }
        }
        Ok(usable)
    }

    async fn is_assignable(
        &self,
        interface: &str,
        module: &ModuleHandle,
        reference: &ServiceReference,
    ) -> Result<bool> {
        let service = match self.framework.get_service(module, reference).await? {
            Some(service) => service,
            None => return Ok(false),
        };
        match self.framework.load_class(module, interface).await {
            Ok(class) => Ok(class.is_assignable_from(&service)),
            Err(CoreError::ClassNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 在模块上下文中注册服务，任何失败都返回 `false`
    pub async fn register_service(
        &self,
        implementation: &str,
        interface: &str,
        module: &ModuleHandle,
    ) -> bool {
        match self
            .framework
            .register_service(module, interface, implementation)
            .await
        {
            Ok(reference) => {
                debug!(
                    service_id = reference.id,
                    interface,
                    module = %module,
                    "Service registered"
                );
                true
            }
            Err(e) => {
                debug!(interface, implementation, module = %module, error = %e, "Service registration failed");
                false
            }
        }
    }
}

/// 一次服务借用
///
/// 创建后必须调用 [`ServiceLease::release`]。`Drop` 中无法异步归还引用，
/// 因此所在 future 被取消时引用不会释放，只记录一条警告。
struct ServiceLease<'a> {
    framework: &'a dyn ModuleFramework,
    module: &'a ModuleHandle,
    reference: &'a ServiceReference,
    released: bool,
}

impl<'a> ServiceLease<'a> {
    fn new(
        framework: &'a dyn ModuleFramework,
        module: &'a ModuleHandle,
        reference: &'a ServiceReference,
    ) -> Self {
        Self {
            framework,
            module,
            reference,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.framework.unget_service(self.module, self.reference).await {
            warn!(service_id = self.reference.id, module = %self.module, error = %e, "Failed to release service");
        }
    }
}

impl Drop for ServiceLease<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                service_id = self.reference.id,
                module = %self.module,
                "Service lease dropped without release"
            );
        }
    }
}
