//! 集成测试共用的内存运行时
//!
//! 按安装顺序为每个导入挑选第一个匹配的导出；类可达性只看模块自身条目和已连线的导入。
//! 刷新完成事件从独立线程发出，模拟真实运行时的异步回调。

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chips_modkit::module::archive::ModuleArchive;
use chips_modkit::module::content::InMemoryClassSource;
use chips_modkit::module::manifest::{headers, parse_clauses, ParsedClause};
use chips_modkit::utils::{CoreError, Result};
use chips_modkit::wiring::{
    ClassHandle, ExportedCapability, FrameworkEvent, FrameworkListener, ListenerId, ModuleEvent,
    ModuleEventKind, ModuleFramework, ModuleHandle, ModuleListener, ServiceEvent,
    ServiceEventKind, ServiceListener, ServiceObject, ServiceReference,
};
use chips_modkit::{DescriptorFactory, HarnessConfig};

const CLASS_SUFFIX: &str = ".class";

struct InstalledModule {
    handle: ModuleHandle,
    imports: Vec<ParsedClause>,
    exports: Vec<ParsedClause>,
    classes: BTreeSet<String>,
}

struct RegisteredService {
    reference: ServiceReference,
    object: ServiceObject,
}

#[derive(Default)]
struct State {
    next_id: u64,
    modules: Vec<InstalledModule>,
    services: Vec<RegisteredService>,
    outstanding: i64,
    unget_calls: usize,
    refresh_count: usize,
    fail_uninstall: HashSet<String>,
    fail_refresh: bool,
    fail_load_class: HashSet<String>,
    framework_listeners: BTreeMap<ListenerId, Arc<dyn FrameworkListener>>,
    module_listeners: BTreeMap<ListenerId, Arc<dyn ModuleListener>>,
    service_listeners: BTreeMap<ListenerId, (Arc<dyn ServiceListener>, Option<String>)>,
}

/// 内存运行时
#[derive(Default)]
pub struct FakeFramework {
    state: Mutex<State>,
}

impl FakeFramework {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// 让指定符号名的模块卸载失败
    pub fn fail_uninstall_of(&self, symbolic_name: &str) {
        self.lock().fail_uninstall.insert(symbolic_name.to_string());
    }

    pub fn fail_refresh(&self) {
        self.lock().fail_refresh = true;
    }

    /// 让指定类的加载以非 ClassNotFound 的错误失败
    pub fn fail_load_class_of(&self, class_name: &str) {
        self.lock().fail_load_class.insert(class_name.to_string());
    }

    pub fn unget_calls(&self) -> usize {
        self.lock().unget_calls
    }

    pub fn refresh_count(&self) -> usize {
        self.lock().refresh_count
    }

    /// 已取得但未释放的服务对象数量
    pub fn outstanding_services(&self) -> i64 {
        self.lock().outstanding
    }

    pub fn framework_listener_count(&self) -> usize {
        self.lock().framework_listeners.len()
    }

    pub fn symbolic_names(&self) -> Vec<String> {
        self.lock()
            .modules
            .iter()
            .map(|m| m.handle.symbolic_name.clone())
            .collect()
    }

    fn next_id(state: &mut State) -> u64 {
        state.next_id += 1;
        state.next_id
    }

    fn emit_module_event(&self, kind: ModuleEventKind, module: &ModuleHandle) {
        let listeners: Vec<_> = self.lock().module_listeners.values().cloned().collect();
        let event = ModuleEvent {
            kind,
            module: module.clone(),
        };
        for listener in listeners {
            listener.module_changed(&event);
        }
    }
}

fn filter_matches(filter: &Option<String>, interfaces: &[String]) -> bool {
    match filter {
        None => true,
        Some(filter) => interfaces
            .iter()
            .any(|iface| *filter == format!("(objectClass={})", iface)),
    }
}

fn package_of(class_name: &str) -> &str {
    class_name.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
}

/// 导出是否满足导入：版本相等、其余属性相等、强制属性都被导入方给出
fn satisfies(import: &ParsedClause, export: &ParsedClause) -> bool {
    if import.capability_name != export.capability_name {
        return false;
    }
    let attributes_match = import
        .attributes
        .iter()
        .all(|(key, value)| export.attributes.get(key) == Some(value));
    let mandatory_given = export
        .mandatory_keys()
        .iter()
        .all(|key| import.attributes.contains_key(key));
    attributes_match && mandatory_given
}

fn provider_index(state: &State, importer: usize, capability: &str) -> Option<usize> {
    let import = state.modules[importer]
        .imports
        .iter()
        .find(|c| c.capability_name == capability)?;
    state
        .modules
        .iter()
        .position(|m| m.exports.iter().any(|export| satisfies(import, export)))
}

fn module_index(state: &State, module: &ModuleHandle) -> Result<usize> {
    state
        .modules
        .iter()
        .position(|m| m.handle.is_same(module))
        .ok_or_else(|| CoreError::ModuleNotFound(module.to_string()))
}

fn load_class_in(state: &State, module: usize, class_name: &str) -> Result<ClassHandle> {
    let installed = &state.modules[module];
    if installed.classes.contains(class_name) {
        return Ok(ClassHandle::new(class_name, installed.handle.id));
    }
    if let Some(provider) = provider_index(state, module, package_of(class_name)) {
        let exporter = &state.modules[provider];
        if exporter.classes.contains(class_name) {
            return Ok(ClassHandle::new(class_name, exporter.handle.id));
        }
    }
    Err(CoreError::ClassNotFound(class_name.to_string()))
}

fn capabilities_of(state: &State, exporter: usize, name: &str) -> Vec<ExportedCapability> {
    let installed = &state.modules[exporter];
    installed
        .exports
        .iter()
        .filter(|export| export.capability_name == name)
        .map(|export| ExportedCapability {
            name: name.to_string(),
            version: export
                .attributes
                .get("version")
                .cloned()
                .unwrap_or_else(|| "0.0.0".to_string()),
            exporter: installed.handle.clone(),
            importers: (0..state.modules.len())
                .filter(|&i| provider_index(state, i, name) == Some(exporter))
                .map(|i| state.modules[i].handle.clone())
                .collect(),
        })
        .collect()
}

#[async_trait]
impl ModuleFramework for FakeFramework {
    async fn exported_capabilities(&self, name: &str) -> Option<Vec<ExportedCapability>> {
        let state = self.lock();
        let exports: Vec<_> = (0..state.modules.len())
            .flat_map(|i| capabilities_of(&state, i, name))
            .collect();
        if exports.is_empty() {
            None
        } else {
            Some(exports)
        }
    }

    async fn exported_by(&self, module: &ModuleHandle) -> Option<Vec<ExportedCapability>> {
        let state = self.lock();
        let index = module_index(&state, module).ok()?;
        let names: BTreeSet<_> = state.modules[index]
            .exports
            .iter()
            .map(|e| e.capability_name.clone())
            .collect();
        Some(
            names
                .iter()
                .flat_map(|name| capabilities_of(&state, index, name))
                .collect(),
        )
    }

    async fn modules(&self) -> Vec<ModuleHandle> {
        self.lock().modules.iter().map(|m| m.handle.clone()).collect()
    }

    async fn load_class(&self, module: &ModuleHandle, class_name: &str) -> Result<ClassHandle> {
        let state = self.lock();
        let index = module_index(&state, module)?;
        if state.fail_load_class.contains(class_name) {
            return Err(CoreError::ContextUnavailable(format!(
                "class loader of {} is gone",
                module
            )));
        }
        load_class_in(&state, index, class_name)
    }

    async fn service_references(
        &self,
        module: &ModuleHandle,
        interface: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Option<Vec<ServiceReference>>> {
        let state = self.lock();
        module_index(&state, module)?;
        let filter = filter.map(str::to_string);
        let references: Vec<_> = state
            .services
            .iter()
            .filter(|s| interface.map_or(true, |i| s.reference.interfaces.iter().any(|x| x == i)))
            .filter(|s| filter_matches(&filter, &s.reference.interfaces))
            .map(|s| s.reference.clone())
            .collect();
        Ok(if references.is_empty() {
            None
        } else {
            Some(references)
        })
    }

    async fn get_service(
        &self,
        _module: &ModuleHandle,
        reference: &ServiceReference,
    ) -> Result<Option<ServiceObject>> {
        let mut state = self.lock();
        let object = state
            .services
            .iter()
            .find(|s| s.reference.id == reference.id)
            .map(|s| s.object.clone());
        if object.is_some() {
            state.outstanding += 1;
        }
        Ok(object)
    }

    async fn unget_service(
        &self,
        _module: &ModuleHandle,
        reference: &ServiceReference,
    ) -> Result<bool> {
        let mut state = self.lock();
        state.unget_calls += 1;
        let known = state.services.iter().any(|s| s.reference.id == reference.id);
        if known && state.outstanding > 0 {
            state.outstanding -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    async fn register_service(
        &self,
        module: &ModuleHandle,
        interface: &str,
        implementation: &str,
    ) -> Result<ServiceReference> {
        let (reference, listeners) = {
            let mut state = self.lock();
            let index = module_index(&state, module)?;
            let implementation = load_class_in(&state, index, implementation)
                .map_err(|e| CoreError::ServiceFailed(e.to_string()))?;
            let iface = load_class_in(&state, index, interface)
                .map_err(|e| CoreError::ServiceFailed(e.to_string()))?;

            let reference = ServiceReference {
                id: Self::next_id(&mut state),
                interfaces: vec![interface.to_string()],
                provider: state.modules[index].handle.clone(),
            };
            let mut types = BTreeSet::new();
            types.insert(iface);
            state.services.push(RegisteredService {
                reference: reference.clone(),
                object: ServiceObject {
                    implementation,
                    types,
                },
            });
            let listeners: Vec<_> = state
                .service_listeners
                .values()
                .filter(|(_, filter)| filter_matches(filter, &reference.interfaces))
                .map(|(listener, _)| Arc::clone(listener))
                .collect();
            (reference, listeners)
        };

        let event = ServiceEvent {
            kind: ServiceEventKind::Registered,
            reference: reference.clone(),
        };
        for listener in listeners {
            listener.service_changed(&event);
        }
        Ok(reference)
    }

    async fn install(&self, location: &str, archive: Vec<u8>) -> Result<ModuleHandle> {
        let archive = ModuleArchive::read(&archive).map_err(|e| CoreError::InstallFailed {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        let manifest = archive.manifest();
        let symbolic_name = archive
            .symbolic_name()
            .ok_or_else(|| CoreError::InstallFailed {
                location: location.to_string(),
                reason: "missing symbolic name".to_string(),
            })?
            .to_string();
        let imports = match manifest.get(headers::IMPORT_PACKAGE) {
            Some(value) => parse_clauses(value)?,
            None => Vec::new(),
        };
        let exports = match manifest.get(headers::EXPORT_PACKAGE) {
            Some(value) => parse_clauses(value)?,
            None => Vec::new(),
        };
        let classes = archive
            .entry_names()
            .into_iter()
            .filter_map(|name| name.strip_suffix(CLASS_SUFFIX))
            .map(|name| name.replace('/', "."))
            .collect();

        let handle = {
            let mut state = self.lock();
            let handle = ModuleHandle::new(Self::next_id(&mut state), symbolic_name, location);
            state.modules.push(InstalledModule {
                handle: handle.clone(),
                imports,
                exports,
                classes,
            });
            handle
        };
        self.emit_module_event(ModuleEventKind::Installed, &handle);
        Ok(handle)
    }

    async fn uninstall(&self, module: &ModuleHandle) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_uninstall.contains(&module.symbolic_name) {
                return Err(CoreError::UninstallFailed {
                    module: module.to_string(),
                    reason: "module is locked".to_string(),
                });
            }
            let index = module_index(&state, module)?;
            state.modules.remove(index);
            state.services.retain(|s| !s.reference.provider.is_same(module));
        }
        self.emit_module_event(ModuleEventKind::Uninstalled, module);
        Ok(())
    }

    async fn refresh_packages(&self, _modules: Option<&[ModuleHandle]>) -> Result<()> {
        let listeners: Vec<_> = {
            let mut state = self.lock();
            if state.fail_refresh {
                return Err(CoreError::Internal("refresh rejected".to_string()));
            }
            state.refresh_count += 1;
            state.framework_listeners.values().cloned().collect()
        };
        std::thread::spawn(move || {
            let event = FrameworkEvent::packages_refreshed();
            for listener in listeners {
                listener.framework_event(&event);
            }
        });
        Ok(())
    }

    async fn add_framework_listener(
        &self,
        listener: Arc<dyn FrameworkListener>,
    ) -> Result<ListenerId> {
        let mut state = self.lock();
        let id = Self::next_id(&mut state);
        state.framework_listeners.insert(id, listener);
        Ok(id)
    }

    async fn remove_framework_listener(&self, id: ListenerId) -> Result<()> {
        self.lock().framework_listeners.remove(&id);
        Ok(())
    }

    async fn add_module_listener(
        &self,
        context: &ModuleHandle,
        listener: Arc<dyn ModuleListener>,
    ) -> Result<ListenerId> {
        let mut state = self.lock();
        module_index(&state, context)?;
        let id = Self::next_id(&mut state);
        state.module_listeners.insert(id, listener);
        Ok(id)
    }

    async fn add_service_listener(
        &self,
        context: &ModuleHandle,
        listener: Arc<dyn ServiceListener>,
        filter: Option<&str>,
    ) -> Result<ListenerId> {
        let mut state = self.lock();
        module_index(&state, context)?;
        if let Some(filter) = filter {
            if !(filter.starts_with('(') && filter.ends_with(')')) {
                return Err(CoreError::InvalidFilter(filter.to_string()));
            }
        }
        let id = Self::next_id(&mut state);
        state
            .service_listeners
            .insert(id, (listener, filter.map(str::to_string)));
        Ok(id)
    }
}

/// 默认配置的描述符工厂，激活器与给定类都来自内存
pub fn factory_with_classes(classes: &[&str]) -> DescriptorFactory {
    let source = classes
        .iter()
        .fold(InMemoryClassSource::new("test-classes"), |source, class| {
            source.with_class(*class, class.as_bytes().to_vec())
        });
    HarnessConfig::default()
        .descriptor_factory()
        .with_system_source(Arc::new(source))
}
