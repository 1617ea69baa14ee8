//! 场景监听器
//!
//! - [`ListenerLog`]：记录模块、框架、服务三类事件，供场景结束后断言
//! - [`RefreshListener`]：一次性等待 `PackagesRefreshed` 事件

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

use crate::wiring::event::{
    FrameworkEvent, FrameworkEventKind, FrameworkListener, ModuleEvent, ModuleListener,
    ServiceEvent, ServiceListener,
};

/// 带时间戳的事件记录
#[derive(Debug, Clone, Serialize)]
pub struct Recorded<E> {
    pub at: DateTime<Utc>,
    pub event: E,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 通用事件记录器
///
/// 三个序列各自加锁，只追加不删除（[`ListenerLog::clear`] 除外）。
/// 运行时可能在其他线程回调，读取方应在同步点之后取快照。
#[derive(Debug, Default)]
pub struct ListenerLog {
    module_events: Mutex<Vec<Recorded<ModuleEvent>>>,
    framework_events: Mutex<Vec<Recorded<FrameworkEvent>>>,
    service_events: Mutex<Vec<Recorded<ServiceEvent>>>,
}

impl ListenerLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模块事件快照
    pub fn module_events(&self) -> Vec<Recorded<ModuleEvent>> {
        lock(&self.module_events).clone()
    }

    /// 框架事件快照
    pub fn framework_events(&self) -> Vec<Recorded<FrameworkEvent>> {
        lock(&self.framework_events).clone()
    }

    /// 服务事件快照
    pub fn service_events(&self) -> Vec<Recorded<ServiceEvent>> {
        lock(&self.service_events).clone()
    }

    /// 三类事件的数量 (模块, 框架, 服务)
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            lock(&self.module_events).len(),
            lock(&self.framework_events).len(),
            lock(&self.service_events).len(),
        )
    }

    pub fn clear(&self) {
        lock(&self.module_events).clear();
        lock(&self.framework_events).clear();
        lock(&self.service_events).clear();
    }
}

impl ModuleListener for ListenerLog {
    fn module_changed(&self, event: &ModuleEvent) {
        lock(&self.module_events).push(Recorded {
            at: Utc::now(),
            event: event.clone(),
        });
    }
}

impl FrameworkListener for ListenerLog {
    fn framework_event(&self, event: &FrameworkEvent) {
        lock(&self.framework_events).push(Recorded {
            at: Utc::now(),
            event: event.clone(),
        });
    }
}

impl ServiceListener for ListenerLog {
    fn service_changed(&self, event: &ServiceEvent) {
        lock(&self.service_events).push(Recorded {
            at: Utc::now(),
            event: event.clone(),
        });
    }
}

/// 刷新完成监听器
///
/// 收到 `PackagesRefreshed` 后在锁内置位并唤醒等待方；等待方在锁内复查标志，
/// 因此通知先于等待到达也不会丢失。
#[derive(Debug, Default)]
pub struct RefreshListener {
    done: Mutex<bool>,
    notify: Notify,
}

impl RefreshListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已收到刷新完成事件
    pub fn is_done(&self) -> bool {
        *lock(&self.done)
    }

    /// 等待刷新完成（无超时）
    pub async fn wait(&self) {
        loop {
            if self.is_done() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

impl FrameworkListener for RefreshListener {
    fn framework_event(&self, event: &FrameworkEvent) {
        if event.kind == FrameworkEventKind::PackagesRefreshed {
            let mut done = lock(&self.done);
            *done = true;
            self.notify.notify_one();
            debug!("Packages refreshed");
        }
    }
}
