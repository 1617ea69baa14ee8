//! 模块测试工具包错误类型定义
//!
//! 本模块定义了归档生成、连线校验和场景编排中使用的所有错误类型。

use thiserror::Error;

/// 工具包核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 归档构建错误 ====================

    /// 归档构建失败（内容源无法读取）
    #[error("归档构建失败: 条目 '{entry}' - {reason}")]
    ArchiveBuild {
        entry: String,
        reason: String,
    },

    /// 归档格式无效
    #[error("归档格式无效: {0}")]
    InvalidArchive(String),

    /// 清单格式无效
    #[error("清单格式无效: {0}")]
    InvalidManifest(String),

    /// 模块描述文件无效
    #[error("无效的模块描述: {0}")]
    InvalidDescriptor(String),

    // ==================== 运行时错误 ====================

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 类未找到（只有此信号会被可达性检查视为 false）
    #[error("类未找到: '{0}'")]
    ClassNotFound(String),

    /// 模块安装失败
    #[error("模块安装失败: '{location}' - {reason}")]
    InstallFailed {
        location: String,
        reason: String,
    },

    /// 模块卸载失败
    #[error("模块卸载失败: '{module}' - {reason}")]
    UninstallFailed {
        module: String,
        reason: String,
    },

    /// 模块上下文不可用（模块未处于活动状态）
    #[error("模块上下文不可用: '{0}'")]
    ContextUnavailable(String),

    /// 服务操作失败
    #[error("服务操作失败: {0}")]
    ServiceFailed(String),

    /// 无效的服务过滤器
    #[error("无效的服务过滤器: '{0}'")]
    InvalidFilter(String),

    // ==================== 连线断言错误 ====================

    /// 消费方没有连线到任何提供方
    #[error("模块 {consumer} 没有通过 '{capability}' 连线到任何模块（期望提供方 {expected}）")]
    NotWired {
        capability: String,
        consumer: String,
        expected: String,
    },

    /// 消费方连线到了错误的提供方
    #[error("模块 {consumer} 使用的 '{capability}' 应当连线到 {expected}，实际连线到 {actual}")]
    WiringMismatch {
        capability: String,
        consumer: String,
        expected: String,
        actual: String,
    },

    /// 存在不应出现的连线
    #[error("模块 {consumer} 使用的 '{capability}' 不应连线到 {provider}，但实际存在该连线")]
    UnexpectedWiring {
        capability: String,
        consumer: String,
        provider: String,
    },

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置项未找到
    #[error("配置项未找到: '{0}'")]
    ConfigNotFound(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 正则表达式错误
    #[error("正则表达式错误: {0}")]
    Regex(#[from] regex::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 工具包操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 归档错误 (ARCHIVE-xxx)
    pub const ARCHIVE_BUILD_FAILED: &str = "ARCHIVE-001";
    pub const ARCHIVE_INVALID: &str = "ARCHIVE-002";
    pub const MANIFEST_INVALID: &str = "ARCHIVE-003";
    pub const DESCRIPTOR_INVALID: &str = "ARCHIVE-004";

    // 运行时错误 (RUNTIME-xxx)
    pub const MODULE_NOT_FOUND: &str = "RUNTIME-001";
    pub const CLASS_NOT_FOUND: &str = "RUNTIME-002";
    pub const MODULE_INSTALL_FAILED: &str = "RUNTIME-003";
    pub const MODULE_UNINSTALL_FAILED: &str = "RUNTIME-004";
    pub const CONTEXT_UNAVAILABLE: &str = "RUNTIME-005";
    pub const SERVICE_FAILED: &str = "RUNTIME-006";

    // 连线错误 (WIRING-xxx)
    pub const WIRING_MISSING: &str = "WIRING-001";
    pub const WIRING_MISMATCH: &str = "WIRING-002";
    pub const WIRING_UNEXPECTED: &str = "WIRING-003";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_NOT_FOUND: &str = "CONFIG-002";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-003";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ArchiveBuild { .. } => error_code::ARCHIVE_BUILD_FAILED,
            CoreError::InvalidArchive(_) => error_code::ARCHIVE_INVALID,
            CoreError::InvalidManifest(_) => error_code::MANIFEST_INVALID,
            CoreError::InvalidDescriptor(_) => error_code::DESCRIPTOR_INVALID,
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::ClassNotFound(_) => error_code::CLASS_NOT_FOUND,
            CoreError::InstallFailed { .. } => error_code::MODULE_INSTALL_FAILED,
            CoreError::UninstallFailed { .. } => error_code::MODULE_UNINSTALL_FAILED,
            CoreError::ContextUnavailable(_) => error_code::CONTEXT_UNAVAILABLE,
            CoreError::ServiceFailed(_) | CoreError::InvalidFilter(_) => {
                error_code::SERVICE_FAILED
            }
            CoreError::NotWired { .. } => error_code::WIRING_MISSING,
            CoreError::WiringMismatch { .. } => error_code::WIRING_MISMATCH,
            CoreError::UnexpectedWiring { .. } => error_code::WIRING_UNEXPECTED,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::ConfigNotFound(_) => error_code::CONFIG_NOT_FOUND,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 是否为连线断言失败
    ///
    /// 断言失败代表场景本身失败，调用方不应尝试恢复。
    pub fn is_assertion_failure(&self) -> bool {
        matches!(
            self,
            CoreError::NotWired { .. }
                | CoreError::WiringMismatch { .. }
                | CoreError::UnexpectedWiring { .. }
        )
    }
}
