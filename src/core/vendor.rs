//! 框架厂商选择
//!
//! 解析形如 `felix/1.8.0, equinox knopflerfish/2.0` 的选择串，并结合运行器属性
//! 把每一项解析为内置框架或自定义框架定义。
//!
//! - 以逗号或空白分隔的记号
//! - 任意位置出现 `all` 即选择全部框架
//! - `厂商/版本` 为带版本的条目，仅有名称的为不带版本的条目
//! - 含 `/` 但不符合 `厂商/版本` 形式的记号被跳过

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::RunnerProperties;
use crate::utils::{CoreError, Result};

/// 选择串记号
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*,?\s*([^\s|^,]+)\s*,?\s*").expect("Invalid vendor token regex")
});

/// `厂商/版本` 记号
static VERSIONED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/]+)/([^/]+)").expect("Invalid vendor version regex"));

/// 选择全部框架的记号
pub const ALL_FRAMEWORKS: &str = "all";

/// 选择串中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorEntry {
    pub vendor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl fmt::Display for VendorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}/{}", self.vendor, version),
            None => f.write_str(&self.vendor),
        }
    }
}

/// 解析后的选择串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorSelection {
    /// 全部框架
    AllFrameworks,
    /// 指定的框架列表
    Entries(Vec<VendorEntry>),
}

impl VendorSelection {
    /// 解析选择串
    pub fn parse(selector: &str) -> Self {
        let mut entries = Vec::new();

        for captures in TOKEN_REGEX.captures_iter(selector) {
            let token = match captures.get(1) {
                Some(token) => token.as_str(),
                None => continue,
            };
            if token == ALL_FRAMEWORKS {
                return VendorSelection::AllFrameworks;
            }

            if let Some(versioned) = VERSIONED_REGEX.captures(token) {
                entries.push(VendorEntry {
                    vendor: versioned[1].to_string(),
                    version: Some(versioned[2].to_string()),
                });
            } else if token.contains('/') {
                warn!(token, "Skipping malformed vendor token");
            } else {
                entries.push(VendorEntry {
                    vendor: token.to_string(),
                    version: None,
                });
            }
        }

        VendorSelection::Entries(entries)
    }

    /// 结合运行器属性解析为框架选项
    ///
    /// 运行器不内置支持的版本需要自定义定义文件 `<dir>/<vendor>/<version>.xml`；
    /// 此时未设置定义目录返回 [`CoreError::ConfigNotFound`]。
    pub fn resolve(
        &self,
        properties: &RunnerProperties,
        definition_dir: Option<&Path>,
    ) -> Result<FrameworkSelection> {
        let entries = match self {
            VendorSelection::AllFrameworks => return Ok(FrameworkSelection::AllFrameworks),
            VendorSelection::Entries(entries) => entries,
        };

        let mut options = Vec::with_capacity(entries.len());
        for entry in entries {
            let option = match &entry.version {
                None => FrameworkOption::Builtin {
                    vendor: entry.vendor.clone(),
                    version: None,
                },
                Some(version) if properties.is_platform_supported(&entry.vendor, version) => {
                    FrameworkOption::Builtin {
                        vendor: entry.vendor.clone(),
                        version: Some(version.clone()),
                    }
                }
                Some(version) => {
                    let dir = definition_dir.ok_or_else(|| {
                        CoreError::ConfigNotFound("框架定义目录未设置".to_string())
                    })?;
                    FrameworkOption::Custom {
                        vendor: entry.vendor.clone(),
                        version: version.clone(),
                        definition_url: format!(
                            "{}/{}/{}.xml",
                            dir.display(),
                            entry.vendor,
                            version
                        ),
                    }
                }
            };
            debug!(entry = %entry, option = ?option, "Vendor resolved");
            options.push(option);
        }
        Ok(FrameworkSelection::Options(options))
    }
}

/// 单个框架选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameworkOption {
    /// 运行器内置支持的框架
    Builtin {
        vendor: String,
        version: Option<String>,
    },
    /// 通过定义文件描述的框架
    Custom {
        vendor: String,
        version: String,
        definition_url: String,
    },
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkSelection {
    AllFrameworks,
    Options(Vec<FrameworkOption>),
}
