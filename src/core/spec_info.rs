//! 场景规范元数据
//!
//! 每个场景（测试方法）可以声明它覆盖的规范版本与章节。元数据由 [`SpecMetadataProvider`] 提供，
//! 查找失败时降级为空列表，不影响场景本身。
//!
//! 运行器为每个框架重复执行同一场景，并把场景名写成 `method [vendor/version[url]]`，
//! [`parse_test_case_name`] 从中还原方法名与厂商。

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::Result;

/// 场景名：`method [vendor[...]]`
static TEST_CASE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s]+)\s*\[([^\[]+)[\[]?.*[\]]?\]$").expect("Invalid test case name regex")
});

/// 无法识别时使用的占位值
pub const UNKNOWN: &str = "unknown";

/// 一条规范记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRecord {
    /// 规范版本
    pub version: String,
    /// 覆盖的章节
    #[serde(default)]
    pub sections: Vec<String>,
}

/// 场景声明的规范记录
///
/// 同时存在时，版本列表优先于单条记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecRecords {
    Versioned(Vec<SpecRecord>),
    Single(SpecRecord),
}

impl SpecRecords {
    pub fn into_vec(self) -> Vec<SpecRecord> {
        match self {
            SpecRecords::Versioned(records) => records,
            SpecRecords::Single(record) => vec![record],
        }
    }
}

/// 规范元数据提供方
pub trait SpecMetadataProvider: Send + Sync {
    /// 查找场景的规范记录；场景存在但未声明时返回 `Ok(None)`
    fn spec_records(&self, owner: &str, method: &str) -> Result<Option<SpecRecords>>;
}

/// 查找规范记录，任何失败都降级为空列表
pub fn lookup_specs(
    provider: &dyn SpecMetadataProvider,
    owner: &str,
    method: &str,
) -> Vec<SpecRecord> {
    match provider.spec_records(owner, method) {
        Ok(Some(records)) => records.into_vec(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(owner, method, error = %e, "Spec metadata lookup failed");
            Vec::new()
        }
    }
}

/// 从场景名还原的信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseName {
    pub method: String,
    pub vendor: String,
}

/// 解析场景名 `method [vendor/version[url]]`
pub fn parse_test_case_name(name: &str) -> Option<TestCaseName> {
    let captures = TEST_CASE_NAME_REGEX.captures(name)?;
    Some(TestCaseName {
        method: captures.get(1)?.as_str().to_string(),
        vendor: captures.get(2)?.as_str().trim().to_string(),
    })
}

/// 场景规范目录
///
/// 以 `owner` → `method` → 记录 的形式从 YAML / JSON 文件加载。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecCatalog {
    owners: HashMap<String, HashMap<String, SpecRecords>>,
}

impl SpecCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载（按扩展名选择 JSON 或 YAML）
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: SpecCatalog = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        debug!(path = %path.display(), owners = catalog.owners.len(), "Spec catalog loaded");
        Ok(catalog)
    }

    /// 登记记录
    pub fn insert(&mut self, owner: impl Into<String>, method: impl Into<String>, records: SpecRecords) {
        self.owners
            .entry(owner.into())
            .or_default()
            .insert(method.into(), records);
    }
}

impl SpecMetadataProvider for SpecCatalog {
    fn spec_records(&self, owner: &str, method: &str) -> Result<Option<SpecRecords>> {
        Ok(self
            .owners
            .get(owner)
            .and_then(|methods| methods.get(method))
            .cloned())
    }
}
