//! 模块清单
//!
//! 清单是归档中的第一个条目 (`META-INF/MANIFEST.MF`)，由按顺序排列的 `Key: Value` 行组成。
//! 本模块负责清单的渲染与解析，以及把 Import-Package / Export-Package 的值拆回子句。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::module::clause::{ExportClause, ImportClause, MANDATORY_DIRECTIVE, USES_DIRECTIVE};
use crate::utils::{CoreError, Result};

/// 清单在归档中的路径
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// 标准清单头
pub mod headers {
    pub const MANIFEST_VERSION: &str = "Manifest-Version";
    pub const MODULE_MANIFEST_VERSION: &str = "Module-ManifestVersion";
    pub const MODULE_NAME: &str = "Module-Name";
    pub const MODULE_SYMBOLIC_NAME: &str = "Module-SymbolicName";
    pub const IMPORT_PACKAGE: &str = "Import-Package";
    pub const EXPORT_PACKAGE: &str = "Export-Package";
    pub const MODULE_CLASSPATH: &str = "Module-ClassPath";
    pub const FRAGMENT_HOST: &str = "Fragment-Host";
    pub const MODULE_ACTIVATOR: &str = "Module-Activator";
}

/// Manifest-Version 的固定值
pub const MANIFEST_VERSION_VALUE: &str = "1";

/// Module-ManifestVersion 的固定值
pub const MODULE_MANIFEST_VERSION_VALUE: &str = "2";

/// 有序的清单头集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    /// 创建空清单
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入清单头；已存在的键在原位置被覆盖
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// 读取清单头
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 是否包含指定清单头
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 按写入顺序返回所有键
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// 按写入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 清单头数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 渲染为清单文本（CRLF 换行，以空行结束，不做续行折叠）
    pub fn render(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.entries {
            text.push_str(key);
            text.push_str(": ");
            text.push_str(value);
            text.push_str("\r\n");
        }
        text.push_str("\r\n");
        text
    }

    /// 从清单文本解析主段
    ///
    /// 同时接受 CRLF 与 LF；以空格开头的行视为上一行的续行；遇到第一个空行即结束。
    pub fn parse(text: &str) -> Result<Self> {
        let mut manifest = Manifest::new();
        let mut last_key: Option<String> = None;

        for (index, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                let key = last_key.as_ref().ok_or_else(|| {
                    CoreError::InvalidManifest(format!("第 {} 行为续行，但之前没有清单头", index + 1))
                })?;
                if let Some(entry) = manifest.entries.iter_mut().find(|(k, _)| k == key) {
                    entry.1.push_str(continuation);
                }
                continue;
            }

            let (key, value) = line.split_once(':').ok_or_else(|| {
                CoreError::InvalidManifest(format!("第 {} 行缺少 ':' 分隔符: '{}'", index + 1, line))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::InvalidManifest(format!(
                    "第 {} 行的清单头名称为空",
                    index + 1
                )));
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            manifest.insert(key, value);
            last_key = Some(key.to_string());
        }

        Ok(manifest)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ============================================================================
// 子句解析
// ============================================================================

/// 从清单值中解析出的子句
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedClause {
    /// 能力名称
    pub capability_name: String,
    /// 属性 (`key=value`)
    pub attributes: BTreeMap<String, String>,
    /// 指令 (`key:=value`)
    pub directives: BTreeMap<String, String>,
}

impl ParsedClause {
    /// 是否声明了 `resolution:=optional`
    pub fn is_resolution_optional(&self) -> bool {
        self.directives.get("resolution").map(String::as_str) == Some("optional")
    }

    /// mandatory 指令中的键
    pub fn mandatory_keys(&self) -> BTreeSet<String> {
        self.directive_list(MANDATORY_DIRECTIVE)
    }

    /// uses 指令中的能力名
    pub fn uses(&self) -> BTreeSet<String> {
        self.directive_list(USES_DIRECTIVE)
    }

    fn directive_list(&self, name: &str) -> BTreeSet<String> {
        self.directives
            .get(name)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 还原为导入子句
    pub fn to_import(&self) -> ImportClause {
        self.attributes
            .iter()
            .fold(ImportClause::new(&self.capability_name), |clause, (k, v)| {
                clause.attribute(k, v)
            })
            .resolution_optional(self.is_resolution_optional())
    }

    /// 还原为导出子句
    pub fn to_export(&self) -> ExportClause {
        let mandatory = self.mandatory_keys();
        let clause = self
            .attributes
            .iter()
            .fold(ExportClause::new(&self.capability_name), |clause, (k, v)| {
                clause.mandatory_attribute(k, v, mandatory.contains(k))
            });
        self.uses().into_iter().fold(clause, |clause, p| clause.uses(p))
    }
}

/// 在引号之外按分隔符切分
fn split_unquoted(input: &str, separator: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (index, c) in input.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            parts.push(&input[start..index]);
            start = index + c.len_utf8();
        }
    }
    if in_quotes {
        return Err(CoreError::InvalidManifest(format!("引号未闭合: '{}'", input)));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// 参数：属性或指令
enum Parameter<'a> {
    Attribute(&'a str, &'a str),
    Directive(&'a str, &'a str),
}

fn parse_parameter(token: &str) -> Option<Parameter<'_>> {
    let token = token.trim();
    if let Some((key, value)) = token.split_once(":=") {
        if !key.contains('=') {
            return Some(Parameter::Directive(key.trim(), unquote(value)));
        }
    }
    token
        .split_once('=')
        .map(|(key, value)| Parameter::Attribute(key.trim(), unquote(value)))
}

/// 解析 Import-Package / Export-Package 的值
///
/// 生成器把同一子句的多个属性用 `", "` 连接，因此逗号后以 `key=value` 开头的片段
/// 会并入前一个子句，而不是开启新子句。
pub fn parse_clauses(value: &str) -> Result<Vec<ParsedClause>> {
    let mut clauses: Vec<ParsedClause> = Vec::new();

    for segment in split_unquoted(value, ',')? {
        if segment.trim().is_empty() {
            continue;
        }
        let tokens = split_unquoted(segment, ';')?;
        let first = tokens[0].trim();

        let (clause, params) = match parse_parameter(first) {
            Some(_) => {
                let clause = clauses.last_mut().ok_or_else(|| {
                    CoreError::InvalidManifest(format!("参数 '{}' 之前没有子句", first))
                })?;
                (clause, &tokens[..])
            }
            None => {
                clauses.push(ParsedClause {
                    capability_name: first.to_string(),
                    ..Default::default()
                });
                let last = clauses.len() - 1;
                (&mut clauses[last], &tokens[1..])
            }
        };

        for token in params {
            match parse_parameter(token) {
                Some(Parameter::Attribute(key, value)) => {
                    clause.attributes.insert(key.to_string(), value.to_string());
                }
                Some(Parameter::Directive(key, value)) => {
                    clause.directives.insert(key.to_string(), value.to_string());
                }
                None => {
                    return Err(CoreError::InvalidManifest(format!(
                        "子句 '{}' 含有无法识别的参数 '{}'",
                        clause.capability_name,
                        token.trim()
                    )));
                }
            }
        }
    }

    Ok(clauses)
}
