//! 依赖子句模型
//!
//! 定义导入/导出子句 ([`ImportClause`] / [`ExportClause`]) 以及它们在清单中的文本渲染规则。
//!
//! # 渲染规则
//!
//! - 基本形式：`能力名[; key=value, key2="a b"]`
//! - 属性值包含 `,`、`;` 或空格时加双引号
//! - 导入子句在基本形式之后追加 `; resolution:=optional`
//! - 导出子句依次追加 `; mandatory:="..."` 与 `; uses:="..."`
//! - 同类多个子句以 `", "` 连接；导入语句总是以默认导入串开头
//!
//! # 示例
//!
//! ```rust
//! use chips_modkit::module::clause::{Clause, ExportClause, ImportClause};
//!
//! let export = ExportClause::new("x.y").version("1.0.0");
//! assert_eq!(export.statement(), "x.y; version=1.0.0");
//!
//! let import = ImportClause::new("x.y")
//!     .version("[1.0,2.0)")
//!     .resolution_optional(true);
//! assert_eq!(import.statement(), "x.y; version=\"[1.0,2.0)\"; resolution:=optional");
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// 版本属性键
pub const VERSION_ATTRIBUTE: &str = "version";

/// 可选解析指令
pub const RESOLUTION_OPTIONAL_DIRECTIVE: &str = "resolution:=optional";

/// 强制属性指令名
pub const MANDATORY_DIRECTIVE: &str = "mandatory";

/// uses 约束指令名
pub const USES_DIRECTIVE: &str = "uses";

/// 子句公共接口
///
/// 导入与导出子句共享能力名、属性表和语句渲染。
pub trait Clause {
    /// 能力（包）名称
    fn capability_name(&self) -> &str;

    /// 属性表
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// 渲染为单条清单语句
    fn statement(&self) -> String;
}

/// 子句公共部分：能力名 + 属性表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityClause {
    capability_name: String,
    attributes: BTreeMap<String, String>,
}

impl CapabilityClause {
    /// 创建子句
    pub fn new(capability_name: impl Into<String>) -> Self {
        Self {
            capability_name: capability_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// 能力名称
    pub fn capability_name(&self) -> &str {
        &self.capability_name
    }

    /// 属性表
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// 替换能力名称
    pub fn set_capability_name(&mut self, capability_name: impl Into<String>) {
        self.capability_name = capability_name.into();
    }

    /// 写入属性
    ///
    /// 键或值为空时不做任何事并返回 `false`。同名键后写覆盖先写。
    pub fn insert_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return false;
        }
        self.attributes.insert(key, value);
        true
    }

    /// 渲染基本语句：能力名 + 可选属性段
    pub fn base_statement(&self) -> String {
        let mut statement = self.capability_name.clone();
        if !self.attributes.is_empty() {
            statement.push_str("; ");
            statement.push_str(&join_attributes(&self.attributes));
        }
        statement
    }
}

/// 属性值是否需要加引号
pub fn needs_quoting(value: &str) -> bool {
    value.contains(',') || value.contains(';') || value.contains(' ')
}

/// 按需为属性值加引号
pub fn quote_value(value: &str) -> Cow<'_, str> {
    if needs_quoting(value) {
        Cow::Owned(format!("\"{}\"", value))
    } else {
        Cow::Borrowed(value)
    }
}

/// 将属性表渲染为 `k=v, k2=v2`
pub fn join_attributes(attributes: &BTreeMap<String, String>) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 将一组值以 `", "` 连接
pub fn join_values<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().collect::<Vec<_>>().join(", ")
}

// ============================================================================
// 导入子句
// ============================================================================

/// 导入子句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportClause {
    base: CapabilityClause,
    resolution_optional: bool,
}

impl ImportClause {
    /// 为指定能力创建导入子句
    pub fn new(capability_name: impl Into<String>) -> Self {
        Self {
            base: CapabilityClause::new(capability_name),
            resolution_optional: false,
        }
    }

    /// 设置版本（范围）要求
    pub fn version(self, version: impl Into<String>) -> Self {
        self.attribute(VERSION_ATTRIBUTE, version)
    }

    /// 添加属性，键或值为空时忽略
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.insert_attribute(key, value);
        self
    }

    /// 设置是否可选解析
    pub fn resolution_optional(mut self, optional: bool) -> Self {
        self.resolution_optional = optional;
        self
    }

    /// 替换能力名称
    pub fn capability(mut self, capability_name: impl Into<String>) -> Self {
        self.base.set_capability_name(capability_name);
        self
    }

    /// 是否可选解析
    pub fn is_resolution_optional(&self) -> bool {
        self.resolution_optional
    }
}

impl Clause for ImportClause {
    fn capability_name(&self) -> &str {
        self.base.capability_name()
    }

    fn attributes(&self) -> &BTreeMap<String, String> {
        self.base.attributes()
    }

    fn statement(&self) -> String {
        let mut statement = self.base.base_statement();
        if self.resolution_optional {
            statement.push_str("; ");
            statement.push_str(RESOLUTION_OPTIONAL_DIRECTIVE);
        }
        statement
    }
}

// ============================================================================
// 导出子句
// ============================================================================

/// 导出子句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportClause {
    base: CapabilityClause,
    mandatory: BTreeSet<String>,
    uses: BTreeSet<String>,
}

impl ExportClause {
    /// 为指定能力创建导出子句
    pub fn new(capability_name: impl Into<String>) -> Self {
        Self {
            base: CapabilityClause::new(capability_name),
            mandatory: BTreeSet::new(),
            uses: BTreeSet::new(),
        }
    }

    /// 设置导出版本
    pub fn version(self, version: impl Into<String>) -> Self {
        self.attribute(VERSION_ATTRIBUTE, version)
    }

    /// 添加属性，键或值为空时忽略
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.insert_attribute(key, value);
        self
    }

    /// 添加属性并标记是否为消费方必须匹配的强制属性
    ///
    /// 传入 `mandatory = false` 会把此前标记的同名键移出强制集合。
    pub fn mandatory_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        mandatory: bool,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return self;
        }
        if mandatory {
            self.mandatory.insert(key.clone());
        } else {
            self.mandatory.remove(&key);
        }
        self.base.insert_attribute(key, value);
        self
    }

    /// 添加 uses 约束
    pub fn uses(mut self, capability_name: impl Into<String>) -> Self {
        let capability_name = capability_name.into();
        if !capability_name.is_empty() {
            self.uses.insert(capability_name);
        }
        self
    }

    /// 替换能力名称
    pub fn capability(mut self, capability_name: impl Into<String>) -> Self {
        self.base.set_capability_name(capability_name);
        self
    }

    /// 强制属性键集合
    pub fn mandatory_keys(&self) -> &BTreeSet<String> {
        &self.mandatory
    }

    /// uses 约束集合
    pub fn uses_related(&self) -> &BTreeSet<String> {
        &self.uses
    }
}

impl Clause for ExportClause {
    fn capability_name(&self) -> &str {
        self.base.capability_name()
    }

    fn attributes(&self) -> &BTreeMap<String, String> {
        self.base.attributes()
    }

    fn statement(&self) -> String {
        let mut statement = self.base.base_statement();
        if !self.mandatory.is_empty() {
            statement.push_str(&format!(
                "; {}:=\"{}\"",
                MANDATORY_DIRECTIVE,
                join_values(self.mandatory.iter().map(String::as_str))
            ));
        }
        if !self.uses.is_empty() {
            statement.push_str(&format!(
                "; {}:=\"{}\"",
                USES_DIRECTIVE,
                join_values(self.uses.iter().map(String::as_str))
            ));
        }
        statement
    }
}

// ============================================================================
// 语句拼接
// ============================================================================

/// 以前缀开头，依次拼接子句语句
fn join_statements<C: Clause>(prefix: &str, clauses: &[C]) -> String {
    let mut statement = String::from(prefix);
    for clause in clauses {
        if !statement.is_empty() {
            statement.push_str(", ");
        }
        statement.push_str(&clause.statement());
    }
    statement
}

/// 渲染 Import-Package 值：默认导入串总是位于开头
pub fn render_imports(default_imports: &str, clauses: &[ImportClause]) -> String {
    join_statements(default_imports, clauses)
}

/// 渲染 Export-Package 值，无子句时为空串
pub fn render_exports(clauses: &[ExportClause]) -> String {
    join_statements("", clauses)
}
