//! 模块构建
//!
//! 包含合成模块的描述、清单渲染与归档打包：
//! - 导入/导出子句与清单头
//! - 内容源与类资源
//! - 模块描述符与归档读写
//! - 声明式描述文件解析

pub mod archive;
pub mod clause;
pub mod content;
pub mod descriptor;
pub mod manifest;
pub mod parser;

// 重导出常用类型
pub use archive::{ArchiveEntry, ArchiveWriter, ModuleArchive};
pub use clause::{Clause, ExportClause, ImportClause};
pub use content::{
    ClassResource, ClassSource, ContentSource, DirectoryClassSource, InMemoryClassSource,
};
pub use descriptor::{ActivatorSpec, DescriptorFactory, ModuleDescriptor};
pub use manifest::{parse_clauses, Manifest, ParsedClause};
pub use parser::{DescriptorFile, DescriptorFormat, ModuleParser};
