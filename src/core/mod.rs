//! 核心模块
//!
//! 包含工具包配置、框架厂商选择和场景规范元数据。

pub mod config;
pub mod spec_info;
pub mod vendor;

pub use config::{HarnessConfig, HarnessConfigBuilder, LogConfig, RunnerProperties};
pub use spec_info::{
    lookup_specs, parse_test_case_name, SpecCatalog, SpecMetadataProvider, SpecRecord,
    SpecRecords, TestCaseName,
};
pub use vendor::{FrameworkOption, FrameworkSelection, VendorEntry, VendorSelection};
