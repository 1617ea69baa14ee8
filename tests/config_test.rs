//! 配置集成测试
//!
//! 测试从文件加载配置、环境覆盖以及由配置驱动的厂商解析流程

use std::collections::HashMap;

use chips_modkit::core::config::{ENV_DEFINITIONS_DIR, ENV_VENDORS};
use chips_modkit::{
    CoreError, FrameworkOption, FrameworkSelection, HarnessConfig, RunnerProperties,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_load_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modkit.yaml");
    tokio::fs::write(
        &path,
        r#"
name_prefix: "suite."
default_imports: "org.osgi.framework, org.osgi.service.log"
vendors: "felix/1.8.0"
logging:
  level: debug
  json_format: true
"#,
    )
    .await
    .unwrap();

    let config = HarnessConfig::from_file(&path).await.unwrap();
    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.name_prefix, "suite.");
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    config.validate().unwrap();

    let descriptor = config.descriptor_factory().create("m");
    assert_eq!(descriptor.symbolic_name(), "suite.m");
    assert_eq!(
        descriptor.render_metadata().get("Import-Package"),
        Some("org.osgi.framework, org.osgi.service.log")
    );
}

#[tokio::test]
async fn test_load_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("modkit.json");
    tokio::fs::write(&path, r#"{"activator_class": "x.Activator"}"#)
        .await
        .unwrap();

    let config = HarnessConfig::from_file(&path).await.unwrap();
    assert_eq!(config.activator_class, "x.Activator");
    assert_eq!(config.name_prefix, "testCase.");
}

#[tokio::test]
async fn test_missing_config_file() {
    let err = HarnessConfig::from_file("/no/such/modkit.yaml")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ConfigLoadFailed(_)));
}

#[tokio::test]
async fn test_overrides_drive_vendor_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let properties_path = temp_dir.path().join("runner.properties");
    tokio::fs::write(
        &properties_path,
        "# supported platforms\nplatform.felix.1.8.0 = felix.xml\n",
    )
    .await
    .unwrap();

    let mut config = HarnessConfig::builder()
        .runner_properties(&properties_path)
        .build();

    let env: HashMap<&str, &str> = [
        (ENV_VENDORS, "felix/1.8.0, knopflerfish/2.0"),
        (ENV_DEFINITIONS_DIR, "/defs"),
    ]
    .into_iter()
    .collect();
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    let properties = config.load_runner_properties().unwrap();
    assert!(properties.is_platform_supported("felix", "1.8.0"));

    let resolved = config
        .vendor_selection()
        .unwrap()
        .resolve(&properties, config.definition_dir.as_deref())
        .unwrap();
    assert_eq!(
        resolved,
        FrameworkSelection::Options(vec![
            FrameworkOption::Builtin {
                vendor: "felix".to_string(),
                version: Some("1.8.0".to_string()),
            },
            FrameworkOption::Custom {
                vendor: "knopflerfish".to_string(),
                version: "2.0".to_string(),
                definition_url: "/defs/knopflerfish/2.0.xml".to_string(),
            },
        ])
    );
}

#[test]
fn test_blank_overrides_are_ignored() {
    let mut config = HarnessConfig::builder().vendors("equinox").build();
    config.apply_overrides(|_| Some("   ".to_string()));
    assert_eq!(config.vendors.as_deref(), Some("equinox"));
    assert!(config.definition_dir.is_none());
    assert_eq!(RunnerProperties::default().len(), 0);
}
