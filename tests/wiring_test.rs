//! 连线校验集成测试

mod common;

use std::sync::Arc;

use chips_modkit::module::content::ClassResource;
use chips_modkit::{CoreError, ExportClause, HarnessConfig, ImportClause, ScenarioHarness};

use common::{factory_with_classes, FakeFramework};

fn harness(framework: &Arc<FakeFramework>, classes: &[&str]) -> ScenarioHarness {
    ScenarioHarness::new(framework.clone(), HarnessConfig::default())
        .unwrap()
        .with_factory(factory_with_classes(classes))
}

#[tokio::test]
async fn test_consumer_wired_to_provider() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &[]);

    let provider = harness
        .install(
            &harness
                .create_descriptor("provider")
                .export(ExportClause::new("x.y").version("1.0.0")),
        )
        .await
        .unwrap();
    let consumer = harness
        .install(
            &harness
                .create_descriptor("consumer")
                .import(ImportClause::new("x.y")),
        )
        .await
        .unwrap();
    harness.refresh_framework_and_wait(None).await.unwrap();

    let verifier = harness.verifier();
    assert_eq!(
        verifier.find_provider("x.y", &consumer).await.map(|m| m.id),
        Some(provider.id)
    );
    assert_eq!(verifier.wired_version("x.y", &consumer).await, "1.0.0");
    assert_eq!(verifier.wired_version("x.z", &consumer).await, "");

    verifier.check_wiring("x.y", &consumer, &provider, true).await.unwrap();
    verifier.assert_wired("x.y", &consumer, &provider).await.unwrap();
    verifier.check_wiring("x.y", &provider, &consumer, false).await.unwrap();

    assert!(!verifier.is_private("x.y", &consumer).await);
    assert!(verifier.is_private("x.y", &provider).await);
    assert!(verifier.is_exported("x.y").await);
    assert!(!verifier.is_exported("x.z").await);
    assert!(verifier.is_providing_to_others(&provider).await);
    assert!(!verifier.is_providing_to_others(&consumer).await);
}

#[tokio::test]
async fn test_self_wired_capability_is_private() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &[]);

    let module = harness
        .install(
            &harness
                .create_descriptor("loner")
                .export(ExportClause::new("x.self"))
                .import(ImportClause::new("x.self")),
        )
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert!(verifier.is_private("x.self", &module).await);
    assert!(verifier.is_exported("x.self").await);
    assert!(!verifier.is_providing_to_others(&module).await);
}

#[tokio::test]
async fn test_check_wiring_failures_name_both_sides() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &[]);

    let old = harness
        .install(
            &harness
                .create_descriptor("old")
                .export(ExportClause::new("x.y").version("1.0.0")),
        )
        .await
        .unwrap();
    let new = harness
        .install(
            &harness
                .create_descriptor("new")
                .export(ExportClause::new("x.y").version("2.0.0")),
        )
        .await
        .unwrap();
    let consumer = harness
        .install(
            &harness
                .create_descriptor("consumer")
                .import(ImportClause::new("x.y").version("2.0.0")),
        )
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert_eq!(verifier.wired_version("x.y", &consumer).await, "2.0.0");

    let err = verifier
        .check_wiring("x.y", &consumer, &old, true)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::WiringMismatch { .. }));
    let message = err.to_string();
    assert!(message.contains(&old.to_string()));
    assert!(message.contains(&new.to_string()));
    assert!(message.contains("x.y"));

    let err = verifier
        .check_wiring("x.y", &consumer, &new, false)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnexpectedWiring { .. }));

    let err = verifier
        .check_wiring("x.missing", &consumer, &new, true)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotWired { .. }));
    assert!(err.is_assertion_failure());

    // 完全未连线时否定断言通过
    verifier
        .check_wiring("x.missing", &consumer, &new, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mandatory_attribute_must_be_matched() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &[]);

    let provider = harness
        .install(
            &harness
                .create_descriptor("provider")
                .export(ExportClause::new("x.m").mandatory_attribute("flavor", "blue", true)),
        )
        .await
        .unwrap();
    let plain = harness
        .install(
            &harness
                .create_descriptor("plain")
                .import(ImportClause::new("x.m")),
        )
        .await
        .unwrap();
    let matching = harness
        .install(
            &harness
                .create_descriptor("matching")
                .import(ImportClause::new("x.m").attribute("flavor", "blue")),
        )
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert!(verifier.find_provider("x.m", &plain).await.is_none());
    verifier.assert_wired("x.m", &matching, &provider).await.unwrap();
}

#[tokio::test]
async fn test_class_reachability_follows_wiring() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &["x.y.Foo"]);

    harness
        .install(
            &harness
                .create_descriptor("provider")
                .pack_class(ClassResource::new("x.y.Foo"))
                .export(ExportClause::new("x.y")),
        )
        .await
        .unwrap();
    let consumer = harness
        .install(
            &harness
                .create_descriptor("consumer")
                .import(ImportClause::new("x.y")),
        )
        .await
        .unwrap();
    let stranger = harness
        .install(&harness.create_descriptor("stranger"))
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert!(verifier.is_reachable("x.y.Foo", &consumer).await.unwrap());
    assert!(!verifier.is_reachable("x.y.Foo", &stranger).await.unwrap());
    assert!(!verifier.is_reachable("x.y.Bar", &consumer).await.unwrap());

    // 未找到模块不是 ClassNotFound，原样返回
    harness.framework().uninstall(&stranger).await.unwrap();
    let err = verifier.is_reachable("x.y.Foo", &stranger).await.unwrap_err();
    assert!(matches!(err, CoreError::ModuleNotFound(_)));
}

#[tokio::test]
async fn test_service_usability_and_release() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &["x.y.Foo", "x.y.FooImpl"]);

    let provider = harness
        .install(
            &harness
                .create_descriptor("provider")
                .pack_class(ClassResource::new("x.y.Foo"))
                .pack_class(ClassResource::new("x.y.FooImpl"))
                .export(ExportClause::new("x.y")),
        )
        .await
        .unwrap();
    let consumer = harness
        .install(
            &harness
                .create_descriptor("consumer")
                .import(ImportClause::new("x.y")),
        )
        .await
        .unwrap();
    // 自带一份同名接口，定义模块不同
    let copycat = harness
        .install(
            &harness
                .create_descriptor("copycat")
                .pack_class(ClassResource::new("x.y.Foo")),
        )
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert!(!verifier.sees_service("x.y.Foo", &consumer).await.unwrap());
    assert!(!verifier.can_use_service("x.y.Foo", &consumer).await.unwrap());

    assert!(verifier.register_service("x.y.FooImpl", "x.y.Foo", &provider).await);
    assert!(!verifier.register_service("x.y.Missing", "x.y.Foo", &provider).await);

    assert!(verifier.sees_service("x.y.Foo", &consumer).await.unwrap());
    assert!(verifier.can_use_service("x.y.Foo", &consumer).await.unwrap());
    assert!(verifier.can_use_service("x.y.Foo", &provider).await.unwrap());

    assert!(verifier.sees_service("x.y.Foo", &copycat).await.unwrap());
    assert!(!verifier.can_use_service("x.y.Foo", &copycat).await.unwrap());

    assert_eq!(framework.outstanding_services(), 0);
}

#[tokio::test]
async fn test_every_reference_released_when_one_is_unusable() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &["x.y.Foo", "x.y.FooImpl"]);

    let first = harness
        .install(
            &harness
                .create_descriptor("first")
                .pack_class(ClassResource::new("x.y.Foo"))
                .pack_class(ClassResource::new("x.y.FooImpl")),
        )
        .await
        .unwrap();
    let second = harness
        .install(
            &harness
                .create_descriptor("second")
                .pack_class(ClassResource::new("x.y.Foo"))
                .pack_class(ClassResource::new("x.y.FooImpl")),
        )
        .await
        .unwrap();

    let verifier = harness.verifier();
    assert!(verifier.register_service("x.y.FooImpl", "x.y.Foo", &first).await);
    assert!(verifier.register_service("x.y.FooImpl", "x.y.Foo", &second).await);

    // first 只能使用自己注册的那一个
    assert!(!verifier.can_use_service("x.y.Foo", &first).await.unwrap());
    assert_eq!(framework.outstanding_services(), 0);
}

#[tokio::test]
async fn test_reference_released_when_assignability_check_fails() {
    let framework = FakeFramework::new();
    let harness = harness(&framework, &["x.y.Foo", "x.y.FooImpl"]);

    let provider = harness
        .install(
            &harness
                .create_descriptor("provider")
                .pack_class(ClassResource::new("x.y.Foo"))
                .pack_class(ClassResource::new("x.y.FooImpl")),
        )
        .await
        .unwrap();
    let verifier = harness.verifier();
    assert!(verifier.register_service("x.y.FooImpl", "x.y.Foo", &provider).await);

    framework.fail_load_class_of("x.y.Foo");
    let err = verifier
        .can_use_service("x.y.Foo", &provider)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ContextUnavailable(_)));

    assert_eq!(framework.unget_calls(), 1);
    assert_eq!(framework.outstanding_services(), 0);
}
