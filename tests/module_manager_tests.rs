//! Module manager tests
//!
//! Loading from disk, dependency resolution, main selection and launch.

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use modhost::{
    EntryTarget, ModuleConfig, ModuleContext, ModuleError, ModuleManager, ModuleState, Services,
};

#[tokio::test]
async fn test_load_from_package_path() {
    let fixture = ModuleTestFixture::new().unwrap();
    let package = fixture.write_manifest("greeter", &manifest("greeter", "1.0.0"));

    let (mut manager, _) = manager_with_entries(&[]);
    let id = manager.load_module(&package).await.unwrap();

    assert_eq!(id.to_string(), "greeter@1.0.0");
    assert_eq!(manager.module_state(&id), Some(ModuleState::Loaded));
    let record = manager.modules().next().unwrap();
    assert_eq!(record.source.as_deref(), Some(fixture.path().join("greeter.toml").as_path()));
}

#[tokio::test]
async fn test_load_json_manifest() {
    let fixture = ModuleTestFixture::new().unwrap();
    let package = fixture.write_json_manifest("store", &manifest("store", "0.3.1"));

    let (mut manager, _) = manager_with_entries(&[]);
    let id = manager.load_module(&package).await.unwrap();
    assert_eq!(id.version.to_string(), "0.3.1");
}

#[tokio::test]
async fn test_duplicate_version_rejected_distinct_version_accepted() {
    let fixture = ModuleTestFixture::new().unwrap();
    let first = fixture.write_manifest("core-a", &manifest("core", "1.0.0"));
    let again = fixture.write_manifest("core-b", &manifest("core", "1.0.0"));
    let newer = fixture.write_manifest("core-c", &manifest("core", "1.1.0"));

    let (mut manager, _) = manager_with_entries(&[]);
    manager.load_module(&first).await.unwrap();

    let err = manager.load_module(&again).await.unwrap_err();
    assert!(matches!(err, ModuleError::DuplicateVersion(ref id) if id.name == "core"));
    assert!(err.is_load_error());

    manager.load_module(&newer).await.unwrap();
    assert_eq!(manager.modules().count(), 2);
}

#[tokio::test]
async fn test_invalid_manifests_rejected() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.write_raw("no-entry.toml", "name = \"x\"\nversion = \"1.0.0\"\n");
    fixture.write_raw("bad-version.toml", "name = \"x\"\nversion = \"one\"\nentry_point = \"x\"\n");
    fixture.write_raw("garbage.json", "{ not json");

    let (mut manager, _) = manager_with_entries(&[]);
    for stem in ["no-entry", "bad-version", "garbage"] {
        let err = manager.load_module(fixture.path().join(stem)).await.unwrap_err();
        assert!(
            matches!(err, ModuleError::InvalidModule { .. }),
            "{stem}: {err:?}"
        );
    }
    assert_eq!(manager.modules().count(), 0);
}

#[tokio::test]
async fn test_oversized_manifest_rejected() {
    let fixture = ModuleTestFixture::new().unwrap();
    let padding = format!("# {}\n", "x".repeat(70 * 1024));
    fixture.write_raw(
        "huge.toml",
        &format!("{padding}name = \"huge\"\nversion = \"1.0.0\"\nentry_point = \"huge\"\n"),
    );

    let (mut manager, _) = manager_with_entries(&[]);
    let err = manager.load_module(fixture.path().join("huge")).await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidModule { .. }));
}

#[tokio::test]
async fn test_missing_package_is_io_error() {
    let fixture = ModuleTestFixture::new().unwrap();
    let (mut manager, _) = manager_with_entries(&[]);
    let err = manager
        .load_module(fixture.path().join("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::Io { .. }));
}

#[tokio::test]
async fn test_load_directory_collects_failures() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.write_manifest("a", &manifest("a", "1.0.0"));
    fixture.write_manifest("b", &main_manifest("b", "1.0.0"));
    fixture.write_raw("broken.toml", "name = ");
    fixture.write_raw("README.md", "not a manifest");

    let (mut manager, _) = manager_with_entries(&[]);
    let report = manager.load_directory(fixture.path()).await.unwrap();

    let loaded: Vec<_> = report.loaded.iter().map(|id| id.name.as_str()).collect();
    assert_eq!(loaded, ["a", "b"]);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].0.ends_with("broken"));
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_load_directory_honours_enabled_modules() {
    let fixture = ModuleTestFixture::new().unwrap();
    fixture.write_manifest("a", &manifest("a", "1.0.0"));
    fixture.write_manifest("b", &manifest("b", "1.0.0"));

    let config = ModuleConfig {
        enabled_modules: vec!["b".to_string()],
        ..ModuleConfig::default()
    };
    let mut manager = ModuleManager::with_config(Services::new(), &config);
    let report = manager.load_directory(fixture.path()).await.unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.loaded[0].name, "b");
}

#[tokio::test]
async fn test_run_launches_main_exactly_once() {
    let (mut manager, counter) = manager_with_entries(&["app", "core"]);
    let core = manager.load_manifest(manifest("core", "1.4.2")).unwrap();
    let app = manager
        .load_manifest(main_manifest("app", "1.0.0").with_dependency("core", ">=1.2, <2.0"))
        .unwrap();

    let plan = manager.run().await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(plan.main, app);
    assert_eq!(plan.order, [core.clone(), app.clone()]);
    assert_eq!(manager.module_state(&app), Some(ModuleState::Launched));
    assert_eq!(manager.module_state(&core), Some(ModuleState::Resolved));
}

#[tokio::test]
async fn test_major_only_requirement_accepts_any_minor() {
    let (mut manager, counter) = manager_with_entries(&["app", "log"]);
    let log = manager.load_manifest(manifest("log", "0.4.0")).unwrap();
    let app = manager
        .load_manifest(main_manifest("app", "1.0.0").with_dependency("log", "^0"))
        .unwrap();

    let plan = manager.run().await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(plan.order, [log, app]);
}

#[tokio::test]
async fn test_missing_dependency_names_target() {
    let (mut manager, counter) = manager_with_entries(&["app"]);
    let app = manager
        .load_manifest(main_manifest("app", "1.0.0").with_dependency("db", "^2.0"))
        .unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::DependencyNotFound {
            module,
            target,
            requirement,
        } => {
            assert_eq!(module, app);
            assert_eq!(target, "db");
            assert_eq!(requirement, "^2.0");
        }
        other => panic!("expected DependencyNotFound, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(manager.module_state(&app), Some(ModuleState::Failed));
}

#[tokio::test]
async fn test_dependency_version_must_satisfy_requirement() {
    let (mut manager, counter) = manager_with_entries(&["app"]);
    manager.load_manifest(manifest("db", "1.9.0")).unwrap();
    manager
        .load_manifest(main_manifest("app", "1.0.0").with_dependency("db", ">=2.0"))
        .unwrap();

    assert!(matches!(
        manager.run().await,
        Err(ModuleError::DependencyNotFound { .. })
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_main_module() {
    let (mut manager, counter) = manager_with_entries(&["a"]);
    let a = manager.load_manifest(manifest("a", "1.0.0")).unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::NoMainModule { candidates } => assert!(candidates.is_empty()),
        other => panic!("expected NoMainModule, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    // resolution passed but nothing was selected, so the module stays Loaded
    assert_eq!(manager.module_state(&a), Some(ModuleState::Loaded));
}

#[tokio::test]
async fn test_several_main_modules_is_ambiguous() {
    let (mut manager, counter) = manager_with_entries(&["a", "b"]);
    let a = manager.load_manifest(main_manifest("a", "1.0.0")).unwrap();
    let b = manager.load_manifest(main_manifest("b", "1.0.0")).unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::NoMainModule { candidates } => assert_eq!(candidates, [a.clone(), b.clone()]),
        other => panic!("expected NoMainModule, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(manager.module_state(&a), Some(ModuleState::Failed));
    assert_eq!(manager.module_state(&b), Some(ModuleState::Failed));
}

#[tokio::test]
async fn test_cycle_rejected_without_launch() {
    let (mut manager, counter) = manager_with_entries(&["a", "b", "c"]);
    let a = manager
        .load_manifest(main_manifest("a", "1.0.0").with_dependency("b", "*"))
        .unwrap();
    let b = manager
        .load_manifest(manifest("b", "1.0.0").with_dependency("c", "*"))
        .unwrap();
    let c = manager
        .load_manifest(manifest("c", "1.0.0").with_dependency("b", "*"))
        .unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::DependencyCycle { modules } => {
            assert!(modules.contains(&b) && modules.contains(&c));
            assert!(!modules.contains(&a));
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(manager.module_state(&a), Some(ModuleState::Loaded));
    assert_eq!(manager.module_state(&b), Some(ModuleState::Failed));
}

#[tokio::test]
async fn test_unknown_entry_target() {
    let (mut manager, _) = manager_with_entries(&[]);
    let app = manager.load_manifest(main_manifest("app", "1.0.0")).unwrap();

    assert!(matches!(
        manager.run().await,
        Err(ModuleError::EntryTargetNotFound { reference }) if reference == "app"
    ));
    assert_eq!(manager.module_state(&app), Some(ModuleState::Failed));
}

#[tokio::test]
async fn test_unknown_entry_on_target() {
    let (mut manager, counter) = manager_with_entries(&[]);
    manager.register_entry_target(
        "app",
        EntryTarget::new().with_entry("serve", counting_entry(&counter)),
    );
    let mut app = main_manifest("app", "1.0.0");
    app.entry_point = "app::start".to_string();
    manager.load_manifest(app).unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::EntryNotFound { target, entry } => {
            assert_eq!(target, "app");
            assert_eq!(entry, "start");
        }
        other => panic!("expected EntryNotFound, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_entry_point_error_preserved() {
    let mut manager = ModuleManager::new(Services::new());
    manager.register_entry_point("app", |_ctx: ModuleContext| async {
        Err::<(), _>(anyhow::anyhow!("port already in use"))
    });
    let app = manager.load_manifest(main_manifest("app", "1.0.0")).unwrap();

    match manager.run().await.unwrap_err() {
        ModuleError::InvocationFailed { module, source } => {
            assert_eq!(module, app);
            assert_eq!(source.to_string(), "port already in use");
        }
        other => panic!("expected InvocationFailed, got {other:?}"),
    }
    assert_eq!(manager.module_state(&app), Some(ModuleState::Failed));
}

#[tokio::test]
async fn test_panicking_entry_point_is_invocation_failure() {
    let mut manager = ModuleManager::new(Services::new());
    manager.register_entry_point("app", |_ctx: ModuleContext| async {
        if true {
            panic!("boom");
        }
        Ok::<_, anyhow::Error>(())
    });
    manager.load_manifest(main_manifest("app", "1.0.0")).unwrap();

    assert!(matches!(
        manager.run().await,
        Err(ModuleError::InvocationFailed { .. })
    ));
}

#[tokio::test]
async fn test_failed_run_can_be_retried_after_fix() {
    let (mut manager, counter) = manager_with_entries(&["app", "db"]);
    let app = manager
        .load_manifest(main_manifest("app", "1.0.0").with_dependency("db", "^1.0"))
        .unwrap();
    assert!(manager.run().await.is_err());
    assert_eq!(manager.module_state(&app), Some(ModuleState::Failed));

    manager.load_manifest(manifest("db", "1.2.0")).unwrap();
    manager.run().await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(manager.module_state(&app), Some(ModuleState::Launched));
}

#[tokio::test]
async fn test_entry_point_publishes_services() {
    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }
    struct Fixed;
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            42
        }
    }

    let services = Services::new();
    let mut manager = ModuleManager::new(services.clone());
    manager.register_entry_point("app", |ctx: ModuleContext| async move {
        assert!(ctx.instance_id.starts_with("app@1.0.0-"));
        ctx.services.publish::<dyn Clock>(Arc::new(Fixed));
        Ok::<_, anyhow::Error>(())
    });
    manager.load_manifest(main_manifest("app", "1.0.0")).unwrap();
    manager.run().await.unwrap();

    assert_eq!(services.get::<dyn Clock>().unwrap().now(), 42);
    assert_eq!(manager.services().count::<dyn Clock>(), 1);
}
