//! Boot, persistence and shutdown of a daemon

use keel_daemon::{load_boot_file, Daemon, DaemonConfig, DaemonError};
use keel_deployment::DeploymentState;
use keel_types::{names, ModelValue, Operation, PathAddress};
use std::fs;
use std::path::Path;

fn write_content(dir: &Path) {
    let app = dir.join("app.war");
    fs::create_dir_all(app.join("WEB-INF/lib/util.jar")).unwrap();
    fs::write(app.join("WEB-INF/lib/util.jar/Util.class"), [0xca, 0xfe]).unwrap();
    fs::create_dir_all(app.join("META-INF")).unwrap();
    fs::write(app.join("META-INF/keel-deployment.json"), r#"{"display-name": "App"}"#).unwrap();
}

fn config(root: &Path) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.model.boot_file = Some(root.join("boot.json"));
    config.model.persist = true;
    config.deployments.content_dir = Some(root.join("content"));
    config.deployments.server_group = "web".to_string();
    config
}

fn app_address() -> PathAddress {
    "/server-group=web/deployment=app.war".parse().unwrap()
}

#[test]
fn test_content_directory_deployed_and_persisted() {
    let root = tempfile::tempdir().unwrap();
    write_content(&root.path().join("content"));

    let daemon = Daemon::new(config(root.path())).unwrap();
    daemon.boot().unwrap();

    assert_eq!(daemon.deployments().status("app.war"), Some(DeploymentState::Deployed));
    assert_eq!(
        daemon
            .dispatcher()
            .resource(&app_address())
            .and_then(|r| r.attribute("enabled").cloned()),
        Some(ModelValue::from(true))
    );
    assert_eq!(daemon.mounts().active_mounts(), 2);

    let persisted = load_boot_file(&root.path().join("boot.json")).unwrap();
    let add = persisted
        .iter()
        .find(|op| op.name == names::ADD && op.address == app_address())
        .unwrap();
    assert_eq!(add.param("enabled"), Some(&ModelValue::from(true)));

    daemon.shutdown();
    assert_eq!(daemon.mounts().active_mounts(), 0);
    assert!(daemon.deployments().deployed().is_empty());
}

#[test]
fn test_reboot_redeploys_enabled_deployments_once() {
    let root = tempfile::tempdir().unwrap();
    write_content(&root.path().join("content"));

    let first = Daemon::new(config(root.path())).unwrap();
    first.boot().unwrap();
    first.shutdown();
    let before = first.render().unwrap();

    let second = Daemon::new(config(root.path())).unwrap();
    let mut events = second.deployments().subscribe();
    second.boot().unwrap();

    assert_eq!(second.render().unwrap(), before);
    assert_eq!(second.deployments().deployed(), vec!["app.war".to_string()]);
    let started = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e.event, keel_types::ManagementEvent::DeploymentStarted { .. }))
        .count();
    assert_eq!(started, 1);
    second.shutdown();
}

#[test]
fn test_boot_replays_core_model() {
    let root = tempfile::tempdir().unwrap();
    let boot = vec![
        Operation::new(names::ADD_HOST, "/host=master".parse().unwrap())
            .with_param(names::NAME, "master"),
        Operation::add("/subsystem=persistence".parse().unwrap())
            .with_param("default-datasource", "ExampleDS"),
        Operation::add("/interface=public".parse().unwrap()),
    ];
    fs::write(root.path().join("boot.json"), serde_json::to_vec(&boot).unwrap()).unwrap();

    let mut config = DaemonConfig::default();
    config.model.boot_file = Some(root.path().join("boot.json"));
    let daemon = Daemon::new(config).unwrap();
    daemon.boot().unwrap();

    let dispatcher = daemon.dispatcher();
    assert!(dispatcher
        .resource(&"/host=master/interface=management".parse().unwrap())
        .unwrap()
        .is_implicit());
    assert_eq!(
        dispatcher
            .resource(&"/subsystem=persistence".parse().unwrap())
            .unwrap()
            .attribute("default-datasource"),
        Some(&ModelValue::from("ExampleDS"))
    );
    // Persistence is off, so the boot file is untouched
    assert_eq!(load_boot_file(&root.path().join("boot.json")).unwrap(), boot);
}

#[test]
fn test_failed_boot_operation_stops_boot() {
    let root = tempfile::tempdir().unwrap();
    let boot = vec![
        Operation::add("/server-group=web".parse().unwrap()),
        Operation::add("/server-group=web/deployment=x.jar".parse().unwrap()),
    ];
    fs::write(root.path().join("boot.json"), serde_json::to_vec(&boot).unwrap()).unwrap();

    let mut config = DaemonConfig::default();
    config.model.boot_file = Some(root.path().join("boot.json"));
    config.model.persist = true;
    let daemon = Daemon::new(config).unwrap();

    match daemon.boot().unwrap_err() {
        DaemonError::Boot { index, operation, message, .. } => {
            assert_eq!(index, 1);
            assert_eq!(operation, names::ADD);
            assert!(message.contains("'hash' is required"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Never armed, so the boot file still holds what was replayed
    assert_eq!(load_boot_file(&root.path().join("boot.json")).unwrap(), boot);
}
