//! Ordering, cleanup and nested discovery across the pipeline

use keel_deployment::processors::{
    nested::nested_archive_paths, standard_processors, NESTED_MOUNTS,
};
use keel_deployment::{
    AttachmentKey, CleanupError, DeploymentError, DeploymentPipeline, DeploymentState,
    DeploymentUnit, MountHandle, MountTable, Phase, ProcessingError, Processor, VirtualFile,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

type Journal = Arc<Mutex<Vec<String>>>;

/// Records deploy and undeploy calls; optionally fails, or opens a handle
struct Step {
    name: &'static str,
    journal: Journal,
    fail: bool,
    handle: Option<(&'static str, bool)>,
}

impl Step {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            fail: false,
            handle: None,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn opening(mut self, path: &'static str, close_fails: bool) -> Self {
        self.handle = Some((path, close_fails));
        self
    }
}

impl Processor for Step {
    fn name(&self) -> &str {
        self.name
    }

    fn deploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        self.journal.lock().push(format!("deploy {}", self.name));
        if let Some((path, close_fails)) = self.handle {
            unit.register_handle(
                path,
                Box::new(Handle {
                    path,
                    fails: close_fails,
                    journal: Arc::clone(&self.journal),
                }),
            );
        }
        if self.fail {
            return Err(ProcessingError::new(format!("{} exploded", self.name)));
        }
        Ok(())
    }

    fn undeploy(&self, _unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        self.journal.lock().push(format!("undeploy {}", self.name));
        Ok(())
    }
}

struct Handle {
    path: &'static str,
    fails: bool,
    journal: Journal,
}

impl MountHandle for Handle {
    fn close(&mut self) -> Result<(), CleanupError> {
        self.journal.lock().push(format!("close {}", self.path));
        if self.fails {
            Err(CleanupError::new(self.path, "busy"))
        } else {
            Ok(())
        }
    }
}

fn unit() -> DeploymentUnit {
    DeploymentUnit::new("app.war", "app.war", VirtualFile::directory())
}

fn entries(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .map(|e| e[prefix.len()..].to_string())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_phase_order_and_mirrored_teardown() {
    let journal = Journal::default();
    let pipeline = DeploymentPipeline::new();
    // Registered out of phase order on purpose
    pipeline.register(Phase(30), Arc::new(Step::new("30", &journal)));
    pipeline.register(Phase(20), Arc::new(Step::new("20a", &journal)));
    pipeline.register(Phase(10), Arc::new(Step::new("10", &journal)));
    pipeline.register(Phase(20), Arc::new(Step::new("20b", &journal)));

    let mut unit = unit();
    pipeline.deploy(&mut unit).unwrap();
    assert_eq!(entries(&journal, "deploy "), vec!["10", "20a", "20b", "30"]);

    pipeline.undeploy(&mut unit).unwrap();
    assert_eq!(entries(&journal, "undeploy "), vec!["30", "20b", "20a", "10"]);
    assert_eq!(unit.state(), DeploymentState::Undeployed);
}

#[test]
fn test_failure_skips_later_processors_and_closes_handles() {
    let journal = Journal::default();
    let pipeline = DeploymentPipeline::new();
    pipeline.register(
        Phase::STRUCTURE,
        Arc::new(Step::new("mount", &journal).opening("root", false)),
    );
    pipeline.register(
        Phase::PARSE,
        Arc::new(Step::new("parse", &journal).opening("lib/x.jar", false).failing()),
    );
    pipeline.register(Phase::PARSE, Arc::new(Step::new("parse-late", &journal)));
    pipeline.register(Phase::INSTALL, Arc::new(Step::new("install", &journal)));

    let mut unit = unit();
    let err = pipeline.deploy(&mut unit).unwrap_err();
    match err {
        DeploymentError::ProcessingFailed { unit, phase, message } => {
            assert_eq!(unit, "app.war");
            assert_eq!(phase, Phase::PARSE);
            assert_eq!(message, "parse exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(unit.state(), DeploymentState::FailedAtPhase(Phase::PARSE));
    assert_eq!(entries(&journal, "deploy "), vec!["mount", "parse"]);
    // The handle opened by the failing step is closed too
    assert_eq!(entries(&journal, "close "), vec!["lib/x.jar", "root"]);
    assert_eq!(unit.lifecycle().handle_count(), 0);

    // Only the step that completed is undone
    pipeline.undeploy(&mut unit).unwrap();
    assert_eq!(entries(&journal, "undeploy "), vec!["mount"]);
    assert_eq!(entries(&journal, "close ").len(), 2);
}

#[test]
fn test_close_all_closes_every_handle_and_reports_one_failure() {
    let journal = Journal::default();
    let pipeline = DeploymentPipeline::new();
    pipeline.register(Phase(10), Arc::new(Step::new("first", &journal).opening("one", false)));
    pipeline.register(Phase(20), Arc::new(Step::new("second", &journal).opening("two", true)));
    pipeline.register(Phase(30), Arc::new(Step::new("third", &journal).opening("three", false)));

    let mut unit = unit();
    pipeline.deploy(&mut unit).unwrap();
    assert_eq!(unit.lifecycle().handle_count(), 3);

    let err = pipeline.undeploy(&mut unit).unwrap_err();
    assert!(matches!(
        err,
        DeploymentError::Cleanup(CleanupError { ref path, .. }) if path == "two"
    ));
    assert_eq!(entries(&journal, "close "), vec!["three", "two", "one"]);
    assert_eq!(unit.lifecycle_mut().take_failures().len(), 1);
    assert_eq!(unit.state(), DeploymentState::Undeployed);
}

#[test]
fn test_nested_scan_does_not_enter_nested_archives() {
    let outer = VirtualFile::archive().with_entry(
        "a.jar",
        VirtualFile::archive().with_entry("b.jar", VirtualFile::archive()),
    );
    let root = VirtualFile::Directory(outer.entries().unwrap().clone());
    assert_eq!(nested_archive_paths(&root), vec!["a.jar"]);

    // b.jar becomes visible once a.jar is mounted and scanned
    let a = VirtualFile::Directory(root.lookup("a.jar").unwrap().entries().unwrap().clone());
    assert_eq!(nested_archive_paths(&a), vec!["b.jar"]);
}

#[test]
fn test_nested_mount_failure_is_skipped() {
    let mounts = MountTable::new();
    let pipeline = DeploymentPipeline::new();
    for (phase, processor) in standard_processors(Arc::new(mounts.clone())) {
        pipeline.register(phase, processor);
    }
    let content = VirtualFile::archive()
        .with_entry("good.jar", VirtualFile::archive())
        .with_entry("fake.jar", VirtualFile::file("plain bytes"));

    let mut unit = DeploymentUnit::new("app.ear", "app.ear", content);
    pipeline.deploy(&mut unit).unwrap();
    let nested: Vec<String> = unit
        .attachments
        .get(&NESTED_MOUNTS)
        .unwrap()
        .iter()
        .map(|m| m.path.clone())
        .collect();
    assert_eq!(nested, vec!["good.jar"]);
    assert_eq!(mounts.mounted_paths(), vec!["app.ear", "good.jar"]);

    pipeline.undeploy(&mut unit).unwrap();
    assert_eq!(mounts.active_mounts(), 0);
}

#[test]
fn test_attachment_keys_do_not_alias_across_types() {
    const AS_TEXT: AttachmentKey<String> = AttachmentKey::new("shared");
    const AS_NUMBER: AttachmentKey<u64> = AttachmentKey::new("shared");

    let mut unit = unit();
    unit.attachments.put(&AS_TEXT, "value".to_string());
    assert_eq!(unit.attachments.get(&AS_NUMBER), None);
    assert_eq!(unit.attachments.remove(&AS_NUMBER), None);
    assert_eq!(unit.attachments.get(&AS_TEXT).map(String::as_str), Some("value"));
}

#[test]
fn test_distinct_units_deploy_concurrently() {
    let mounts = MountTable::new();
    let pipeline = Arc::new(DeploymentPipeline::new());
    for (phase, processor) in standard_processors(Arc::new(mounts.clone())) {
        pipeline.register(phase, processor);
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let content = VirtualFile::archive().with_entry("lib.jar", VirtualFile::archive());
                let mut unit =
                    DeploymentUnit::new(format!("app{i}.war"), format!("app{i}.war"), content);
                pipeline.deploy(&mut unit).map(|_| unit)
            })
        })
        .collect();
    let units: Vec<DeploymentUnit> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(mounts.active_mounts(), 16);

    for mut unit in units {
        pipeline.undeploy(&mut unit).unwrap();
    }
    assert_eq!(mounts.active_mounts(), 0);
}
