//! Deployment descriptor parsing

use crate::attachment::AttachmentKey;
use crate::error::ProcessingError;
use crate::processor::Processor;
use crate::processors::root::DEPLOYMENT_ROOT;
use crate::unit::DeploymentUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DESCRIPTOR_PATH: &str = "META-INF/keel-deployment.json";

pub const DEPLOYMENT_DESCRIPTOR: AttachmentKey<DeploymentDescriptor> =
    AttachmentKey::new("deployment-descriptor");

/// Optional metadata shipped inside a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DeploymentDescriptor {
    pub display_name: Option<String>,
    /// Other deployments this one needs
    pub dependencies: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorParsingProcessor;

impl DescriptorParsingProcessor {
    pub const NAME: &'static str = "descriptor-parsing";
}

impl Processor for DescriptorParsingProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn deploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        let Some(root) = unit.attachments.get(&DEPLOYMENT_ROOT) else {
            return Ok(());
        };
        let Some(bytes) = root.lookup(DESCRIPTOR_PATH).and_then(|f| f.contents()) else {
            return Ok(());
        };
        let descriptor: DeploymentDescriptor = serde_json::from_slice(bytes)
            .map_err(|e| ProcessingError::new(format!("Malformed {}: {}", DESCRIPTOR_PATH, e)))?;
        unit.attachments.put(&DEPLOYMENT_DESCRIPTOR, descriptor);
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        unit.attachments.remove(&DEPLOYMENT_DESCRIPTOR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::VirtualFile;

    fn unit_with(descriptor: &str) -> DeploymentUnit {
        let mut unit = DeploymentUnit::new("app.war", "app.war", VirtualFile::directory());
        let root = VirtualFile::directory().with_entry(
            "META-INF",
            VirtualFile::directory()
                .with_entry("keel-deployment.json", VirtualFile::file(descriptor)),
        );
        unit.attachments.put(&DEPLOYMENT_ROOT, root);
        unit
    }

    #[test]
    fn test_descriptor_attached() {
        let mut unit = unit_with(r#"{"display-name": "App", "dependencies": ["db.jar"]}"#);
        DescriptorParsingProcessor.deploy(&mut unit).unwrap();
        let descriptor = unit.attachments.get(&DEPLOYMENT_DESCRIPTOR).unwrap();
        assert_eq!(descriptor.display_name.as_deref(), Some("App"));
        assert_eq!(descriptor.dependencies, vec!["db.jar".to_string()]);
    }

    #[test]
    fn test_malformed_descriptor_is_a_fault() {
        let mut unit = unit_with("{not json");
        let err = DescriptorParsingProcessor.deploy(&mut unit).unwrap_err();
        assert!(err.message.starts_with("Malformed META-INF/keel-deployment.json"));
        assert!(!unit.attachments.contains(&DEPLOYMENT_DESCRIPTOR));
    }

    #[test]
    fn test_missing_descriptor_is_fine() {
        let mut unit = DeploymentUnit::new("app.war", "app.war", VirtualFile::directory());
        unit.attachments.put(&DEPLOYMENT_ROOT, VirtualFile::directory());
        DescriptorParsingProcessor.deploy(&mut unit).unwrap();
        assert!(!unit.attachments.contains(&DEPLOYMENT_DESCRIPTOR));
    }
}
