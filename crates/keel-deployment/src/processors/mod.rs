//! Built-in processors

pub mod descriptor;
pub mod nested;
pub mod root;

pub use descriptor::{
    DeploymentDescriptor, DescriptorParsingProcessor, DEPLOYMENT_DESCRIPTOR, DESCRIPTOR_PATH,
};
pub use nested::{NestedArchiveProcessor, NestedMount, NESTED_MOUNTS};
pub use root::{DeploymentRootMountProcessor, DEPLOYMENT_ROOT};

use crate::mount::ArchiveMounter;
use crate::phase::Phase;
use crate::processor::Processor;
use std::sync::Arc;

/// The built-in processors with their phases, in registration order
pub fn standard_processors(mounter: Arc<dyn ArchiveMounter>) -> Vec<(Phase, Arc<dyn Processor>)> {
    vec![
        (
            Phase::STRUCTURE,
            Arc::new(DeploymentRootMountProcessor::new(Arc::clone(&mounter))) as Arc<dyn Processor>,
        ),
        (
            Phase::STRUCTURE,
            Arc::new(NestedArchiveProcessor::new(mounter)) as Arc<dyn Processor>,
        ),
        (Phase::PARSE, Arc::new(DescriptorParsingProcessor) as Arc<dyn Processor>),
    ]
}
