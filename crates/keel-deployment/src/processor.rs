//! The processor contract

use crate::error::ProcessingError;
use crate::unit::DeploymentUnit;

/// One step of the phase pipeline
///
/// `deploy` may read attachments left by earlier phases, add its own, and
/// open handles through [`DeploymentUnit::register_handle`]. `undeploy` runs
/// in reverse order on teardown and should remove what `deploy` attached;
/// registered handles are closed by the lifecycle manager afterwards.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn deploy(&self, unit: &mut DeploymentUnit) -> Result<(), ProcessingError>;

    fn undeploy(&self, _unit: &mut DeploymentUnit) -> Result<(), ProcessingError> {
        Ok(())
    }
}
