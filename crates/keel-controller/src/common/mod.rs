//! Handlers shared by every process type: interfaces and hosts

pub mod host;
pub mod interface;

pub use host::{HostAddHandler, HostRemoveHandler, LocalHostState};
pub use interface::{InterfaceAddHandler, InterfaceCriteria, InterfaceCriterion};

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::error::RegistryError;
use crate::extension::{Extension, ExtensionContext};
use crate::handler::OperationFlags;
use crate::handlers::ResourceRemoveHandler;
use keel_types::{names, ModelType, PathAddress, PathElement};
use std::sync::Arc;

/// Registers the interface and host resources
#[derive(Debug, Clone, Default)]
pub struct CoreManagementExtension {
    host_state: Arc<LocalHostState>,
}

impl CoreManagementExtension {
    pub const NAME: &'static str = "core-management";

    pub fn new(host_state: Arc<LocalHostState>) -> Self {
        Self { host_state }
    }

    pub fn host_state(&self) -> &Arc<LocalHostState> {
        &self.host_state
    }
}

impl Extension for CoreManagementExtension {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, ctx: &mut ExtensionContext<'_>) -> Result<(), RegistryError> {
        let interface = PathAddress::new(vec![PathElement::wildcard(names::INTERFACE)]);
        let host = PathAddress::new(vec![PathElement::wildcard(names::HOST)]);
        let host_interface = host.append(PathElement::wildcard(names::INTERFACE));

        ctx.register_operation(
            interface.clone(),
            names::ADD,
            Arc::new(InterfaceAddHandler::named()),
            OperationFlags::creates(),
        )?;
        ctx.register_operation(
            host_interface.clone(),
            names::ADD,
            Arc::new(InterfaceAddHandler::specified()),
            OperationFlags::creates(),
        )?;
        for pattern in [&interface, &host_interface] {
            ctx.register_operation(
                pattern.clone(),
                names::REMOVE,
                Arc::new(ResourceRemoveHandler),
                OperationFlags::mutating(),
            )?;
            ctx.register_attribute(
                pattern.clone(),
                AttributeDefinition::new(names::NAME, ModelType::String),
                AttributeAccess::ReadOnly,
            )?;
            ctx.register_attribute(
                pattern.clone(),
                AttributeDefinition::new(names::CRITERIA, ModelType::Object),
                AttributeAccess::ReadWrite,
            )?;
        }

        let add_host = Arc::new(HostAddHandler::new(Arc::clone(&self.host_state)));
        ctx.register_operation(
            host.clone(),
            names::ADD,
            add_host.clone(),
            OperationFlags::creates(),
        )?;
        ctx.register_operation(host.clone(), names::ADD_HOST, add_host, OperationFlags::creates())?;
        ctx.register_operation(
            host.clone(),
            names::REMOVE,
            Arc::new(HostRemoveHandler::new(Arc::clone(&self.host_state))),
            OperationFlags::mutating(),
        )?;
        ctx.register_attribute(
            host.clone(),
            AttributeDefinition::new(names::NAME, ModelType::String),
            AttributeAccess::ReadOnly,
        )?;
        ctx.register_attribute(
            host,
            AttributeDefinition::new(host::MANAGEMENT_INTERFACE, ModelType::String)
                .with_default(host::DEFAULT_MANAGEMENT_INTERFACE),
            AttributeAccess::ReadWrite,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::extension::ExtensionRegistry;
    use crate::registry::OperationRegistry;
    use keel_types::{ModelValue, Operation};

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    fn setup() -> (Dispatcher, Arc<LocalHostState>) {
        let registry = Arc::new(OperationRegistry::new());
        let state = Arc::new(LocalHostState::new());
        ExtensionRegistry::new(Arc::clone(&registry))
            .load(&CoreManagementExtension::new(Arc::clone(&state)))
            .unwrap();
        let dispatcher = Dispatcher::builder().with_registry(registry).build().unwrap();
        (dispatcher, state)
    }

    #[test]
    fn test_interface_add_stores_name_and_criteria() {
        let (d, _) = setup();
        let criteria = ModelValue::object().with(interface::ANY_IPV4_ADDRESS, true);
        let outcome = d.dispatch(
            &Operation::add(addr("/interface=public"))
                .with_param(names::CRITERIA, criteria.clone()),
        );
        assert!(outcome.is_success());
        assert_eq!(
            outcome.compensating_operation(),
            Some(&Operation::remove(addr("/interface=public")))
        );

        let resource = d.resource(&addr("/interface=public")).unwrap();
        assert_eq!(resource.attribute(names::NAME), Some(&ModelValue::from("public")));
        assert_eq!(resource.attribute(names::CRITERIA), Some(&criteria));
    }

    #[test]
    fn test_named_interface_tolerates_missing_criteria() {
        let (d, _) = setup();
        assert!(d.dispatch(&Operation::add(addr("/interface=public"))).is_success());
    }

    #[test]
    fn test_host_add_creates_default_management_interface() {
        let (d, state) = setup();
        let outcome = d.dispatch(
            &Operation::new(names::ADD_HOST, addr("/host=master"))
                .with_param(names::NAME, "master"),
        );
        assert!(outcome.is_success());
        assert_eq!(state.name().as_deref(), Some("master"));

        let iface = d.resource(&addr("/host=master/interface=management")).unwrap();
        assert!(iface.is_implicit());
        assert_eq!(
            d.resource(&addr("/host=master"))
                .unwrap()
                .attribute(host::MANAGEMENT_INTERFACE),
            Some(&ModelValue::from("management"))
        );

        // Undo removes the host together with its default interface
        let undo = outcome.into_compensating_operation().unwrap();
        assert!(d.dispatch(&undo).is_success());
        assert!(d.resource(&addr("/host=master")).is_none());
        assert_eq!(state.name(), None);
    }

    #[test]
    fn test_host_remove_compensation_restores_written_defaults() {
        let (d, state) = setup();
        let master = addr("/host=master");
        d.dispatch(&Operation::add(master.clone()).with_param(names::NAME, "master"));
        assert!(d
            .dispatch(&Operation::write_attribute(
                master.clone(),
                host::MANAGEMENT_INTERFACE,
                "admin"
            ))
            .is_success());
        assert!(d
            .dispatch(&Operation::write_attribute(
                addr("/host=master/interface=management"),
                names::CRITERIA,
                ModelValue::object().with(interface::UP, true),
            ))
            .is_success());
        let before = d.model_snapshot();

        let removed = d.dispatch(&Operation::remove(master));
        assert!(removed.is_success());
        assert_eq!(state.name(), None);

        let undo = removed.into_compensating_operation().unwrap();
        assert!(d.dispatch(&undo).is_success());
        assert_eq!(d.model_snapshot(), before);
        assert!(d.resource(&addr("/host=master/interface=admin")).is_none());
        assert_eq!(state.name().as_deref(), Some("master"));
    }

    #[test]
    fn test_host_add_requires_name() {
        let (d, state) = setup();
        let outcome = d.dispatch(&Operation::new(names::ADD_HOST, addr("/host=master")));
        assert_eq!(
            outcome.failure_message(),
            Some("Validation failed for /host=master: 'name' is required")
        );
        assert_eq!(state.name(), None);
    }

    #[test]
    fn test_specified_interface_overwrites_only_defaults() {
        let (d, _) = setup();
        d.dispatch(&Operation::add(addr("/host=master")).with_param(names::NAME, "master"));
        let before = d.model_snapshot();

        let address = addr("/host=master/interface=management");
        let specified = Operation::add(address.clone()).with_param(
            names::CRITERIA,
            ModelValue::object().with(interface::INET_ADDRESS, "192.168.0.10"),
        );
        let outcome = d.dispatch(&specified);
        assert!(outcome.is_success());
        assert!(!d.resource(&address).unwrap().is_implicit());

        // Now explicit, a second specified add is a duplicate
        let again = d.dispatch(&specified);
        assert_eq!(
            again.failure_message(),
            Some("Duplicate resource: /host=master/interface=management")
        );

        let undo = outcome.into_compensating_operation().unwrap();
        assert_eq!(undo.name, names::REPLACE_RESOURCE);
        assert!(d.dispatch(&undo).is_success());
        assert_eq!(d.model_snapshot(), before);
    }

    #[test]
    fn test_specified_interface_requires_criteria() {
        let (d, _) = setup();
        d.dispatch(&Operation::add(addr("/host=master")).with_param(names::NAME, "master"));
        let outcome = d.dispatch(&Operation::add(addr("/host=master/interface=public")));
        assert_eq!(
            outcome.failure_message(),
            Some("Validation failed for /host=master/interface=public: No interface criteria was provided")
        );
    }

    #[test]
    fn test_host_with_explicit_interface_cannot_be_removed() {
        let (d, _) = setup();
        d.dispatch(&Operation::add(addr("/host=master")).with_param(names::NAME, "master"));
        d.dispatch(
            &Operation::add(addr("/host=master/interface=public"))
                .with_param(names::CRITERIA, ModelValue::object().with(interface::UP, true)),
        );
        let outcome = d.dispatch(&Operation::remove(addr("/host=master")));
        assert!(outcome
            .failure_message()
            .unwrap()
            .contains("cannot remove a resource with children (interface=public)"));
    }
}
