//! Builders for compensating operations
//!
//! Every mutating handler returns the operation that undoes it. The shapes
//! are fixed: an add is undone by a remove at the same address, a remove by
//! an add carrying the snapshot, an attribute write by a write of the prior
//! value, and an in-place overwrite by `replace-resource`.

use keel_model::Resource;
use keel_types::{names, ModelValue, Operation, PathAddress};

/// Undo for a resource creation
pub fn undo_add(address: &PathAddress) -> Operation {
    Operation::remove(address.clone())
}

/// Undo for a removal: re-add with the removed resource's attributes
///
/// A removed subtree travels under `descendants`; the dispatcher installs it
/// in place of whatever children the add handler creates.
pub fn undo_remove(address: &PathAddress, removed: &Resource) -> serde_json::Result<Operation> {
    let mut add = Operation::add(address.clone()).with_params(removed.attributes().clone());
    if removed.is_implicit() {
        add = add.with_param(names::IMPLICIT, true);
    }
    if removed.has_children() {
        add = add.with_param(names::DESCENDANTS, keel_model::descendants_value(removed)?);
    }
    Ok(add)
}

/// Undo for an attribute write; an `Undefined` prior value removes the attribute
pub fn undo_write(address: &PathAddress, attribute: &str, prior: ModelValue) -> Operation {
    Operation::write_attribute(address.clone(), attribute, prior)
}

/// Undo for an overwrite of an existing resource's attributes
pub fn undo_replace(address: &PathAddress, prior: &Resource) -> Operation {
    Operation::new(names::REPLACE_RESOURCE, address.clone())
        .with_param(names::ATTRIBUTES, prior.attributes_value())
        .with_param(names::IMPLICIT, prior.is_implicit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::PathElement;
    use std::collections::BTreeMap;

    #[test]
    fn test_undo_remove_keeps_implicit_flag() {
        let address: PathAddress = "/host=master/interface=management".parse().unwrap();
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), ModelValue::from("management"));

        let explicit =
            undo_remove(&address, &Resource::with_attributes(attributes.clone())).unwrap();
        assert_eq!(explicit.name, names::ADD);
        assert_eq!(explicit.param_str("name"), Some("management"));
        assert!(explicit.param(names::IMPLICIT).is_none());
        assert!(explicit.param(names::DESCENDANTS).is_none());

        let implicit = undo_remove(&address, &Resource::implicit_default(attributes)).unwrap();
        assert_eq!(implicit.param(names::IMPLICIT), Some(&ModelValue::Bool(true)));
    }

    #[test]
    fn test_undo_remove_carries_descendants() {
        let address: PathAddress = "/host=master".parse().unwrap();
        let mut host = Resource::new();
        host.set_attribute("name", "master".into());
        let mut defaults = BTreeMap::new();
        defaults.insert("name".to_string(), ModelValue::from("management"));
        host.insert_child(
            &PathElement::new(names::INTERFACE, "management"),
            Resource::implicit_default(defaults),
        );

        let op = undo_remove(&address, &host).unwrap();
        let carried =
            keel_model::descendants_from_value(op.param(names::DESCENDANTS).unwrap()).unwrap();
        assert_eq!(carried, host.descendants());
    }

    #[test]
    fn test_undo_replace_carries_prior_state() {
        let address: PathAddress = "/interface=public".parse().unwrap();
        let mut prior = Resource::new();
        prior.set_attribute("name", "public".into());

        let op = undo_replace(&address, &prior);
        assert_eq!(op.name, names::REPLACE_RESOURCE);
        assert_eq!(
            op.param(names::ATTRIBUTES).and_then(|v| v.get("name")),
            Some(&ModelValue::from("public"))
        );
        assert_eq!(op.param(names::IMPLICIT), Some(&ModelValue::Bool(false)));
    }
}
