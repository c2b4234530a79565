//! Reconstruction and rendering of the tree
//!
//! The concrete configuration dialect lives outside the core. What the core
//! guarantees is that any subtree can be turned back into the exact operation
//! sequence that rebuilds it, and that the tree renders deterministically.

use crate::error::Result;
use crate::resource::Resource;
use crate::tree::ResourceTree;
use keel_types::{names, ModelValue, Operation, PathAddress};

/// Operations that rebuild the subtree at `address`, parents before children.
pub fn rebuild_operations(tree: &ResourceTree, address: &PathAddress) -> Result<Vec<Operation>> {
    let resource = tree.resolve(address)?;
    let ops = subtree_operations(address, resource);
    tracing::debug!(address = %address, operations = ops.len(), "Described subtree");
    Ok(ops)
}

/// Rebuild operations for a detached subtree rooted at `address`.
///
/// Every resource becomes an `add` carrying its attributes; implicit defaults
/// additionally carry `implicit=true`. Attributes on the model root become
/// `write-attribute` operations since the root itself is never added.
pub fn subtree_operations(address: &PathAddress, resource: &Resource) -> Vec<Operation> {
    let mut ops = Vec::new();
    push_operations(address, resource, &mut ops);
    ops
}

fn push_operations(address: &PathAddress, resource: &Resource, ops: &mut Vec<Operation>) {
    if address.is_root() {
        for (name, value) in resource.attributes() {
            ops.push(Operation::write_attribute(
                PathAddress::root(),
                name.clone(),
                value.clone(),
            ));
        }
    } else {
        let mut add = Operation::add(address.clone()).with_params(resource.attributes().clone());
        if resource.is_implicit() {
            add = add.with_param(names::IMPLICIT, true);
        }
        ops.push(add);
    }
    for (element, child) in resource.children() {
        push_operations(&address.append(element), child, ops);
    }
}

/// Deterministic pretty JSON rendering of the whole tree
pub fn render(tree: &ResourceTree) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tree)
}

/// Rebuild operations as a list value, the shape returned by `describe`
pub fn operations_value(ops: &[Operation]) -> serde_json::Result<ModelValue> {
    let json = serde_json::to_value(ops)?;
    serde_json::from_value(json)
}

/// Encode the children of `resource` as a value an operation can carry
pub fn descendants_value(resource: &Resource) -> serde_json::Result<ModelValue> {
    let json = serde_json::to_value(resource.descendants())?;
    serde_json::from_value(json)
}

/// Decode a value produced by [`descendants_value`]
pub fn descendants_from_value(value: &ModelValue) -> serde_json::Result<Resource> {
    let json = serde_json::to_value(value)?;
    serde_json::from_value(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    fn sample_tree() -> ResourceTree {
        let mut tree = ResourceTree::new();
        let mut host = Resource::new();
        host.set_attribute("name", "master".into());
        tree.create(&addr("/host=master"), host).unwrap();

        let mut defaults = BTreeMap::new();
        defaults.insert("inet-address".to_string(), ModelValue::from("127.0.0.1"));
        tree.create(
            &addr("/host=master/interface=management"),
            Resource::implicit_default(defaults),
        )
        .unwrap();

        let mut iface = Resource::new();
        iface.set_attribute("name", "public".into());
        tree.create(&addr("/interface=public"), iface).unwrap();
        tree
    }

    #[test]
    fn test_rebuild_order_and_kinds() {
        let tree = sample_tree();
        let ops = rebuild_operations(&tree, &PathAddress::root()).unwrap();
        let summary: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
        assert_eq!(
            summary,
            vec![
                "/host=master:add",
                "/host=master/interface=management:add",
                "/interface=public:add",
            ]
        );
        assert_eq!(ops[0].param_str("name"), Some("master"));
        assert_eq!(ops[1].param(names::IMPLICIT), Some(&ModelValue::Bool(true)));
    }

    #[test]
    fn test_rebuild_subtree_only() {
        let tree = sample_tree();
        let ops = rebuild_operations(&tree, &addr("/interface=public")).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(rebuild_operations(&tree, &addr("/interface=missing")).is_err());
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render(&sample_tree()).unwrap();
        let b = render(&sample_tree()).unwrap();
        assert_eq!(a, b);
        let back: ResourceTree = serde_json::from_str(&a).unwrap();
        assert_eq!(back, sample_tree());
    }

    #[test]
    fn test_descendants_value_keeps_implicit_children() {
        let tree = sample_tree();
        let host = tree.resolve(&addr("/host=master")).unwrap();
        let value = descendants_value(host).unwrap();
        assert!(value.get("attributes").is_some());

        let decoded = descendants_from_value(&value).unwrap();
        assert!(decoded.attributes().is_empty());
        assert_eq!(decoded.child_names("interface"), vec!["management".to_string()]);

        let mut rebuilt = host.shallow_copy();
        rebuilt.adopt_children(decoded);
        assert_eq!(&rebuilt, host);
        assert!(descendants_from_value(&ModelValue::from(3)).is_err());
    }

    #[test]
    fn test_operations_value_shape() {
        let ops = vec![Operation::add(addr("/interface=public")).with_param("name", "public")];
        let value = operations_value(&ops).unwrap();
        let first = &value.as_list().unwrap()[0];
        assert_eq!(first.get("name"), Some(&ModelValue::from("add")));
    }
}
