//! Extension lifecycle
//!
//! An extension contributes handlers and attribute definitions when it is
//! loaded and takes all of them away again when it is unloaded. Handlers are
//! plain values created in [`Extension::initialize`]; nothing outlives the
//! extension that registered it.

use crate::attributes::{AttributeAccess, AttributeDefinition};
use crate::error::RegistryError;
use crate::handler::{OperationFlags, OperationHandler};
use crate::registry::OperationRegistry;
use keel_types::PathAddress;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

type UnloadHook = Box<dyn FnOnce() + Send>;

/// A pluggable bundle of management behaviour
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn initialize(&self, ctx: &mut ExtensionContext<'_>) -> Result<(), RegistryError>;
}

/// Records everything an extension registers so that it can be undone
pub struct ExtensionContext<'a> {
    registry: &'a OperationRegistry,
    operations: Vec<(PathAddress, String)>,
    globals: Vec<String>,
    attributes: Vec<(PathAddress, String)>,
    hooks: Vec<UnloadHook>,
}

impl<'a> ExtensionContext<'a> {
    fn new(registry: &'a OperationRegistry) -> Self {
        Self {
            registry,
            operations: Vec::new(),
            globals: Vec::new(),
            attributes: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn register_operation(
        &mut self,
        pattern: PathAddress,
        operation: &str,
        handler: Arc<dyn OperationHandler>,
        flags: OperationFlags,
    ) -> Result<(), RegistryError> {
        self.registry
            .register(pattern.clone(), operation, handler, flags)?;
        self.operations.push((pattern, operation.to_string()));
        Ok(())
    }

    pub fn register_global(
        &mut self,
        operation: &str,
        handler: Arc<dyn OperationHandler>,
        flags: OperationFlags,
    ) -> Result<(), RegistryError> {
        self.registry.register_global(operation, handler, flags)?;
        self.globals.push(operation.to_string());
        Ok(())
    }

    pub fn register_attribute(
        &mut self,
        pattern: PathAddress,
        definition: AttributeDefinition,
        access: AttributeAccess,
    ) -> Result<(), RegistryError> {
        let name = definition.name.clone();
        self.registry
            .register_attribute(pattern.clone(), definition, access)?;
        self.attributes.push((pattern, name));
        Ok(())
    }

    /// Run `hook` when the extension is unloaded
    ///
    /// Used for registrations outside the operation registry, such as
    /// deployment processors.
    pub fn on_unload(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    fn finish(self) -> Registrations {
        Registrations {
            operations: self.operations,
            globals: self.globals,
            attributes: self.attributes,
            hooks: self.hooks,
        }
    }
}

#[derive(Default)]
struct Registrations {
    operations: Vec<(PathAddress, String)>,
    globals: Vec<String>,
    attributes: Vec<(PathAddress, String)>,
    hooks: Vec<UnloadHook>,
}

impl Registrations {
    fn revert(self, registry: &OperationRegistry) {
        for (pattern, operation) in self.operations.iter().rev() {
            registry.unregister(pattern, operation);
        }
        for operation in self.globals.iter().rev() {
            registry.unregister_global(operation);
        }
        for (pattern, attribute) in self.attributes.iter().rev() {
            registry.unregister_attribute(pattern, attribute);
        }
        for hook in self.hooks.into_iter().rev() {
            hook();
        }
    }
}

/// Loaded extensions, by name
pub struct ExtensionRegistry {
    registry: Arc<OperationRegistry>,
    loaded: Mutex<HashMap<String, Registrations>>,
}

impl ExtensionRegistry {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Initialize an extension; on failure nothing it registered remains
    pub fn load(&self, extension: &dyn Extension) -> Result<(), RegistryError> {
        let name = extension.name().to_string();
        let mut loaded = self.loaded.lock();
        if loaded.contains_key(&name) {
            return Err(RegistryError::DuplicateExtension(name));
        }

        let mut ctx = ExtensionContext::new(&self.registry);
        let result = extension.initialize(&mut ctx);
        let registrations = ctx.finish();
        match result {
            Ok(()) => {
                info!(
                    extension = %name,
                    operations = registrations.operations.len(),
                    "Extension loaded",
                );
                loaded.insert(name, registrations);
                Ok(())
            }
            Err(e) => {
                warn!(extension = %name, error = %e, "Extension failed to initialize");
                registrations.revert(&self.registry);
                Err(e)
            }
        }
    }

    /// Remove everything an extension registered
    pub fn unload(&self, name: &str) -> Result<(), RegistryError> {
        let registrations = self
            .loaded
            .lock()
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownExtension(name.to_string()))?;
        registrations.revert(&self.registry);
        info!(extension = %name, "Extension unloaded");
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains_key(name)
    }

    /// Names of loaded extensions, sorted
    pub fn loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{ResourceAddHandler, ResourceRemoveHandler};
    use keel_types::{names, ModelType};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Widgets {
        fail: bool,
        unloaded: Arc<AtomicBool>,
    }

    impl Extension for Widgets {
        fn name(&self) -> &str {
            "widgets"
        }

        fn initialize(&self, ctx: &mut ExtensionContext<'_>) -> Result<(), RegistryError> {
            let pattern: PathAddress = "/widget=*".parse().unwrap();
            ctx.register_operation(
                pattern.clone(),
                names::ADD,
                Arc::new(ResourceAddHandler::permissive()),
                OperationFlags::creates(),
            )?;
            ctx.register_attribute(
                pattern.clone(),
                AttributeDefinition::new("size", ModelType::Int),
                AttributeAccess::ReadWrite,
            )?;
            let unloaded = Arc::clone(&self.unloaded);
            ctx.on_unload(move || unloaded.store(true, Ordering::SeqCst));
            if self.fail {
                // Second binding of the same pair
                ctx.register_operation(
                    pattern,
                    names::ADD,
                    Arc::new(ResourceRemoveHandler),
                    OperationFlags::mutating(),
                )?;
            }
            Ok(())
        }
    }

    fn widget() -> PathAddress {
        "/widget=w".parse().unwrap()
    }

    #[test]
    fn test_load_and_unload() {
        let registry = Arc::new(OperationRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry));
        let unloaded = Arc::new(AtomicBool::new(false));
        let ext = Widgets { fail: false, unloaded: Arc::clone(&unloaded) };

        extensions.load(&ext).unwrap();
        assert!(registry.find(&widget(), names::ADD).is_some());
        assert!(registry.attribute(&widget(), "size").is_some());
        assert_eq!(
            extensions.load(&ext).unwrap_err(),
            RegistryError::DuplicateExtension("widgets".into())
        );

        extensions.unload("widgets").unwrap();
        assert!(registry.find(&widget(), names::ADD).is_none());
        assert!(registry.attribute(&widget(), "size").is_none());
        assert!(unloaded.load(Ordering::SeqCst));
        assert_eq!(
            extensions.unload("widgets").unwrap_err(),
            RegistryError::UnknownExtension("widgets".into())
        );
    }

    #[test]
    fn test_failed_initialize_is_reverted() {
        let registry = Arc::new(OperationRegistry::new());
        let extensions = ExtensionRegistry::new(Arc::clone(&registry));
        let ext = Widgets { fail: true, unloaded: Arc::new(AtomicBool::new(false)) };

        assert!(matches!(
            extensions.load(&ext),
            Err(RegistryError::DuplicateHandler { .. })
        ));
        assert!(registry.find(&widget(), names::ADD).is_none());
        assert!(!extensions.is_loaded("widgets"));
    }
}
