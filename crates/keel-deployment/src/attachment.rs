//! Typed per-unit attachments
//!
//! Processors pass metadata to later phases by attaching it to the unit. A
//! key is the pair (value type, identity string), so reading with a key of a
//! different type never aliases a stored value even if the names collide.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Key for a value of type `T`
pub struct AttachmentKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> AttachmentKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttachmentKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttachmentKey<T> {}

impl<T> fmt::Debug for AttachmentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttachmentKey<{}>({})", std::any::type_name::<T>(), self.name)
    }
}

type Slot = (TypeId, &'static str);

/// Attachment store owned by one deployment unit
#[derive(Default)]
pub struct Attachments {
    values: HashMap<Slot, Box<dyn Any + Send + Sync>>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot<T: 'static>(key: &AttachmentKey<T>) -> Slot {
        (TypeId::of::<T>(), key.name)
    }

    /// Store a value, returning the one it replaced
    pub fn put<T: Send + Sync + 'static>(&mut self, key: &AttachmentKey<T>, value: T) -> Option<T> {
        self.values
            .insert(Self::slot(key), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: 'static>(&self, key: &AttachmentKey<T>) -> Option<&T> {
        self.values
            .get(&Self::slot(key))
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, key: &AttachmentKey<T>) -> Option<&mut T> {
        self.values
            .get_mut(&Self::slot(key))
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: 'static>(&mut self, key: &AttachmentKey<T>) -> Option<T> {
        self.values
            .remove(&Self::slot(key))
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn contains<T: 'static>(&self, key: &AttachmentKey<T>) -> bool {
        self.values.contains_key(&Self::slot(key))
    }

    /// Append to a list attachment, creating it if needed
    pub fn add_to_list<T: Send + Sync + 'static>(&mut self, key: &AttachmentKey<Vec<T>>, value: T) {
        match self.get_mut(key) {
            Some(list) => list.push(value),
            None => {
                self.put(key, vec![value]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attachments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachments")
            .field("names", &self.values.keys().map(|(_, name)| *name).collect::<Vec<_>>())
            .finish()
    }
}
