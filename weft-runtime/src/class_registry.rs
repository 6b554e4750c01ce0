// Class registry: resolves script-side wrapper types and native class pointers
// to shared class descriptors. One registry per execution context; entries are
// never invalidated while the context lives.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use weft_ffi::UClassPtr;

use crate::error::{WeftError, WeftResult};
use crate::native::ObjectUtils;
use crate::services::ContextServices;
use crate::wrappers::{ManagedType, ObjectWrapper};

/// A native class as seen from script code.
#[derive(Debug)]
pub struct ClassDescriptor {
    name: String,
    class: UClassPtr,
}

impl ClassDescriptor {
    /// The native class name, without the wrapper prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native(&self) -> UClassPtr {
        self.class
    }
}

/// Descriptors are shared; identity is pointer identity of the `Arc`.
pub type ClassRef = Arc<ClassDescriptor>;

pub struct ClassRegistry {
    object: Arc<dyn ObjectUtils>,
    by_type: HashMap<TypeId, ClassRef>,
    by_class: HashMap<usize, ClassRef>,
}

/// `UObject` -> `Object`, `AActor` -> `Actor`. Only one character is removed.
fn strip_prefix(name: &str) -> &str {
    name.strip_prefix(['U', 'A']).unwrap_or(name)
}

impl ClassRegistry {
    pub fn new(object: Arc<dyn ObjectUtils>) -> Self {
        ClassRegistry {
            object,
            by_type: HashMap::new(),
            by_class: HashMap::new(),
        }
    }

    /// Resolve a wrapper type to its native class.
    ///
    /// `Ok(None)` when the native side does not know the class; misses are not
    /// cached, so a class registered later is still found.
    pub fn class_of_type(&mut self, ty: &ManagedType) -> WeftResult<Option<ClassRef>> {
        if !ty.is_wrapper {
            return Err(WeftError::InvalidConversion(format!(
                "{} does not wrap a native class",
                ty.name
            )));
        }
        if let Some(found) = self.by_type.get(&ty.id) {
            return Ok(Some(found.clone()));
        }
        let class = self.object.class_by_name(strip_prefix(ty.name));
        let Some(found) = self.class_of_ptr(class)? else {
            return Ok(None);
        };
        self.by_type.insert(ty.id, found.clone());
        Ok(Some(found))
    }

    pub fn class_of<T: ObjectWrapper>(&mut self) -> WeftResult<Option<ClassRef>> {
        self.class_of_type(&ManagedType::of::<T>())
    }

    /// Descriptor for a native class pointer. `Ok(None)` for null.
    pub fn class_of_ptr(&mut self, class: UClassPtr) -> WeftResult<Option<ClassRef>> {
        if class.is_null() {
            return Ok(None);
        }
        if let Some(found) = self.by_class.get(&class.addr()) {
            return Ok(Some(found.clone()));
        }
        let name = self.object.class_name(class)?;
        let descriptor = Arc::new(ClassDescriptor { name, class });
        self.by_class.insert(class.addr(), descriptor.clone());
        Ok(Some(descriptor))
    }

    /// True when `derived` is `base` or inherits from it. Always asks native code.
    pub fn is_child_of(&self, derived: &ClassDescriptor, base: &ClassDescriptor) -> bool {
        self.object.is_class_child_of(derived.class, base.class)
    }

    #[cfg(test)]
    pub(crate) fn cached_classes(&self) -> usize {
        self.by_class.len()
    }
}

/// A native class known to be `T`'s class or one of its subclasses.
///
/// The empty value stands for "no class" and passes to native code as null.
pub struct SubclassOf<T: ObjectWrapper> {
    class: Option<ClassRef>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ObjectWrapper> SubclassOf<T> {
    pub fn none() -> Self {
        SubclassOf {
            class: None,
            _marker: PhantomData,
        }
    }

    /// Wrap `class` after checking it derives from `T`'s native class.
    /// `InvalidConversion` when it does not, or when `T` has no native class.
    pub fn new(services: &ContextServices, class: Option<ClassRef>) -> WeftResult<Self> {
        if let Some(class) = &class {
            let Some(base) = services.class_of::<T>()? else {
                return Err(WeftError::InvalidConversion(format!(
                    "{} has no native class",
                    T::NATIVE_CLASS_NAME
                )));
            };
            if !services.is_child_of(class, &base)? {
                return Err(WeftError::InvalidConversion(format!(
                    "{} is not a subclass of {}",
                    class.name(),
                    base.name()
                )));
            }
        }
        Ok(SubclassOf {
            class,
            _marker: PhantomData,
        })
    }

    pub fn class(&self) -> Option<&ClassRef> {
        self.class.as_ref()
    }

    /// The class pointer to hand to native code; null when empty.
    pub fn native(&self) -> UClassPtr {
        self.class.as_ref().map_or(UClassPtr::null(), |c| c.native())
    }

    pub fn into_class(self) -> Option<ClassRef> {
        self.class
    }
}

impl<T: ObjectWrapper> Clone for SubclassOf<T> {
    fn clone(&self) -> Self {
        SubclassOf {
            class: self.class.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ObjectWrapper> fmt::Debug for SubclassOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubclassOf")
            .field(&self.class.as_ref().map(|c| c.name()))
            .finish()
    }
}
