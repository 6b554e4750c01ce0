// Script-side wrapper types for native objects.

use std::any::TypeId;

use std::sync::Arc;

use crate::class_registry::ClassRef;
use crate::error::WeftResult;
use crate::handle::NativeHandle;
use crate::services::ContextServices;

/// A script-side type that stands for a native class.
///
/// `NATIVE_CLASS_NAME` follows the native naming convention: one prefix
/// character (`U` for objects, `A` for actors) followed by the class name.
pub trait ObjectWrapper: Sized + 'static {
    const NATIVE_CLASS_NAME: &'static str;

    fn from_native(handle: NativeHandle) -> Self;

    fn native(&self) -> &NativeHandle;

    /// The native class this wrapper type stands for.
    fn static_class(services: &ContextServices) -> WeftResult<Option<ClassRef>> {
        services.class_of::<Self>()
    }

    /// True when this wrapper's class is `T`'s class or derives from it.
    /// Classes native code does not know are never related.
    fn is_a<T: ObjectWrapper>(&self, services: &ContextServices) -> WeftResult<bool> {
        let (Some(this), Some(base)) = (Self::static_class(services)?, T::static_class(services)?) else {
            return Ok(false);
        };
        if Arc::ptr_eq(&this, &base) {
            return Ok(true);
        }
        services.is_child_of(&this, &base)
    }
}

/// Runtime identity of a script-side type, as handed to the class registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ManagedType {
    pub id: TypeId,
    pub name: &'static str,
    pub is_wrapper: bool,
}

impl ManagedType {
    pub fn of<T: ObjectWrapper>() -> Self {
        ManagedType {
            id: TypeId::of::<T>(),
            name: T::NATIVE_CLASS_NAME,
            is_wrapper: true,
        }
    }

    /// Any other type. The class registry rejects these.
    pub fn opaque<T: 'static>() -> Self {
        let full = std::any::type_name::<T>();
        ManagedType {
            id: TypeId::of::<T>(),
            name: full.rsplit("::").next().unwrap_or(full),
            is_wrapper: false,
        }
    }
}

/// Declare a wrapper struct for a native class.
///
/// ```ignore
/// declare_wrapper! {
///     /// A placed actor.
///     pub struct AActor = "AActor";
/// }
/// ```
///
/// The struct holds one [`NativeHandle`], implements [`ObjectWrapper`] and can
/// be stored in a [`NativeArray`](crate::containers::NativeArray).
#[macro_export]
macro_rules! declare_wrapper {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $native:literal;) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Hash)]
        $vis struct $name {
            handle: $crate::handle::NativeHandle,
        }

        impl $crate::wrappers::ObjectWrapper for $name {
            const NATIVE_CLASS_NAME: &'static str = $native;

            fn from_native(handle: $crate::handle::NativeHandle) -> Self {
                $name { handle }
            }

            fn native(&self) -> &$crate::handle::NativeHandle {
                &self.handle
            }
        }

        impl $crate::containers::ArrayElement for $name {
            fn read(
                access: &$crate::containers::ArrayAccess<'_>,
                index: i32,
            ) -> $crate::error::WeftResult<Self> {
                Ok(<$name as $crate::wrappers::ObjectWrapper>::from_native(access.object_at(index)))
            }

            fn write(&self, access: &$crate::containers::ArrayAccess<'_>, index: i32) {
                access.utils().set_object(access.array(), index, self.handle.ptr());
            }

            fn find_in(&self, access: &$crate::containers::ArrayAccess<'_>) -> i32 {
                access.utils().find_object(access.array(), self.handle.ptr())
            }
        }
    };
}

declare_wrapper! {
    /// The root of the native object hierarchy.
    pub struct UObject = "UObject";
}

#[cfg(test)]
mod tests {
    use weft_ffi::UObjectPtr;

    use super::*;
    use crate::testing::FakeTables;

    declare_wrapper! {
        struct AThing = "AThing";
    }

    declare_wrapper! {
        struct UGhost = "UGhost";
    }

    #[test]
    fn wrapper_types_carry_native_class_name() {
        let ty = ManagedType::of::<AThing>();
        assert_eq!(ty.name, "AThing");
        assert!(ty.is_wrapper);
        assert_eq!(ty.id, TypeId::of::<AThing>());
    }

    #[test]
    fn opaque_types_use_last_path_segment() {
        let ty = ManagedType::opaque::<std::string::String>();
        assert_eq!(ty.name, "String");
        assert!(!ty.is_wrapper);
    }

    #[test]
    fn is_a_follows_native_inheritance() {
        let fakes = FakeTables::new();
        fakes.object.define_class("Object", 1, None);
        fakes.object.define_class("Thing", 5, Some(1));
        let services = ContextServices::new(2, fakes.tables());

        assert_eq!(AThing::static_class(&services).unwrap().unwrap().native().addr(), 5);
        let thing = AThing::from_native(NativeHandle::borrowed(UObjectPtr::from_addr(0x50)));
        let object = UObject::from_native(NativeHandle::borrowed(UObjectPtr::from_addr(0x60)));
        assert!(thing.is_a::<UObject>(&services).unwrap());
        assert!(thing.is_a::<AThing>(&services).unwrap());
        assert!(!object.is_a::<AThing>(&services).unwrap());
        assert!(!thing.is_a::<UGhost>(&services).unwrap());
        // Identical classes are answered from the cache.
        assert_eq!(fakes.object.name_lookups(), 3);
    }

    #[test]
    fn wrapper_exposes_its_handle() {
        let obj = UObject::from_native(NativeHandle::borrowed(UObjectPtr::from_addr(0x99)));
        assert_eq!(obj.native().ptr().addr(), 0x99);
    }
}
