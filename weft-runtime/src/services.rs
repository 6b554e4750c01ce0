// Per-context services shared by the context and every script instance it
// creates: the bound tables, the release gate and the class registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weft_ffi::{ArrayPtr, ContextId, UClassPtr, UObjectPtr};

use crate::class_registry::{ClassDescriptor, ClassRef, ClassRegistry};
use crate::containers::{ArrayElement, NativeArray};
use crate::error::{WeftError, WeftResult};
use crate::handle::{NativeHandle, ReleaseHook};
use crate::logging::Logger;
use crate::native::FunctionTables;
use crate::wrappers::ObjectWrapper;

/// What script code can reach of its execution context.
///
/// Every call checks the release gate first: once the context has unloaded,
/// nothing here calls into native code and every operation reports
/// `AlreadyUnloaded`.
pub struct ContextServices {
    context: ContextId,
    tables: FunctionTables,
    hook: Arc<ReleaseHook>,
    classes: Mutex<ClassRegistry>,
    log: Logger,
}

impl ContextServices {
    pub fn new(context: ContextId, tables: FunctionTables) -> Arc<Self> {
        Arc::new(ContextServices {
            context,
            hook: ReleaseHook::new(tables.object.clone()),
            classes: Mutex::new(ClassRegistry::new(tables.object.clone())),
            log: Logger::new(tables.log.clone()),
            tables,
        })
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn tables(&self) -> &FunctionTables {
        &self.tables
    }

    /// The release callback shared by every owning handle of the context.
    pub fn release_hook(&self) -> &Arc<ReleaseHook> {
        &self.hook
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }

    pub fn is_open(&self) -> bool {
        self.hook.is_open()
    }

    fn ensure_open(&self) -> WeftResult<()> {
        if !self.hook.is_open() {
            return Err(WeftError::AlreadyUnloaded(self.context));
        }
        Ok(())
    }

    fn classes(&self) -> WeftResult<MutexGuard<'_, ClassRegistry>> {
        self.ensure_open()?;
        Ok(self.classes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Native class of a wrapper type. `Ok(None)` when native code knows no
    /// such class.
    pub fn class_of<T: ObjectWrapper>(&self) -> WeftResult<Option<ClassRef>> {
        self.classes()?.class_of::<T>()
    }

    pub fn class_of_ptr(&self, class: UClassPtr) -> WeftResult<Option<ClassRef>> {
        self.classes()?.class_of_ptr(class)
    }

    pub fn is_child_of(&self, derived: &ClassDescriptor, base: &ClassDescriptor) -> WeftResult<bool> {
        Ok(self.classes()?.is_child_of(derived, base))
    }

    /// Take over a reference the native side handed out. Released through
    /// this context until it unloads.
    pub fn adopt_object(&self, ptr: UObjectPtr) -> WeftResult<NativeHandle> {
        self.ensure_open()?;
        Ok(NativeHandle::new(ptr, true, Some(self.hook.clone())))
    }

    /// Take ownership of a native array.
    pub fn adopt_array<T: ArrayElement>(&self, array: ArrayPtr) -> WeftResult<NativeArray<T>> {
        self.ensure_open()?;
        Ok(NativeArray::owned(array, self.tables.array.clone(), Some(self.hook.clone())))
    }

    /// View a native-owned array without taking ownership.
    pub fn view_array<T: ArrayElement>(&self, array: ArrayPtr) -> WeftResult<NativeArray<T>> {
        self.ensure_open()?;
        Ok(NativeArray::borrowed(array, self.tables.array.clone(), Some(self.hook.clone())))
    }

    /// Close the release gate. Handles and arrays created here stop reaching
    /// native code.
    pub(crate) fn revoke(&self) {
        self.hook.revoke();
    }

    #[cfg(test)]
    pub(crate) fn cached_classes(&self) -> usize {
        self.classes.lock().unwrap_or_else(PoisonError::into_inner).cached_classes()
    }
}

impl std::fmt::Debug for ContextServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextServices")
            .field("context", &self.context)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare_wrapper;
    use crate::testing::FakeTables;
    use crate::wrappers::UObject;

    declare_wrapper! {
        struct AActor = "AActor";
    }

    fn services() -> (FakeTables, Arc<ContextServices>) {
        let fakes = FakeTables::new();
        fakes.object.define_class("Object", 1, None);
        fakes.object.define_class("Actor", 2, Some(1));
        let services = ContextServices::new(4, fakes.tables());
        (fakes, services)
    }

    #[test]
    fn class_lookups_share_one_registry() {
        let (fakes, services) = services();
        let object = services.class_of::<UObject>().unwrap().unwrap();
        let actor = services.class_of::<AActor>().unwrap().unwrap();
        assert!(services.is_child_of(&actor, &object).unwrap());
        assert!(Arc::ptr_eq(&actor, &services.class_of::<AActor>().unwrap().unwrap()));
        assert_eq!(fakes.object.name_lookups(), 2);
        assert_eq!(services.cached_classes(), 2);
    }

    #[test]
    fn viewed_arrays_stay_owned_by_native_code() {
        let (fakes, services) = services();
        let raw = fakes.array.array_of_ints(&[8, 9]);
        let view = services.view_array::<i32>(raw).unwrap();
        assert_eq!(view.count(), 2);
        drop(view);
        assert!(fakes.array.destroyed().is_empty());

        let adopted = services.adopt_array::<i32>(raw).unwrap();
        drop(adopted);
        assert_eq!(fakes.array.destroyed(), vec![raw.addr()]);
    }

    #[test]
    fn revoked_services_stay_out_of_native_code() {
        let (fakes, services) = services();
        let handle = services.adopt_object(UObjectPtr::from_addr(0x30)).unwrap();
        services.revoke();

        assert!(matches!(services.class_of::<AActor>(), Err(WeftError::AlreadyUnloaded(4))));
        assert!(matches!(
            services.adopt_array::<i32>(fakes.array.new_array()),
            Err(WeftError::AlreadyUnloaded(4))
        ));
        assert!(services.adopt_object(UObjectPtr::from_addr(0x31)).is_err());
        drop(handle);
        assert_eq!(fakes.object.name_lookups(), 0);
        assert!(fakes.object.released().is_empty());
    }
}
