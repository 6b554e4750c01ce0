// Execution context: an isolated, unloadable registry of loaded assemblies,
// resolved script classes, live script instances and bound function tables.
//
// Lifecycle: Uninitialized -> Initialized (tables bound) -> Active (assemblies
// loaded or instances live) -> Unloading -> Unloaded. Unloaded is terminal.

use std::collections::HashMap;
use std::ffi::c_void;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use weft_ffi::{ContextId, InstanceId, ScriptComponentProxy, ScriptObjectInstanceInfo, UObjectPtr};

use crate::assembly::{
    AssemblyCatalog, ConstructArgs, Constructed, ENGINE_ASSEMBLY, ScriptAssembly,
    ScriptClassDescriptor,
};
use crate::error::{WeftError, WeftResult};
use crate::ffi_guard::panic_message;
use crate::handle::ReleaseHook;
use crate::logging::{LogWriter, Logger};
use crate::native::FunctionTables;
use crate::script::InstanceBox;
use crate::services::ContextServices;
use crate::wlog;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Initialized,
    Active,
    Unloading,
    Unloaded,
}

/// Monotonic instance ids, starting at 1. Safe to call from any thread.
#[derive(Debug)]
pub struct InstanceIdGenerator(AtomicI64);

impl InstanceIdGenerator {
    pub fn new() -> Self {
        InstanceIdGenerator(AtomicI64::new(1))
    }

    pub fn next(&self) -> InstanceId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for InstanceIdGenerator {
    fn default() -> Self {
        InstanceIdGenerator::new()
    }
}

struct InstanceRecord {
    class_name: String,
    instance: InstanceBox,
}

/// A script instance unregistered from its context but not dropped yet.
///
/// Lets a caller holding a lock finish the removal after releasing it: the
/// instance's destructor may call back into native code.
pub struct RemovedInstance {
    id: InstanceId,
    record: InstanceRecord,
}

impl RemovedInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.record.class_name
    }

    /// Drop the instance. A panicking destructor is reported as `ScriptPanicked`.
    pub fn dispose(self) -> WeftResult<()> {
        let RemovedInstance { id, record } = self;
        record
            .instance
            .dispose()
            .map_err(|msg| WeftError::ScriptPanicked(format!("{} #{id}: {msg}", record.class_name)))
    }
}

/// State that only exists once the native side has bound its tables.
struct Bound {
    services: Arc<ContextServices>,
    diagnostics: LogWriter,
}

pub struct ExecutionContext {
    id: ContextId,
    application_base: PathBuf,
    state: ContextState,
    catalog: Arc<AssemblyCatalog>,
    host_log: Logger,
    bound: Option<Bound>,
    loaded: Vec<ScriptAssembly>,
    class_cache: HashMap<String, ScriptClassDescriptor>,
    ids: InstanceIdGenerator,
    objects: HashMap<InstanceId, InstanceRecord>,
    components: HashMap<InstanceId, InstanceRecord>,
    native_functions: HashMap<String, Vec<usize>>,
}

impl ExecutionContext {
    /// `host_log` is used until the context's own log table is bound.
    pub fn new(
        id: ContextId,
        application_base: PathBuf,
        catalog: Arc<AssemblyCatalog>,
        host_log: Logger,
    ) -> Self {
        ExecutionContext {
            id,
            application_base,
            state: ContextState::Uninitialized,
            catalog,
            host_log,
            bound: None,
            loaded: Vec::new(),
            class_cache: HashMap::new(),
            ids: InstanceIdGenerator::new(),
            objects: HashMap::new(),
            components: HashMap::new(),
            native_functions: HashMap::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn application_base(&self) -> &Path {
        &self.application_base
    }

    /// The bound log table, or the host's log before binding.
    pub fn logger(&self) -> &Logger {
        match &self.bound {
            Some(bound) => bound.services.logger(),
            None => &self.host_log,
        }
    }

    fn ensure_live(&self) -> WeftResult<()> {
        match self.state {
            ContextState::Unloading | ContextState::Unloaded => Err(WeftError::AlreadyUnloaded(self.id)),
            _ => Ok(()),
        }
    }

    fn bound(&self) -> WeftResult<&Bound> {
        self.bound.as_ref().ok_or(WeftError::TablesNotBound(self.id))
    }

    fn bound_mut(&mut self) -> WeftResult<&mut Bound> {
        self.bound.as_mut().ok_or(WeftError::TablesNotBound(self.id))
    }

    fn activate(&mut self) {
        if self.state == ContextState::Initialized {
            self.state = ContextState::Active;
        }
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind the native utility tables. Exactly once, before anything else.
    pub fn bind_function_tables(&mut self, tables: FunctionTables) -> WeftResult<()> {
        self.ensure_live()?;
        if self.bound.is_some() {
            return Err(WeftError::TablesAlreadyBound(self.id));
        }
        let services = ContextServices::new(self.id, tables);
        self.bound = Some(Bound {
            diagnostics: services.logger().writer(),
            services,
        });
        self.state = ContextState::Initialized;
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn function_tables(&self) -> WeftResult<&FunctionTables> {
        Ok(self.bound()?.services.tables())
    }

    /// Class registry, handle adoption and array access. Every script
    /// instance created here holds the same services.
    pub fn services(&self) -> WeftResult<&Arc<ContextServices>> {
        Ok(&self.bound()?.services)
    }

    /// The release callback shared by every owning handle of this context.
    pub fn release_hook(&self) -> WeftResult<&Arc<ReleaseHook>> {
        Ok(self.bound()?.services.release_hook())
    }

    /// Diagnostic text stream, line-buffered into the `Display` log level.
    pub fn diagnostics(&mut self) -> WeftResult<&mut LogWriter> {
        Ok(&mut self.bound_mut()?.diagnostics)
    }

    // -----------------------------------------------------------------------
    // Native function pointers
    // -----------------------------------------------------------------------

    /// Store the native entry points generated wrapper code calls for one class.
    /// Replaces any previous set.
    pub fn set_native_function_pointers(&mut self, class_name: &str, pointers: Vec<*const c_void>) -> WeftResult<()> {
        self.ensure_live()?;
        let addrs = pointers.into_iter().map(|p| p as usize).collect();
        self.native_functions.insert(class_name.to_string(), addrs);
        Ok(())
    }

    pub fn native_function_pointers(&self, class_name: &str) -> Option<Vec<*const c_void>> {
        self.native_functions
            .get(class_name)
            .map(|addrs| addrs.iter().map(|&a| a as *const c_void).collect())
    }

    // -----------------------------------------------------------------------
    // Assemblies
    // -----------------------------------------------------------------------

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|a| a.name() == name)
    }

    pub fn loaded_assemblies(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(ScriptAssembly::name)
    }

    /// Load an assembly from the catalog. Loading twice is a no-op. An assembly
    /// with component classes pulls in the engine assembly first.
    pub fn load_assembly(&mut self, name: &str) -> WeftResult<()> {
        self.ensure_live()?;
        self.bound()?;
        if self.is_loaded(name) {
            return Ok(());
        }
        let assembly = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| WeftError::AssemblyNotFound(name.to_string()))?;
        if assembly.has_components() && name != ENGINE_ASSEMBLY {
            self.load_assembly(ENGINE_ASSEMBLY)?;
        }
        let classes = assembly.classes().len();
        self.loaded.push(assembly);
        self.activate();
        let id = self.id;
        let out = self.diagnostics()?;
        let _ = writeln!(out, "[Weft] context {id}: loaded {name} ({classes} classes)");
        Ok(())
    }

    pub fn load_engine_assembly(&mut self) -> WeftResult<()> {
        self.load_assembly(ENGINE_ASSEMBLY)
    }

    /// Find a script class by full name in the loaded assemblies. Cached after
    /// the first successful lookup.
    pub fn resolve_class(&mut self, class_name: &str) -> WeftResult<ScriptClassDescriptor> {
        if let Some(found) = self.class_cache.get(class_name) {
            return Ok(found.clone());
        }
        let found = self
            .loaded
            .iter()
            .flat_map(|a| a.classes())
            .find(|c| c.name() == class_name)
            .cloned()
            .ok_or_else(|| WeftError::ClassNotFound(class_name.to_string()))?;
        self.class_cache.insert(class_name.to_string(), found.clone());
        Ok(found)
    }

    /// Component classes of every loaded, non-dynamic assembly. Empty until the
    /// engine assembly is loaded.
    pub fn script_component_types(&self) -> Vec<String> {
        if !self.is_loaded(ENGINE_ASSEMBLY) {
            return Vec::new();
        }
        self.loaded
            .iter()
            .filter(|a| !a.is_dynamic())
            .flat_map(|a| a.classes())
            .filter(|c| c.is_component())
            .map(|c| c.name().to_string())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Instances
    // -----------------------------------------------------------------------

    pub fn generate_instance_id(&self) -> InstanceId {
        self.ids.next()
    }

    fn construct(&mut self, class_name: &str, native: UObjectPtr) -> WeftResult<(ScriptClassDescriptor, Constructed)> {
        self.ensure_live()?;
        let services = self.bound()?.services.clone();
        let class = self.resolve_class(class_name)?;
        let args = ConstructArgs {
            instance_id: self.generate_instance_id(),
            native,
            services,
        };
        let failed = |reason: String| WeftError::ConstructionFailed {
            class: class_name.to_string(),
            reason,
        };
        match catch_unwind(AssertUnwindSafe(|| class.construct(args))) {
            Ok(Ok(built)) => Ok((class, built)),
            Ok(Err(err)) => Err(failed(err.to_string())),
            Err(payload) => Err(failed(panic_message(&payload))),
        }
    }

    pub fn create_script_object(&mut self, class_name: &str, native_object: UObjectPtr) -> WeftResult<ScriptObjectInstanceInfo> {
        self.ensure_live()?;
        self.bound()?;
        if self.resolve_class(class_name)?.is_component() {
            return Err(WeftError::NotAScriptObject(class_name.to_string()));
        }
        match self.construct(class_name, native_object)? {
            (class, Constructed::Object { instance, info }) => {
                let record = InstanceRecord {
                    class_name: class.name().to_string(),
                    instance,
                };
                self.objects.insert(info.instance_id, record);
                self.activate();
                Ok(info)
            }
            (_, Constructed::Component { .. }) => Err(WeftError::NotAScriptObject(class_name.to_string())),
        }
    }

    pub fn create_script_component(
        &mut self,
        class_name: &str,
        native_component: UObjectPtr,
    ) -> WeftResult<ScriptComponentProxy> {
        self.ensure_live()?;
        self.bound()?;
        if !self.resolve_class(class_name)?.is_component() {
            return Err(WeftError::NotAScriptComponent(class_name.to_string()));
        }
        match self.construct(class_name, native_component)? {
            (class, Constructed::Component { instance, proxy }) => {
                let record = InstanceRecord {
                    class_name: class.name().to_string(),
                    instance,
                };
                self.components.insert(proxy.instance_id, record);
                self.activate();
                Ok(proxy)
            }
            (_, Constructed::Object { .. }) => Err(WeftError::NotAScriptComponent(class_name.to_string())),
        }
    }

    /// Unregister a script object without dropping it. The id is dead
    /// afterwards.
    pub fn remove_script_object(&mut self, instance_id: InstanceId) -> WeftResult<RemovedInstance> {
        self.ensure_live()?;
        let record = self
            .objects
            .remove(&instance_id)
            .ok_or(WeftError::InstanceNotFound(instance_id))?;
        Ok(RemovedInstance { id: instance_id, record })
    }

    pub fn remove_script_component(&mut self, instance_id: InstanceId) -> WeftResult<RemovedInstance> {
        self.ensure_live()?;
        let record = self
            .components
            .remove(&instance_id)
            .ok_or(WeftError::InstanceNotFound(instance_id))?;
        Ok(RemovedInstance { id: instance_id, record })
    }

    /// Unregister and drop a script object.
    pub fn destroy_script_object(&mut self, instance_id: InstanceId) -> WeftResult<()> {
        self.remove_script_object(instance_id)?.dispose()
    }

    pub fn destroy_script_component(&mut self, instance_id: InstanceId) -> WeftResult<()> {
        self.remove_script_component(instance_id)?.dispose()
    }

    pub fn script_object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn script_component_count(&self) -> usize {
        self.components.len()
    }

    // -----------------------------------------------------------------------
    // Unload
    // -----------------------------------------------------------------------

    /// Dispose every live instance, drop caches and close the release hook.
    ///
    /// Runs to completion even when disposals fail; those are reported
    /// together as `UnloadFailed`. A second call reports `AlreadyUnloaded`.
    pub fn unload(&mut self) -> WeftResult<()> {
        self.ensure_live()?;
        self.state = ContextState::Unloading;

        let mut records: Vec<_> = self.objects.drain().chain(self.components.drain()).collect();
        records.sort_by_key(|(id, _)| *id);
        let failures: Vec<String> = records
            .into_iter()
            .filter_map(|(id, record)| RemovedInstance { id, record }.dispose().err())
            .map(|err| err.to_string())
            .collect();

        self.class_cache.clear();
        self.loaded.clear();
        self.native_functions.clear();
        if let Some(bound) = self.bound.take() {
            bound.services.revoke();
        }
        self.state = ContextState::Unloaded;
        wlog!(self.host_log, crate::LogLevel::Verbose, "[Weft] context {} unloaded", self.id);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WeftError::UnloadFailed { id: self.id, failures })
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.state != ContextState::Unloaded {
            let _ = self.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use weft_ffi::ArrayPtr;

    use super::*;
    use crate::LogLevel;
    use crate::containers::NativeArray;
    use crate::declare_wrapper;
    use crate::script::{ComponentHooks, ScriptBase, ScriptComponent, ScriptObject, ScriptResult};
    use crate::testing::FakeTables;

    /// Native addresses of dropped doors.
    static DROPPED_DOORS: Mutex<Vec<usize>> = Mutex::new(Vec::new());

    struct Door {
        base: ScriptBase,
    }

    impl ScriptObject for Door {
        fn new(base: ScriptBase) -> ScriptResult<Self> {
            Ok(Door { base })
        }

        fn base(&self) -> &ScriptBase {
            &self.base
        }
    }

    impl Drop for Door {
        fn drop(&mut self) {
            DROPPED_DOORS.lock().unwrap().push(self.base.native().ptr().addr());
        }
    }

    struct Broken;

    impl ScriptObject for Broken {
        fn new(_base: ScriptBase) -> ScriptResult<Self> {
            Err("missing config".into())
        }

        fn base(&self) -> &ScriptBase {
            unreachable!()
        }
    }

    struct Spin {
        base: ScriptBase,
    }

    impl ScriptComponent for Spin {
        const OVERRIDES: ComponentHooks = ComponentHooks::TICK_COMPONENT;

        fn new(base: ScriptBase) -> ScriptResult<Self> {
            Ok(Spin { base })
        }

        fn base(&self) -> &ScriptBase {
            &self.base
        }
    }

    struct Grenade {
        base: ScriptBase,
    }

    impl ScriptObject for Grenade {
        fn new(base: ScriptBase) -> ScriptResult<Self> {
            Ok(Grenade { base })
        }

        fn base(&self) -> &ScriptBase {
            &self.base
        }
    }

    impl Drop for Grenade {
        fn drop(&mut self) {
            panic!("grenade went off");
        }
    }

    declare_wrapper! {
        struct AActor = "AActor";
    }

    /// Array address set aside for the next `Keeper` to adopt.
    static RESERVED: Mutex<Option<usize>> = Mutex::new(None);

    /// What a `Keeper` smuggled out of its instance.
    struct Kept {
        services: Arc<ContextServices>,
        array: NativeArray<i32>,
    }

    static KEPT: Mutex<Option<Kept>> = Mutex::new(None);

    /// Adopts a reserved array in `begin_play` and leaks it, with its
    /// services, past the end of the instance.
    struct Keeper {
        base: ScriptBase,
    }

    impl ScriptObject for Keeper {
        fn new(base: ScriptBase) -> ScriptResult<Self> {
            Ok(Keeper { base })
        }

        fn base(&self) -> &ScriptBase {
            &self.base
        }

        fn begin_play(&mut self) {
            let Some(addr) = RESERVED.lock().unwrap().take() else {
                return;
            };
            let services = self.base.services().clone();
            let array = services.adopt_array(ArrayPtr::from_addr(addr)).unwrap();
            *KEPT.lock().unwrap() = Some(Kept { services, array });
        }
    }

    fn catalog() -> Arc<AssemblyCatalog> {
        let mut catalog = AssemblyCatalog::new();
        catalog.register(
            ScriptAssembly::new("Game")
                .with_object::<Door>("Game.Door")
                .with_object::<Broken>("Game.Broken")
                .with_object::<Grenade>("Game.Grenade")
                .with_object::<Keeper>("Game.Keeper")
                .with_component::<Spin>("Game.Spin"),
        );
        catalog.register(ScriptAssembly::new("Gen").dynamic().with_component::<Spin>("Gen.Spin"));
        Arc::new(catalog)
    }

    fn bound_context() -> (FakeTables, ExecutionContext) {
        let fakes = FakeTables::new();
        let mut ctx = ExecutionContext::new(2, PathBuf::from("."), catalog(), Logger::null());
        ctx.bind_function_tables(fakes.tables()).unwrap();
        (fakes, ctx)
    }

    #[test]
    fn binding_is_exactly_once() {
        let (fakes, mut ctx) = bound_context();
        assert_eq!(ctx.state(), ContextState::Initialized);
        let err = ctx.bind_function_tables(fakes.tables()).unwrap_err();
        assert!(matches!(err, WeftError::TablesAlreadyBound(2)));
    }

    #[test]
    fn creation_before_binding_is_a_protocol_violation() {
        let mut ctx = ExecutionContext::new(2, PathBuf::from("."), catalog(), Logger::null());
        let err = ctx.create_script_object("Game.Door", UObjectPtr::null()).unwrap_err();
        assert!(matches!(err, WeftError::TablesNotBound(2)));
        assert!(matches!(ctx.load_assembly("Game"), Err(WeftError::TablesNotBound(2))));
    }

    #[test]
    fn loading_component_assembly_pulls_in_engine_assembly() {
        let (fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        ctx.load_assembly("Game").unwrap();
        assert_eq!(ctx.loaded_assemblies().collect::<Vec<_>>(), vec![ENGINE_ASSEMBLY, "Game"]);
        assert_eq!(ctx.state(), ContextState::Active);
        let lines = fakes.log.lines(LogLevel::Display);
        assert!(lines.iter().any(|l| l.ends_with("loaded Game (5 classes)")));
    }

    #[test]
    fn unknown_assembly_is_a_lookup_miss() {
        let (_fakes, mut ctx) = bound_context();
        assert!(matches!(ctx.load_assembly("Nope"), Err(WeftError::AssemblyNotFound(_))));
    }

    #[test]
    fn create_and_destroy_script_object() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        let info = ctx.create_script_object("Game.Door", UObjectPtr::from_addr(0x10)).unwrap();
        assert!(info.instance_id > 0);
        assert!(info.begin_play.is_some() && info.tick.is_some() && info.destroy.is_some());
        assert_eq!(ctx.script_object_count(), 1);

        assert!(!DROPPED_DOORS.lock().unwrap().contains(&0x10));
        ctx.destroy_script_object(info.instance_id).unwrap();
        assert!(DROPPED_DOORS.lock().unwrap().contains(&0x10));
        assert!(matches!(
            ctx.destroy_script_object(info.instance_id),
            Err(WeftError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn unknown_class_leaves_registry_untouched() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        let err = ctx.create_script_object("Game.Window", UObjectPtr::null()).unwrap_err();
        assert!(matches!(err, WeftError::ClassNotFound(_)));
        assert_eq!(ctx.script_object_count(), 0);
    }

    #[test]
    fn failing_constructor_is_a_construction_failure() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        let err = ctx.create_script_object("Game.Broken", UObjectPtr::null()).unwrap_err();
        assert_eq!(err.to_string(), "failed to construct Game.Broken: missing config");
        assert_eq!(ctx.script_object_count(), 0);
    }

    #[test]
    fn wrong_capability_is_rejected() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        assert!(matches!(
            ctx.create_script_object("Game.Spin", UObjectPtr::null()),
            Err(WeftError::NotAScriptObject(_))
        ));
        assert!(matches!(
            ctx.create_script_component("Game.Door", UObjectPtr::null()),
            Err(WeftError::NotAScriptComponent(_))
        ));
    }

    #[test]
    fn component_proxy_binds_only_tick() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        let proxy = ctx.create_script_component("Game.Spin", UObjectPtr::from_addr(0x20)).unwrap();
        assert!(proxy.tick_component.is_some());
        assert!(proxy.on_register.is_none());
        assert!(proxy.on_component_created.is_none());
        ctx.destroy_script_component(proxy.instance_id).unwrap();
    }

    #[test]
    fn component_types_need_engine_assembly_and_skip_dynamic() {
        let fakes = FakeTables::new();
        let mut ctx = ExecutionContext::new(3, PathBuf::from("."), catalog(), Logger::null());
        assert!(ctx.script_component_types().is_empty());
        ctx.bind_function_tables(fakes.tables()).unwrap();
        ctx.load_assembly("Gen").unwrap();
        ctx.load_assembly("Game").unwrap();
        assert_eq!(ctx.script_component_types(), vec!["Game.Spin".to_string()]);
    }

    #[test]
    fn instance_ids_are_unique_across_threads() {
        let ids = Arc::new(InstanceIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..500).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<InstanceId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        let expected: Vec<InstanceId> = (1..=8 * 500).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn unload_disposes_instances_and_revokes_hook() {
        let (fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        ctx.create_script_object("Game.Door", UObjectPtr::null()).unwrap();
        ctx.create_script_component("Game.Spin", UObjectPtr::null()).unwrap();
        let services = ctx.services().unwrap().clone();
        let handle = services.adopt_object(UObjectPtr::from_addr(0x99)).unwrap();
        let hook = ctx.release_hook().unwrap().clone();

        ctx.unload().unwrap();
        assert_eq!(ctx.state(), ContextState::Unloaded);
        assert_eq!(ctx.script_object_count() + ctx.script_component_count(), 0);
        assert!(!hook.is_open());
        drop(handle);
        assert!(fakes.object.released().is_empty());
        assert!(matches!(ctx.unload(), Err(WeftError::AlreadyUnloaded(2))));
    }

    #[test]
    fn unload_continues_past_failing_disposal() {
        let (_fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        ctx.create_script_object("Game.Grenade", UObjectPtr::null()).unwrap();
        ctx.create_script_object("Game.Door", UObjectPtr::null()).unwrap();
        let err = ctx.unload().unwrap_err();
        match err {
            WeftError::UnloadFailed { id, failures } => {
                assert_eq!(id, 2);
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("grenade went off"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.state(), ContextState::Unloaded);
    }

    #[test]
    fn native_function_pointers_are_stored_per_class() {
        let (_fakes, mut ctx) = bound_context();
        let ptrs = vec![0x100 as *const c_void, 0x200 as *const c_void];
        ctx.set_native_function_pointers("Actor", ptrs.clone()).unwrap();
        assert_eq!(ctx.native_function_pointers("Actor"), Some(ptrs));
        assert_eq!(ctx.native_function_pointers("Pawn"), None);
    }

    #[test]
    fn arrays_adopted_by_context_release_through_hook() {
        let (fakes, ctx) = bound_context();
        let raw = fakes.array.array_of_ints(&[1, 2]);
        let arr: NativeArray<i32> = ctx.services().unwrap().adopt_array(raw).unwrap();
        assert_eq!(arr.count(), 2);
        drop(arr);
        assert_eq!(fakes.array.destroyed(), vec![raw.addr()]);
    }

    #[test]
    fn class_lookups_after_binding_hit_native_once() {
        let (fakes, ctx) = bound_context();
        fakes.object.define_class("Actor", 0x700, None);
        let services = ctx.services().unwrap();
        let first = services.class_of::<AActor>().unwrap().unwrap();
        let second = services.class_of::<AActor>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "Actor");
        assert_eq!(fakes.object.name_lookups(), 1);
    }

    #[test]
    fn scripts_share_the_context_services() {
        let (fakes, mut ctx) = bound_context();
        ctx.load_assembly("Game").unwrap();
        let raw = fakes.array.array_of_ints(&[5, 6, 7]);
        *RESERVED.lock().unwrap() = Some(raw.addr());
        let info = ctx.create_script_object("Game.Keeper", UObjectPtr::null()).unwrap();
        unsafe { info.begin_play.unwrap()(info.instance) };

        let kept = KEPT.lock().unwrap().take().unwrap();
        assert!(Arc::ptr_eq(&kept.services, ctx.services().unwrap()));
        assert_eq!(kept.array.to_vec().unwrap(), vec![5, 6, 7]);

        ctx.unload().unwrap();
        // The script's own copies outlive the context and stay inert.
        assert!(!kept.services.is_open());
        assert!(matches!(
            kept.services.adopt_array::<i32>(fakes.array.new_array()),
            Err(WeftError::AlreadyUnloaded(2))
        ));
        assert!(kept.services.class_of::<AActor>().is_err());
        drop(kept);
        assert!(!fakes.array.destroyed().contains(&raw.addr()));
        assert_eq!(fakes.object.name_lookups(), 0);
    }
}
