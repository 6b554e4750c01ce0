// Script assemblies: named groups of script classes that an execution context
// can load. Classes are described by explicit registration tables; there is no
// runtime reflection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use weft_ffi::{InstanceId, ScriptComponentProxy, ScriptObjectInstanceInfo, UObjectPtr};

use crate::script::{
    ComponentHooks, InstanceBox, ScriptBase, ScriptComponent, ScriptObject, ScriptResult,
    component_proxy, object_info,
};
use crate::services::ContextServices;

/// Name of the built-in assembly hosting the engine wrapper types. Component
/// classes are only discoverable once it is loaded.
pub const ENGINE_ASSEMBLY: &str = "Weft.Engine";

/// Everything the context passes to a script constructor.
pub struct ConstructArgs {
    pub instance_id: InstanceId,
    pub native: UObjectPtr,
    pub services: Arc<ContextServices>,
}

pub enum Constructed {
    Object {
        instance: InstanceBox,
        info: ScriptObjectInstanceInfo,
    },
    Component {
        instance: InstanceBox,
        proxy: ScriptComponentProxy,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptClassKind {
    Object,
    Component { overrides: ComponentHooks },
}

/// One script class: its full name, capability and constructor.
#[derive(Clone)]
pub struct ScriptClassDescriptor {
    name: String,
    kind: ScriptClassKind,
    construct: fn(ConstructArgs) -> ScriptResult<Constructed>,
}

fn construct_object<T: ScriptObject>(args: ConstructArgs) -> ScriptResult<Constructed> {
    let id = args.instance_id;
    let value = T::new(ScriptBase::new(id, args.native, args.services))?;
    let instance = InstanceBox::new(value);
    let info = object_info::<T>(id, instance.as_ptr());
    Ok(Constructed::Object { instance, info })
}

fn construct_component<T: ScriptComponent>(args: ConstructArgs) -> ScriptResult<Constructed> {
    let id = args.instance_id;
    let value = T::new(ScriptBase::new(id, args.native, args.services))?;
    let instance = InstanceBox::new(value);
    let proxy = component_proxy::<T>(id, instance.as_ptr(), T::OVERRIDES);
    Ok(Constructed::Component { instance, proxy })
}

impl ScriptClassDescriptor {
    pub fn object<T: ScriptObject>(name: impl Into<String>) -> Self {
        ScriptClassDescriptor {
            name: name.into(),
            kind: ScriptClassKind::Object,
            construct: construct_object::<T>,
        }
    }

    pub fn component<T: ScriptComponent>(name: impl Into<String>) -> Self {
        ScriptClassDescriptor {
            name: name.into(),
            kind: ScriptClassKind::Component { overrides: T::OVERRIDES },
            construct: construct_component::<T>,
        }
    }

    /// Fully qualified name, e.g. `Game.Scripts.Door`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScriptClassKind {
        self.kind
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, ScriptClassKind::Component { .. })
    }

    pub fn construct(&self, args: ConstructArgs) -> ScriptResult<Constructed> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ScriptClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A loadable group of script classes.
#[derive(Clone, Debug)]
pub struct ScriptAssembly {
    name: String,
    classes: Vec<ScriptClassDescriptor>,
    dynamic: bool,
}

impl ScriptAssembly {
    pub fn new(name: impl Into<String>) -> Self {
        ScriptAssembly {
            name: name.into(),
            classes: Vec::new(),
            dynamic: false,
        }
    }

    /// Mark as built at runtime. Dynamic assemblies are skipped when listing
    /// component types.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn with_class(mut self, class: ScriptClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }

    pub fn with_object<T: ScriptObject>(self, name: &str) -> Self {
        self.with_class(ScriptClassDescriptor::object::<T>(name))
    }

    pub fn with_component<T: ScriptComponent>(self, name: &str) -> Self {
        self.with_class(ScriptClassDescriptor::component::<T>(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn classes(&self) -> &[ScriptClassDescriptor] {
        &self.classes
    }

    pub fn has_components(&self) -> bool {
        self.classes.iter().any(ScriptClassDescriptor::is_component)
    }
}

// ---------------------------------------------------------------------------
// Inventory-based auto-registration
// ---------------------------------------------------------------------------

/// Submitted by `#[script_object]` / `#[script_component]`.
pub struct ScriptClassRegistration {
    pub assembly: &'static str,
    pub descriptor: fn() -> ScriptClassDescriptor,
}
inventory::collect!(ScriptClassRegistration);

/// Every assembly known to the process.
#[derive(Clone, Debug, Default)]
pub struct AssemblyCatalog {
    assemblies: BTreeMap<String, ScriptAssembly>,
}

impl AssemblyCatalog {
    /// Just the built-in engine assembly.
    pub fn new() -> Self {
        let mut catalog = AssemblyCatalog::default();
        catalog.register(ScriptAssembly::new(ENGINE_ASSEMBLY));
        catalog
    }

    /// The built-in engine assembly plus every class registered at link time,
    /// grouped by assembly name.
    pub fn from_inventory() -> Self {
        let mut catalog = AssemblyCatalog::new();
        for reg in inventory::iter::<ScriptClassRegistration> {
            catalog
                .assemblies
                .entry(reg.assembly.to_string())
                .or_insert_with(|| ScriptAssembly::new(reg.assembly))
                .classes
                .push((reg.descriptor)());
        }
        catalog
    }

    /// Add or replace an assembly.
    pub fn register(&mut self, assembly: ScriptAssembly) {
        self.assemblies.insert(assembly.name.clone(), assembly);
    }

    pub fn get(&self, name: &str) -> Option<&ScriptAssembly> {
        self.assemblies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assemblies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTables;

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

    struct Light {
        base: ScriptBase,
    }

    impl ScriptComponent for Light {
        const OVERRIDES: ComponentHooks = ComponentHooks::ON_REGISTER;

        fn new(base: ScriptBase) -> ScriptResult<Self> {
            Ok(Light { base })
        }

        fn base(&self) -> &ScriptBase {
            &self.base
        }
    }

    #[test]
    fn descriptors_record_kind_and_overrides() {
        let asm = ScriptAssembly::new("Game")
            .with_object::<Door>("Game.Door")
            .with_component::<Light>("Game.Light");
        assert!(asm.has_components());
        assert_eq!(asm.classes()[0].kind(), ScriptClassKind::Object);
        assert_eq!(
            asm.classes()[1].kind(),
            ScriptClassKind::Component { overrides: ComponentHooks::ON_REGISTER }
        );
    }

    #[test]
    fn construct_produces_matching_lifecycle_table() {
        let fakes = FakeTables::new();
        let desc = ScriptClassDescriptor::component::<Light>("Game.Light");
        let built = desc
            .construct(ConstructArgs {
                instance_id: 5,
                native: UObjectPtr::from_addr(0x50),
                services: ContextServices::new(2, fakes.tables()),
            })
            .unwrap();
        match built {
            Constructed::Component { instance, proxy } => {
                assert_eq!(proxy.instance_id, 5);
                assert_eq!(proxy.instance, instance.as_ptr());
                assert!(proxy.on_register.is_some());
                assert!(proxy.tick_component.is_none());
            }
            Constructed::Object { .. } => panic!("expected a component"),
        }
    }

    #[test]
    fn catalog_always_contains_engine_assembly() {
        let catalog = AssemblyCatalog::new();
        assert!(catalog.get(ENGINE_ASSEMBLY).is_some());
        assert!(!AssemblyCatalog::from_inventory().is_empty());
    }
}
