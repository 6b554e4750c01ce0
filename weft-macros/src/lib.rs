// weft-macros: proc macros for #[script_object] and #[script_component].

mod script_class;

use script_class::ClassKind;

/// Register a `ScriptObject` impl as a loadable script class.
///
/// # Example
/// ```ignore
/// #[script_object(name = "Game.Door", assembly = "Game")]
/// impl ScriptObject for Door {
///     fn new(base: ScriptBase) -> ScriptResult<Self> { Ok(Door { base, open: false }) }
///     fn base(&self) -> &ScriptBase { &self.base }
///     fn begin_play(&mut self) { self.open = true; }
/// }
/// ```
///
/// `assembly` defaults to the crate name and `name` to `<assembly>.<Type>`.
#[proc_macro_attribute]
pub fn script_object(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    match script_class::expand(ClassKind::Object, attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Register a `ScriptComponent` impl as a loadable script class.
///
/// The lifecycle hooks defined in the impl block become `OVERRIDES`, so only
/// those are bound in the proxy handed to native code.
///
/// # Example
/// ```ignore
/// #[script_component(assembly = "Game")]
/// impl ScriptComponent for Spinner {
///     fn new(base: ScriptBase) -> ScriptResult<Self> { Ok(Spinner { base, angle: 0.0 }) }
///     fn base(&self) -> &ScriptBase { &self.base }
///     fn tick_component(&mut self, dt: f32) { self.angle += 90.0 * dt; }
/// }
/// ```
#[proc_macro_attribute]
pub fn script_component(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    match script_class::expand(ClassKind::Component, attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
