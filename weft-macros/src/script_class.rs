// Expansion for #[script_object] / #[script_component]: keeps the trait impl
// as written and submits a ScriptClassRegistration for it through inventory.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{Expr, ImplItem, ItemImpl, Lit, Meta, Token, Type, parse2};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Object,
    Component,
}

impl ClassKind {
    fn attr_name(self) -> &'static str {
        match self {
            ClassKind::Object => "script_object",
            ClassKind::Component => "script_component",
        }
    }

    fn trait_name(self) -> &'static str {
        match self {
            ClassKind::Object => "ScriptObject",
            ClassKind::Component => "ScriptComponent",
        }
    }
}

/// Component hook method name -> `ComponentHooks` flag.
const COMPONENT_HOOKS: [(&str, &str); 6] = [
    ("on_component_created", "ON_COMPONENT_CREATED"),
    ("on_component_destroyed", "ON_COMPONENT_DESTROYED"),
    ("on_register", "ON_REGISTER"),
    ("on_unregister", "ON_UNREGISTER"),
    ("initialize_component", "INITIALIZE_COMPONENT"),
    ("tick_component", "TICK_COMPONENT"),
];

// ---------------------------------------------------------------------------
// Attribute parsing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ClassArgs {
    name: Option<String>,
    assembly: Option<String>,
}

fn string_value(expr: &Expr, key: &str) -> syn::Result<String> {
    if let Expr::Lit(lit) = expr {
        if let Lit::Str(s) = &lit.lit {
            let value = s.value();
            if value.is_empty() {
                return Err(syn::Error::new_spanned(expr, format!("`{key}` must not be empty")));
            }
            return Ok(value);
        }
    }
    Err(syn::Error::new_spanned(
        expr,
        format!("`{key}` must be a string literal, e.g. {key} = \"Game.Scripts\""),
    ))
}

fn parse_class_args(attr: TokenStream) -> syn::Result<ClassArgs> {
    let mut args = ClassArgs::default();
    if attr.is_empty() {
        return Ok(args);
    }
    let metas = syn::parse::Parser::parse2(Punctuated::<Meta, Token![,]>::parse_terminated, attr)?;
    for meta in &metas {
        match meta {
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                args.name = Some(string_value(&nv.value, "name")?);
            }
            Meta::NameValue(nv) if nv.path.is_ident("assembly") => {
                args.assembly = Some(string_value(&nv.value, "assembly")?);
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "unknown argument; expected `name = \"...\"` or `assembly = \"...\"`",
                ));
            }
        }
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

pub fn expand(kind: ClassKind, attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = parse_class_args(attr)?;
    let mut item_impl: ItemImpl = parse2(item)?;

    let trait_ok = item_impl
        .trait_
        .as_ref()
        .and_then(|(_, path, _)| path.segments.last())
        .is_some_and(|seg| seg.ident == kind.trait_name());
    if !trait_ok {
        return Err(syn::Error::new(
            Span::call_site(),
            format!(
                "#[{}] must be placed on an `impl {} for YourType` block",
                kind.attr_name(),
                kind.trait_name()
            ),
        ));
    }
    if !item_impl.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item_impl.generics,
            format!("#[{}] does not support generic script classes", kind.attr_name()),
        ));
    }

    let self_ty = item_impl.self_ty.clone();
    let type_ident = match self_ty.as_ref() {
        Type::Path(tp) => tp
            .path
            .segments
            .last()
            .map(|s| s.ident.clone())
            .ok_or_else(|| syn::Error::new_spanned(&self_ty, "expected a named type"))?,
        other => return Err(syn::Error::new_spanned(other, "expected a named type")),
    };

    if kind == ClassKind::Component {
        inject_overrides(&mut item_impl);
    }

    let assembly = match &args.assembly {
        Some(a) => quote! { #a },
        None => quote! { ::core::env!("CARGO_CRATE_NAME") },
    };
    let type_name = type_ident.to_string();
    let name = match &args.name {
        Some(n) => quote! { #n },
        None => quote! { ::core::concat!(#assembly, ".", #type_name) },
    };
    let ctor = match kind {
        ClassKind::Object => format_ident!("object"),
        ClassKind::Component => format_ident!("component"),
    };

    Ok(quote! {
        #item_impl

        const _: () = {
            fn __weft_descriptor() -> ::weft::runtime::ScriptClassDescriptor {
                ::weft::runtime::ScriptClassDescriptor::#ctor::<#self_ty>(#name)
            }

            ::weft::__inventory::submit! {
                ::weft::runtime::ScriptClassRegistration {
                    assembly: #assembly,
                    descriptor: __weft_descriptor,
                }
            }
        };
    })
}

/// Add `const OVERRIDES` listing the hooks the impl defines, unless the
/// author already wrote one.
fn inject_overrides(item_impl: &mut ItemImpl) {
    let has_overrides = item_impl
        .items
        .iter()
        .any(|item| matches!(item, ImplItem::Const(c) if c.ident == "OVERRIDES"));
    if has_overrides {
        return;
    }

    let flags: Vec<_> = hook_flags(item_impl)
        .into_iter()
        .map(|flag| {
            let flag = format_ident!("{}", flag);
            quote! { ::weft::runtime::ComponentHooks::#flag }
        })
        .collect();
    let value = match flags.split_first() {
        None => quote! { ::weft::runtime::ComponentHooks::empty() },
        Some((first, rest)) => quote! { #first #(.union(#rest))* },
    };
    item_impl.items.push(syn::parse_quote! {
        const OVERRIDES: ::weft::runtime::ComponentHooks = #value;
    });
}

fn hook_flags(item_impl: &ItemImpl) -> Vec<&'static str> {
    let defined: Vec<String> = item_impl
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(f) => Some(f.sig.ident.to_string()),
            _ => None,
        })
        .collect();
    COMPONENT_HOOKS
        .iter()
        .filter(|(method, _)| defined.iter().any(|d| d == method))
        .map(|(_, flag)| *flag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(kind: ClassKind, attr: TokenStream, item: TokenStream) -> String {
        expand(kind, attr, item).unwrap().to_string()
    }

    #[test]
    fn object_registers_with_explicit_names() {
        let out = expand_str(
            ClassKind::Object,
            quote! { name = "Game.Door", assembly = "Game" },
            quote! {
                impl ScriptObject for Door {
                    fn new(base: ScriptBase) -> ScriptResult<Self> { Ok(Door { base }) }
                    fn base(&self) -> &ScriptBase { &self.base }
                }
            },
        );
        assert!(out.contains("ScriptClassDescriptor :: object :: < Door >"));
        assert!(out.contains("\"Game.Door\""));
        assert!(out.contains("assembly : \"Game\""));
        assert!(!out.contains("OVERRIDES"));
    }

    #[test]
    fn defaults_use_crate_name() {
        let out = expand_str(
            ClassKind::Object,
            TokenStream::new(),
            quote! { impl ScriptObject for Door { fn base(&self) -> &ScriptBase { &self.base } } },
        );
        assert!(out.contains("CARGO_CRATE_NAME"));
        assert!(out.contains("concat !"));
        assert!(out.contains("\"Door\""));
    }

    #[test]
    fn component_overrides_follow_defined_hooks() {
        let out = expand_str(
            ClassKind::Component,
            TokenStream::new(),
            quote! {
                impl ScriptComponent for Spinner {
                    fn base(&self) -> &ScriptBase { &self.base }
                    fn tick_component(&mut self, dt: f32) {}
                    fn on_register(&mut self) {}
                }
            },
        );
        assert!(out.contains("const OVERRIDES"));
        assert!(out.contains("ComponentHooks :: ON_REGISTER . union"));
        assert!(out.contains("ComponentHooks :: TICK_COMPONENT"));
        assert!(!out.contains("ON_UNREGISTER"));
    }

    #[test]
    fn component_without_hooks_overrides_nothing() {
        let out = expand_str(
            ClassKind::Component,
            TokenStream::new(),
            quote! { impl ScriptComponent for Idle { fn base(&self) -> &ScriptBase { &self.base } } },
        );
        assert!(out.contains("ComponentHooks :: empty ()"));
    }

    #[test]
    fn explicit_overrides_are_kept() {
        let out = expand_str(
            ClassKind::Component,
            TokenStream::new(),
            quote! {
                impl ScriptComponent for Spinner {
                    const OVERRIDES: ComponentHooks = ComponentHooks::ON_REGISTER;
                    fn tick_component(&mut self, dt: f32) {}
                }
            },
        );
        assert_eq!(out.matches("OVERRIDES").count(), 1);
    }

    #[test]
    fn rejects_inherent_impls_and_wrong_traits() {
        let err = expand(ClassKind::Object, TokenStream::new(), quote! { impl Door {} }).unwrap_err();
        assert!(err.to_string().contains("impl ScriptObject for YourType"));

        let err = expand(
            ClassKind::Component,
            TokenStream::new(),
            quote! { impl ScriptObject for Door {} },
        )
        .unwrap_err();
        assert!(err.to_string().contains("impl ScriptComponent"));
    }

    #[test]
    fn rejects_unknown_and_non_string_arguments() {
        let item = quote! { impl ScriptObject for Door {} };
        let err = expand(ClassKind::Object, quote! { parent = Actor }, item.clone()).unwrap_err();
        assert!(err.to_string().contains("unknown argument"));

        let err = expand(ClassKind::Object, quote! { name = Door }, item).unwrap_err();
        assert!(err.to_string().contains("string literal"));
    }
}
