//! Bridge Macros - Proc macros for controller registration
//!
//! This crate provides the `#[controller]` attribute macro, which turns an
//! inherent `impl` block into a `bridge_runtime::ControllerType`
//! implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, Lit, ReturnType, Token, Type,
    Visibility,
};

/// Parsed attributes for the controller macro
#[derive(Default)]
struct ControllerAttrs {
    name: Option<String>,
    properties: Vec<Ident>,
    readonly: Vec<Ident>,
    collections: Vec<Ident>,
}

fn parse_ident_list(input: ParseStream) -> syn::Result<Vec<Ident>> {
    let content;
    syn::parenthesized!(content in input);
    let idents = content.parse_terminated(Ident::parse, Token![,])?;
    Ok(idents.into_iter().collect())
}

impl Parse for ControllerAttrs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut attrs = ControllerAttrs::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;

            match ident.to_string().as_str() {
                "name" => {
                    input.parse::<Token![=]>()?;
                    let lit: Lit = input.parse()?;
                    match lit {
                        Lit::Str(s) => attrs.name = Some(s.value()),
                        other => return Err(syn::Error::new(other.span(), "expected a string")),
                    }
                }
                "properties" => attrs.properties.extend(parse_ident_list(input)?),
                "readonly" => attrs.readonly.extend(parse_ident_list(input)?),
                "collections" => attrs.collections.extend(parse_ident_list(input)?),
                _ => {
                    return Err(syn::Error::new(ident.span(), "unknown attribute"));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(attrs)
    }
}

/// Parsed `#[bridge(...)]` attribute on a single method
#[derive(Default)]
struct MemberAttrs {
    skip: bool,
    name: Option<String>,
    get: Option<String>,
    set: Option<String>,
}

impl MemberAttrs {
    /// Read and strip every `#[bridge(...)]` attribute
    fn take(attrs: &mut Vec<syn::Attribute>) -> syn::Result<Self> {
        let mut member = MemberAttrs::default();
        let mut result = Ok(());

        attrs.retain(|attr| {
            if !attr.path().is_ident("bridge") {
                return true;
            }
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    member.skip = true;
                    return Ok(());
                }
                let value: syn::LitStr = meta.value()?.parse()?;
                if meta.path.is_ident("name") {
                    member.name = Some(value.value());
                } else if meta.path.is_ident("get") {
                    member.get = Some(value.value());
                } else if meta.path.is_ident("set") {
                    member.set = Some(value.value());
                } else {
                    return Err(meta.error("expected `skip`, `name`, `get` or `set`"));
                }
                Ok(())
            });
            if let Err(e) = parsed {
                result = Err(e);
            }
            false
        });

        result.map(|()| member)
    }
}

/// Why a method cannot be called over the wire, if it cannot
fn exclusion(method: &ImplItemFn) -> Option<TokenStream2> {
    let sig = &method.sig;
    let reason = |variant: &str| {
        let variant = Ident::new(variant, proc_macro2::Span::call_site());
        Some(quote! { ::bridge_runtime::Exclusion::#variant })
    };

    if sig.asyncness.is_some() {
        return reason("Async");
    }
    if !sig.generics.params.is_empty() {
        return reason("Generic");
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        if receiver.reference.is_none() {
            return reason("Consuming");
        }
    }
    for input in &sig.inputs {
        let FnArg::Typed(pat) = input else { continue };
        match &*pat.ty {
            Type::ImplTrait(_) => return reason("Generic"),
            Type::Reference(r) if r.mutability.is_some() => return reason("Out"),
            Type::Reference(_) => return reason("ByRef"),
            _ => {}
        }
    }
    if let ReturnType::Type(_, ty) = &sig.output {
        if matches!(**ty, Type::Reference(_)) {
            return reason("BorrowedReturn");
        }
    }
    None
}

fn typed_inputs(method: &ImplItemFn) -> Vec<&Type> {
    method
        .sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat) => Some(&*pat.ty),
            FnArg::Receiver(_) => None,
        })
        .collect()
}

fn has_receiver(method: &ImplItemFn) -> bool {
    matches!(method.sig.inputs.first(), Some(FnArg::Receiver(_)))
}

fn is_mut_receiver(method: &ImplItemFn) -> bool {
    matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.mutability.is_some()
    )
}

/// Getter and setter collected for one `get`/`set` property
#[derive(Default)]
struct Accessors {
    get: Option<TokenStream2>,
    set: Option<TokenStream2>,
}

const MAX_PARAMETERS: usize = 8;

/// Attribute macro for binding a host type to the UI.
///
/// Applied to an inherent `impl` block. Every `pub fn` taking `&self` or
/// `&mut self` becomes a callable method named in PascalCase. Methods whose
/// shape cannot cross the wire (async, generic, by-reference parameters,
/// borrowed returns, consuming `self`) are recorded as exclusions and logged
/// when the type is first used.
///
/// # Attributes
///
/// - `name` (optional): Controller name (defaults to the type name)
/// - `properties(a, b)`: Fields exposed as read-write properties (cloned on read)
/// - `readonly(c)`: Fields exposed as read-only properties
/// - `collections(items)`: `Vec` fields exposed as observable collections
///
/// # Method attributes
///
/// - `#[bridge(skip)]`: Keep the method off the surface
/// - `#[bridge(name = "Other")]`: Register under a different name
/// - `#[bridge(get = "Prop")]` / `#[bridge(set = "Prop")]`: Property accessor
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Counter {
///     count: i64,
///     history: Vec<i64>,
/// }
///
/// #[controller(properties(count), collections(history))]
/// impl Counter {
///     pub fn increment(&mut self, by: i64) -> i64 {
///         self.count += by;
///         self.history.push(self.count);
///         self.count
///     }
///
///     #[bridge(get = "Label")]
///     pub fn label(&self) -> String {
///         format!("Count: {}", self.count)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = parse_macro_input!(attr as ControllerAttrs);
    let item_impl = parse_macro_input!(item as ItemImpl);

    match expand(attrs, item_impl) {
        Ok(output) => output.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(attrs: ControllerAttrs, mut item_impl: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item_impl.trait_ {
        return Err(syn::Error::new_spanned(path, "#[controller] expects an inherent impl block"));
    }
    if !item_impl.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item_impl.generics,
            "#[controller] does not support generic types",
        ));
    }

    let self_ty = item_impl.self_ty.clone();
    let controller_name = match (&attrs.name, &*self_ty) {
        (Some(name), _) => name.clone(),
        (None, Type::Path(path)) => match path.path.segments.last() {
            Some(segment) => segment.ident.to_string(),
            None => return Err(syn::Error::new_spanned(&self_ty, "cannot name this type")),
        },
        (None, other) => {
            return Err(syn::Error::new_spanned(other, "add `name = \"...\"` for this type"));
        }
    };

    let mut registrations = Vec::new();
    let mut accessors: Vec<(String, Accessors)> = Vec::new();

    for item in &mut item_impl.items {
        let ImplItem::Fn(method) = item else { continue };
        let member = MemberAttrs::take(&mut method.attrs)?;

        if !matches!(method.vis, Visibility::Public(_)) || !has_receiver(method) {
            continue;
        }

        let fn_name = &method.sig.ident;
        let wire_name = match &member.name {
            Some(name) => quote! { #name },
            None => {
                let declared = fn_name.to_string();
                quote! { ::bridge_runtime::naming::to_pascal(#declared) }
            }
        };

        if member.skip {
            registrations.push(quote! { builder.deny(#wire_name); });
            continue;
        }

        if let Some(property) = member.get.as_ref().or(member.set.as_ref()) {
            let slot = match accessors.iter().position(|(name, _)| name == property) {
                Some(index) => index,
                None => {
                    accessors.push((property.clone(), Accessors::default()));
                    accessors.len() - 1
                }
            };
            let inputs = typed_inputs(method);

            if member.get.is_some() {
                if !inputs.is_empty() || is_mut_receiver(method) {
                    return Err(syn::Error::new_spanned(
                        &method.sig,
                        "a property getter takes only `&self`",
                    ));
                }
                accessors[slot].1.get = Some(quote! { |this: &Self| this.#fn_name() });
            } else {
                let [value_ty] = inputs.as_slice() else {
                    return Err(syn::Error::new_spanned(
                        &method.sig,
                        "a property setter takes `&mut self` and one value",
                    ));
                };
                accessors[slot].1.set =
                    Some(quote! { |this: &mut Self, value: #value_ty| this.#fn_name(value) });
            }
            continue;
        }

        if let Some(reason) = exclusion(method) {
            registrations.push(quote! { builder.exclude(#wire_name, #reason); });
            continue;
        }

        let inputs = typed_inputs(method);
        if inputs.len() > MAX_PARAMETERS {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "controller methods take at most 8 parameters",
            ));
        }
        let args: Vec<Ident> = (0..inputs.len())
            .map(|i| quote::format_ident!("__arg{}", i))
            .collect();

        registrations.push(quote! {
            builder.method(#wire_name, |this: &mut Self, #(#args: #inputs),*| this.#fn_name(#(#args),*));
        });
    }

    for (property, accessors) in accessors {
        let registration = match (accessors.get, accessors.set) {
            (Some(get), Some(set)) => quote! { builder.property(#property, #get, #set); },
            (Some(get), None) => quote! { builder.read_property(#property, #get); },
            (None, Some(set)) => quote! { builder.write_property(#property, #set); },
            (None, None) => continue,
        };
        registrations.push(registration);
    }

    for field in &attrs.properties {
        let declared = field.to_string();
        registrations.push(quote! {
            builder.property(
                ::bridge_runtime::naming::to_pascal(#declared),
                |this: &Self| ::std::clone::Clone::clone(&this.#field),
                |this: &mut Self, value| this.#field = value,
            );
        });
    }

    for field in &attrs.readonly {
        let declared = field.to_string();
        registrations.push(quote! {
            builder.read_property(
                ::bridge_runtime::naming::to_pascal(#declared),
                |this: &Self| ::std::clone::Clone::clone(&this.#field),
            );
        });
    }

    for field in &attrs.collections {
        let declared = field.to_string();
        registrations.push(quote! {
            builder.collection(
                ::bridge_runtime::naming::to_pascal(#declared),
                |this: &Self| &this.#field,
                |this: &mut Self| &mut this.#field,
            );
        });
    }

    Ok(quote! {
        #item_impl

        impl ::bridge_runtime::ControllerType for #self_ty {
            fn controller_name() -> &'static str {
                #controller_name
            }

            #[allow(unused_variables)]
            fn register(builder: &mut ::bridge_runtime::TypeBuilder<Self>) {
                #(#registrations)*
            }
        }
    })
}
