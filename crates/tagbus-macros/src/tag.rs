//! `#[derive(TagPlugin)]` implementation.
//!
//! Scans named fields for `#[tag(producer, path = "...")]` or
//! `#[tag(consumer, path = "...", auto_publish_interval_ms = N)]` and emits
//! an `impl tagbus_framework::TagPlugin` that the plugin host's auto-wire
//! step calls instead of using runtime reflection (there is none in Rust).

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitInt, LitStr, Token, spanned::Spanned};

enum Role {
    Producer,
    Consumer,
}

struct FieldBinding {
    field_ident: syn::Ident,
    field_ty: syn::Type,
    role: Role,
    path: String,
    auto_publish_interval_ms: Option<u64>,
}

fn parse_tag_attr(attr: &syn::Attribute) -> syn::Result<Option<(Role, String, Option<u64>)>> {
    if !attr.path().is_ident("tag") {
        return Ok(None);
    }

    let mut role = None;
    let mut path = None;
    let mut interval = None;

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("producer") {
            role = Some(Role::Producer);
        } else if meta.path.is_ident("consumer") {
            role = Some(Role::Consumer);
        } else if meta.path.is_ident("path") {
            meta.input.parse::<Token![=]>()?;
            let lit: LitStr = meta.input.parse()?;
            path = Some(lit.value());
        } else if meta.path.is_ident("auto_publish_interval_ms") {
            meta.input.parse::<Token![=]>()?;
            let lit: LitInt = meta.input.parse()?;
            interval = Some(lit.base10_parse::<u64>()?);
        } else {
            return Err(meta.error("unrecognized `#[tag(...)]` key"));
        }
        Ok(())
    })?;

    let role = role.ok_or_else(|| {
        syn::Error::new(attr.span(), "`#[tag(...)]` requires `producer` or `consumer`")
    })?;
    let path = path
        .ok_or_else(|| syn::Error::new(attr.span(), "`#[tag(...)]` requires `path = \"...\"`"))?;

    Ok(Some((role, path, interval)))
}

pub fn derive_tag_plugin(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "TagPlugin can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "TagPlugin can only be derived for structs",
            ));
        }
    };

    let mut bindings = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        for attr in &field.attrs {
            if let Some((role, path, interval)) = parse_tag_attr(attr)? {
                bindings.push(FieldBinding {
                    field_ident: ident.clone(),
                    field_ty: field.ty.clone(),
                    role,
                    path,
                    auto_publish_interval_ms: interval,
                });
            }
        }
    }

    let binding_specs = bindings.iter().map(|b| {
        let path = &b.path;
        let role_tok = match b.role {
            Role::Producer => quote!(tagbus_framework::TagBindingRole::Producer),
            Role::Consumer => quote!(tagbus_framework::TagBindingRole::Consumer),
        };
        let interval_tok = match b.auto_publish_interval_ms {
            Some(ms) => quote!(Some(#ms)),
            None => quote!(None),
        };
        quote! {
            tagbus_framework::TagBindingSpec {
                path: #path.to_string(),
                role: #role_tok,
                auto_publish_interval_ms: #interval_tok,
            }
        }
    });

    let consumer_arms = bindings.iter().filter(|b| matches!(b.role, Role::Consumer)).map(|b| {
        let path = &b.path;
        let ident = &b.field_ident;
        let ty = &b.field_ty;
        quote! {
            #path => {
                self.#ident = <#ty as tagbus_core::TagCoerce>::from_tag_value(value)
                    .unwrap_or_default();
                true
            }
        }
    });

    let producer_arms = bindings.iter().filter(|b| matches!(b.role, Role::Producer)).map(|b| {
        let path = &b.path;
        let ident = &b.field_ident;
        quote! {
            #path => Some(tagbus_core::TagCoerce::into_tag_value(self.#ident.clone())),
        }
    });

    let expanded = quote! {
        impl tagbus_framework::TagPlugin for #name {
            fn tag_bindings(&self) -> Vec<tagbus_framework::TagBindingSpec> {
                vec![#(#binding_specs),*]
            }

            fn write_consumer_field(&mut self, path: &str, value: &tagbus_core::TagValue) -> bool {
                match path {
                    #(#consumer_arms)*
                    _ => false,
                }
            }

            fn read_producer_field(&self, path: &str) -> Option<tagbus_core::TagValue> {
                match path {
                    #(#producer_arms)*
                    _ => None,
                }
            }
        }
    };

    Ok(expanded)
}
