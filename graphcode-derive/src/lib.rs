//! # graphcode Derive Macros
//!
//! This crate provides the procedural macros for `graphcode`. It automates the implementation
//! of `Archivable` and `ArchiveType` for plain structs.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitInt, LitStr, parse_macro_input};

/// Derives `Archivable` and `ArchiveType`.
///
/// Every field is written in declaration order through `ArchiveValue`, and
/// fields of type `NodeId`, `Option<NodeId>` or collections of them are
/// reported as strong references to the trace pass.
///
/// Container attributes:
/// * `#[archive(name = "...")]`: class name (defaults to the struct name).
/// * `#[archive(version = N)]`: current class version (defaults to 0).
///   Records archived with a newer version are rejected.
///
/// Field attributes:
/// * `#[archive(conditional)]`: an `Option<NodeId>` written as a conditional
///   reference.
/// * `#[archive(skip)]`: not archived; decoded as `Default::default()`.
///
/// The struct must also implement `Debug`.
#[proc_macro_derive(Archivable, attributes(archive))]
pub fn derive_archivable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

// --- Internal Data Structures ---

#[derive(PartialEq, Eq)]
enum FieldMode {
    Value,
    Conditional,
    Skip,
}

struct ArchivedField {
    member: syn::Member,
    mode: FieldMode,
}

struct ContainerAttrs {
    name: Option<String>,
    version: u32,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Archivable cannot be derived for generic structs",
        ));
    }

    let data_struct = match input.data {
        Data::Struct(ds) => ds,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "Archivable only supports structs",
            ));
        }
    };

    let container = parse_container_attributes(&input.attrs)?;
    let class_name = container.name.unwrap_or_else(|| name.to_string());
    let version = container.version;

    let is_tuple = matches!(data_struct.fields, Fields::Unnamed(_));
    let is_unit = matches!(data_struct.fields, Fields::Unit);

    let mut fields = Vec::new();
    for (index, field) in data_struct.fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => syn::Member::Named(ident.clone()),
            None => syn::Member::Unnamed(syn::Index::from(index)),
        };
        fields.push(ArchivedField {
            member,
            mode: parse_field_attributes(&field.attrs)?,
        });
    }

    let trace_stmts = fields
        .iter()
        .filter(|f| f.mode == FieldMode::Value)
        .map(|f| {
            let member = &f.member;
            quote! { graphcode::value::ArchiveValue::trace_value(&self.#member, tracer); }
        });

    let encode_stmts = fields.iter().map(|f| {
        let member = &f.member;
        match f.mode {
            FieldMode::Value => quote! { archiver.write_value(&self.#member)?; },
            FieldMode::Conditional => {
                quote! { archiver.encode_conditional_object(self.#member)?; }
            }
            FieldMode::Skip => quote! {},
        }
    });

    let decode_exprs = fields.iter().map(|f| match f.mode {
        FieldMode::Value => quote! { unarchiver.read_value()? },
        FieldMode::Conditional => quote! { unarchiver.decode_object()? },
        FieldMode::Skip => quote! { ::std::default::Default::default() },
    });

    let construct = if is_unit {
        quote! { Self }
    } else if is_tuple {
        quote! { Self( #(#decode_exprs),* ) }
    } else {
        let members = fields.iter().map(|f| &f.member);
        quote! { Self { #(#members: #decode_exprs),* } }
    };

    Ok(quote! {
        impl graphcode::visitor::Archivable for #name {
            fn class_name(&self) -> &'static str {
                <Self as graphcode::visitor::ArchiveType>::CLASS_NAME
            }

            fn class_version(&self) -> u32 {
                <Self as graphcode::visitor::ArchiveType>::VERSION
            }

            #[allow(unused_variables)]
            fn visit(&self, tracer: &mut graphcode::visitor::Tracer<'_>) {
                #(#trace_stmts)*
            }

            #[allow(unused_variables)]
            fn encode(&self, archiver: &mut graphcode::archiver::Archiver<'_>) -> graphcode::Result<()> {
                #(#encode_stmts)*
                Ok(())
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }

        impl graphcode::visitor::ArchiveType for #name {
            const CLASS_NAME: &'static str = #class_name;
            const VERSION: u32 = #version;

            #[allow(unused_variables)]
            fn decode(
                unarchiver: &mut graphcode::unarchiver::Unarchiver<'_>,
                version: u32,
            ) -> graphcode::Result<Self> {
                graphcode::rt::check_version(Self::CLASS_NAME, version, Self::VERSION)?;
                Ok(#construct)
            }
        }
    })
}

/// Parses `#[archive(name = "...", version = N)]` on the struct.
fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs {
        name: None,
        version: 0,
    };

    for attr in attrs {
        if attr.path().is_ident("archive") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    parsed.name = Some(s.value());
                    return Ok(());
                }

                if meta.path.is_ident("version") {
                    let n: LitInt = meta.value()?.parse()?;
                    parsed.version = n.base10_parse()?;
                    return Ok(());
                }
                Err(meta.error("Unknown archive attribute key. Supported: name, version"))
            })?;
        }
    }
    Ok(parsed)
}

/// Parses `#[archive(conditional)]` or `#[archive(skip)]` on a field.
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldMode> {
    let mut mode = FieldMode::Value;

    for attr in attrs {
        if attr.path().is_ident("archive") {
            attr.parse_nested_meta(|meta| {
                let next = if meta.path.is_ident("conditional") {
                    FieldMode::Conditional
                } else if meta.path.is_ident("skip") {
                    FieldMode::Skip
                } else {
                    return Err(meta.error(
                        "Unknown archive field attribute. Supported: conditional, skip",
                    ));
                };
                if mode != FieldMode::Value && mode != next {
                    return Err(meta.error("conditional and skip are mutually exclusive"));
                }
                mode = next;
                Ok(())
            })?;
        }
    }
    Ok(mode)
}
