use heck::ToPascalCase;
use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, Attribute, Data, DeriveInput, Fields, LitInt,
    LitStr, Meta, Token,
};

extern crate proc_macro;

/// Implements `Message`, `Schema` and `FieldValue` for a struct.
///
/// ```ignore
/// #[derive(Default, Debug, Serialize, Deserialize, Message)]
/// #[message(name = "consul.pbservice.Weights")]
/// pub struct Weights {
///     pub passing: i32,
///     #[field(number = 2, name = "Warning")]
///     pub warning: i32,
/// }
/// ```
///
/// Fields without an explicit number continue after the highest number seen
/// so far. Names default to the PascalCase form of the Rust field name.
/// Fields marked `#[serde(skip)]` are not on the wire and get no descriptor.
#[proc_macro_derive(Message, attributes(message, field))]
pub fn message(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    expand_message(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `Enumeration` and `FieldValue` for a fieldless enum.
///
/// A variant is written as its declaration index, so explicit discriminants
/// are rejected rather than silently ignored.
#[proc_macro_derive(Enumeration, attributes(enumeration))]
pub fn enumeration(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    expand_enumeration(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_message(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let identity = type_name(&input.attrs, "message", input)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "`Message` can only be derived for structs",
        ));
    };

    let mut next_number = 1u32;
    let mut descriptors = Vec::new();
    for (index, field) in data.fields.iter().enumerate() {
        if serde_skipped(field)? {
            continue;
        }
        let options = FieldOptions::parse(&field.attrs)?;

        let number = options.number.unwrap_or(next_number);
        next_number = next_number.max(number.checked_add(1).ok_or_else(|| {
            syn::Error::new_spanned(field, "field number overflows u32")
        })?);

        let field_name = match (options.name, &field.ident) {
            (Some(name), _) => name,
            (None, Some(ident)) => ident
                .to_string()
                .trim_start_matches("r#")
                .to_pascal_case(),
            (None, None) => format!("Field{index}"),
        };

        let ty = &field.ty;
        descriptors.push(quote! {
            ::marshal::FieldDescriptor::of::<#ty>(#number, #field_name)
        });
    }

    Ok(quote! {
        impl #impl_generics ::marshal::Message for #name #ty_generics #where_clause {
            fn type_identity(&self) -> ::marshal::TypeIdentity {
                <Self as ::marshal::Schema>::IDENTITY
            }

            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<Self>()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync> {
                self
            }
        }

        impl #impl_generics ::marshal::Schema for #name #ty_generics #where_clause {
            const IDENTITY: ::marshal::TypeIdentity = ::marshal::TypeIdentity::new(#identity);

            fn fields() -> ::std::vec::Vec<::marshal::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }
        }

        impl #impl_generics ::marshal::FieldValue for #name #ty_generics #where_clause {
            fn kind() -> ::marshal::FieldKind {
                ::marshal::FieldKind::Message(<Self as ::marshal::Schema>::IDENTITY)
            }
        }
    })
}

fn expand_enumeration(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let identity = type_name(&input.attrs, "enumeration", input)?;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "`Enumeration` can only be derived for enums",
        ));
    };

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "`Enumeration` variants cannot carry data",
            ));
        }
        if let Some((_, discriminant)) = &variant.discriminant {
            return Err(syn::Error::new_spanned(
                discriminant,
                "`Enumeration` variants are encoded by declaration index, explicit discriminants are not supported",
            ));
        }
        variants.push(variant.ident.to_string());
    }

    Ok(quote! {
        impl #impl_generics ::marshal::Enumeration for #name #ty_generics #where_clause {
            const IDENTITY: ::marshal::TypeIdentity = ::marshal::TypeIdentity::new(#identity);
            const VARIANTS: &'static [&'static str] = &[#(#variants),*];
        }

        impl #impl_generics ::marshal::FieldValue for #name #ty_generics #where_clause {
            fn kind() -> ::marshal::FieldKind {
                ::marshal::FieldKind::Enum(<Self as ::marshal::Enumeration>::IDENTITY)
            }
        }
    })
}

/// Reads `#[<attr>(name = "...")]` off the type.
fn type_name(
    attrs: &[Attribute],
    attr_name: &str,
    input: &DeriveInput,
) -> syn::Result<LitStr> {
    let mut name = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident(attr_name)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error(format!("unsupported `{attr_name}` attribute, expected `name`")))
            }
        })?;
    }

    name.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            format!("missing `#[{attr_name}(name = \"package.Type\")]`"),
        )
    })
}

/// `#[serde(skip)]` drops the field from the encoding. One-sided skips would
/// desynchronize a positional encoding, so those are rejected.
fn serde_skipped(field: &syn::Field) -> syn::Result<bool> {
    let mut skipped = false;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            let path = meta.path();
            if path.is_ident("skip") {
                skipped = true;
            } else if path.is_ident("skip_serializing")
                || path.is_ident("skip_deserializing")
                || path.is_ident("skip_serializing_if")
            {
                return Err(syn::Error::new_spanned(
                    path,
                    "only `#[serde(skip)]` is supported on `Message` fields",
                ));
            }
        }
    }
    Ok(skipped)
}

#[derive(Default)]
struct FieldOptions {
    number: Option<u32>,
    name: Option<String>,
}

impl FieldOptions {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("field")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("number") {
                    options.number = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                    Ok(())
                } else if meta.path.is_ident("name") {
                    options.name = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported `field` attribute, expected `number` or `name`"))
                }
            })?;
        }
        Ok(options)
    }
}
