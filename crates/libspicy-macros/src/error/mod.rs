//! Implementation of the `#[derive(SpicyError)]` macro.
//!
//! The derive generates a `SpicyErrorTrait` implementation from attributes on
//! an error struct or enum:
//!
//! - `#[source_code]` marks the field holding the offending source snippet.
//! - `#[label("message")]` marks a `Range<usize>` field to be reported as a
//!   labeled span; the message may interpolate sibling fields with `{field}`.
//! - `#[label(collection)]` marks a `Vec<LabeledSpan>` field whose entries are
//!   all reported.
//! - `#[help]` marks a field whose `Display` output becomes the help text.
//! - `#[errors]` marks a collection of nested errors.
//! - `#[reference]` marks a field holding a related error to chain.
//! - `#[diagnostic(code("…"), help("…"), transparent)]` on the type or an
//!   enum variant sets the error code and default help, or delegates the whole
//!   diagnostic to the variant's single field.
//!
//! Enum variants holding a boxed payload struct are normally declared
//! `#[diagnostic(transparent)]` so that all diagnostic data comes from the
//! payload; this mirrors how `thiserror`'s `#[error(transparent)]` treats the
//! `Display` impl.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DataEnum, DataStruct, DeriveInput, Field, Fields, FieldsNamed, Ident, LitStr, Variant};

/// Parsed form of a `#[diagnostic(...)]` attribute
#[derive(deluxe::ExtractAttributes, deluxe::ParseMetaItem, Debug, Default)]
#[deluxe(attributes(diagnostic))]
struct Diagnostic {
    /// Optional error code identifier (e.g. `spicy::error::import_not_found`)
    #[deluxe(default)]
    code: Option<String>,

    /// Optional default help text for this error type
    #[deluxe(default)]
    help: Option<String>,

    /// Whether this variant delegates its diagnostics to its single field
    #[deluxe(default)]
    transparent: bool,
}

/// How a `#[label]` attribute applies to its field
enum LabelKind {
    /// A single labeled range with a (possibly interpolated) message
    Single(String),
    /// A `Vec<LabeledSpan>` collection reported verbatim
    Collection,
}

fn parse_label(field: &Field) -> Option<LabelKind> {
    let attr = field.attrs.iter().find(|attr| attr.path().is_ident("label"))?;
    match attr.parse_args::<LitStr>() {
        Ok(message) => Some(LabelKind::Single(message.value())),
        // Anything that is not a bare string literal is the collection form,
        // optionally followed by an (ignored) message.
        Err(_) => Some(LabelKind::Collection),
    }
}

/// Splits an interpolated label message into a format string and the field
/// expressions it references. `"expected {a}, found {b}"` becomes
/// `("expected {}, found {}", [a, b])`.
fn split_format(message: &str) -> (String, Vec<Ident>) {
    let mut out = String::new();
    let mut args = Vec::new();
    let mut read = message;

    while let Some(start) = read.find('{') {
        let Some(end) = read.find('}') else { panic!("unterminated '{{' in label message") };
        out.push_str(&read[..start]);
        out.push_str("{}");
        args.push(format_ident!("{}", &read[start + 1..end]));
        read = &read[end + 1..];
    }

    out.push_str(read);
    (out, args)
}

/// Generates the expression for one labeled field. `accessor` maps a field
/// identifier to the expression that reaches it (`self.x` for structs, the
/// bound pattern name for enum variants).
fn label_expr(field: &Field, kind: &LabelKind, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    let name = field.ident.as_ref().expect("labeled fields must be named");
    let position = accessor(name);

    match kind {
        LabelKind::Single(message) => {
            let (fmt, arg_names) = split_format(message);
            let args = arg_names.iter().map(|arg| {
                let access = accessor(arg);
                quote! { #access.to_string() }
            });
            quote! {
                libspicy_macros_core::traits::LabelField {
                    label: format!(#fmt, #(#args),*),
                    position: #position.clone(),
                }
            }
        }
        LabelKind::Collection => quote! {
            // Flattened below; a collection contributes many label fields.
            #position.iter().map(|item| libspicy_macros_core::traits::LabelField {
                label: item.label.clone(),
                position: item.span.clone(),
            })
        },
    }
}

/// Builds the `labels()` body for a set of named fields
fn labels_body(fields: &FieldsNamed, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    let mut singles = Vec::new();
    let mut collections = Vec::new();

    for field in fields.named.iter() {
        match parse_label(field) {
            Some(kind @ LabelKind::Single(_)) => singles.push(label_expr(field, &kind, accessor)),
            Some(kind @ LabelKind::Collection) => collections.push(label_expr(field, &kind, accessor)),
            None => {}
        }
    }

    if singles.is_empty() && collections.is_empty() {
        return quote!(None);
    }

    quote! {
        {
            let mut labels: Vec<libspicy_macros_core::traits::LabelField> = vec![#(#singles),*];
            #( labels.extend(#collections); )*
            Some(labels)
        }
    }
}

fn source_code_body(fields: &FieldsNamed, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    for field in fields.named.iter() {
        if field.attrs.iter().any(|attr| attr.path().is_ident("source_code")) {
            let access = accessor(field.ident.as_ref().expect("source_code fields must be named"));
            return quote!( Some(Box::new(#access.clone())) );
        }
    }
    quote!(None)
}

fn help_body(fields: &FieldsNamed, diagnostic: &Diagnostic, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    if let Some(help) = diagnostic.help.as_ref() {
        return quote!( Some(Box::new(#help.to_string())) );
    }

    for field in fields.named.iter() {
        if field.attrs.iter().any(|attr| attr.path().is_ident("help")) {
            let access = accessor(field.ident.as_ref().expect("help fields must be named"));
            return quote!( Some(Box::new(#access.clone())) );
        }
    }
    quote!(None)
}

fn errors_body(fields: &FieldsNamed, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    for field in fields.named.iter() {
        if field.attrs.iter().any(|attr| attr.path().is_ident("errors")) {
            let access = accessor(field.ident.as_ref().expect("errors fields must be named"));
            return quote! {
                Some(std::boxed::Box::new(#access.iter().map(|x| -> &(dyn libspicy_macros_core::traits::SpicyErrorTrait) { &*x })))
            };
        }
    }
    quote!(None)
}

fn references_body(fields: &FieldsNamed, accessor: &dyn Fn(&Ident) -> TokenStream2) -> TokenStream2 {
    let mut references = Vec::new();
    for field in fields.named.iter() {
        if field.attrs.iter().any(|attr| attr.path().is_ident("reference")) {
            let access = accessor(field.ident.as_ref().expect("reference fields must be named"));
            references.push(quote! { Box::new(&#access as &dyn libspicy_macros_core::traits::SpicyErrorTrait) });
        }
    }

    match references.is_empty() {
        true => quote!(None),
        false => quote!( Some(vec![#(#references),*]) ),
    }
}

fn error_code_body(diagnostic: &Diagnostic) -> TokenStream2 {
    match diagnostic.code.as_ref() {
        Some(code) => quote!( Some(Box::new(#code.to_string())) ),
        None => quote!(None),
    }
}

/// Generates the trait implementation for a struct with named fields
fn build_struct(name: Ident, diagnostic: Diagnostic, data: DataStruct) -> TokenStream {
    let Fields::Named(fields) = &data.fields else {
        return TokenStream::from(
            syn::Error::new(name.span(), "only structs with named fields can derive `SpicyError`").to_compile_error(),
        );
    };

    let accessor = |ident: &Ident| quote!( self.#ident );
    let labels = labels_body(fields, &accessor);
    let source_code = source_code_body(fields, &accessor);
    let help = help_body(fields, &diagnostic, &accessor);
    let errors = errors_body(fields, &accessor);
    let references = references_body(fields, &accessor);
    let error_code = error_code_body(&diagnostic);

    TokenStream::from(quote! {
        impl libspicy_macros_core::traits::SpicyErrorTrait for #name {
            fn labels(&self) -> Option<Vec<libspicy_macros_core::traits::LabelField>> { #labels }
            fn references<'a>(&'a self) -> Option<Vec<Box<&'a dyn libspicy_macros_core::traits::SpicyErrorTrait>>> { #references }
            fn errors<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn libspicy_macros_core::traits::SpicyErrorTrait> + 'a>> { #errors }
            fn source_code(&self) -> Option<Box<libspicy_macros_core::SourceCode>> { #source_code }
            fn error_code(&self) -> Option<Box<dyn std::fmt::Display>> { #error_code }
            fn help(&self) -> Option<Box<dyn std::fmt::Display>> { #help }
        }
    })
}

/// The six trait methods generated per enum variant
const METHODS: [&str; 6] = ["labels", "references", "errors", "source_code", "error_code", "help"];

/// Generates one match arm per variant for the given method
fn variant_arm(enum_name: &Ident, variant: &mut Variant, method: &str) -> TokenStream2 {
    let variant_name = variant.ident.clone();
    let diagnostic: Diagnostic = deluxe::extract_attributes(variant).unwrap_or_default();
    let method_ident = format_ident!("{method}");

    if diagnostic.transparent {
        return quote! { #enum_name::#variant_name(data) => data.#method_ident() };
    }

    match &variant.fields {
        Fields::Named(fields) => {
            let bound = fields.named.iter().map(|field| field.ident.clone().expect("named field"));
            let accessor = |ident: &Ident| quote!( #ident );
            let body = match method {
                "labels" => labels_body(fields, &accessor),
                "references" => references_body(fields, &accessor),
                "errors" => errors_body(fields, &accessor),
                "source_code" => source_code_body(fields, &accessor),
                "error_code" => error_code_body(&diagnostic),
                "help" => help_body(fields, &diagnostic, &accessor),
                _ => unreachable!("unknown trait method"),
            };
            quote! { #[allow(unused_variables)] #enum_name::#variant_name { #(#bound),* } => #body }
        }
        // Tuple and unit variants only carry type-level diagnostics.
        Fields::Unnamed(_) | Fields::Unit => {
            let body = match method {
                "error_code" => error_code_body(&diagnostic),
                "help" => match diagnostic.help.as_ref() {
                    Some(help) => quote!( Some(Box::new(#help.to_string())) ),
                    None => quote!(None),
                },
                _ => quote!(None),
            };
            quote! { #enum_name::#variant_name { .. } => #body }
        }
    }
}

/// Generates the trait implementation for an enum
fn build_enum(name: Ident, data: DataEnum) -> TokenStream {
    let mut bodies = Vec::new();
    for method in METHODS {
        let arms = data
            .variants
            .iter()
            .map(|variant| variant_arm(&name, &mut variant.clone(), method))
            .collect::<Vec<_>>();
        bodies.push(quote!( match self { #(#arms),* } ));
    }

    let [labels, references, errors, source_code, error_code, help]: [TokenStream2; 6] =
        bodies.try_into().expect("one body per method");

    TokenStream::from(quote! {
        impl libspicy_macros_core::traits::SpicyErrorTrait for #name {
            fn labels(&self) -> Option<Vec<libspicy_macros_core::traits::LabelField>> { #labels }
            fn references<'a>(&'a self) -> Option<Vec<Box<&'a dyn libspicy_macros_core::traits::SpicyErrorTrait>>> { #references }
            fn errors<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn libspicy_macros_core::traits::SpicyErrorTrait> + 'a>> { #errors }
            fn source_code(&self) -> Option<Box<libspicy_macros_core::SourceCode>> { #source_code }
            fn error_code(&self) -> Option<Box<dyn std::fmt::Display>> { #error_code }
            fn help(&self) -> Option<Box<dyn std::fmt::Display>> { #help }
        }
    })
}

/// Entry point for `#[derive(SpicyError)]`
pub fn spicy_error(input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as DeriveInput);

    let diagnostic: Diagnostic = deluxe::extract_attributes(&mut input).unwrap_or_default();

    match input.data {
        syn::Data::Struct(data) => build_struct(input.ident, diagnostic, data),
        syn::Data::Enum(data) => build_enum(input.ident, data),
        _ => TokenStream::from(
            syn::Error::new(input.ident.span(), "only structs and enums can derive `SpicyError`").to_compile_error(),
        ),
    }
}
