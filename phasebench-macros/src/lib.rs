//! PhaseBench Macros
//!
//! Procedural macros for driver registration.
//!
//! ## Macros
//!
//! - `#[phasebench::driver]` - Register a driver type under a library and class name

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{ItemStruct, parse_macro_input};

mod attr {
    use syn::meta::ParseNestedMeta;

    /// Get the attribute name as a string
    pub fn name(meta: &ParseNestedMeta) -> String {
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }

    /// Parse a string literal attribute: `attr = "value"`
    pub fn string(meta: &ParseNestedMeta) -> syn::Result<String> {
        let value: syn::LitStr = meta.value()?.parse()?;
        Ok(value.value())
    }

    /// Parse a string that must be a non-empty identifier-like name
    pub fn name_value(meta: &ParseNestedMeta, what: &str) -> syn::Result<String> {
        let value = string(meta)?;
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.contains(',') {
            return Err(meta.error(format!("{what} must be non-empty and must not contain ','")));
        }
        Ok(trimmed.to_string())
    }

    /// Create an unknown attribute error
    pub fn unknown(meta: &ParseNestedMeta, name: &str) -> syn::Error {
        meta.error(format!("unknown attribute: {}", name))
    }
}

/// Register a benchmark driver
///
/// The type must implement `BenchmarkDriver` and `Default`. A fresh
/// instance is built from `Default` for every (thread, run) pair.
///
/// # Example
///
/// ```ignore
/// // Registered as class "JsonCodec" in the library named after this crate
/// #[phasebench::driver]
/// #[derive(Default)]
/// struct JsonCodec { buf: Vec<u8> }
///
/// // Explicit library and class names
/// #[phasebench::driver(library = "codecs-v2", class = "json")]
/// #[derive(Default)]
/// struct JsonCodecV2 { buf: Vec<u8> }
/// ```
#[proc_macro_attribute]
pub fn driver(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let input = parse_macro_input!(item as ItemStruct);

    driver_impl(args, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn driver_impl(args: TokenStream2, input: ItemStruct) -> Result<TokenStream2, syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[driver] types cannot be generic",
        ));
    }

    let struct_name = &input.ident;
    let mut class = struct_name.to_string();
    let mut library: Option<String> = None;

    let parser = syn::meta::parser(|meta| {
        let name = attr::name(&meta);
        match name.as_str() {
            "class" => class = attr::name_value(&meta, "class")?,
            "library" => library = Some(attr::name_value(&meta, "library")?),
            _ => return Err(attr::unknown(&meta, &name)),
        }
        Ok(())
    });

    syn::parse::Parser::parse2(parser, args)?;

    let library_expr = match library {
        Some(lib) => quote! { #lib },
        None => quote! { env!("CARGO_CRATE_NAME") },
    };
    let ctor_name = format_ident!("__phasebench_new_{}", struct_name);

    Ok(quote! {
        #input

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #ctor_name() -> ::std::boxed::Box<dyn ::phasebench::BenchmarkDriver> {
            ::std::boxed::Box::new(<#struct_name as ::std::default::Default>::default())
        }

        ::phasebench::internal::inventory::submit! {
            ::phasebench::DriverDef {
                library: #library_expr,
                class: #class,
                create: #ctor_name,
                module_path: module_path!(),
                file: file!(),
                line: line!(),
            }
        }
    })
}
