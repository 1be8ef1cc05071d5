//! Attribute macros for `volley` data types.
//!
//! Metrics, aggregates and reports all travel through channels, get serialized by
//! reporters and are compared in tests, so they share one set of derives. These
//! attributes apply that set and, for metrics, register the marker trait.
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct};

extern crate proc_macro;

fn data_derives(ast: &ItemStruct) -> proc_macro2::TokenStream {
    quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast
    }
}

/// Marks a struct as a single observation produced by one dispatched request.
///
/// Expects `Metric` to be in scope at the call site.
#[proc_macro_attribute]
pub fn metric(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    let ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let data = data_derives(&ast);

    let expanded = quote! {
        #data

        impl #impl_generics Metric for #ident #ty_generics #where_clause {}
    };

    TokenStream::from(expanded)
}

/// Derives the data traits an `Aggregate` needs. The trait impl itself is
/// written by hand since it carries the folding logic.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    TokenStream::from(data_derives(&ast))
}

/// Derives the data traits for a finalized report or one of its sections.
#[proc_macro_attribute]
pub fn report(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as ItemStruct);
    TokenStream::from(data_derives(&ast))
}
