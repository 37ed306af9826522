use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{parse::Parser, parse_macro_input, DeriveInput};

/// Tags a struct as a context: appends a `context_info` field and implements `Identifiable`.
#[proc_macro_attribute]
pub fn context_macro(_attrs: TokenStream, item: TokenStream) -> TokenStream {
    context_impl(item, quote! {::treebench})
}

/// Same as [macro@context_macro], for use inside the treebench crate itself.
#[proc_macro_attribute]
pub fn context_internal(_attrs: TokenStream, item: TokenStream) -> TokenStream {
    context_impl(item, quote! {crate})
}

fn context_impl(item: TokenStream, root: proc_macro2::TokenStream) -> TokenStream {
    let mut ast = parse_macro_input!(item as DeriveInput);

    let name = ast.ident.clone();
    let generics = ast.generics.clone();
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    match &mut ast.data {
        syn::Data::Struct(ref mut struct_data) => {
            match &mut struct_data.fields {
                syn::Fields::Named(fields) => {
                    let field = syn::Field::parse_named
                        .parse2(quote! {context_info: #root::datastructures::ContextInfo});
                    match field {
                        Ok(field) => fields.named.push(field),
                        Err(err) => return err.to_compile_error().into(),
                    }
                }
                _ => {
                    return quote! {compile_error!("Contexts need named fields!");}.into();
                }
            }

            let ident_string = name.to_string();
            quote! {
                #ast

                impl #impl_generics #root::datastructures::Identifiable for #name #ty_generics #where_clause {
                    fn id(&self) -> #root::datastructures::Identifier {
                        self.context_info.id
                    }

                    fn name(&self) -> String {
                        (#ident_string).into()
                    }
                }
            }
            .into()
        }
        _ => quote! {compile_error!("Context can only be tagged on structs!");}.into(),
    }
}
