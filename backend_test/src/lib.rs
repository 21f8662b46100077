use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, token::Comma, FnArg, ItemFn, Pat,
    Signature, Type,
};

#[proc_macro_attribute]
/// Provides a [`rocket::local::asynchronous::Client`] and/or a `Service` to
/// the function and instruments it as a [`rocket::async_test`]. Each test
/// gets its own fresh, isolated in-memory backend, so unlike the original
/// MongoDB-backed fixture there is no external database to drop afterwards.
pub fn backend_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Reject invalid function signatures
    let args_used = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name
    let name = item_fn.sig.ident;
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let test_args = args_used.into_iter().collect::<Punctuated<_, Comma>>();

    quote! {
        #[rocket::async_test]
        async fn #name() {
            let service = crate::test_service();
            let rocket_client = rocket::local::asynchronous::Client::tracked(
                crate::build_for_service(service.clone())
            ).await.unwrap();

            #item_fn

            #new_name(#test_args).await;
        }
    }
    .into()
}

/// Ensure signature conforms to `async fn test_ident(client_ident: Client, service_ident: Service)`.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let inputs = sig.inputs;
    if inputs.len() > 2 {
        return Err(syn::Error::new(
            inputs.span(),
            "Test arguments must be a `rocket::local::asynchronous::Client` and/or a `Service`",
        ));
    }

    let mut has_client = false;
    let mut has_service = false;
    let mut args_used = vec![];

    for input in inputs.iter() {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = *pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        let raw_type_ident = type_ident.to_string();
                        match raw_type_ident.as_str() {
                            "Client" => {
                                if has_client {
                                    return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                                }
                                has_client = true;
                                args_used.push(quote! { rocket_client });
                                continue;
                            }
                            "Service" => {
                                if has_service {
                                    return Err(syn::Error::new(
                                        input.span(),
                                        "Test cannot accept more than one `Service`",
                                    ));
                                }
                                has_service = true;
                                args_used.push(quote! { service });
                                continue;
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `service_ident: Service`",
        ));
    }

    Ok(args_used)
}
