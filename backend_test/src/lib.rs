use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, PathArguments,
    Signature, Type,
};

/// Turn an async test into a Rocket async test running against in-process
/// services, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::model::store::Coll<T>`] and [`crate::model::storage::MemoryStorage`].
/// Every injected value shares the same underlying store and bucket.
///
/// `#[backend_test(user)]` also bootstraps the profile of the example user.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Work out what to inject and reject invalid function signatures.
    let injected = match check_sig(&item_fn.sig) {
        Ok(injected) => injected,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Create the example user's profile if needed.
    let maybe_user = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "user" => quote! {
            crate::bootstrap::create_profile(
                &crate::model::store::Coll::new(store.clone()),
                crate::model::user::EXAMPLE_USER_ID,
            )
            .await
            .unwrap();
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `user` or nothing")
                .into_compile_error()
                .into();
        }
        None => quote! {},
    };

    // Rewrite the test function.
    quote! {
        #[rocket::async_test]
        async fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(["wyr_backend"], None, None);

            // Set up the services.
            let store: crate::model::store::Store =
                std::sync::Arc::new(crate::model::store::MemoryStore::new());
            let storage = crate::model::storage::MemoryStorage::new("test-bucket");
            let verifier = crate::model::auth::testing::verifier();
            #[allow(unused_variables)]
            let rocket_client = rocket::local::asynchronous::Client::tracked(
                crate::rocket_for_services(
                    store.clone(),
                    verifier,
                    std::sync::Arc::new(storage.clone()),
                ),
            )
            .await
            .unwrap();

            #maybe_user

            #new_name(#(#injected),*).await;
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and build the expression injected for
/// each of its parameters, rejecting unknown parameters.
fn check_sig(sig: &Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut injected = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Type::Path(type_path) = &*pat_type.ty {
                // Valid as the last path segment for any type is itself.
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        injected.push(quote! { rocket_client });
                        continue;
                    } else if segment.ident == "MemoryStorage" {
                        injected.push(quote! { storage.clone() });
                        continue;
                    } else if segment.ident == "Coll" {
                        if let PathArguments::AngleBracketed(generics) = &segment.arguments {
                            if let Some(GenericArgument::Type(record)) = generics.args.first() {
                                injected.push(quote! {
                                    crate::model::store::Coll::<#record>::new(store.clone())
                                });
                                continue;
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `storage_ident: MemoryStorage` or `collection_ident: Coll<T>`",
        ));
    }

    Ok(injected)
}
