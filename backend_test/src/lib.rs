use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat,
    PathArguments, Signature, Type,
};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `Arc<crate::store::MemoryStore>` (the store backing the client), and
/// [`rocket::http::Header`], an `Authorization` header for a fresh member.
/// The header needs a role argument: `#[backend_test(admin)]`,
/// `#[backend_test(officer)]`, `#[backend_test(member)]` or
/// `#[backend_test(auditor)]`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let role = parse_macro_input!(args as Option<Ident>);

    // Extract type information and reject invalid function signatures.
    let (test_args, wants_header) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Pick the role for the injected header.
    let role_variant = match role {
        Some(role) => match role.to_string().as_str() {
            "admin" => quote! { Admin },
            "officer" => quote! { Officer },
            "member" => quote! { Member },
            "auditor" => quote! { Auditor },
            _ => {
                return syn::Error::new(
                    role.span(),
                    "Expected one of `admin`, `officer`, `member` or `auditor`",
                )
                .into_compile_error()
                .into();
            }
        },
        None if wants_header => {
            return syn::Error::new(
                item_fn.sig.span(),
                "A `Header` can only be injected when a role is given, e.g. `#[backend_test(admin)]`",
            )
            .into_compile_error()
            .into();
        }
        None => quote! { Member },
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                std::sync::Arc<crate::store::MemoryStore>,
                rocket::http::Header<'static>,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["elections_backend"],
                    None,
                    None,
                );

                let store = std::sync::Arc::new(crate::store::MemoryStore::new());
                let config = crate::config::Config::example();

                // Register the caller as a member with the requested role.
                let caller = crate::model::db::member::Member::new(
                    Some("Head Office"),
                    crate::model::common::role::Role::#role_variant,
                );
                store.add_member(caller.clone()).await;
                let header = crate::model::api::auth::Claims::for_member(&caller, chrono::Duration::hours(1))
                    .bearer_header(&config);

                let stores = crate::store::Stores::in_memory(store.clone());
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_stores(stores, config))
                    .await
                    .unwrap();

                (rocket_client, store, header)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store, header) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
/// Also reports whether an auth header was requested.
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, bool), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut has_header = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let last = type_path.path.segments.last().unwrap();
                    if last.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if last.ident == "Header" {
                        if has_header {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Header`",
                            ));
                        }
                        has_header = true;
                        args.push(quote! { header });
                        continue;
                    } else if last.ident == "Arc" && is_memory_store(&last.arguments) {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Arc<MemoryStore>`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: Arc<MemoryStore>` or `header_ident: Header<'static>`",
        ));
    }

    Ok((args, has_header))
}

/// Is this the `<MemoryStore>` of an `Arc<MemoryStore>`?
fn is_memory_store(arguments: &PathArguments) -> bool {
    if let PathArguments::AngleBracketed(generics) = arguments {
        if let Some(GenericArgument::Type(Type::Path(type_path))) = generics.args.first() {
            return type_path
                .path
                .segments
                .last()
                .map_or(false, |segment| segment.ident == "MemoryStore");
        }
    }
    false
}
