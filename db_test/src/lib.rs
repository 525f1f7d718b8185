use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Run an asynchronous test against a real MongoDB and inject its [`mongodb::Database`].
///
/// Each test gets a scratch database named after it, with the store indexes
/// in place, from `crate::test_database`. The database is dropped whether
/// the test passes or panics; a panic is then rethrown.
///
/// The server is found through the `db_uri` setting, so these tests are
/// ignored by default. Run them with `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn db_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    if let Err(err) = check_sig(item_fn.sig.clone()) {
        return err.into_compile_error().into();
    }

    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        #[ignore = "needs a MongoDB server at `db_uri`"]
        fn #name() {
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["elections_backend"],
                None,
                None,
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let db = crate::test_database(stringify!(#name)).await;

                let result = rocket::futures::FutureExt::catch_unwind(
                    std::panic::AssertUnwindSafe(#new_name(db.clone())),
                )
                .await;

                db.drop(None).await.unwrap();

                if let Err(cause) = result {
                    std::panic::resume_unwind(cause);
                }
            });
        }
    }
    .into()
}

/// The test must be async and take exactly one `Database`.
fn check_sig(sig: Signature) -> Result<(), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }
    let inputs = sig.inputs;
    if inputs.len() != 1 {
        return Err(syn::Error::new(
            inputs.span(),
            "Test must accept exactly one `mongodb::Database`",
        ));
    }

    for input in &inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    let is_database = type_path
                        .path
                        .segments
                        .last()
                        .map_or(false, |segment| segment.ident == "Database");
                    if is_database {
                        continue;
                    }
                }
            }
        }
        return Err(syn::Error::new(
            input.span(),
            "Expected `db_ident: Database`",
        ));
    }

    Ok(())
}
