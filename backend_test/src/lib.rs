use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type, TypePath,
};

/// Run an asynchronous test against a fresh MongoDB database, injecting
/// dependencies and dropping the database however the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], and [`crate::model::mongodb::Coll<T>`].
///
/// The generated test is ignored by default since it needs the server named
/// by `db_uri`; run it with `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(
            TokenStream2::from(args).span(),
            "`backend_test` takes no arguments",
        )
        .into_compile_error()
        .into();
    }
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let injections = match injections(&item_fn.sig) {
        Ok(injections) => injections,
        Err(err) => return err.into_compile_error().into(),
    };
    let test_args = injections.iter().map(Injection::argument);
    let collections = injections.iter().filter_map(Injection::collection);

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        #[ignore = "requires a running MongoDB server"]
        fn #name() {
            async fn setup() -> (rocket::local::asynchronous::Client, mongodb::Database) {
                let db_client = crate::db_client().await;
                let db_name = crate::database();
                let db = db_client.database(&db_name);
                crate::model::mongodb::ensure_indexes_exist(&db).await.unwrap();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_db(db_client, &db_name),
                )
                .await
                .unwrap();
                (rocket_client, db)
            }

            #item_fn

            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // The test body runs on its own runtime inside `catch_unwind`, so
            // setup and cleanup need a separate one.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, db) = outer_runtime.block_on(setup());

            // Mutexes carry the `!UnwindSafe` values into the closure.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(#collections)*

                runtime.block_on(#new_name(#(#test_args),*));
            });

            outer_runtime.block_on(cleanup(db));

            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// One parameter of the test function.
enum Injection {
    Client,
    Database,
    Collection { ident: Ident, doc_type: TypePath },
}

impl Injection {
    /// The expression passed for this parameter.
    fn argument(&self) -> TokenStream2 {
        match self {
            Self::Client => quote! { rocket_client },
            Self::Database => quote! { db.clone() },
            Self::Collection { ident, .. } => quote! { #ident },
        }
    }

    /// The binding a collection parameter needs before the call.
    fn collection(&self) -> Option<TokenStream2> {
        match self {
            Self::Collection { ident, doc_type } => Some(quote! {
                let #ident = crate::model::mongodb::Coll::<#doc_type>::from_db(&db);
            }),
            _ => None,
        }
    }
}

/// Ensure the wrapped test is async, and work out what each parameter needs.
fn injections(sig: &Signature) -> Result<Vec<Injection>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injections = Vec::new();
    for input in &sig.inputs {
        let injection = match input {
            FnArg::Typed(pat_type) => match (&*pat_type.pat, &*pat_type.ty) {
                (Pat::Ident(pat_ident), Type::Path(type_path)) => {
                    classify(&pat_ident.ident, type_path)
                }
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };
        let Some(injection) = injection else {
            return Err(syn::Error::new(
                input.span(),
                "Expected one of `client: Client`, `db: Database` or `collection: Coll<T>`",
            ));
        };

        let duplicate = injections.iter().any(|existing| {
            matches!(
                (existing, &injection),
                (Injection::Client, Injection::Client) | (Injection::Database, Injection::Database)
            )
        });
        if duplicate {
            return Err(syn::Error::new(
                input.span(),
                "Test cannot accept more than one `Client` or `Database`",
            ));
        }
        injections.push(injection);
    }
    Ok(injections)
}

fn classify(ident: &Ident, type_path: &TypePath) -> Option<Injection> {
    let last = type_path.path.segments.last()?;
    if last.ident == "Client" {
        return Some(Injection::Client);
    }
    if last.ident == "Database" {
        return Some(Injection::Database);
    }
    if last.ident != "Coll" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return None;
    };
    match generics.args.first()? {
        GenericArgument::Type(Type::Path(doc_type)) => Some(Injection::Collection {
            ident: ident.clone(),
            doc_type: doc_type.clone(),
        }),
        _ => None,
    }
}
