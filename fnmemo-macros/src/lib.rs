use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, ItemFn, Pat, ReturnType, Type};

/// Memoize a free function.
///
/// Results are kept in a thread-local store keyed by a tuple of the cloned
/// arguments, one store per decorated function. A `<name>_cache_len()`
/// function is generated next to it. When the return type is a `Result`,
/// only `Ok` payloads are stored, through `fnmemo::MemoOutput`.
#[proc_macro_attribute]
pub fn memoize(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = TokenStream2::from(attr);
        return syn::Error::new_spanned(attr, "#[memoize] takes no arguments")
            .to_compile_error()
            .into();
    }

    let input_fn = parse_macro_input!(item as ItemFn);
    match expand(input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let vis = &input_fn.vis;
    let sig = &input_fn.sig;
    let block = &input_fn.block;
    let attrs = &input_fn.attrs;
    let fn_name = &sig.ident;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[memoize] does not support async functions; use fnmemo::AsyncMemoized",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[memoize] does not support generic functions",
        ));
    }

    let mut arg_names = Vec::new();
    let mut arg_types = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[memoize] only supports free functions",
                ));
            }
            FnArg::Typed(pat_type) => {
                let ident = match &*pat_type.pat {
                    Pat::Ident(pat_ident) => &pat_ident.ident,
                    other => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "#[memoize] arguments must be plain identifiers",
                        ));
                    }
                };
                if let Type::Reference(reference) = &*pat_type.ty {
                    return Err(syn::Error::new_spanned(
                        reference,
                        "#[memoize] arguments must be owned values",
                    ));
                }
                arg_names.push(ident.clone());
                arg_types.push((*pat_type.ty).clone());
            }
        }
    }

    let (output, fallible) = match &sig.output {
        ReturnType::Default => (quote! { () }, false),
        ReturnType::Type(_, ty) => (quote! { #ty }, is_result(ty)),
    };

    let cache_ident = format_ident!("__FNMEMO_CACHE_{}", fn_name.to_string().to_uppercase());
    let len_ident = format_ident!("{}_cache_len", fn_name);

    // For a `Result` only the `Ok` payload is stored, so errors are handed
    // back without being cached and need not be `Clone`.
    let (stored, hit, store) = if fallible {
        (
            quote! { <#output as ::fnmemo::MemoOutput>::Stored },
            quote! { <#output as ::fnmemo::MemoOutput>::from_stored(value) },
            quote! {
                if let ::std::option::Option::Some(value) =
                    ::fnmemo::MemoOutput::stored(&__fnmemo_result)
                {
                    #cache_ident.with(|cache| {
                        cache.borrow_mut().insert(__fnmemo_key, value);
                    });
                }
                __fnmemo_result
            },
        )
    } else {
        (
            quote! { #output },
            quote! { value },
            quote! {
                #cache_ident.with(|cache| {
                    ::std::clone::Clone::clone(
                        cache.borrow_mut().insert(__fnmemo_key, __fnmemo_result),
                    )
                })
            },
        )
    };

    Ok(quote! {
        ::std::thread_local! {
            static #cache_ident: ::std::cell::RefCell<
                ::fnmemo::CacheStore<(#(#arg_types,)*), #stored>
            > = ::std::cell::RefCell::new(::fnmemo::CacheStore::new());
        }

        /// Number of results cached for the calling thread.
        #[allow(dead_code)]
        #vis fn #len_ident() -> usize {
            #cache_ident.with(|cache| cache.borrow().len())
        }

        #(#attrs)*
        #vis #sig {
            let __fnmemo_key = (#(::std::clone::Clone::clone(&#arg_names),)*);

            let __fnmemo_hit = #cache_ident.with(|cache| {
                cache.borrow().get(&__fnmemo_key).cloned()
            });
            if let ::std::option::Option::Some(value) = __fnmemo_hit {
                return #hit;
            }

            // The borrow is released while the body runs so recursive calls
            // can use the same store.
            let __fnmemo_result: #output = (move || -> #output #block)();

            #store
        }
    })
}

/// Whether `ty` names a `Result`, including aliases such as `io::Result<T>`.
fn is_result(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "Result")
            .unwrap_or(false),
        _ => false,
    }
}
