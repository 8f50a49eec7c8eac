use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn, Pat, PatType, ReturnType, Type};

/// Turns a function into a composable.
///
/// By default the body runs inside a restartable group: state it reads
/// re-runs just this body when it changes. Parameters are captured and
/// cloned on every run, so they must be `Clone + 'static`, and the function
/// must return `()`.
///
/// `#[composable(no_restart)]` wraps the body in a plain positional group
/// instead. Such functions may return values and take `impl Trait`
/// parameters, but recompose only together with their caller.
#[proc_macro_attribute]
pub fn composable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_tokens = TokenStream2::from(attr);
    let mut restartable = true;
    if !attr_tokens.is_empty() {
        match syn::parse2::<Ident>(attr_tokens) {
            Ok(ident) if ident == "no_restart" => restartable = false,
            Ok(other) => {
                return syn::Error::new_spanned(other, "unsupported composable attribute")
                    .to_compile_error()
                    .into();
            }
            Err(err) => {
                return err.to_compile_error().into();
            }
        }
    }

    let mut func = parse_macro_input!(item as ItemFn);
    let mut param_info: Vec<(Ident, Box<Pat>, Box<Type>)> = Vec::new();

    for (index, arg) in func.sig.inputs.iter_mut().enumerate() {
        match arg {
            FnArg::Typed(PatType { pat, ty, .. }) => {
                let ident = Ident::new(&format!("__arg{}", index), Span::call_site());
                let original_pat = pat.clone();
                *pat = Box::new(syn::parse_quote! { #ident });
                param_info.push((ident, original_pat, ty.clone()));
            }
            FnArg::Receiver(receiver) => {
                return syn::Error::new_spanned(receiver, "composable functions cannot take self")
                    .to_compile_error()
                    .into();
            }
        }
    }

    let original_block = func.block.clone();
    let key_expr = quote! { remote_hooks_runtime::location_key(file!(), line!(), column!()) };
    let idents: Vec<&Ident> = param_info.iter().map(|(ident, _, _)| ident).collect();
    let rebinds: Vec<TokenStream2> = param_info
        .iter()
        .map(|(ident, pat, _)| quote! { let #pat = #ident; })
        .collect();

    let wrapped = if restartable {
        if let ReturnType::Type(_, ty) = &func.sig.output {
            return syn::Error::new_spanned(
                ty,
                "restartable composables return (); use #[composable(no_restart)] to return a value",
            )
            .to_compile_error()
            .into();
        }
        if let Some((_, _, ty)) = param_info
            .iter()
            .find(|(_, _, ty)| matches!(**ty, Type::ImplTrait(_)))
        {
            return syn::Error::new_spanned(
                ty,
                "impl Trait parameters cannot be captured for recomposition; use a generic or #[composable(no_restart)]",
            )
            .to_compile_error()
            .into();
        }
        quote!({
            let __params = (#(#idents,)*);
            remote_hooks_runtime::compose_restartable(#key_expr, move || {
                let (#(#idents,)*) = ::core::clone::Clone::clone(&__params);
                #(#rebinds)*
                #original_block
            });
        })
    } else {
        quote!({
            remote_hooks_runtime::with_group(#key_expr, move || {
                #(#rebinds)*
                #original_block
            })
        })
    };

    match syn::parse2(wrapped) {
        Ok(block) => func.block = Box::new(block),
        Err(err) => return err.to_compile_error().into(),
    }
    TokenStream::from(quote! { #func })
}
