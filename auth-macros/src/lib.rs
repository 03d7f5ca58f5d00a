// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Procedural macros for creating routes protected by OAuth2 scope checks.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, punctuated::Punctuated, Expr, ItemFn, Lit, Token};

/// Attribute macro for creating protected GET routes with scope checking.
///
/// This macro automatically adds bearer-token validation and scope checking
/// to Rocket route handlers. If the presented access token doesn't carry the
/// required scope, it returns HTTP 403 Forbidden. The macro uses
/// `rocket::Either` to handle both success and error responses properly.
///
/// # How it works
///
/// 1. **Automatic `ScopedBearer` injection**: if `ScopedBearer` is not in
///    the function signature, the macro adds it as the first parameter.
/// 2. **Scope checking**: validates that the presented access token carries
///    the required scope.
/// 3. **Type-safe returns**: uses `rocket::Either<Forbidden, T>` to return
///    either a 403 error or the original function's return type.
/// 4. **Bearer access**: the `bearer` variable is available in the function
///    scope as a `crate::server::guards::ScopedBearer`.
///
/// # Syntax
///
/// ```rust,ignore
/// #[protect_scope("/path", "scope:name")]
/// fn handler_name() -> SomeResponse {
///     // Your handler code here
///     // The 'bearer' variable is automatically available
/// }
/// ```
///
/// # Examples
///
/// ## Simple protected route (automatic bearer injection)
/// ```rust,ignore
/// #[protect_scope("/admin/clients", "admin")]
/// fn list_clients() -> Json<Vec<ClientSummary>> {
///     // The macro automatically injects: bearer: ScopedBearer
///     // and checks for the "admin" scope
///     Json(vec![])
/// }
/// ```
///
/// ## Explicit bearer parameter
/// ```rust,ignore
/// #[protect_scope("/api/data", "read:data")]
/// fn get_data(bearer: ScopedBearer) -> Json<DataResponse> {
///     Json(DataResponse { subject: bearer.claims.sub.clone() })
/// }
/// ```
///
/// # Return Type
///
/// The macro transforms the function to return:
/// ```rust,ignore
/// rocket::Either<rocket::response::status::Forbidden<&'static str>, OriginalReturnType>
/// ```
///
/// - **Left**: 403 Forbidden with "insufficient scope" if the scope check fails
/// - **Right**: the original function's return value if the scope check passes
///
/// # HTTP Responses
///
/// | Condition | Response | Description |
/// |-----------|-------------|-------------|
/// | Missing/invalid token | 401 Unauthorized | Handled by `ScopedBearer` guard |
/// | Valid token, missing scope | 403 Forbidden | Returned by the macro |
/// | Valid token, scope present | Original response | Function executes normally |
#[proc_macro_attribute]
pub fn protect_scope(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Expr, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    let (path, scope) = match parse_protect_args(&args) {
        Ok((p, scope)) => (p, scope),
        Err(err) => {
            return syn::Error::new_spanned(&input_fn, err)
                .to_compile_error()
                .into()
        }
    };

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let fn_block = &input_fn.block;
    let fn_inputs = &input_fn.sig.inputs;
    let fn_output = &input_fn.sig.output;
    let fn_attrs = &input_fn.attrs;

    let return_type = match fn_output {
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ty) => quote! { #ty },
    };

    let has_bearer_param = fn_inputs.iter().any(|arg| {
        if let syn::FnArg::Typed(pat_type) = arg {
            if let syn::Type::Path(type_path) = &*pat_type.ty {
                return type_path
                    .path
                    .segments
                    .last()
                    .map(|seg| seg.ident == "ScopedBearer")
                    .unwrap_or(false);
            }
        }
        false
    });

    let expanded = if has_bearer_param {
        quote! {
            #(#fn_attrs)*
            #[rocket::get(#path)]
            #fn_vis fn #fn_name(#fn_inputs) -> rocket::Either<rocket::response::status::Forbidden<&'static str>, #return_type> {
                if !bearer.has_scope(#scope) {
                    return rocket::Either::Left(rocket::response::status::Forbidden("insufficient scope"));
                }

                rocket::Either::Right(#fn_block)
            }
        }
    } else {
        quote! {
            #(#fn_attrs)*
            #[rocket::get(#path)]
            #fn_vis fn #fn_name(
                bearer: crate::server::guards::ScopedBearer,
                #fn_inputs
            ) -> rocket::Either<rocket::response::status::Forbidden<&'static str>, #return_type> {
                if !bearer.has_scope(#scope) {
                    return rocket::Either::Left(rocket::response::status::Forbidden("insufficient scope"));
                }

                rocket::Either::Right(#fn_block)
            }
        }
    };

    expanded.into()
}

/// Parse the arguments for the `protect_scope` macro.
fn parse_protect_args(args: &Punctuated<Expr, Token![,]>) -> Result<(String, String), String> {
    if args.len() != 2 {
        return Err("protect_scope requires exactly 2 arguments: path and scope".to_string());
    }

    let path = match &args[0] {
        Expr::Lit(expr_lit) => {
            if let Lit::Str(lit_str) = &expr_lit.lit {
                lit_str.value()
            } else {
                return Err("First argument (path) must be a string literal".to_string());
            }
        }
        _ => return Err("First argument (path) must be a string literal".to_string()),
    };

    let scope = match &args[1] {
        Expr::Lit(expr_lit) => {
            if let Lit::Str(lit_str) = &expr_lit.lit {
                lit_str.value()
            } else {
                return Err("Second argument (scope) must be a string literal".to_string());
            }
        }
        _ => return Err("Second argument (scope) must be a string literal".to_string()),
    };

    Ok((path, scope))
}
