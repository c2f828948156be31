//! Procedural macros for turning functions into polymcp tools

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, token::Comma, Attribute, Expr, ExprLit, FnArg,
    GenericArgument, Ident, ItemFn, Lit, Meta, Pat, PathArguments, ReturnType, Type,
};

/// Attribute macro that exposes a function as a tool
///
/// The function's parameters become the fields of a generated input struct,
/// so the tool's JSON schema mirrors the signature. Descriptions are read
/// from the doc comment: the first paragraph describes the tool, and the
/// `# Arguments` section describes each parameter.
///
/// # Example
///
/// ```ignore
/// /// Add two numbers.
/// ///
/// /// # Arguments
/// ///
/// /// * `a` - First addend
/// /// * `b` - Second addend
/// #[tool]
/// fn add(a: i64, #[arg(default = 1)] b: i64) -> i64 {
///     a + b
/// }
/// ```
///
/// This generates a module `add_tool` containing:
/// - `NAME` and `DESCRIPTION` constants
/// - `AddInput`: the `Deserialize + JsonSchema` input struct
/// - `descriptor()`: the tool's `ToolDescriptor`
/// - `registration()`: a `ToolRegistration` for `ToolRegistry::register`
///
/// # Attributes
///
/// - `name`: (optional) Override the tool name (defaults to function name)
/// - `description`: (optional) Override the doc-comment description
///
/// Parameters may carry `#[arg(default = <expr>)]`; `Option<T>` parameters
/// are optional without it. The return type is either a serializable `T` or
/// `Result<T, E>` where `E: Display`.
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_args = parse_macro_input!(attr with Punctuated::<Meta, Comma>::parse_terminated);
    let input_fn = parse_macro_input!(item as ItemFn);

    match expand_tool(attr_args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct ToolParam {
    ident: Ident,
    ty: Type,
    description: Option<String>,
    default: Option<Expr>,
}

fn expand_tool(
    attr_args: Punctuated<Meta, Comma>,
    mut input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut description = None;
    let mut tool_name = None;

    for arg in attr_args {
        if let Meta::NameValue(nv) = arg {
            let value = match &nv.value {
                Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) => lit.value(),
                other => {
                    return Err(syn::Error::new_spanned(other, "expected a string literal"));
                }
            };
            if nv.path.is_ident("description") {
                description = Some(value);
            } else if nv.path.is_ident("name") {
                tool_name = Some(value);
            } else {
                return Err(syn::Error::new_spanned(nv.path, "unknown tool attribute"));
            }
        }
    }

    let sig = &input_fn.sig;
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "tool functions cannot be generic",
        ));
    }

    let fn_name = sig.ident.clone();
    let tool_name = tool_name.unwrap_or_else(|| fn_name.to_string());
    let docs = doc_lines(&input_fn.attrs);
    let description = description
        .or_else(|| summary(&docs))
        .unwrap_or_else(|| fn_name.to_string());
    let arg_docs = argument_docs(&docs);

    let mut params = Vec::new();
    for input in input_fn.sig.inputs.iter_mut() {
        let pat_type = match input {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "tool functions cannot take self",
                ));
            }
        };

        let ident = match pat_type.pat.as_ref() {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "tool parameters must be plain identifiers",
                ));
            }
        };

        if matches!(pat_type.ty.as_ref(), Type::Reference(_) | Type::ImplTrait(_)) {
            return Err(syn::Error::new_spanned(
                &pat_type.ty,
                "tool parameters must be owned, deserializable types",
            ));
        }

        // Take our `#[arg(...)]` attributes off the parameter
        let mut default = None;
        let mut kept = Vec::new();
        for attr in pat_type.attrs.drain(..) {
            if attr.path().is_ident("arg") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("default") {
                        default = Some(meta.value()?.parse::<Expr>()?);
                        Ok(())
                    } else {
                        Err(meta.error("unsupported arg attribute, expected `default`"))
                    }
                })?;
            } else {
                kept.push(attr);
            }
        }
        pat_type.attrs = kept;

        let name = ident.to_string();
        let description = arg_docs
            .iter()
            .find(|(arg, _)| arg == name.trim_start_matches("r#"))
            .map(|(_, text)| text.clone());

        params.push(ToolParam {
            ident,
            ty: (*pat_type.ty).clone(),
            description,
            default,
        });
    }

    let (output_ty, returns_result) = output_type(&input_fn.sig.output);
    let is_async = input_fn.sig.asyncness.is_some();

    let module_name = Ident::new(&format!("{}_tool", fn_name), fn_name.span());
    let input_name = Ident::new(
        &format!("{}Input", pascal_case(&fn_name.to_string())),
        Span::call_site(),
    );

    let mut fields = Vec::new();
    let mut default_fns = Vec::new();
    for param in &params {
        let ident = &param.ident;
        let ty = &param.ty;
        let doc = param.description.as_ref().map(|text| quote!(#[doc = #text]));

        let serde_default = match &param.default {
            Some(expr) => {
                let default_fn = Ident::new(
                    &format!("__default_{}", ident.to_string().trim_start_matches("r#")),
                    Span::call_site(),
                );
                let default_path = default_fn.to_string();
                default_fns.push(quote! {
                    fn #default_fn() -> #ty {
                        #expr
                    }
                });
                Some(quote!(#[serde(default = #default_path)]))
            }
            None => None,
        };

        fields.push(quote! {
            #doc
            #serde_default
            pub #ident: #ty
        });
    }

    let field_idents: Vec<&Ident> = params.iter().map(|param| &param.ident).collect();

    let call = if is_async {
        quote!(super::#fn_name(#(#field_idents),*).await)
    } else {
        quote!(super::#fn_name(#(#field_idents),*))
    };
    let call_result = if returns_result {
        call
    } else {
        quote!(::core::result::Result::<_, ::std::convert::Infallible>::Ok(#call))
    };

    let handler_body = if is_async {
        quote! {
            ::std::boxed::Box::pin(async move {
                let #input_name { #(#field_idents),* } = input;
                ::polymcp::toolkit::registry::into_output(#call_result)
            })
        }
    } else {
        quote! {
            let #input_name { #(#field_idents),* } = input;
            let output = ::polymcp::toolkit::registry::into_output(#call_result);
            ::std::boxed::Box::pin(async move { output })
        }
    };

    let output = quote! {
        #input_fn

        #[allow(dead_code, non_snake_case)]
        pub mod #module_name {
            use super::*;

            /// The name of this tool (use when registering)
            pub const NAME: &str = #tool_name;

            /// The description offered to models
            pub const DESCRIPTION: &str = #description;

            /// Input parameters, one field per function argument
            #[derive(::polymcp::__private::serde::Deserialize, ::polymcp::__private::schemars::JsonSchema)]
            #[serde(crate = "::polymcp::__private::serde")]
            #[schemars(crate = "::polymcp::__private::schemars")]
            pub struct #input_name {
                #(#fields,)*
            }

            #(#default_fns)*

            /// Get the ToolDescriptor for this tool
            pub fn descriptor() -> ::polymcp::toolkit::ToolDescriptor {
                ::polymcp::toolkit::create_tool_descriptor::<#input_name, #output_ty>(NAME, DESCRIPTION)
            }

            /// Get a complete ToolRegistration for one-step registration
            ///
            /// ```ignore
            /// registry.register(add_tool::registration())?;
            /// ```
            pub fn registration() -> ::polymcp::toolkit::ToolRegistration {
                let handler = |payload: ::polymcp::__private::serde_json::Value|
                    -> ::std::pin::Pin<::std::boxed::Box<dyn ::std::future::Future<
                        Output = ::core::result::Result<
                            ::polymcp::__private::serde_json::Value,
                            ::polymcp::toolkit::InvokeError,
                        >,
                    > + ::core::marker::Send>>
                {
                    let input = match ::polymcp::toolkit::registry::parse_input::<#input_name>(payload) {
                        ::core::result::Result::Ok(input) => input,
                        ::core::result::Result::Err(err) => {
                            return ::std::boxed::Box::pin(async move {
                                ::core::result::Result::<
                                    ::polymcp::__private::serde_json::Value,
                                    ::polymcp::toolkit::InvokeError,
                                >::Err(err)
                            });
                        }
                    };
                    #handler_body
                };

                ::polymcp::toolkit::ToolRegistration {
                    descriptor: descriptor(),
                    handler: ::std::boxed::Box::new(handler),
                }
            }
        }
    };

    Ok(output)
}

/// Collect the text of `///` doc comments, one entry per line
fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit { lit: Lit::Str(lit), .. }) => Some(lit.value()),
                _ => None,
            },
            _ => None,
        })
        .flat_map(|text| text.lines().map(|line| line.trim().to_string()).collect::<Vec<_>>())
        .collect()
}

/// First paragraph of the doc comment, joined into one line
fn summary(lines: &[String]) -> Option<String> {
    let paragraph: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .skip_while(|line| line.is_empty())
        .take_while(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    if paragraph.is_empty() {
        None
    } else {
        Some(paragraph.join(" "))
    }
}

/// Parameter descriptions from an `# Arguments` section
///
/// Accepts `* `name` - text`, `- `name`: text` and the same without backticks.
fn argument_docs(lines: &[String]) -> Vec<(String, String)> {
    let mut in_section = false;
    let mut docs = Vec::new();

    for line in lines {
        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim().to_ascii_lowercase();
            in_section = heading == "arguments" || heading == "args" || heading == "parameters";
            continue;
        }
        if !in_section {
            continue;
        }

        let Some(item) = line.strip_prefix('*').or_else(|| line.strip_prefix('-')) else {
            continue;
        };
        let item = item.trim();

        let (name, rest) = if let Some(quoted) = item.strip_prefix('`') {
            match quoted.split_once('`') {
                Some((name, rest)) => (name, rest),
                None => continue,
            }
        } else {
            match item.find(|c: char| c.is_whitespace() || c == ':') {
                Some(end) => item.split_at(end),
                None => continue,
            }
        };

        let text = rest
            .trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == ':')
            .trim();
        if !name.is_empty() && !text.is_empty() {
            docs.push((name.to_string(), text.to_string()));
        }
    }

    docs
}

/// The serialized result type, and whether the function returns `Result`
fn output_type(output: &ReturnType) -> (Type, bool) {
    let ty = match output {
        ReturnType::Default => return (syn::parse_quote!(()), false),
        ReturnType::Type(_, ty) => ty.as_ref(),
    };

    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Result" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(ok)) = args.args.first() {
                        return (ok.clone(), true);
                    }
                }
            }
        }
    }

    (ty.clone(), false)
}

fn pascal_case(name: &str) -> String {
    name.trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|line| line.trim().to_string()).collect()
    }

    #[test]
    fn test_summary_is_first_paragraph() {
        let docs = lines("Add two numbers\nand return the sum.\n\n# Arguments\n\n* `a` - First");
        assert_eq!(summary(&docs), Some("Add two numbers and return the sum.".to_string()));
    }

    #[test]
    fn test_summary_missing() {
        assert_eq!(summary(&lines("# Arguments\n* `a` - First")), None);
        assert_eq!(summary(&[]), None);
    }

    #[test]
    fn test_argument_docs_formats() {
        let docs = lines(
            "Summary\n\n# Arguments\n\n* `a` - First addend\n- `b`: Second addend\n* c - Third\n\n# Returns\n\n* `d` - ignored",
        );
        assert_eq!(
            argument_docs(&docs),
            vec![
                ("a".to_string(), "First addend".to_string()),
                ("b".to_string(), "Second addend".to_string()),
                ("c".to_string(), "Third".to_string()),
            ]
        );
    }

    #[test]
    fn test_output_type_unwraps_result() {
        let (ty, is_result) = output_type(&syn::parse_quote!(-> Result<i64, String>));
        assert!(is_result);
        assert_eq!(quote!(#ty).to_string(), "i64");

        let (ty, is_result) = output_type(&syn::parse_quote!(-> Vec<String>));
        assert!(!is_result);
        assert_eq!(quote!(#ty).to_string(), "Vec < String >");

        let (ty, _) = output_type(&ReturnType::Default);
        assert_eq!(quote!(#ty).to_string(), "()");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("get_weather"), "GetWeather");
        assert_eq!(pascal_case("add"), "Add");
        assert_eq!(pascal_case("r#type"), "Type");
    }
}
