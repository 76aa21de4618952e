//! Derive macros for polycbor's `Encode` and `Decode` traits.
//!
//! Field behavior is controlled with `#[cbor(...)]` attributes:
//!
//! - `rename = "name"` — use `name` as the map key.
//! - `omitempty` — drop the field when its value is empty for its kind.
//! - `skip` — never encode or decode the field.
//! - `keyasint` — parse the rename as an integer map key
//!   (`#[cbor(rename = "1", keyasint)]`).
//! - `embed` — promote the fields of a struct (or `Option<Box<struct>>`)
//!   member into this struct, document-embedding style.
//!
//! The container attribute `#[cbor(toarray)]` switches a struct to
//! positional array encoding in declaration order.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DataEnum, DataStruct, DeriveInput,
    Fields, GenericArgument, Generics, Ident, LitStr, PathArguments, Type,
};

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    omit_empty: bool,
    skip: bool,
    key_as_int: bool,
    embed: bool,
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("cbor") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                out.skip = true;
                return Ok(());
            }
            if meta.path.is_ident("omitempty") {
                out.omit_empty = true;
                return Ok(());
            }
            if meta.path.is_ident("keyasint") {
                out.key_as_int = true;
                return Ok(());
            }
            if meta.path.is_ident("embed") {
                out.embed = true;
                return Ok(());
            }
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
                return Ok(());
            }
            Err(meta.error("unsupported cbor attribute"))
        })?;
    }
    Ok(out)
}

fn parse_container_toarray(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut to_array = false;
    for attr in attrs {
        if !attr.path().is_ident("cbor") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("toarray") {
                to_array = true;
                return Ok(());
            }
            Err(meta.error("unsupported cbor container attribute"))
        })?;
    }
    Ok(to_array)
}

/// How an embedded member is stored.
#[derive(Clone, Copy, PartialEq)]
enum EmbedKind {
    Plain,
    Option,
    OptionBox,
}

fn generic_inner(ty: &Type, wrapper: &str) -> Option<Type> {
    let Type::Path(tp) = ty else { return None };
    let seg = tp.path.segments.last()?;
    if seg.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    let mut iter = args.args.iter();
    let Some(GenericArgument::Type(inner)) = iter.next() else {
        return None;
    };
    if iter.next().is_some() {
        return None;
    }
    Some(inner.clone())
}

fn embed_storage(ty: &Type) -> (EmbedKind, Type) {
    if let Some(inner) = generic_inner(ty, "Option") {
        if let Some(inner2) = generic_inner(&inner, "Box") {
            return (EmbedKind::OptionBox, inner2);
        }
        return (EmbedKind::Option, inner);
    }
    (EmbedKind::Plain, ty.clone())
}

fn type_mentions_ident(ty: &Type, ident: &Ident) -> bool {
    match ty {
        Type::Path(tp) => tp.path.segments.iter().any(|seg| {
            if seg.ident == *ident {
                return true;
            }
            match &seg.arguments {
                PathArguments::AngleBracketed(args) => args.args.iter().any(|arg| match arg {
                    GenericArgument::Type(inner) => type_mentions_ident(inner, ident),
                    _ => false,
                }),
                _ => false,
            }
        }),
        Type::Reference(tr) => type_mentions_ident(&tr.elem, ident),
        Type::Tuple(tt) => tt.elems.iter().any(|elem| type_mentions_ident(elem, ident)),
        Type::Array(ta) => type_mentions_ident(&ta.elem, ident),
        Type::Group(tg) => type_mentions_ident(&tg.elem, ident),
        Type::Paren(tp) => type_mentions_ident(&tp.elem, ident),
        _ => false,
    }
}

fn add_where_bound(
    where_clause: &mut syn::WhereClause,
    ty: &Type,
    bound: proc_macro2::TokenStream,
) {
    let pred: syn::WherePredicate = syn::parse_quote!(#ty: #bound);
    where_clause.predicates.push(pred);
}

fn empty_where_clause(generics: &Generics) -> syn::WhereClause {
    generics
        .where_clause
        .clone()
        .unwrap_or_else(|| syn::WhereClause {
            where_token: Default::default(),
            predicates: Default::default(),
        })
}

/// Per-field facts shared by the two derives.
struct NamedField {
    ident: Ident,
    ty: Type,
    attrs: FieldAttrs,
    key_int: Option<i64>,
    embed: Option<(EmbedKind, Type)>,
}

fn collect_named_fields(name: &Ident, fields: &syn::FieldsNamed) -> syn::Result<Vec<NamedField>> {
    let _ = name;
    let mut out = Vec::new();
    for field in &fields.named {
        let attrs = parse_field_attrs(&field.attrs)?;
        let key_int = if attrs.key_as_int {
            let Some(rename) = &attrs.rename else {
                return Err(syn::Error::new(
                    field.span(),
                    "keyasint requires rename = \"<integer>\"",
                ));
            };
            match rename.parse::<i64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    return Err(syn::Error::new(
                        field.span(),
                        "keyasint rename must parse as an integer",
                    ))
                }
            }
        } else {
            None
        };
        let embed = if attrs.embed {
            Some(embed_storage(&field.ty))
        } else {
            None
        };
        out.push(NamedField {
            ident: field.ident.clone().expect("named field"),
            ty: field.ty.clone(),
            attrs,
            key_int,
            embed,
        });
    }
    Ok(out)
}

/// The `static_shape` body, parameterized on which access trait the
/// embedded shape functions come from.
fn shape_body(
    name: &Ident,
    to_array: bool,
    fields: &[NamedField],
    shape_trait: &proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    let name_str = name.to_string();
    let defs = fields.iter().map(|f| {
        let fname = f.ident.to_string();
        let rename = match (&f.attrs.rename, f.key_int) {
            (Some(r), None) => quote!(::core::option::Option::Some(#r)),
            _ => quote!(::core::option::Option::None),
        };
        let key_as_int = match f.key_int {
            Some(k) => quote!(::core::option::Option::Some(#k)),
            None => quote!(::core::option::Option::None),
        };
        let omit_empty = f.attrs.omit_empty;
        let skip = f.attrs.skip;
        let embedded = match &f.embed {
            Some((_, inner)) => {
                quote!(::core::option::Option::Some(<#inner as #shape_trait>::static_shape))
            }
            None => quote!(::core::option::Option::None),
        };
        quote! {
            ::polycbor::schema::FieldDef {
                name: #fname,
                attr: ::polycbor::schema::FieldAttr {
                    rename: #rename,
                    key_as_int: #key_as_int,
                    omit_empty: #omit_empty,
                    skip: #skip,
                },
                embedded: #embedded,
            }
        }
    });
    quote! {
        static SHAPE: ::polycbor::schema::StructShape = ::polycbor::schema::StructShape {
            type_name: #name_str,
            as_array: #to_array,
            fields: &[ #(#defs),* ],
        };
        &SHAPE
    }
}

fn encode_named_struct(
    name: &Ident,
    generics: &Generics,
    to_array: bool,
    fields: &[NamedField],
    has_generics: bool,
) -> proc_macro2::TokenStream {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);

    let mut arms = Vec::new();
    for (idx, f) in fields.iter().enumerate() {
        let ident = &f.ident;
        if f.attrs.skip {
            arms.push(quote! { #idx => ::polycbor::schema::FieldRef::Nil, });
            continue;
        }
        match &f.embed {
            Some((EmbedKind::Plain, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFields),
                    );
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldRef::Struct(&self.#ident),
                });
            }
            Some((EmbedKind::Option, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFields),
                    );
                }
                arms.push(quote! {
                    #idx => match &self.#ident {
                        ::core::option::Option::Some(inner) => {
                            ::polycbor::schema::FieldRef::Struct(inner)
                        }
                        ::core::option::Option::None => ::polycbor::schema::FieldRef::Nil,
                    },
                });
            }
            Some((EmbedKind::OptionBox, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFields),
                    );
                }
                arms.push(quote! {
                    #idx => match &self.#ident {
                        ::core::option::Option::Some(inner) => {
                            ::polycbor::schema::FieldRef::Struct(&**inner)
                        }
                        ::core::option::Option::None => ::polycbor::schema::FieldRef::Nil,
                    },
                });
            }
            None => {
                if !type_mentions_ident(&f.ty, name) {
                    add_where_bound(&mut where_clause, &f.ty, quote!(::polycbor::Encode));
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldRef::Leaf(&self.#ident),
                });
            }
        }
    }

    let shape_trait = quote!(::polycbor::schema::StructFields);
    let body = shape_body(name, to_array, fields, &shape_trait);
    let registry = if has_generics {
        quote!()
    } else {
        quote! {
            enc.write_registered_tags(::core::any::TypeId::of::<Self>())?;
        }
    };

    quote! {
        impl #impl_generics ::polycbor::schema::StructFields for #name #ty_generics #where_clause {
            fn static_shape() -> &'static ::polycbor::schema::StructShape {
                #body
            }

            fn shape(&self) -> &'static ::polycbor::schema::StructShape {
                <Self as ::polycbor::schema::StructFields>::static_shape()
            }

            fn field(&self, idx: usize) -> ::polycbor::schema::FieldRef<'_> {
                match idx {
                    #(#arms)*
                    _ => ::polycbor::schema::FieldRef::Nil,
                }
            }
        }

        impl #impl_generics ::polycbor::Encode for #name #ty_generics #where_clause {
            fn encode(
                &self,
                enc: &mut ::polycbor::Encoder<'_>,
            ) -> ::core::result::Result<(), ::polycbor::Error> {
                #registry
                ::polycbor::schema::encode_struct(self, enc)
            }
        }
    }
}

fn decode_named_struct(
    name: &Ident,
    generics: &Generics,
    to_array: bool,
    fields: &[NamedField],
    has_generics: bool,
) -> proc_macro2::TokenStream {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);

    let mut arms = Vec::new();
    for (idx, f) in fields.iter().enumerate() {
        let ident = &f.ident;
        if !type_mentions_ident(&f.ty, name) {
            add_where_bound(&mut where_clause, &f.ty, quote!(::core::default::Default));
        }
        if f.attrs.skip {
            arms.push(quote! { #idx => ::polycbor::schema::FieldMut::Skipped, });
            continue;
        }
        match &f.embed {
            Some((EmbedKind::Plain, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFieldsMut),
                    );
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldMut::Struct(&mut self.#ident),
                });
            }
            Some((EmbedKind::Option, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFieldsMut + ::core::default::Default),
                    );
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldMut::Struct(
                        self.#ident.get_or_insert_with(::core::default::Default::default),
                    ),
                });
            }
            Some((EmbedKind::OptionBox, inner)) => {
                if !type_mentions_ident(inner, name) {
                    add_where_bound(
                        &mut where_clause,
                        inner,
                        quote!(::polycbor::schema::StructFieldsMut + ::core::default::Default),
                    );
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldMut::Struct(
                        &mut **self
                            .#ident
                            .get_or_insert_with(::core::default::Default::default),
                    ),
                });
            }
            None => {
                if !type_mentions_ident(&f.ty, name) {
                    add_where_bound(&mut where_clause, &f.ty, quote!(::polycbor::Decode));
                }
                arms.push(quote! {
                    #idx => ::polycbor::schema::FieldMut::Leaf(&mut self.#ident),
                });
            }
        }
    }

    let shape_trait = quote!(::polycbor::schema::StructFieldsMut);
    let body = shape_body(name, to_array, fields, &shape_trait);
    let field_idents: Vec<&Ident> = fields.iter().map(|f| &f.ident).collect();
    let name_str = name.to_string();
    let registry = if has_generics {
        quote!()
    } else {
        quote! {
            d.expect_registered_tags(::core::any::TypeId::of::<Self>(), #name_str)?;
        }
    };

    quote! {
        impl #impl_generics ::polycbor::schema::StructFieldsMut for #name #ty_generics #where_clause {
            fn static_shape() -> &'static ::polycbor::schema::StructShape {
                #body
            }

            fn shape(&self) -> &'static ::polycbor::schema::StructShape {
                <Self as ::polycbor::schema::StructFieldsMut>::static_shape()
            }

            fn field_mut(&mut self, idx: usize) -> ::polycbor::schema::FieldMut<'_> {
                match idx {
                    #(#arms)*
                    _ => ::polycbor::schema::FieldMut::Skipped,
                }
            }
        }

        impl #impl_generics ::polycbor::Decode for #name #ty_generics #where_clause {
            fn decode(
                d: &mut ::polycbor::Decoder<'_, '_>,
            ) -> ::core::result::Result<Self, ::polycbor::Error> {
                #registry
                let mut out = Self {
                    #(#field_idents: ::core::default::Default::default()),*
                };
                ::polycbor::schema::decode_struct(&mut out, d)?;
                ::core::result::Result::Ok(out)
            }
        }
    }
}

fn array_mismatch(rust_type: &str) -> proc_macro2::TokenStream {
    quote! {
        ::polycbor::Error::UnmarshalType {
            cbor_type: "array",
            rust_type: #rust_type,
            field: ::core::option::Option::None,
        }
    }
}

fn encode_tuple_struct(
    name: &Ident,
    generics: &Generics,
    fields: &syn::FieldsUnnamed,
    has_generics: bool,
) -> syn::Result<proc_macro2::TokenStream> {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);

    let mut items = Vec::new();
    for (idx, field) in fields.unnamed.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip || attrs.embed || attrs.rename.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "cbor attributes are not supported on tuple fields",
            ));
        }
        if !type_mentions_ident(&field.ty, name) {
            add_where_bound(&mut where_clause, &field.ty, quote!(::polycbor::Encode));
        }
        let index = syn::Index::from(idx);
        items.push(quote! { ::polycbor::Encode::encode(&self.#index, enc)?; });
    }
    let len = items.len();
    let registry = if has_generics {
        quote!()
    } else {
        quote!(enc.write_registered_tags(::core::any::TypeId::of::<Self>())?;)
    };

    Ok(quote! {
        impl #impl_generics ::polycbor::Encode for #name #ty_generics #where_clause {
            fn encode(
                &self,
                enc: &mut ::polycbor::Encoder<'_>,
            ) -> ::core::result::Result<(), ::polycbor::Error> {
                #registry
                enc.array(#len, |enc| {
                    #(#items)*
                    ::core::result::Result::Ok(())
                })
            }
        }
    })
}

fn decode_tuple_struct(
    name: &Ident,
    generics: &Generics,
    fields: &syn::FieldsUnnamed,
    has_generics: bool,
) -> syn::Result<proc_macro2::TokenStream> {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);
    let name_str = name.to_string();
    let mismatch = array_mismatch(&name_str);

    let mut steps = Vec::new();
    let mut vars = Vec::new();
    for (idx, field) in fields.unnamed.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip || attrs.embed || attrs.rename.is_some() {
            return Err(syn::Error::new(
                field.span(),
                "cbor attributes are not supported on tuple fields",
            ));
        }
        if !type_mentions_ident(&field.ty, name) {
            add_where_bound(&mut where_clause, &field.ty, quote!(::polycbor::Decode));
        }
        let ty = &field.ty;
        let var = format_ident!("v{idx}");
        steps.push(quote! {
            if header.is_none() && d.at_array_end()? {
                return ::core::result::Result::Err(#mismatch);
            }
            let #var = <#ty as ::polycbor::Decode>::decode(d)?;
        });
        vars.push(var);
    }
    let len = vars.len();
    let registry = if has_generics {
        quote!()
    } else {
        quote!(d.expect_registered_tags(::core::any::TypeId::of::<Self>(), #name_str)?;)
    };

    Ok(quote! {
        impl #impl_generics ::polycbor::Decode for #name #ty_generics #where_clause {
            fn decode(
                d: &mut ::polycbor::Decoder<'_, '_>,
            ) -> ::core::result::Result<Self, ::polycbor::Error> {
                #registry
                let header = d.parse_array_header_as(#name_str)?;
                if let ::core::option::Option::Some(len) = header {
                    if len != #len {
                        return ::core::result::Result::Err(#mismatch);
                    }
                }
                #(#steps)*
                if header.is_none() && !d.at_array_end()? {
                    return ::core::result::Result::Err(#mismatch);
                }
                ::core::result::Result::Ok(Self(#(#vars),*))
            }
        }
    })
}

fn encode_enum(
    name: &Ident,
    generics: &Generics,
    data: &DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);
    let mut arms = Vec::new();

    for variant in &data.variants {
        let v_attrs = parse_field_attrs(&variant.attrs)?;
        let vname = v_attrs.rename.unwrap_or_else(|| variant.ident.to_string());
        let ident = &variant.ident;
        match &variant.fields {
            Fields::Unit => {
                arms.push(quote! {
                    Self::#ident => enc.map(|m| {
                        m.entry(|e| e.text(#vname), |e| e.null())
                    }),
                });
            }
            Fields::Unnamed(fields) => {
                let mut pats = Vec::new();
                let mut items = Vec::new();
                for (idx, field) in fields.unnamed.iter().enumerate() {
                    if !type_mentions_ident(&field.ty, name) {
                        add_where_bound(&mut where_clause, &field.ty, quote!(::polycbor::Encode));
                    }
                    let var = format_ident!("v{idx}");
                    pats.push(var.clone());
                    items.push(quote! { ::polycbor::Encode::encode(#var, e)?; });
                }
                let len = items.len();
                arms.push(quote! {
                    Self::#ident( #(#pats),* ) => enc.map(|m| {
                        m.entry(
                            |e| e.text(#vname),
                            |e| e.array(#len, |e| {
                                #(#items)*
                                ::core::result::Result::Ok(())
                            }),
                        )
                    }),
                });
            }
            Fields::Named(fields) => {
                let mut pats = Vec::new();
                let mut entries = Vec::new();
                for field in &fields.named {
                    let attrs = parse_field_attrs(&field.attrs)?;
                    let ident = field.ident.as_ref().expect("named field");
                    pats.push(quote!(#ident));
                    if attrs.skip {
                        continue;
                    }
                    if attrs.embed {
                        return Err(syn::Error::new(
                            field.span(),
                            "cbor embed is not supported inside enum variants",
                        ));
                    }
                    if !type_mentions_ident(&field.ty, name) {
                        add_where_bound(&mut where_clause, &field.ty, quote!(::polycbor::Encode));
                    }
                    let key = attrs.rename.unwrap_or_else(|| ident.to_string());
                    entries.push(quote! {
                        m2.entry(|e| e.text(#key), |e| ::polycbor::Encode::encode(#ident, e))?;
                    });
                }
                arms.push(quote! {
                    Self::#ident { #(#pats),* } => enc.map(|m| {
                        m.entry(
                            |e| e.text(#vname),
                            |e| e.map(|m2| {
                                #(#entries)*
                                ::core::result::Result::Ok(())
                            }),
                        )
                    }),
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::polycbor::Encode for #name #ty_generics #where_clause {
            fn encode(
                &self,
                enc: &mut ::polycbor::Encoder<'_>,
            ) -> ::core::result::Result<(), ::polycbor::Error> {
                match self {
                    #(#arms)*
                }
            }
        }
    })
}

fn decode_enum(
    name: &Ident,
    generics: &Generics,
    data: &DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    let (impl_generics, ty_generics, _) = generics.split_for_impl();
    let mut where_clause = empty_where_clause(generics);
    let name_str = name.to_string();
    let map_mismatch = quote! {
        ::polycbor::Error::UnmarshalType {
            cbor_type: "map",
            rust_type: #name_str,
            field: ::core::option::Option::None,
        }
    };

    let mut arms = Vec::new();
    for variant in &data.variants {
        let v_attrs = parse_field_attrs(&variant.attrs)?;
        let vname = v_attrs.rename.unwrap_or_else(|| variant.ident.to_string());
        let ident = &variant.ident;
        match &variant.fields {
            Fields::Unit => {
                arms.push(quote! {
                    #vname => {
                        d.parse_null()?;
                        Self::#ident
                    }
                });
            }
            Fields::Unnamed(fields) => {
                let variant_str = format!("{name_str}::{ident}");
                let mismatch = array_mismatch(&variant_str);
                let mut steps = Vec::new();
                let mut vars = Vec::new();
                for (idx, field) in fields.unnamed.iter().enumerate() {
                    if !type_mentions_ident(&field.ty, name) {
                        add_where_bound(&mut where_clause, &field.ty, quote!(::polycbor::Decode));
                    }
                    let ty = &field.ty;
                    let var = format_ident!("v{idx}");
                    steps.push(quote! {
                        if vheader.is_none() && d.at_array_end()? {
                            return ::core::result::Result::Err(#mismatch);
                        }
                        let #var = <#ty as ::polycbor::Decode>::decode(d)?;
                    });
                    vars.push(var);
                }
                let len = vars.len();
                arms.push(quote! {
                    #vname => {
                        let vheader = d.parse_array_header_as(#variant_str)?;
                        if let ::core::option::Option::Some(len) = vheader {
                            if len != #len {
                                return ::core::result::Result::Err(#mismatch);
                            }
                        }
                        #(#steps)*
                        if vheader.is_none() && !d.at_array_end()? {
                            return ::core::result::Result::Err(#mismatch);
                        }
                        Self::#ident(#(#vars),*)
                    }
                });
            }
            Fields::Named(fields) => {
                let variant_str = format!("{name_str}::{ident}");
                let mut locals = Vec::new();
                let mut matchers = Vec::new();
                let mut finals = Vec::new();
                for field in &fields.named {
                    let attrs = parse_field_attrs(&field.attrs)?;
                    let fident = field.ident.as_ref().expect("named field");
                    let ty = &field.ty;
                    if !type_mentions_ident(ty, name) {
                        add_where_bound(&mut where_clause, ty, quote!(::core::default::Default));
                    }
                    if attrs.skip {
                        finals.push(quote! { #fident: ::core::default::Default::default(), });
                        continue;
                    }
                    if attrs.embed {
                        return Err(syn::Error::new(
                            field.span(),
                            "cbor embed is not supported inside enum variants",
                        ));
                    }
                    if !type_mentions_ident(ty, name) {
                        add_where_bound(&mut where_clause, ty, quote!(::polycbor::Decode));
                    }
                    let key = attrs.rename.unwrap_or_else(|| fident.to_string());
                    let local = format_ident!("__{fident}");
                    locals.push(quote! {
                        let mut #local: ::core::option::Option<#ty> = ::core::option::Option::None;
                    });
                    matchers.push(quote! {
                        #key => {
                            #local = ::core::option::Option::Some(
                                <#ty as ::polycbor::Decode>::decode(d)?,
                            );
                        }
                    });
                    finals.push(quote! { #fident: #local.unwrap_or_default(), });
                }
                arms.push(quote! {
                    #vname => {
                        let vheader = d.parse_map_header_as(#variant_str)?;
                        #(#locals)*
                        let mut index = 0usize;
                        loop {
                            match vheader {
                                ::core::option::Option::Some(len) if index == len => break,
                                ::core::option::Option::None if d.at_array_end()? => break,
                                _ => {}
                            }
                            let key = d.parse_text()?;
                            match key.as_str() {
                                #(#matchers)*
                                _ => {
                                    d.skip_value()?;
                                }
                            }
                            index += 1;
                        }
                        Self::#ident { #(#finals)* }
                    }
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::polycbor::Decode for #name #ty_generics #where_clause {
            fn decode(
                d: &mut ::polycbor::Decoder<'_, '_>,
            ) -> ::core::result::Result<Self, ::polycbor::Error> {
                let header = d.parse_map_header_as(#name_str)?;
                if let ::core::option::Option::Some(len) = header {
                    if len != 1 {
                        return ::core::result::Result::Err(#map_mismatch);
                    }
                }
                let key = d.parse_text()?;
                let out = match key.as_str() {
                    #(#arms)*
                    _ => {
                        d.skip_value()?;
                        return ::core::result::Result::Err(
                            ::polycbor::Error::UnmarshalType {
                                cbor_type: "map",
                                rust_type: #name_str,
                                field: ::core::option::Option::Some(key.clone()),
                            },
                        );
                    }
                };
                if header.is_none() && !d.at_array_end()? {
                    return ::core::result::Result::Err(#map_mismatch);
                }
                ::core::result::Result::Ok(out)
            }
        }
    })
}

fn derive_encode_input(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let has_generics = !input.generics.params.is_empty();
    match &input.data {
        Data::Struct(DataStruct { fields, .. }) => match fields {
            Fields::Named(named) => {
                let to_array = parse_container_toarray(&input.attrs)?;
                let fields = collect_named_fields(name, named)?;
                Ok(encode_named_struct(
                    name,
                    &input.generics,
                    to_array,
                    &fields,
                    has_generics,
                ))
            }
            Fields::Unnamed(unnamed) => {
                encode_tuple_struct(name, &input.generics, unnamed, has_generics)
            }
            Fields::Unit => {
                let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
                Ok(quote! {
                    impl #impl_generics ::polycbor::Encode for #name #ty_generics #where_clause {
                        fn encode(
                            &self,
                            enc: &mut ::polycbor::Encoder<'_>,
                        ) -> ::core::result::Result<(), ::polycbor::Error> {
                            enc.null()
                        }
                    }
                })
            }
        },
        Data::Enum(data) => encode_enum(name, &input.generics, data),
        Data::Union(u) => Err(syn::Error::new(
            u.union_token.span(),
            "Encode is not supported for unions",
        )),
    }
}

fn derive_decode_input(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let has_generics = !input.generics.params.is_empty();
    match &input.data {
        Data::Struct(DataStruct { fields, .. }) => match fields {
            Fields::Named(named) => {
                let to_array = parse_container_toarray(&input.attrs)?;
                let fields = collect_named_fields(name, named)?;
                Ok(decode_named_struct(
                    name,
                    &input.generics,
                    to_array,
                    &fields,
                    has_generics,
                ))
            }
            Fields::Unnamed(unnamed) => {
                decode_tuple_struct(name, &input.generics, unnamed, has_generics)
            }
            Fields::Unit => {
                let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
                Ok(quote! {
                    impl #impl_generics ::polycbor::Decode for #name #ty_generics #where_clause {
                        fn decode(
                            d: &mut ::polycbor::Decoder<'_, '_>,
                        ) -> ::core::result::Result<Self, ::polycbor::Error> {
                            d.parse_null()?;
                            ::core::result::Result::Ok(Self)
                        }
                    }
                })
            }
        },
        Data::Enum(data) => decode_enum(name, &input.generics, data),
        Data::Union(u) => Err(syn::Error::new(
            u.union_token.span(),
            "Decode is not supported for unions",
        )),
    }
}

/// Derive `polycbor::Encode` for a struct or enum.
#[proc_macro_derive(Encode, attributes(cbor))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_encode_input(&input) {
        Ok(out) => TokenStream::from(out),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

/// Derive `polycbor::Decode` for a struct or enum.
#[proc_macro_derive(Decode, attributes(cbor))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_decode_input(&input) {
        Ok(out) => TokenStream::from(out),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}
