//! Syntax rewriting (phase two).
//!
//! A [`VisitMut`] pass over one parsed file. It rebuilds the generated type
//! path of every struct, enum and inherent impl from the inline module
//! nesting, looks the member up in the [`OverlayMap`] and, on a hit, swaps
//! the node for a rewritten copy. Nodes without a matching key are never
//! touched, and a node is only replaced when the copy actually differs, so
//! running the pass over its own output changes nothing.

use crate::config::OverlayConfig;
use crate::keys::FieldKey;
use crate::overlay::{OverlayMap, OverrideSpec, TagFragment};
use proc_macro2::{Spacing, TokenStream, TokenTree};
use quote::quote;
use std::collections::{BTreeMap, BTreeSet};
use syn::ext::IdentExt;
use syn::visit_mut::{self, VisitMut};
use syn::{
    Attribute, Block, Expr, Fields, FnArg, Ident, ImplItem, ImplItemFn, ItemEnum, ItemImpl,
    ItemMod, ItemStruct, Meta, ReturnType, Signature, Stmt, Type, Variant,
};
use tracing::{debug, warn};

/// Naming knobs the rewriter needs from the run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Methods whose name starts with this prefix are accessor candidates.
    pub accessor_prefix: String,

    /// Attribute that receives tag fragments.
    pub tag_attribute: String,
}

impl RewriteOptions {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            accessor_prefix: config.accessor_prefix.clone(),
            tag_attribute: config.tag_attribute.clone(),
        }
    }
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}

/// What one rewrite pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Struct fields replaced.
    pub fields: usize,

    /// Oneof variants replaced.
    pub variants: usize,

    /// Accessor methods replaced.
    pub accessors: usize,

    /// Import aliases referenced by replaced nodes, keyed by the inline
    /// module path the node lives in (empty for the file root).
    pub aliases: BTreeMap<Vec<String>, BTreeSet<String>>,
}

impl RewriteReport {
    pub fn total(&self) -> usize {
        self.fields + self.variants + self.accessors
    }

    pub fn changed(&self) -> bool {
        self.total() > 0
    }

    /// Aliases referenced inside the inline module at `module`.
    pub fn aliases_in<'a>(&'a self, module: &[String]) -> impl Iterator<Item = &'a str> + use<'a> {
        self.aliases
            .get(module)
            .into_iter()
            .flat_map(|aliases| aliases.iter().map(String::as_str))
    }
}

/// Rewrite every declaration and accessor in `file` that has an entry in `map`.
pub fn rewrite(file: &mut syn::File, map: &OverlayMap, options: &RewriteOptions) -> RewriteReport {
    let mut rewriter = SyntaxRewriter::new(map, options);
    rewriter.visit_file_mut(file);
    rewriter.report
}

struct SyntaxRewriter<'a> {
    map: &'a OverlayMap,
    accessor_prefix: &'a str,
    tag_attribute: Option<Ident>,
    module_path: Vec<String>,
    report: RewriteReport,
}

impl<'a> SyntaxRewriter<'a> {
    fn new(map: &'a OverlayMap, options: &'a RewriteOptions) -> Self {
        let tag_attribute = match syn::parse_str::<Ident>(&options.tag_attribute) {
            Ok(ident) => Some(ident),
            Err(err) => {
                warn!(attribute = %options.tag_attribute, %err, "tag merging disabled");
                None
            }
        };
        Self {
            map,
            accessor_prefix: &options.accessor_prefix,
            tag_attribute,
            module_path: Vec::new(),
            report: RewriteReport::default(),
        }
    }

    /// Generated type path of `name` declared in the current module.
    fn scope(&self, name: &str) -> String {
        self.module_path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join("::")
    }

    fn impl_scope(&self, self_ty: &Type) -> Option<String> {
        let Type::Path(ty) = self_ty else {
            return None;
        };
        if ty.qself.is_some() {
            return None;
        }
        let name = ty
            .path
            .segments
            .iter()
            .map(|segment| segment.ident.unraw().to_string())
            .collect::<Vec<_>>()
            .join("::");
        Some(self.scope(&name))
    }

    fn note_aliases(&mut self, spec: &OverrideSpec) {
        if let Some(alias) = spec.cast_type.as_ref().and_then(|cast| cast.alias.clone()) {
            self.report
                .aliases
                .entry(self.module_path.clone())
                .or_default()
                .insert(alias);
        }
    }

    /// Zero-argument method named with the accessor prefix.
    fn is_accessor(&self, sig: &Signature) -> bool {
        let name = sig.ident.unraw().to_string();
        name.len() > self.accessor_prefix.len()
            && name.starts_with(self.accessor_prefix)
            && sig.inputs.len() == 1
            && matches!(sig.inputs.first(), Some(FnArg::Receiver(_)))
    }

    fn rewrite_field(&mut self, field: &mut syn::Field, spec: &OverrideSpec) -> bool {
        let mut replacement = field.clone();
        if let Some(ty) = spec.field_type.as_deref().and_then(|ty| parse_type(ty, spec)) {
            replacement.ty = ty;
        }
        self.merge_tags(&mut replacement.attrs, &spec.tags);

        if replacement == *field {
            return false;
        }
        *field = replacement;
        self.note_aliases(spec);
        true
    }

    fn rewrite_variant(&mut self, variant: &mut Variant, spec: &OverrideSpec) -> bool {
        let mut replacement = variant.clone();
        if let Some(ty) = spec.field_type.as_deref().and_then(|ty| parse_type(ty, spec))
            && let Fields::Unnamed(fields) = &mut replacement.fields
            && let Some(payload) = fields.unnamed.first_mut()
        {
            payload.ty = ty;
        }
        self.merge_tags(&mut replacement.attrs, &spec.tags);

        if replacement == *variant {
            return false;
        }
        *variant = replacement;
        self.note_aliases(spec);
        true
    }

    fn rewrite_accessor(&mut self, method: &mut ImplItemFn, spec: &OverrideSpec) -> bool {
        let (Some(accessor_type), Some(zero)) = (spec.accessor_type.as_deref(), spec.zero_expr())
        else {
            return false;
        };
        let ReturnType::Type(_, current) = &method.sig.output else {
            return false;
        };
        if !is_single_value(current) {
            return false;
        }
        let Some(ty) = parse_type(accessor_type, spec) else {
            return false;
        };

        let zero = match syn::parse_str::<Expr>(&zero) {
            Ok(expr) => expr,
            Err(err) => {
                warn!(field = %spec.field, %zero, %err, "zero value is not an expression");
                return false;
            }
        };

        let mut replacement = method.clone();
        let Some(value) = final_value_mut(&mut replacement.block) else {
            debug!(field = %spec.field, "accessor does not end in a plain return, skipped");
            return false;
        };
        *value = zero;
        if let ReturnType::Type(_, output) = &mut replacement.sig.output {
            **output = ty;
        }

        if replacement == *method {
            return false;
        }
        *method = replacement;
        self.note_aliases(spec);
        true
    }

    /// Merge `tags` into the first tag attribute in `attrs`, appending a new
    /// attribute when there is none. Fragment names already present win.
    fn merge_tags(&self, attrs: &mut Vec<Attribute>, tags: &[TagFragment]) {
        let Some(ident) = &self.tag_attribute else {
            return;
        };
        if tags.is_empty() {
            return;
        }

        let mut present = BTreeSet::new();
        let mut target = None;
        for (idx, attr) in attrs.iter().enumerate() {
            if !attr.path().is_ident(ident) {
                continue;
            }
            if let Meta::List(list) = &attr.meta {
                present.extend(split_fragments(list.tokens.clone()).iter().map(fragment_name));
                target.get_or_insert(idx);
            }
        }

        let missing: Vec<TokenStream> = tags
            .iter()
            .filter(|tag| present.insert(tag.name.clone()))
            .filter_map(|tag| match tag.render().parse::<TokenStream>() {
                Ok(tokens) => Some(tokens),
                Err(err) => {
                    warn!(tag = %tag.name, %err, "tag fragment is not valid attribute syntax");
                    None
                }
            })
            .collect();
        if missing.is_empty() {
            return;
        }

        match target {
            Some(idx) => {
                if let Meta::List(list) = &mut attrs[idx].meta {
                    let mut fragments = split_fragments(list.tokens.clone());
                    fragments.extend(missing);
                    list.tokens = join_fragments(fragments);
                }
            }
            None => {
                let tokens = join_fragments(missing);
                attrs.push(syn::parse_quote!(#[#ident(#tokens)]));
            }
        }
    }
}

impl VisitMut for SyntaxRewriter<'_> {
    fn visit_item_mod_mut(&mut self, node: &mut ItemMod) {
        if node.content.is_none() {
            return;
        }
        self.module_path.push(node.ident.unraw().to_string());
        visit_mut::visit_item_mod_mut(self, node);
        self.module_path.pop();
    }

    fn visit_item_struct_mut(&mut self, node: &mut ItemStruct) {
        let map = self.map;
        let scope = self.scope(&node.ident.unraw().to_string());
        let Fields::Named(fields) = &mut node.fields else {
            return;
        };

        for field in fields.named.iter_mut() {
            let Some(name) = field.ident.as_ref().map(|ident| ident.unraw().to_string()) else {
                continue;
            };
            let key = FieldKey::member(&scope, &name);
            let Some(spec) = map.get(&key) else {
                continue;
            };
            if self.rewrite_field(field, spec) {
                debug!(key = %key, "rewrote field");
                self.report.fields += 1;
            }
        }
    }

    fn visit_item_enum_mut(&mut self, node: &mut ItemEnum) {
        let map = self.map;
        let scope = self.scope(&node.ident.unraw().to_string());

        for variant in node.variants.iter_mut() {
            if !matches!(&variant.fields, Fields::Unnamed(fields) if fields.unnamed.len() == 1) {
                continue;
            }
            let key = FieldKey::member(&scope, &variant.ident.unraw().to_string());
            let Some(spec) = map.get(&key) else {
                continue;
            };
            if self.rewrite_variant(variant, spec) {
                debug!(key = %key, "rewrote oneof variant");
                self.report.variants += 1;
            }
        }
    }

    fn visit_item_impl_mut(&mut self, node: &mut ItemImpl) {
        if node.trait_.is_some() {
            return;
        }
        let map = self.map;
        let Some(scope) = self.impl_scope(&node.self_ty) else {
            return;
        };

        for item in node.items.iter_mut() {
            let ImplItem::Fn(method) = item else {
                continue;
            };
            if !self.is_accessor(&method.sig) {
                continue;
            }
            let key = FieldKey::accessor(&scope, &method.sig.ident.unraw().to_string());
            let Some(spec) = map.get(&key) else {
                continue;
            };
            if self.rewrite_accessor(method, spec) {
                debug!(key = %key, "rewrote accessor");
                self.report.accessors += 1;
            }
        }
    }
}

fn parse_type(ty: &str, spec: &OverrideSpec) -> Option<Type> {
    match syn::parse_str::<Type>(ty) {
        Ok(ty) => Some(ty),
        Err(err) => {
            warn!(field = %spec.field, %ty, %err, "override is not a type");
            None
        }
    }
}

fn is_single_value(ty: &Type) -> bool {
    !matches!(ty, Type::Tuple(_) | Type::ImplTrait(_) | Type::Never(_))
}

/// Value expression of the block's last statement, if it is `return e;` or
/// a tail expression that is not itself a block-like construct.
fn final_value_mut(block: &mut Block) -> Option<&mut Expr> {
    match block.stmts.last_mut()? {
        Stmt::Expr(Expr::Return(ret), _) => ret.expr.as_deref_mut(),
        Stmt::Expr(expr, None) if !is_block_like(expr) => Some(expr),
        _ => None,
    }
}

fn is_block_like(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Block(_)
            | Expr::If(_)
            | Expr::Match(_)
            | Expr::Loop(_)
            | Expr::While(_)
            | Expr::ForLoop(_)
            | Expr::Unsafe(_)
            | Expr::Const(_)
    )
}

/// Split attribute arguments at top-level commas.
fn split_fragments(tokens: TokenStream) -> Vec<TokenStream> {
    let mut fragments = Vec::new();
    let mut current = TokenStream::new();
    for tree in tokens {
        match &tree {
            TokenTree::Punct(punct) if punct.as_char() == ',' => {
                if !current.is_empty() {
                    fragments.push(std::mem::take(&mut current));
                }
            }
            _ => current.extend(std::iter::once(tree)),
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}

/// Name of a `name = "value"` fragment; joined punctuation such as the dash
/// in `ssz-size` is kept without spaces.
fn fragment_name(fragment: &TokenStream) -> String {
    fragment
        .clone()
        .into_iter()
        .take_while(|tree| {
            !matches!(tree, TokenTree::Punct(p) if p.as_char() == '=' && p.spacing() == Spacing::Alone)
        })
        .map(|tree| tree.to_string())
        .collect()
}

fn join_fragments(fragments: Vec<TokenStream>) -> TokenStream {
    let mut tokens = TokenStream::new();
    for (idx, fragment) in fragments.into_iter().enumerate() {
        if idx > 0 {
            tokens.extend(quote!(,));
        }
        tokens.extend(fragment);
    }
    tokens
}
