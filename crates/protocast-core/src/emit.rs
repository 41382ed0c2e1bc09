//! Source emission.
//!
//! Adds the `use` statements that override types need and serializes the
//! rewritten file with `prettyplease`. `syn` keeps doc comments but drops
//! plain `//` comments, so the header prost writes at the top of every
//! file is carried over from the original text.

use crate::overlay::Import;
use crate::rewrite::RewriteReport;
use quote::ToTokens;
use std::collections::{BTreeMap, BTreeSet};
use syn::ext::IdentExt;
use syn::{Item, ItemUse, UseTree};
use tracing::{debug, warn};

impl Import {
    /// The statement this import is emitted as.
    ///
    /// ```
    /// use protocast_core::Import;
    ///
    /// let aliased = Import { path: "eth2::types".into(), alias: "eth2_types".into() };
    /// assert_eq!(aliased.statement(), "use eth2::types as eth2_types;");
    ///
    /// let plain = Import { path: "eth2".into(), alias: "eth2".into() };
    /// assert_eq!(plain.statement(), "use eth2;");
    /// ```
    pub fn statement(&self) -> String {
        if self.alias == self.path {
            format!("use {};", self.path)
        } else {
            format!("use {} as {};", self.path, self.alias)
        }
    }
}

/// Serialize `file`, adding imports, or return `original` untouched when
/// neither the rewriter nor the import step changed anything.
///
/// Each origin is imported once per module that references its alias, the
/// file root included. Origins whose fields matched nothing in this file are
/// not imported.
pub fn emit(mut file: syn::File, imports: &[Import], report: &RewriteReport, original: &str) -> String {
    let imports: Vec<&Import> = imports.iter().collect::<BTreeSet<_>>().into_iter().collect();

    let inserted = insert_imports(&mut file.items, &imports, report, &mut Vec::new());

    if !report.changed() && inserted == 0 {
        return original.to_string();
    }
    debug!(rewritten = report.total(), imports = inserted, "emitting source");

    let body = prettyplease::unparse(&file);
    let header = leading_comments(original);
    if header.is_empty() {
        body
    } else {
        format!("{header}\n{body}")
    }
}

/// Add the imports referenced at `path` to `items`, then descend into every
/// inline module.
fn insert_imports(
    items: &mut Vec<Item>,
    imports: &[&Import],
    report: &RewriteReport,
    path: &mut Vec<String>,
) -> usize {
    let used: BTreeSet<&str> = report.aliases_in(path).collect();
    let needed: Vec<&Import> = imports
        .iter()
        .copied()
        .filter(|import| used.contains(import.alias.as_str()))
        .collect();
    let mut inserted = insert_uses(items, &needed);

    for item in items.iter_mut() {
        let Item::Mod(module) = item else {
            continue;
        };
        let Some((_, content)) = &mut module.content else {
            continue;
        };
        path.push(module.ident.unraw().to_string());
        inserted += insert_imports(content, imports, report, path);
        path.pop();
    }
    inserted
}

/// Insert `imports` after the leading `use`/`extern crate` items, skipping
/// statements that already exist and statements whose name is already bound
/// in the module. Returns the number inserted.
fn insert_uses(items: &mut Vec<Item>, imports: &[&Import]) -> usize {
    let uses: Vec<&ItemUse> = items
        .iter()
        .filter_map(|item| match item {
            Item::Use(item) => Some(item),
            _ => None,
        })
        .collect();
    let existing: BTreeSet<String> = uses.iter().map(|item| use_tree_text(item)).collect();
    let mut bound: BTreeMap<String, String> = uses
        .iter()
        .filter_map(|item| bound_name(&item.tree).map(|name| (name, use_tree_text(item))))
        .collect();

    let mut position = items
        .iter()
        .take_while(|item| matches!(item, Item::Use(_) | Item::ExternCrate(_)))
        .count();
    let mut inserted = 0;

    for import in imports {
        let statement = import.statement();
        let item = match syn::parse_str::<ItemUse>(&statement) {
            Ok(item) => item,
            Err(err) => {
                warn!(%statement, %err, "import is not a valid use statement");
                continue;
            }
        };
        let text = use_tree_text(&item);
        if existing.contains(&text) {
            continue;
        }
        if let Some(name) = bound_name(&item.tree) {
            if let Some(other) = bound.get(&name) {
                warn!(
                    %statement,
                    alias = %name,
                    existing = %other,
                    "import alias already bound in this module, skipped"
                );
                continue;
            }
            bound.insert(name, text);
        }
        items.insert(position, Item::Use(item));
        position += 1;
        inserted += 1;
    }
    inserted
}

fn use_tree_text(item: &ItemUse) -> String {
    item.tree.to_token_stream().to_string()
}

/// Name a single-path `use` tree brings into scope.
fn bound_name(tree: &UseTree) -> Option<String> {
    match tree {
        UseTree::Path(path) => bound_name(&path.tree),
        UseTree::Name(name) => Some(name.ident.unraw().to_string()),
        UseTree::Rename(rename) => Some(rename.rename.unraw().to_string()),
        UseTree::Glob(_) | UseTree::Group(_) => None,
    }
}

/// Leading `//` comment lines of `source`, without doc comments and without
/// trailing blank lines.
fn leading_comments(source: &str) -> String {
    let mut lines: Vec<&str> = source
        .lines()
        .take_while(|line| {
            let line = line.trim_start();
            line.is_empty()
                || (line.starts_with("//") && !line.starts_with("///") && !line.starts_with("//!"))
        })
        .collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }

    lines.iter().map(|line| format!("{line}\n")).collect()
}
