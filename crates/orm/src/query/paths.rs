//! Relation Paths - Parsing and token substitution
//!
//! A relation path is a dotted name rooted at the query's primary model;
//! the empty path is the root itself. Inside user expressions a path token
//! is marked with a leading `@`. Substitution happens in two passes over
//! the composed SQL:
//!
//! 1. the alias-eligible pass (GROUP BY, HAVING, ORDER BY) rewrites a whole
//!    token to one back-quoted composite, so select aliases stay usable;
//! 2. the fully-qualified pass rewrites `@path.field` to `` `path`.`field` ``
//!    and `@field` to the master alias everywhere else.
//!
//! DELETE mode replaces both passes with a rewrite to bare table
//! identifiers, because multi-table DELETE forbids aliases.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::OrmResult;
use crate::query::types::MASTER_ALIAS;

/// The path token marker in user expressions.
pub const REL_START: char = '@';

/// Any path token: `@segment(.segment)*`.
static PATH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_.]*)").expect("valid regex"));

/// A qualified token: everything up to the last dot is the path, the rest
/// is the field.
static QUALIFIED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_.]*)\.([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

/// A bare token addressing a root field.
static MASTER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

/// Strip the leading `@` marker(s) from a path given in user syntax.
pub fn strip_rel_start(path: &str) -> &str {
    path.trim_start_matches(REL_START)
}

/// Split a relation path into its local path and final segment.
/// `message.tags.author` splits to `("message.tags", "author")`; a path
/// without dots has the empty local path.
pub fn split_relation_path(path: &str) -> (&str, &str) {
    match path.rfind('.') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Alias-eligible pass: `@a.b.c` becomes `` `a.b.c` `` as a single
/// composite identifier, matching the dot-quoted column aliases of the
/// select list.
pub fn replace_alias_tokens(sql: &str) -> String {
    PATH_TOKEN
        .replace_all(sql, |caps: &Captures| format!("`{}`", &caps[1]))
        .into_owned()
}

/// Fully-qualified pass: `@path.field` to `` `path`.`field` ``, then bare
/// `@field` to the master alias.
pub fn replace_qualified_tokens(sql: &str) -> String {
    let sql = QUALIFIED_TOKEN
        .replace_all(sql, |caps: &Captures| {
            format!("`{}`.`{}`", &caps[1], &caps[2])
        })
        .into_owned();
    MASTER_TOKEN
        .replace_all(&sql, |caps: &Captures| {
            format!("`{}`.`{}`", MASTER_ALIAS, &caps[1])
        })
        .into_owned()
}

/// DELETE-mode pass: every token is rewritten through `resolve`, which maps
/// the token's local path to a bare table identifier.
pub fn replace_delete_tokens<F>(sql: &str, mut resolve: F) -> OrmResult<String>
where
    F: FnMut(&str, &str) -> OrmResult<String>,
{
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for caps in PATH_TOKEN.captures_iter(sql) {
        let whole = caps.get(0).expect("match");
        let (local_path, field) = split_relation_path(&caps[1]);
        out.push_str(&sql[last..whole.start()]);
        let table = resolve(local_path, field)?;
        out.push_str(&table);
        out.push_str(&format!(".`{}`", field));
        last = whole.end();
    }
    out.push_str(&sql[last..]);
    Ok(out)
}
