//! SQL identifier quoting.
//!
//! Every identifier the engine emits is backtick-quoted. Both MySQL and
//! SQLite accept backticks, so one quoting rule covers both dialects.

/// Quote a SQL identifier with backticks.
///
/// Embedded backticks are escaped by doubling them (`` ` `` → ``` `` ```).
///
/// # Examples
///
/// ```
/// use rowmodel_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "`users`");
/// assert_eq!(quote_ident("user`name"), "`user``name`");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote an `alias.column` reference.
///
/// ```
/// use rowmodel_core::quote_qualified;
///
/// assert_eq!(quote_qualified("p", "id"), "`p`.`id`");
/// ```
#[inline]
pub fn quote_qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}
