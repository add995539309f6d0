//! Identifier, function-name and column-type sanitization
//!
//! Identifiers cannot be bound as parameters, so everything that ends up as a
//! table or column name in SQL text goes through an allowlist here first.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_STRIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9A-Za-z_$.*]").expect("identifier: invalid allowlist regex")
});

static SELECT_FUNCTION_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z_,]").expect("identifier: invalid function regex"));

static ORDER_FUNCTION_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z_]").expect("identifier: invalid function regex"));

static FIELD_TYPE_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z()\s]").expect("identifier: invalid field type regex"));

/// Strip an identifier down to `[0-9A-Za-z_$.]` and split it into dotted segments.
///
/// Empty segments (from `..`, leading or trailing dots) are dropped. A segment
/// made only of `*` survives as a wildcard; `*` is removed everywhere else.
pub fn identifier_segments(raw: &str) -> Vec<String> {
    let stripped = IDENTIFIER_STRIP.replace_all(raw, "");
    stripped
        .split('.')
        .filter_map(|segment| {
            if segment == "*" {
                return Some("*".to_string());
            }
            let cleaned: String = segment.chars().filter(|c| *c != '*').collect();
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect()
}

/// Clean an identifier without quoting it (`a..b` becomes `a.b`)
pub fn clean_identifier(raw: &str) -> String {
    identifier_segments(raw).join(".")
}

/// Clean and backtick-quote an identifier, quoting each dotted segment on its own
///
/// ```
/// use flatquery::query_builder::quote_identifier;
/// assert_eq!(quote_identifier("users.name"), "`users`.`name`");
/// assert_eq!(quote_identifier("u.*"), "`u`.*");
/// ```
pub fn quote_identifier(raw: &str) -> String {
    identifier_segments(raw)
        .iter()
        .map(|segment| {
            if segment == "*" {
                segment.clone()
            } else {
                format!("`{}`", segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Function names used in SELECT projections keep `[0-9A-Za-z_,]`
pub fn sanitize_select_function(raw: &str) -> String {
    SELECT_FUNCTION_STRIP.replace_all(raw, "").into_owned()
}

/// Function names used in ORDER BY keep `[0-9A-Za-z_]`
pub fn sanitize_order_function(raw: &str) -> String {
    ORDER_FUNCTION_STRIP.replace_all(raw, "").into_owned()
}

/// Column type strings keep `[0-9A-Za-z()\s]` and are upper-cased.
///
/// Commas are not in the allowlist, so `DECIMAL(10,2)` degrades to
/// `DECIMAL(102)`.
pub fn sanitize_field_type(raw: &str) -> String {
    FIELD_TYPE_STRIP
        .replace_all(raw.trim(), "")
        .to_uppercase()
}

/// Sanitize a storage engine name for `ENGINE=`
pub fn sanitize_engine(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_strips_and_quotes_segments() {
        assert_eq!(quote_identifier("id"), "`id`");
        assert_eq!(quote_identifier("`users`.`id`"), "`users`.`id`");
        assert_eq!(quote_identifier("users..id"), "`users`.`id`");
        assert_eq!(quote_identifier("na-me; DROP"), "`nameDROP`");
        assert_eq!(quote_identifier("$total"), "`$total`");
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(quote_identifier("*"), "*");
        assert_eq!(quote_identifier("t.*"), "`t`.*");
        assert_eq!(quote_identifier("a*b"), "`ab`");
    }

    #[test]
    fn test_empty_identifier_collapses() {
        assert_eq!(quote_identifier("..."), "");
        assert_eq!(clean_identifier(".a."), "a");
    }

    #[test]
    fn test_function_sanitizers() {
        assert_eq!(sanitize_select_function("COUNT(*)"), "COUNT");
        assert_eq!(sanitize_select_function("CONCAT_WS,"), "CONCAT_WS,");
        assert_eq!(sanitize_order_function("RAND();"), "RAND");
    }

    #[test]
    fn test_field_type_sanitizer() {
        assert_eq!(sanitize_field_type("int(10)"), "INT(10)");
        assert_eq!(sanitize_field_type("varchar(255) not null"), "VARCHAR(255) NOT NULL");
        assert_eq!(sanitize_field_type("text; drop table x"), "TEXT DROP TABLE X");
        assert_eq!(sanitize_field_type("decimal(10,2)"), "DECIMAL(102)");
    }
}
