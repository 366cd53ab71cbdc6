//! SQL identifier sanitizing.
//!
//! Table and column names are embedded into SQL text, so every identifier that
//! reaches a builder goes through [`sanitize_ident`] first. Values never do:
//! they are always bound as positional parameters.
//!
//! Sanitizing keeps `[A-Za-z0-9_]` and silently drops everything else, so
//! dotted or quoted names are flattened:
//!
//! ```
//! use pgmodel::ident::sanitize_ident;
//!
//! assert_eq!(sanitize_ident("users; DROP TABLE x"), "usersDROPTABLEx");
//! assert_eq!(sanitize_ident("public.users"), "publicusers");
//! ```
//!
//! An identifier that sanitizes to the empty string renders invalid SQL; that is
//! left to the database to reject.

/// Whether `c` may appear in an embedded identifier.
#[inline]
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Strip every character outside `[A-Za-z0-9_]`.
pub fn sanitize_ident(s: &str) -> String {
    s.chars().filter(|&c| is_ident_char(c)).collect()
}

/// Sanitize a list of identifiers, preserving order.
pub fn sanitize_idents<S: AsRef<str>>(idents: &[S]) -> Vec<String> {
    idents.iter().map(|s| sanitize_ident(s.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_subsequence(needle: &str, haystack: &str) -> bool {
        let mut rest = haystack.chars();
        needle.chars().all(|c| rest.any(|h| h == c))
    }

    #[test]
    fn keeps_plain_identifiers() {
        assert_eq!(sanitize_ident("users"), "users");
        assert_eq!(sanitize_ident("created_at"), "created_at");
        assert_eq!(sanitize_ident("Col9"), "Col9");
    }

    #[test]
    fn drops_punctuation_and_whitespace() {
        assert_eq!(sanitize_ident("id; DROP TABLE users--"), "idDROPTABLEusers");
        assert_eq!(sanitize_ident("\"quoted\""), "quoted");
        assert_eq!(sanitize_ident("a.b"), "ab");
        assert_eq!(sanitize_ident("name'); --"), "name");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(sanitize_ident("naïve_col"), "nave_col");
        assert_eq!(sanitize_ident("表"), "");
    }

    #[test]
    fn empty_result_is_allowed() {
        assert_eq!(sanitize_ident("$$$"), "");
        assert_eq!(sanitize_ident(""), "");
    }

    #[test]
    fn output_is_restricted_subsequence() {
        let inputs = [
            "users",
            "public.users",
            "a-b-c",
            "1=1 OR 1=1",
            "x\0y",
            "tab\tle",
            "emoji😀col",
            "__init__",
            "`backtick`",
            "Ünïcödé",
        ];
        for input in inputs {
            let out = sanitize_ident(input);
            assert!(out.chars().all(is_ident_char), "{input:?} -> {out:?}");
            assert!(is_subsequence(&out, input), "{input:?} -> {out:?}");
        }
    }

    #[test]
    fn sanitize_list_preserves_order() {
        assert_eq!(
            sanitize_idents(&["id", "user name", "e-mail"]),
            vec!["id", "username", "email"]
        );
    }
}
