//! Identifier case conventions.
//!
//! The IR stores functions, methods, fields, parameters and locals in
//! `snake_case`. Readers normalize into that form and writers convert out of
//! it to whatever the target language expects.

/// Split an identifier into lowercase words.
///
/// Handles `snake_case`, `camelCase`, `PascalCase` and acronym runs
/// (`HTTPServer` splits as `http`, `server`).
fn words(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Leading underscores mark private names in several languages; keep them.
fn split_prefix(ident: &str) -> (&str, &str) {
    let trimmed = ident.trim_start_matches('_');
    (&ident[..ident.len() - trimmed.len()], trimmed)
}

pub fn to_snake_case(ident: &str) -> String {
    let (prefix, rest) = split_prefix(ident);
    format!("{prefix}{}", words(rest).join("_"))
}

pub fn to_pascal_case(ident: &str) -> String {
    let (_, rest) = split_prefix(ident);
    words(rest).iter().map(|w| capitalize(w)).collect()
}

pub fn to_camel_case(ident: &str) -> String {
    let (prefix, rest) = split_prefix(ident);
    let mut out = String::from(prefix);
    for (i, w) in words(rest).iter().enumerate() {
        if i == 0 {
            out.push_str(w);
        } else {
            out.push_str(&capitalize(w));
        }
    }
    out
}

pub fn to_screaming_snake_case(ident: &str) -> String {
    to_snake_case(ident).to_uppercase()
}

/// `MAX_RETRIES`, `PI`, `HTTP2`.
pub fn is_screaming_case(ident: &str) -> bool {
    ident.chars().any(|c| c.is_ascii_uppercase())
        && ident
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && ident.len() > 1
}

/// Whether an identifier reads as a type or namespace (`User`, `Console`).
pub fn is_type_like(ident: &str) -> bool {
    ident.chars().next().is_some_and(|c| c.is_uppercase()) && !is_screaming_case(ident)
}

/// Canonical IR spelling of a value-level name.
///
/// Type-like and SCREAMING_CASE names are preserved; everything else
/// becomes `snake_case`.
pub fn canonical(ident: &str) -> String {
    if is_screaming_case(ident) || is_type_like(ident) {
        ident.to_string()
    } else {
        to_snake_case(ident)
    }
}

/// Canonical spelling for a declared function, method, field or parameter.
///
/// Unlike [`canonical`], PascalCase is converted too (Go and C# declare
/// members that way).
pub fn canonical_member(ident: &str) -> String {
    if is_screaming_case(ident) && ident.len() > 2 {
        ident.to_string()
    } else {
        to_snake_case(ident)
    }
}

/// Canonical spelling of an enum variant.
pub fn canonical_variant(ident: &str) -> String {
    to_snake_case(ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("getUserName"), "get_user_name");
        assert_eq!(to_snake_case("GetUser"), "get_user");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("_private"), "_private");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("get_name"), "GetName");
        assert_eq!(to_pascal_case("id"), "Id");
        assert_eq!(to_pascal_case("FetchData"), "FetchData");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("user_name"), "userName");
        assert_eq!(to_camel_case("items"), "items");
        assert_eq!(to_camel_case("_cache_size"), "_cacheSize");
    }

    #[test]
    fn test_screaming() {
        assert!(is_screaming_case("MAX_RETRIES"));
        assert!(!is_screaming_case("MaxRetries"));
        assert!(!is_screaming_case("x"));
        assert_eq!(to_screaming_snake_case("maxRetries"), "MAX_RETRIES");
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("userName"), "user_name");
        assert_eq!(canonical("User"), "User");
        assert_eq!(canonical("MAX_SIZE"), "MAX_SIZE");
        assert_eq!(canonical_member("GetName"), "get_name");
        assert_eq!(canonical_variant("Pending"), "pending");
    }
}
