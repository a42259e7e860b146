//! Helpers for working with distinguished names.
//!
//! DNs are handled as plain strings. Comparison is case-insensitive on the
//! whole string, which is good enough for the attribute types used here
//! (`uid`, `cn`, `ou`, `dc`).

/// Escape a value for use inside an RDN.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (index, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' | ' ' if index == 0 => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reverse [`escape_value`].
pub fn unescape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Build a DN from a naming attribute, an unescaped value and a parent DN.
pub fn build(attribute: &str, value: &str, parent: &str) -> String {
    if parent.is_empty() {
        format!("{}={}", attribute, escape_value(value))
    } else {
        format!("{}={},{}", attribute, escape_value(value), parent)
    }
}

/// Split a DN into its RDN components, honouring escaped commas.
pub fn explode(dn: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in dn.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == ',' {
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Split an RDN component (`cn=foo`) into attribute and unescaped value.
pub fn split_rdn(rdn: &str) -> Option<(String, String)> {
    let (attribute, value) = rdn.split_once('=')?;
    Some((attribute.trim().to_lowercase(), unescape_value(value.trim())))
}

/// The unescaped value of the first RDN of `dn`.
pub fn rdn_value(dn: &str) -> Option<String> {
    explode(dn).first().and_then(|rdn| split_rdn(rdn)).map(|(_, v)| v)
}

/// The DN of the parent container, or `None` for a single-component DN.
pub fn parent(dn: &str) -> Option<String> {
    let parts = explode(dn);
    if parts.len() < 2 {
        return None;
    }
    Some(parts[1..].join(","))
}

/// Normalised form used for comparisons and map keys.
pub fn normalize(dn: &str) -> String {
    explode(dn).join(",").to_lowercase()
}

/// Case-insensitive DN equality.
pub fn same(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Whether `dn` equals `base` or lies below it.
pub fn is_at_or_below(dn: &str, base: &str) -> bool {
    let dn = normalize(dn);
    let base = normalize(base);
    dn == base || dn.ends_with(&format!(",{}", base))
}

/// Whether `dn` lies strictly below `base`.
pub fn is_below(dn: &str, base: &str) -> bool {
    let dn = normalize(dn);
    let base = normalize(base);
    dn.ends_with(&format!(",{}", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip_of_special_characters() {
        let value = "Smith, John+Co";
        let escaped = escape_value(value);
        assert_eq!(escaped, "Smith\\, John\\+Co");
        assert_eq!(unescape_value(&escaped), value);
    }

    #[test]
    fn test_explode_respects_escaped_commas() {
        let dn = build("cn", "a,b", "cn=groups,dc=example,dc=com");
        let parts = explode(&dn);
        assert_eq!(parts.len(), 4);
        assert_eq!(rdn_value(&dn).as_deref(), Some("a,b"));
        assert_eq!(parent(&dn).as_deref(), Some("cn=groups,dc=example,dc=com"));
    }

    #[test]
    fn test_hierarchy_checks() {
        let base = "dc=example,dc=com";
        assert!(is_at_or_below("ou=OU1,DC=Example,dc=com", base));
        assert!(is_at_or_below(base, base));
        assert!(!is_below(base, base));
        assert!(!is_at_or_below("dc=other,dc=com", base));
        assert!(same("OU=OU1, dc=example,dc=com", "ou=ou1,dc=example,dc=com"));
    }
}
