//! Splits a combined `container/object…` path into its two parts.
//!
//! Used wherever a container/object pair arrives as a single string instead
//! of separately routed path segments: the `Destination` and `X-Copy-From`
//! headers, and the `X-Object-Manifest` header.

use percent_encoding::percent_decode_str;

/// A parsed `container/object` path.
///
/// `object` may be empty if the input carried no second segment.
pub struct Entities {
    pub container: String,
    pub object: String,
}

impl Entities {
    /// Percent-decode `raw`, then split it on the first `/` into a container
    /// name and an object key (which may itself contain further `/`s).
    pub fn parse(raw: &str) -> Self {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();

        match decoded.split_once('/') {
            Some((container, object)) => Entities {
                container: container.to_string(),
                object: object.to_string(),
            },
            None => Entities { container: decoded.into_owned(), object: String::new() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let parsed = Entities::parse("Xcontainer/a1/b2/c3.txt");
        assert_eq!(parsed.container, "Xcontainer");
        assert_eq!(parsed.object, "a1/b2/c3.txt");
    }

    #[test]
    fn parse_container_only() {
        let parsed = Entities::parse("Xcontainer");
        assert_eq!(parsed.container, "Xcontainer");
        assert_eq!(parsed.object, "");
    }

    #[test]
    fn parse_percent_encoded() {
        let parsed = Entities::parse("Xcontainer/a%20b/c.txt");
        assert_eq!(parsed.container, "Xcontainer");
        assert_eq!(parsed.object, "a b/c.txt");
    }

    #[test]
    fn parse_empty() {
        let parsed = Entities::parse("");
        assert_eq!(parsed.container, "");
        assert_eq!(parsed.object, "");
    }
}
