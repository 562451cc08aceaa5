//! Filename grammar for handler files
//!
//! A handler file is named `<handler>.<method>.<ext>`:
//! - exactly three dot-separated parts, none empty
//! - `method` is a lowercase token from [`HttpMethod`]'s allow-list
//! - `ext` is one of the configured source extensions
//!
//! Everything else is not a handler file. That is a silent skip, never an error.

use super::method::HttpMethod;

/// Handler name that contributes no path segment
pub const INDEX_HANDLER: &str = "index";

/// A successfully parsed handler filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFilename<'a> {
    pub handler_name: &'a str,
    pub method: HttpMethod,
    pub extension: &'a str,
}

impl<'a> ParsedFilename<'a> {
    /// URL segment contributed by this file (`None` for `index`)
    pub fn segment(&self) -> Option<&'a str> {
        if self.handler_name == INDEX_HANDLER {
            None
        } else {
            Some(self.handler_name)
        }
    }
}

/// Parses a bare file name (no directories) into handler name and method
///
/// # Examples
///
/// ```
/// use rhtmx_autoroute::route::{parse_filename, HttpMethod};
///
/// let exts = vec!["rs".to_string()];
/// let parsed = parse_filename("list.get.rs", &exts).unwrap();
/// assert_eq!(parsed.handler_name, "list");
/// assert_eq!(parsed.method, HttpMethod::Get);
///
/// assert!(parse_filename("list.GET.rs", &exts).is_none());
/// assert!(parse_filename("list.rs", &exts).is_none());
/// ```
pub fn parse_filename<'a>(file_name: &'a str, extensions: &[String]) -> Option<ParsedFilename<'a>> {
    let mut parts = file_name.split('.');
    let (handler_name, method, extension) = (parts.next()?, parts.next()?, parts.next()?);

    if parts.next().is_some() {
        return None;
    }

    if handler_name.is_empty() || !is_method_token(method) {
        return None;
    }

    if !extensions.iter().any(|ext| ext == extension) {
        return None;
    }

    Some(ParsedFilename {
        handler_name,
        method: method.parse().ok()?,
        extension,
    })
}

fn is_method_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn exts() -> Vec<String> {
        vec!["rs".to_string(), "ts".to_string()]
    }

    #[rstest]
    #[case("list.get.rs", "list", HttpMethod::Get)]
    #[case("create.post.ts", "create", HttpMethod::Post)]
    #[case("index.get.rs", "index", HttpMethod::Get)]
    #[case("[id].delete.rs", "[id]", HttpMethod::Delete)]
    #[case("user-profile.patch.rs", "user-profile", HttpMethod::Patch)]
    fn test_valid_names(#[case] name: &str, #[case] handler: &str, #[case] method: HttpMethod) {
        let parsed = parse_filename(name, &exts()).unwrap();
        assert_eq!(parsed.handler_name, handler);
        assert_eq!(parsed.method, method);
    }

    #[rstest]
    #[case("list.rs")]
    #[case("list.GET.rs")]
    #[case("list.Get.rs")]
    #[case("list.fetch.rs")]
    #[case("list.get.v2.rs")]
    #[case("list.get.py")]
    #[case(".get.rs")]
    #[case("list..rs")]
    #[case("list.get.")]
    #[case("list.g3t.rs")]
    #[case("middleware.rs")]
    fn test_rejected_names(#[case] name: &str) {
        assert!(parse_filename(name, &exts()).is_none(), "{name} should not parse");
    }

    #[test]
    fn test_index_has_no_segment() {
        let parsed = parse_filename("index.get.rs", &exts()).unwrap();
        assert_eq!(parsed.segment(), None);

        let parsed = parse_filename("list.get.rs", &exts()).unwrap();
        assert_eq!(parsed.segment(), Some("list"));
    }
}
