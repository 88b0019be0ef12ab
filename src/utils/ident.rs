// src/utils/ident.rs

//! arXiv identifier helpers.

use std::sync::OnceLock;

use regex::Regex;

const ARXIV_URL: &str = "http://arxiv.org/";

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"v\d+$").expect("version suffix pattern is valid"))
}

/// Strip a trailing version suffix from an identifier.
///
/// # Examples
/// ```
/// use arxiv_harvester::utils::ident::strip_version;
///
/// assert_eq!(strip_version("2108.09112v2"), "2108.09112");
/// assert_eq!(strip_version("cs/0112017"), "cs/0112017");
/// ```
pub fn strip_version(id: &str) -> &str {
    match version_suffix().find(id) {
        Some(found) => &id[..found.start()],
        None => id,
    }
}

/// Version-independent landing page URL for an identifier.
pub fn abs_url(id: &str) -> String {
    format!("{ARXIV_URL}abs/{}", strip_version(id))
}

/// Version-independent PDF URL for an identifier.
pub fn pdf_url(id: &str) -> String {
    format!("{ARXIV_URL}pdf/{}.pdf", strip_version(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("2108.09112v1"), "2108.09112");
        assert_eq!(strip_version("2108.09112v12"), "2108.09112");
        assert_eq!(strip_version("2108.09112"), "2108.09112");
    }

    #[test]
    fn test_strip_version_old_style_id() {
        // "v" inside the archive name must survive
        assert_eq!(strip_version("cond-mat/0703772v2"), "cond-mat/0703772");
        assert_eq!(strip_version("nlin/0001023"), "nlin/0001023");
    }

    #[test]
    fn test_urls() {
        assert_eq!(abs_url("2108.09112v1"), "http://arxiv.org/abs/2108.09112");
        assert_eq!(
            pdf_url("2108.09112v1"),
            "http://arxiv.org/pdf/2108.09112.pdf"
        );
    }
}
