//! RFC-5988 `Link` header pagination with an origin trust boundary.
//!
//! GitHub list endpoints return the next page as a full URL in the `Link`
//! header. Because that URL comes from the response body's trust domain, it
//! is only followed when it resolves to the exact origin of the configured
//! API root and carries no embedded credentials. Anything else fails fast
//! before a second authenticated request is issued.

use url::Url;

use crate::error::ExportError;

/// Extract the `rel="next"` URL from a `Link` header, if present.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repos/o/r/issues/1/comments?page=2>; rel="next", <...>; rel="last"`
#[must_use]
pub fn next_link(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        let part = part.trim();

        let mut url = None;
        let mut rel = None;
        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if rel == Some("next")
            && let Some(url) = url
        {
            return Some(url.to_string());
        }
    }
    None
}

/// Validate a next-page URL against the configured API root.
///
/// The URL must parse, match the root's origin exactly (scheme, host, and
/// port), and embed no username or password.
pub fn trusted_next_url(api_root: &Url, candidate: &str) -> Result<Url, ExportError> {
    let url = Url::parse(candidate)
        .map_err(|_| ExportError::UntrustedPaginationOrigin(candidate.to_string()))?;

    if url.origin() != api_root.origin() {
        return Err(ExportError::UntrustedPaginationOrigin(candidate.to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ExportError::UntrustedPaginationOrigin(candidate.to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("https://api.github.com").unwrap()
    }

    #[test]
    fn parses_next_relation_from_multi_link_header() {
        let header = "<https://api.github.com/repos/o/r/pulls/1/files?per_page=100&page=2>; rel=\"next\", \
                      <https://api.github.com/repos/o/r/pulls/1/files?per_page=100&page=5>; rel=\"last\"";
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://api.github.com/repos/o/r/pulls/1/files?per_page=100&page=2")
        );
    }

    #[test]
    fn returns_none_without_a_next_relation() {
        let header = "<https://api.github.com/x?page=1>; rel=\"first\", \
                      <https://api.github.com/x?page=3>; rel=\"last\"";
        assert_eq!(next_link(header), None);
        assert_eq!(next_link(""), None);
    }

    #[test]
    fn same_origin_next_url_is_trusted() {
        let url = trusted_next_url(&root(), "https://api.github.com/repos/o/r/issues?page=2")
            .expect("same origin");
        assert_eq!(url.path(), "/repos/o/r/issues");
    }

    #[test]
    fn cross_origin_next_url_is_rejected() {
        let err = trusted_next_url(&root(), "https://evil.example/repos/o/r/issues?page=2")
            .expect_err("cross origin");
        assert!(matches!(err, ExportError::UntrustedPaginationOrigin(_)));
    }

    #[test]
    fn scheme_and_port_changes_are_rejected() {
        assert!(trusted_next_url(&root(), "http://api.github.com/x").is_err());
        assert!(trusted_next_url(&root(), "https://api.github.com:8443/x").is_err());
    }

    #[test]
    fn embedded_credentials_are_rejected_even_on_the_same_origin() {
        let err = trusted_next_url(&root(), "https://user:pw@api.github.com/x?page=2")
            .expect_err("credentials");
        assert!(matches!(err, ExportError::UntrustedPaginationOrigin(_)));
    }

    #[test]
    fn unparseable_next_url_is_rejected() {
        assert!(trusted_next_url(&root(), "not a url").is_err());
    }
}
