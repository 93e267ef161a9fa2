//! Resource references used by embeds and links.
//!
//! A reference is `content-item://<id>`, `location://<id>` or any absolute
//! URL, each with an optional `#fragment`.

use std::fmt;
use std::str::FromStr;

use crate::error::ReferenceError;

pub const CONTENT_ITEM_SCHEME: &str = "content-item";
pub const LOCATION_SCHEME: &str = "location";

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ContentItem,
    Location,
    /// Opaque URL, never resolved.
    Url,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentItem => CONTENT_ITEM_SCHEME,
            Self::Location => LOCATION_SCHEME,
            Self::Url => "url",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `xlink:href` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    /// Item or location id; the URL without fragment for [`ResourceKind::Url`].
    pub id: String,
    pub fragment: Option<String>,
}

impl ResourceReference {
    pub fn parse(href: &str) -> Result<Self, ReferenceError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (target, fragment) = match href.split_once('#') {
            Some((target, fragment)) => (target, Some(fragment.to_string())),
            None => (href, None),
        };

        for (scheme, kind) in [
            (CONTENT_ITEM_SCHEME, ResourceKind::ContentItem),
            (LOCATION_SCHEME, ResourceKind::Location),
        ] {
            let Some(id) = target
                .strip_prefix(scheme)
                .and_then(|rest| rest.strip_prefix("://"))
            else {
                continue;
            };
            let id = id.trim_end_matches('/');
            if id.is_empty() {
                return Err(ReferenceError::MissingIdentifier {
                    href: href.to_string(),
                });
            }
            return Ok(Self {
                kind,
                id: id.to_string(),
                fragment,
            });
        }

        url::Url::parse(target).map_err(|e| ReferenceError::InvalidUrl {
            href: href.to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            kind: ResourceKind::Url,
            id: target.to_string(),
            fragment,
        })
    }

    /// Whether this reference can be resolved through a renderer or link resolver.
    pub fn is_internal(&self) -> bool {
        self.kind != ResourceKind::Url
    }

    /// Append `#fragment` to a resolved URL.
    pub fn with_fragment(&self, url: &str) -> String {
        match &self.fragment {
            Some(fragment) => format!("{url}#{fragment}"),
            None => url.to_string(),
        }
    }
}

impl FromStr for ResourceReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Url => f.write_str(&self.id)?,
            kind => write!(f, "{kind}://{}", self.id)?,
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn content_item_with_fragment() {
        let reference = ResourceReference::parse("content-item://78#intro").unwrap();
        assert_eq!(reference.kind, ResourceKind::ContentItem);
        assert_eq!(reference.id, "78");
        assert_eq!(reference.fragment.as_deref(), Some("intro"));
        assert_eq!(reference.to_string(), "content-item://78#intro");
    }

    #[test]
    fn location_without_fragment() {
        let reference: ResourceReference = "location://42".parse().unwrap();
        assert_eq!(reference.kind, ResourceKind::Location);
        assert_eq!(reference.id, "42");
        assert!(reference.fragment.is_none());
        assert!(reference.is_internal());
    }

    #[test]
    fn absolute_url_is_opaque() {
        let reference = ResourceReference::parse("https://example.com/a#b").unwrap();
        assert_eq!(reference.kind, ResourceKind::Url);
        assert_eq!(reference.id, "https://example.com/a");
        assert!(!reference.is_internal());
    }

    #[test]
    fn missing_identifier_is_an_error() {
        assert_eq!(
            ResourceReference::parse("content-item://"),
            Err(ReferenceError::MissingIdentifier {
                href: "content-item://".to_string()
            })
        );
        assert_eq!(ResourceReference::parse("  "), Err(ReferenceError::Empty));
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(matches!(
            ResourceReference::parse("/about"),
            Err(ReferenceError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn fragment_is_reattached() {
        let reference = ResourceReference::parse("location://5#top").unwrap();
        assert_eq!(reference.with_fragment("/contact"), "/contact#top");
    }
}
