//! Credentials carried by invite and recovery links.
//!
//! Links come in several shapes depending on which mail template and redirect
//! produced them. Each shape has a parser; they run in order and the first
//! one that finds an access token wins.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCredentials {
    pub access_token: String,
    /// Empty when the link carried none.
    pub refresh_token: String,
    /// `invite`, `recovery`, ... when present.
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("No access token found in URL")]
    NoToken,

    #[error("Invalid token format")]
    InvalidEncoding,

    /// The auth service redirected with an error instead of tokens.
    #[error("{0}")]
    Rejected(String),
}

type Pairs = Vec<(String, String)>;
type Parser = fn(&LinkParts) -> Result<Option<LinkCredentials>, LinkError>;

const PARSERS: &[(&str, Parser)] = &[
    ("fragment", from_fragment),
    ("query", from_query),
    ("encoded-token", from_encoded_token),
];

struct LinkParts {
    query: Pairs,
    fragment: Pairs,
}

impl LinkParts {
    fn split(link: &str) -> Self {
        let (rest, fragment) = link.split_once('#').unwrap_or((link, ""));
        let query = rest.split_once('?').map_or("", |(_, q)| q);
        Self {
            query: parse_pairs(query),
            fragment: parse_pairs(fragment),
        }
    }
}

/// `application/x-www-form-urlencoded` pairs; undecodable values are kept raw.
fn parse_pairs(input: &str) -> Pairs {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn get<'a>(pairs: &'a Pairs, key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn credentials(pairs: &Pairs) -> Option<LinkCredentials> {
    let access_token = get(pairs, "access_token")?;
    Some(LinkCredentials {
        access_token: access_token.to_string(),
        refresh_token: get(pairs, "refresh_token").unwrap_or_default().to_string(),
        kind: get(pairs, "type").map(str::to_string),
    })
}

fn from_fragment(parts: &LinkParts) -> Result<Option<LinkCredentials>, LinkError> {
    Ok(credentials(&parts.fragment))
}

fn from_query(parts: &LinkParts) -> Result<Option<LinkCredentials>, LinkError> {
    Ok(credentials(&parts.query))
}

/// `?token=<base64 of "access_token=...&refresh_token=...">`
fn from_encoded_token(parts: &LinkParts) -> Result<Option<LinkCredentials>, LinkError> {
    let Some(token) = get(&parts.query, "token") else {
        return Ok(None);
    };

    // Query decoding turned any '+' into a space.
    let token = token.trim().replace(' ', "+");
    let bytes = STANDARD
        .decode(&token)
        .or_else(|_| URL_SAFE_NO_PAD.decode(token.trim_end_matches('=')))
        .map_err(|_| LinkError::InvalidEncoding)?;
    let decoded = String::from_utf8(bytes).map_err(|_| LinkError::InvalidEncoding)?;

    Ok(credentials(&parse_pairs(&decoded)))
}

/// Extracts the token pair from an inbound link.
pub fn parse_invite_link(link: &str) -> Result<LinkCredentials, LinkError> {
    let parts = LinkParts::split(link);

    for (name, parser) in PARSERS {
        if let Some(found) = parser(&parts)? {
            tracing::debug!(strategy = *name, "invite credentials found");
            return Ok(found);
        }
    }

    let description = get(&parts.fragment, "error_description")
        .or_else(|| get(&parts.query, "error_description"));
    match description {
        Some(description) => Err(LinkError::Rejected(description.to_string())),
        None => Err(LinkError::NoToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_link() {
        let creds = parse_invite_link(
            "https://app.test/set-password#access_token=abc&refresh_token=def&type=invite",
        )
        .unwrap();
        assert_eq!(creds.access_token, "abc");
        assert_eq!(creds.refresh_token, "def");
        assert_eq!(creds.kind.as_deref(), Some("invite"));
    }

    #[test]
    fn test_fragment_wins_over_query() {
        let creds =
            parse_invite_link("https://app.test/set-password?access_token=q#access_token=f")
                .unwrap();
        assert_eq!(creds.access_token, "f");
    }

    #[test]
    fn test_direct_query_link() {
        let creds =
            parse_invite_link("https://app.test/set-password?access_token=a%2Bb&type=recovery")
                .unwrap();
        assert_eq!(creds.access_token, "a+b");
        assert_eq!(creds.refresh_token, "");
        assert_eq!(creds.kind.as_deref(), Some("recovery"));
    }

    #[test]
    fn test_encoded_token_link() {
        let payload = STANDARD.encode("access_token=xyz&refresh_token=r1&type=invite");
        let link = format!(
            "https://app.test/set-password?token={}",
            urlencoding::encode(&payload)
        );
        let creds = parse_invite_link(&link).unwrap();
        assert_eq!(creds.access_token, "xyz");
        assert_eq!(creds.refresh_token, "r1");
    }

    #[test]
    fn test_undecodable_token() {
        assert_eq!(
            parse_invite_link("https://app.test/set-password?token=%%%not-base64"),
            Err(LinkError::InvalidEncoding)
        );
    }

    #[test]
    fn test_no_token() {
        assert_eq!(
            parse_invite_link("https://app.test/set-password"),
            Err(LinkError::NoToken)
        );
        assert_eq!(
            parse_invite_link("https://app.test/set-password#type=invite&access_token="),
            Err(LinkError::NoToken)
        );
    }

    #[test]
    fn test_error_redirect() {
        let err = parse_invite_link(
            "https://app.test/set-password#error=access_denied&error_code=otp_expired&error_description=Email+link+is+invalid+or+has+expired",
        )
        .unwrap_err();
        assert_eq!(
            err,
            LinkError::Rejected("Email link is invalid or has expired".to_string())
        );
    }
}
