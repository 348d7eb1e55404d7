//! Header parsing helpers for `From` and `List-Unsubscribe`

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Bracketed targets in a List-Unsubscribe header, e.g. `<mailto:...>, <https://...>`
static BRACKETED_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap());

/// Bare address anywhere in a header value
static BARE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// Parse email header in "Name <email@example.com>" format
pub fn parse_email_header(header: &str) -> Option<(String, String)> {
    if let Some(start) = header.find('<') {
        if let Some(end) = header[start..].find('>') {
            let name = header[..start].trim().trim_matches('"').to_string();
            let email = header[start + 1..start + end].trim().to_string();
            return Some((name, email));
        }
    }
    None
}

/// Split a From header into (display name, lowercase address)
///
/// Falls back to the first address-looking token, and uses the address as
/// the display name when the header has none.
pub fn parse_sender(from: &str) -> (String, String) {
    let (name, email) = match parse_email_header(from) {
        Some((name, email)) => (name, email),
        None => {
            let email = BARE_ADDRESS
                .find(from)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (String::new(), email)
        }
    };

    let email = email.to_lowercase();
    let name = if name.is_empty() { email.clone() } else { name };
    (name, email)
}

/// Extract just the sender address, if there is a usable one
pub fn sender_address(from: &str) -> Option<String> {
    let (_, email) = parse_sender(from);
    if email.contains('@') {
        Some(email)
    } else {
        None
    }
}

/// Unsubscribe targets announced by a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribeTargets {
    /// Full `mailto:` URI
    pub mailto: Option<String>,
    /// http(s) link
    pub link: Option<String>,
    /// `List-Unsubscribe-Post` announced RFC 8058 one-click
    pub one_click: bool,
}

impl UnsubscribeTargets {
    pub fn is_empty(&self) -> bool {
        self.mailto.is_none() && self.link.is_none()
    }

    /// Link that may receive the one-click POST
    ///
    /// RFC 8058 requires https; plain http is only accepted when
    /// `allow_insecure` is set.
    pub fn one_click_link(&self, allow_insecure: bool) -> Option<&str> {
        if !self.one_click {
            return None;
        }
        let link = self.link.as_deref()?;
        let scheme_ok = match Url::parse(link) {
            Ok(url) => url.scheme() == "https" || (allow_insecure && url.scheme() == "http"),
            Err(_) => false,
        };
        scheme_ok.then_some(link)
    }
}

/// Parse `List-Unsubscribe` (and the optional `List-Unsubscribe-Post`)
///
/// The first mailto and the first http(s) target win.
pub fn parse_list_unsubscribe(header: &str, post_header: Option<&str>) -> UnsubscribeTargets {
    let mut candidates: Vec<&str> = BRACKETED_TARGET
        .captures_iter(header)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
        .collect();

    // Some senders omit the angle brackets
    if candidates.is_empty() {
        candidates = header
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
    }

    let mut targets = UnsubscribeTargets::default();
    for candidate in candidates {
        let Ok(url) = Url::parse(candidate) else {
            continue;
        };
        match url.scheme() {
            "mailto" if targets.mailto.is_none() => targets.mailto = Some(candidate.to_string()),
            "http" | "https" if targets.link.is_none() => {
                targets.link = Some(candidate.to_string())
            }
            _ => {}
        }
    }

    targets.one_click = targets.link.is_some()
        && post_header
            .map(|v| v.to_lowercase().contains("list-unsubscribe=one-click"))
            .unwrap_or(false);

    targets
}

/// Recipient and subject of a `mailto:` unsubscribe target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailtoTarget {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Parse a `mailto:` URI, defaulting the subject to "unsubscribe"
pub fn parse_mailto(uri: &str) -> Option<MailtoTarget> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "mailto" {
        return None;
    }

    let to = url.path().trim().to_string();
    if !to.contains('@') {
        return None;
    }

    let mut subject = None;
    let mut body = None;
    for (key, value) in url.query_pairs() {
        match key.to_lowercase().as_str() {
            "subject" => subject = Some(value.into_owned()),
            "body" => body = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(MailtoTarget {
        to,
        subject: subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "unsubscribe".to_string()),
        body: body.unwrap_or_else(|| "unsubscribe".to_string()),
    })
}

/// Address part of a `mailto:` URI
pub fn mailto_address(uri: &str) -> Option<String> {
    parse_mailto(uri).map(|m| m.to)
}
