//! Address header parsing.

use serde::{Deserialize, Serialize};

/// A parsed mailbox address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    /// Lower-cased email; empty when the input was malformed.
    pub email: String,
    /// Display name with original casing.
    pub name: Option<String>,
}

impl ParsedAddress {
    fn malformed() -> Self {
        Self::default()
    }
}

/// Parses a single `Display Name <email>` or bare `email` entry.
///
/// Never fails: malformed input yields an empty email and no name.
#[must_use]
pub fn parse_address(raw: &str) -> ParsedAddress {
    let raw = raw.trim();
    if raw.is_empty() {
        return ParsedAddress::malformed();
    }

    match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let email = raw[open + 1..close].trim().to_lowercase();
            if email.is_empty() {
                return ParsedAddress::malformed();
            }
            let name = raw[..open].trim().trim_matches('"').trim();
            ParsedAddress {
                email,
                name: (!name.is_empty()).then(|| name.to_string()),
            }
        }
        (None, None) => ParsedAddress {
            email: raw.trim_matches('"').trim().to_lowercase(),
            name: None,
        },
        _ => ParsedAddress::malformed(),
    }
}

/// Parses a comma separated address header.
///
/// Commas inside quoted display names or angle brackets do not split.
/// Entries without an email are dropped and duplicates keep their first
/// occurrence.
#[must_use]
pub fn parse_address_list(raw: &str) -> Vec<ParsedAddress> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(ch);
            }
            ',' if !in_quotes && !in_angle => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    entries.push(current);

    let mut addresses: Vec<ParsedAddress> = Vec::new();
    for entry in entries {
        let parsed = parse_address(&entry);
        if !parsed.email.is_empty() && !addresses.iter().any(|a| a.email == parsed.email) {
            addresses.push(parsed);
        }
    }
    addresses
}
