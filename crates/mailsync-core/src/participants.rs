//! Conversation participant resolution.

use std::collections::BTreeSet;

use crate::normalize::{header_value, parse_address, parse_address_list};
use crate::remote::RemoteMessage;

/// Returns every sender, `To` and `Cc` email across the messages of a thread.
///
/// Emails are lower-cased and unique; malformed addresses are skipped.
#[must_use]
pub fn resolve_participants<'a, I>(messages: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a RemoteMessage>,
{
    let mut participants = BTreeSet::new();

    for payload in messages.into_iter().filter_map(|m| m.payload.as_ref()) {
        if let Some(from) = header_value(payload, "From") {
            participants.insert(parse_address(from).email);
        }
        for name in ["To", "Cc"] {
            if let Some(raw) = header_value(payload, name) {
                participants.extend(parse_address_list(raw).into_iter().map(|a| a.email));
            }
        }
    }

    participants.remove("");
    participants
}
