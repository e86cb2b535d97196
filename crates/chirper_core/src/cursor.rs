//! Opaque pagination cursor codec.
//!
//! # Responsibility
//! - Encode the key attributes of the last record in a page into a compact,
//!   URL-safe token.
//! - Decode client-supplied tokens back into key attributes.
//!
//! # Invariants
//! - Empty token means start of collection.
//! - [`END_OF_COLLECTION`] means the collection is exhausted.
//! - A malformed token decodes to start of collection; it is never an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::warn;
use std::collections::BTreeMap;

/// Terminal marker token clients may echo back after the final page.
pub const END_OF_COLLECTION: &str = "null";

/// Ordered key attributes of one record.
pub type CursorKey = BTreeMap<String, String>;

/// Decoded pagination position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// No cursor supplied, or the supplied cursor could not be decoded.
    Start,
    /// Continue strictly after the record with these key attributes.
    After(CursorKey),
    /// Nothing left to read.
    End,
}

impl Cursor {
    /// Decodes a client token, recovering malformed input as [`Cursor::Start`].
    pub fn decode(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            return Self::Start;
        }
        if token == END_OF_COLLECTION {
            return Self::End;
        }

        match decode_key(token) {
            Some(key) if !key.is_empty() => Self::After(key),
            _ => {
                warn!(
                    "event=cursor_decode module=cursor status=recovered token_len={}",
                    token.len()
                );
                Self::Start
            }
        }
    }

    /// Builds a cursor positioned after a record with the given attributes.
    pub fn after<'a, I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        Self::After(
            attributes
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Returns the key attribute named `name`, if positioned after a record.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::After(key) => key.get(name).map(String::as_str),
            Self::Start | Self::End => None,
        }
    }

    /// Encodes this cursor into its external token form.
    pub fn encode(&self) -> String {
        match self {
            Self::Start => String::new(),
            Self::End => END_OF_COLLECTION.to_string(),
            Self::After(key) => encode_key(key),
        }
    }
}

/// Encodes key attributes into a URL-safe token.
pub fn encode_key(key: &CursorKey) -> String {
    // BTreeMap serialization to JSON cannot fail: keys and values are strings.
    let json = serde_json::to_vec(key).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_key(token: &str) -> Option<CursorKey> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// One page of results plus the cursor for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the final page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with no items and nothing after it.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    /// Next-page token for the wire; empty string on the final page.
    pub fn next_token(&self) -> &str {
        self.next_cursor.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cursor, Page, END_OF_COLLECTION};

    #[test]
    fn encoded_cursor_round_trips_key_attributes() {
        let cursor = Cursor::after([
            ("id", "r0xu2v1qrxa6ygtvf2rkjw".to_string()),
            ("author", "dan_abramov".to_string()),
        ]);
        let token = cursor.encode();

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        let decoded = Cursor::decode(&token);
        assert_eq!(decoded, cursor);
        assert_eq!(decoded.attribute("author"), Some("dan_abramov"));
    }

    #[test]
    fn empty_and_terminal_tokens() {
        assert_eq!(Cursor::decode(""), Cursor::Start);
        assert_eq!(Cursor::decode("   "), Cursor::Start);
        assert_eq!(Cursor::decode(END_OF_COLLECTION), Cursor::End);
        assert_eq!(Cursor::Start.encode(), "");
        assert_eq!(Cursor::End.encode(), END_OF_COLLECTION);
    }

    #[test]
    fn malformed_tokens_fall_back_to_start() {
        // Not base64, base64 of non-JSON, base64 of an empty object.
        for token in ["%%%not-a-token%%%", "aGVsbG8", "e30"] {
            assert_eq!(Cursor::decode(token), Cursor::Start, "token `{token}`");
        }
    }

    #[test]
    fn page_reports_final_page_as_empty_token() {
        let page: Page<u8> = Page::empty();
        assert!(page.is_last());
        assert_eq!(page.next_token(), "");
    }
}
