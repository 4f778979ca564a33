//! Short identifiers for sessions, messages and image files.

use uuid::Uuid;

/// Number of hex characters in a short id (32 bits of entropy).
pub const SHORT_ID_LEN: usize = 8;

/// Draw a fresh 8-character lowercase hex id from a v4 UUID.
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}

/// Draw short ids until `taken` reports one as free.
pub fn unique_short_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = short_id();
        if !taken(&id) {
            return id;
        }
    }
}
