//! Server-side primary-key generation.

use chrono::{DateTime, Utc};

/// Generate a primary key: `<prefix><yyyyMMddHHmmssSSS><4 hex>`
///
/// The timestamp keeps keys roughly sortable; the random suffix separates
/// keys generated within the same millisecond.
pub fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}{}", prefix, now.format("%Y%m%d%H%M%S%3f"), &suffix[..4])
}
