use chrono::{DateTime, Utc};
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;

/// `{prefix}-{unix millis}-{random suffix}`. Not sequential; collisions need
/// two ids in the same millisecond with the same 36-bit suffix.
pub(crate) fn new_id(prefix: &str, now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    let suffix = &random[..SUFFIX_LEN];
    format!("{prefix}-{}-{suffix}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::new_id;

    #[test]
    fn id_has_prefix_timestamp_and_suffix() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let id = new_id("post", now);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "post");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn ids_in_the_same_millisecond_differ() {
        let now = Utc::now();
        assert_ne!(new_id("reply", now), new_id("reply", now));
    }
}
