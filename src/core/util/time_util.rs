use chrono::{DateTime, Utc};

use crate::core::client::kube_resources::{ObjectMeta, Time};

/// Convert a Kubernetes timestamp into a chrono UTC instant.
///
/// Goes through the serialized RFC 3339 form so it does not depend on which
/// date library backs `Time`.
pub fn to_utc(time: &Time) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(time).ok()?;
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Creation timestamp of any object, if set.
pub fn created_at(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    meta.creation_timestamp.as_ref().and_then(to_utc)
}
