use crate::prelude::*;
use std::fmt;

/// Opaque tenant identifier; the unit of backoff granularity. Validated
/// at construction so the rest of the crate can trust it's
/// safe to splice directly into a filename: filesystem-safe characters
/// only, and never `_` or `.` (those are the event-file-name field
/// separators, see `naming`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ServiceKey {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        static VALIDATE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+$").unwrap());

        if !VALIDATE.is_match(s) {
            return Err(anyhow!("invalid service key {:?}", s));
        }
        Ok(ServiceKey(s.to_owned()))
    }
}

try_from_str_boilerplate!(ServiceKey);

impl Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ServiceKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ServiceKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServiceKey::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}
