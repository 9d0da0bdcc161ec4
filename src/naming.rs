use crate::prelude::*;
use std::fmt;

/// The three possible states of an event file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Live, queued event.
    Pdq,
    /// Partially-written event, pre-rename.
    Tmp,
    /// Quarantined poison event.
    Err,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pdq => "pdq",
            EventKind::Tmp => "tmp",
            EventKind::Err => "err",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdq" => Ok(EventKind::Pdq),
            "tmp" => Ok(EventKind::Tmp),
            "err" => Ok(EventKind::Err),
            _ => Err(()),
        }
    }
}

/// `KIND_TSMS_SVCKEY.txt`.
pub fn encode(kind: EventKind, ts_ms: u64, svc_key: &ServiceKey) -> String {
    format!("{}_{}_{}.txt", kind.as_str(), ts_ms, svc_key)
}

/// Splits on `_` rather than parsing byte-by-byte: `svc_key` is validated
/// at construction to never contain `_` or `.`, so the third `splitn`
/// segment is always the whole key, verbatim, even though it comes after
/// the suffix has already been stripped.
pub fn decode(name: &str) -> Result<(EventKind, u64, ServiceKey), SpoolError> {
    let malformed = || SpoolError::MalformedName(name.to_string());

    let stem = name.strip_suffix(".txt").ok_or_else(malformed)?;
    let mut parts = stem.splitn(3, '_');
    let kind_str = parts.next().ok_or_else(malformed)?;
    let ts_str = parts.next().ok_or_else(malformed)?;
    let svc_str = parts.next().ok_or_else(malformed)?;

    let kind: EventKind = kind_str.parse().map_err(|_| malformed())?;
    let ts_ms: u64 = ts_str.parse().map_err(|_| malformed())?;
    let svc_key = ServiceKey::try_from(svc_str).map_err(|_| malformed())?;

    Ok((kind, ts_ms, svc_key))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_matches_the_wire_format() {
        let key: ServiceKey = "keyX".try_into().unwrap();
        assert_eq!(encode(EventKind::Pdq, 1000, &key), "pdq_1000_keyX.txt");
        assert_eq!(encode(EventKind::Tmp, 1000, &key), "tmp_1000_keyX.txt");
        assert_eq!(encode(EventKind::Err, 1000, &key), "err_1000_keyX.txt");
    }

    #[test]
    fn decode_roundtrips_through_encode() {
        let key: ServiceKey = "tenant-7".try_into().unwrap();
        for kind in [EventKind::Pdq, EventKind::Tmp, EventKind::Err] {
            let name = encode(kind, 1_700_000_000_123, &key);
            let (dkind, dts, dkey) = decode(&name).unwrap();
            assert_eq!(dkind, kind);
            assert_eq!(dts, 1_700_000_000_123);
            assert_eq!(dkey, key);
        }
    }

    #[test]
    fn decode_rejects_missing_suffix() {
        assert!(decode("pdq_1000_keyX").is_err());
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        assert!(decode("xyz_1000_keyX.txt").is_err());
    }

    #[test]
    fn decode_rejects_non_numeric_timestamp() {
        assert!(decode("pdq_notanumber_keyX.txt").is_err());
    }

    #[test]
    fn decode_rejects_negative_timestamp() {
        assert!(decode("pdq_-5_keyX.txt").is_err());
    }

    #[test]
    fn decode_rejects_invalid_service_key() {
        assert!(decode("pdq_1000_bad key.txt").is_err());
    }

    #[test]
    fn decode_rejects_missing_fields() {
        assert!(decode("pdq_1000.txt").is_err());
    }
}
