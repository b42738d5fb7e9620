use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

/// Name of a property a cell can be filtered or sorted by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyName {
    Name,
    CreationTimestamp,
    Namespace,
    Status,
    Type,
    Reason,
    FirstSeen,
    LastSeen,
    Count,
    Restarts,
    /// Any name no cell kind knows about; every lookup of it is absent
    Other(String),
}

impl PropertyName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::CreationTimestamp => "creationTimestamp",
            Self::Namespace => "namespace",
            Self::Status => "status",
            Self::Type => "type",
            Self::Reason => "reason",
            Self::FirstSeen => "firstSeen",
            Self::LastSeen => "lastSeen",
            Self::Count => "count",
            Self::Restarts => "restarts",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for PropertyName {
    fn from(name: &str) -> Self {
        match name {
            "name" => Self::Name,
            "creationTimestamp" => Self::CreationTimestamp,
            "namespace" => Self::Namespace,
            "status" => Self::Status,
            "type" => Self::Type,
            "reason" => Self::Reason,
            "firstSeen" => Self::FirstSeen,
            "lastSeen" => Self::LastSeen,
            "count" => Self::Count,
            "restarts" => Self::Restarts,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a cell property.
///
/// Values only compare within the same variant. A cell that does not support a
/// property returns `None` from its lookup instead of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparableValue {
    String(String),
    Time(DateTime<Utc>),
    Quantity(f64),
}

impl ComparableValue {
    /// Order two values of the same variant; `None` when they are incomparable
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::Quantity(a), Self::Quantity(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Filter match of `needle` against this value.
    ///
    /// Strings match by case-sensitive substring. Times and quantities match by
    /// equality; a string needle is parsed into the value's variant first
    /// (RFC 3339 for times, a decimal number for quantities).
    #[must_use]
    pub fn contains(&self, needle: &Self) -> bool {
        match (self, needle) {
            (Self::String(a), Self::String(b)) => a.contains(b.as_str()),
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Quantity(a), Self::Quantity(b)) => a == b,
            (Self::Time(a), Self::String(raw)) => DateTime::parse_from_rfc3339(raw.trim())
                .is_ok_and(|parsed| parsed.with_timezone(&Utc) == *a),
            (Self::Quantity(a), Self::String(raw)) => {
                raw.trim().parse::<f64>().is_ok_and(|parsed| parsed == *a)
            }
            _ => false,
        }
    }
}

impl From<String> for ComparableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ComparableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for ComparableValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<f64> for ComparableValue {
    fn from(value: f64) -> Self {
        Self::Quantity(value)
    }
}

impl From<i32> for ComparableValue {
    fn from(value: i32) -> Self {
        Self::Quantity(f64::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_property_names_round_trip() {
        for name in ["name", "creationTimestamp", "lastSeen", "restarts"] {
            assert_eq!(PropertyName::from(name).as_str(), name);
        }
        assert_eq!(
            PropertyName::from("podIP"),
            PropertyName::Other("podIP".to_string())
        );
    }

    #[test]
    fn test_compare_same_variant() {
        let a = ComparableValue::from("a");
        let b = ComparableValue::from("b");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(
            ComparableValue::from(3).compare(&ComparableValue::from(3)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_compare_across_variants_is_incomparable() {
        let text = ComparableValue::from("10");
        let number = ComparableValue::from(10);
        assert_eq!(text.compare(&number), None);
        assert_eq!(
            ComparableValue::Quantity(f64::NAN).compare(&number),
            None
        );
    }

    #[test]
    fn test_contains() {
        let name = ComparableValue::from("nginx-7d9f");
        assert!(name.contains(&"nginx".into()));
        assert!(!name.contains(&"Nginx".into()));
        assert!(!name.contains(&ComparableValue::from(7)));

        let count = ComparableValue::from(7);
        assert!(count.contains(&"7".into()));
        assert!(!count.contains(&"70".into()));

        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let created = ComparableValue::from(time);
        assert!(created.contains(&"2024-05-01T12:00:00Z".into()));
        assert!(!created.contains(&"yesterday".into()));
    }
}
