use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Dataset subdivision a layout index can be built for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LayoutKind {
    SourceData,
    RawData,
    Derivatives,
    Phenotype,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 4] = [
        LayoutKind::SourceData,
        LayoutKind::RawData,
        LayoutKind::Derivatives,
        LayoutKind::Phenotype,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::SourceData => "sourcedata",
            LayoutKind::RawData => "rawdata",
            LayoutKind::Derivatives => "derivatives",
            LayoutKind::Phenotype => "phenotype",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(LayoutKind::as_str).collect()
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LayoutKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LayoutKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).ok_or_else(|| {
            serde::de::Error::unknown_variant(&value, &["sourcedata", "rawdata", "derivatives", "phenotype"])
        })
    }
}

/// Calendar day a snapshot was built, written as unpadded `Y-M-D`.
///
/// Ordering is chronological, so `2023-1-20` sorts after `2022-12-31` even
/// though it does not lexically.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SnapshotDate(pub NaiveDate);

impl SnapshotDate {
    pub fn today() -> Self {
        SnapshotDate(chrono::Local::now().date_naive())
    }

    pub fn parse(value: &str) -> Option<Self> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(SnapshotDate)
    }
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl Serialize for SnapshotDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SnapshotDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid snapshot date '{value}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_kind_round_trips_known_and_rejects_unknown() {
        for kind in LayoutKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json.trim_matches('"'), kind.as_str());
            let back: LayoutKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
        assert!(serde_json::from_str::<LayoutKind>("\"anat\"").is_err());
        assert_eq!(LayoutKind::parse("rawdata"), Some(LayoutKind::RawData));
        assert_eq!(LayoutKind::parse("RawData"), None);
    }

    #[test]
    fn snapshot_dates_are_unpadded_and_chronological() {
        let early = SnapshotDate::parse("2022-12-31").unwrap();
        let mid = SnapshotDate::parse("2023-1-5").unwrap();
        let late = SnapshotDate::parse("2023-1-20").unwrap();
        assert!(early < mid && mid < late);
        assert_eq!(mid.to_string(), "2023-1-5");
        assert_eq!(SnapshotDate::parse("2023-02-07").unwrap().to_string(), "2023-2-7");
        assert!(SnapshotDate::parse("2023-13-1").is_none());
        assert!(SnapshotDate::parse("yesterday").is_none());
    }
}
