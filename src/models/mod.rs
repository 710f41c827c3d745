use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a detail page may carry when the real business name did not render.
pub const PLACEHOLDER_NAMES: &[&str] = &["Nom non trouvé"];

/// Directory site a crawl runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    /// Google Maps search results (infinite-scroll list)
    Maps,
    /// 118712.fr professional directory (click-paginated list)
    Annuaire,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Maps => write!(f, "maps"),
            Site::Annuaire => write!(f, "annuaire"),
        }
    }
}

/// One business listing extracted from a detail page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

impl Record {
    /// A record is kept only when it carries a real name.
    pub fn is_valid(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && !PLACEHOLDER_NAMES.contains(&name)
    }
}

/// Record annotated with the (city, sector) pair that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl TaggedRecord {
    pub fn tagged(record: Record, city: &str, sector: &str) -> Self {
        Self {
            record,
            city: Some(city.to_string()),
            sector: Some(sector.to_string()),
        }
    }

    pub fn untagged(record: Record) -> Self {
        Self {
            record,
            city: None,
            sector: None,
        }
    }
}

/// Payload written at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutput {
    pub success: bool,
    pub site: Site,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<TaggedRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> Record {
        Record {
            name: name.to_string(),
            ..Record::default()
        }
    }

    #[test]
    fn empty_and_placeholder_names_are_invalid() {
        assert!(!record("").is_valid());
        assert!(!record("   ").is_valid());
        assert!(!record("Nom non trouvé").is_valid());
        assert!(record("Boulangerie Martin").is_valid());
    }

    #[test]
    fn tagged_record_flattens_into_one_object() {
        let mut rec = record("Garage du Centre");
        rec.phone = Some("0123456789".to_string());
        let json = serde_json::to_value(TaggedRecord::tagged(rec, "Lyon", "garage")).unwrap();

        assert_eq!(json["name"], "Garage du Centre");
        assert_eq!(json["phone"], "0123456789");
        assert_eq!(json["city"], "Lyon");
        assert_eq!(json["sector"], "garage");
        assert!(json.get("address").is_none());
        assert!(json.get("services").is_none());
    }

    #[test]
    fn untagged_record_omits_city_and_sector() {
        let json = serde_json::to_value(TaggedRecord::untagged(record("Plomberie Dupont"))).unwrap();
        assert!(json.get("city").is_none());
        assert!(json.get("sector").is_none());
    }
}
