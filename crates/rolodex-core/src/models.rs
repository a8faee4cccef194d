use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::AppError;

/// A contact's profile URL. Equality is exact string match.
pub type LinkId = String;

/// Parse a profile URL typed by hand into the form harvesting stores.
///
/// The URL is serialized back through [`Url`], so non-ASCII slugs come out
/// percent-encoded exactly as collected links do.
pub fn parse_link(raw: &str) -> Result<LinkId, AppError> {
    let trimmed = raw.trim();
    Url::parse(trimmed)
        .map(String::from)
        .map_err(|e| AppError::ValidationError(format!("Not a URL: {trimmed} ({e})")))
}

/// Flat set of fields scraped for one contact.
///
/// Every field may be empty; a key missing from the stored JSON loads as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonRecord {
    #[serde(deserialize_with = "null_as_empty")]
    pub profile: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub address: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub birthday: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub website: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub photo: String,
}

/// Older queue files store `null` for attributes that were never read.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl PersonRecord {
    /// Field names in persisted order.
    pub const FIELDS: [&'static str; 10] = [
        "profile", "name", "title", "phone", "email", "address", "birthday", "location",
        "website", "photo",
    ];

    /// Look up a field by its persisted name.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "profile" => &self.profile,
            "name" => &self.name,
            "title" => &self.title,
            "phone" => &self.phone,
            "email" => &self.email,
            "address" => &self.address,
            "birthday" => &self.birthday,
            "location" => &self.location,
            "website" => &self.website,
            "photo" => &self.photo,
            _ => return None,
        };
        Some(value)
    }

    /// Checks the record can be keyed into `persons`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.profile.trim().is_empty() {
            return Err(AppError::ValidationError(
                "person record has an empty profile".into(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<serde_json::Value> for PersonRecord {
    type Error = AppError;

    /// Accepts a JSON object whose known fields are all strings or `null`
    /// and whose `profile` is present and non-empty. Unknown keys are ignored.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let obj = value.as_object().ok_or_else(|| {
            AppError::ValidationError("person record must be a JSON object".into())
        })?;

        for field in Self::FIELDS {
            if let Some(v) = obj.get(field)
                && !(v.is_string() || v.is_null())
            {
                return Err(AppError::ValidationError(format!(
                    "person field '{field}' must be a string or null"
                )));
            }
        }

        let record: PersonRecord = serde_json::from_value(value)
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

/// The persisted queue: pending links, claimed links, finalized persons.
///
/// Key names on disk are historical: `connections` holds pending links and
/// `scraped_texts` holds claimed-but-unfinished ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDocument {
    #[serde(rename = "connections")]
    pub pending: Vec<LinkId>,
    #[serde(rename = "scraped_texts")]
    pub in_progress: Vec<LinkId>,
    pub persons: Vec<PersonRecord>,
    /// How often each stranded id has been requeued. Omitted when empty.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub recoveries: BTreeMap<LinkId, u32>,
}

impl QueueDocument {
    pub fn has_person(&self, profile: &str) -> bool {
        self.persons.iter().any(|p| p.profile == profile)
    }

    /// True if `id` is in `pending`, `in_progress`, or `persons`.
    pub fn knows(&self, id: &str) -> bool {
        self.pending.iter().any(|p| p == id)
            || self.in_progress.iter().any(|p| p == id)
            || self.has_person(id)
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            in_progress: self.in_progress.len(),
            persons: self.persons.len(),
        }
    }
}

/// Sizes of the three queue lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub persons: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_person_fields_default_to_empty() {
        let record: PersonRecord =
            serde_json::from_value(serde_json::json!({"profile": "https://x/in/a/"})).unwrap();
        assert_eq!(record.profile, "https://x/in/a/");
        assert_eq!(record.phone, "");
        assert_eq!(record.photo, "");
    }

    #[test]
    fn test_document_uses_historical_keys() {
        let doc = QueueDocument {
            pending: vec!["a".into()],
            in_progress: vec!["b".into()],
            persons: vec![],
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["connections"], serde_json::json!(["a"]));
        assert_eq!(json["scraped_texts"], serde_json::json!(["b"]));
        assert_eq!(json["persons"], serde_json::json!([]));
        assert!(json.get("recoveries").is_none());
    }

    #[test]
    fn test_try_from_rejects_non_object() {
        let err = PersonRecord::try_from(serde_json::json!(["profile"])).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_try_from_rejects_non_string_field() {
        let err = PersonRecord::try_from(serde_json::json!({
            "profile": "https://x/in/a/",
            "phone": 5551234
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("phone")));
    }

    #[test]
    fn test_null_person_fields_load_as_empty() {
        let record: PersonRecord = serde_json::from_value(serde_json::json!({
            "profile": "https://x/in/a/",
            "name": "Ada",
            "photo": null,
            "website": null
        }))
        .unwrap();
        assert_eq!(record.name, "Ada");
        assert_eq!(record.photo, "");
        assert_eq!(record.website, "");
    }

    #[test]
    fn test_try_from_accepts_null_field() {
        let record = PersonRecord::try_from(serde_json::json!({
            "profile": "https://x/in/a/",
            "photo": null
        }))
        .unwrap();
        assert_eq!(record.photo, "");
    }

    #[test]
    fn test_try_from_requires_profile() {
        let err = PersonRecord::try_from(serde_json::json!({"name": "Ada"})).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_try_from_accepts_partial_record() {
        let record = PersonRecord::try_from(serde_json::json!({
            "profile": "https://x/in/a/",
            "name": "Ada",
            "extra": 1
        }))
        .unwrap();
        assert_eq!(record.name, "Ada");
        assert_eq!(record.email, "");
    }

    #[test]
    fn test_parse_link_matches_collected_form() {
        let typed = parse_link("  https://social.example/in/zoë-muñoz/ ").unwrap();
        let collected = Url::parse("https://social.example/mynetwork/")
            .unwrap()
            .join("/in/zoë-muñoz/")
            .unwrap()
            .to_string();
        assert_eq!(typed, collected);
        assert_eq!(typed, "https://social.example/in/zo%C3%AB-mu%C3%B1oz/");
    }

    #[test]
    fn test_parse_link_rejects_non_url() {
        let err = parse_link("not a link").unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_get_field_by_name() {
        let record = PersonRecord {
            email: "ada@example.com".into(),
            ..Default::default()
        };
        assert_eq!(record.get("email"), Some("ada@example.com"));
        assert_eq!(record.get("nickname"), None);
    }

    #[test]
    fn test_knows_checks_all_lists() {
        let doc = QueueDocument {
            pending: vec!["a".into()],
            in_progress: vec!["b".into()],
            persons: vec![PersonRecord {
                profile: "c".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(doc.knows("a"));
        assert!(doc.knows("b"));
        assert!(doc.knows("c"));
        assert!(!doc.knows("d"));
    }
}
