use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identity record as served by the `/user` endpoints.
///
/// The session core never mutates a `User` in place; login, refresh and
/// remote updates replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    /// Contact address
    #[serde(default)]
    pub gmail: String,
    #[serde(default, with = "birthday")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub birthday: Option<NaiveDate>,
    /// Ids of the events this user is signed up for
    #[serde(rename = "eventos", default)]
    pub event_ids: Vec<String>,
}

impl User {
    pub fn has_event(&self, event_id: &str) -> bool {
        self.event_ids.iter().any(|id| id == event_id)
    }
}

/// The API stores birthdays as full timestamps but accepts plain dates.
/// Both are read; plain dates are written.
mod birthday {
    use chrono::{DateTime, NaiveDate};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const DATE_FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid birthday: {}", s))),
        }
    }

    fn parse(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    }
}
