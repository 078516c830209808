//! Inbound visit record.

use consult_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One clinical visit to be summarised.
///
/// Request-scoped: built from the inbound body, consumed once to build the prompt, then dropped.
/// Every field must contain non-blank text; the text itself is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VisitRequest {
    #[schema(value_type = String, example = "Jane Doe")]
    pub patient_name: NonEmptyText,
    #[schema(value_type = String, example = "2024-05-01")]
    pub date_of_visit: NonEmptyText,
    #[schema(value_type = String, example = "BP 120/80, no complaints")]
    pub notes: NonEmptyText,
}

impl VisitRequest {
    pub fn new(patient_name: NonEmptyText, date_of_visit: NonEmptyText, notes: NonEmptyText) -> Self {
        Self {
            patient_name,
            date_of_visit,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialises_from_json_body() {
        let visit: VisitRequest = serde_json::from_str(
            r#"{"patient_name":"Jane Doe","date_of_visit":"2024-05-01","notes":"BP 120/80"}"#,
        )
        .expect("valid body should parse");
        assert_eq!(visit.patient_name.as_str(), "Jane Doe");
        assert_eq!(visit.notes.as_str(), "BP 120/80");
    }

    #[test]
    fn test_rejects_blank_or_missing_fields() {
        assert!(serde_json::from_str::<VisitRequest>(
            r#"{"patient_name":" ","date_of_visit":"2024-05-01","notes":"n"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<VisitRequest>(
            r#"{"patient_name":"Jane","notes":"n"}"#
        )
        .is_err());
    }
}
