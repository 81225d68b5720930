//! Common types used across tsvflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsvflowError};

/// Number of columns in a tab-separated input line.
pub const RECORD_COLUMNS: usize = 15;

/// Column index of the unit identifier (GUID).
pub const UNIT_GUID_COLUMN: usize = 3;

/// Minimum length of a trimmed unit identifier for a line to be accepted.
pub const MIN_UNIT_GUID_LEN: usize = 10;

/// One logical line of an ingested TSV file.
///
/// Field order matches the column order of the input. Serialized names are
/// the short column labels used in reports and API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "n")]
    pub number: String,
    pub mqtt: String,
    #[serde(rename = "invid")]
    pub inventory_id: String,
    pub unit_guid: String,
    #[serde(rename = "msg_id")]
    pub message_id: String,
    #[serde(rename = "text")]
    pub message_text: String,
    pub context: String,
    #[serde(rename = "class")]
    pub message_class: String,
    pub level: String,
    pub area: String,
    #[serde(rename = "addr")]
    pub address: String,
    pub block: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub bit: String,
    pub invert_bit: String,
}

impl Record {
    /// Build a record from raw column values, trimming each one.
    ///
    /// Extra trailing columns are ignored. Fewer than [`RECORD_COLUMNS`]
    /// columns is an error.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() < RECORD_COLUMNS {
            return Err(TsvflowError::InvalidRecord(format!(
                "expected {} columns, got {}",
                RECORD_COLUMNS,
                fields.len()
            )));
        }

        let col = |i: usize| fields[i].as_ref().trim().to_string();

        Ok(Self {
            number: col(0),
            mqtt: col(1),
            inventory_id: col(2),
            unit_guid: col(3),
            message_id: col(4),
            message_text: col(5),
            context: col(6),
            message_class: col(7),
            level: col(8),
            area: col(9),
            address: col(10),
            block: col(11),
            kind: col(12),
            bit: col(13),
            invert_bit: col(14),
        })
    }

    /// Column values in input order.
    pub fn to_fields(&self) -> [&str; RECORD_COLUMNS] {
        [
            &self.number,
            &self.mqtt,
            &self.inventory_id,
            &self.unit_guid,
            &self.message_id,
            &self.message_text,
            &self.context,
            &self.message_class,
            &self.level,
            &self.area,
            &self.address,
            &self.block,
            &self.kind,
            &self.bit,
            &self.invert_bit,
        ]
    }

    /// `(label, value)` pairs in input order, using the serialized labels.
    pub fn labeled_fields(&self) -> [(&'static str, &str); RECORD_COLUMNS] {
        let values = self.to_fields();
        std::array::from_fn(|i| (FIELD_LABELS[i], values[i]))
    }
}

/// Serialized column labels, in input order.
pub const FIELD_LABELS: [&str; RECORD_COLUMNS] = [
    "n",
    "mqtt",
    "invid",
    "unit_guid",
    "msg_id",
    "text",
    "context",
    "class",
    "level",
    "area",
    "addr",
    "block",
    "type",
    "bit",
    "invert_bit",
];

/// Checks a raw unit identifier against [`MIN_UNIT_GUID_LEN`] after trimming.
pub fn is_valid_unit_guid(raw: &str) -> bool {
    raw.trim().chars().count() >= MIN_UNIT_GUID_LEN
}

/// Result of processing one file. An empty `error` means success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: String,
    pub error: String,
    pub processed_at: DateTime<Utc>,
}

impl FileOutcome {
    pub fn success(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            error: String::new(),
            processed_at: Utc::now(),
        }
    }

    pub fn failure(file: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            file: file.into(),
            error: error.to_string(),
            processed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<&'static str> {
        vec![
            " 5 ",
            "",
            "G-044325",
            " 01749246-9617-585e-9e19-157ccad61ee2 ",
            "cold78_Defrost_status",
            "Defrost",
            "",
            "waiting",
            "100",
            "LOCAL",
            "cold78_status.Defrost_status",
            "",
            "",
            "",
            "",
        ]
    }

    #[test]
    fn test_from_fields_trims_every_column() {
        let record = Record::from_fields(&sample_fields()).unwrap();
        assert_eq!(record.number, "5");
        assert_eq!(record.unit_guid, "01749246-9617-585e-9e19-157ccad61ee2");
        assert_eq!(record.address, "cold78_status.Defrost_status");
        assert!(is_valid_unit_guid(&record.unit_guid));
    }

    #[test]
    fn test_from_fields_rejects_short_lines() {
        let fields = &sample_fields()[..14];
        let err = Record::from_fields(fields).unwrap_err();
        assert!(matches!(err, TsvflowError::InvalidRecord(_)));
    }

    #[test]
    fn test_from_fields_ignores_extra_columns() {
        let mut fields = sample_fields();
        fields.push("extra");
        let record = Record::from_fields(&fields).unwrap();
        assert_eq!(record.invert_bit, "");
    }

    #[test]
    fn test_unit_guid_length_threshold() {
        assert!(!is_valid_unit_guid("  123456789  "));
        assert!(is_valid_unit_guid("1234567890"));
        assert!(!is_valid_unit_guid(""));
    }

    #[test]
    fn test_serialized_labels_match_field_labels() {
        let record = Record::from_fields(&sample_fields()).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), RECORD_COLUMNS);
        for label in FIELD_LABELS {
            assert!(object.contains_key(label), "missing label {label}");
        }
        assert_eq!(object["type"], "");
        assert_eq!(object["n"], "5");
    }

    #[test]
    fn test_file_outcome_success_and_failure() {
        let ok = FileOutcome::success("a.tsv");
        assert!(ok.is_success());

        let failed = FileOutcome::failure("report.txt", "not a tsv file");
        assert!(!failed.is_success());
        assert_eq!(failed.error, "not a tsv file");
    }
}
