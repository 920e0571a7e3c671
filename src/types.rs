use crate::constants::RECORD_FIELD_COUNT;
use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// One line of the source table, addressed by position.
pub type Row = Vec<String>;

/// Canonical payment record built from a normalized row.
///
/// Equality over all twelve fields is the deduplication key, so the derived
/// `Hash`/`Eq` must stay in sync with the field list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub date: String,
    pub name: String,
    pub address: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub telephone: String,
    pub mobile: String,
    pub amount: String,
    pub processor: String,
    #[serde(rename = "importdate")]
    pub import_date: String,
}

impl Record {
    /// Build a record by positional mapping. `index` is the data-row index,
    /// used only for the error message.
    pub fn from_row(index: usize, row: &[String]) -> Result<Self> {
        if row.len() < RECORD_FIELD_COUNT {
            return Err(ProcessorError::MalformedRow {
                index,
                expected: RECORD_FIELD_COUNT,
                found: row.len(),
            });
        }

        Ok(Self {
            date: row[0].clone(),
            name: row[1].clone(),
            address: row[2].clone(),
            address2: row[3].clone(),
            city: row[4].clone(),
            state: row[5].clone(),
            zipcode: row[6].clone(),
            telephone: row[7].clone(),
            mobile: row[8].clone(),
            amount: row[9].clone(),
            processor: row[10].clone(),
            import_date: row[11].clone(),
        })
    }

    fn fields(&self) -> [(&'static str, &str); RECORD_FIELD_COUNT] {
        [
            ("date", &self.date),
            ("name", &self.name),
            ("address", &self.address),
            ("address2", &self.address2),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
            ("telephone", &self.telephone),
            ("mobile", &self.mobile),
            ("amount", &self.amount),
            ("processor", &self.processor),
            ("importdate", &self.import_date),
        ]
    }

    /// Hand-built JSON rendering in wire key order. Used for the failure log
    /// when the envelope itself could not be serialized.
    pub fn to_json_string(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, value)) in self.fields().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(key);
            out.push_str("\":");
            push_json_string(&mut out, value);
        }
        out.push('}');
        out
    }

    /// SHA-256 over the field values, separated by the ASCII unit separator.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (i, (_, value)) in self.fields().iter().enumerate() {
            if i > 0 {
                hasher.update([0x1f]);
            }
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn push_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Wire envelope: the record wrapped under a single named field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(rename = "PaymentRecord")]
    pub payment_record: Record,
}

/// Serialized payload for one unique record, consumed by exactly one worker.
#[derive(Debug)]
pub struct Job {
    pub payload: Vec<u8>,
    pub digest: String,
}

impl Job {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
