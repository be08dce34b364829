use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::ComparisonRecord;

/// Record cache entry carrying a SHA-256 checksum of its payload.
///
/// Entries whose checksum no longer matches are treated as a cache miss and
/// the vendor is analyzed again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedRecord {
    /// Serialized `ComparisonRecord`.
    pub data: String,
    /// Hex-encoded SHA-256 of `data`.
    pub checksum: String,
}

impl SealedRecord {
    pub fn new(data: String) -> Self {
        let checksum = compute_checksum(&data);
        Self { data, checksum }
    }

    pub fn is_valid(&self) -> bool {
        compute_checksum(&self.data) == self.checksum
    }
}

fn compute_checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serializes a record into a cache value.
pub fn seal(record: &ComparisonRecord) -> Option<String> {
    let data = serde_json::to_string(record).ok()?;
    serde_json::to_string(&SealedRecord::new(data)).ok()
}

/// Restores a record from a cache value.
///
/// Returns `None` if the value is not a sealed entry, the checksum does not
/// match, or the payload is not a record.
pub fn unseal(serialized: &str) -> Option<ComparisonRecord> {
    let entry: SealedRecord = serde_json::from_str(serialized).ok()?;

    if !entry.is_valid() {
        tracing::warn!(
            "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
            entry.checksum,
            entry.data.len()
        );
        return None;
    }

    serde_json::from_str(&entry.data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::models::{AiFacts, Mined, MinedFacts, RawDocument};

    fn record() -> ComparisonRecord {
        let doc = RawDocument::success(
            "Acme",
            "https://acme.test/pricing",
            200,
            None,
            String::new(),
            1,
        );
        let mined = MinedFacts {
            entry_price: Mined::High(25.0),
            ..MinedFacts::default()
        };
        assemble(&doc, &mined, &AiFacts::Skipped, Vec::new())
    }

    #[test]
    fn test_seal_unseal() {
        let record = record();
        let sealed = seal(&record).unwrap();

        assert_eq!(unseal(&sealed), Some(record));
    }

    #[test]
    fn test_tampered_entry_rejected() {
        let sealed = seal(&record()).unwrap();
        let tampered = sealed.replace("Acme", "Evil");

        assert_eq!(unseal(&tampered), None);
    }

    #[test]
    fn test_valid_checksum_but_not_a_record() {
        let entry = SealedRecord::new(r#"{"name": "John"}"#.to_string());
        assert!(entry.is_valid());

        let serialized = serde_json::to_string(&entry).unwrap();
        assert_eq!(unseal(&serialized), None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(unseal("not json"), None);
    }

    #[test]
    fn test_checksum_consistency() {
        let a = SealedRecord::new("test data".to_string());
        let b = SealedRecord::new("test data".to_string());
        assert_eq!(a.checksum, b.checksum);
    }
}
