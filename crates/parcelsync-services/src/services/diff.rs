//! Field-level diff between the system of record and a staged upload.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parcelsync_core::models::{DiffReport, FieldDiff, LogKind, UploadRecord};
use parcelsync_core::{
    bounded, is_identifier_label, normalize_key, parse_fields, SyncResult, SystemOfRecord,
    UNKNOWN_PROPERTY_ID,
};
use parcelsync_db::LogStore;
use parcelsync_storage::Storage;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Compare current and proposed values field by field.
///
/// Field names on both sides go through [`normalize_key`], so `Land Value`
/// from the system of record meets `land_value` from the upload. Every field
/// named on either side appears once, sorted by name. Identifier fields are
/// skipped. `delta` is `proposed - current` when both sides parse as
/// decimals.
pub fn compare(
    current: &BTreeMap<String, String>,
    proposed: &BTreeMap<String, String>,
) -> Vec<FieldDiff> {
    let current = normalized(current);
    let proposed = normalized(proposed);

    let fields: BTreeSet<&String> = current
        .keys()
        .chain(proposed.keys())
        .filter(|field| !is_identifier_label(field))
        .collect();

    fields
        .into_iter()
        .map(|field| {
            let current_value = current.get(field).cloned();
            let proposed_value = proposed.get(field).cloned();
            let delta = match (&current_value, &proposed_value) {
                (Some(c), Some(p)) => match (parse_decimal(c), parse_decimal(p)) {
                    (Some(c), Some(p)) => p.checked_sub(c),
                    _ => None,
                },
                _ => None,
            };
            FieldDiff {
                field: field.clone(),
                current_value,
                proposed_value,
                delta,
            }
        })
        .collect()
}

/// Re-key by normalized name. The first spelling of a field wins.
fn normalized(values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in values {
        out.entry(normalize_key(key)).or_insert_with(|| value.clone());
    }
    out
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

/// Builds diff reports for staged uploads.
pub struct DiffGenerator {
    store: Arc<LogStore>,
    storage: Arc<dyn Storage>,
    system_of_record: Arc<dyn SystemOfRecord>,
    io_timeout: Duration,
}

impl DiffGenerator {
    pub fn new(
        store: Arc<LogStore>,
        storage: Arc<dyn Storage>,
        system_of_record: Arc<dyn SystemOfRecord>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            system_of_record,
            io_timeout,
        }
    }

    /// Diff for `upload_id`, which must be in the staging table.
    pub async fn generate(&self, upload_id: Uuid) -> SyncResult<DiffReport> {
        let record = self.store.find(LogKind::Staging, upload_id).await?;
        let proposed = self.proposed_values(&record).await?;

        let current = if record.property_id == UNKNOWN_PROPERTY_ID {
            BTreeMap::new()
        } else {
            self.system_of_record
                .current_values(&record.property_id)
                .await?
        };

        let fields = compare(&current, &proposed);
        tracing::debug!(
            upload_id = %upload_id,
            property_id = %record.property_id,
            fields = fields.len(),
            changes = fields.iter().filter(|f| f.is_change()).count(),
            "Generated diff"
        );

        Ok(DiffReport {
            upload_id,
            property_id: record.property_id,
            fields,
        })
    }

    async fn proposed_values(&self, record: &UploadRecord) -> SyncResult<BTreeMap<String, String>> {
        let bytes = bounded(
            self.io_timeout,
            "upload read",
            self.storage.read(&record.storage_path),
        )
        .await?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
        Ok(parse_fields(&String::from_utf8_lossy(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn numeric_fields_get_exact_delta() {
        let diff = compare(
            &map(&[("land_value", "150000.10"), ("tax_due", "5000")]),
            &map(&[("land_value", "165000.35"), ("tax_due", "5000")]),
        );
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].field, "land_value");
        assert_eq!(diff[0].delta, Some(Decimal::from_str("15000.25").unwrap()));
        assert!(diff[0].is_change());
        assert_eq!(diff[1].delta, Some(Decimal::ZERO));
        assert!(!diff[1].is_change());
    }

    #[test]
    fn text_and_one_sided_fields_have_no_delta() {
        let diff = compare(
            &map(&[("owner", "A"), ("zoning", "R1")]),
            &map(&[("owner", "B"), ("acreage", "2.5")]),
        );
        let fields: Vec<_> = diff.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["acreage", "owner", "zoning"]);
        assert!(diff.iter().all(|f| f.delta.is_none()));
        assert_eq!(diff[0].current_value, None);
        assert_eq!(diff[2].proposed_value, None);
        assert!(!diff[2].is_change());
    }

    #[test]
    fn current_field_names_are_normalized() {
        let diff = compare(
            &map(&[("Land Value", "150000"), ("Tax-Due", "4800.50")]),
            &map(&[("land_value", "165000"), ("tax_due", "4800.5")]),
        );
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].field, "land_value");
        assert_eq!(diff[0].current_value.as_deref(), Some("150000"));
        assert_eq!(diff[0].delta, Some(Decimal::from(15000)));
        assert_eq!(diff[1].field, "tax_due");
        assert!(!diff[1].is_change());
    }

    #[test]
    fn equal_numbers_with_different_scale_are_not_changes() {
        let diff = compare(
            &map(&[("land_value", "150000")]),
            &map(&[("land_value", "150000.00")]),
        );
        assert!(diff[0].delta.unwrap().is_zero());
        assert!(!diff[0].is_change());
    }

    #[test]
    fn identifier_fields_are_skipped() {
        let diff = compare(
            &map(&[("prop_id", "4500")]),
            &map(&[("prop_id", "4500"), ("property_id", "4500"), ("land_value", "1")]),
        );
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].field, "land_value");
    }
}
