//! Shape-preserving value merging.
//!
//! Pure functions that combine a previously persisted value with a freshly
//! observed remote value. The merge keeps "unmanaged" distinguishable from
//! "explicitly cleared" so that read-back never invents spurious differences
//! and never silently adopts a remote default for a field the user does not
//! manage.

mod assemble;

pub use assemble::{adopt_observed, assemble_after_write, merge_read};

use crate::models::{contact::PersistedContact, field::Managed};

/// Merges one field of prior state with its freshly observed remote value.
///
/// An unmanaged prior stays unmanaged no matter what the remote reports. A
/// managed prior whose remote value disappeared becomes [`Managed::Cleared`],
/// never unmanaged: an explicit clear must stay visible as a clear. Total
/// over its domain.
pub fn merge_field<T: Clone>(prior: &Managed<T>, observed: Option<&T>) -> Managed<T> {
    match (prior, observed) {
        (Managed::Unmanaged, _) => Managed::Unmanaged,
        (_, None) => Managed::Cleared,
        (_, Some(v)) => Managed::Value(v.clone()),
    }
}

/// Merges a managed string collection, normalizing the observed values so
/// non-canonical remote casing never reads back as drift.
pub fn merge_tags(prior: &Managed<Vec<String>>, observed: &[String]) -> Managed<Vec<String>> {
    match prior {
        Managed::Unmanaged => Managed::Unmanaged,
        _ if observed.is_empty() => Managed::Cleared,
        _ => Managed::Value(normalize_strings(observed)),
    }
}

/// Merges the contact collection, deduplicating by contact id.
pub fn merge_contacts(
    prior: &Managed<Vec<PersistedContact>>,
    observed: &[PersistedContact],
) -> Managed<Vec<PersistedContact>> {
    match prior {
        Managed::Unmanaged => Managed::Unmanaged,
        _ if observed.is_empty() => Managed::Cleared,
        _ => Managed::Value(normalize_contacts(observed)),
    }
}

/// Canonicalizes a string collection: trims, case-folds, deduplicates and
/// sorts. Idempotent: `normalize_strings(&normalize_strings(x)) == normalize_strings(x)`.
pub fn normalize_strings(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Canonicalizes the contact collection: deduplicates by contact id (first
/// occurrence wins) and sorts by id. Idempotent.
pub fn normalize_contacts(contacts: &[PersistedContact]) -> Vec<PersistedContact> {
    let mut out: Vec<PersistedContact> = Vec::with_capacity(contacts.len());
    for contact in contacts {
        if !out.iter().any(|c| c.contact_id == contact.contact_id) {
            out.push(contact.clone());
        }
    }
    out.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmanaged_prior_never_adopts_remote_value() {
        let prior: Managed<u32> = Managed::Unmanaged;
        assert_eq!(merge_field(&prior, Some(&42)), Managed::Unmanaged);
        assert_eq!(merge_field(&prior, None), Managed::Unmanaged);
    }

    #[test]
    fn test_managed_prior_with_absent_remote_becomes_cleared() {
        assert_eq!(merge_field(&Managed::Value(42u32), None), Managed::Cleared);
        assert_eq!(merge_field(&Managed::Cleared::<u32>, None), Managed::Cleared);
    }

    #[test]
    fn test_managed_prior_adopts_observed_value() {
        assert_eq!(merge_field(&Managed::Value(1u32), Some(&2)), Managed::Value(2));
        assert_eq!(merge_field(&Managed::Cleared, Some(&7u32)), Managed::Value(7));
    }

    #[test]
    fn test_normalize_strings_dedupes_and_case_folds() {
        let raw = vec![
            "Prod".to_string(),
            "prod".to_string(),
            "  API ".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_strings(&raw), vec!["api".to_string(), "prod".to_string()]);
    }

    #[test]
    fn test_normalize_strings_is_idempotent() {
        let raw = vec!["B".to_string(), "a".to_string(), "b".to_string()];
        let once = normalize_strings(&raw);
        assert_eq!(normalize_strings(&once), once);
    }

    #[test]
    fn test_normalize_contacts_dedupes_by_id() {
        let contacts = vec![
            PersistedContact { contact_id: "c2".into(), notify_delay: 0, repeat_interval: 0 },
            PersistedContact { contact_id: "c1".into(), notify_delay: 5, repeat_interval: 60 },
            PersistedContact { contact_id: "c2".into(), notify_delay: 9, repeat_interval: 9 },
        ];
        let normalized = normalize_contacts(&contacts);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].contact_id, "c1");
        assert_eq!(normalized[1].contact_id, "c2");
        // First occurrence wins on duplicate ids.
        assert_eq!(normalized[1].notify_delay, 0);
        assert_eq!(normalize_contacts(&normalized), normalized);
    }

    #[test]
    fn test_merge_tags_normalizes_remote_casing() {
        let prior = Managed::Value(vec!["api".to_string()]);
        let merged = merge_tags(&prior, &["API".to_string(), "Prod".to_string()]);
        assert_eq!(merged, Managed::Value(vec!["api".to_string(), "prod".to_string()]));
    }

    #[test]
    fn test_merge_tags_empty_remote_is_cleared_not_unmanaged() {
        let prior = Managed::Value(vec!["api".to_string()]);
        assert_eq!(merge_tags(&prior, &[]), Managed::Cleared);
        assert_eq!(merge_tags(&Managed::Unmanaged, &[]), Managed::Unmanaged);
    }
}
