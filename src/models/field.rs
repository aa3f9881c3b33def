//! Tri-state field wrappers.
//!
//! Every configurable monitor field travels through the pipeline in one of
//! three states, and collapsing "absent" into "explicitly empty" is the
//! single most dangerous bug class in this system. These wrappers make the
//! distinction a compile-time fact instead of a nullable-type convention.

use serde::{Deserialize, Serialize};

/// A field of the user's declared configuration.
///
/// `Unmanaged` means the user never mentioned the field and the remote value
/// must be left alone. `Unknown` means the value depends on something not yet
/// computable at plan time. `Value` is a concrete value, where the type's
/// empty value means "clear this on the remote".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Desired<T> {
    /// The user does not manage this field.
    Unmanaged,
    /// The value is not yet computable (depends on another resource).
    Unknown,
    /// A concrete declared value.
    Value(T),
}

impl<T> Desired<T> {
    /// Returns `true` if the user does not manage this field.
    pub fn is_unmanaged(&self) -> bool {
        matches!(self, Desired::Unmanaged)
    }

    /// Returns `true` if the value is unknown at plan time.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Desired::Unknown)
    }

    /// Returns the concrete value, if one was declared.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Desired::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the concrete value, preserving the other states.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Desired<U> {
        match self {
            Desired::Unmanaged => Desired::Unmanaged,
            Desired::Unknown => Desired::Unknown,
            Desired::Value(v) => Desired::Value(f(v)),
        }
    }
}

impl<T> Default for Desired<T> {
    fn default() -> Self {
        Desired::Unmanaged
    }
}

impl<T> From<Option<T>> for Desired<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Desired::Value(v),
            None => Desired::Unmanaged,
        }
    }
}

/// A field of the persisted reconciliation state.
///
/// `Unmanaged` mirrors `Desired::Unmanaged`: the field was never adopted.
/// `Cleared` records that a managed field was explicitly emptied, either by
/// the user or by the remote system, and must stay visible as a clear rather
/// than disappear as an omission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Managed<T> {
    /// The field was never managed; the remote value is not tracked.
    Unmanaged,
    /// The field is managed and currently empty.
    Cleared,
    /// The field is managed and holds a concrete value.
    Value(T),
}

impl<T> Managed<T> {
    /// Returns `true` if the field was never managed.
    pub fn is_unmanaged(&self) -> bool {
        matches!(self, Managed::Unmanaged)
    }

    /// Returns `true` if the field is managed (cleared or valued).
    pub fn is_managed(&self) -> bool {
        !self.is_unmanaged()
    }

    /// Returns the concrete value, if the field holds one.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Managed::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the concrete value, preserving the other states.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Managed<U> {
        match self {
            Managed::Unmanaged => Managed::Unmanaged,
            Managed::Cleared => Managed::Cleared,
            Managed::Value(v) => Managed::Value(f(v)),
        }
    }

    /// Adopts an optional remote value as unmanaged-or-value. Used when a
    /// resource is imported with no prior state: absence means not-yet-adopted,
    /// not cleared.
    pub fn from_option(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Managed::Value(v),
            None => Managed::Unmanaged,
        }
    }
}

impl<T> Default for Managed<T> {
    fn default() -> Self {
        Managed::Unmanaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desired_default_is_unmanaged() {
        let field: Desired<u32> = Desired::default();
        assert!(field.is_unmanaged());
        assert_eq!(field.as_value(), None);
    }

    #[test]
    fn test_managed_serde_keeps_states_distinguishable() {
        let unmanaged: Managed<u32> = Managed::Unmanaged;
        let cleared: Managed<u32> = Managed::Cleared;
        let value: Managed<u32> = Managed::Value(30);

        let unmanaged_json = serde_json::to_string(&unmanaged).unwrap();
        let cleared_json = serde_json::to_string(&cleared).unwrap();
        let value_json = serde_json::to_string(&value).unwrap();

        assert_ne!(unmanaged_json, cleared_json);
        assert_eq!(
            serde_json::from_str::<Managed<u32>>(&unmanaged_json).unwrap(),
            unmanaged
        );
        assert_eq!(
            serde_json::from_str::<Managed<u32>>(&cleared_json).unwrap(),
            cleared
        );
        assert_eq!(serde_json::from_str::<Managed<u32>>(&value_json).unwrap(), value);
    }

    #[test]
    fn test_desired_from_option() {
        assert_eq!(Desired::from(Some(5u32)), Desired::Value(5));
        assert_eq!(Desired::<u32>::from(None), Desired::Unmanaged);
    }

    #[test]
    fn test_managed_map_preserves_cleared() {
        let cleared: Managed<u32> = Managed::Cleared;
        assert_eq!(cleared.map(|v| v + 1), Managed::Cleared);
    }
}
