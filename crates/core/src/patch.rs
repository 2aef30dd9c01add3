//! Tri-state field values for partial updates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field of an incoming partial record.
///
/// Providers distinguish between a key that is not sent at all and a key
/// sent as `null`. The first leaves the cached value untouched, the second
/// clears it.
///
/// Use together with `#[serde(default, skip_serializing_if = "Patch::is_absent")]`
/// so that a missing key deserializes to [`Patch::Absent`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    /// Key not present in the message
    #[default]
    Absent,
    /// Key present with an explicit `null`
    Null,
    /// Key present with a value
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Writes this patch into `target`: absent leaves it, null clears it.
    pub fn apply_to(&self, target: &mut Option<T>)
    where
        T: Clone,
    {
        match self {
            Patch::Absent => {}
            Patch::Null => *target = None,
            Patch::Value(v) => *target = Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present; absence comes from `default`.
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T> Serialize for Patch<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Value(v) => v.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}
