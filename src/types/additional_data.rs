//! Type-tagged extensibility bag
//!
//! `AdditionalData` maps string keys to one value, or a homogeneous array of
//! values, each tagged with its type name. It is the generic mechanism every
//! participant uses to attach bespoke data to requests and responses.
//!
//! # Design
//!
//! Values are a closed tagged union ([`DataValue`]) rather than type-erased
//! objects. Built-in scalar types implement [`DataType`]; callers register their
//! own record types by implementing [`CustomData`], which stores them as a JSON
//! value under the registered type name.
//!
//! Retrieval is typed and never fails loudly: asking for the wrong type yields
//! `None` and a debug log line.
//!
//! # Thread Safety
//!
//! Entries live in a `DashMap`, so a single instance can be read and mutated
//! from the owning thread and a transport callback thread at the same time.
//! All mutators therefore take `&self`.

use crate::types::{Amount, AppFlowError};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const BOOL_TYPE: &str = "boolean";
const LONG_TYPE: &str = "long";
const DOUBLE_TYPE: &str = "double";
const STRING_TYPE: &str = "string";
const AMOUNT_TYPE: &str = "amount";

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Amount(Amount),
    /// Caller-registered record, kept as JSON under its type name
    Custom {
        type_name: String,
        value: serde_json::Value,
    },
}

impl DataValue {
    /// Type name this value is tagged with
    pub fn type_name(&self) -> &str {
        match self {
            DataValue::Bool(_) => <bool as DataType>::TYPE_NAME,
            DataValue::Int(_) => <i64 as DataType>::TYPE_NAME,
            DataValue::Float(_) => <f64 as DataType>::TYPE_NAME,
            DataValue::Str(_) => <String as DataType>::TYPE_NAME,
            DataValue::Amount(_) => <Amount as DataType>::TYPE_NAME,
            DataValue::Custom { type_name, .. } => type_name,
        }
    }

    /// Textual form used by string coercion
    pub fn to_display_string(&self) -> String {
        match self {
            DataValue::Bool(value) => value.to_string(),
            DataValue::Int(value) => value.to_string(),
            DataValue::Float(value) => value.to_string(),
            DataValue::Str(value) => value.clone(),
            DataValue::Amount(value) => value.to_string(),
            DataValue::Custom { value, .. } => value.to_string(),
        }
    }

    /// Whether the value has a JSON representation
    ///
    /// NaN and infinite floats have none.
    pub fn is_encodable(&self) -> bool {
        match self {
            DataValue::Float(value) => value.is_finite(),
            _ => true,
        }
    }

    fn to_json_value(&self) -> serde_json::Value {
        match self {
            DataValue::Bool(value) => serde_json::Value::from(*value),
            DataValue::Int(value) => serde_json::Value::from(*value),
            DataValue::Float(value) => serde_json::Value::from(*value),
            DataValue::Str(value) => serde_json::Value::from(value.as_str()),
            DataValue::Amount(value) => {
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
            }
            DataValue::Custom { value, .. } => value.clone(),
        }
    }

    fn from_json_value(type_name: &str, value: serde_json::Value) -> Result<Self, AppFlowError> {
        let mismatch = || {
            AppFlowError::Serialization {
                message: format!("value is not a valid '{}'", type_name),
            }
        };
        match type_name {
            BOOL_TYPE => value.as_bool().map(DataValue::Bool).ok_or_else(mismatch),
            LONG_TYPE => value.as_i64().map(DataValue::Int).ok_or_else(mismatch),
            DOUBLE_TYPE => value.as_f64().map(DataValue::Float).ok_or_else(mismatch),
            STRING_TYPE => value
                .as_str()
                .map(|s| DataValue::Str(s.to_string()))
                .ok_or_else(mismatch),
            AMOUNT_TYPE => Ok(DataValue::Amount(serde_json::from_value(value)?)),
            _ => Ok(DataValue::Custom {
                type_name: type_name.to_string(),
                value,
            }),
        }
    }
}

/// Built-in value types that can be stored directly
pub trait DataType: Sized {
    /// Tag written next to the value
    const TYPE_NAME: &'static str;

    /// Wrap into a [`DataValue`]
    fn into_data_value(self) -> DataValue;

    /// Extract from a [`DataValue`] of exactly this type
    fn from_data_value(value: &DataValue) -> Option<Self>;
}

impl DataType for bool {
    const TYPE_NAME: &'static str = BOOL_TYPE;

    fn into_data_value(self) -> DataValue {
        DataValue::Bool(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl DataType for i64 {
    const TYPE_NAME: &'static str = LONG_TYPE;

    fn into_data_value(self) -> DataValue {
        DataValue::Int(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl DataType for f64 {
    const TYPE_NAME: &'static str = DOUBLE_TYPE;

    fn into_data_value(self) -> DataValue {
        DataValue::Float(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl DataType for String {
    const TYPE_NAME: &'static str = STRING_TYPE;

    fn into_data_value(self) -> DataValue {
        DataValue::Str(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl DataType for Amount {
    const TYPE_NAME: &'static str = AMOUNT_TYPE;

    fn into_data_value(self) -> DataValue {
        DataValue::Amount(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Amount(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Caller-defined record types stored by their registered name
///
/// # Example
///
/// ```
/// use appflow_core::types::{AdditionalData, CustomData};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Loyalty { points: u32 }
///
/// impl CustomData for Loyalty {
///     const TYPE_NAME: &'static str = "com.example.Loyalty";
/// }
///
/// let data = AdditionalData::new();
/// data.add_custom("loyalty", &Loyalty { points: 40 }).unwrap();
/// assert_eq!(data.get_custom::<Loyalty>("loyalty"), Some(Loyalty { points: 40 }));
/// ```
pub trait CustomData: Serialize + DeserializeOwned {
    /// Tag written next to the value
    const TYPE_NAME: &'static str;
}

/// The value-set stored under one key
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    type_name: String,
    values: Vec<DataValue>,
    is_array: bool,
}

impl DataEntry {
    /// Type name shared by all values
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Stored values; a scalar entry holds exactly one
    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    /// Whether the entry was added as an array
    pub fn is_array(&self) -> bool {
        self.is_array
    }
}

#[derive(Serialize, Deserialize)]
struct SerializedEntry {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    array: bool,
    value: serde_json::Value,
}

/// String-keyed bag of type-tagged values
///
/// `Clone` produces an independent deep copy.
#[derive(Debug, Clone, Default)]
pub struct AdditionalData {
    data: DashMap<String, DataEntry>,
}

impl AdditionalData {
    /// Create an empty bag
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Add a single value, replacing whatever was stored under `key`
    ///
    /// A value without a JSON representation (NaN or an infinite float) is
    /// not stored.
    pub fn add_data<T: DataType>(&self, key: &str, value: T) {
        let value = value.into_data_value();
        if !value.is_encodable() {
            warn!(key, value = %value.to_display_string(), "non-finite value not stored");
            return;
        }
        self.data.insert(
            key.to_string(),
            DataEntry {
                type_name: value.type_name().to_string(),
                values: vec![value],
                is_array: false,
            },
        );
    }

    /// Add an array of values, replacing whatever was stored under `key`
    ///
    /// An empty array is ignored, and so is an array holding any value
    /// without a JSON representation.
    pub fn add_data_array<T: DataType>(&self, key: &str, values: Vec<T>) {
        if values.is_empty() {
            return;
        }
        let values: Vec<DataValue> = values.into_iter().map(DataType::into_data_value).collect();
        if !values.iter().all(DataValue::is_encodable) {
            warn!(key, "array with a non-finite value not stored");
            return;
        }
        self.data.insert(
            key.to_string(),
            DataEntry {
                type_name: T::TYPE_NAME.to_string(),
                values,
                is_array: true,
            },
        );
    }

    /// Add a caller-registered record under `key`
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the record can not be converted to JSON.
    pub fn add_custom<T: CustomData>(&self, key: &str, value: &T) -> Result<(), AppFlowError> {
        let value = serde_json::to_value(value)?;
        self.data.insert(
            key.to_string(),
            DataEntry {
                type_name: T::TYPE_NAME.to_string(),
                values: vec![DataValue::Custom {
                    type_name: T::TYPE_NAME.to_string(),
                    value,
                }],
                is_array: false,
            },
        );
        Ok(())
    }

    /// Copy all entries of `other` into this bag
    ///
    /// Existing keys are only replaced when `allow_overwrite` is set.
    pub fn add_all(&self, other: &AdditionalData, allow_overwrite: bool) {
        for (key, entry) in other.snapshot() {
            if allow_overwrite || !self.data.contains_key(&key) {
                self.data.insert(key, entry);
            }
        }
    }

    /// Remove the entry under `key`, returning whether one existed
    pub fn remove_data(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Retrieve a single value of type `T` and remove the entry
    ///
    /// The entry is only removed when the typed retrieval succeeds.
    pub fn get_and_remove_data<T: DataType>(&self, key: &str) -> Option<T> {
        let value = self.get_value::<T>(key)?;
        self.data.remove(key);
        Some(value)
    }

    /// Whether an entry exists under `key`
    pub fn has_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Untyped access to the entry under `key`
    pub fn get_entry(&self, key: &str) -> Option<DataEntry> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Retrieve a single value of exactly type `T`
    ///
    /// Returns `None` if the key is missing, holds an array, or holds another type.
    pub fn get_value<T: DataType>(&self, key: &str) -> Option<T> {
        let entry = self.data.get(key)?;
        if entry.is_array || entry.type_name != T::TYPE_NAME {
            debug!(
                key,
                stored = %entry.type_name,
                requested = T::TYPE_NAME,
                "additional data type mismatch"
            );
            return None;
        }
        entry.values.first().and_then(T::from_data_value)
    }

    /// Retrieve all values of type `T`
    ///
    /// A scalar entry of type `T` is returned as a one-element vector.
    pub fn get_values<T: DataType>(&self, key: &str) -> Option<Vec<T>> {
        let entry = self.data.get(key)?;
        if entry.type_name != T::TYPE_NAME {
            debug!(
                key,
                stored = %entry.type_name,
                requested = T::TYPE_NAME,
                "additional data type mismatch"
            );
            return None;
        }
        entry.values.iter().map(T::from_data_value).collect()
    }

    /// Retrieve the stored value(s) of any type converted to strings
    pub fn get_string_values(&self, key: &str) -> Option<Vec<String>> {
        self.data.get(key).map(|entry| {
            entry
                .values
                .iter()
                .map(DataValue::to_display_string)
                .collect()
        })
    }

    /// Retrieve a caller-registered record
    pub fn get_custom<T: CustomData>(&self, key: &str) -> Option<T> {
        let entry = self.data.get(key)?;
        if entry.is_array || entry.type_name != T::TYPE_NAME {
            debug!(
                key,
                stored = %entry.type_name,
                requested = T::TYPE_NAME,
                "additional data type mismatch"
            );
            return None;
        }
        match entry.values.first() {
            Some(DataValue::Custom { value, .. }) => match serde_json::from_value(value.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(key, error = %e, "additional data record could not be decoded");
                    None
                }
            },
            _ => None,
        }
    }

    /// All scalar values of type `T`, keyed by their key
    pub fn get_data_of_type<T: DataType>(&self) -> BTreeMap<String, T> {
        self.data
            .iter()
            .filter(|entry| !entry.is_array && entry.type_name == T::TYPE_NAME)
            .filter_map(|entry| {
                entry
                    .values
                    .first()
                    .and_then(T::from_data_value)
                    .map(|value| (entry.key().clone(), value))
            })
            .collect()
    }

    /// Keys whose entries carry the given type name, sorted
    pub fn get_keys_of_type(&self, type_name: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.type_name == type_name)
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the bag holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remove all entries
    pub fn clear_data(&self) {
        self.data.clear();
    }

    fn snapshot(&self) -> BTreeMap<String, DataEntry> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl PartialEq for AdditionalData {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl Serialize for AdditionalData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: BTreeMap<String, SerializedEntry> = self
            .snapshot()
            .into_iter()
            .map(|(key, entry)| {
                let value = if entry.is_array {
                    serde_json::Value::Array(
                        entry.values.iter().map(DataValue::to_json_value).collect(),
                    )
                } else {
                    entry
                        .values
                        .first()
                        .map(DataValue::to_json_value)
                        .unwrap_or(serde_json::Value::Null)
                };
                (
                    key,
                    SerializedEntry {
                        type_name: entry.type_name,
                        array: entry.is_array,
                        value,
                    },
                )
            })
            .collect();
        entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AdditionalData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, SerializedEntry>::deserialize(deserializer)?;
        let data = AdditionalData::new();
        for (key, entry) in entries {
            let raw_values = match (entry.array, entry.value) {
                (true, serde_json::Value::Array(values)) => values,
                (true, _) => {
                    return Err(serde::de::Error::custom(format!(
                        "entry '{}' is marked as array but holds a scalar",
                        key
                    )))
                }
                (false, value) => vec![value],
            };
            let values = raw_values
                .into_iter()
                .map(|value| DataValue::from_json_value(&entry.type_name, value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(serde::de::Error::custom)?;
            data.data.insert(
                key,
                DataEntry {
                    type_name: entry.type_name,
                    values,
                    is_array: entry.array,
                },
            );
        }
        Ok(data)
    }
}
