//! Typed access to a configuration object
//!
//! [`ConfigObject`] wraps a decoded JSON object. Its accessors never fail:
//! a missing key or a value of the wrong type records an [`AccessError`] and
//! returns the type's zero value, so a whole section can be read in one pass.
//! [`ConfigObject::validate`] then reports every recorded problem, plus any
//! key that was never read.
//!
//! Each accessor comes in three forms:
//! - `required_*(key)` records an error when the key is absent
//! - `optional_*(key, default)` returns `default` when the key is absent
//! - `*(key, &[default])` is always optional: an absent key returns the
//!   default, or the zero value when none is given, without recording an
//!   error; passing more than one default is a bug in the caller and panics
//!
//! Numbers are truncated toward zero when read as integers. A number outside
//! the target type's range (including any negative number read as unsigned)
//! is a type mismatch, not a wraparound.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{AccessError, Error};
use crate::value::{parse_bool, Value};

/// A type that can be read from a configuration value
pub trait ConfigType: Sized + Clone {
    /// Description used in error messages (e.g., "string", "list of strings")
    const EXPECTED: &'static str;

    /// Value returned when the key is missing or has the wrong type
    fn zero() -> Self;

    /// Convert, or describe what was found instead
    fn from_value(value: &Value) -> std::result::Result<Self, String>;
}

impl ConfigType for String {
    const EXPECTED: &'static str = "string";

    fn zero() -> Self {
        String::new()
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(other.type_name().to_string()),
        }
    }
}

impl ConfigType for bool {
    const EXPECTED: &'static str = "boolean";

    fn zero() -> Self {
        false
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => parse_bool(s).ok_or_else(|| format!("string {:?}", s)),
            other => Err(other.type_name().to_string()),
        }
    }
}

/// Truncate a number toward zero and check it lies in `[min, max)`
fn integral(value: &Value, min: f64, max: f64) -> std::result::Result<f64, String> {
    let n = match value {
        Value::Number(n) => *n,
        other => return Err(other.type_name().to_string()),
    };
    let truncated = n.trunc();
    if !(min..max).contains(&truncated) {
        return Err(format!("{} (out of range)", n));
    }
    Ok(truncated)
}

impl ConfigType for i32 {
    const EXPECTED: &'static str = "integer";

    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        integral(value, -2147483648.0, 2147483648.0).map(|n| n as i32)
    }
}

impl ConfigType for u64 {
    const EXPECTED: &'static str = "unsigned integer";

    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        integral(value, 0.0, 18446744073709551616.0).map(|n| n as u64)
    }
}

impl ConfigType for i64 {
    const EXPECTED: &'static str = "64-bit integer";

    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        integral(value, -9223372036854775808.0, 9223372036854775808.0).map(|n| n as i64)
    }
}

/// Convert every element or fail the whole list on the first mismatch
fn list_of<T: ConfigType>(value: &Value) -> std::result::Result<Vec<T>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(other.type_name().to_string()),
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| T::from_value(item).map_err(|found| format!("{} at index {}", found, i)))
        .collect()
}

impl ConfigType for Vec<String> {
    const EXPECTED: &'static str = "list of strings";

    fn zero() -> Self {
        Vec::new()
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        list_of(value)
    }
}

impl ConfigType for Vec<i64> {
    const EXPECTED: &'static str = "list of integers";

    fn zero() -> Self {
        Vec::new()
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        list_of(value)
    }
}

impl ConfigType for ConfigObject {
    const EXPECTED: &'static str = "object";

    fn zero() -> Self {
        ConfigObject::default()
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Object(map) => Ok(ConfigObject::new(map.clone())),
            other => Err(other.type_name().to_string()),
        }
    }
}

/// A value that may be given either inline as a string or as an object
#[derive(Debug, Clone, PartialEq)]
pub enum StringOrObject {
    String(String),
    Object(ConfigObject),
}

impl StringOrObject {
    /// Get as string slice if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StringOrObject::String(s) => Some(s),
            StringOrObject::Object(_) => None,
        }
    }

    /// Get as mutable object if this is an Object
    pub fn as_object_mut(&mut self) -> Option<&mut ConfigObject> {
        match self {
            StringOrObject::String(_) => None,
            StringOrObject::Object(obj) => Some(obj),
        }
    }
}

impl ConfigType for StringOrObject {
    const EXPECTED: &'static str = "string or object";

    fn zero() -> Self {
        StringOrObject::String(String::new())
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::String(s) => Ok(StringOrObject::String(s.clone())),
            Value::Object(map) => Ok(StringOrObject::Object(ConfigObject::new(map.clone()))),
            other => Err(other.type_name().to_string()),
        }
    }
}

/// Typed view over a configuration object
///
/// Tracks which keys have been read and the errors found while reading them.
/// Objects returned by [`required_object`](Self::required_object) and friends
/// are independent: validate each one you read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigObject {
    map: IndexMap<String, Value>,
    known: HashSet<String>,
    errors: Vec<AccessError>,
}

impl ConfigObject {
    /// Wrap a decoded object
    pub fn new(map: IndexMap<String, Value>) -> Self {
        Self {
            map,
            known: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// The underlying object
    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.map
    }

    /// Check if `key` is present, without marking it as read
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Errors recorded so far, not including unknown keys
    pub fn errors(&self) -> &[AccessError] {
        &self.errors
    }

    /// Read `key`, recording an error if it is absent or mistyped
    pub fn required<T: ConfigType>(&mut self, key: &str) -> T {
        self.lookup(key, None)
    }

    /// Read `key`, returning `default` if it is absent
    pub fn optional<T: ConfigType>(&mut self, key: &str, default: T) -> T {
        self.lookup(key, Some(default))
    }

    /// Read `key`, returning `None` if it is absent
    pub fn try_optional<T: ConfigType>(&mut self, key: &str) -> Option<T> {
        if self.map.contains_key(key) {
            Some(self.lookup(key, None))
        } else {
            self.known.insert(key.to_string());
            None
        }
    }

    /// Read `key` as optional, defaulting to the zero value when no default is given
    ///
    /// # Panics
    ///
    /// If more than one default is given.
    pub fn get<T: ConfigType>(&mut self, key: &str, defaults: &[T]) -> T {
        match defaults {
            [] => self.optional(key, T::zero()),
            [default] => self.optional(key, default.clone()),
            _ => panic!(
                "invalid arguments for config key {:?}: at most one default {} allowed, got {}",
                key,
                T::EXPECTED,
                defaults.len()
            ),
        }
    }

    fn lookup<T: ConfigType>(&mut self, key: &str, default: Option<T>) -> T {
        self.known.insert(key.to_string());
        let Some(value) = self.map.get(key) else {
            return match default {
                Some(default) => default,
                None => {
                    self.errors.push(AccessError::MissingKey {
                        key: key.to_string(),
                        expected: T::EXPECTED,
                    });
                    T::zero()
                }
            };
        };
        match T::from_value(value) {
            Ok(v) => v,
            Err(found) => {
                self.errors.push(AccessError::TypeMismatch {
                    key: key.to_string(),
                    expected: T::EXPECTED,
                    found,
                });
                T::zero()
            }
        }
    }

    pub fn required_string(&mut self, key: &str) -> String {
        self.required(key)
    }

    pub fn optional_string(&mut self, key: &str, default: &str) -> String {
        self.optional(key, default.to_string())
    }

    pub fn string(&mut self, key: &str, defaults: &[&str]) -> String {
        let defaults: Vec<String> = defaults.iter().map(|s| s.to_string()).collect();
        self.get(key, &defaults)
    }

    pub fn required_bool(&mut self, key: &str) -> bool {
        self.required(key)
    }

    pub fn optional_bool(&mut self, key: &str, default: bool) -> bool {
        self.optional(key, default)
    }

    pub fn bool(&mut self, key: &str, defaults: &[bool]) -> bool {
        self.get(key, defaults)
    }

    pub fn required_int(&mut self, key: &str) -> i32 {
        self.required(key)
    }

    pub fn optional_int(&mut self, key: &str, default: i32) -> i32 {
        self.optional(key, default)
    }

    pub fn int(&mut self, key: &str, defaults: &[i32]) -> i32 {
        self.get(key, defaults)
    }

    pub fn required_uint(&mut self, key: &str) -> u64 {
        self.required(key)
    }

    pub fn optional_uint(&mut self, key: &str, default: u64) -> u64 {
        self.optional(key, default)
    }

    pub fn uint(&mut self, key: &str, defaults: &[u64]) -> u64 {
        self.get(key, defaults)
    }

    pub fn required_int64(&mut self, key: &str) -> i64 {
        self.required(key)
    }

    pub fn optional_int64(&mut self, key: &str, default: i64) -> i64 {
        self.optional(key, default)
    }

    pub fn int64(&mut self, key: &str, defaults: &[i64]) -> i64 {
        self.get(key, defaults)
    }

    pub fn required_list(&mut self, key: &str) -> Vec<String> {
        self.required(key)
    }

    pub fn optional_list(&mut self, key: &str, default: Vec<String>) -> Vec<String> {
        self.optional(key, default)
    }

    pub fn list(&mut self, key: &str, defaults: &[Vec<String>]) -> Vec<String> {
        self.get(key, defaults)
    }

    pub fn required_int_list(&mut self, key: &str) -> Vec<i64> {
        self.required(key)
    }

    pub fn optional_int_list(&mut self, key: &str, default: Vec<i64>) -> Vec<i64> {
        self.optional(key, default)
    }

    pub fn int_list(&mut self, key: &str, defaults: &[Vec<i64>]) -> Vec<i64> {
        self.get(key, defaults)
    }

    pub fn required_object(&mut self, key: &str) -> ConfigObject {
        self.required(key)
    }

    /// An absent key reads as an empty object
    pub fn optional_object(&mut self, key: &str) -> ConfigObject {
        self.optional(key, ConfigObject::default())
    }

    pub fn object(&mut self, key: &str, defaults: &[ConfigObject]) -> ConfigObject {
        self.get(key, defaults)
    }

    pub fn required_string_or_object(&mut self, key: &str) -> StringOrObject {
        self.required(key)
    }

    pub fn optional_string_or_object(&mut self, key: &str) -> Option<StringOrObject> {
        self.try_optional(key)
    }

    pub fn string_or_object(&mut self, key: &str, defaults: &[StringOrObject]) -> StringOrObject {
        self.get(key, defaults)
    }

    /// Keys present but never read, sorted
    ///
    /// Keys starting with an underscore are comments and never reported.
    pub fn unknown_keys(&self) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .map
            .keys()
            .filter(|k| !self.known.contains(k.as_str()) && !k.starts_with('_'))
            .cloned()
            .collect();
        unknown.sort();
        unknown
    }

    /// Report every recorded error and unknown key
    ///
    /// A single problem is returned as is; several are combined into
    /// [`AccessError::Multiple`].
    pub fn validate(&self) -> std::result::Result<(), AccessError> {
        let mut errors = self.errors.clone();
        errors.extend(
            self.unknown_keys()
                .into_iter()
                .map(|key| AccessError::UnknownKey { key }),
        );

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(AccessError::Multiple(errors)),
        }
    }
}

impl From<IndexMap<String, Value>> for ConfigObject {
    fn from(map: IndexMap<String, Value>) -> Self {
        ConfigObject::new(map)
    }
}

impl TryFrom<Value> for ConfigObject {
    type Error = Error;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(ConfigObject::new(map)),
            other => Err(Error::unsupported_value(format!(
                "expected an object, not {}",
                other.type_name()
            ))),
        }
    }
}
