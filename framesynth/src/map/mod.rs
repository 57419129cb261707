//! Property maps.
//!
//! A map contains key-value pairs where the value is zero or more elements of
//! a certain type. Element arrays are homogeneous; replacing a key may change
//! its type, appending may not. Iteration order is insertion order.

use std::sync::Arc;

use crate::frame::Frame;
use crate::function::Function;
use crate::node::Node;

mod errors;
pub use errors::{InvalidKeyError, MapError, MapResult};

mod iterators;
pub use self::iterators::{Keys, ValueIter};

mod value;
pub use self::value::{Value, ValueNotArray, ValueType};

mod data;
pub use self::data::{Data, DataType};

#[cfg(test)]
mod tests;

/// How `set_with_mode` treats an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendMode {
    Replace,
    Append,
    Touch,
}

#[derive(Clone, Debug)]
pub(crate) enum PropValue {
    Int(Arc<Vec<i64>>),
    Float(Arc<Vec<f64>>),
    Data(Arc<Vec<Data>>),
    Node(Arc<Vec<Node>>),
    Frame(Arc<Vec<Frame>>),
    Function(Arc<Vec<Function>>),
}

impl PropValue {
    fn value_type(&self) -> ValueType {
        match self {
            PropValue::Int(_) => ValueType::Int,
            PropValue::Float(_) => ValueType::Float,
            PropValue::Data(_) => ValueType::Data,
            PropValue::Node(_) => ValueType::Node,
            PropValue::Frame(_) => ValueType::Frame,
            PropValue::Function(_) => ValueType::Function,
        }
    }

    fn len(&self) -> usize {
        match self {
            PropValue::Int(v) => v.len(),
            PropValue::Float(v) => v.len(),
            PropValue::Data(v) => v.len(),
            PropValue::Node(v) => v.len(),
            PropValue::Frame(v) => v.len(),
            PropValue::Function(v) => v.len(),
        }
    }

    fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Int => PropValue::Int(Arc::new(Vec::new())),
            ValueType::Float => PropValue::Float(Arc::new(Vec::new())),
            ValueType::Data => PropValue::Data(Arc::new(Vec::new())),
            ValueType::Node => PropValue::Node(Arc::new(Vec::new())),
            ValueType::Frame => PropValue::Frame(Arc::new(Vec::new())),
            ValueType::Function => PropValue::Function(Arc::new(Vec::new())),
        }
    }
}

#[derive(Clone, Debug)]
struct MapEntry {
    key: String,
    value: PropValue,
}

/// An insertion-ordered map from string keys to typed value arrays.
///
/// Cloning a map is cheap: the value arrays are shared until one side
/// mutates them.
#[derive(Clone, Debug, Default)]
pub struct Map {
    entries: Vec<MapEntry>,
}

impl Map {
    /// Creates a new empty map.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if the key is valid. Valid keys start with an ASCII letter or
    /// underscore and contain only ASCII letters, digits and underscores.
    pub fn is_key_valid(key: &str) -> Result<(), InvalidKeyError> {
        if key.is_empty() {
            return Err(InvalidKeyError::EmptyKey);
        }
        for (i, c) in key.bytes().enumerate() {
            let valid = c == b'_'
                || c.is_ascii_alphabetic()
                || (i > 0 && c.is_ascii_digit());
            if !valid {
                return Err(InvalidKeyError::InvalidCharacter(i));
            }
        }
        Ok(())
    }

    /// Removes all keys from the map.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the error message contained in the map, if any.
    pub fn error(&self) -> Option<&str> {
        let entry = self.entries.iter().find(|e| e.key == "_Error")?;
        match &entry.value {
            PropValue::Data(v) => v.first().map(|d| std::str::from_utf8(d).unwrap_or("")),
            _ => None,
        }
    }

    /// Adds an error message to the map. The map is cleared first.
    pub fn set_error(&mut self, error_message: &str) {
        self.clear();
        self.entries.push(MapEntry {
            key: "_Error".to_owned(),
            value: PropValue::Data(Arc::new(vec![Data::from(error_message)])),
        });
    }

    /// Returns the number of keys contained in a map.
    #[inline]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the key at the given insertion index.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn key(&self, index: usize) -> &str {
        &self.entries[index].key
    }

    /// Returns an iterator over the keys in insertion order.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    fn entry(&self, key: &str) -> MapResult<&MapEntry> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .ok_or(MapError::KeyNotFound)
    }

    pub(crate) fn value(&self, key: &str) -> MapResult<&PropValue> {
        Ok(&self.entry(key)?.value)
    }

    /// Returns the number of elements associated with a key.
    pub fn value_count(&self, key: &str) -> MapResult<usize> {
        Ok(self.entry(key)?.value.len())
    }

    /// Returns the type of the elements associated with the given key.
    pub fn value_type(&self, key: &str) -> MapResult<ValueType> {
        Ok(self.entry(key)?.value.value_type())
    }

    /// Removes the property with the given key.
    pub fn delete_key(&mut self, key: &str) -> MapResult<()> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.key == key)
            .ok_or(MapError::KeyNotFound)?;
        self.entries.remove(pos);
        Ok(())
    }

    /// Creates an empty entry of the given type if the key does not exist yet.
    pub fn touch(&mut self, key: &str, value_type: ValueType) -> MapResult<()> {
        Map::is_key_valid(key)?;
        if self.entry(key).is_err() {
            self.entries.push(MapEntry {
                key: key.to_owned(),
                value: PropValue::empty(value_type),
            });
        }
        Ok(())
    }

    fn replace(&mut self, key: &str, value: PropValue) -> MapResult<()> {
        Map::is_key_valid(key)?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value;
        } else {
            self.entries.push(MapEntry {
                key: key.to_owned(),
                value,
            });
        }
        Ok(())
    }

    /// Retrieves a value of the given type from the map.
    pub fn get<T: Value>(&self, key: &str) -> MapResult<T> {
        T::get_from_map(self, key)
    }

    /// Retrieves an iterator over the values associated with the key.
    pub fn get_iter<T: ValueNotArray>(&self, key: &str) -> MapResult<ValueIter<'_, T>> {
        T::get_iter_from_map(self, key)
    }

    /// Sets the property value, replacing any existing entry.
    pub fn set<T: Value>(&mut self, key: &str, x: &T) -> MapResult<()> {
        T::store_in_map(self, key, x)
    }

    /// Appends the value to the entry under the key. The entry must either not
    /// exist or already hold elements of the same type.
    pub fn append<T: ValueNotArray>(&mut self, key: &str, x: &T) -> MapResult<()> {
        T::append_to_map(self, key, x)
    }

    // Typed accessors. `get_*` returns the first element of the entry.

    pub fn get_int(&self, key: &str) -> MapResult<i64> {
        self.get_int_at(key, 0)
    }

    pub fn get_int_at(&self, key: &str, index: usize) -> MapResult<i64> {
        match self.value(key)? {
            PropValue::Int(v) => v.get(index).copied().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_int_iter(&self, key: &str) -> MapResult<ValueIter<'_, i64>> {
        ValueIter::new_int(self, key)
    }

    pub fn get_int_array(&self, key: &str) -> MapResult<Vec<i64>> {
        match self.value(key)? {
            PropValue::Int(v) => Ok(v.as_ref().clone()),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_float(&self, key: &str) -> MapResult<f64> {
        self.get_float_at(key, 0)
    }

    pub fn get_float_at(&self, key: &str, index: usize) -> MapResult<f64> {
        match self.value(key)? {
            PropValue::Float(v) => v.get(index).copied().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_float_iter(&self, key: &str) -> MapResult<ValueIter<'_, f64>> {
        ValueIter::new_float(self, key)
    }

    pub fn get_float_array(&self, key: &str) -> MapResult<Vec<f64>> {
        match self.value(key)? {
            PropValue::Float(v) => Ok(v.as_ref().clone()),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_data(&self, key: &str) -> MapResult<Data> {
        self.get_data_at(key, 0)
    }

    pub fn get_data_at(&self, key: &str, index: usize) -> MapResult<Data> {
        match self.value(key)? {
            PropValue::Data(v) => v.get(index).cloned().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_data_iter(&self, key: &str) -> MapResult<ValueIter<'_, Data>> {
        ValueIter::new_data(self, key)
    }

    pub fn get_string(&self, key: &str) -> MapResult<String> {
        self.get_string_at(key, 0)
    }

    pub fn get_string_at(&self, key: &str, index: usize) -> MapResult<String> {
        let data = self.get_data_at(key, index)?;
        Ok(String::from_utf8(data.to_vec())?)
    }

    pub fn get_node(&self, key: &str) -> MapResult<Node> {
        self.get_node_at(key, 0)
    }

    pub fn get_node_at(&self, key: &str, index: usize) -> MapResult<Node> {
        match self.value(key)? {
            PropValue::Node(v) => v.get(index).cloned().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_node_iter(&self, key: &str) -> MapResult<ValueIter<'_, Node>> {
        ValueIter::new_node(self, key)
    }

    pub fn get_frame(&self, key: &str) -> MapResult<Frame> {
        self.get_frame_at(key, 0)
    }

    pub fn get_frame_at(&self, key: &str, index: usize) -> MapResult<Frame> {
        match self.value(key)? {
            PropValue::Frame(v) => v.get(index).cloned().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_frame_iter(&self, key: &str) -> MapResult<ValueIter<'_, Frame>> {
        ValueIter::new_frame(self, key)
    }

    pub fn get_function(&self, key: &str) -> MapResult<Function> {
        self.get_function_at(key, 0)
    }

    pub fn get_function_at(&self, key: &str, index: usize) -> MapResult<Function> {
        match self.value(key)? {
            PropValue::Function(v) => v.get(index).cloned().ok_or(MapError::IndexOutOfBounds),
            _ => Err(MapError::WrongValueType),
        }
    }

    pub fn get_function_iter(&self, key: &str) -> MapResult<ValueIter<'_, Function>> {
        ValueIter::new_function(self, key)
    }

    pub fn set_int(&mut self, key: &str, x: i64) -> MapResult<()> {
        self.replace(key, PropValue::Int(Arc::new(vec![x])))
    }

    pub fn set_int_array(&mut self, key: &str, x: Vec<i64>) -> MapResult<()> {
        self.replace(key, PropValue::Int(Arc::new(x)))
    }

    pub fn set_float(&mut self, key: &str, x: f64) -> MapResult<()> {
        self.replace(key, PropValue::Float(Arc::new(vec![x])))
    }

    pub fn set_float_array(&mut self, key: &str, x: Vec<f64>) -> MapResult<()> {
        self.replace(key, PropValue::Float(Arc::new(x)))
    }

    pub fn set_data(&mut self, key: &str, x: &[u8]) -> MapResult<()> {
        self.replace(
            key,
            PropValue::Data(Arc::new(vec![Data::new(x, DataType::Binary)])),
        )
    }

    pub fn set_string(&mut self, key: &str, x: &str) -> MapResult<()> {
        self.replace(key, PropValue::Data(Arc::new(vec![Data::from(x)])))
    }

    pub fn set_node(&mut self, key: &str, x: &Node) -> MapResult<()> {
        self.replace(key, PropValue::Node(Arc::new(vec![x.clone()])))
    }

    pub fn set_frame(&mut self, key: &str, x: &Frame) -> MapResult<()> {
        self.replace(key, PropValue::Frame(Arc::new(vec![x.clone()])))
    }

    pub fn set_function(&mut self, key: &str, x: &Function) -> MapResult<()> {
        self.replace(key, PropValue::Function(Arc::new(vec![x.clone()])))
    }

    fn append_value(&mut self, key: &str, value: PropValue) -> MapResult<()> {
        Map::is_key_valid(key)?;
        match self.entries.iter_mut().find(|e| e.key == key) {
            None => {
                self.entries.push(MapEntry {
                    key: key.to_owned(),
                    value,
                });
                Ok(())
            }
            Some(entry) => match (&mut entry.value, value) {
                (PropValue::Int(dst), PropValue::Int(src)) => {
                    Arc::make_mut(dst).extend(src.iter().copied());
                    Ok(())
                }
                (PropValue::Float(dst), PropValue::Float(src)) => {
                    Arc::make_mut(dst).extend(src.iter().copied());
                    Ok(())
                }
                (PropValue::Data(dst), PropValue::Data(src)) => {
                    Arc::make_mut(dst).extend(src.iter().cloned());
                    Ok(())
                }
                (PropValue::Node(dst), PropValue::Node(src)) => {
                    Arc::make_mut(dst).extend(src.iter().cloned());
                    Ok(())
                }
                (PropValue::Frame(dst), PropValue::Frame(src)) => {
                    Arc::make_mut(dst).extend(src.iter().cloned());
                    Ok(())
                }
                (PropValue::Function(dst), PropValue::Function(src)) => {
                    Arc::make_mut(dst).extend(src.iter().cloned());
                    Ok(())
                }
                _ => Err(MapError::WrongValueType),
            },
        }
    }

    pub fn append_int(&mut self, key: &str, x: i64) -> MapResult<()> {
        self.append_value(key, PropValue::Int(Arc::new(vec![x])))
    }

    pub fn append_float(&mut self, key: &str, x: f64) -> MapResult<()> {
        self.append_value(key, PropValue::Float(Arc::new(vec![x])))
    }

    pub fn append_data(&mut self, key: &str, x: &[u8]) -> MapResult<()> {
        self.append_value(
            key,
            PropValue::Data(Arc::new(vec![Data::new(x, DataType::Binary)])),
        )
    }

    pub fn append_string(&mut self, key: &str, x: &str) -> MapResult<()> {
        self.append_value(key, PropValue::Data(Arc::new(vec![Data::from(x)])))
    }

    pub fn append_node(&mut self, key: &str, x: &Node) -> MapResult<()> {
        self.append_value(key, PropValue::Node(Arc::new(vec![x.clone()])))
    }

    pub fn append_frame(&mut self, key: &str, x: &Frame) -> MapResult<()> {
        self.append_value(key, PropValue::Frame(Arc::new(vec![x.clone()])))
    }

    pub fn append_function(&mut self, key: &str, x: &Function) -> MapResult<()> {
        self.append_value(key, PropValue::Function(Arc::new(vec![x.clone()])))
    }

    /// Sets a value with an explicit append mode, the way filter argument
    /// plumbing does it.
    pub fn set_with_mode<T: ValueNotArray + Value>(
        &mut self,
        key: &str,
        x: &T,
        mode: AppendMode,
    ) -> MapResult<()> {
        match mode {
            AppendMode::Replace => self.set(key, x),
            AppendMode::Append => self.append(key, x),
            AppendMode::Touch => {
                if self.entry(key).is_err() {
                    self.set(key, x)?;
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
                        entry.value = PropValue::empty(entry.value.value_type());
                    }
                }
                Ok(())
            }
        }
    }
}
