use crate::frame::Frame;
use crate::function::Function;
use crate::map::{Map, MapResult, ValueIter};
use crate::node::Node;

use super::data::Data;

/// An enumeration of all possible value types.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ValueType {
    Int,
    Float,
    Data,
    Node,
    Frame,
    Function,
}

/// A trait for values which can be stored in a map.
pub trait ValueNotArray: Sized {
    /// Retrieves an iterator over the values from the map.
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>>;

    /// Appends the value to the map.
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()>;
}

pub trait Value: Sized {
    /// Retrieves the value from the map.
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self>;

    /// Sets the property value in the map.
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()>;
}

impl Value for i64 {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_int(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_int(key, *x)
    }
}

impl ValueNotArray for i64 {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_int_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_int(key, *x)
    }
}

impl Value for f64 {
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_float(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_float(key, *x)
    }
}

impl ValueNotArray for f64 {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_float_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_float(key, *x)
    }
}

impl Value for Data {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_data(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_data(key, x)
    }
}

impl ValueNotArray for Data {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_data_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_data(key, x)
    }
}

impl Value for Node {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_node(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_node(key, x)
    }
}

impl ValueNotArray for Node {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_node_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_node(key, x)
    }
}

impl Value for Frame {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_frame(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_frame(key, x)
    }
}

impl ValueNotArray for Frame {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_frame_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_frame(key, x)
    }
}

impl Value for Function {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_function(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_function(key, x)
    }
}

impl ValueNotArray for Function {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        map.get_function_iter(key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_function(key, x)
    }
}

impl Value for Vec<i64> {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_int_array(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_int_array(key, x.to_vec())
    }
}

impl Value for Vec<f64> {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_float_array(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_float_array(key, x.to_vec())
    }
}

impl Value for String {
    #[inline]
    fn get_from_map(map: &Map, key: &str) -> MapResult<Self> {
        map.get_string(key)
    }

    #[inline]
    fn store_in_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.set_string(key, x)
    }
}

impl ValueNotArray for String {
    #[inline]
    fn get_iter_from_map<'map>(map: &'map Map, key: &str) -> MapResult<ValueIter<'map, Self>> {
        ValueIter::new_string(map, key)
    }

    #[inline]
    fn append_to_map(map: &mut Map, key: &str, x: &Self) -> MapResult<()> {
        map.append_string(key, x)
    }
}
