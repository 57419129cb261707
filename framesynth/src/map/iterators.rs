use std::marker::PhantomData;

use super::{Data, Map, MapError, MapResult, PropValue};
use crate::frame::Frame;
use crate::function::Function;
use crate::node::Node;

/// An iterator over the keys of a map.
#[derive(Debug, Clone, Copy)]
pub struct Keys<'map> {
    map: &'map Map,
    count: usize,
    index: usize,
}

impl<'map> Keys<'map> {
    #[inline]
    pub(crate) fn new(map: &'map Map) -> Self {
        Self {
            map,
            count: map.key_count(),
            index: 0,
        }
    }
}

impl<'map> Iterator for Keys<'map> {
    type Item = &'map str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index == self.count {
            return None;
        }

        let key = self.map.key(self.index);
        self.index += 1;
        Some(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.count - self.index;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Keys<'_> {}

/// An iterator over the values associated with a certain key of a map.
#[derive(Debug, Clone)]
pub struct ValueIter<'map, T> {
    value: &'map PropValue,
    count: usize,
    index: usize,
    _variance: PhantomData<fn() -> T>,
}

macro_rules! impl_value_iter {
    ($type:ty, $variant:ident, $new_method:ident, $extract:expr) => {
        impl<'map> ValueIter<'map, $type> {
            /// Creates a `ValueIter` over the given `key` of `map`.
            #[inline]
            pub(crate) fn $new_method(map: &'map Map, key: &str) -> MapResult<Self> {
                let value = map.value(key)?;
                match value {
                    PropValue::$variant(_) => {}
                    _ => return Err(MapError::WrongValueType),
                };

                Ok(Self {
                    value,
                    count: value.len(),
                    index: 0,
                    _variance: PhantomData,
                })
            }
        }

        impl<'map> Iterator for ValueIter<'map, $type> {
            type Item = $type;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                if self.index == self.count {
                    return None;
                }

                let item = match self.value {
                    PropValue::$variant(v) => ($extract)(&v[self.index]),
                    _ => unreachable!(),
                };
                self.index += 1;
                Some(item)
            }

            #[inline]
            fn size_hint(&self) -> (usize, Option<usize>) {
                let len = self.count - self.index;
                (len, Some(len))
            }
        }

        impl ExactSizeIterator for ValueIter<'_, $type> {}
    };
}

impl_value_iter!(i64, Int, new_int, |x: &i64| *x);
impl_value_iter!(f64, Float, new_float, |x: &f64| *x);
impl_value_iter!(Data, Data, new_data, |x: &Data| x.clone());
impl_value_iter!(String, Data, new_string, |x: &Data| {
    String::from_utf8_lossy(x).into_owned()
});
impl_value_iter!(Node, Node, new_node, |x: &Node| x.clone());
impl_value_iter!(Frame, Frame, new_frame, |x: &Frame| x.clone());
impl_value_iter!(Function, Function, new_function, |x: &Function| x.clone());
