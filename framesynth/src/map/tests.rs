#[cfg(test)]
mod tests {
    use crate::map::{Map, MapError, ValueType};

    #[test]
    fn test_map_creation() {
        let map = Map::new();

        // Map should be empty initially
        assert_eq!(map.key_count(), 0);
    }

    #[test]
    fn test_map_set_and_get_int() {
        let mut map = Map::new();

        map.set("test_key", &42i64).expect("Failed to set int value");

        assert_eq!(map.key_count(), 1);

        let value: i64 = map.get("test_key").expect("Failed to get int value");
        assert_eq!(value, 42);

        assert_eq!(map.value_count("test_key").unwrap(), 1);
    }

    #[test]
    fn test_map_set_and_get_float() {
        let mut map = Map::new();

        map.set("pi", &std::f64::consts::PI)
            .expect("Failed to set float value");

        let value: f64 = map.get("pi").expect("Failed to get float value");
        assert!((value - std::f64::consts::PI).abs() < f64::EPSILON);
    }

    #[test]
    fn test_map_set_and_get_string() {
        let mut map = Map::new();

        let test_string = "Hello, framesynth!".to_string();
        map.set("message", &test_string)
            .expect("Failed to set string value");

        let value: String = map.get("message").expect("Failed to get string value");
        assert_eq!(value, test_string);
    }

    #[test]
    fn test_map_keys_iterator_order() {
        let mut map = Map::new();

        map.set("key1", &1i64).unwrap();
        map.set("key2", &2i64).unwrap();
        map.set("key3", &3i64).unwrap();

        // Serialization order is insertion order.
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["key1", "key2", "key3"]);
    }

    #[test]
    fn test_map_key_existence() {
        let mut map = Map::new();

        assert_eq!(map.key_count(), 0);

        map.set("test", &1i64).unwrap();
        assert_eq!(map.key_count(), 1);

        assert!(map.get::<i64>("test").is_ok());
        assert_eq!(map.get::<i64>("nonexistent"), Err(MapError::KeyNotFound));
    }

    #[test]
    fn test_map_clear() {
        let mut map = Map::new();

        map.set("key1", &1i64).unwrap();
        map.set("key2", &2i64).unwrap();
        assert_eq!(map.key_count(), 2);

        map.clear();
        assert_eq!(map.key_count(), 0);
    }

    #[test]
    fn test_append_type_mismatch() {
        let mut map = Map::new();

        map.set("values", &1i64).unwrap();
        map.append("values", &2i64).unwrap();
        map.append("values", &3i64).unwrap();
        assert_eq!(map.get_int_array("values").unwrap(), vec![1, 2, 3]);

        // Mixing types under one key is forbidden.
        assert_eq!(map.append("values", &1.5f64), Err(MapError::WrongValueType));

        // Replacing a key replaces the type.
        map.set("values", &1.5f64).unwrap();
        assert_eq!(map.value_type("values").unwrap(), ValueType::Float);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut map = Map::new();
        map.set("v", &7i64).unwrap();

        assert_eq!(map.get_int_at("v", 0), Ok(7));
        assert_eq!(map.get_int_at("v", 1), Err(MapError::IndexOutOfBounds));
    }

    #[test]
    fn test_delete_key() {
        let mut map = Map::new();
        map.set("a", &1i64).unwrap();
        map.set("b", &2i64).unwrap();

        map.delete_key("a").unwrap();
        assert_eq!(map.key_count(), 1);
        assert_eq!(map.delete_key("a"), Err(MapError::KeyNotFound));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_touch_creates_empty_entry() {
        let mut map = Map::new();
        map.touch("later", ValueType::Int).unwrap();

        assert_eq!(map.value_count("later").unwrap(), 0);
        assert_eq!(map.value_type("later").unwrap(), ValueType::Int);
        assert_eq!(map.get_int("later"), Err(MapError::IndexOutOfBounds));
    }

    #[test]
    fn test_invalid_keys() {
        let mut map = Map::new();
        assert!(map.set_int("", 1).is_err());
        assert!(map.set_int("has space", 1).is_err());
        assert!(map.set_int("1leading", 1).is_err());
        assert!(map.set_int("_DurationNum", 1).is_ok());
    }

    #[test]
    fn test_error_slot() {
        let mut map = Map::new();
        map.set("junk", &1i64).unwrap();
        map.set_error("Trim: invalid first frame specified (less than 0)");

        // Setting an error clears the rest of the map.
        assert_eq!(map.key_count(), 1);
        assert_eq!(
            map.error(),
            Some("Trim: invalid first frame specified (less than 0)")
        );
    }

    #[test]
    fn test_shallow_clone_shares_then_diverges() {
        let mut map = Map::new();
        map.set_int_array("v", vec![1, 2, 3]).unwrap();

        let copy = map.clone();
        map.append_int("v", 4).unwrap();

        assert_eq!(map.get_int_array("v").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(copy.get_int_array("v").unwrap(), vec![1, 2, 3]);
    }
}
