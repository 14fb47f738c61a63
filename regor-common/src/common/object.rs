use std::collections::HashMap;

use either::Either;
use numtoa::NumToA;

use crate::prelude::{debug, fmt_err, ErrorCode, InlineStr, RegorResult};

/// A dynamically typed value flowing through task inputs, outputs and workflow variables.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(InlineStr),
    Map(HashMap<InlineStr, Object>),
    List(Vec<Object>),
    Null,
}

impl Default for Object {
    fn default() -> Self {
        Object::Null
    }
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Select `path` (a dotted json path without the leading `$.`) from the document.
    ///
    /// The document is converted to json lazily on the first read and cached in place, so
    /// reading many paths from the same map only pays for one conversion.
    pub fn read(
        document_context: &mut Either<HashMap<InlineStr, Object>, serde_json::Value>,
        path: &str,
    ) -> Object {
        if let Either::Left(map) = document_context {
            let json = Self::convert_hashmap_to_json(map);
            *document_context = Either::Right(json);
        }
        let value = match document_context {
            Either::Right(value) => value,
            Either::Left(_) => return Object::Null,
        };

        debug!("json for select is: {}, path: {}", value, path);
        match jsonpath_lib::select(value, format!("$.{}", path).as_str()) {
            Ok(json) => json.first().map(|v| Self::from_json(v)).unwrap_or_default(),
            Err(_) => Object::Null,
        }
    }

    pub fn as_bool(&self) -> RegorResult<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            Self::String(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Self::String(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            _ => fmt_err!(IllegalArgument, "not a bool {:?}", self),
        }
    }

    pub fn as_string(&self) -> RegorResult<&InlineStr> {
        match self {
            Self::String(v) => Ok(v),
            _ => fmt_err!(IllegalArgument, "not a string {:?}", self),
        }
    }

    pub fn as_i64(&self) -> RegorResult<i64> {
        match self {
            Self::Int(v) => Ok(*v as i64),
            Self::Long(v) => Ok(*v),
            Self::Double(v) if v.fract() == 0.0 => Ok(*v as i64),
            Self::String(v) => v.trim().parse::<i64>().map_err(|e| e.into()),
            _ => fmt_err!(IllegalArgument, "not an integer {:?}", self),
        }
    }

    pub fn as_f64(&self) -> RegorResult<f64> {
        match self {
            Self::Int(v) => Ok(*v as f64),
            Self::Long(v) => Ok(*v as f64),
            Self::Double(v) => Ok(*v),
            Self::String(v) => v.trim().parse::<f64>().map_err(|e| e.into()),
            _ => fmt_err!(IllegalArgument, "not a number {:?}", self),
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<InlineStr, Object>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Object>> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_string(&self) -> InlineStr {
        match self {
            Object::Int(v) => (*v).numtoa_str(10, &mut [0; 16]).into(),
            Object::Long(v) => (*v).numtoa_str(10, &mut [0; 32]).into(),
            Object::Double(v) => v.to_string().into(),
            Object::Boolean(v) => {
                if *v {
                    "true".into()
                } else {
                    "false".into()
                }
            }
            Object::String(v) => v.clone(),
            Object::Map(v) => Self::convert_hashmap_to_json(v).to_string().into(),
            Object::List(v) => Self::convert_list_to_json(v).to_string().into(),
            Object::Null => "null".into(),
        }
    }

    /// Serialized json size in bytes, used against payload size thresholds.
    pub fn json_size(map: &HashMap<InlineStr, Object>) -> usize {
        Self::convert_hashmap_to_json(map).to_string().len()
    }
}

/// json <-> object
impl Object {
    pub fn convert_hashmap_to_json(hash_map: &HashMap<InlineStr, Object>) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(hash_map.len());
        for (k, v) in hash_map {
            map.insert(k.to_string(), v.to_json());
        }
        serde_json::Value::Object(map)
    }

    fn convert_list_to_json(list: &[Object]) -> serde_json::Value {
        serde_json::Value::Array(list.iter().map(|v| v.to_json()).collect())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Object::Int(v) => serde_json::Value::Number((*v).into()),
            Object::Long(v) => serde_json::Value::Number((*v).into()),
            Object::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Object::Boolean(v) => serde_json::Value::Bool(*v),
            Object::String(v) => serde_json::Value::String(v.to_string()),
            Object::Map(v) => Self::convert_hashmap_to_json(v),
            Object::List(v) => Self::convert_list_to_json(v),
            Object::Null => serde_json::Value::Null,
        }
    }

    pub fn convert_jsonmap_to_hashmap(
        jsonmap: &serde_json::Map<String, serde_json::Value>,
    ) -> HashMap<InlineStr, Object> {
        let mut map = HashMap::with_capacity(jsonmap.len());
        for (k, v) in jsonmap {
            map.insert(k.into(), Self::from_json(v));
        }
        map
    }

    pub fn from_json(json: &serde_json::Value) -> Object {
        match json {
            serde_json::Value::Bool(v) => (*v).into(),
            serde_json::Value::Number(v) => {
                if let Some(v) = v.as_i64() {
                    if v <= i32::MAX as i64 && v >= i32::MIN as i64 {
                        Object::Int(v as i32)
                    } else {
                        Object::Long(v)
                    }
                } else {
                    Object::Double(v.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(v) => v.into(),
            serde_json::Value::Object(v) => Object::Map(Self::convert_jsonmap_to_hashmap(v)),
            serde_json::Value::Array(v) => {
                Object::List(v.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Null => Object::Null,
        }
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Int(value)
    }
}
impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Long(value)
    }
}
impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Double(value)
    }
}
impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}
impl From<InlineStr> for Object {
    fn from(value: InlineStr) -> Self {
        Object::String(value)
    }
}
impl From<&InlineStr> for Object {
    fn from(value: &InlineStr) -> Self {
        Object::String(value.clone())
    }
}
impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::String(InlineStr::from(value))
    }
}
impl From<&String> for Object {
    fn from(value: &String) -> Self {
        Object::String(InlineStr::from(value))
    }
}
impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::String(InlineStr::from(value))
    }
}
impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::List(value)
    }
}
impl From<HashMap<InlineStr, Object>> for Object {
    fn from(value: HashMap<InlineStr, Object>) -> Self {
        Object::Map(value)
    }
}
impl serde::Serialize for Object {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&serde_json::Value> for Object {
    fn from(value: &serde_json::Value) -> Self {
        Object::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_nested_path() {
        let json = serde_json::json!({"a": {"b": [1, 2.5, "x"]}, "flag": true});
        let mut doc = Either::Left(Object::convert_jsonmap_to_hashmap(
            json.as_object().unwrap(),
        ));
        assert_eq!(Object::read(&mut doc, "a.b[1]"), Object::Double(2.5));
        assert_eq!(Object::read(&mut doc, "flag"), Object::Boolean(true));
        assert_eq!(Object::read(&mut doc, "missing"), Object::Null);
        assert!(doc.is_right());
    }

    #[test]
    fn number_widening() {
        let big = serde_json::json!(5_000_000_000i64);
        assert_eq!(Object::from_json(&big), Object::Long(5_000_000_000));
        assert_eq!(Object::from_json(&serde_json::json!(7)), Object::Int(7));
        assert_eq!(Object::Int(3).as_i64().unwrap(), 3);
        assert_eq!(Object::from("12").as_i64().unwrap(), 12);
        assert_eq!(Object::Boolean(false).to_string(), "false");
    }
}
