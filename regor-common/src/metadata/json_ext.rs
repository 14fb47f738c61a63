use crate::prelude::*;

/// Field accessors shared by the `TryFrom<&serde_json::Value>` parsers of the metadata types.
///
/// An absent key and an explicit `null` are treated alike: the default is used. A present value
/// of the wrong json type is an `IllegalArgument` error naming the key.
pub(crate) trait JsonExt {
    fn field(&self, key: &str) -> Option<&serde_json::Value>;

    fn required_str(&self, key: &str) -> RegorResult<InlineStr> {
        self.field(key)
            .and_then(|x| x.as_str())
            .map(|x| x.trim().into())
            .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} not found", key)))
    }

    fn str_or(&self, key: &str, default: &str) -> RegorResult<InlineStr> {
        match self.field(key) {
            None => Ok(default.into()),
            Some(x) => x
                .as_str()
                .map(|x| x.trim().into())
                .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key))),
        }
    }

    fn i32_or(&self, key: &str, default: i32) -> RegorResult<i32> {
        match self.field(key) {
            None => Ok(default),
            Some(x) => x
                .as_i64()
                .map(|x| x as i32)
                .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key))),
        }
    }

    fn optional_i32(&self, key: &str) -> RegorResult<Option<i32>> {
        match self.field(key) {
            None => Ok(None),
            Some(x) => x
                .as_i64()
                .map(|x| Some(x as i32))
                .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key))),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> RegorResult<bool> {
        match self.field(key) {
            None => Ok(default),
            Some(x) => x
                .as_bool()
                .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key))),
        }
    }

    fn object_map(&self, key: &str) -> RegorResult<HashMap<InlineStr, Object>> {
        match self.field(key) {
            None => Ok(HashMap::default()),
            Some(x) => x
                .as_object()
                .map(Object::convert_jsonmap_to_hashmap)
                .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key))),
        }
    }

    fn str_list(&self, key: &str) -> RegorResult<Vec<InlineStr>> {
        match self.field(key) {
            None => Ok(Vec::default()),
            Some(x) => {
                let list = x
                    .as_array()
                    .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key)))?;
                let mut result = Vec::with_capacity(list.len());
                for item in list {
                    match item.as_str() {
                        Some(v) => result.push(v.trim().into()),
                        None => return fmt_err!(IllegalArgument, "{} invalid, not a string", key),
                    }
                }
                Ok(result)
            }
        }
    }

    fn str_map(&self, key: &str) -> RegorResult<HashMap<InlineStr, InlineStr>> {
        match self.field(key) {
            None => Ok(HashMap::default()),
            Some(x) => {
                let map = x
                    .as_object()
                    .ok_or_else(|| ErrorCode::IllegalArgument(format!("{} invalid", key)))?;
                let mut result = HashMap::with_capacity(map.len());
                for (k, v) in map {
                    match v.as_str() {
                        Some(v) => {
                            result.insert(k.into(), v.into());
                        }
                        None => {
                            return fmt_err!(
                                IllegalArgument,
                                "{} invalid, key/value must be string",
                                key
                            )
                        }
                    }
                }
                Ok(result)
            }
        }
    }
}

impl JsonExt for serde_json::Value {
    fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.get(key).filter(|x| !x.is_null())
    }
}
