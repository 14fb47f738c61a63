#[macro_export]
macro_rules! str_err {
    ($obj:ident, $str:expr) => {{
        Err(ErrorCode::$obj($str.to_string()))
    }};
}

#[macro_export]
macro_rules! fmt_err {
    ($obj:ident, $($arg:tt)*) => {{
        Err(ErrorCode::$obj(format!($($arg)*)))
    }}
}

/// Build an `Object::Map` from `key => value` pairs.
#[macro_export]
macro_rules! object_map {
    () => {{
        std::collections::HashMap::<$crate::prelude::InlineStr, $crate::prelude::Object>::new()
    }};
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::<$crate::prelude::InlineStr, $crate::prelude::Object>::new();
        $( map.insert($key.into(), $value.into()); )+
        map
    }};
}
