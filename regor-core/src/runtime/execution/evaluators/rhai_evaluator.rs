use dashmap::DashMap;
use regor_common::prelude::*;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};

use super::Evaluator;

/// Evaluates a Rhai script.
///
/// The input map is bound to the constant `input`, and each of its keys that is a valid
/// identifier is bound on its own as well. Compiled scripts are cached by the md5 of their text.
pub struct RhaiEvaluator {
    engine: Engine,
    cache: DashMap<InlineStr, Arc<AST>>,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEvaluator {
    pub const NAME: &'static str = "rhai";
    pub const INPUT_VARIABLE: &'static str = "input";
    const MAX_OPERATIONS: u64 = 100_000;

    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(Self::MAX_OPERATIONS);
        Self {
            engine,
            cache: DashMap::new(),
        }
    }

    fn compile(&self, expression: &str) -> RegorResult<Arc<AST>> {
        let key: InlineStr = format!("{:x}", md5::compute(expression)).into();
        if let Some(ast) = self.cache.get(&key) {
            return Ok(ast.clone());
        }
        let ast = self.engine.compile(expression).map_err(|e| {
            ErrorCode::ScriptEvalFailed(format!(
                "Error while compiling script: {}, error: {}",
                expression, e
            ))
        })?;
        let ast = Arc::new(ast);
        self.cache.insert(key, ast.clone());
        Ok(ast)
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn to_dynamic(value: &Object) -> Dynamic {
        match value {
            Object::Int(v) => Dynamic::from(*v as i64),
            Object::Long(v) => Dynamic::from(*v),
            Object::Double(v) => Dynamic::from(*v),
            Object::Boolean(v) => Dynamic::from(*v),
            Object::String(v) => Dynamic::from(v.to_string()),
            Object::List(v) => Dynamic::from(v.iter().map(Self::to_dynamic).collect::<Array>()),
            Object::Map(v) => {
                let mut map = Map::new();
                for (k, v) in v {
                    map.insert(k.as_str().into(), Self::to_dynamic(v));
                }
                Dynamic::from(map)
            }
            Object::Null => Dynamic::UNIT,
        }
    }

    pub fn from_dynamic(value: Dynamic) -> Object {
        if value.is_unit() {
            Object::Null
        } else if let Ok(v) = value.as_bool() {
            Object::Boolean(v)
        } else if let Ok(v) = value.as_int() {
            if v <= i32::MAX as i64 && v >= i32::MIN as i64 {
                Object::Int(v as i32)
            } else {
                Object::Long(v)
            }
        } else if let Ok(v) = value.as_float() {
            Object::Double(v)
        } else if let Ok(v) = value.as_char() {
            Object::String(v.to_string().into())
        } else if value.is::<Array>() {
            value
                .try_cast::<Array>()
                .map(|v| Object::List(v.into_iter().map(Self::from_dynamic).collect()))
                .unwrap_or_default()
        } else if value.is::<Map>() {
            value
                .try_cast::<Map>()
                .map(|v| {
                    Object::Map(
                        v.into_iter()
                            .map(|(k, v)| (k.as_str().into(), Self::from_dynamic(v)))
                            .collect(),
                    )
                })
                .unwrap_or_default()
        } else {
            match value.into_string() {
                Ok(v) => Object::String(v.into()),
                Err(type_name) => Object::String(type_name.into()),
            }
        }
    }
}

impl Evaluator for RhaiEvaluator {
    fn evaluate(&self, expression: &str, input: &Object) -> RegorResult<Object> {
        debug!("Rhai evaluator -- expression: {}", expression);

        let ast = self.compile(expression)?;
        let mut scope = Scope::new();
        if let Object::Map(map) = input {
            for (k, v) in map {
                if Self::is_identifier(k) && k.as_str() != Self::INPUT_VARIABLE {
                    scope.push_constant_dynamic(k.as_str(), Self::to_dynamic(v));
                }
            }
        }
        scope.push_constant_dynamic(Self::INPUT_VARIABLE, Self::to_dynamic(input));

        match self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast) {
            Ok(result) => {
                let result = Self::from_dynamic(result);
                debug!("Rhai evaluator -- result: {:?}", result);
                Ok(result)
            }
            Err(e) => {
                error!(
                    "Error while evaluating script: {}, error: {:?}",
                    expression, e
                );
                fmt_err!(ScriptEvalFailed, "{}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;

    use super::RhaiEvaluator;
    use crate::runtime::execution::evaluators::Evaluator;

    #[test]
    fn evaluates_against_input() {
        let evaluator = RhaiEvaluator::new();
        let input: Object = object_map! {
            "carrier" => "fedex",
            "loop" => object_map! { "iteration" => 2 },
        }
        .into();

        assert_eq!(
            evaluator
                .evaluate(r#"if carrier == "fedex" { "air" } else { "ground" }"#, &input)
                .unwrap(),
            Object::from("air")
        );
        assert_eq!(
            evaluator
                .evaluate(r#"input["loop"]["iteration"] < 3"#, &input)
                .unwrap(),
            Object::Boolean(true)
        );
        let err = evaluator.evaluate("if {", &input).unwrap_err();
        assert_eq!(err.code(), ErrorCode::script_eval_failed_code());
        assert!(!err.is_transient());
    }
}
