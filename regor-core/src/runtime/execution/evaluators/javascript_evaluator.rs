use fancy_regex::Regex;
use regor_common::prelude::*;

use super::{Evaluator, RhaiEvaluator};

/// Evaluates the JavaScript expression subset used by workflow definitions.
///
/// The expression is rewritten into Rhai and run by the Rhai engine: `$` is the task input,
/// strings may use either quote, `===`/`!==` compare by value, `null`/`undefined` are unit,
/// `.length` is `len()` and `cond ? a : b` becomes an `if` expression. Anything else has to be
/// valid Rhai already, e.g. truthiness of non-bool conditions is not emulated.
pub struct JavascriptEvaluator {
    delegate: Arc<RhaiEvaluator>,
}

impl JavascriptEvaluator {
    pub const NAME: &'static str = "javascript";
    pub const GRAALJS_NAME: &'static str = "graaljs";

    pub fn new(delegate: Arc<RhaiEvaluator>) -> Self {
        Self { delegate }
    }

    pub fn normalize(expression: &str) -> RegorResult<String> {
        lazy_static! {
            static ref DOLLAR: Regex = Regex::new(r"(?<![\w$])\$(?![\w$])").expect("regex compile error");
            static ref LENGTH: Regex = Regex::new(r"\.length\b").expect("regex compile error");
            static ref NULL: Regex = Regex::new(r"\b(?:null|undefined)\b").expect("regex compile error");
            static ref VAR: Regex = Regex::new(r"\bvar\b").expect("regex compile error");
            static ref BLOCK_SEMI: Regex = Regex::new(r";(\s*)\}").expect("regex compile error");
        }

        let mut normalized = String::with_capacity(expression.len() + 16);
        for (is_literal, part) in Self::split_literals(expression)? {
            if is_literal {
                normalized.push_str(&part);
                continue;
            }
            let code = part.replace("===", "==").replace("!==", "!=");
            let code = DOLLAR.replace_all(&code, "input");
            let code = LENGTH.replace_all(&code, ".len()");
            let code = NULL.replace_all(&code, "()");
            let code = VAR.replace_all(&code, "let");
            let code = BLOCK_SEMI.replace_all(&code, "$1}");
            normalized.push_str(&code);
        }

        let trimmed = normalized.trim_end().trim_end_matches(';');
        Ok(rewrite_ternary(trimmed.trim()))
    }

    /// Splits into code and string literals, re-quoting every literal with double quotes.
    fn split_literals(expression: &str) -> RegorResult<Vec<(bool, String)>> {
        let mut parts = Vec::new();
        let mut code = String::new();
        let mut chars = expression.chars();
        while let Some(c) = chars.next() {
            if c != '\'' && c != '"' {
                code.push(c);
                continue;
            }
            if !code.is_empty() {
                parts.push((false, std::mem::take(&mut code)));
            }

            let mut literal = String::from('"');
            let mut closed = false;
            while let Some(n) = chars.next() {
                match n {
                    '\\' => match chars.next() {
                        Some('\'') => literal.push('\''),
                        Some(e) => {
                            literal.push('\\');
                            literal.push(e);
                        }
                        None => break,
                    },
                    n if n == c => {
                        closed = true;
                        break;
                    }
                    '"' => literal.push_str("\\\""),
                    n => literal.push(n),
                }
            }
            if !closed {
                return fmt_err!(
                    ScriptEvalFailed,
                    "Unterminated string literal in expression: {}",
                    expression
                );
            }
            literal.push('"');
            parts.push((true, literal));
        }
        if !code.is_empty() {
            parts.push((false, code));
        }
        Ok(parts)
    }
}

impl Evaluator for JavascriptEvaluator {
    fn evaluate(&self, expression: &str, input: &Object) -> RegorResult<Object> {
        debug!("Javascript evaluator -- expression: {}", expression);
        let script = Self::normalize(expression)?;
        trace!("Javascript evaluator -- rewritten as: {}", script);
        self.delegate.evaluate(&script, input)
    }
}

/// Positions of the characters outside string literals and nested brackets. The brackets
/// opening and closing a top level group are included.
fn top_level(chars: &[char]) -> Vec<usize> {
    let mut result = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                i += 1;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '(' | '[' | '{' => {
                    if depth == 0 {
                        result.push(i);
                    }
                    depth += 1;
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        result.push(i);
                    }
                }
                _ if depth == 0 => result.push(i),
                _ => {}
            }
        }
        i += 1;
    }
    result
}

fn is_ternary_mark(chars: &[char], i: usize) -> bool {
    chars[i] == '?'
        && !matches!(chars.get(i + 1), Some('.') | Some('?'))
        && !(i > 0 && chars[i - 1] == '?')
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn rewrite_ternary(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let top = top_level(&chars);

    if let Some(&semi) = top.iter().find(|&&i| chars[i] == ';') {
        return format!(
            "{};{}",
            rewrite_ternary(&collect(&chars[..semi])),
            rewrite_ternary(&collect(&chars[semi + 1..]))
        );
    }

    if let Some(pos) = top.iter().position(|&i| is_ternary_mark(&chars, i)) {
        let question = top[pos];
        let mut nested = 0;
        let mut colon = None;
        for &i in &top[pos + 1..] {
            if is_ternary_mark(&chars, i) {
                nested += 1;
            } else if chars[i] == ':' {
                if nested == 0 {
                    colon = Some(i);
                    break;
                }
                nested -= 1;
            }
        }
        if let Some(colon) = colon {
            let condition = collect(&chars[..question]);
            let (prefix, condition) = match condition.trim_start().strip_prefix("return ") {
                Some(rest) => ("return ", rest.to_string()),
                None => ("", condition),
            };
            return format!(
                "{}if {} {{ {} }} else {{ {} }}",
                prefix,
                rewrite_ternary(condition.trim()),
                rewrite_ternary(collect(&chars[question + 1..colon]).trim()),
                rewrite_ternary(collect(&chars[colon + 1..]).trim())
            );
        }
    }

    let mut out = String::with_capacity(expr.len());
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], '(' | '[' | '{') && top.contains(&i) {
            let close = top
                .iter()
                .find(|&&j| j > i)
                .copied()
                .unwrap_or(chars.len());
            out.push(chars[i]);
            out.push_str(&rewrite_ternary(&collect(&chars[i + 1..close])));
            if close < chars.len() {
                out.push(chars[close]);
            }
            i = close + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use regor_common::prelude::*;

    use super::JavascriptEvaluator;
    use crate::runtime::execution::evaluators::{Evaluator, RhaiEvaluator};

    #[test]
    fn rewrites_javascript_into_rhai() {
        assert_eq!(
            JavascriptEvaluator::normalize("$.value > 1 ? 'big' : 'small';").unwrap(),
            r#"if input.value > 1 { "big" } else { "small" }"#
        );
        assert_eq!(
            JavascriptEvaluator::normalize("$.a === 'it\\'s' && $.list.length !== 0").unwrap(),
            r#"input.a == "it's" && input.list.len() != 0"#
        );
        assert!(JavascriptEvaluator::normalize("$.a == 'open").is_err());
    }

    #[test]
    fn evaluates_expressions() {
        let evaluator = JavascriptEvaluator::new(Arc::new(RhaiEvaluator::new()));
        let input: Object = object_map! {
            "value" => 5,
            "list" => vec![Object::from(1), Object::from(2)],
            "kind" => "b",
        }
        .into();

        assert_eq!(
            evaluator
                .evaluate("$.kind == 'a' ? 1 : $.kind == 'b' ? 2 : 3", &input)
                .unwrap(),
            Object::Int(2)
        );
        assert_eq!(
            evaluator.evaluate("$.list.length == 2", &input).unwrap(),
            Object::Boolean(true)
        );
        assert_eq!(
            evaluator.evaluate("$.missing == null", &input).unwrap(),
            Object::Boolean(true)
        );
        assert!(evaluator.evaluate("$.value >", &input).is_err());
    }
}
