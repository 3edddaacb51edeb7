//! Post-check validators: each consumes a typed AST and reports issues
//! without mutating it.

use crate::ast::{Constant, Expr, ExprKind};
use crate::checker::CheckedAst;
use crate::issues::Issues;
use crate::types::CelType;
use crate::values::time;

pub trait AstValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues);
}

/// The required validator set.
pub fn standard_validators() -> Vec<Box<dyn AstValidator>> {
    vec![
        Box::new(TimestampLiteralValidator),
        Box::new(DurationLiteralValidator),
        Box::new(RegexLiteralValidator),
        Box::new(HomogeneousLiteralValidator),
        Box::new(AstDepthLimitValidator::default()),
    ]
}

pub fn validate(ast: &CheckedAst, validators: &[Box<dyn AstValidator>]) -> Issues {
    let mut issues = Issues::new(ast.source_info.source().clone());
    for validator in validators {
        validator.validate(ast, &mut issues);
    }
    issues
}

fn walk<'a>(expr: &'a Expr, visit: &mut dyn FnMut(&'a Expr)) {
    visit(expr);
    for child in expr.children() {
        walk(child, visit);
    }
}

/// A call's single string-literal argument, if that is what it has.
fn literal_argument<'a>(expr: &'a Expr, function: &str) -> Option<(&'a Expr, &'a str)> {
    let ExprKind::Call {
        function: name,
        target: None,
        args,
    } = &expr.kind
    else {
        return None;
    };
    if name != function || args.len() != 1 {
        return None;
    }
    match &args[0].kind {
        ExprKind::Const(Constant::String(text)) => Some((&args[0], text)),
        _ => None,
    }
}

pub struct TimestampLiteralValidator;

impl AstValidator for TimestampLiteralValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues) {
        walk(&ast.expr, &mut |expr| {
            let Some((arg, text)) = literal_argument(expr, "timestamp") else {
                return;
            };
            if let Err(error) = time::parse_timestamp(text) {
                let offset = ast.source_info.position(arg.id).unwrap_or(0);
                issues.report(
                    format!("timestamp validation failed. Reason: {}", error.message),
                    offset,
                );
            }
        });
    }
}

pub struct DurationLiteralValidator;

impl AstValidator for DurationLiteralValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues) {
        walk(&ast.expr, &mut |expr| {
            let Some((arg, text)) = literal_argument(expr, "duration") else {
                return;
            };
            if let Err(error) = time::parse_duration(text) {
                let offset = ast.source_info.position(arg.id).unwrap_or(0);
                issues.report(
                    format!("duration validation failed. Reason: {}", error.message),
                    offset,
                );
            }
        });
    }
}

/// The pattern argument to `matches` (and `regex.*` helpers) must compile.
pub struct RegexLiteralValidator;

impl AstValidator for RegexLiteralValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues) {
        walk(&ast.expr, &mut |expr| {
            let ExprKind::Call { function, args, .. } = &expr.kind else {
                return;
            };
            let pattern_arg = match function.as_str() {
                "matches" => args.last(),
                "regex.replace" | "regex.extract" | "regex.extractAll" | "regex.captureAll"
                | "regex.captureAllNamed" => args.get(1),
                _ => return,
            };
            let Some(pattern_arg) = pattern_arg else {
                return;
            };
            let ExprKind::Const(Constant::String(pattern)) = &pattern_arg.kind else {
                return;
            };
            if let Err(error) = crate::stdlib::strings::compile_regex(pattern) {
                let offset = ast.source_info.position(pattern_arg.id).unwrap_or(0);
                issues.report(
                    format!("regex validation failed. Reason: {error}"),
                    offset,
                );
            }
        });
    }
}

/// List and map literals must hold entries of a single type.
pub struct HomogeneousLiteralValidator;

impl AstValidator for HomogeneousLiteralValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues) {
        walk(&ast.expr, &mut |expr| match &expr.kind {
            ExprKind::List {
                elements,
                optional_indices,
            } => {
                let types = elements
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !optional_indices.contains(index))
                    .filter_map(|(_, element)| ast.type_map.get(&element.id))
                    .collect::<Vec<_>>();
                self.check_same(ast, issues, expr, &types);
            }
            ExprKind::Map { entries } => {
                let keys = entries
                    .iter()
                    .filter_map(|entry| ast.type_map.get(&entry.key.id))
                    .collect::<Vec<_>>();
                self.check_same(ast, issues, expr, &keys);
                let values = entries
                    .iter()
                    .filter(|entry| !entry.optional)
                    .filter_map(|entry| ast.type_map.get(&entry.value.id))
                    .collect::<Vec<_>>();
                self.check_same(ast, issues, expr, &values);
            }
            _ => {}
        });
    }
}

impl HomogeneousLiteralValidator {
    fn check_same(
        &self,
        ast: &CheckedAst,
        issues: &mut Issues,
        expr: &Expr,
        types: &[&CelType],
    ) {
        let Some(first) = types.first() else {
            return;
        };
        if let Some(offender) = types.iter().find(|t| t != &first) {
            let offset = ast.source_info.position(expr.id).unwrap_or(0);
            issues.report(
                format!("expected type '{first}' but found '{offender}'"),
                offset,
            );
        }
    }
}

pub struct AstDepthLimitValidator {
    pub limit: usize,
}

impl Default for AstDepthLimitValidator {
    fn default() -> Self {
        AstDepthLimitValidator { limit: 100 }
    }
}

impl AstValidator for AstDepthLimitValidator {
    fn validate(&self, ast: &CheckedAst, issues: &mut Issues) {
        let depth = ast.expr.depth();
        if depth > self.limit {
            let offset = ast.source_info.position(ast.expr.id).unwrap_or(0);
            issues.report(
                format!(
                    "expression depth {depth} exceeds the configured limit {}",
                    self.limit
                ),
                offset,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{check, Env};
    use crate::parser::parse;
    use crate::source::Source;

    fn validated(input: &str) -> Issues {
        let env = Env::standard();
        let checked = check(parse(Source::from_text(input)).unwrap(), &env).unwrap();
        validate(&checked, &standard_validators())
    }

    #[test]
    fn test_timestamp_literal() {
        let issues = validated("timestamp('bad')");
        assert_eq!(
            issues.to_string(),
            "ERROR: <input>:1:11: timestamp validation failed. Reason: \
             Failed to parse timestamp: invalid timestamp \"bad\"\n \
             | timestamp('bad')\n \
             | ..........^"
        );

        assert!(validated("timestamp('2023-01-01T00:00:00Z')").is_empty());
    }

    #[test]
    fn test_duration_literal() {
        let issues = validated("duration('1x')");
        assert!(issues
            .to_string()
            .contains("duration validation failed. Reason:"));
        assert!(validated("duration('1h5m')").is_empty());
    }

    #[test]
    fn test_regex_literal() {
        let issues = validated("'abc'.matches('(')");
        assert!(issues.to_string().contains("regex validation failed"));
        assert!(validated("'abc'.matches('a+')").is_empty());
    }

    #[test]
    fn test_homogeneous_literals() {
        assert!(!validated("[1, 'two']").is_empty());
        assert!(validated("[1, 2, 3]").is_empty());
        assert!(!validated("{'a': 1, 'b': 'x'}").is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "[".repeat(120), "]".repeat(120));
        let issues = validated(&deep);
        assert!(issues.to_string().contains("exceeds the configured limit"));
    }
}
