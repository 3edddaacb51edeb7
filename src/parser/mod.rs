//! Text → AST.
//!
//! A hand-written precedence-climbing parser over the lexer's token stream.
//! Operators lower to the internal `_op_` function names, macros expand at
//! parse time, and every independently localizable error is reported before
//! the parse gives up.

pub mod literals;
pub mod macros;

pub use self::macros::{MacroRegistry, ACCU_VAR, NOT_STRICTLY_FALSE};

use crate::ast::{Constant, Expr, ExprKind, MapEntry, ParsedAst, SourceInfo, StructField};
use crate::issues::Issues;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::source::Source;

use self::macros::{IdSource, MacroContext};

/// Keywords rejected as identifiers when `reserved_ids` is enabled.
const RESERVED_IDS: &[&str] = &[
    "as", "break", "const", "continue", "else", "for", "function", "if", "import", "in", "let",
    "loop", "package", "namespace", "return", "var", "void", "while",
];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParserOptions {
    /// Cap on grammar recursion (and therefore expression nesting).
    pub max_recursion_depth: usize,
    /// Enables `a.?b`, `a[?k]`, `[?x]`, `{?k: v}` and `Msg{?f: v}`.
    pub enable_optional_syntax: bool,
    /// Reject the reserved keyword set when used as identifiers.
    pub reserved_ids: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_recursion_depth: 250,
            enable_optional_syntax: false,
            reserved_ids: true,
        }
    }
}

/// Parse with default options and the standard macros.
pub fn parse(source: Source) -> Result<ParsedAst, Issues> {
    parse_with(source, &ParserOptions::default(), &MacroRegistry::standard())
}

pub fn parse_with(
    source: Source,
    options: &ParserOptions,
    macros: &MacroRegistry,
) -> Result<ParsedAst, Issues> {
    let mut issues = Issues::new(source.clone());

    let tokens = match Lexer::new(source.content()).lex() {
        Ok(tokens) => tokens,
        Err(error) => {
            issues.report(error.message, error.offset);
            return Err(issues);
        }
    };

    let mut parser = Parser {
        tokens,
        pos: 0,
        options,
        macros,
        ids: IdSource::new(),
        source_info: SourceInfo::new(source.clone()),
        issues,
        depth: 0,
        source_len: source.content().len(),
    };

    let expr = parser.parse_expr();
    if !parser.at_end() {
        let offset = parser.current_offset();
        let rendered = parser
            .peek_kind()
            .map(|kind| kind.to_string())
            .unwrap_or_default();
        parser
            .issues
            .report(format!("unexpected token '{rendered}'"), offset);
    }

    log::debug!(
        "parsed expression with {} node(s), {} issue(s)",
        expr.max_id(),
        parser.issues.items().len()
    );

    if parser.issues.is_empty() {
        Ok(ParsedAst {
            expr,
            source_info: parser.source_info,
        })
    } else {
        Err(parser.issues)
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    options: &'a ParserOptions,
    macros: &'a MacroRegistry,
    ids: IdSource,
    source_info: SourceInfo,
    issues: Issues,
    depth: usize,
    source_len: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    fn current_offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|token| token.span.start)
            .unwrap_or(self.source_len)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> bool {
        if self.eat(kind) {
            return true;
        }

        let offset = self.current_offset();
        let found = self
            .peek_kind()
            .map(|kind| format!("'{kind}'"))
            .unwrap_or_else(|| "end of input".to_string());
        self.issues
            .report(format!("expected '{kind}' {context}, found {found}"), offset);
        false
    }

    fn build(&mut self, offset: usize, kind: ExprKind) -> Expr {
        let id = self.ids.next_id();
        self.source_info.set_position(id, offset);
        Expr::new(id, kind)
    }

    /// Placeholder node emitted after a reported error.
    fn error_expr(&mut self, offset: usize) -> Expr {
        self.build(offset, ExprKind::Const(Constant::Null))
    }

    fn parse_expr(&mut self) -> Expr {
        self.depth += 1;
        if self.depth > self.options.max_recursion_depth {
            let offset = self.current_offset();
            self.issues
                .report("expression recursion limit exceeded", offset);
            self.depth -= 1;
            // Swallow the rest of the input so the error does not cascade.
            self.pos = self.tokens.len();
            return self.error_expr(offset);
        }

        let expr = self.parse_ternary();
        self.depth -= 1;
        expr
    }

    fn parse_ternary(&mut self) -> Expr {
        let condition = self.parse_or();

        if self.peek_kind() == Some(&TokenKind::Question) {
            let offset = self.current_offset();
            self.pos += 1;
            let truthy = self.parse_or();
            self.expect(&TokenKind::Colon, "in ternary expression");
            let falsy = self.parse_expr();
            return self.build(
                offset,
                ExprKind::Call {
                    function: "_?_:_".to_string(),
                    target: None,
                    args: vec![condition, truthy, falsy],
                },
            );
        }

        condition
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.peek_kind() == Some(&TokenKind::Or) {
            let offset = self.current_offset();
            self.pos += 1;
            let right = self.parse_and();
            left = self.build(
                offset,
                ExprKind::Call {
                    function: "_||_".to_string(),
                    target: None,
                    args: vec![left, right],
                },
            );
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_relation();
        while self.peek_kind() == Some(&TokenKind::And) {
            let offset = self.current_offset();
            self.pos += 1;
            let right = self.parse_relation();
            left = self.build(
                offset,
                ExprKind::Call {
                    function: "_&&_".to_string(),
                    target: None,
                    args: vec![left, right],
                },
            );
        }
        left
    }

    fn parse_relation(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            let function = match self.peek_kind() {
                Some(TokenKind::Less) => "_<_",
                Some(TokenKind::LessEq) => "_<=_",
                Some(TokenKind::Greater) => "_>_",
                Some(TokenKind::GreaterEq) => "_>=_",
                Some(TokenKind::EqEq) => "_==_",
                Some(TokenKind::NotEq) => "_!=_",
                Some(TokenKind::In) => "@in",
                _ => return left,
            };
            let offset = self.current_offset();
            self.pos += 1;
            let right = self.parse_additive();
            left = self.build(
                offset,
                ExprKind::Call {
                    function: function.to_string(),
                    target: None,
                    args: vec![left, right],
                },
            );
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let function = match self.peek_kind() {
                Some(TokenKind::Plus) => "_+_",
                Some(TokenKind::Minus) => "_-_",
                _ => return left,
            };
            let offset = self.current_offset();
            self.pos += 1;
            let right = self.parse_multiplicative();
            left = self.build(
                offset,
                ExprKind::Call {
                    function: function.to_string(),
                    target: None,
                    args: vec![left, right],
                },
            );
        }
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let function = match self.peek_kind() {
                Some(TokenKind::Star) => "_*_",
                Some(TokenKind::Slash) => "_/_",
                Some(TokenKind::Percent) => "_%_",
                _ => return left,
            };
            let offset = self.current_offset();
            self.pos += 1;
            let right = self.parse_unary();
            left = self.build(
                offset,
                ExprKind::Call {
                    function: function.to_string(),
                    target: None,
                    args: vec![left, right],
                },
            );
        }
    }

    fn parse_unary(&mut self) -> Expr {
        match self.peek_kind() {
            Some(TokenKind::Bang) => {
                let offset = self.current_offset();
                self.pos += 1;
                let operand = self.parse_unary();
                self.build(
                    offset,
                    ExprKind::Call {
                        function: "!_".to_string(),
                        target: None,
                        args: vec![operand],
                    },
                )
            }
            Some(TokenKind::Minus) => {
                let offset = self.current_offset();
                self.pos += 1;
                // Fold negation into numeric literals.
                match self.peek_kind() {
                    Some(TokenKind::Int(value)) => {
                        let value = *value;
                        self.pos += 1;
                        self.build(offset, ExprKind::Const(Constant::Int(-value)))
                    }
                    Some(TokenKind::Double(value)) => {
                        let value = *value;
                        self.pos += 1;
                        self.build(offset, ExprKind::Const(Constant::Double(-value)))
                    }
                    _ => {
                        let operand = self.parse_unary();
                        self.build(
                            offset,
                            ExprKind::Call {
                                function: "-_".to_string(),
                                target: None,
                                args: vec![operand],
                            },
                        )
                    }
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();

        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    let offset = self.current_offset();
                    self.pos += 1;

                    let optional = self.peek_kind() == Some(&TokenKind::Question);
                    if optional {
                        if !self.options.enable_optional_syntax {
                            self.issues
                                .report("optional syntax is not enabled: '.?'", offset);
                        }
                        self.pos += 1;
                    }

                    let Some(field) = self.eat_field_name() else {
                        let offset = self.current_offset();
                        self.issues.report("expected field name after '.'", offset);
                        return self.error_expr(offset);
                    };

                    if !optional && self.peek_kind() == Some(&TokenKind::LParen) {
                        expr = self.parse_call(offset, field, Some(expr));
                    } else if optional {
                        let field_const =
                            self.build(offset, ExprKind::Const(Constant::String(field)));
                        expr = self.build(
                            offset,
                            ExprKind::Call {
                                function: "optional_select".to_string(),
                                target: None,
                                args: vec![expr, field_const],
                            },
                        );
                    } else {
                        expr = self.build(
                            offset,
                            ExprKind::Select {
                                operand: Box::new(expr),
                                field,
                                test_only: false,
                            },
                        );
                    }
                }
                Some(TokenKind::LBracket) => {
                    let offset = self.current_offset();
                    self.pos += 1;

                    let optional = self.peek_kind() == Some(&TokenKind::Question);
                    if optional {
                        if !self.options.enable_optional_syntax {
                            self.issues
                                .report("optional syntax is not enabled: '[?'", offset);
                        }
                        self.pos += 1;
                    }

                    let index = self.parse_expr();
                    self.expect(&TokenKind::RBracket, "to close index expression");
                    let function = if optional { "optional_index" } else { "_[_]" };
                    expr = self.build(
                        offset,
                        ExprKind::Call {
                            function: function.to_string(),
                            target: None,
                            args: vec![expr, index],
                        },
                    );
                }
                Some(TokenKind::LBrace) => {
                    let Some(message_name) = qualified_name(&expr) else {
                        return expr;
                    };
                    let offset = self
                        .source_info
                        .position(expr.id)
                        .unwrap_or_else(|| self.current_offset());
                    self.pos += 1;
                    expr = self.parse_struct(offset, message_name);
                }
                _ => return expr,
            }
        }
    }

    fn eat_field_name(&mut self) -> Option<String> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        }
    }

    /// A call whose callee is `function`, with `target` set for the
    /// receiver-style form. Macro expansion happens here.
    fn parse_call(&mut self, offset: usize, function: String, target: Option<Expr>) -> Expr {
        self.expect(&TokenKind::LParen, "to open argument list");
        let mut args = vec![];
        if self.peek_kind() != Some(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "to close argument list");

        let is_receiver = target.is_some();
        if let Some(found) = self.macros.find(&function, args.len(), is_receiver) {
            let expander = found.expander;
            let record = Expr::new(
                self.ids.next_id(),
                ExprKind::Call {
                    function: function.clone(),
                    target: target.clone().map(Box::new),
                    args: args.clone(),
                },
            );

            let mut ctx = MacroContext {
                ids: &mut self.ids,
                source_info: &mut self.source_info,
                offset,
            };
            match expander(&mut ctx, target.clone(), args.clone()) {
                Ok(Some(expanded)) => {
                    self.source_info.set_macro_call(expanded.id, record);
                    return expanded;
                }
                Ok(None) => {}
                Err(message) => {
                    self.issues.report(message, offset);
                    return self.error_expr(offset);
                }
            }
        }

        self.build(
            offset,
            ExprKind::Call {
                function,
                target: target.map(Box::new),
                args,
            },
        )
    }

    fn parse_primary(&mut self) -> Expr {
        let offset = self.current_offset();

        match self.peek_kind().cloned() {
            Some(TokenKind::Int(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Int(value)))
            }
            Some(TokenKind::Uint(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Uint(value)))
            }
            Some(TokenKind::Double(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Double(value)))
            }
            Some(TokenKind::Str(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::String(value)))
            }
            Some(TokenKind::Bytes(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Bytes(value)))
            }
            Some(TokenKind::Bool(value)) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Bool(value)))
            }
            Some(TokenKind::Null) => {
                self.pos += 1;
                self.build(offset, ExprKind::Const(Constant::Null))
            }
            Some(TokenKind::Ident(name)) => {
                self.pos += 1;
                if self.options.reserved_ids && RESERVED_IDS.contains(&name.as_str()) {
                    self.issues
                        .report(format!("reserved identifier: {name}"), offset);
                    return self.error_expr(offset);
                }
                if self.peek_kind() == Some(&TokenKind::LParen) {
                    self.parse_call(offset, name, None)
                } else {
                    self.build(offset, ExprKind::Ident(name))
                }
            }
            Some(TokenKind::Dot) => {
                // Leading dot pins absolute name resolution.
                self.pos += 1;
                let Some(name) = self.eat_field_name() else {
                    self.issues
                        .report("expected identifier after leading '.'", offset);
                    return self.error_expr(offset);
                };
                let absolute = format!(".{name}");
                if self.peek_kind() == Some(&TokenKind::LParen) {
                    self.parse_call(offset, absolute, None)
                } else {
                    self.build(offset, ExprKind::Ident(absolute))
                }
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr();
                self.expect(&TokenKind::RParen, "to close parenthesized expression");
                expr
            }
            Some(TokenKind::LBracket) => {
                self.pos += 1;
                self.parse_list(offset)
            }
            Some(TokenKind::LBrace) => {
                self.pos += 1;
                self.parse_map(offset)
            }
            Some(other) => {
                self.pos += 1;
                self.issues
                    .report(format!("unexpected token '{other}'"), offset);
                self.error_expr(offset)
            }
            None => {
                self.issues.report("unexpected end of expression", offset);
                self.error_expr(offset)
            }
        }
    }

    fn parse_list(&mut self, offset: usize) -> Expr {
        let mut elements = vec![];
        let mut optional_indices = vec![];

        while self.peek_kind() != Some(&TokenKind::RBracket) && !self.at_end() {
            if self.peek_kind() == Some(&TokenKind::Question) {
                if !self.options.enable_optional_syntax {
                    let offset = self.current_offset();
                    self.issues
                        .report("optional syntax is not enabled: '[?'", offset);
                }
                self.pos += 1;
                optional_indices.push(elements.len());
            }
            elements.push(self.parse_expr());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "to close list literal");

        self.build(
            offset,
            ExprKind::List {
                elements,
                optional_indices,
            },
        )
    }

    fn parse_map(&mut self, offset: usize) -> Expr {
        let mut entries = vec![];

        while self.peek_kind() != Some(&TokenKind::RBrace) && !self.at_end() {
            let optional = self.peek_kind() == Some(&TokenKind::Question);
            if optional {
                if !self.options.enable_optional_syntax {
                    let offset = self.current_offset();
                    self.issues
                        .report("optional syntax is not enabled: '{?'", offset);
                }
                self.pos += 1;
            }

            let key = self.parse_expr();
            self.expect(&TokenKind::Colon, "between map key and value");
            let value = self.parse_expr();
            entries.push(MapEntry {
                key,
                value,
                optional,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close map literal");

        self.build(offset, ExprKind::Map { entries })
    }

    fn parse_struct(&mut self, offset: usize, message_name: String) -> Expr {
        let mut fields = vec![];

        while self.peek_kind() != Some(&TokenKind::RBrace) && !self.at_end() {
            let optional = self.peek_kind() == Some(&TokenKind::Question);
            if optional {
                if !self.options.enable_optional_syntax {
                    let offset = self.current_offset();
                    self.issues
                        .report("optional syntax is not enabled: '{?'", offset);
                }
                self.pos += 1;
            }

            let Some(name) = self.eat_field_name() else {
                let offset = self.current_offset();
                self.issues.report("expected field name", offset);
                break;
            };
            self.expect(&TokenKind::Colon, "between field name and value");
            let value = self.parse_expr();
            fields.push(StructField {
                name,
                value,
                optional,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close message construction");

        self.build(
            offset,
            ExprKind::Struct {
                message_name,
                fields,
            },
        )
    }
}

/// Render a pure select chain (`a.b.c`, possibly with a leading dot) back
/// into a qualified name; used for message construction.
fn qualified_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Select {
            operand,
            field,
            test_only: false,
        } => Some(format!("{}.{field}", qualified_name(operand)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> ParsedAst {
        parse(Source::from_text(input)).expect("parse should succeed")
    }

    fn parse_optional(input: &str) -> ParsedAst {
        let options = ParserOptions {
            enable_optional_syntax: true,
            ..Default::default()
        };
        parse_with(Source::from_text(input), &options, &MacroRegistry::standard())
            .expect("parse should succeed")
    }

    #[test]
    fn test_parse_string_constant() {
        let ast = parse_ok("\"Hello World\"");
        assert_eq!(
            ast.expr.kind,
            ExprKind::Const(Constant::String("Hello World".into()))
        );
    }

    #[test]
    fn test_operator_precedence() {
        let ast = parse_ok("1 + 2 * 3");
        let ExprKind::Call { function, args, .. } = &ast.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(function, "_+_");
        let ExprKind::Call { function, .. } = &args[1].kind else {
            panic!("expected nested call");
        };
        assert_eq!(function, "_*_");
    }

    #[test]
    fn test_ternary_shape() {
        let ast = parse_ok("a ? b : c");
        let ExprKind::Call { function, args, .. } = &ast.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(function, "_?_:_");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_in_operator() {
        let ast = parse_ok("x in [1, 2]");
        let ExprKind::Call { function, .. } = &ast.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(function, "@in");
    }

    #[test]
    fn test_select_and_index() {
        let ast = parse_ok("a.b[0]");
        let ExprKind::Call { function, args, .. } = &ast.expr.kind else {
            panic!("expected index call");
        };
        assert_eq!(function, "_[_]");
        let ExprKind::Select { field, .. } = &args[0].kind else {
            panic!("expected select");
        };
        assert_eq!(field, "b");
    }

    #[test]
    fn test_receiver_call() {
        let ast = parse_ok("name.startsWith('x')");
        let ExprKind::Call {
            function, target, ..
        } = &ast.expr.kind
        else {
            panic!("expected call");
        };
        assert_eq!(function, "startsWith");
        assert!(target.is_some());
    }

    #[test]
    fn test_negative_int_literal_folds() {
        let ast = parse_ok("-42");
        assert_eq!(ast.expr.kind, ExprKind::Const(Constant::Int(-42)));
    }

    #[test]
    fn test_has_macro_expands_to_test_only_select() {
        let ast = parse_ok("has(a.b)");
        let ExprKind::Select {
            field, test_only, ..
        } = &ast.expr.kind
        else {
            panic!("expected select, got {:?}", ast.expr.kind);
        };
        assert_eq!(field, "b");
        assert!(test_only);
        assert!(ast.source_info.macro_call(ast.expr.id).is_some());
    }

    #[test]
    fn test_all_macro_expands_to_comprehension() {
        let ast = parse_ok("[1, 2].all(x, x > 0)");
        let ExprKind::Comprehension(comprehension) = &ast.expr.kind else {
            panic!("expected comprehension, got {:?}", ast.expr.kind);
        };
        assert_eq!(comprehension.iter_var, "x");
        assert_eq!(comprehension.accu_var, ACCU_VAR);
        assert!(ast.source_info.macro_call(ast.expr.id).is_some());
    }

    #[test]
    fn test_cel_bind_macro() {
        let ast = parse_ok("cel.bind(v, 1 + 2, v * v)");
        let ExprKind::Comprehension(comprehension) = &ast.expr.kind else {
            panic!("expected comprehension");
        };
        assert_eq!(comprehension.accu_var, "v");
        let ExprKind::List { elements, .. } = &comprehension.iter_range.kind else {
            panic!("expected empty list range");
        };
        assert!(elements.is_empty());
    }

    #[test]
    fn test_message_construction() {
        let ast = parse_ok("google.rpc.Status{code: 0}");
        let ExprKind::Struct {
            message_name,
            fields,
        } = &ast.expr.kind
        else {
            panic!("expected struct");
        };
        assert_eq!(message_name, "google.rpc.Status");
        assert_eq!(fields[0].name, "code");
    }

    #[test]
    fn test_reserved_identifier_rejected() {
        let issues = parse(Source::from_text("while")).unwrap_err();
        assert!(issues.to_string().contains("reserved identifier: while"));
    }

    #[test]
    fn test_map_literal() {
        let ast = parse_ok("{'a': 1, 'b': 2}");
        let ExprKind::Map { entries } = &ast.expr.kind else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_optional_syntax_lowering() {
        let ast = parse_optional("a.?b");
        let ExprKind::Call { function, .. } = &ast.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(function, "optional_select");

        let ast = parse_optional("a[?'k']");
        let ExprKind::Call { function, .. } = &ast.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(function, "optional_index");

        let ast = parse_optional("[?x, y]");
        let ExprKind::List {
            optional_indices, ..
        } = &ast.expr.kind
        else {
            panic!("expected list");
        };
        assert_eq!(optional_indices, &vec![0]);
    }

    #[test]
    fn test_optional_syntax_requires_flag() {
        assert!(parse(Source::from_text("a.?b")).is_err());
    }

    #[test]
    fn test_multiple_errors_reported() {
        let issues = parse(Source::from_text("(1 + ) + (2 * )")).unwrap_err();
        assert!(issues.items().len() >= 2);
    }

    #[test]
    fn test_deep_nesting_is_capped() {
        let input = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let issues = parse(Source::from_text(&input)).unwrap_err();
        assert!(issues
            .to_string()
            .contains("expression recursion limit exceeded"));
    }

    #[test]
    fn test_leading_dot_identifier() {
        let ast = parse_ok(".pkg.Name");
        let ExprKind::Select { operand, field, .. } = &ast.expr.kind else {
            panic!("expected select");
        };
        assert_eq!(field, "Name");
        assert_eq!(operand.kind, ExprKind::Ident(".pkg".into()));
    }
}
