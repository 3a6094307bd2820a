//! Recursive descent parser.
//!
//! Precedence, low to high: logical (`&&` `||`), comparison, additive,
//! multiplicative, unary, postfix (call / index / property), atom. Loose
//! top-level statements become the body of the synthesized entry function.

use crate::ast::{
    BinaryOp, Block, ClassDecl, Expr, FunctionDecl, Literal, MemberDecl, Pos, Script, Span, Stmt,
    SwitchCase, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{tokenize, Token, TokenKind};

use quill_vm::bytecode::MAIN_FUNCTION_NAME;

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    anonymous_functions: usize,
}

/// Parses a whole source unit.
pub fn parse(source: &str) -> CompileResult<Script> {
    let tokens = tokenize(source)?;
    Parser {
        source,
        tokens,
        pos: 0,
        anonymous_functions: 0,
    }
    .parse_script()
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_span(&self) -> Span {
        match self.current() {
            Some(token) => token.span,
            None => {
                let end = self
                    .tokens
                    .last()
                    .map(|token| token.span.end)
                    .unwrap_or(Pos {
                        offset: self.source.len(),
                        line: 1,
                        column: 1,
                    });
                Span { start: end, end }
            }
        }
    }

    fn accept(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.current().map(|token| &token.kind) == Some(kind) {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn accept_identifier(&mut self) -> Option<(String, Span)> {
        if let Some(Token {
            kind: TokenKind::Identifier(_),
            ..
        }) = self.current()
        {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;

            let TokenKind::Identifier(name) = token.kind else {
                unreachable!()
            };
            Some((name, token.span))
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> CompileResult<Token> {
        self.accept(kind)
            .ok_or_else(|| CompileError::syntax(format!("expected {what}"), self.current_span()))
    }

    fn syntax_error<T>(&self, message: impl Into<String>) -> CompileResult<T> {
        Err(CompileError::syntax(message, self.current_span()))
    }

    fn text_of_span(&self, span: Span) -> String {
        self.source[span.start.offset..span.end.offset].to_owned()
    }

    fn anonymous_name(&mut self) -> String {
        let name = format!(".anon_{}", self.anonymous_functions);
        self.anonymous_functions += 1;
        name
    }

    /* SCRIPT STRUCTURE */

    fn parse_script(&mut self) -> CompileResult<Script> {
        let mut script = Script {
            functions: Vec::new(),
            classes: Vec::new(),
            main: FunctionDecl {
                name: MAIN_FUNCTION_NAME.to_owned(),
                parameters: Vec::new(),
                body: Block::default(),
                span: Span::default(),
            },
        };

        loop {
            if let Some(function) = self.parse_function(false)? {
                script.functions.push(function);
                continue;
            }

            if let Some(class) = self.parse_class()? {
                script.classes.push(class);
                continue;
            }

            if let Some(statement) = self.parse_statement(true)? {
                script.main.body.statements.push(statement);
                continue;
            }

            if self.current().is_some() {
                return self.syntax_error("expected a class, function or statement");
            }

            break;
        }

        Ok(script)
    }

    fn parse_function(&mut self, must_be_anonymous: bool) -> CompileResult<Option<FunctionDecl>> {
        let Some(keyword) = self.accept(&TokenKind::KwFunction) else {
            return Ok(None);
        };

        let name = match self.accept_identifier() {
            Some((name, _)) if must_be_anonymous => {
                return self
                    .syntax_error(format!("expected anonymous function, found name `{name}`"));
            }
            Some((name, _)) => name,
            None => self.anonymous_name(),
        };

        let parameters = self.parse_parameter_list()?;

        let body = self
            .parse_block()?
            .ok_or_else(|| CompileError::syntax("expected function body", self.current_span()))?;

        let span = Span::union(keyword.span, body.span);

        Ok(Some(FunctionDecl {
            name,
            parameters,
            body,
            span,
        }))
    }

    fn parse_parameter_list(&mut self) -> CompileResult<Vec<String>> {
        self.expect(&TokenKind::LeftParen, "'('")?;

        let mut parameters = Vec::new();

        if self.accept(&TokenKind::RightParen).is_some() {
            return Ok(parameters);
        }

        loop {
            let Some((name, _)) = self.accept_identifier() else {
                return self.syntax_error("expected parameter name");
            };
            parameters.push(name);

            if self.accept(&TokenKind::Comma).is_none() {
                break;
            }
        }

        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(parameters)
    }

    fn parse_class(&mut self) -> CompileResult<Option<ClassDecl>> {
        let Some(keyword) = self.accept(&TokenKind::KwClass) else {
            return Ok(None);
        };

        let Some((name, _)) = self.accept_identifier() else {
            return self.syntax_error("expected class name");
        };

        self.expect(&TokenKind::LeftBrace, "'{'")?;

        let mut members = Vec::new();

        while let Some(member_kw) = self.accept(&TokenKind::KwMember) {
            loop {
                let Some((member_name, member_span)) = self.accept_identifier() else {
                    return self.syntax_error("expected member name");
                };

                let initializer = if self.accept(&TokenKind::Assign).is_some() {
                    Some(self.require_expression()?)
                } else {
                    None
                };

                members.push(MemberDecl {
                    name: member_name,
                    initializer,
                    span: Span::union(member_kw.span, member_span),
                });

                if self.accept(&TokenKind::Comma).is_none() {
                    break;
                }
            }

            self.expect(&TokenKind::Semicolon, "';' after member declarations")?;
        }

        let mut methods = Vec::new();

        loop {
            if let Some(end) = self.accept(&TokenKind::RightBrace) {
                let span = Span::union(keyword.span, end.span);
                return Ok(Some(ClassDecl {
                    name,
                    members,
                    methods,
                    span,
                }));
            }

            let Some((method_name, method_span)) = self.accept_identifier() else {
                return self.syntax_error("expected method or '}' in class body");
            };

            let parameters = self.parse_parameter_list()?;
            let body = self.parse_block()?.ok_or_else(|| {
                CompileError::syntax("expected method body", self.current_span())
            })?;

            let span = Span::union(method_span, body.span);
            methods.push(FunctionDecl {
                name: method_name,
                parameters,
                body,
                span,
            });
        }
    }

    /* STATEMENTS */

    /// A braced statement list, or a single statement treated as a block.
    fn parse_block(&mut self) -> CompileResult<Option<Block>> {
        if let Some(open) = self.accept(&TokenKind::LeftBrace) {
            let mut block = Block {
                statements: Vec::new(),
                span: open.span,
            };

            loop {
                if let Some(close) = self.accept(&TokenKind::RightBrace) {
                    block.span = Span::union(open.span, close.span);
                    return Ok(Some(block));
                }

                match self.parse_statement(true)? {
                    Some(statement) => block.statements.push(statement),
                    None => return self.syntax_error("expected statement or '}'"),
                }
            }
        }

        match self.parse_statement(true)? {
            Some(statement) => {
                let span = statement_span(&statement);
                Ok(Some(Block {
                    statements: vec![statement],
                    span,
                }))
            }
            None => Ok(None),
        }
    }

    fn require_block(&mut self, after: &str) -> CompileResult<Block> {
        self.parse_block()?
            .ok_or_else(|| CompileError::syntax(format!("expected block {after}"), self.current_span()))
    }

    fn parse_statement(&mut self, terminated: bool) -> CompileResult<Option<Stmt>> {
        if let Some(keyword) = self.accept(&TokenKind::KwAssert) {
            let expr = self.require_expression()?;
            let text = self.text_of_span(expr.span());
            self.accept(&TokenKind::Semicolon);

            return Ok(Some(Stmt::Assert {
                expr,
                text,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwFor) {
            let init = self
                .parse_statement(false)?
                .ok_or_else(|| CompileError::syntax("expected init statement", self.current_span()))?;
            self.expect(&TokenKind::Semicolon, "';' after init statement")?;

            let condition = self.require_expression()?;
            self.expect(&TokenKind::Semicolon, "';' after loop condition")?;

            let update = self
                .parse_statement(false)?
                .ok_or_else(|| CompileError::syntax("expected update statement", self.current_span()))?;

            let body = self.require_block("after 'for' header")?;

            return Ok(Some(Stmt::For {
                init: Box::new(init),
                condition,
                update: Box::new(update),
                body,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwIf) {
            let condition = self.require_expression()?;
            let then_block = self.require_block("after 'if <expression>'")?;

            let else_block = if self.accept(&TokenKind::KwElse).is_some() {
                Some(self.require_block("after 'else'")?)
            } else {
                None
            };

            return Ok(Some(Stmt::If {
                condition,
                then_block,
                else_block,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwIterate) {
            let Some((variable, _)) = self.accept_identifier() else {
                return self.syntax_error("expected iterator variable after 'iterate'");
            };

            self.expect(&TokenKind::KwIn, "'in'")?;
            let range = self.require_expression()?;
            let body = self.require_block("after 'iterate ... in <expression>'")?;

            return Ok(Some(Stmt::Iterate {
                variable,
                range,
                body,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwReturn) {
            let expr = match self.parse_expression()? {
                Some(expr) => expr,
                None => Expr::Literal(Literal::Nil { span: keyword.span }),
            };
            self.accept(&TokenKind::Semicolon);

            return Ok(Some(Stmt::Return {
                expr,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwSwitch) {
            return self.parse_switch(keyword.span).map(Some);
        }

        if let Some(keyword) = self.accept(&TokenKind::KwThrow) {
            let expr = self.require_expression()?;
            self.accept(&TokenKind::Semicolon);

            return Ok(Some(Stmt::Throw {
                expr,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwTry) {
            let try_block = self.require_block("after 'try'")?;

            self.expect(&TokenKind::KwCatch, "'catch' after 'try' block")?;

            let Some((variable, _)) = self.accept_identifier() else {
                return self.syntax_error("expected variable name following 'catch'");
            };

            let catch_block = self.require_block("after the caught variable")?;

            return Ok(Some(Stmt::TryCatch {
                try_block,
                variable,
                catch_block,
                span: keyword.span,
            }));
        }

        if let Some(keyword) = self.accept(&TokenKind::KwWhile) {
            let condition = self.require_expression()?;
            let body = self.require_block("after 'while <expression>'")?;

            return Ok(Some(Stmt::While {
                condition,
                body,
                span: keyword.span,
            }));
        }

        let Some(expr) = self.parse_expression()? else {
            return Ok(None);
        };

        let statement = if let Some(assign) = self.accept(&TokenKind::Assign) {
            let value = self.require_expression()?;

            Stmt::Assignment {
                target: expr,
                value,
                span: assign.span,
            }
        } else {
            let span = expr.span();
            Stmt::Expression { expr, span }
        };

        if terminated {
            self.expect(&TokenKind::Semicolon, "';'")?;
        }

        Ok(Some(statement))
    }

    fn parse_switch(&mut self, span: Span) -> CompileResult<Stmt> {
        let expr = self.require_expression()?;

        self.expect(&TokenKind::LeftBrace, "'{' after 'switch <expression>'")?;

        let mut cases = Vec::new();
        let mut default = None;

        loop {
            if self.accept(&TokenKind::RightBrace).is_some() {
                break;
            }

            if self.accept(&TokenKind::KwElse).is_some() {
                self.expect(&TokenKind::Colon, "':' after 'else'")?;

                if default.is_some() {
                    return self.syntax_error("duplicate default handler in switch");
                }

                default = Some(self.require_block("after ':'")?);
            } else {
                let mut values = Vec::new();

                loop {
                    let Some(value) = self.parse_constant()? else {
                        return self.syntax_error("expected 'else' or a constant expression");
                    };
                    values.push(value);

                    if self.accept(&TokenKind::Comma).is_none() {
                        break;
                    }
                }

                self.expect(&TokenKind::Colon, "':' after case value(s)")?;
                let body = self.require_block("after ':'")?;

                cases.push(SwitchCase { values, body });
            }

            self.accept(&TokenKind::Comma);
        }

        Ok(Stmt::Switch {
            expr,
            cases,
            default,
            span,
        })
    }

    /* EXPRESSIONS */

    fn require_expression(&mut self) -> CompileResult<Expr> {
        self.parse_expression()?
            .ok_or_else(|| CompileError::syntax("expected expression", self.current_span()))
    }

    fn parse_expression(&mut self) -> CompileResult<Option<Expr>> {
        self.parse_logical()
    }

    fn parse_logical(&mut self) -> CompileResult<Option<Expr>> {
        let Some(mut top) = self.parse_comparison()? else {
            return Ok(None);
        };

        loop {
            let op = if self.accept(&TokenKind::AndAnd).is_some() {
                BinaryOp::And
            } else if self.accept(&TokenKind::OrOr).is_some() {
                BinaryOp::Or
            } else {
                return Ok(Some(top));
            };

            let Some(right) = self.parse_comparison()? else {
                return self.syntax_error(format!("expected expression after '{}'", op.symbol()));
            };

            let span = Span::union(top.span(), right.span());
            top = Expr::Binary {
                op,
                left: Box::new(top),
                right: Box::new(right),
                span,
            };
        }
    }

    fn parse_comparison(&mut self) -> CompileResult<Option<Expr>> {
        let Some(mut top) = self.parse_additive()? else {
            return Ok(None);
        };

        loop {
            let op = if self.accept(&TokenKind::EqualsEquals).is_some() {
                BinaryOp::Equals
            } else if self.accept(&TokenKind::NotEquals).is_some() {
                BinaryOp::NotEquals
            } else if self.accept(&TokenKind::GreaterEq).is_some() {
                BinaryOp::GreaterEq
            } else if self.accept(&TokenKind::Greater).is_some() {
                BinaryOp::Greater
            } else if self.accept(&TokenKind::LessEq).is_some() {
                BinaryOp::LessEq
            } else if self.accept(&TokenKind::Less).is_some() {
                BinaryOp::Less
            } else {
                return Ok(Some(top));
            };

            let Some(right) = self.parse_additive()? else {
                return self.syntax_error(format!("expected expression after '{}'", op.symbol()));
            };

            let span = Span::union(top.span(), right.span());
            top = Expr::Binary {
                op,
                left: Box::new(top),
                right: Box::new(right),
                span,
            };
        }
    }

    fn parse_additive(&mut self) -> CompileResult<Option<Expr>> {
        let Some(mut top) = self.parse_multiplicative()? else {
            return Ok(None);
        };

        loop {
            let op = if self.accept(&TokenKind::Plus).is_some() {
                BinaryOp::Add
            } else if self.accept(&TokenKind::Minus).is_some() {
                BinaryOp::Subtract
            } else {
                return Ok(Some(top));
            };

            let Some(right) = self.parse_multiplicative()? else {
                return self.syntax_error(format!("expected expression after '{}'", op.symbol()));
            };

            let span = Span::union(top.span(), right.span());
            top = Expr::Binary {
                op,
                left: Box::new(top),
                right: Box::new(right),
                span,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Option<Expr>> {
        let Some(mut top) = self.parse_unary()? else {
            return Ok(None);
        };

        loop {
            let op = if self.accept(&TokenKind::Star).is_some() {
                BinaryOp::Multiply
            } else if self.accept(&TokenKind::Slash).is_some() {
                BinaryOp::Divide
            } else if self.accept(&TokenKind::Percent).is_some() {
                BinaryOp::Modulo
            } else {
                return Ok(Some(top));
            };

            let Some(right) = self.parse_unary()? else {
                return self.syntax_error(format!("expected expression after '{}'", op.symbol()));
            };

            let span = Span::union(top.span(), right.span());
            top = Expr::Binary {
                op,
                left: Box::new(top),
                right: Box::new(right),
                span,
            };
        }
    }

    fn parse_unary(&mut self) -> CompileResult<Option<Expr>> {
        if let Some(token) = self.accept(&TokenKind::Minus) {
            let Some(operand) = self.parse_unary()? else {
                return self.syntax_error("expected expression after '-'");
            };

            let span = Span::union(token.span, operand.span());
            return Ok(Some(Expr::Unary {
                op: UnaryOp::Negation,
                operand: Box::new(operand),
                span,
            }));
        }

        if let Some(token) = self.accept(&TokenKind::Not) {
            let Some(operand) = self.parse_unary()? else {
                return self.syntax_error("expected expression after '!'");
            };

            let span = Span::union(token.span, operand.span());
            return Ok(Some(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            }));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> CompileResult<Option<Expr>> {
        let Some(mut top) = self.parse_atom()? else {
            return Ok(None);
        };

        loop {
            if self.accept(&TokenKind::LeftSquare).is_some() {
                let index = self.require_expression()?;
                let close = self.expect(&TokenKind::RightSquare, "']'")?;

                let span = Span::union(top.span(), close.span);
                top = Expr::Index {
                    range: Box::new(top),
                    index: Box::new(index),
                    span,
                };
                continue;
            }

            if self.accept(&TokenKind::Period).is_some() {
                let Some((name, name_span)) = self.accept_identifier() else {
                    return self.syntax_error("expected property name after '.'");
                };

                let span = Span::union(top.span(), name_span);
                top = Expr::Property {
                    object: Box::new(top),
                    name,
                    span,
                };
                continue;
            }

            if self.accept(&TokenKind::LeftParen).is_some() {
                let mut arguments = Vec::new();

                let close_span = if let Some(close) = self.accept(&TokenKind::RightParen) {
                    close.span
                } else {
                    loop {
                        arguments.push(self.require_expression()?);

                        if self.accept(&TokenKind::Comma).is_none() {
                            break;
                        }
                    }

                    self.expect(&TokenKind::RightParen, "',' or ')'")?.span
                };

                let span = Span::union(top.span(), close_span);
                top = Expr::Call {
                    callable: Box::new(top),
                    arguments,
                    span,
                };
                continue;
            }

            return Ok(Some(top));
        }
    }

    fn parse_atom(&mut self) -> CompileResult<Option<Expr>> {
        if let Some(constant) = self.parse_constant()? {
            return Ok(Some(Expr::Literal(constant)));
        }

        // Object literal
        if let Some(open) = self.accept(&TokenKind::LeftBrace) {
            let mut properties = Vec::new();

            loop {
                if let Some(close) = self.accept(&TokenKind::RightBrace) {
                    return Ok(Some(Expr::Literal(Literal::Object {
                        properties,
                        span: Span::union(open.span, close.span),
                    })));
                }

                let Some((name, _)) = self.accept_identifier() else {
                    return self.syntax_error("expected property name in object literal");
                };

                self.expect(&TokenKind::Colon, "':' after property name")?;
                let value = self.require_expression()?;
                properties.push((name, value));

                if let Some(close) = self.accept(&TokenKind::RightBrace) {
                    return Ok(Some(Expr::Literal(Literal::Object {
                        properties,
                        span: Span::union(open.span, close.span),
                    })));
                }

                self.expect(&TokenKind::Comma, "',' or '}'")?;
            }
        }

        // Forced-local identifier
        if self.accept(&TokenKind::KwLocal).is_some() {
            let Some((name, span)) = self.accept_identifier() else {
                return self.syntax_error("expected identifier after 'local'");
            };

            return Ok(Some(Expr::Identifier {
                name,
                forced_local: true,
                span,
            }));
        }

        // Anonymous function expression
        if let Some(function) = self.parse_function(true)? {
            return Ok(Some(Expr::Function(Box::new(function))));
        }

        if let Some((name, span)) = self.accept_identifier() {
            return Ok(Some(Expr::Identifier {
                name,
                forced_local: false,
                span,
            }));
        }

        // Parenthesized expression list; zero or several items construct a
        // list, one is a plain parenthesized expression.
        if let Some(open) = self.accept(&TokenKind::LeftParen) {
            let mut items = Vec::new();

            if self.current().map(|token| &token.kind) != Some(&TokenKind::RightParen) {
                loop {
                    items.push(self.require_expression()?);

                    if self.accept(&TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }

            let close = self.expect(&TokenKind::RightParen, "',' or ')'")?;
            let span = Span::union(open.span, close.span);

            if items.len() == 1 {
                return Ok(Some(items.pop().expect("one item")));
            }

            return Ok(Some(Expr::List { items, span }));
        }

        Ok(None)
    }

    fn parse_constant(&mut self) -> CompileResult<Option<Literal>> {
        let Some(token) = self.current() else {
            return Ok(None);
        };

        let literal = match &token.kind {
            TokenKind::Nil => Literal::Nil { span: token.span },
            TokenKind::Boolean(value) => Literal::Boolean {
                value: *value,
                span: token.span,
            },
            TokenKind::Integer(value) => Literal::Integer {
                value: *value,
                span: token.span,
            },
            TokenKind::Real(value) => Literal::Real {
                value: *value,
                span: token.span,
            },
            TokenKind::Str(value) => Literal::Str {
                value: value.clone(),
                span: token.span,
            },
            _ => return Ok(None),
        };

        self.pos += 1;
        Ok(Some(literal))
    }
}

fn statement_span(statement: &Stmt) -> Span {
    match statement {
        Stmt::Assert { span, .. }
        | Stmt::Assignment { span, .. }
        | Stmt::Expression { span, .. }
        | Stmt::For { span, .. }
        | Stmt::Iterate { span, .. }
        | Stmt::If { span, .. }
        | Stmt::Return { span, .. }
        | Stmt::Switch { span, .. }
        | Stmt::Throw { span, .. }
        | Stmt::TryCatch { span, .. }
        | Stmt::While { span, .. } => *span,
        Stmt::Block(block) => block.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_statements_form_main_body() {
        let script = parse("x = 1;\nreturn x + 2;").unwrap();
        assert_eq!(script.main.name, MAIN_FUNCTION_NAME);
        assert_eq!(script.main.body.statements.len(), 2);
        assert!(script.functions.is_empty());
    }

    #[test]
    fn test_function_declaration() {
        let script = parse("function add(a, b) { return a + b; }").unwrap();
        assert_eq!(script.functions.len(), 1);
        assert_eq!(script.functions[0].name, "add");
        assert_eq!(script.functions[0].parameters, vec!["a", "b"]);
    }

    #[test]
    fn test_precedence_mul_binds_tighter_than_add() {
        let script = parse("return 1 + 2 * 3;").unwrap();
        let Stmt::Return { expr, .. } = &script.main.body.statements[0] else {
            panic!("expected return");
        };
        let Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } = expr
        else {
            panic!("expected top-level add, got {expr:?}");
        };
        assert!(matches!(
            **right,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_object_literal_and_property_access() {
        let script = parse("o = { a: 1, b: 'x' };\nreturn o.a;").unwrap();
        let Stmt::Assignment { value, .. } = &script.main.body.statements[0] else {
            panic!("expected assignment");
        };
        let Expr::Literal(Literal::Object { properties, .. }) = value else {
            panic!("expected object literal");
        };
        assert_eq!(properties.len(), 2);
    }

    #[test]
    fn test_try_catch_throw() {
        let script = parse("try { throw { desc: 'x' }; } catch e { return e.desc; }").unwrap();
        let Stmt::TryCatch {
            variable,
            try_block,
            catch_block,
            ..
        } = &script.main.body.statements[0]
        else {
            panic!("expected try/catch");
        };
        assert_eq!(variable, "e");
        assert_eq!(try_block.statements.len(), 1);
        assert_eq!(catch_block.statements.len(), 1);
    }

    #[test]
    fn test_switch_with_default() {
        let script =
            parse("switch x { 1: return 'a', 2, 3: return 'b', else: return 'c' }").unwrap();
        let Stmt::Switch { cases, default, .. } = &script.main.body.statements[0] else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].values.len(), 2);
        assert!(default.is_some());
    }

    #[test]
    fn test_class_declaration() {
        let script = parse(
            "class Point {\n member x, y = 0;\n constructor(x) { local x; }\n norm() { return x; }\n}",
        )
        .unwrap();
        assert_eq!(script.classes.len(), 1);

        let class = &script.classes[0];
        assert_eq!(class.name, "Point");
        assert_eq!(class.members.len(), 2);
        assert!(class.members[1].initializer.is_some());
        assert_eq!(class.methods.len(), 2);
    }

    #[test]
    fn test_anonymous_functions_get_unique_names() {
        let script = parse("f = function (x) { return x; };\ng = function () { return 1; };")
            .unwrap();

        let names: Vec<&str> = script
            .main
            .body
            .statements
            .iter()
            .map(|statement| {
                let Stmt::Assignment { value, .. } = statement else {
                    panic!("expected assignment");
                };
                let Expr::Function(function) = value else {
                    panic!("expected function expression");
                };
                function.name.as_str()
            })
            .collect();

        assert_eq!(names, vec![".anon_0", ".anon_1"]);
    }

    #[test]
    fn test_iterate_statement() {
        let script = parse("iterate item in items { print(item); }").unwrap();
        assert!(matches!(
            script.main.body.statements[0],
            Stmt::Iterate { .. }
        ));
    }

    #[test]
    fn test_missing_semicolon_is_an_error() {
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn test_assert_captures_expression_text() {
        let script = parse("assert a + b == 3;").unwrap();
        let Stmt::Assert { text, .. } = &script.main.body.statements[0] else {
            panic!("expected assert");
        };
        assert_eq!(text, "a + b == 3");
    }
}
