use tracing::debug;

use crate::{
    ast::{
        BinaryOp, Block, Class, ElseBranch, Expr, ExprKind, Function, Literal, Program, Stmt,
        StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, Position},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Default bound on how deeply blocks and expressions may nest.
pub const DEFAULT_MAX_NESTING: usize = 128;

const SEMICOLON_HINT: &str = "statements end with ';'";
const TOP_LEVEL_HINT: &str =
    "only 'func', 'main', 'class' and 'import' are allowed at the top level; wrap statements in 'main { ... }'";

pub fn parse_source(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    parse(tokens)
}

pub fn parse(tokens: Vec<Token>) -> Result<Program, Diagnostic> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    max_nesting: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or(Position::new(1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                position,
            });
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn parse_program(mut self) -> Result<Program, Diagnostic> {
        let mut program = Program::default();

        while !self.check(TokenKind::Eof) {
            let kind = self.peek().kind;
            match kind {
                TokenKind::Keyword(Keyword::Import) => {
                    program.statements.push(self.parse_import()?);
                }
                TokenKind::Keyword(Keyword::Func) => {
                    let function = self.parse_function()?;
                    self.ensure_single_main(&program, &function)?;
                    program.functions.push(function);
                }
                TokenKind::Keyword(Keyword::Main) => {
                    let function = self.parse_main()?;
                    self.ensure_single_main(&program, &function)?;
                    program.functions.push(function);
                }
                TokenKind::Keyword(Keyword::Class) => {
                    program.classes.push(self.parse_class()?);
                }
                _ => {
                    let token = self.peek().clone();
                    match self.parse_statement() {
                        Ok(stmt) => program.statements.push(stmt),
                        Err(err) if err.is_incomplete_input() => return Err(err),
                        Err(err) => {
                            debug!(error = %err, "loose top-level statement rejected");
                            return Err(Diagnostic::parser(
                                format!("unexpected token '{}' at the top level", token.lexeme),
                                token.position,
                            )
                            .with_hint(TOP_LEVEL_HINT));
                        }
                    }
                }
            }
        }

        debug!(
            functions = program.functions.len(),
            classes = program.classes.len(),
            statements = program.statements.len(),
            "parsed program"
        );
        Ok(program)
    }

    fn ensure_single_main(&self, program: &Program, function: &Function) -> Result<(), Diagnostic> {
        if function.name == "main" && program.has_main() {
            return Err(
                Diagnostic::parser("duplicate definition of 'main'", function.position)
                    .with_hint("a program has at most one 'main' block"),
            );
        }
        Ok(())
    }

    fn parse_import(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::Import)?.position;
        let name = self.consume(TokenKind::Identifier, "expected module name after 'import'")?;
        self.consume_semicolon("expected ';' after module name")?;
        Ok(Stmt {
            kind: StmtKind::Import(name.lexeme),
            position,
        })
    }

    fn parse_function(&mut self) -> Result<Function, Diagnostic> {
        let position = self.consume_keyword(Keyword::Func)?.position;
        let name = self.consume(TokenKind::Identifier, "expected function name")?;
        self.consume(TokenKind::LParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.consume(TokenKind::Identifier, "expected parameter name")?;
                params.push(param.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected ')' after parameters")?;
        let body = self.parse_block()?;
        Ok(Function {
            name: name.lexeme,
            params,
            body,
            position,
        })
    }

    fn parse_main(&mut self) -> Result<Function, Diagnostic> {
        let position = self.consume_keyword(Keyword::Main)?.position;
        let body = self.parse_block()?;
        Ok(Function {
            name: "main".to_string(),
            params: Vec::new(),
            body,
            position,
        })
    }

    fn parse_class(&mut self) -> Result<Class, Diagnostic> {
        let position = self.consume_keyword(Keyword::Class)?.position;
        let name = self.consume(TokenKind::Identifier, "expected class name")?;
        let superclass = if self.matches_keyword(Keyword::Extends) {
            Some(
                self.consume(TokenKind::Identifier, "expected superclass name")?
                    .lexeme,
            )
        } else {
            None
        };
        self.consume(TokenKind::LBrace, "expected '{' to start class body")?;
        let mut statements = Vec::new();
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Keyword(Keyword::Func) => {
                    let function = self.parse_function()?;
                    statements.push(Stmt {
                        position: function.position,
                        kind: StmtKind::Function(function),
                    });
                }
                TokenKind::Keyword(Keyword::Let) => statements.push(self.parse_let()?),
                _ => {
                    return Err(self
                        .error(&token, "expected 'func' or 'let' in class body")
                        .with_hint("class bodies hold methods and fields only"));
                }
            }
        }
        self.consume(TokenKind::RBrace, "expected '}' to close class body")?;
        Ok(Class {
            name: name.lexeme,
            superclass,
            body: Block { statements },
            position,
        })
    }

    fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        self.consume(TokenKind::LBrace, "expected '{' to start block")?;
        self.nested(|parser| {
            let mut statements = Vec::new();
            while !parser.check(TokenKind::RBrace) && !parser.check(TokenKind::Eof) {
                statements.push(parser.parse_statement()?);
            }
            parser.consume(TokenKind::RBrace, "expected '}' to close block")?;
            Ok(Block { statements })
        })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let kind = self.peek().kind;
        match kind {
            TokenKind::Keyword(Keyword::Let) => self.parse_let(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Identifier if self.peek_next().kind == TokenKind::Assign => {
                self.parse_set()
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::Let)?.position;
        let name = self.consume(TokenKind::Identifier, "expected identifier after 'let'")?;
        self.consume(TokenKind::Assign, "expected '=' in let statement")?;
        let value = self.parse_expression()?;
        self.consume_semicolon("expected ';' after let statement")?;
        Ok(Stmt {
            kind: StmtKind::Let {
                name: name.lexeme,
                value,
            },
            position,
        })
    }

    fn parse_set(&mut self) -> Result<Stmt, Diagnostic> {
        let name = self.consume(TokenKind::Identifier, "expected identifier")?;
        self.consume(TokenKind::Assign, "expected '=' in assignment")?;
        let value = self.parse_expression()?;
        self.consume_semicolon("expected ';' after assignment")?;
        Ok(Stmt {
            kind: StmtKind::Set {
                name: name.lexeme,
                value,
            },
            position: name.position,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::Return)?.position;
        if self.matches(TokenKind::Semicolon) {
            return Ok(Stmt {
                kind: StmtKind::Return(None),
                position,
            });
        }
        let value = self.parse_expression()?;
        self.consume_semicolon("expected ';' after return value")?;
        Ok(Stmt {
            kind: StmtKind::Return(Some(value)),
            position,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::If)?.position;
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let chained = self.nested(|parser| parser.parse_if())?;
                Some(ElseBranch::If(Box::new(chained)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            position,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::For)?.position;
        let binding = self.consume(TokenKind::Identifier, "expected loop variable")?;
        if !self.matches_keyword(Keyword::In) {
            let token = self.peek().clone();
            return Err(self.error(&token, "expected 'in' after loop variable"));
        }
        let mut iterable = self.parse_expression()?;
        if self.matches(TokenKind::Range) {
            let end = self.parse_expression()?;
            iterable = Expr {
                position: iterable.position,
                kind: ExprKind::Range {
                    start: Box::new(iterable),
                    end: Box::new(end),
                },
            };
        }
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
            position,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::While)?.position;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            position,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, Diagnostic> {
        let position = self.consume_keyword(Keyword::Try)?.position;
        let body = self.parse_block()?;
        if !self.matches_keyword(Keyword::Catch) {
            let token = self.peek().clone();
            return Err(self
                .error(&token, "expected 'catch' after try block")
                .with_hint("every 'try' needs a 'catch' clause"));
        }
        let error_binding = if self.check(TokenKind::Identifier) {
            Some(self.advance().lexeme)
        } else {
            None
        };
        let handler = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::Try {
                body,
                error_binding,
                handler,
            },
            position,
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        let position = expr.position;
        if self.check(TokenKind::Assign) {
            let assign = self.advance();
            if !matches!(expr.kind, ExprKind::Attribute { .. } | ExprKind::Index { .. }) {
                return Err(Diagnostic::parser("invalid assignment target", assign.position)
                    .with_hint("only names, attributes and index expressions can be assigned"));
            }
            let value = self.parse_expression()?;
            self.consume_semicolon("expected ';' after assignment")?;
            return Ok(Stmt {
                kind: StmtKind::Assign {
                    target: expr,
                    value,
                },
                position,
            });
        }
        self.consume_semicolon("expected ';' after expression")?;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            position,
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(|parser| parser.parse_or())
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            expr = binary(expr, BinaryOp::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches_keyword(Keyword::And) {
            let right = self.parse_equality()?;
            expr = binary(expr, BinaryOp::And, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = if self.matches(TokenKind::EqualEqual) {
            Some(BinaryOp::Equal)
        } else if self.matches(TokenKind::BangEqual) {
            Some(BinaryOp::NotEqual)
        } else {
            None
        } {
            let right = self.parse_comparison()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = if self.matches(TokenKind::LessEqual) {
            Some(BinaryOp::LessEqual)
        } else if self.matches(TokenKind::GreaterEqual) {
            Some(BinaryOp::GreaterEqual)
        } else if self.matches(TokenKind::Less) {
            Some(BinaryOp::Less)
        } else if self.matches(TokenKind::Greater) {
            Some(BinaryOp::Greater)
        } else {
            None
        } {
            let right = self.parse_term()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = if self.matches(TokenKind::Plus) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::Minus) {
            Some(BinaryOp::Sub)
        } else {
            None
        } {
            let right = self.parse_factor()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = if self.matches(TokenKind::Star) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::Slash) {
            Some(BinaryOp::Div)
        } else {
            None
        } {
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches_keyword(Keyword::Not) {
            UnaryOp::Not
        } else if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else {
            return self.parse_call();
        };
        let position = self.previous().position;
        let operand = self.nested(|parser| parser.parse_unary())?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            position,
        })
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            let position = expr.position;
            if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    position,
                };
            } else if self.matches(TokenKind::Dot) {
                let name = self.consume(TokenKind::Identifier, "expected attribute name after '.'")?;
                expr = Expr {
                    kind: ExprKind::Attribute {
                        base: Box::new(expr),
                        name: name.lexeme,
                    },
                    position,
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "expected ']' after index")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    position,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Number => {
                self.advance();
                ExprKind::Literal(number_literal(&token)?)
            }
            TokenKind::String => {
                self.advance();
                ExprKind::Literal(Literal::String(token.lexeme.clone()))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Identifier => {
                self.advance();
                ExprKind::Identifier(token.lexeme.clone())
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected ')' after expression")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RBracket, "expected ']' to close list")?;
                ExprKind::List(elements)
            }
            _ => return Err(self.error(&token, "expected expression")),
        };
        Ok(Expr {
            kind,
            position: token.position,
        })
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if self.depth >= self.max_nesting {
            return Err(
                Diagnostic::parser("code is nested too deeply", self.peek().position).with_hint(
                    format!("split the construct up; the nesting limit is {}", self.max_nesting),
                ),
            );
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn consume_semicolon(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Semicolon, message)
            .map_err(|err| err.with_hint(SEMICOLON_HINT))
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let kind = TokenKind::Keyword(keyword);
        let message = format!("expected '{}'", keyword_text(keyword));
        self.consume(kind, &message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.current + 1)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        if token.kind == TokenKind::Eof {
            Diagnostic::parser(format!("unexpected end of input: {message}"), token.position)
                .incomplete()
        } else {
            Diagnostic::parser(format!("{message}, found '{}'", token.lexeme), token.position)
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr {
        position: left.position,
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn number_literal(token: &Token) -> Result<Literal, Diagnostic> {
    if token.lexeme.contains('.') {
        token
            .lexeme
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| Diagnostic::parser("invalid float literal", token.position))
    } else {
        // Python rejects leading zeros on decimal integers.
        let digits = token.lexeme.trim_start_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };
        Ok(Literal::Int(digits.to_string()))
    }
}

fn keyword_text(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Func => "func",
        Keyword::Main => "main",
        Keyword::Let => "let",
        Keyword::Return => "return",
        Keyword::If => "if",
        Keyword::Else => "else",
        Keyword::For => "for",
        Keyword::Try => "try",
        Keyword::Catch => "catch",
        Keyword::Import => "import",
        Keyword::While => "while",
        Keyword::In => "in",
        Keyword::True => "true",
        Keyword::False => "false",
        Keyword::And => "and",
        Keyword::Or => "or",
        Keyword::Not => "not",
        Keyword::Class => "class",
        Keyword::This => "this",
        Keyword::Extends => "extends",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse_source(source).expect("parse should succeed")
    }

    fn parse_err(source: &str) -> Diagnostic {
        match parse_source(source) {
            Ok(program) => panic!("expected error, parsed {program:?}"),
            Err(err) => err,
        }
    }

    fn main_body(program: &Program) -> &[Stmt] {
        &program
            .functions
            .iter()
            .find(|f| f.name == "main")
            .expect("main exists")
            .body
            .statements
    }

    #[test]
    fn main_block_desugars_to_function() {
        let program = parse_ok("main { }");
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
        assert!(program.functions[0].params.is_empty());
        assert!(program.functions[0].body.statements.is_empty());
    }

    #[test]
    fn duplicate_main_is_rejected() {
        let err = parse_err("main { }\nmain { }");
        assert!(err.message.contains("duplicate"), "{err}");
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn reassignment_after_let_is_set() {
        let program = parse_ok("main { let x = 0; x = 5; }");
        let body = main_body(&program);
        assert!(matches!(&body[0].kind, StmtKind::Let { name, .. } if name == "x"));
        assert!(matches!(
            &body[1].kind,
            StmtKind::Set { name, value: Expr { kind: ExprKind::Literal(Literal::Int(digits)), .. } }
                if name == "x" && digits == "5"
        ));
    }

    #[test]
    fn attribute_assignment_becomes_assign() {
        let program = parse_ok("class P { func constructor(n) { this.name = n; } }");
        let method = program.classes[0].methods().next().unwrap();
        match &method.body.statements[0].kind {
            StmtKind::Assign { target, .. } => {
                assert!(matches!(&target.kind, ExprKind::Attribute { name, .. } if name == "name"));
            }
            other => panic!("expected assign, found {other:?}"),
        }
    }

    #[test]
    fn call_result_is_not_assignable() {
        let err = parse_err("main { f() = 1; }");
        assert!(err.message.contains("invalid assignment target"), "{err}");
    }

    #[test]
    fn precedence_and_left_associativity() {
        let program = parse_ok("main { let r = 1 - 2 - 3 * 4; }");
        let StmtKind::Let { value, .. } = &main_body(&program)[0].kind else {
            panic!("expected let");
        };
        // ((1 - 2) - (3 * 4))
        let ExprKind::Binary { op, left, right } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }));
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn logical_operators_bind_loosest() {
        let program = parse_ok("main { let r = not a == b or c and d; }");
        let StmtKind::Let { value, .. } = &main_body(&program)[0].kind else {
            panic!("expected let");
        };
        let ExprKind::Binary { op, left, right } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Equal, .. }));
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn postfix_chain() {
        let program = parse_ok("main { a.b[0](1, 2).c; }");
        let StmtKind::Expr(expr) = &main_body(&program)[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Attribute { base, name } = &expr.kind else {
            panic!("expected attribute");
        };
        assert_eq!(name, "c");
        assert!(matches!(&base.kind, ExprKind::Call { args, .. } if args.len() == 2));
    }

    #[test]
    fn for_range_is_inclusive_range_node() {
        let program = parse_ok("main { for i in 1..3 { } }");
        let StmtKind::For { binding, iterable, .. } = &main_body(&program)[0].kind else {
            panic!("expected for");
        };
        assert_eq!(binding, "i");
        assert!(matches!(iterable.kind, ExprKind::Range { .. }));
    }

    #[test]
    fn else_if_chains() {
        let program = parse_ok("main { if a { } else if b { } else { } }");
        let StmtKind::If { else_branch, .. } = &main_body(&program)[0].kind else {
            panic!("expected if");
        };
        let Some(ElseBranch::If(chained)) = else_branch else {
            panic!("expected chained if");
        };
        assert!(matches!(
            chained.kind,
            StmtKind::If { else_branch: Some(ElseBranch::Block(_)), .. }
        ));
    }

    #[test]
    fn try_catch_binding_is_optional() {
        let program = parse_ok("main { try { } catch e { } try { } catch { } }");
        let body = main_body(&program);
        assert!(matches!(&body[0].kind, StmtKind::Try { error_binding: Some(e), .. } if e == "e"));
        assert!(matches!(&body[1].kind, StmtKind::Try { error_binding: None, .. }));
    }

    #[test]
    fn try_without_catch_fails() {
        let err = parse_err("main { try { } x = 1; }");
        assert!(err.message.contains("expected 'catch'"), "{err}");
    }

    #[test]
    fn class_with_superclass_fields_and_methods() {
        let program = parse_ok(
            "class Dog extends Animal { let legs = 4; func bark() { return \"woof\"; } }",
        );
        let class = &program.classes[0];
        assert_eq!(class.name, "Dog");
        assert_eq!(class.superclass.as_deref(), Some("Animal"));
        assert_eq!(class.fields().count(), 1);
        assert_eq!(class.methods().next().map(|m| m.name.as_str()), Some("bark"));
    }

    #[test]
    fn class_body_rejects_other_statements() {
        let err = parse_err("class A { x = 1; }");
        assert!(err.message.contains("class body"), "{err}");
    }

    #[test]
    fn loose_statements_are_collected() {
        let program = parse_ok("import math;\nlet x = 1;\npy.print(x);");
        assert_eq!(program.statements.len(), 3);
        assert!(matches!(&program.statements[0].kind, StmtKind::Import(m) if m == "math"));
    }

    #[test]
    fn bad_top_level_token_is_reported() {
        let err = parse_err("func f() { }\n} ");
        assert!(err.message.contains("unexpected token '}'"), "{err}");
        assert_eq!(err.line(), Some(2));
        assert!(err.hint.is_some());
    }

    #[test]
    fn missing_semicolon_has_hint_and_position() {
        let err = parse_err("main {\n  let x = 1\n  let y = 2;\n}");
        assert!(err.message.contains("expected ';'"), "{err}");
        assert_eq!(err.position, Some(Position::new(3, 3)));
        assert_eq!(err.hint.as_deref(), Some(SEMICOLON_HINT));
    }

    #[test]
    fn truncated_input_is_incomplete() {
        for source in ["main {", "if x {", "func f(a,", "let x = (1 +"] {
            let err = parse_err(source);
            assert!(err.is_incomplete_input(), "{source}: {err}");
            assert!(err.message.starts_with("unexpected end of input"), "{err}");
        }
    }

    #[test]
    fn call_positions_point_at_callee() {
        let program = parse_ok("main {\n  let a = 1;\n    py.print(a);\n}");
        let StmtKind::Expr(call) = &main_body(&program)[1].kind else {
            panic!("expected call statement");
        };
        assert_eq!(call.position, Position::new(3, 5));
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let source = format!("main {{ let x = {}1{}; }}", "(".repeat(500), ")".repeat(500));
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"), "{err}");
    }

    #[test]
    fn moderate_nesting_parses() {
        let source = format!("main {{ let x = {}1{}; }}", "(".repeat(40), ")".repeat(40));
        parse_ok(&source);
    }

    #[test]
    fn wide_integer_keeps_its_digits() {
        let program = parse_ok("main { let x = 99999999999999999999; }");
        let body = main_body(&program);
        assert!(matches!(
            &body[0].kind,
            StmtKind::Let { value: Expr { kind: ExprKind::Literal(Literal::Int(digits)), .. }, .. }
                if digits == "99999999999999999999"
        ));
    }
}
