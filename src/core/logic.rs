//! Logic compiler: filter expressions over blendshape scores
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr       := "if" expr "then" expr "else" expr | or
//! or         := and (("or" | "||") and)*
//! and        := not (("and" | "&&") not)*
//! not        := ("not" | "!") not | comparison
//! comparison := additive (cmp-op additive | ["not"] "in" "(" list ")")*
//! additive   := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/" | "%") unary)*
//! unary      := "-" unary | power
//! power      := primary ("^" unary)?
//! primary    := number | "true" | "false" | ident | ident "(" list ")" | "(" expr ")"
//! ```
//!
//! Identifiers read the score vector. A name the frame does not carry is
//! absent: 0 in arithmetic, false as a condition. `a?.b` is accepted and
//! reads the same as `a.b`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{MAX_EXPRESSION_LEN, MAX_NESTING_DEPTH};
use crate::types::{CompileError, EvalError, Predicate, ScoreVector, SharedPredicate};

/// Compiles expression text into a predicate
pub trait LogicCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<SharedPredicate, CompileError>;
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    In,
    If,
    Then,
    Else,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Ident(s) => write!(f, "'{}'", s),
            TokenKind::True => write!(f, "'true'"),
            TokenKind::False => write!(f, "'false'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::In => write!(f, "'in'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Then => write!(f, "'then'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::Eq => write!(f, "'=='"),
            TokenKind::Ne => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    /// Character offset into the source
    pos: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0 }
    }

    fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, pos: start });
        };

        // Two-character operators first
        let pair = (c, self.peek_at(1));
        let two = match pair {
            ('=', Some('=')) => Some(TokenKind::Eq),
            ('!', Some('=')) => Some(TokenKind::Ne),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            ('&', Some('&')) => Some(TokenKind::And),
            ('|', Some('|')) => Some(TokenKind::Or),
            _ => None,
        };
        if let Some(kind) = two {
            self.pos += 2;
            return Ok(Token { kind, pos: start });
        }

        let one = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ',' => Some(TokenKind::Comma),
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '%' => Some(TokenKind::Percent),
            '^' => Some(TokenKind::Caret),
            '<' => Some(TokenKind::Lt),
            '>' => Some(TokenKind::Gt),
            '!' => Some(TokenKind::Not),
            _ => None,
        };
        if let Some(kind) = one {
            self.pos += 1;
            return Ok(Token { kind, pos: start });
        }

        if c.is_ascii_digit() {
            return self.number(start);
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.word(start));
        }

        Err(CompileError::UnexpectedChar { ch: c, pos: start })
    }

    fn number(&mut self, start: usize) -> Result<Token, CompileError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(|n| Token { kind: TokenKind::Number(n), pos: start })
            .map_err(|_| CompileError::InvalidNumber { text, pos: start })
    }

    fn word(&mut self, start: usize) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                text.push(c);
                self.pos += 1;
            } else if c == '?' && self.peek_at(1) == Some('.') {
                // optional chaining reads like plain member access
                self.pos += 1;
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            _ => TokenKind::Ident(text),
        };
        Token { kind, pos: start }
    }
}

// =============================================================================
// AST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Min,
    Max,
    Round,
    Floor,
    Ceil,
    Sqrt,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        match name {
            "abs" => Some(Func::Abs),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "round" => Some(Func::Round),
            "floor" => Some(Func::Floor),
            "ceil" => Some(Func::Ceil),
            "sqrt" => Some(Func::Sqrt),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Func::Abs => "abs",
            Func::Min => "min",
            Func::Max => "max",
            Func::Round => "round",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Sqrt => "sqrt",
        }
    }

    fn variadic(&self) -> bool {
        matches!(self, Func::Min | Func::Max)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Bool(bool),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    In { needle: Box<Expr>, haystack: Vec<Expr>, negated: bool },
    If { cond: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Call(Func, Vec<Expr>),
}

impl Expr {
    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) | Expr::Bool(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(e) | Expr::Not(e) => e.collect_vars(out),
            Expr::Binary(_, a, b) | Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::In { needle, haystack, .. } => {
                needle.collect_vars(out);
                haystack.iter().for_each(|e| e.collect_vars(out));
            }
            Expr::If { cond, then, otherwise } => {
                cond.collect_vars(out);
                then.collect_vars(out);
                otherwise.collect_vars(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|e| e.collect_vars(out)),
        }
    }
}

// =============================================================================
// PARSER
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Both the parser and `eval` recurse over the tree, so the source
    /// length and the nesting depth are bounded before anything recurses.
    fn parse(source: &str) -> Result<Expr, CompileError> {
        if source.len() > MAX_EXPRESSION_LEN {
            return Err(CompileError::TooLong { len: source.len(), max: MAX_EXPRESSION_LEN });
        }
        let mut parser = Parser { tokens: Lexer::tokenize(source)?, pos: 0, depth: 0 };
        let expr = parser.expression()?;
        parser.expect(TokenKind::Eof, "end of input")?;
        Ok(expr)
    }

    /// Run one recursive production one level deeper
    fn nested<T>(&mut self, production: impl FnOnce(&mut Self) -> Result<T, CompileError>) -> Result<T, CompileError> {
        if self.depth >= MAX_NESTING_DEPTH {
            let pos = self.tokens[self.pos.min(self.tokens.len() - 1)].pos;
            return Err(CompileError::TooDeep { max: MAX_NESTING_DEPTH, pos });
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_second(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), CompileError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        CompileError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.to_string(),
            pos: token.pos,
        }
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&TokenKind::If) {
            let cond = self.expression()?;
            self.expect(TokenKind::Then, "'then'")?;
            let then = self.expression()?;
            self.expect(TokenKind::Else, "'else'")?;
            let otherwise = self.expression()?;
            return Ok(Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        self.or()
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.not()?;
        while self.eat(&TokenKind::And) {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, CompileError> {
        if self.peek() == &TokenKind::Not && self.peek_second() != &TokenKind::In {
            self.advance();
            let inner = self.nested(Self::not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek().clone() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::In => {
                    self.advance();
                    left = self.membership(left, false)?;
                    continue;
                }
                TokenKind::Not if self.peek_second() == &TokenKind::In => {
                    self.advance();
                    self.advance();
                    left = self.membership(left, true)?;
                    continue;
                }
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn membership(&mut self, needle: Expr, negated: bool) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LParen, "'(' after 'in'")?;
        let haystack = self.list()?;
        Ok(Expr::In { needle: Box::new(needle), haystack, negated })
    }

    /// Comma separated expressions up to and including ')'
    fn list(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(items);
            }
            self.expect(TokenKind::Comma, "',' or ')'")?;
        }
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().clone() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().clone() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, CompileError> {
        let base = self.primary()?;
        if self.eat(&TokenKind::Caret) {
            let exponent = self.nested(Self::unary)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    self.call(name)
                } else {
                    Ok(Expr::Var(name))
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, CompileError> {
        let func = Func::lookup(&name).ok_or(CompileError::UnknownFunction(name))?;
        let args = self.list()?;
        let ok = if func.variadic() { !args.is_empty() } else { args.len() == 1 };
        if !ok {
            return Err(CompileError::Arity {
                name: func.name().to_string(),
                expected: if func.variadic() { "at least 1" } else { "1" }.to_string(),
                found: args.len(),
            });
        }
        Ok(Expr::Call(func, args))
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
    Absent,
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Absent => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Absent => "absent",
        }
    }

    fn number(&self, op: &str) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Absent => Ok(0.0),
            Value::Bool(_) => Err(EvalError::TypeMismatch {
                op: op.to_string(),
                expected: "number",
                found: self.type_name(),
            }),
        }
    }

    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
            (a, b) => a.number("==").ok() == b.number("==").ok(),
        }
    }
}

fn eval(expr: &Expr, scores: &ScoreVector) -> Result<Value, EvalError> {
    Ok(match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Var(name) => scores.get(name).map_or(Value::Absent, |s| Value::Number(s as f64)),
        Expr::Neg(e) => Value::Number(-eval(e, scores)?.number("-")?),
        Expr::Not(e) => Value::Bool(!eval(e, scores)?.truthy()),
        Expr::And(a, b) => Value::Bool(eval(a, scores)?.truthy() && eval(b, scores)?.truthy()),
        Expr::Or(a, b) => Value::Bool(eval(a, scores)?.truthy() || eval(b, scores)?.truthy()),
        Expr::Binary(op, a, b) => binary(*op, eval(a, scores)?, eval(b, scores)?)?,
        Expr::In { needle, haystack, negated } => {
            let needle = eval(needle, scores)?;
            let mut found = false;
            for item in haystack {
                if needle.loosely_equals(&eval(item, scores)?) {
                    found = true;
                    break;
                }
            }
            Value::Bool(found != *negated)
        }
        Expr::If { cond, then, otherwise } => {
            if eval(cond, scores)?.truthy() {
                eval(then, scores)?
            } else {
                eval(otherwise, scores)?
            }
        }
        Expr::Call(func, args) => {
            let name = func.name();
            let values = args.iter()
                .map(|a| eval(a, scores).and_then(|v| v.number(name)))
                .collect::<Result<Vec<f64>, _>>()?;
            let first = values[0];
            Value::Number(match func {
                Func::Abs => first.abs(),
                Func::Round => first.round(),
                Func::Floor => first.floor(),
                Func::Ceil => first.ceil(),
                Func::Sqrt => first.sqrt(),
                Func::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                Func::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        }
    })
}

fn binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(a.loosely_equals(&b))),
        BinaryOp::Ne => return Ok(Value::Bool(!a.loosely_equals(&b))),
        _ => {}
    }

    let sym = op.symbol();
    let (x, y) = (a.number(sym)?, b.number(sym)?);
    Ok(match op {
        BinaryOp::Add => Value::Number(x + y),
        BinaryOp::Sub => Value::Number(x - y),
        BinaryOp::Mul => Value::Number(x * y),
        BinaryOp::Div | BinaryOp::Mod if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => Value::Number(x / y),
        BinaryOp::Mod => Value::Number(x % y),
        BinaryOp::Pow => Value::Number(x.powf(y)),
        BinaryOp::Lt => Value::Bool(x < y),
        BinaryOp::Le => Value::Bool(x <= y),
        BinaryOp::Gt => Value::Bool(x > y),
        BinaryOp::Ge => Value::Bool(x >= y),
        BinaryOp::Eq | BinaryOp::Ne => unreachable!("handled above"),
    })
}

// =============================================================================
// COMPILER
// =============================================================================

/// A parsed expression, ready to run against each frame
#[derive(Debug)]
pub struct CompiledLogic {
    source: String,
    expr: Expr,
    variables: Vec<String>,
}

impl CompiledLogic {
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Predicate for CompiledLogic {
    fn evaluate(&self, scores: &ScoreVector) -> Result<bool, EvalError> {
        eval(&self.expr, scores).map(|v| v.truthy())
    }

    fn variables(&self) -> Vec<String> {
        self.variables.clone()
    }
}

/// Production compiler: parses, then probes the result once against
/// sample scores so expressions that can never evaluate are rejected.
#[derive(Debug, Clone)]
pub struct ExpressionCompiler {
    probe: ScoreVector,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCompiler {
    pub fn new() -> Self {
        Self { probe: ScoreVector::probe_sample() }
    }

    /// Compile to the concrete type
    pub fn compile_logic(&self, source: &str) -> Result<CompiledLogic, CompileError> {
        let expr = Parser::parse(source)?;
        let mut vars = BTreeSet::new();
        expr.collect_vars(&mut vars);

        let logic = CompiledLogic {
            source: source.to_string(),
            expr,
            variables: vars.into_iter().collect(),
        };
        logic.evaluate(&self.probe)?;
        Ok(logic)
    }
}

impl LogicCompiler for ExpressionCompiler {
    fn compile(&self, source: &str) -> Result<SharedPredicate, CompileError> {
        Ok(Arc::new(self.compile_logic(source)?))
    }
}

// =============================================================================
// TEST DOUBLES
// =============================================================================

/// Predicate backed by a shared flag the caller flips between frames
#[derive(Debug)]
pub struct FlagPredicate {
    flag: Arc<AtomicBool>,
}

impl Predicate for FlagPredicate {
    fn evaluate(&self, _scores: &ScoreVector) -> Result<bool, EvalError> {
        Ok(self.flag.load(Ordering::SeqCst))
    }
}

/// Compiler that ignores the grammar: every source names a flag.
///
/// Sources starting with `!` are rejected, which lets tests exercise the
/// compile-failure path without writing broken expressions.
#[derive(Debug, Default)]
pub struct FlagCompiler {
    flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl FlagCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, name: &str) -> Arc<AtomicBool> {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Set the value every predicate compiled from `name` returns
    pub fn set(&self, name: &str, value: bool) {
        self.flag(name).store(value, Ordering::SeqCst);
    }
}

impl LogicCompiler for FlagCompiler {
    fn compile(&self, source: &str) -> Result<SharedPredicate, CompileError> {
        if source.starts_with('!') {
            return Err(CompileError::UnexpectedChar { ch: '!', pos: 0 });
        }
        Ok(Arc::new(FlagPredicate { flag: self.flag(source) }))
    }
}

// =============================================================================
// TESTS
// =============================================================================
