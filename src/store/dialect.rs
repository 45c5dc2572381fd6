//! Select dialect interpreter
//!
//! Parses and evaluates the select statements accepted by [`MemoryStore`].
//!
//! ```text
//! SELECT <attrs> | * | count(*) | itemName() FROM <domain>
//!   [WHERE <expr>] [ORDER BY <attr> [ASC|DESC]] [LIMIT <n>]
//! ```
//!
//! Comparisons are lexicographic on strings. An attribute matches a
//! predicate when any one of its values does. Keywords are
//! case-insensitive.
//!
//! [`MemoryStore`]: super::MemoryStore

use std::iter::Peekable;
use std::str::Chars;

use super::errors::{StoreError, StoreResult};
use crate::condition::like_pattern;
use crate::record::AttributeMap;

/// What a statement returns per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Count,
    ItemName,
    Attributes(Vec<AttrRef>),
}

/// An attribute reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrRef {
    Name(String),
    ItemName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        attr: AttrRef,
        op: CompareOp,
        value: String,
    },
    Like {
        attr: AttrRef,
        pattern: String,
        negated: bool,
    },
    In {
        attr: AttrRef,
        values: Vec<String>,
    },
    Between {
        attr: AttrRef,
        low: String,
        high: String,
    },
    IsNull {
        attr: AttrRef,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// A parsed select statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub projection: Projection,
    pub domain: String,
    pub filter: Option<Expr>,
    /// Sort attribute and whether it is descending
    pub order: Option<(AttrRef, bool)>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare word: keyword, identifier or number
    Word(String),
    /// Backtick-quoted name
    Name(String),
    /// Quoted string value
    Str(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Star,
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidExpression(message.into())
}

fn tokenize(input: &str) -> StoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '`' => tokens.push(Token::Name(read_quoted(&mut chars)?)),
            '"' | '\'' => tokens.push(Token::Str(read_quoted(&mut chars)?)),
            '=' => {
                chars.next();
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(invalid("expected '=' after '!'"));
                }
                tokens.push(Token::Op(CompareOp::Ne));
            }
            '<' => {
                chars.next();
                let op = match chars.peek() {
                    Some('=') => {
                        chars.next();
                        CompareOp::Lte
                    }
                    Some('>') => {
                        chars.next();
                        CompareOp::Ne
                    }
                    _ => CompareOp::Lt,
                };
                tokens.push(Token::Op(op));
            }
            '>' => {
                chars.next();
                let op = if chars.peek() == Some(&'=') {
                    chars.next();
                    CompareOp::Gte
                } else {
                    CompareOp::Gt
                };
                tokens.push(Token::Op(op));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&nc) = chars.peek() {
                    if !is_word_char(nc) {
                        break;
                    }
                    word.push(nc);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '-')
}

/// Reads a quoted run; the quote character is escaped by doubling it
fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> StoreResult<String> {
    let quote = chars.next().ok_or_else(|| invalid("expected quote"))?;
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(invalid("unterminated quoted text")),
            Some(c) if c == quote => {
                if chars.peek() == Some(&quote) {
                    chars.next();
                    out.push(quote);
                } else {
                    return Ok(out);
                }
            }
            Some(c) => out.push(c),
        }
    }
}

/// Parses a select statement
pub fn parse(input: &str) -> StoreResult<Statement> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let statement = parser.statement()?;
    if parser.pos != parser.tokens.len() {
        return Err(invalid(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> StoreResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(invalid(format!("expected {}", keyword)))
        }
    }

    fn expect(&mut self, token: Token) -> StoreResult<()> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(invalid(format!("expected {:?}, found {:?}", token, other))),
        }
    }

    fn statement(&mut self) -> StoreResult<Statement> {
        self.expect_keyword("SELECT")?;
        let projection = self.projection()?;
        self.expect_keyword("FROM")?;
        let domain = match self.next() {
            Some(Token::Word(w)) | Some(Token::Name(w)) => w,
            other => return Err(invalid(format!("expected domain, found {:?}", other))),
        };

        let filter = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };

        let order = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let attr = self.attr()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some((attr, descending))
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            match self.next() {
                Some(Token::Word(w)) => Some(
                    w.parse::<usize>()
                        .map_err(|_| invalid(format!("invalid limit '{}'", w)))?,
                ),
                other => return Err(invalid(format!("expected limit, found {:?}", other))),
            }
        } else {
            None
        };

        Ok(Statement {
            projection,
            domain,
            filter,
            order,
            limit,
        })
    }

    fn projection(&mut self) -> StoreResult<Projection> {
        if self.peek() == Some(&Token::Star) {
            self.pos += 1;
            return Ok(Projection::All);
        }
        if self.at_keyword("count") && self.tokens.get(self.pos + 1) == Some(&Token::LParen) {
            self.pos += 1;
            self.expect(Token::LParen)?;
            self.expect(Token::Star)?;
            self.expect(Token::RParen)?;
            return Ok(Projection::Count);
        }

        let mut attrs = vec![self.attr()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            attrs.push(self.attr()?);
        }
        if attrs == [AttrRef::ItemName] {
            return Ok(Projection::ItemName);
        }
        Ok(Projection::Attributes(attrs))
    }

    fn attr(&mut self) -> StoreResult<AttrRef> {
        match self.next() {
            Some(Token::Word(w)) => {
                if w.eq_ignore_ascii_case("itemName") && self.peek() == Some(&Token::LParen) {
                    self.expect(Token::LParen)?;
                    self.expect(Token::RParen)?;
                    Ok(AttrRef::ItemName)
                } else {
                    Ok(AttrRef::Name(w))
                }
            }
            Some(Token::Name(n)) => Ok(AttrRef::Name(n)),
            other => Err(invalid(format!("expected attribute, found {:?}", other))),
        }
    }

    fn value(&mut self) -> StoreResult<String> {
        match self.next() {
            Some(Token::Str(s)) | Some(Token::Word(s)) => Ok(s),
            other => Err(invalid(format!("expected value, found {:?}", other))),
        }
    }

    fn or_expr(&mut self) -> StoreResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> StoreResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> StoreResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> StoreResult<Expr> {
        let attr = self.attr()?;

        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let value = self.value()?;
            return Ok(Expr::Compare { attr, op, value });
        }

        if self.eat_keyword("NOT") {
            self.expect_keyword("LIKE")?;
            let pattern = self.value()?;
            return Ok(Expr::Like {
                attr,
                pattern,
                negated: true,
            });
        }
        if self.eat_keyword("LIKE") {
            let pattern = self.value()?;
            return Ok(Expr::Like {
                attr,
                pattern,
                negated: false,
            });
        }
        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut values = vec![self.value()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.value()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::In { attr, values });
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.value()?;
            self.expect_keyword("AND")?;
            let high = self.value()?;
            return Ok(Expr::Between { attr, low, high });
        }
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { attr, negated });
        }

        Err(invalid(format!("expected predicate after {:?}", attr)))
    }
}

/// Returns the values of an attribute reference on an item
pub fn values_of<'a>(attr: &AttrRef, item_name: &'a str, attributes: &'a AttributeMap) -> Vec<&'a str> {
    match attr {
        AttrRef::ItemName => vec![item_name],
        AttrRef::Name(name) => attributes
            .get(name)
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default(),
    }
}

impl Expr {
    /// Evaluates the expression against one item
    pub fn matches(&self, item_name: &str, attributes: &AttributeMap) -> bool {
        match self {
            Expr::Compare { attr, op, value } => {
                values_of(attr, item_name, attributes)
                    .into_iter()
                    .any(|v| match op {
                        CompareOp::Eq => v == value,
                        CompareOp::Ne => v != value,
                        CompareOp::Lt => v < value.as_str(),
                        CompareOp::Lte => v <= value.as_str(),
                        CompareOp::Gt => v > value.as_str(),
                        CompareOp::Gte => v >= value.as_str(),
                    })
            }
            Expr::Like {
                attr,
                pattern,
                negated,
            } => match like_pattern(pattern) {
                Some(regex) => values_of(attr, item_name, attributes)
                    .into_iter()
                    .any(|v| regex.is_match(v) != *negated),
                None => false,
            },
            Expr::In { attr, values } => values_of(attr, item_name, attributes)
                .into_iter()
                .any(|v| values.iter().any(|member| member == v)),
            Expr::Between { attr, low, high } => values_of(attr, item_name, attributes)
                .into_iter()
                .any(|v| v >= low.as_str() && v <= high.as_str()),
            Expr::IsNull { attr, negated } => {
                values_of(attr, item_name, attributes).is_empty() != *negated
            }
            Expr::And(left, right) => {
                left.matches(item_name, attributes) && right.matches(item_name, attributes)
            }
            Expr::Or(left, right) => {
                left.matches(item_name, attributes) || right.matches(item_name, attributes)
            }
            Expr::Not(inner) => !inner.matches(item_name, attributes),
        }
    }
}
