//! Formula tokenizer and recursive-descent parser.
//!
//! Grammar (the leading `=` is stripped first):
//!
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/") unary)*
//! unary   := ("+" | "-") unary | primary
//! primary := NUMBER | REF | NAME "(" args ")" | "(" expr ")"
//! args    := arg ("," arg)*
//! arg     := REF ":" REF | expr
//! ```

use super::cell_ref::{CellRange, CellRef};
use super::error::{EvalError, EvalResult};

/// Limit on recursive descent (parentheses, unary signs, function calls).
const MAX_NESTING: usize = 256;
/// Limit on the depth of the resulting tree, which evaluation walks
/// recursively. Each operator in a chain like `1+1+1` adds a level.
const MAX_TREE_DEPTH: usize = 1024;

/// Parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Ref(CellRef),
    /// Only produced as a function argument.
    Range(CellRange),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Aggregate functions available to formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sum,
    Average,
    Min,
    Max,
    Count,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(Function::Sum),
            "AVERAGE" | "AVG" => Some(Function::Average),
            "MIN" => Some(Function::Min),
            "MAX" => Some(Function::Max),
            "COUNT" => Some(Function::Count),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sum => "SUM",
            Function::Average => "AVERAGE",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Count => "COUNT",
        }
    }
}

/// Parse formula text. A leading `=` is optional.
pub fn parse_formula(formula: &str) -> EvalResult<Expr> {
    let body = formula.strip_prefix('=').unwrap_or(formula);
    let tokens = tokenize(body)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Token::End => Ok(expr),
        tok => Err(parse_error(format!("unexpected {} after expression", tok.describe()))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ref(CellRef),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
    Comma,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Ref(r) => format!("reference {}", r),
            Token::Name(n) => format!("name '{}'", n),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::End => "end of formula".to_string(),
        }
    }
}

fn parse_error(message: impl Into<String>) -> EvalError {
    EvalError::Parse(message.into())
}

fn tokenize(input: &str) -> EvalResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent: e, optional sign, at least one digit.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| parse_error(format!("malformed number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text.bytes().any(|b| b.is_ascii_digit()) {
                    let cell_ref = CellRef::from_str(&text)
                        .ok_or_else(|| parse_error(format!("invalid reference '{}'", text)))?;
                    tokens.push(Token::Ref(cell_ref));
                } else {
                    tokens.push(Token::Name(text));
                }
            }
            other => {
                return Err(parse_error(format!("unsupported operator '{}'", other)));
            }
        }
    }

    tokens.push(Token::End);
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::End)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::End)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> EvalResult<()> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(parse_error(format!(
                "expected {}, found {}",
                expected.describe(),
                tok.describe()
            )))
        }
    }

    fn deepen(&mut self) -> EvalResult<()> {
        self.depth += 1;
        if self.depth > MAX_TREE_DEPTH {
            return Err(parse_error("formula nested too deeply"));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let result = self.parse_sum();
        self.depth = depth;
        result
    }

    fn parse_sum(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            self.deepen()?;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let result = self.parse_product();
        self.depth = depth;
        result
    }

    fn parse_product(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            self.deepen()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        if self.nesting >= MAX_NESTING {
            return Err(parse_error("formula nested too deeply"));
        }
        let depth = self.depth;
        self.nesting += 1;
        let result = self.deepen().and_then(|_| self.parse_signed());
        self.nesting -= 1;
        self.depth = depth;
        result
    }

    fn parse_signed(&mut self) -> EvalResult<Expr> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Ref(r) => {
                if *self.peek() == Token::Colon {
                    return Err(parse_error(format!(
                        "range starting at {} is only allowed inside a function",
                        r
                    )));
                }
                Ok(Expr::Ref(r))
            }
            Token::Name(name) => {
                let func = Function::from_name(&name)
                    .ok_or_else(|| parse_error(format!("unknown function '{}'", name)))?;
                self.expect(Token::LParen)?;
                let args = self.parse_args(func)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Call { func, args })
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::End => Err(parse_error("unexpected end of formula")),
            tok => Err(parse_error(format!("unexpected {}", tok.describe()))),
        }
    }

    fn parse_args(&mut self, func: Function) -> EvalResult<Vec<Expr>> {
        if *self.peek() == Token::RParen {
            return Err(parse_error(format!("{} needs at least one argument", func.name())));
        }
        let mut args = vec![self.parse_arg()?];
        while *self.peek() == Token::Comma {
            self.advance();
            args.push(self.parse_arg()?);
        }
        Ok(args)
    }

    fn parse_arg(&mut self) -> EvalResult<Expr> {
        if let Token::Ref(start) = *self.peek()
            && *self.peek_at(1) == Token::Colon
        {
            self.pos += 2;
            return match self.advance() {
                Token::Ref(end) => Ok(Expr::Range(CellRange::new(start, end))),
                tok => Err(parse_error(format!(
                    "expected range end after '{}:', found {}",
                    start,
                    tok.describe()
                ))),
            };
        }
        self.parse_expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_formula("=5+3*2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: num(5.0),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: num(3.0),
                    right: num(2.0),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_formula("8-4-2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    left: num(8.0),
                    right: num(4.0),
                }),
                right: num(2.0),
            }
        );
    }

    #[test]
    fn test_function_with_range() {
        let expr = parse_formula("=sum(A2:B2)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                func: Function::Sum,
                args: vec![Expr::Range(CellRange::parse("A2:B2").unwrap())],
            }
        );
    }

    #[test]
    fn test_mixed_arguments() {
        let expr = parse_formula("=MAX(A1:A3, B1 * 2, 7)").unwrap();
        match expr {
            Expr::Call { func, args } => {
                assert_eq!(func, Function::Max);
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_exponent_literal() {
        assert_eq!(parse_formula("=1.5e2").unwrap(), Expr::Number(150.0));
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let signs = format!("={}1", "-".repeat(200_000));
        assert!(matches!(parse_formula(&signs), Err(EvalError::Parse(_))));

        let parens = format!("={}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(parse_formula(&parens), Err(EvalError::Parse(_))));

        let chain = format!("=1{}", "+1".repeat(200_000));
        assert!(matches!(parse_formula(&chain), Err(EvalError::Parse(_))));

        let calls = format!("={}1{}", "SUM(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse_formula(&calls), Err(EvalError::Parse(_))));
    }

    #[test]
    fn test_moderate_nesting_still_parses() {
        let parens = format!("={}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_formula(&parens).unwrap(), Expr::Number(1.0));

        let chain = format!("=1{}", "+A1".repeat(500));
        assert!(parse_formula(&chain).is_ok());
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "=",
            "=(1+2",
            "=1+2)",
            "=2^3",
            "=A1&B1",
            "=FOO(A1)",
            "=SUM()",
            "=SUM(A1:)",
            "=A1:B2",
            "=1..2",
            "=1 2",
            "=total",
            "=\"text\"",
        ] {
            assert!(
                matches!(parse_formula(bad), Err(EvalError::Parse(_))),
                "{bad:?} should fail to parse"
            );
        }
    }
}
