// Formula parser - converts expression text into an AST.
// Supports: numbers, cell refs (A1), basic math (+, -, *, /), unary signs,
// parentheses. Input arrives without the leading '=' marker.

use crate::position::{Position, col_to_letters};

use super::FormulaParseError;

/// Expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference, already bounds-checked against the addressable domain.
    Ref(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn symbol(&self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }
}

/// Binding strength used both for parsing structure and for deciding
/// where the canonical printer must keep parentheses.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) | Expr::Ref(_) => 3,
        Expr::Unary { .. } => 3,
        Expr::Binary { op: Op::Mul | Op::Div, .. } => 2,
        Expr::Binary { op: Op::Add | Op::Sub, .. } => 1,
    }
}

impl Expr {
    /// Append every referenced position, in syntactic order with duplicates.
    pub fn collect_refs(&self, out: &mut Vec<Position>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ref(pos) => out.push(*pos),
            Expr::Unary { operand, .. } => operand.collect_refs(out),
            Expr::Binary { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
        }
    }

    /// Render with minimal parentheses: a subexpression is wrapped only
    /// where dropping the parens would rebind operands.
    pub fn to_canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Expr::Number(n) => {
                out.push_str(&format!("{}", n));
            }
            Expr::Ref(pos) => {
                out.push_str(&col_to_letters(pos.col));
                out.push_str(&format!("{}", pos.row + 1));
            }
            Expr::Unary { op, operand } => {
                out.push(match op {
                    UnaryOp::Plus => '+',
                    UnaryOp::Minus => '-',
                });
                // Unary binds tighter than any binary operator.
                if precedence(operand) < 3 {
                    out.push('(');
                    operand.write_canonical(out);
                    out.push(')');
                } else {
                    operand.write_canonical(out);
                }
            }
            Expr::Binary { op, left, right } => {
                if precedence(left) < precedence(self) {
                    out.push('(');
                    left.write_canonical(out);
                    out.push(')');
                } else {
                    left.write_canonical(out);
                }
                out.push(op.symbol());
                // '-' and '/' are left-associative: an equal-precedence
                // right child must keep its parens (1-(2-3), 8/(4/2)).
                let right_needs_parens = precedence(right) < precedence(self)
                    || (precedence(right) == precedence(self) && matches!(op, Op::Sub | Op::Div));
                if right_needs_parens {
                    out.push('(');
                    right.write_canonical(out);
                    out.push(')');
                } else {
                    right.write_canonical(out);
                }
            }
        }
    }
}

/// Parse expression text into an AST.
pub fn parse(input: &str) -> Result<Expr, FormulaParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormulaParseError("empty formula".to_string()));
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(FormulaParseError(format!(
            "unexpected trailing input at token {}",
            pos
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match try_parse_cell_ref(&ident) {
                    Some(pos) if pos.is_valid() => tokens.push(Token::CellRef(pos)),
                    Some(pos) => {
                        return Err(FormulaParseError(format!(
                            "cell reference out of range: {}",
                            pos
                        )));
                    }
                    None => {
                        return Err(FormulaParseError(format!(
                            "invalid cell reference: {}",
                            ident
                        )));
                    }
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| FormulaParseError(format!("invalid number: {}", num_str)))?;
                tokens.push(Token::Number(num));
            }
            _ => {
                return Err(FormulaParseError(format!("unexpected character: {}", c)));
            }
        }
    }

    Ok(tokens)
}

fn try_parse_cell_ref(s: &str) -> Option<Position> {
    let s = s.to_uppercase();
    let mut chars = s.chars().peekable();

    let mut col_str = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_uppercase() {
            col_str.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if col_str.is_empty() {
        return None;
    }

    let row_str: String = chars.collect();
    if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let row: usize = row_str.parse().ok()?;
    if row == 0 {
        return None;
    }

    // Column letters to index (A=0, ..., Z=25, AA=26). Checked math so a
    // ZZZZZ... run fails cleanly instead of wrapping.
    let mut col_acc = 0usize;
    for c in col_str.chars() {
        col_acc = col_acc
            .checked_mul(26)?
            .checked_add(c as usize - 'A' as usize + 1)?;
    }

    Some(Position::new(row - 1, col_acc - 1))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    match tokens.get(pos) {
        Some(Token::Plus) => {
            let (operand, new_pos) = parse_unary(tokens, pos + 1)?;
            Ok((
                Expr::Unary {
                    op: UnaryOp::Plus,
                    operand: Box::new(operand),
                },
                new_pos,
            ))
        }
        Some(Token::Minus) => {
            let (operand, new_pos) = parse_unary(tokens, pos + 1)?;
            Ok((
                Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(operand),
                },
                new_pos,
            ))
        }
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), FormulaParseError> {
    match tokens.get(pos) {
        Some(Token::Number(n)) => Ok((Expr::Number(*n), pos + 1)),
        Some(Token::CellRef(p)) => Ok((Expr::Ref(*p), pos + 1)),
        Some(Token::LParen) => {
            let (inner, new_pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(new_pos) {
                Some(Token::RParen) => Ok((inner, new_pos + 1)),
                _ => Err(FormulaParseError("expected ')'".to_string())),
            }
        }
        Some(tok) => Err(FormulaParseError(format!("unexpected token: {:?}", tok))),
        None => Err(FormulaParseError("unexpected end of formula".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(input: &str) -> String {
        parse(input).unwrap().to_canonical()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("3.5").unwrap(), Expr::Number(3.5));
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse("A1").unwrap(), Expr::Ref(Position::new(0, 0)));
        assert_eq!(parse("aa10").unwrap(), Expr::Ref(Position::new(9, 26)));
    }

    #[test]
    fn test_precedence() {
        // 1+2*3 parses as 1+(2*3)
        let expr = parse("1+2*3").unwrap();
        match expr {
            Expr::Binary { op: Op::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: Op::Mul, .. }));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_canonical_minimal_parens() {
        assert_eq!(canonical(" 1 + 2*3 "), "1+2*3");
        assert_eq!(canonical("(1+2)*3"), "(1+2)*3");
        assert_eq!(canonical("(1*2)+3"), "1*2+3");
        assert_eq!(canonical("1-(2-3)"), "1-(2-3)");
        assert_eq!(canonical("(1-2)-3"), "1-2-3");
        assert_eq!(canonical("8/(4/2)"), "8/(4/2)");
        assert_eq!(canonical("-(1+2)"), "-(1+2)");
        assert_eq!(canonical("-1*2"), "-1*2");
        assert_eq!(canonical("A1+B2"), "A1+B2");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("1+").is_err());
        assert!(parse("(1+2").is_err());
        assert!(parse("1+2)").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("A0").is_err());
        assert!(parse("1A").is_err());
        assert!(parse("SUM(A1)").is_err());
    }

    #[test]
    fn test_out_of_range_ref_is_parse_error() {
        // Row 20000 exceeds MAX_ROWS.
        let err = parse("A20000").unwrap_err();
        assert!(err.0.contains("out of range"));
        // Overlong column runs fail as invalid rather than wrapping.
        let huge = format!("{}1", "Z".repeat(40));
        assert!(parse(&huge).is_err());
    }
}
