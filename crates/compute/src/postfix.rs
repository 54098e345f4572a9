//! Infix to postfix conversion (shunting-yard).
//!
//! Produces the token sequence the task graph builder consumes. Numbers keep
//! their source text; a `-` at the very start or right after `(` is folded
//! into the number that follows it.

use thiserror::Error;

use abacus_core::Operator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("mismatched parentheses")]
    MismatchedParentheses,

    #[error("invalid character: {0}")]
    InvalidCharacter(char),
}

#[derive(Debug, Clone, Copy)]
enum StackEntry {
    Operator(Operator),
    OpenParen,
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Read a numeric literal starting at `start`, returning it and the index after it.
fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut number = String::new();
    if chars[i] == '-' {
        number.push('-');
        i += 1;
    }
    while i < chars.len() && is_number_char(chars[i]) {
        number.push(chars[i]);
        i += 1;
    }
    (number, i)
}

/// Convert an infix expression into postfix tokens.
pub fn to_postfix(expression: &str) -> Result<Vec<String>, ParseError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = Vec::new();
    let mut stack: Vec<StackEntry> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let leading_minus = c == '-' && (i == 0 || chars[i - 1] == '(');
        if is_number_char(c) || leading_minus {
            let (number, next) = read_number(&chars, i);
            out.push(number);
            i = next;
            continue;
        }

        if let Some(op) = Operator::from_char(c) {
            // Equal precedence pops first: left associativity.
            while let Some(&StackEntry::Operator(top)) = stack.last() {
                if top.precedence() < op.precedence() {
                    break;
                }
                out.push(top.symbol().to_string());
                stack.pop();
            }
            stack.push(StackEntry::Operator(op));
        } else if c == '(' {
            stack.push(StackEntry::OpenParen);
        } else if c == ')' {
            loop {
                match stack.pop() {
                    Some(StackEntry::Operator(op)) => out.push(op.symbol().to_string()),
                    Some(StackEntry::OpenParen) => break,
                    None => return Err(ParseError::MismatchedParentheses),
                }
            }
        } else {
            return Err(ParseError::InvalidCharacter(c));
        }

        i += 1;
    }

    while let Some(entry) = stack.pop() {
        match entry {
            StackEntry::Operator(op) => out.push(op.symbol().to_string()),
            StackEntry::OpenParen => return Err(ParseError::MismatchedParentheses),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix(expr: &str) -> Vec<String> {
        to_postfix(expr).unwrap()
    }

    #[test]
    fn simple_sum() {
        assert_eq!(postfix("2+2"), ["2", "2", "+"]);
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(postfix("2+3*4"), ["2", "3", "4", "*", "+"]);
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        assert_eq!(postfix("8-3-2"), ["8", "3", "-", "2", "-"]);
        assert_eq!(postfix("8/4*2"), ["8", "4", "/", "2", "*"]);
    }

    #[test]
    fn leading_minus_is_part_of_number() {
        assert_eq!(postfix("-2+1"), ["-2", "1", "+"]);
        assert_eq!(postfix("3*(-2+1)"), ["3", "-2", "1", "+", "*"]);
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(postfix("(2+3)*4"), ["2", "3", "+", "4", "*"]);
    }

    #[test]
    fn whitespace_and_decimals() {
        assert_eq!(postfix(" 1.5 *  2 "), ["1.5", "2", "*"]);
    }

    #[test]
    fn unclosed_parenthesis() {
        assert_eq!(to_postfix("2+(3*4"), Err(ParseError::MismatchedParentheses));
    }

    #[test]
    fn unopened_parenthesis() {
        assert_eq!(to_postfix("2+3)"), Err(ParseError::MismatchedParentheses));
    }

    #[test]
    fn unknown_character() {
        assert_eq!(to_postfix("2+3$4"), Err(ParseError::InvalidCharacter('$')));
        assert_eq!(
            to_postfix("2+3$4").unwrap_err().to_string(),
            "invalid character: $"
        );
    }

    #[test]
    fn trailing_operator_still_compiles() {
        // Structural problems are caught by the task graph builder.
        assert_eq!(postfix("2+2-"), ["2", "2", "+", "-"]);
    }
}
