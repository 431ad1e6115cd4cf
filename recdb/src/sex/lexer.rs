use crate::error::{RecError, Result};
use crate::util::{parse_int, parse_real};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Str(String),
    Int(i64),
    Real(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Hash,
    Question,
    Colon,
    Not,
    Or,
    And,
    Implies,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Match,
    Before,
    After,
    SameTime,
    Concat,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

/// Split a selection expression into tokens.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match (c, next) {
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('#', _) => (Token::Hash, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('|', Some('|')) => (Token::Or, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('&', _) => (Token::Concat, 1),
            ('=', Some('=')) => (Token::SameTime, 2),
            ('=', Some('>')) => (Token::Implies, 2),
            ('=', _) => (Token::Eq, 1),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('!', _) => (Token::Not, 1),
            ('<', Some('<')) => (Token::Before, 2),
            ('<', Some('=')) => (Token::LtEq, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('>')) => (Token::After, 2),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('>', _) => (Token::Gt, 1),
            ('~', _) => (Token::Match, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('\'' | '"', _) => {
                let (s, width) = lex_string(&chars[i..])?;
                (Token::Str(s), width)
            }
            (c, _) if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let width = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '.')
                    .count();
                let text: String = chars[i..i + width].iter().collect();
                let token = match parse_int(&text) {
                    Some(n) => Token::Int(n),
                    None => match parse_real(&text) {
                        Some(r) => Token::Real(r),
                        None => return Err(RecError::Compile(format!("invalid number '{text}'"))),
                    },
                };
                (token, width)
            }
            (c, _) if c.is_ascii_alphabetic() => {
                let width = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .count();
                let word: String = chars[i..i + width].iter().collect();
                let token = match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Name(word),
                };
                (token, width)
            }
            (c, _) => {
                return Err(RecError::Compile(format!(
                    "unexpected character '{c}' at offset {i}"
                )))
            }
        };

        tokens.push(token);
        i += width;
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

/// A quoted string starting at `chars[0]`. Returns the unescaped text and
/// the number of characters consumed.
fn lex_string(chars: &[char]) -> Result<(String, usize)> {
    let quote = chars[0];
    let mut out = String::new();
    let mut i = 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| RecError::Compile("unterminated string literal".into()))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(RecError::Compile("unterminated string literal".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_comparison() {
        let tokens = tokenize("Audio = 'German'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("Audio".into()),
                Token::Eq,
                Token::Str("German".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        let tokens = tokenize("a == b => c <= d << e >= f >> g != h && i || j").unwrap();
        assert!(tokens.contains(&Token::SameTime));
        assert!(tokens.contains(&Token::Implies));
        assert!(tokens.contains(&Token::LtEq));
        assert!(tokens.contains(&Token::Before));
        assert!(tokens.contains(&Token::GtEq));
        assert!(tokens.contains(&Token::After));
        assert!(tokens.contains(&Token::NotEq));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::Or));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("0x1F").unwrap()[0], Token::Int(31));
        assert_eq!(tokenize("010").unwrap()[0], Token::Int(8));
        assert_eq!(tokenize("2.5").unwrap()[0], Token::Real(2.5));
        assert!(tokenize("12abc").is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokenize(r#""say \"hi\"""#).unwrap()[0],
            Token::Str("say \"hi\"".into())
        );
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("NOT a AND b OR c").unwrap();
        assert_eq!(tokens[0], Token::Not);
        assert_eq!(tokens[2], Token::And);
        assert_eq!(tokens[4], Token::Or);
    }
}
