use super::error::QueryError;
use super::token::{Function, Token};

/// Splits a query string into tokens by whitespace and punctuation.
pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { chars: input.chars().collect(), pos: 0, input }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    tokens.push(Token::Eof);
                    break;
                }
                Some(c) => tokens.push(self.next_token(c)?),
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn next_token(&mut self, c: char) -> Result<Token, QueryError> {
        match c {
            '(' => { self.advance(); Ok(Token::LParen) }
            ')' => { self.advance(); Ok(Token::RParen) }
            ',' => { self.advance(); Ok(Token::Comma) }
            '+' => { self.advance(); Ok(Token::Plus) }
            '-' => { self.advance(); Ok(Token::Minus) }
            '*' => { self.advance(); Ok(Token::Star) }
            '=' => { self.advance(); Ok(Token::Eq) }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    Err(QueryError::UnexpectedChar('!', self.pos))
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::GreaterEq)
                } else {
                    Ok(Token::Greater)
                }
            }
            '<' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::LessEq)
                } else {
                    Ok(Token::Less)
                }
            }
            '\'' => self.read_string(),
            '.' => self.read_meta(),
            c if c.is_ascii_digit() => self.read_number_or_timespan(),
            c if c.is_alphabetic() || c == '_' => self.read_ident_or_keyword(),
            other => Err(QueryError::UnexpectedChar(other, self.pos)),
        }
    }

    fn read_string(&mut self) -> Result<Token, QueryError> {
        self.advance(); // opening quote
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\'' {
                let value: String = self.chars[start..self.pos].iter().collect();
                self.advance();
                return Ok(Token::String(value));
            }
            self.advance();
        }
        Err(QueryError::UnterminatedString)
    }

    fn read_meta(&mut self) -> Result<Token, QueryError> {
        self.advance(); // '.'
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.to_ascii_lowercase().as_str() {
            "databases" => Ok(Token::MetaDatabases),
            "timeseries" => Ok(Token::MetaTimeseries),
            other => Err(QueryError::UnexpectedToken(format!(".{}", other))),
        }
    }

    fn read_number_or_timespan(&mut self) -> Result<Token, QueryError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Timespan suffix: ms, s, m, h, d — only valid for integer literals.
        if !is_float {
            if let Some(unit_len) = self.timespan_unit_len() {
                let digits: String = self.chars[start..self.pos].iter().collect();
                let n: i64 = digits
                    .parse()
                    .map_err(|_| QueryError::InvalidNumber(digits.clone()))?;
                let unit_start = self.pos;
                for _ in 0..unit_len {
                    self.advance();
                }
                let unit: String = self.chars[unit_start..self.pos].iter().collect();
                return Ok(Token::Timespan(n * nanos_per_unit(&unit)));
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        let value: f64 = text.parse().map_err(|_| QueryError::InvalidNumber(text.clone()))?;
        Ok(Token::Number(value))
    }

    /// Returns the length of a recognized timespan unit suffix at the cursor,
    /// if any (`ms` is checked before `m`/`s`).
    fn timespan_unit_len(&self) -> Option<usize> {
        let rest: String = self.chars[self.pos..].iter().take(2).collect();
        if rest.starts_with("ms") {
            Some(2)
        } else if rest.starts_with('s') || rest.starts_with('m') || rest.starts_with('h') || rest.starts_with('d') {
            Some(1)
        } else {
            None
        }
    }

    fn read_ident_or_keyword(&mut self) -> Result<Token, QueryError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        Ok(match word.to_ascii_uppercase().as_str() {
            "CREATEDB" => Token::CreateDb,
            "CREATE" => Token::Create,
            "USE" => Token::Use,
            "DELETE" => Token::Delete,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "BETWEEN" => Token::Between,
            "AND" => Token::And,
            "WHERE" => Token::Where,
            "SAMPLE" => Token::Sample,
            "BY" => Token::By,
            "LIMIT" => Token::Limit,
            "VALUE" => Token::Value,
            "VALUES" => Token::Values,
            _ => match Function::from_ident(&word) {
                Some(func) => Token::Func(func),
                None => Token::Ident(word),
            },
        })
    }
}

fn nanos_per_unit(unit: &str) -> i64 {
    match unit {
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3600 * 1_000_000_000,
        "d" => 86_400 * 1_000_000_000,
        _ => unreachable!("validated by timespan_unit_len"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(tokenize("select")[0], Token::Select);
        assert_eq!(tokenize("SELECT")[0], Token::Select);
        assert_eq!(tokenize("SeLeCt")[0], Token::Select);
    }

    #[test]
    fn recognizes_functions() {
        assert_eq!(tokenize("avg")[0], Token::Func(Function::Avg));
        assert_eq!(tokenize("earliest")[0], Token::Func(Function::Earliest));
    }

    #[test]
    fn recognizes_timespans() {
        assert_eq!(tokenize("3d")[0], Token::Timespan(3 * 86_400_000_000_000));
        assert_eq!(tokenize("250ms")[0], Token::Timespan(250_000_000));
        assert_eq!(tokenize("10h")[0], Token::Timespan(10 * 3_600_000_000_000));
    }

    #[test]
    fn recognizes_plain_numbers() {
        assert_eq!(tokenize("78.5")[0], Token::Number(78.5));
        assert_eq!(tokenize("1e3")[0], Token::Number(1000.0));
    }

    #[test]
    fn recognizes_string_literal() {
        assert_eq!(tokenize("'2023-01-01 12:30:00'")[0], Token::String("2023-01-01 12:30:00".to_string()));
    }

    #[test]
    fn recognizes_meta_commands() {
        assert_eq!(tokenize(".databases")[0], Token::MetaDatabases);
        assert_eq!(tokenize(".timeseries")[0], Token::MetaTimeseries);
    }

    #[test]
    fn full_select_statement() {
        let tokens = tokenize("SELECT avg(value) FROM cpu_usage BETWEEN now() - 24h AND now()");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::Func(Function::Avg));
        assert_eq!(tokens[2], Token::LParen);
        assert_eq!(tokens[3], Token::Value);
        assert_eq!(tokens[4], Token::RParen);
        assert_eq!(tokens[5], Token::From);
        assert_eq!(tokens[6], Token::Ident("cpu_usage".to_string()));
        assert_eq!(tokens[7], Token::Between);
    }
}
