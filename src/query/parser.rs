use super::ast::*;
use super::error::QueryError;
use super::token::{Function, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(input: &str) -> Result<Statement, QueryError> {
        let tokens = super::lexer::Lexer::new(input).tokenize()?;
        Parser::new(tokens).parse_statement()
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_ident(&mut self) -> Result<String, QueryError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), QueryError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(QueryError::UnexpectedToken(format!("expected {:?}, got {:?}", token, self.current())))
        }
    }

    pub fn parse_statement(&mut self) -> Result<Statement, QueryError> {
        let stmt = match self.current() {
            Token::Use => self.parse_use(),
            Token::MetaDatabases => { self.advance(); Ok(Statement::Meta(MetaCommand::Databases)) }
            Token::MetaTimeseries => { self.advance(); Ok(Statement::Meta(MetaCommand::Timeseries)) }
            Token::CreateDb => self.parse_createdb(),
            Token::Create => self.parse_create(),
            Token::Delete => self.parse_delete(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            other => Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        }?;
        Ok(stmt)
    }

    fn parse_use(&mut self) -> Result<Statement, QueryError> {
        self.advance();
        Ok(Statement::Use(self.expect_ident()?))
    }

    fn parse_createdb(&mut self) -> Result<Statement, QueryError> {
        self.advance();
        Ok(Statement::CreateDb(self.expect_ident()?))
    }

    fn parse_create(&mut self) -> Result<Statement, QueryError> {
        self.advance();
        let ts_name = self.expect_ident()?;

        let mut retention = None;
        let mut duplication = None;

        loop {
            match self.current() {
                Token::Ident(word) if word.eq_ignore_ascii_case("retention") => {
                    self.advance();
                    retention = Some(self.parse_timeunit()?);
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("duplication") => {
                    self.advance();
                    let policy = self.expect_ident()?;
                    duplication = Some(match policy.to_ascii_uppercase().as_str() {
                        "IGNORE" => DuplicationPolicy::Ignore,
                        "INSERT" => DuplicationPolicy::Insert,
                        other => return Err(QueryError::UnexpectedToken(other.to_string())),
                    });
                }
                _ => break,
            }
        }

        Ok(Statement::Create(CreateStmt { ts_name, retention, duplication }))
    }

    fn parse_delete(&mut self) -> Result<Statement, QueryError> {
        self.advance();
        let ts_name = self.expect_ident()?;
        let db_name = if self.eat(&Token::From) { Some(self.expect_ident()?) } else { None };
        Ok(Statement::Delete(DeleteStmt { ts_name, db_name }))
    }

    fn parse_insert(&mut self) -> Result<Statement, QueryError> {
        self.advance();
        self.expect(&Token::Into)?;
        let ts_name = self.expect_ident()?;

        let records = if self.eat(&Token::Values) {
            let mut records = Vec::new();
            loop {
                self.expect(&Token::LParen)?;
                let ts = self.parse_insert_timestamp()?;
                self.expect(&Token::Comma)?;
                let value = self.parse_signed_number()?;
                self.expect(&Token::RParen)?;
                records.push((ts, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            records
        } else if self.eat(&Token::Value) {
            let value = self.parse_signed_number()?;
            vec![(None, value)]
        } else {
            return Err(QueryError::UnexpectedToken(format!("{:?}", self.current())));
        };

        Ok(Statement::Insert(InsertStmt { ts_name, records }))
    }

    /// A VALUES timestamp slot: `*` or `now()` for implicit current time, a
    /// bare integer epoch, or a quoted date literal.
    fn parse_insert_timestamp(&mut self) -> Result<Option<Timeunit>, QueryError> {
        match self.current().clone() {
            Token::Star => { self.advance(); Ok(None) }
            Token::Func(Function::Now) => {
                self.advance();
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                Ok(None)
            }
            _ => Ok(Some(self.parse_timeunit()?)),
        }
    }

    fn parse_signed_number(&mut self) -> Result<f64, QueryError> {
        let negate = self.eat(&Token::Minus);
        match self.advance() {
            Token::Number(n) => Ok(if negate { -n } else { n }),
            other => Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        }
    }

    fn parse_select(&mut self) -> Result<Statement, QueryError> {
        self.advance();

        let (target, func_arg) = match self.current().clone() {
            Token::Value => { self.advance(); (SelectTarget::Value, None) }
            Token::Func(func) => {
                self.advance();
                self.expect(&Token::LParen)?;
                self.expect(&Token::Value)?;
                let arg = if self.eat(&Token::Comma) {
                    match self.advance() {
                        Token::Number(n) => Some(n as i64),
                        other => return Err(QueryError::UnexpectedToken(format!("{:?}", other))),
                    }
                } else {
                    None
                };
                self.expect(&Token::RParen)?;
                (SelectTarget::Func(func), arg)
            }
            other => return Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        };

        self.expect(&Token::From)?;
        let ts_name = self.expect_ident()?;

        let range = if self.eat(&Token::Between) {
            let start = self.parse_timeunit()?;
            self.expect(&Token::And)?;
            let end = self.parse_timeunit()?;
            Some((start, end))
        } else {
            None
        };

        let filter = if self.eat(&Token::Where) { Some(self.parse_where_clause()?) } else { None };

        let sample_by = if self.eat(&Token::Sample) {
            self.expect(&Token::By)?;
            Some(self.parse_timeunit()?)
        } else {
            None
        };

        let limit = if self.eat(&Token::Limit) {
            match self.advance() {
                Token::Number(n) => Some(n as i64),
                other => return Err(QueryError::UnexpectedToken(format!("{:?}", other))),
            }
        } else {
            None
        };

        Ok(Statement::Select(SelectStmt { target, func_arg, ts_name, range, filter, sample_by, limit }))
    }

    fn parse_where_clause(&mut self) -> Result<WhereClause, QueryError> {
        let key = self.expect_ident()?;
        let comparator = match self.advance() {
            Token::Eq => Comparator::Eq,
            Token::NotEq => Comparator::NotEq,
            Token::GreaterEq => Comparator::GreaterEq,
            Token::Greater => Comparator::Greater,
            Token::LessEq => Comparator::LessEq,
            Token::Less => Comparator::Less,
            other => return Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        };
        let value = self.parse_signed_number()?;

        let next = if self.eat(&Token::And) {
            Some((BooleanOp::And, Box::new(self.parse_where_clause()?)))
        } else {
            None
        };

        Ok(WhereClause { key, comparator, value, next })
    }

    fn parse_timeunit(&mut self) -> Result<Timeunit, QueryError> {
        let mut left = self.parse_timeunit_primary()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                Token::Star => BinOp::Mul,
                _ => break,
            };
            self.advance();
            let right = self.parse_timeunit_primary()?;
            left = Timeunit::BinaryOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_timeunit_primary(&mut self) -> Result<Timeunit, QueryError> {
        match self.advance() {
            Token::Number(n) => Ok(Timeunit::Integer(n as i64)),
            Token::String(s) => Ok(Timeunit::Date(s)),
            Token::Timespan(ns) => Ok(Timeunit::Timespan(ns)),
            Token::Func(Function::Now) => {
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                Ok(Timeunit::Now)
            }
            other => Err(QueryError::UnexpectedToken(format!("{:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_createdb_and_use() {
        assert_eq!(Parser::parse("CREATEDB metrics").unwrap(), Statement::CreateDb("metrics".to_string()));
        assert_eq!(Parser::parse("USE metrics").unwrap(), Statement::Use("metrics".to_string()));
    }

    #[test]
    fn parses_meta_commands() {
        assert_eq!(Parser::parse(".databases").unwrap(), Statement::Meta(MetaCommand::Databases));
        assert_eq!(Parser::parse(".timeseries").unwrap(), Statement::Meta(MetaCommand::Timeseries));
    }

    #[test]
    fn parses_simple_insert() {
        let stmt = Parser::parse("INSERT INTO cpu_usage VALUES (1643673600, 78.5)").unwrap();
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.ts_name, "cpu_usage");
                assert_eq!(insert.records, vec![(Some(Timeunit::Integer(1643673600)), 78.5)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_multi_value_insert_with_now_and_star() {
        let stmt = Parser::parse(
            "INSERT INTO cpu_usage VALUES (now(), 78.5), (*, 80.2)",
        ).unwrap();
        match stmt {
            Statement::Insert(insert) => assert_eq!(insert.records.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_implicit_value_insert() {
        let stmt = Parser::parse("INSERT INTO cpu_usage VALUE 78.5").unwrap();
        match stmt {
            Statement::Insert(insert) => assert_eq!(insert.records, vec![(None, 78.5)]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_select_with_full_clause_set() {
        let stmt = Parser::parse(
            "SELECT avg(value) FROM cpu_usage BETWEEN now() - 24h AND now() WHERE value > 10 SAMPLE BY 1h LIMIT 100",
        ).unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.ts_name, "cpu_usage");
                assert!(select.range.is_some());
                assert!(select.filter.is_some());
                assert!(select.sample_by.is_some());
                assert_eq!(select.limit, Some(100));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_earliest_with_count_argument() {
        let stmt = Parser::parse("SELECT earliest(value, 10) FROM cpu_usage").unwrap();
        match stmt {
            Statement::Select(select) => assert_eq!(select.func_arg, Some(10)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_delete_series_and_database() {
        assert_eq!(
            Parser::parse("DELETE cpu_usage").unwrap(),
            Statement::Delete(DeleteStmt { ts_name: "cpu_usage".to_string(), db_name: None })
        );
        assert_eq!(
            Parser::parse("DELETE cpu_usage FROM metrics").unwrap(),
            Statement::Delete(DeleteStmt { ts_name: "cpu_usage".to_string(), db_name: Some("metrics".to_string()) })
        );
    }
}
