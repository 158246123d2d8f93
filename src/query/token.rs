#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    CreateDb,
    Create,
    Use,
    Delete,
    Insert,
    Into,
    Select,
    From,
    Between,
    And,
    Where,
    Sample,
    By,
    Limit,
    Value,
    Values,

    // Functions
    Func(Function),

    // Meta commands
    MetaDatabases,
    MetaTimeseries,

    // Literals
    Ident(String),
    Number(f64),
    String(String),
    Timespan(i64),

    // Operators
    Eq,
    NotEq,
    GreaterEq,
    Greater,
    LessEq,
    Less,
    Plus,
    Minus,
    Star,

    // Punctuation
    LParen,
    RParen,
    Comma,

    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Avg,
    Min,
    Max,
    Now,
    Latest,
    Earliest,
}

impl Function {
    pub fn from_ident(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "avg" => Some(Function::Avg),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "now" => Some(Function::Now),
            "latest" => Some(Function::Latest),
            "earliest" => Some(Function::Earliest),
            _ => None,
        }
    }
}
