use super::token::Function;

#[derive(Debug, Clone, PartialEq)]
pub enum Timeunit {
    /// A bare integer: epoch seconds, or a record count for `LIMIT`.
    Integer(i64),
    /// A quoted `YYYY-MM-DD[ HH:MM:SS]` date literal.
    Date(String),
    /// `now()`.
    Now,
    /// A timespan literal like `3d`, `250ms`, stored in nanoseconds.
    Timespan(i64),
    /// A binary expression combining two timeunits.
    BinaryOp(Box<Timeunit>, BinOp, Box<Timeunit>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    NotEq,
    GreaterEq,
    Greater,
    LessEq,
    Less,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub key: String,
    pub comparator: Comparator,
    pub value: f64,
    pub next: Option<(BooleanOp, Box<WhereClause>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationPolicy {
    Ignore,
    Insert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateStmt {
    pub ts_name: String,
    pub retention: Option<Timeunit>,
    pub duplication: Option<DuplicationPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub ts_name: String,
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub ts_name: String,
    /// `(timestamp, value)` pairs; a `None` timestamp means "now" (implicit
    /// or explicit `now()`/`VALUE v` auto-timestamp form).
    pub records: Vec<(Option<Timeunit>, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectTarget {
    Value,
    Func(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub target: SelectTarget,
    pub func_arg: Option<i64>,
    pub ts_name: String,
    pub range: Option<(Timeunit, Timeunit)>,
    pub filter: Option<WhereClause>,
    pub sample_by: Option<Timeunit>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Databases,
    Timeseries,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Use(String),
    Meta(MetaCommand),
    CreateDb(String),
    Create(CreateStmt),
    Delete(DeleteStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
}
