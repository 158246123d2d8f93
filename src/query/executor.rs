use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDateTime;

use storage::{DatabaseContext, Record, SeriesOptions};

use crate::codec::{DataPoint, Response};

use super::ast::*;
use super::error::QueryError;

/// Applies an already-routed write to its owning shard's storage, and
/// separately keeps the local Raft replica group's log moving. Implemented
/// by the server's replica glue; kept abstract here so the executor does not
/// need to know about cluster routing or Raft at all.
pub trait WriteSink {
    fn submit_insert(&self, ts_name: &str, timestamp_ns: u64, value: f64) -> Result<(), QueryError>;
}

pub struct Executor<W: WriteSink> {
    db: Arc<Mutex<DatabaseContext>>,
    write_sink: W,
}

impl<W: WriteSink> Executor<W> {
    pub fn new(db: Arc<Mutex<DatabaseContext>>, write_sink: W) -> Self {
        Executor { db, write_sink }
    }

    pub fn execute(&self, statement: Statement) -> Result<Response, QueryError> {
        match statement {
            Statement::Use(name) => self.exec_use(&name),
            Statement::Meta(meta) => self.exec_meta(meta),
            Statement::CreateDb(name) => self.exec_createdb(&name),
            Statement::Create(stmt) => self.exec_create(stmt),
            Statement::Delete(stmt) => self.exec_delete(stmt),
            Statement::Insert(stmt) => self.exec_insert(stmt),
            Statement::Select(stmt) => self.exec_select(stmt),
        }
    }

    fn exec_use(&self, name: &str) -> Result<Response, QueryError> {
        self.db.lock().unwrap().use_database(name)?;
        Ok(Response::ok())
    }

    fn exec_meta(&self, meta: MetaCommand) -> Result<Response, QueryError> {
        let db = self.db.lock().unwrap();
        let names = match meta {
            MetaCommand::Databases => db.database_names(),
            MetaCommand::Timeseries => db.active()?.series_names(),
        };
        Ok(Response::string(names.join(" ")))
    }

    fn exec_createdb(&self, name: &str) -> Result<Response, QueryError> {
        self.db.lock().unwrap().create_database(name)?;
        Ok(Response::ok())
    }

    fn exec_create(&self, stmt: CreateStmt) -> Result<Response, QueryError> {
        let mut options = SeriesOptions::default();
        if let Some(retention) = stmt.retention {
            let seconds = self.resolve_timeunit_seconds(&retention)?;
            options.retention = Some(std::time::Duration::from_secs(seconds.max(0) as u64));
        }
        if let Some(policy) = stmt.duplication {
            options.duplication_policy = match policy {
                DuplicationPolicy::Ignore => storage::DuplicationPolicy::Ignore,
                DuplicationPolicy::Insert => storage::DuplicationPolicy::Insert,
            };
        }
        self.db.lock().unwrap().active_mut()?.create_series(&stmt.ts_name, options)?;
        Ok(Response::ok())
    }

    fn exec_delete(&self, stmt: DeleteStmt) -> Result<Response, QueryError> {
        let mut db = self.db.lock().unwrap();
        match stmt.db_name {
            Some(db_name) => db.drop_database(&db_name)?,
            None => db.active_mut()?.drop_series(&stmt.ts_name)?,
        }
        Ok(Response::ok())
    }

    fn exec_insert(&self, stmt: InsertStmt) -> Result<Response, QueryError> {
        for (timeunit, value) in stmt.records {
            let timestamp_ns = match timeunit {
                Some(tu) => (self.resolve_timeunit_seconds(&tu)? as u64) * 1_000_000_000,
                None => now_ns(),
            };
            self.write_sink.submit_insert(&stmt.ts_name, timestamp_ns, value)?;
        }
        Ok(Response::ok())
    }

    fn exec_select(&self, stmt: SelectStmt) -> Result<Response, QueryError> {
        if stmt.sample_by.is_some() {
            return Err(QueryError::Unsupported("SAMPLE BY downsampling is not implemented".to_string()));
        }

        let db = self.db.lock().unwrap();
        let series = db.active()?.series(&stmt.ts_name)?;

        let mut records = match stmt.range {
            Some((start, end)) => {
                let t0 = (self.resolve_timeunit_seconds(&start)? as u64) * 1_000_000_000;
                let t1 = (self.resolve_timeunit_seconds(&end)? as u64) * 1_000_000_000;
                series.range(t0, t1)?
            }
            None => series.scan()?,
        };

        if let Some(filter) = &stmt.filter {
            records.retain(|r| evaluate_filter(filter, r.value));
        }

        let records = match stmt.target {
            SelectTarget::Value => records,
            SelectTarget::Func(func) => apply_function(func, stmt.func_arg, records),
        };

        let records = match stmt.limit {
            Some(limit) if limit >= 0 => records.into_iter().take(limit as usize).collect(),
            _ => records,
        };

        Ok(Response::Array(
            records
                .into_iter()
                .map(|r| DataPoint { timestamp_ns: r.timestamp_ns, value: r.value })
                .collect(),
        ))
    }

    /// Resolves a [`Timeunit`] to epoch seconds: dates via
    /// `YYYY-MM-DD[ HH:MM:SS]` parsing, timespans via their nanosecond value
    /// divided down, `now()` via the wall clock, binary ops recursively.
    fn resolve_timeunit_seconds(&self, tu: &Timeunit) -> Result<i64, QueryError> {
        match tu {
            Timeunit::Integer(n) => Ok(*n),
            Timeunit::Timespan(ns) => Ok(ns / 1_000_000_000),
            Timeunit::Now => Ok((now_ns() / 1_000_000_000) as i64),
            Timeunit::Date(s) => parse_date(s),
            Timeunit::BinaryOp(left, op, right) => {
                let l = self.resolve_timeunit_seconds(left)?;
                let r = self.resolve_timeunit_seconds(right)?;
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                })
            }
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
}

fn parse_date(s: &str) -> Result<i64, QueryError> {
    let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.timestamp());
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, format) {
            return Ok(date.and_hms(0, 0, 0).timestamp());
        }
    }
    Err(QueryError::InvalidDate(s.to_string()))
}

fn evaluate_filter(filter: &WhereClause, value: f64) -> bool {
    let this = compare(value, filter.comparator, filter.value);
    match &filter.next {
        Some((BooleanOp::And, next)) => this && evaluate_filter(next, value),
        None => this,
    }
}

fn compare(value: f64, comparator: Comparator, target: f64) -> bool {
    match comparator {
        Comparator::Eq => (value - target).abs() < f64::EPSILON,
        Comparator::NotEq => (value - target).abs() >= f64::EPSILON,
        Comparator::GreaterEq => value >= target,
        Comparator::Greater => value > target,
        Comparator::LessEq => value <= target,
        Comparator::Less => value < target,
    }
}

use crate::query::token::Function;

fn apply_function(func: Function, arg: Option<i64>, mut records: Vec<Record>) -> Vec<Record> {
    match func {
        Function::Avg => {
            if records.is_empty() {
                return records;
            }
            let sum: f64 = records.iter().map(|r| r.value).sum();
            let last_ts = records.last().unwrap().timestamp_ns;
            vec![Record::new(last_ts, sum / records.len() as f64)]
        }
        Function::Min => records
            .iter()
            .copied()
            .min_by(|a, b| a.value.partial_cmp(&b.value).unwrap())
            .into_iter()
            .collect(),
        Function::Max => records
            .iter()
            .copied()
            .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap())
            .into_iter()
            .collect(),
        Function::Latest => {
            let n = arg.unwrap_or(1).max(0) as usize;
            records.split_off(records.len().saturating_sub(n))
        }
        Function::Earliest => {
            let n = arg.unwrap_or(1).max(0) as usize;
            records.truncate(n);
            records
        }
        Function::Now => records,
    }
}
