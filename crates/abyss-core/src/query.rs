//! Constrained queries over the fused table
//!
//! Queries can only filter, sort and limit existing columns, and always
//! answer with `(row, col)` records:
//!
//! ```text
//! where depth_m > 2000 and biome = "trench" sort sum(resource_economic_value) desc limit 5
//! where count(hazard_type) = 0 and life_species contains "eel"
//! ```
//!
//! Functions reduce list columns: `sum`, `count`, `min`, `max`, `mean`.
//! Comparisons against absent values never match.

use crate::table::{CellKey, CellValue, Table};
use log::warn;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors reported back to whoever issued the query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("syntax error at token {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' holds lists; reduce it with sum/count/min/max/mean or use 'contains'")]
    ListComparison(String),

    /// The result is not a list of records carrying `row` and `col`
    #[error("result must be a list of records with 'row' and 'col': {0}")]
    ResultShape(String),
}

/// List reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sum,
    Count,
    Min,
    Max,
    Mean,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Func::Sum),
            "count" => Some(Func::Count),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "mean" => Some(Func::Mean),
            _ => None,
        }
    }
}

/// A column, optionally reduced by a function
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub func: Option<Func>,
    pub column: String,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

/// Literal right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expr: Expr,
    pub op: CmpOp,
    pub literal: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub descending: bool,
}

/// A parsed query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filters: Vec<Condition>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
}

/// One matching cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub row: i64,
    pub col: i64,
    /// Value of the sort expression, when sorting
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<serde_json::Value>,
}

/// Value of an expression for one row
#[derive(Debug, Clone, PartialEq)]
enum Eval<'a> {
    Number(f64),
    Text(&'a str),
    List(&'a [CellValue]),
}

impl Query {
    /// Parse query text
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(text)?;
        let mut parser = QueryParser { tokens, pos: 0 };
        parser.parse_query()
    }

    /// Check that every referenced column exists
    pub fn validate(&self, table: &Table) -> Result<(), QueryError> {
        let exprs = self
            .filters
            .iter()
            .map(|c| &c.expr)
            .chain(self.sort.iter().map(|s| &s.expr));
        for expr in exprs {
            if table.find_column(&expr.column).is_none() {
                return Err(QueryError::UnknownColumn(expr.column.clone()));
            }
        }
        Ok(())
    }

    /// Run the query. Rows keep base order unless sorted; ties keep base order.
    pub fn execute(&self, table: &Table) -> Result<Vec<QueryHit>, QueryError> {
        self.validate(table)?;

        let mut selected: Vec<(CellKey, Option<Eval>)> = Vec::new();
        'rows: for row in &table.rows {
            let key = row.key.ok_or_else(|| {
                QueryError::ResultShape("table has a row without a (row, col) key".to_string())
            })?;
            for condition in &self.filters {
                let value = evaluate(table, row, &condition.expr);
                if !matches(value.as_ref(), condition)? {
                    continue 'rows;
                }
            }
            let sort_value = self.sort.as_ref().and_then(|s| evaluate(table, row, &s.expr));
            selected.push((key, sort_value));
        }

        if let Some(sort) = &self.sort {
            selected.sort_by(|(_, a), (_, b)| compare_for_sort(a.as_ref(), b.as_ref(), sort.descending));
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        let sorting = self.sort.is_some();
        Ok(selected
            .into_iter()
            .map(|(key, value)| QueryHit {
                row: key.row,
                col: key.col,
                value: if sorting {
                    Some(value.map(eval_to_json).unwrap_or(serde_json::Value::Null))
                } else {
                    None
                },
            })
            .collect())
    }
}

/// Validate a highlight request: a JSON list of `{row, col}` records.
///
/// Entries missing either key are skipped with a warning; if none remain the
/// request is rejected.
pub fn validate_tiles(tiles: &serde_json::Value) -> Result<Vec<CellKey>, QueryError> {
    let items = tiles.as_array().ok_or_else(|| {
        QueryError::ResultShape(format!("expected a list, got {}", json_kind(tiles)))
    })?;

    let mut valid = Vec::new();
    for item in items {
        let coordinate = |name: &str| {
            item.get(name).and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
        };
        match (coordinate("row"), coordinate("col")) {
            (Some(row), Some(col)) => valid.push(CellKey::new(row, col)),
            _ => warn!("Skipping invalid tile (missing row or col): {}", item),
        }
    }

    if valid.is_empty() {
        return Err(QueryError::ResultShape(
            "no valid tiles provided; each tile needs both 'row' and 'col'".to_string(),
        ));
    }
    Ok(valid)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

fn evaluate<'a>(table: &Table, row: &'a crate::table::Row, expr: &Expr) -> Option<Eval<'a>> {
    let value = table.column_index(&expr.column).and_then(|idx| row.get(idx))?;

    match expr.func {
        None => match value {
            CellValue::Integer(i) => Some(Eval::Number(*i as f64)),
            CellValue::Float(f) => Some(Eval::Number(*f)),
            CellValue::String(s) => Some(Eval::Text(s)),
            CellValue::List(items) => Some(Eval::List(items)),
            CellValue::Empty => None,
        },
        Some(Func::Count) => Some(Eval::Number(match value {
            CellValue::List(items) => items.len() as f64,
            CellValue::Empty => 0.0,
            _ => 1.0,
        })),
        Some(func) => {
            let numbers: Vec<f64> = match value {
                CellValue::List(items) => items.iter().filter_map(CellValue::as_f64).collect(),
                other => other.as_f64().into_iter().collect(),
            };
            reduce(func, &numbers).map(Eval::Number)
        }
    }
}

fn reduce(func: Func, numbers: &[f64]) -> Option<f64> {
    match func {
        Func::Sum => Some(numbers.iter().sum()),
        Func::Count => Some(numbers.len() as f64),
        Func::Min => numbers.iter().copied().reduce(f64::min),
        Func::Max => numbers.iter().copied().reduce(f64::max),
        Func::Mean => {
            if numbers.is_empty() {
                None
            } else {
                Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
    }
}

fn matches(value: Option<&Eval>, condition: &Condition) -> Result<bool, QueryError> {
    let Some(value) = value else {
        return Ok(false);
    };

    Ok(match (value, &condition.literal) {
        (Eval::List(items), literal) => {
            if condition.op != CmpOp::Contains {
                return Err(QueryError::ListComparison(condition.expr.column.clone()));
            }
            items.iter().any(|item| match (item, literal) {
                (CellValue::String(s), Literal::Text(t)) => s == t,
                (item, Literal::Number(n)) => item.as_f64() == Some(*n),
                _ => false,
            })
        }
        (Eval::Number(v), Literal::Number(n)) => compare(v.partial_cmp(n), condition.op),
        (Eval::Text(s), Literal::Text(t)) => match condition.op {
            CmpOp::Contains => s.contains(t.as_str()),
            op => compare(Some((*s).cmp(t.as_str())), op),
        },
        _ => false,
    })
}

fn compare(ordering: Option<Ordering>, op: CmpOp) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Contains => false,
    }
}

/// Absent values sort last in both directions
fn compare_for_sort(a: Option<&Eval>, b: Option<&Eval>, descending: bool) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };
    let ordering = match (a, b) {
        (Eval::Number(x), Eval::Number(y)) => x.total_cmp(y),
        (Eval::Text(x), Eval::Text(y)) => x.cmp(y),
        (Eval::List(x), Eval::List(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    };
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn rank(value: &Eval) -> u8 {
    match value {
        Eval::Number(_) => 0,
        Eval::Text(_) => 1,
        Eval::List(_) => 2,
    }
}

fn eval_to_json(value: Eval) -> serde_json::Value {
    match value {
        Eval::Number(n) => CellValue::Float(n).to_json(),
        Eval::Text(s) => serde_json::Value::String(s.to_string()),
        Eval::List(items) => CellValue::List(items.to_vec()).to_json(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Text(String),
    Op(CmpOp),
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, QueryError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |position: usize, message: String| QueryError::Syntax { position, message };

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != c {
                s.push(chars[i]);
                i += 1;
            }
            if i == chars.len() {
                return Err(syntax(tokens.len(), format!("unterminated string starting at {}", start)));
            }
            i += 1;
            tokens.push(Token::Text(s));
        } else if matches!(c, '=' | '!' | '<' | '>') {
            let next = chars.get(i + 1).copied();
            let (op, width) = match (c, next) {
                ('=', Some('=')) => (CmpOp::Eq, 2),
                ('=', _) => (CmpOp::Eq, 1),
                ('!', Some('=')) => (CmpOp::Ne, 2),
                ('<', Some('=')) => (CmpOp::Le, 2),
                ('<', _) => (CmpOp::Lt, 1),
                ('>', Some('=')) => (CmpOp::Ge, 2),
                ('>', _) => (CmpOp::Gt, 1),
                _ => return Err(syntax(tokens.len(), format!("unexpected '{}'", c))),
            };
            tokens.push(Token::Op(op));
            i += width;
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() {
                let exponent_sign = matches!(chars[i], '+' | '-') && matches!(chars[i - 1], 'e' | 'E');
                if !(chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E') || exponent_sign) {
                    break;
                }
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let number = literal
                .parse::<f64>()
                .map_err(|_| syntax(tokens.len(), format!("invalid number '{}'", literal)))?;
            tokens.push(Token::Number(number));
        } else if c.is_alphanumeric() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word.eq_ignore_ascii_case("contains") {
                tokens.push(Token::Op(CmpOp::Contains));
            } else {
                tokens.push(Token::Word(word));
            }
        } else {
            return Err(syntax(tokens.len(), format!("unexpected '{}'", c)));
        }
    }

    Ok(tokens)
}

struct QueryParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl QueryParser {
    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        let mut query = Query::default();

        while let Some(token) = self.next() {
            let Token::Word(word) = token else {
                return Err(self.error("expected 'where', 'sort' or 'limit'"));
            };
            match word.to_ascii_lowercase().as_str() {
                "where" => {
                    query.filters.push(self.parse_condition()?);
                    while self.peek_keyword("and") {
                        self.pos += 1;
                        query.filters.push(self.parse_condition()?);
                    }
                }
                "sort" => {
                    if query.sort.is_some() {
                        return Err(self.error("only one sort clause is allowed"));
                    }
                    let expr = self.parse_expr()?;
                    let descending = if self.peek_keyword("desc") {
                        self.pos += 1;
                        true
                    } else {
                        if self.peek_keyword("asc") {
                            self.pos += 1;
                        }
                        false
                    };
                    query.sort = Some(SortKey { expr, descending });
                }
                "limit" => match self.next() {
                    Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                        query.limit = Some(n as usize);
                    }
                    _ => return Err(self.error("limit needs a non-negative whole number")),
                },
                other => return Err(self.error(format!("unexpected '{}'", other))),
            }
        }

        Ok(query)
    }

    fn parse_expr(&mut self) -> Result<Expr, QueryError> {
        let Some(Token::Word(name)) = self.next() else {
            return Err(self.error("expected a column name"));
        };

        if self.tokens.get(self.pos) != Some(&Token::LParen) {
            return Ok(Expr {
                func: None,
                column: name,
            });
        }

        let func = Func::from_name(&name)
            .ok_or_else(|| self.error(format!("unknown function '{}'", name)))?;
        self.pos += 1;
        let Some(Token::Word(column)) = self.next() else {
            return Err(self.error("expected a column name"));
        };
        if self.next() != Some(Token::RParen) {
            return Err(self.error("expected ')'"));
        }
        Ok(Expr {
            func: Some(func),
            column,
        })
    }

    fn parse_condition(&mut self) -> Result<Condition, QueryError> {
        let expr = self.parse_expr()?;
        let Some(Token::Op(op)) = self.next() else {
            return Err(self.error("expected a comparison operator"));
        };
        let literal = match self.next() {
            Some(Token::Number(n)) => Literal::Number(n),
            Some(Token::Text(s)) => Literal::Text(s),
            Some(Token::Word(w)) => Literal::Text(w),
            _ => return Err(self.error("expected a value")),
        };
        Ok(Condition { expr, op, literal })
    }
}
