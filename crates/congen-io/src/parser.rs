use std::collections::{HashMap, HashSet};
use std::path::Path;

use congen_core::{LinearProgram, ProblemError};
use thiserror::Error;
use tracing::debug;

use crate::error::IoError;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token on line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("Unsupported section {name} on line {line}")]
    UnknownSection { name: String, line: usize },
    #[error("Missing {0} section")]
    MissingSection(&'static str),
    #[error("Row {row} on line {line} has type {kind}; only equality rows (E) are supported")]
    NonEqualityRow { row: String, kind: String, line: usize },
    #[error("Row {row} on line {line} was never declared in ROWS")]
    UnknownRow { row: String, line: usize },
    #[error("Column {column} on line {line} was never declared in COLUMNS")]
    UnknownColumn { column: String, line: usize },
    #[error("Row {row} on line {line} is declared twice")]
    DuplicateRow { row: String, line: usize },
    #[error("Coefficient of column {column} in row {row} on line {line} is given twice")]
    DuplicateEntry { row: String, column: String, line: usize },
    #[error("Right-hand side of row {row} on line {line} is given twice")]
    DuplicateRhs { row: String, line: usize },
    #[error("Bound type {kind} on line {line} is not supported; only BV is")]
    UnsupportedBound { kind: String, line: usize },
    #[error("Invalid number {text:?} on line {line}")]
    InvalidNumber { text: String, line: usize },
    #[error("Missing ENDATA marker")]
    MissingEndMarker,
    #[error("No objective (N) row declared")]
    NoObjective,
    #[error(transparent)]
    Problem(#[from] ProblemError),
}

/// A parsed MPS instance with its original row and column names
#[derive(Debug, Clone)]
pub struct MpsModel {
    pub name: Option<String>,
    /// Constraint row names in declaration order
    pub row_names: Vec<String>,
    /// Column names in order of first appearance
    pub column_names: Vec<String>,
    pub program: LinearProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Name,
    Rows,
    Columns,
    Rhs,
    Bounds,
}

enum RowRef {
    Objective,
    Constraint(usize),
    /// Additional N rows carry no information for the program
    Free,
}

#[derive(Default)]
struct Builder {
    name: Option<String>,
    objective: Option<String>,
    free_rows: HashSet<String>,
    rows: Vec<String>,
    row_index: HashMap<String, usize>,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    entries: HashMap<(usize, usize), f64>,
    costs: Vec<f64>,
    costed: HashSet<usize>,
    rhs: Vec<f64>,
    rhs_set: HashSet<usize>,
    seen_rows: bool,
    seen_columns: bool,
}

impl Builder {
    fn row(&self, name: &str, line: usize) -> Result<RowRef, ParseError> {
        if self.objective.as_deref() == Some(name) {
            return Ok(RowRef::Objective);
        }
        if let Some(&i) = self.row_index.get(name) {
            return Ok(RowRef::Constraint(i));
        }
        if self.free_rows.contains(name) {
            return Ok(RowRef::Free);
        }
        Err(ParseError::UnknownRow {
            row: name.to_string(),
            line,
        })
    }

    fn column(&mut self, name: &str) -> usize {
        if let Some(&j) = self.column_index.get(name) {
            return j;
        }
        let j = self.columns.len();
        self.columns.push(name.to_string());
        self.column_index.insert(name.to_string(), j);
        self.costs.push(0.0);
        j
    }

    fn build(self) -> Result<MpsModel, ParseError> {
        if !self.seen_rows {
            return Err(ParseError::MissingSection("ROWS"));
        }
        if !self.seen_columns {
            return Err(ParseError::MissingSection("COLUMNS"));
        }
        if self.objective.is_none() {
            return Err(ParseError::NoObjective);
        }

        let m = self.rows.len();
        let n = self.columns.len();
        let mut a = vec![vec![0.0; n]; m];
        for (&(i, j), &value) in &self.entries {
            a[i][j] = value;
        }
        debug!(constraints = m, variables = n, nonzeros = self.entries.len(), "parsed MPS instance");

        let program = LinearProgram::new(a, self.rhs, self.costs)?;
        Ok(MpsModel {
            name: self.name,
            row_names: self.rows,
            column_names: self.columns,
            program,
        })
    }
}

fn parse_number(token: &Token) -> Result<f64, ParseError> {
    match token.text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber {
            text: token.text.clone(),
            line: token.line,
        }),
    }
}

fn unexpected(expected: &str, line: &[Token]) -> ParseError {
    let found = line
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    ParseError::UnexpectedToken {
        expected: expected.to_string(),
        found: if found.is_empty() { "empty line".to_string() } else { found },
        line: line.first().map(|t| t.line).unwrap_or(0),
    }
}

/// Reader for free-format MPS files describing `min cᵀx s.t. Ax = b, x binary`
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<MpsModel, ParseError> {
        let tokens = Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_model()
    }

    /// Fields of the next non-empty line, comments dropped; `None` at end of input
    fn next_line(&mut self) -> Option<Vec<Token>> {
        loop {
            let mut line = Vec::new();
            loop {
                let token = self.tokens.get(self.pos)?.clone();
                self.pos += 1;
                match token.kind {
                    TokenKind::Newline => break,
                    TokenKind::Eof => {
                        // Stay on Eof so the next call returns None
                        self.pos -= 1;
                        break;
                    }
                    TokenKind::Comment => {}
                    _ => line.push(token),
                }
            }
            if !line.is_empty() {
                return Some(line);
            }
            if self.tokens.get(self.pos).map(|t| t.kind) == Some(TokenKind::Eof) {
                return None;
            }
        }
    }

    fn parse_model(&mut self) -> Result<MpsModel, ParseError> {
        let mut builder = Builder::default();
        let mut section = Section::Start;

        while let Some(line) = self.next_line() {
            let head = &line[0];

            if head.kind.is_section() {
                section = match head.kind {
                    TokenKind::Name => {
                        builder.name = line.get(1).map(|t| t.text.clone());
                        Section::Name
                    }
                    TokenKind::Rows => {
                        builder.seen_rows = true;
                        Section::Rows
                    }
                    TokenKind::Columns => {
                        if !builder.seen_rows {
                            return Err(ParseError::MissingSection("ROWS"));
                        }
                        builder.seen_columns = true;
                        Section::Columns
                    }
                    TokenKind::Rhs => Section::Rhs,
                    TokenKind::Bounds => Section::Bounds,
                    TokenKind::Endata => return builder.build(),
                    _ => {
                        return Err(ParseError::UnknownSection {
                            name: head.text.clone(),
                            line: head.line,
                        });
                    }
                };
                continue;
            }

            // A lone word in the first column can only be a section header
            if head.leading && line.len() == 1 {
                return Err(ParseError::UnknownSection {
                    name: head.text.clone(),
                    line: head.line,
                });
            }

            match section {
                Section::Start | Section::Name => return Err(unexpected("section header", &line)),
                Section::Rows => self.parse_row(&mut builder, &line)?,
                Section::Columns => self.parse_column(&mut builder, &line)?,
                Section::Rhs => self.parse_rhs(&mut builder, &line)?,
                Section::Bounds => self.parse_bound(&builder, &line)?,
            }
        }

        Err(ParseError::MissingEndMarker)
    }

    fn parse_row(&self, builder: &mut Builder, line: &[Token]) -> Result<(), ParseError> {
        let [kind, name] = line else {
            return Err(unexpected("row type and row name", line));
        };
        let declared = builder.objective.as_deref() == Some(name.text.as_str())
            || builder.row_index.contains_key(&name.text)
            || builder.free_rows.contains(&name.text);
        if declared {
            return Err(ParseError::DuplicateRow {
                row: name.text.clone(),
                line: name.line,
            });
        }

        match kind.text.as_str() {
            "N" if builder.objective.is_none() => builder.objective = Some(name.text.clone()),
            "N" => {
                builder.free_rows.insert(name.text.clone());
            }
            "E" => {
                builder.row_index.insert(name.text.clone(), builder.rows.len());
                builder.rows.push(name.text.clone());
                builder.rhs.push(0.0);
            }
            "L" | "G" => {
                return Err(ParseError::NonEqualityRow {
                    row: name.text.clone(),
                    kind: kind.text.clone(),
                    line: kind.line,
                });
            }
            _ => return Err(unexpected("row type N, E, L or G", line)),
        }
        Ok(())
    }

    fn parse_column(&self, builder: &mut Builder, line: &[Token]) -> Result<(), ParseError> {
        // Integer markers are redundant for binary programs
        if line.get(1).is_some_and(|t| t.text == "'MARKER'") {
            return Ok(());
        }
        if line.len() < 3 || line.len() % 2 == 0 {
            return Err(unexpected("column name followed by row/value pairs", line));
        }

        let j = builder.column(&line[0].text);
        for pair in line[1..].chunks(2) {
            let value = parse_number(&pair[1])?;
            let first = match builder.row(&pair[0].text, pair[0].line)? {
                RowRef::Objective => {
                    builder.costs[j] = value;
                    builder.costed.insert(j)
                }
                RowRef::Constraint(i) => builder.entries.insert((i, j), value).is_none(),
                RowRef::Free => true,
            };
            if !first {
                return Err(ParseError::DuplicateEntry {
                    row: pair[0].text.clone(),
                    column: line[0].text.clone(),
                    line: pair[0].line,
                });
            }
        }
        Ok(())
    }

    fn parse_rhs(&self, builder: &mut Builder, line: &[Token]) -> Result<(), ParseError> {
        // The RHS set name is optional
        let pairs = if line.len() % 2 == 1 { &line[1..] } else { line };
        if pairs.is_empty() {
            return Err(unexpected("row/value pairs", line));
        }

        for pair in pairs.chunks(2) {
            let value = parse_number(&pair[1])?;
            if let RowRef::Constraint(i) = builder.row(&pair[0].text, pair[0].line)? {
                if !builder.rhs_set.insert(i) {
                    return Err(ParseError::DuplicateRhs {
                        row: pair[0].text.clone(),
                        line: pair[0].line,
                    });
                }
                builder.rhs[i] = value;
            }
        }
        Ok(())
    }

    fn parse_bound(&self, builder: &Builder, line: &[Token]) -> Result<(), ParseError> {
        let (kind, column) = match line {
            [kind, _set, column] => (kind, column),
            [kind, column] => (kind, column),
            _ => return Err(unexpected("bound type, bound set and column", line)),
        };
        if kind.text != "BV" {
            return Err(ParseError::UnsupportedBound {
                kind: kind.text.clone(),
                line: kind.line,
            });
        }
        if !builder.column_index.contains_key(&column.text) {
            return Err(ParseError::UnknownColumn {
                column: column.text.clone(),
                line: column.line,
            });
        }
        Ok(())
    }
}

/// Read and parse an MPS file
pub fn read_mps(path: &Path) -> Result<MpsModel, IoError> {
    let source = std::fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Parser::parse(&source).map_err(|source| IoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
