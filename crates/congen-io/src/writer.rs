use std::path::Path;

use congen_core::LinearProgram;

use crate::error::IoError;

/// Entries per COLUMNS/RHS line after the leading name field
const PAIRS_PER_LINE: usize = 2;

fn row_name(i: usize) -> String {
    format!("ELEM{}", i + 1)
}

fn column_name(j: usize) -> String {
    format!("X{}", j + 1)
}

fn push_pairs(out: &mut String, head: &str, pairs: &[(String, f64)]) {
    for chunk in pairs.chunks(PAIRS_PER_LINE) {
        out.push_str(&format!("    {:<10}", head));
        for (row, value) in chunk {
            out.push_str(&format!("{:<10}{:<12}", row, value));
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }
}

/// Render `program` in free-format MPS with rows `ELEM1..`, columns `X1..`
/// and objective row `COST`. Every column is declared binary.
pub fn to_mps_string(program: &LinearProgram, name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("NAME          {}\n", name));

    out.push_str("ROWS\n");
    out.push_str(" N  COST\n");
    for i in 0..program.num_constraints() {
        out.push_str(&format!(" E  {}\n", row_name(i)));
    }

    out.push_str("COLUMNS\n");
    for j in 0..program.num_variables() {
        let mut entries = Vec::new();
        if program.c()[j] != 0.0 {
            entries.push(("COST".to_string(), program.c()[j]));
        }
        for (i, row) in program.a().iter().enumerate() {
            if row[j] != 0.0 {
                entries.push((row_name(i), row[j]));
            }
        }
        // Keep empty columns declared so the variable count survives
        if entries.is_empty() {
            entries.push(("COST".to_string(), 0.0));
        }
        push_pairs(&mut out, &column_name(j), &entries);
    }

    out.push_str("RHS\n");
    let rhs: Vec<(String, f64)> = program
        .b()
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v != 0.0)
        .map(|(i, &v)| (row_name(i), v))
        .collect();
    push_pairs(&mut out, "RHS", &rhs);

    out.push_str("BOUNDS\n");
    for j in 0..program.num_variables() {
        out.push_str(&format!(" BV BND1      {}\n", column_name(j)));
    }

    out.push_str("ENDATA\n");
    out
}

/// Write `program` to `path` as MPS
pub fn write_mps(program: &LinearProgram, name: &str, path: &Path) -> Result<(), IoError> {
    std::fs::write(path, to_mps_string(program, name)).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
