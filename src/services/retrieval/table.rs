//! Tabular Output Parsing
//!
//! Retrieval output ends with a pipe-separated table block:
//!
//! ```text
//! Found 2 rows.
//!
//! pond | fcr
//! --- | ---
//! F1 | 1.32
//! F2 | 1.41
//! ```

use serde::{Deserialize, Serialize};

use agent_m_core::ERROR_MARKER;

const NO_ROWS_MARKER: &str = "(no rows returned)";
const CELL_SEPARATOR: &str = " | ";

/// Columns and rows recovered from a retrieval output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(CELL_SEPARATOR)
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Parse the last blank-line-separated block as a table.
///
/// The first line is the header and the second a separator; rows whose width
/// differs from the header are skipped.
pub fn parse_table(output: &str) -> ParsedTable {
    if output.contains(NO_ROWS_MARKER) {
        return ParsedTable::default();
    }

    let blocks: Vec<&str> = output.split("\n\n").collect();
    if blocks.len() < 2 {
        return ParsedTable::default();
    }
    let table_block = blocks[blocks.len() - 1].trim();
    if table_block.is_empty() || table_block.starts_with(ERROR_MARKER) {
        return ParsedTable::default();
    }

    let lines: Vec<&str> = table_block
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return ParsedTable::default();
    }

    let columns = split_cells(lines[0]);
    let rows = lines[2..]
        .iter()
        .map(|line| split_cells(line))
        .filter(|row| row.len() == columns.len())
        .collect();

    ParsedTable { columns, rows }
}
