//! Tabular text parsing for inspection command output.
//!
//! Two layouts are supported: whitespace-delimited tables whose header row
//! names the columns, and fixed-width tables sliced at character offsets.
//! In both, blank lines and dash-only separator lines are skipped.

use std::str::Lines;

use ptop_common::ParseFailure;

/// A named column of a whitespace-delimited table.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    /// Other header spellings accepted for this column.
    pub aliases: &'static [&'static str],
}

impl Column {
    pub const fn new(name: &'static str) -> Self {
        Self { name, aliases: &[] }
    }

    pub const fn with_aliases(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }

    fn matches(&self, header: &str) -> bool {
        self.name == header || self.aliases.contains(&header)
    }
}

/// A column of a fixed-width table, in character offsets. `end: None` takes
/// the rest of the line.
#[derive(Debug, Clone, Copy)]
pub struct FixedColumn {
    pub name: &'static str,
    pub start: usize,
    pub end: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub enum Layout {
    /// The last header column captures the remainder of each line.
    Whitespace(&'static [Column]),
    /// The first column's name must appear in the header row.
    Fixed(&'static [FixedColumn]),
}

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub layout: Layout,
}

impl TableSchema {
    fn column_index(&self, name: &str) -> Option<usize> {
        match self.layout {
            Layout::Whitespace(columns) => columns.iter().position(|c| c.name == name),
            Layout::Fixed(columns) => columns.iter().position(|c| c.name == name),
        }
    }
}

/// Validate the header of `text` against `schema` and return its data rows.
///
/// A header with no rows below it is an empty table, not a failure.
pub fn parse<'a>(text: &'a str, schema: &'a TableSchema) -> Result<Rows<'a>, ParseFailure> {
    let mut lines = text.lines();
    let header = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or(ParseFailure::MissingHeader { table: schema.name })?;

    let plan = match schema.layout {
        Layout::Whitespace(columns) => {
            let names: Vec<&str> = header.split_whitespace().collect();
            let mut positions = Vec::with_capacity(columns.len());
            for column in columns {
                let pos = names.iter().position(|h| column.matches(h)).ok_or(
                    ParseFailure::MissingColumn {
                        table: schema.name,
                        column: column.name,
                    },
                )?;
                positions.push(pos);
            }
            Plan::Whitespace {
                width: names.len(),
                positions,
            }
        }
        Layout::Fixed(columns) => {
            if let Some(first) = columns.first() {
                let found = slice_chars(header, first.start, first.end);
                if !found.eq_ignore_ascii_case(first.name) {
                    return Err(ParseFailure::HeaderMismatch {
                        table: schema.name,
                        expected: first.name,
                        found: found.to_string(),
                    });
                }
            }
            Plan::Fixed(columns)
        }
    };

    Ok(Rows {
        lines,
        plan,
        schema,
    })
}

#[derive(Debug)]
enum Plan {
    Whitespace {
        width: usize,
        /// Header position of each schema column.
        positions: Vec<usize>,
    },
    Fixed(&'static [FixedColumn]),
}

/// Lazily yields the data rows of a parsed table.
#[derive(Debug)]
pub struct Rows<'a> {
    lines: Lines<'a>,
    plan: Plan,
    schema: &'a TableSchema,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Row<'a>;

    fn next(&mut self) -> Option<Row<'a>> {
        let line = self.lines.by_ref().find(|line| !is_filler(line))?;
        let values = match &self.plan {
            Plan::Whitespace { width, positions } => {
                let fields = split_fields(line, *width);
                positions.iter().map(|&p| fields.get(p).copied()).collect()
            }
            Plan::Fixed(columns) => columns
                .iter()
                .map(|c| Some(slice_chars(line, c.start, c.end)))
                .collect(),
        };
        Some(Row {
            line,
            values,
            schema: self.schema,
        })
    }
}

/// One data row. Fields are looked up by schema column name.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    line: &'a str,
    values: Vec<Option<&'a str>>,
    schema: &'a TableSchema,
}

impl<'a> Row<'a> {
    /// `None` when the row is too short to reach the column.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.schema.column_index(column)?;
        self.values.get(index).copied().flatten()
    }

    /// Like [`Row::get`], with a missing field read as empty.
    pub fn text(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or_default()
    }

    pub fn line(&self) -> &'a str {
        self.line
    }
}

fn is_filler(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c == '-' || c.is_whitespace())
}

/// Split on whitespace into at most `width` fields; the last field keeps the
/// rest of the line, inner spaces included.
fn split_fields(line: &str, width: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(width);
    let mut rest = line.trim();
    while !rest.is_empty() && fields.len() + 1 < width {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}

fn byte_offset(line: &str, chars: usize) -> usize {
    line.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

fn slice_chars(line: &str, start: usize, end: Option<usize>) -> &str {
    let from = byte_offset(line, start);
    let to = end.map_or(line.len(), |end| byte_offset(line, end));
    if from >= to {
        ""
    } else {
        line[from..to].trim()
    }
}
