//! A1 地址
//!
//! 行列均为 **1-based**，与表格界面一致：`row = 1` 是第 1 行，`col = 1` 是 `A` 列。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 表格支持的最大列数（`ZZZ`）
pub const MAX_COLUMNS: u32 = 18_278;

/// 单元格地址
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// 转成 A1 表示（如 `E12`）
    pub fn to_a1(self) -> String {
        format!("{}{}", column_to_letters(self.col), self.row)
    }

    /// 解析 A1 单元格引用，接受 `$` 绝对引用标记
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col = letters_to_column(&s[col_start..idx])?;

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }
        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let row: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row == 0 {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// 矩形区域（闭区间，构造时自动规范化）
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct A1Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl A1Range {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// 从左上角和行列数构造
    pub fn from_origin(origin: CellRef, rows: u32, cols: u32) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self::new(
            origin,
            CellRef::new(origin.row + rows - 1, origin.col + cols - 1),
        )
    }

    pub fn single(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }

    /// 解析 `A2:A17` 或单个单元格 `C3`
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        match s.split_once(':') {
            None => CellRef::from_a1(s).map(Self::single),
            Some((a, b)) => Ok(Self::new(CellRef::from_a1(a)?, CellRef::from_a1(b)?)),
        }
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// A1 解析错误
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column letter")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// 列号（1-based）转列字母
pub fn column_to_letters(col: u32) -> String {
    let mut n = col;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// 列字母转列号（1-based），大小写不敏感
pub fn letters_to_column(s: &str) -> Result<u32, A1ParseError> {
    if s.is_empty() {
        return Err(A1ParseError::MissingColumn);
    }
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col > MAX_COLUMNS {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col)
}
