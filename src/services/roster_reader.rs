//! 名单读取服务 - 业务能力层
//!
//! 从表格读出姓名列和小组列的原始单元格

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::spreadsheet::first_column;
use crate::infrastructure::Spreadsheet;
use crate::models::{letters_to_column, A1Range, CellValue, Student};
use crate::services::layout::{self, LayoutContext};
use crate::services::roster;

/// 一次名单读取的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSnapshot {
    pub names_range: A1Range,
    pub raw_names: Vec<CellValue>,
    pub raw_groups: Vec<CellValue>,
}

impl RosterSnapshot {
    /// 姓名范围第一行
    pub fn first_row(&self) -> u32 {
        self.names_range.start.row
    }

    /// 全部非空姓名，包括没有小组的
    pub fn students(&self) -> Vec<Student> {
        roster::normalize(&self.raw_names, &self.raw_groups)
    }

    /// 有小组的学生的布局
    pub fn layout(&self, eval_start_column: u32) -> LayoutContext {
        let grouped = roster::with_groups(self.students());
        layout::resolve(&grouped, &self.raw_names, self.first_row(), eval_start_column)
    }
}

pub fn parse_range(a1: &str, label: &str) -> AppResult<A1Range> {
    if a1.trim().is_empty() {
        return Err(AppError::validation(format!("{label} is required.")));
    }
    A1Range::from_a1(a1.trim())
        .map_err(|e| AppError::validation(format!("{label} '{a1}' is not valid A1 notation: {e}")))
}

/// 解析互评表起始列（只允许大写列字母）
pub fn parse_start_column(letters: &str) -> AppResult<u32> {
    let letters = letters.trim();
    if letters.is_empty() {
        return Err(AppError::validation(
            "Evaluation Table Starting Column is required.",
        ));
    }
    if !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation("Invalid column letter."));
    }
    letters_to_column(letters).map_err(|e| AppError::validation(e.to_string()))
}

/// 读姓名列和小组列
///
/// 两个范围都只取第一列，行数以各自范围为准。
pub async fn read_roster<S: Spreadsheet>(
    sheets: &S,
    sheet: &str,
    names_range: &str,
    group_names_range: &str,
) -> AppResult<RosterSnapshot> {
    let names_range = parse_range(names_range, "Names Range")?;
    let groups_range = parse_range(group_names_range, "Group Names Range")?;

    let names = sheets.read_range(sheet, names_range).await?;
    let groups = sheets.read_range(sheet, groups_range).await?;
    let snapshot = RosterSnapshot {
        names_range,
        raw_names: first_column(&names, names_range.height()),
        raw_groups: first_column(&groups, groups_range.height()),
    };
    debug!(
        "读取名单 {}!{}: {} 行",
        sheet,
        names_range,
        snapshot.raw_names.len()
    );
    Ok(snapshot)
}
