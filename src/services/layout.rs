//! 布局计算服务 - 业务能力层
//!
//! 由名单推导出小组、组内序号、姓名所在行，再算出互评表各列的位置。
//! 生成表单和处理提交时各算一次，结果必须完全一致，所以这里只有纯计算。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{column_to_letters, CellRef, CellValue, Group, Student};
use crate::services::roster;

/// 名单布局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutContext {
    /// 按首次出现的顺序
    pub groups: Vec<Group>,
    /// 姓名 → 组内序号（从 0 开始）
    pub index_in_group: BTreeMap<String, usize>,
    /// 姓名 → 表格行号
    pub row_by_name: BTreeMap<String, u32>,
    /// 最大组人数，至少为 1
    pub max_group_size: usize,
    pub eval_table_start_column: u32,
}

/// 计算布局
///
/// - `students`：已整理的学生，调用方负责过滤掉没有小组的
/// - `raw_names`：姓名范围的原始单元格，用于定位行号
/// - `names_start_row`：姓名范围第一行的行号
/// - `eval_start_column`：互评表起始列（从 1 开始）
///
/// 同名学生以最后一次出现为准：小组、组内序号和行号都取自这一次，
/// 前面的同名行不进入任何小组。
pub fn resolve(
    students: &[Student],
    raw_names: &[CellValue],
    names_start_row: u32,
    eval_start_column: u32,
) -> LayoutContext {
    let grouped: Vec<&Student> = students.iter().filter(|s| s.has_group()).collect();
    let last_seen: BTreeMap<&str, usize> = grouped
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut groups: Vec<Group> = Vec::new();
    for (i, student) in grouped.iter().enumerate() {
        if last_seen.get(student.name.as_str()) != Some(&i) {
            continue;
        }
        let label = student.group.trim();
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.members.push(student.name.clone()),
            None => groups.push(Group {
                label: label.to_string(),
                members: vec![student.name.clone()],
            }),
        }
    }

    let mut index_in_group = BTreeMap::new();
    for group in &groups {
        for (i, member) in group.members.iter().enumerate() {
            index_in_group.insert(member.clone(), i);
        }
    }

    let mut row_by_name = BTreeMap::new();
    for (name, row) in roster::raw_rows(raw_names, names_start_row) {
        if last_seen.contains_key(name.as_str()) {
            row_by_name.insert(name, row);
        }
    }

    let max_group_size = groups.iter().map(Group::size).max().unwrap_or(0).max(1);

    LayoutContext {
        groups,
        index_in_group,
        row_by_name,
        max_group_size,
        eval_table_start_column: eval_start_column,
    }
}

impl LayoutContext {
    /// 学生所在的小组
    pub fn group_of(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(name))
    }

    pub fn group(&self, label: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.label == label)
    }

    pub fn row_of(&self, name: &str) -> Option<u32> {
        self.row_by_name.get(name).copied()
    }

    /// 参与布局的全部学生，按表格行排序
    pub fn names_by_row(&self) -> Vec<(&str, u32)> {
        let mut rows: Vec<_> = self
            .row_by_name
            .iter()
            .map(|(name, row)| (name.as_str(), *row))
            .collect();
        rows.sort_by_key(|(_, row)| *row);
        rows
    }

    pub fn table_layout(&self, include_justification: bool, include_feedback: bool) -> TableLayout {
        TableLayout {
            start_column: self.eval_table_start_column,
            max_group_size: self.max_group_size.max(1) as u32,
            include_justification,
            include_feedback,
        }
    }
}

/// 互评表的列布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub start_column: u32,
    pub max_group_size: u32,
    pub include_justification: bool,
    pub include_feedback: bool,
}

impl TableLayout {
    /// 每个组员占的列数：分数 + 可选的理由
    pub fn slot_width(&self) -> u32 {
        1 + u32::from(self.include_justification)
    }

    /// 分数和理由一共占的列数
    pub fn score_block_width(&self) -> u32 {
        self.max_group_size * self.slot_width()
    }

    /// 第 `index` 个评分人的分数列
    pub fn score_column(&self, index: usize) -> u32 {
        self.start_column + index as u32 * self.slot_width()
    }

    pub fn justification_column(&self, index: usize) -> Option<u32> {
        self.include_justification
            .then(|| self.score_column(index) + 1)
    }

    pub fn average_column(&self) -> u32 {
        self.start_column + self.score_block_width()
    }

    pub fn feedback_column(&self) -> Option<u32> {
        self.include_feedback.then(|| self.average_column() + 1)
    }

    pub fn last_submitted_column(&self) -> u32 {
        self.average_column() + if self.include_feedback { 2 } else { 1 }
    }

    /// 表格总列数
    pub fn width(&self) -> u32 {
        self.last_submitted_column() - self.start_column + 1
    }

    /// 表头：`M1 Score`、`M1 Just.`……`Avg Score`、`Feedback`、`Last Submitted`
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.width() as usize);
        for i in 1..=self.max_group_size {
            headers.push(format!("M{i} Score"));
            if self.include_justification {
                headers.push(format!("M{i} Just."));
            }
        }
        headers.push("Avg Score".to_string());
        if self.include_feedback {
            headers.push("Feedback".to_string());
        }
        headers.push("Last Submitted".to_string());
        headers
    }

    /// 某一行的平均分公式：`=IFERROR(AVERAGE(E2,G2), "")`
    pub fn average_formula(&self, row: u32) -> String {
        let cells: Vec<String> = (0..self.max_group_size as usize)
            .map(|i| CellRef::new(row, self.score_column(i)).to_a1())
            .collect();
        format!("=IFERROR(AVERAGE({}), \"\")", cells.join(","))
    }

    /// 起始列字母，日志用
    pub fn start_letters(&self) -> String {
        column_to_letters(self.start_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<CellValue> {
        values
            .iter()
            .map(|v| {
                if v.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::text(*v)
                }
            })
            .collect()
    }

    fn sample() -> LayoutContext {
        let raw = names(&["Alice", "Bob", "Carol", "Dave"]);
        let groups = names(&["A", "A", "B", ""]);
        let students = roster::with_groups(roster::normalize(&raw, &groups));
        resolve(&students, &raw, 2, 5)
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let layout = sample();
        assert_eq!(layout.groups.len(), 2);
        assert_eq!(layout.groups[0].label, "A");
        assert_eq!(layout.groups[0].members, vec!["Alice", "Bob"]);
        assert_eq!(layout.groups[1].members, vec!["Carol"]);
        assert_eq!(layout.index_in_group["Bob"], 1);
        assert_eq!(layout.index_in_group["Carol"], 0);
        assert_eq!(layout.max_group_size, 2);
    }

    #[test]
    fn test_ungrouped_student_is_excluded() {
        let layout = sample();
        assert!(!layout.index_in_group.contains_key("Dave"));
        assert!(layout.group_of("Dave").is_none());
        assert!(layout.row_of("Dave").is_none());
        assert_eq!(layout.row_of("Carol"), Some(4));
    }

    #[test]
    fn test_columns_with_justification_without_feedback() {
        let table = sample().table_layout(true, false);
        assert_eq!(table.score_column(0), 5);
        assert_eq!(table.score_column(1), 7);
        assert_eq!(table.justification_column(1), Some(8));
        assert_eq!(table.average_column(), 9);
        assert_eq!(table.feedback_column(), None);
        assert_eq!(table.last_submitted_column(), 10);
        assert_eq!(table.score_block_width(), 4);
    }

    #[test]
    fn test_columns_with_feedback_only() {
        let table = sample().table_layout(false, true);
        assert_eq!(table.score_column(1), 6);
        assert_eq!(table.justification_column(0), None);
        assert_eq!(table.average_column(), 7);
        assert_eq!(table.feedback_column(), Some(8));
        assert_eq!(table.last_submitted_column(), 9);
        assert_eq!(table.width(), 5);
    }

    #[test]
    fn test_empty_roster_still_has_one_slot() {
        let layout = resolve(&[], &[], 2, 3);
        assert_eq!(layout.max_group_size, 1);
        let table = layout.table_layout(false, false);
        assert_eq!(table.average_column(), 4);
        assert_eq!(table.last_submitted_column(), 5);
    }

    #[test]
    fn test_headers_and_formula() {
        let table = sample().table_layout(true, true);
        assert_eq!(
            table.headers(),
            vec![
                "M1 Score",
                "M1 Just.",
                "M2 Score",
                "M2 Just.",
                "Avg Score",
                "Feedback",
                "Last Submitted"
            ]
        );
        assert_eq!(table.headers().len() as u32, table.width());
        assert_eq!(table.average_formula(3), "=IFERROR(AVERAGE(E3,G3), \"\")");
    }

    #[test]
    fn test_duplicate_name_later_row_wins() {
        let raw = names(&["Alice", "Bob", "Alice"]);
        let groups = names(&["A", "A", "B"]);
        let students = roster::with_groups(roster::normalize(&raw, &groups));
        let layout = resolve(&students, &raw, 2, 5);
        assert_eq!(layout.row_of("Alice"), Some(4));
        assert_eq!(layout.index_in_group["Alice"], 0);
        assert_eq!(layout.group_of("Alice").map(|g| g.label.as_str()), Some("B"));
        assert_eq!(layout.group("A").unwrap().members, vec!["Bob"]);
        assert_eq!(layout.index_in_group["Bob"], 0);
    }

    #[test]
    fn test_duplicate_name_group_slot_and_row_agree() {
        // Bob/A, Alice/A, Alice/B, Dan/B：Alice 只留在 B 组
        let raw = names(&["Bob", "Alice", "Alice", "Dan"]);
        let groups = names(&["A", "A", "B", "B"]);
        let students = roster::with_groups(roster::normalize(&raw, &groups));
        let layout = resolve(&students, &raw, 2, 5);

        assert_eq!(layout.group("A").unwrap().members, vec!["Bob"]);
        assert_eq!(layout.group("B").unwrap().members, vec!["Alice", "Dan"]);
        assert_eq!(layout.groups.iter().filter(|g| g.contains("Alice")).count(), 1);
        assert_eq!(layout.index_in_group["Alice"], 0);
        assert_eq!(layout.index_in_group["Dan"], 1);
        assert_eq!(layout.row_of("Alice"), Some(4));
        assert_eq!(layout.max_group_size, 2);
    }

    #[test]
    fn test_duplicate_in_earlier_group_seen_later() {
        // 后一次出现的组在表格里先出现过
        let raw = names(&["Bob", "Alice", "Alice"]);
        let groups = names(&["B", "A", "B"]);
        let students = roster::with_groups(roster::normalize(&raw, &groups));
        let layout = resolve(&students, &raw, 2, 5);

        assert_eq!(layout.group_of("Alice").map(|g| g.label.as_str()), Some("B"));
        assert_eq!(layout.index_in_group["Alice"], 1);
        assert!(layout.group("A").is_none());
        assert_eq!(layout.row_of("Alice"), Some(4));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let first = serde_json::to_string(&sample()).unwrap();
        let second = serde_json::to_string(&sample()).unwrap();
        assert_eq!(first, second);
        assert_eq!(sample(), sample());
    }
}
