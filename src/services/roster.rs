//! 名单整理服务 - 业务能力层
//!
//! 只负责把表格里读出的姓名列、小组列整理成学生列表，不关心表格怎么读

use crate::models::{CellValue, Student};

/// 整理姓名和小组
///
/// - 姓名去掉首尾空白，空白姓名整行丢弃
/// - 小组缺失或空白记为空串
/// - 保持表格顺序
pub fn normalize(names: &[CellValue], groups: &[CellValue]) -> Vec<Student> {
    names
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let name = raw.trimmed();
            if name.is_empty() {
                return None;
            }
            let group = groups.get(i).map(CellValue::trimmed).unwrap_or_default();
            Some(Student::new(name, group))
        })
        .collect()
}

/// 只保留有小组的学生
pub fn with_groups(students: Vec<Student>) -> Vec<Student> {
    students.into_iter().filter(Student::has_group).collect()
}

/// 每个非空姓名单元格对应的 (姓名, 表格行号)
///
/// `first_row` 是姓名范围第一行的行号。
pub fn raw_rows(names: &[CellValue], first_row: u32) -> Vec<(String, u32)> {
    names
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let name = raw.trimmed();
            (!name.is_empty()).then(|| (name, first_row + i as u32))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<CellValue> {
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

    #[test]
    fn test_normalize_trims_and_drops_blank_names() {
        let names = cells(&[" Alice ", "", "Bob", "   "]);
        let groups = cells(&["A", "B", " ", "C"]);
        let students = normalize(&names, &groups);
        assert_eq!(
            students,
            vec![Student::new("Alice", "A"), Student::new("Bob", "")]
        );
    }

    #[test]
    fn test_normalize_short_group_column() {
        let names = cells(&["Alice", "Bob"]);
        let groups = cells(&["A"]);
        let students = normalize(&names, &groups);
        assert_eq!(students[1], Student::new("Bob", ""));
    }

    #[test]
    fn test_numbers_become_text() {
        let names = vec![CellValue::Number(42.0)];
        let groups = vec![CellValue::Number(3.0)];
        assert_eq!(normalize(&names, &groups), vec![Student::new("42", "3")]);
    }

    #[test]
    fn test_with_groups() {
        let students = vec![Student::new("Alice", "A"), Student::new("Bob", "")];
        assert_eq!(with_groups(students), vec![Student::new("Alice", "A")]);
    }

    #[test]
    fn test_raw_rows_keep_sheet_positions() {
        let names = cells(&["Alice", "", " Bob "]);
        assert_eq!(
            raw_rows(&names, 2),
            vec![("Alice".to_string(), 2), ("Bob".to_string(), 4)]
        );
    }
}
