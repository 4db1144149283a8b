use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 单元格的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// 以 `=` 开头的公式
    Formula(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// 与表格的 isBlank 语义一致：空单元格或空字符串
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 显示值（数字整数不带小数点）
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) | CellValue::Formula(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }

    /// 去除首尾空白后的显示值
    pub fn trimmed(&self) -> String {
        self.display().trim().to_string()
    }

    /// 提交的答案：能解析成数字就写数字，否则保留原文
    pub fn from_response(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// 从 API 返回的 JSON 值转换
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => CellValue::Empty,
            JsonValue::Bool(b) => CellValue::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            JsonValue::String(s) if s.is_empty() => CellValue::Empty,
            JsonValue::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// 转成写入 API 的 JSON 值（公式按用户输入解释）
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Empty => JsonValue::String(String::new()),
            CellValue::Text(s) | CellValue::Formula(s) => JsonValue::String(s.clone()),
            CellValue::Number(n) => serde_json::json!(n),
            CellValue::Bool(b) => JsonValue::Bool(*b),
        }
    }
}

/// 水平对齐
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// 单元格格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellFormat {
    pub bold: bool,
    pub horizontal_alignment: Option<HorizontalAlignment>,
}

impl CellFormat {
    /// 表头格式：加粗、居中
    pub fn header() -> Self {
        Self {
            bold: true,
            horizontal_alignment: Some(HorizontalAlignment::Center),
        }
    }

    pub fn right_aligned() -> Self {
        Self {
            bold: false,
            horizontal_alignment: Some(HorizontalAlignment::Right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_blank() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::text("").is_blank());
        assert!(!CellValue::text(" ").is_blank());
        assert_eq!(CellValue::Number(4.0).display(), "4");
        assert_eq!(CellValue::Number(4.5).display(), "4.5");
        assert_eq!(CellValue::text("  Alice ").trimmed(), "Alice");
    }

    #[test]
    fn test_from_response() {
        assert_eq!(CellValue::from_response("4"), CellValue::Number(4.0));
        assert_eq!(CellValue::from_response("great"), CellValue::text("great"));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(CellValue::from_json(&serde_json::json!(3)), CellValue::Number(3.0));
        assert_eq!(CellValue::from_json(&serde_json::json!("")), CellValue::Empty);
        assert_eq!(CellValue::from_json(&serde_json::json!(null)), CellValue::Empty);
    }
}
