//! 表单上下文
//!
//! 每个小组表单生成时创建一次，编码后嵌在表单描述里；提交时读回，用来在最新名单上
//! 重新计算布局。创建后不再修改。

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::models::question::{QuestionKind, TaggedQuestion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormContext {
    #[serde(rename = "sheet", default)]
    pub sheet: String,
    #[serde(rename = "namesR", default)]
    pub names_range: String,
    #[serde(rename = "groupsR", default)]
    pub group_names_range: String,
    /// 互评表起始列（列字母）
    #[serde(rename = "evalR", default)]
    pub eval_start_column: String,
    #[serde(rename = "course", default)]
    pub course: String,
    /// 表单面向的小组
    #[serde(rename = "group", default)]
    pub group: String,
    /// 表单创建者的 UTC 偏移（`+0800`）
    #[serde(rename = "utcOff", default)]
    pub utc_offset: String,
    #[serde(rename = "includeJustification", default)]
    pub include_justification: bool,
    #[serde(rename = "includeFeedback", default)]
    pub include_feedback: bool,
    /// 题目目录：item id / question id → 题目种类
    #[serde(rename = "items", default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<TaggedQuestion>,
}

impl FormContext {
    /// 检查必填字段
    pub fn validate(&self) -> Result<(), DecodeError> {
        let required: [(&'static str, &str); 7] = [
            ("sheet", &self.sheet),
            ("namesR", &self.names_range),
            ("groupsR", &self.group_names_range),
            ("evalR", &self.eval_start_column),
            ("course", &self.course),
            ("group", &self.group),
            ("utcOff", &self.utc_offset),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DecodeError::MissingField(field));
            }
        }
        Ok(())
    }

    /// 按 item id 或 question id 查找题目种类
    pub fn question_kind(&self, id: &str) -> Option<&QuestionKind> {
        self.questions
            .iter()
            .find(|q| q.matches(id))
            .map(|q| &q.kind)
    }
}
