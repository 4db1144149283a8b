//! 表单题目
//!
//! 题目种类在生成表单时确定并带着被评同学的名字，按 item id 存进表单上下文；
//! 提交时按 item id 查表，不再解析题目文字。

use serde::{Deserialize, Serialize};

const RATE_PREFIX: &str = "Rate ";
const RATE_SUFFIX: &str = "'s performance";
const JUSTIFY_PREFIX: &str = "Justify why you gave ";
const JUSTIFY_SUFFIX: &str = " that score";
const FEEDBACK_TITLE: &str = "Any other concerns or feedback regarding the activity?";
const FEEDBACK_PREFIX: &str = "Any other concerns or feedback";

/// 题目种类
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuestionKind {
    /// 给组员打分
    RatePeer { peer: String },
    /// 说明打分理由，紧跟在对应的打分题之后
    JustifyPeer { peer: String },
    /// 自由反馈
    Feedback,
}

impl QuestionKind {
    /// 题目标题
    pub fn title(&self) -> String {
        match self {
            QuestionKind::RatePeer { peer } => format!("{RATE_PREFIX}{peer}{RATE_SUFFIX}"),
            QuestionKind::JustifyPeer { peer } => format!(
                "{JUSTIFY_PREFIX}{peer}{JUSTIFY_SUFFIX}. Give details about their contribution."
            ),
            QuestionKind::Feedback => FEEDBACK_TITLE.to_string(),
        }
    }

    /// 按标题识别题目种类
    ///
    /// 只用于没有题目目录的旧表单上下文。
    pub fn classify(title: &str) -> Option<Self> {
        if let Some(rest) = title.strip_prefix(RATE_PREFIX) {
            if let Some(end) = rest.find(RATE_SUFFIX) {
                return Some(QuestionKind::RatePeer {
                    peer: rest[..end].to_string(),
                });
            }
        }
        if let Some(rest) = title.strip_prefix(JUSTIFY_PREFIX) {
            if let Some(end) = rest.find(JUSTIFY_SUFFIX) {
                return Some(QuestionKind::JustifyPeer {
                    peer: rest[..end].to_string(),
                });
            }
        }
        if title.starts_with(FEEDBACK_PREFIX) {
            return Some(QuestionKind::Feedback);
        }
        None
    }

    /// 一个小组表单的全部题目：每个组员一道打分题加一道理由题，最后是反馈题
    pub fn for_group(members: &[String]) -> Vec<QuestionKind> {
        let mut kinds = Vec::with_capacity(members.len() * 2 + 1);
        for member in members {
            kinds.push(QuestionKind::RatePeer {
                peer: member.clone(),
            });
            kinds.push(QuestionKind::JustifyPeer {
                peer: member.clone(),
            });
        }
        kinds.push(QuestionKind::Feedback);
        kinds
    }

    /// 转成表单服务需要的题目定义
    pub fn to_spec(&self, scale: &ScaleSettings) -> QuestionSpec {
        match self {
            QuestionKind::RatePeer { .. } => QuestionSpec::Scale {
                title: self.title(),
                lower: scale.lower,
                upper: scale.upper,
                lower_label: scale.lower_label.clone(),
                upper_label: scale.upper_label.clone(),
                required: true,
            },
            QuestionKind::JustifyPeer { .. } => QuestionSpec::Text {
                title: self.title(),
                required: true,
            },
            QuestionKind::Feedback => QuestionSpec::Text {
                title: self.title(),
                required: false,
            },
        }
    }
}

/// 打分题的量表设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleSettings {
    pub lower: i64,
    pub upper: i64,
    pub lower_label: String,
    pub upper_label: String,
}

/// 提交给表单服务的题目定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionSpec {
    Scale {
        title: String,
        lower: i64,
        upper: i64,
        lower_label: String,
        upper_label: String,
        required: bool,
    },
    Text {
        title: String,
        required: bool,
    },
}

impl QuestionSpec {
    pub fn title(&self) -> &str {
        match self {
            QuestionSpec::Scale { title, .. } | QuestionSpec::Text { title, .. } => title,
        }
    }
}

/// 表单服务创建题目后返回的两个 id
///
/// 表单结构里用 item id，提交的作答按 question id 索引。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedQuestion {
    pub item_id: String,
    pub question_id: String,
}

/// 表单中已创建的题目：item id、question id + 种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedQuestion {
    #[serde(rename = "id")]
    pub item_id: String,
    #[serde(rename = "qid", default, skip_serializing_if = "String::is_empty")]
    pub question_id: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl TaggedQuestion {
    pub fn new(created: CreatedQuestion, kind: QuestionKind) -> Self {
        Self {
            item_id: created.item_id,
            question_id: created.question_id,
            kind,
        }
    }

    /// 作答里的 id 可能是 item id，也可能是 question id
    pub fn matches(&self, id: &str) -> bool {
        !id.is_empty() && (self.item_id == id || self.question_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_round_trip_through_classifier() {
        for kind in QuestionKind::for_group(&["Bob".to_string(), "Mary Ann".to_string()]) {
            assert_eq!(QuestionKind::classify(&kind.title()), Some(kind));
        }
    }

    #[test]
    fn test_classify_unrelated_title() {
        assert_eq!(QuestionKind::classify("Rate the activity overall"), None);
        assert_eq!(QuestionKind::classify("What did you learn?"), None);
    }

    #[test]
    fn test_for_group_order() {
        let kinds = QuestionKind::for_group(&["Alice".to_string()]);
        assert_eq!(
            kinds,
            vec![
                QuestionKind::RatePeer {
                    peer: "Alice".into()
                },
                QuestionKind::JustifyPeer {
                    peer: "Alice".into()
                },
                QuestionKind::Feedback,
            ]
        );
    }

    #[test]
    fn test_tagged_question_matches_either_id() {
        let tagged = TaggedQuestion::new(
            CreatedQuestion {
                item_id: "6a1f".into(),
                question_id: "3c9e".into(),
            },
            QuestionKind::Feedback,
        );
        assert!(tagged.matches("6a1f"));
        assert!(tagged.matches("3c9e"));
        assert!(!tagged.matches(""));
        assert!(!tagged.matches("0000"));

        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["id"], "6a1f");
        assert_eq!(json["qid"], "3c9e");
    }

    #[test]
    fn test_feedback_is_optional_text() {
        let scale = ScaleSettings {
            lower: 1,
            upper: 5,
            lower_label: "Poor".into(),
            upper_label: "Excellent".into(),
        };
        assert_eq!(
            QuestionKind::Feedback.to_spec(&scale),
            QuestionSpec::Text {
                title: FEEDBACK_TITLE.to_string(),
                required: false
            }
        );
    }
}
