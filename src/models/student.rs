use serde::{Deserialize, Serialize};

/// 名单中的一名学生
///
/// `group` 为空表示未分组，不参与互评。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub group: String,
}

impl Student {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    pub fn has_group(&self) -> bool {
        !self.group.trim().is_empty()
    }
}

/// 一个互评小组，成员按表格顺序排列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub label: String,
    pub members: Vec<String>,
}

impl Group {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}
