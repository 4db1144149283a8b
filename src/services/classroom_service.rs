//! 课堂查询服务 - 业务能力层
//!
//! 课程、学生、主题的查找与创建，只处理单个课程，不关心流程

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, LookupError};
use crate::infrastructure::Classroom;
use crate::models::{ClassroomStudent, Topic};

/// 课堂查询服务
pub struct ClassroomService<'a, C> {
    classroom: &'a C,
}

impl<'a, C: Classroom> ClassroomService<'a, C> {
    pub fn new(classroom: &'a C) -> Self {
        Self { classroom }
    }

    /// 按名称找活跃课程：先精确匹配，再忽略大小写
    pub async fn course_id_by_name(&self, course_name: &str) -> AppResult<String> {
        if course_name.trim().is_empty() {
            return Err(AppError::validation("Course name cannot be empty."));
        }
        let courses = self.classroom.list_active_courses().await?;
        if courses.is_empty() {
            return Err(LookupError::NoActiveCourses.into());
        }
        if let Some(course) = courses.iter().find(|c| c.name == course_name) {
            return Ok(course.id.clone());
        }
        let lowered = course_name.to_lowercase();
        if let Some(course) = courses.iter().find(|c| c.name.to_lowercase() == lowered) {
            info!(
                "课程 \"{}\" 没有精确匹配，使用忽略大小写匹配到的 \"{}\"",
                course_name, course.name
            );
            return Ok(course.id.clone());
        }
        Err(LookupError::CourseNotFound(course_name.to_string()).into())
    }

    /// 把提交者邮箱解析成课程名单里的全名
    ///
    /// 先按邮箱直接查，失败或查不到再遍历名单。名单也取不到时返回错误。
    pub async fn resolve_respondent_name(
        &self,
        course_id: &str,
        email: &str,
    ) -> AppResult<Option<String>> {
        match self.classroom.get_student(course_id, email).await {
            Ok(Some(student)) if !student.full_name.is_empty() => {
                return Ok(Some(student.full_name));
            }
            Ok(_) => debug!("直接查询未找到 {}，改为遍历名单", email),
            Err(e) => debug!("直接查询 {} 失败，改为遍历名单: {}", email, e),
        }

        let students = self.classroom.list_students(course_id).await?;
        Ok(students
            .into_iter()
            .find(|s| s.email == email)
            .map(|s| s.full_name))
    }

    /// 按名称找主题，不存在就创建
    pub async fn get_or_create_topic(&self, course_id: &str, topic_name: &str) -> AppResult<Topic> {
        let topics = self.classroom.list_topics(course_id).await?;
        if let Some(topic) = topics.into_iter().find(|t| t.name == topic_name) {
            return Ok(topic);
        }
        match self.classroom.create_topic(course_id, topic_name).await {
            Ok(topic) => {
                info!("✓ 创建新主题: {} (ID: {})", topic.name, topic.topic_id);
                Ok(topic)
            }
            Err(e) => {
                warn!("创建主题 {} 失败: {}", topic_name, e);
                Err(LookupError::TopicUnavailable {
                    name: topic_name.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    pub async fn topic_exists(&self, course_id: &str, topic_name: &str) -> AppResult<bool> {
        let topics = self.classroom.list_topics(course_id).await?;
        Ok(topics.iter().any(|t| t.name == topic_name))
    }
}

/// 名单全名按姓氏排序，姓氏相同时按全名，都不区分大小写
pub fn sorted_by_last_name(students: &[ClassroomStudent]) -> Vec<String> {
    let mut names: Vec<String> = students.iter().map(|s| s.full_name.clone()).collect();
    names.sort_by(|a, b| compare_by_last_name(a, b));
    names
}

fn last_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_lowercase()
}

fn compare_by_last_name(a: &str, b: &str) -> Ordering {
    last_name(a)
        .cmp(&last_name(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryClassroom;

    fn classroom() -> MemoryClassroom {
        MemoryClassroom::new()
            .with_course("c-1", "Biology 101")
            .with_course("c-2", "Chemistry")
            .with_student("c-1", "Alice Zhang", "alice@school.org")
            .with_student("c-1", "Bob Adams", "bob@school.org")
            .with_topic("c-1", "t-1", "Peer Evaluation")
    }

    #[tokio::test]
    async fn test_course_lookup_exact_then_case_insensitive() {
        let classroom = classroom();
        let service = ClassroomService::new(&classroom);
        assert_eq!(service.course_id_by_name("Biology 101").await.unwrap(), "c-1");
        assert_eq!(service.course_id_by_name("chemistry").await.unwrap(), "c-2");

        let err = service.course_id_by_name("Physics").await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(LookupError::CourseNotFound(_))));
        assert!(matches!(
            service.course_id_by_name("  ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_no_active_courses() {
        let classroom = MemoryClassroom::new();
        let err = ClassroomService::new(&classroom)
            .course_id_by_name("Biology 101")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Lookup(LookupError::NoActiveCourses)));
    }

    #[tokio::test]
    async fn test_resolve_respondent_name() {
        let classroom = classroom();
        let service = ClassroomService::new(&classroom);
        assert_eq!(
            service
                .resolve_respondent_name("c-1", "bob@school.org")
                .await
                .unwrap(),
            Some("Bob Adams".to_string())
        );
        assert_eq!(
            service
                .resolve_respondent_name("c-1", "eve@school.org")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_get_or_create_topic() {
        let classroom = classroom();
        let service = ClassroomService::new(&classroom);
        let existing = service.get_or_create_topic("c-1", "Peer Evaluation").await.unwrap();
        assert_eq!(existing.topic_id, "t-1");

        let created = service.get_or_create_topic("c-1", "Week 3").await.unwrap();
        assert_eq!(created.name, "Week 3");
        assert!(service.topic_exists("c-1", "Week 3").await.unwrap());
    }

    #[test]
    fn test_sorted_by_last_name() {
        let students: Vec<ClassroomStudent> = ["Carol Young", "bob adams", "Alice Adams"]
            .iter()
            .map(|n| ClassroomStudent {
                user_id: String::new(),
                full_name: n.to_string(),
                email: String::new(),
            })
            .collect();
        assert_eq!(
            sorted_by_last_name(&students),
            vec!["Alice Adams", "bob adams", "Carol Young"]
        );
    }
}
