use crate::error::AppResult;
use crate::models::{Assignment, ClassroomStudent, Course, CreatedAssignment, Topic};

/// 课堂 / 名单服务契约
#[allow(async_fn_in_trait)]
pub trait Classroom {
    /// 当前用户任教的活跃课程
    async fn list_active_courses(&self) -> AppResult<Vec<Course>>;

    async fn list_students(&self, course_id: &str) -> AppResult<Vec<ClassroomStudent>>;

    /// 按 user id 或邮箱查学生
    async fn get_student(
        &self,
        course_id: &str,
        user_key: &str,
    ) -> AppResult<Option<ClassroomStudent>>;

    async fn list_topics(&self, course_id: &str) -> AppResult<Vec<Topic>>;

    async fn create_topic(&self, course_id: &str, name: &str) -> AppResult<Topic>;

    async fn create_assignment(
        &self,
        course_id: &str,
        assignment: &Assignment,
    ) -> AppResult<CreatedAssignment>;
}
