//! Classroom v1 实现

use chrono::{Datelike, Timelike};
use reqwest::Method;
use serde_json::{json, Value as JsonValue};

use super::{str_field, GoogleClient};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Classroom;
use crate::models::{Assignment, AssignmentState, ClassroomStudent, Course, CreatedAssignment, Topic};

const SERVICE: &str = "Classroom";

fn student_from_json(value: &JsonValue) -> ClassroomStudent {
    ClassroomStudent {
        user_id: str_field(value, "/userId"),
        full_name: str_field(value, "/profile/name/fullName"),
        email: str_field(value, "/profile/emailAddress"),
    }
}

/// courseWork 请求体：截止时间用 UTC，只分配给指定学生
fn course_work_json(assignment: &Assignment) -> JsonValue {
    let due = assignment.due;
    let mut body = json!({
        "title": assignment.title,
        "description": assignment.description,
        "materials": [{ "link": { "url": assignment.link_url } }],
        "maxPoints": assignment.max_points,
        "workType": "ASSIGNMENT",
        "topicId": assignment.topic_id,
        "dueDate": { "year": due.year(), "month": due.month(), "day": due.day() },
        "dueTime": { "hours": due.hour(), "minutes": due.minute(), "seconds": due.second() },
        "assigneeMode": "INDIVIDUAL_STUDENTS",
        "individualStudentsOptions": { "studentIds": assignment.student_ids },
        "state": assignment.state(),
    });
    if let Some(at) = assignment.scheduled_time {
        body["scheduledTime"] = json!(at.to_rfc3339());
    }
    body
}

impl GoogleClient {
    fn course_url(&self, course_id: &str, tail: &[&str]) -> AppResult<reqwest::Url> {
        let mut segments = vec!["v1", "courses", course_id];
        segments.extend_from_slice(tail);
        self.url(&self.classroom_base, &segments)
    }
}

impl Classroom for GoogleClient {
    async fn list_active_courses(&self) -> AppResult<Vec<Course>> {
        let mut url = self.url(&self.classroom_base, &["v1", "courses"])?;
        url.query_pairs_mut()
            .append_pair("courseStates", "ACTIVE")
            .append_pair("teacherId", "me");
        Ok(self
            .get_paged(SERVICE, url, "courses")
            .await?
            .iter()
            .map(|c| Course {
                id: str_field(c, "/id"),
                name: str_field(c, "/name"),
            })
            .collect())
    }

    async fn list_students(&self, course_id: &str) -> AppResult<Vec<ClassroomStudent>> {
        let url = self.course_url(course_id, &["students"])?;
        Ok(self
            .get_paged(SERVICE, url, "students")
            .await?
            .iter()
            .map(student_from_json)
            .collect())
    }

    async fn get_student(
        &self,
        course_id: &str,
        user_key: &str,
    ) -> AppResult<Option<ClassroomStudent>> {
        let url = self.course_url(course_id, &["students", user_key])?;
        Ok(self
            .get_optional(SERVICE, url)
            .await?
            .map(|s| student_from_json(&s)))
    }

    async fn list_topics(&self, course_id: &str) -> AppResult<Vec<Topic>> {
        let url = self.course_url(course_id, &["topics"])?;
        Ok(self
            .get_paged(SERVICE, url, "topic")
            .await?
            .iter()
            .map(|t| Topic {
                topic_id: str_field(t, "/topicId"),
                name: str_field(t, "/name"),
            })
            .collect())
    }

    async fn create_topic(&self, course_id: &str, name: &str) -> AppResult<Topic> {
        let url = self.course_url(course_id, &["topics"])?;
        let created = self
            .send(SERVICE, Method::POST, url, Some(&json!({ "name": name })))
            .await?;
        Ok(Topic {
            topic_id: str_field(&created, "/topicId"),
            name: str_field(&created, "/name"),
        })
    }

    async fn create_assignment(
        &self,
        course_id: &str,
        assignment: &Assignment,
    ) -> AppResult<CreatedAssignment> {
        let url = self.course_url(course_id, &["courseWork"])?;
        let created = self
            .send(SERVICE, Method::POST, url, Some(&course_work_json(assignment)))
            .await?;
        let id = str_field(&created, "/id");
        if id.is_empty() {
            return Err(AppError::not_found(SERVICE, "courseWork id in create response"));
        }
        let state = match created.get("state").and_then(JsonValue::as_str) {
            Some("DRAFT") => AssignmentState::Draft,
            Some(_) => AssignmentState::Published,
            None => assignment.state(),
        };
        Ok(CreatedAssignment {
            id,
            state,
            scheduled_time: assignment.scheduled_time,
        })
    }
}
