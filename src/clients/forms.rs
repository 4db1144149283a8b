//! Forms v1 实现
//!
//! 提交处理器对应 Forms API 的 watch：每个 watch 把 `RESPONSES` 事件推到配置的 Pub/Sub topic。
//! 通知只带表单 id，作答再用 `responses.get` / `responses.list` 读回来。

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::{str_field, GoogleClient};
use crate::error::{AppError, AppResult};
use crate::infrastructure::FormService;
use crate::models::{Answer, CreatedQuestion, FormHandle, FormSettings, QuestionSpec, SubmissionEvent};

const SERVICE: &str = "Forms";

/// createItem 请求里的 item
fn item_json(question: &QuestionSpec) -> JsonValue {
    match question {
        QuestionSpec::Scale {
            title,
            lower,
            upper,
            lower_label,
            upper_label,
            required,
        } => json!({
            "title": title,
            "questionItem": {
                "question": {
                    "required": required,
                    "scaleQuestion": {
                        "low": lower,
                        "high": upper,
                        "lowLabel": lower_label,
                        "highLabel": upper_label,
                    }
                }
            }
        }),
        QuestionSpec::Text { title, required } => json!({
            "title": title,
            "questionItem": {
                "question": {
                    "required": required,
                    "textQuestion": { "paragraph": true }
                }
            }
        }),
    }
}

fn parse_time(value: &JsonValue, pointer: &str) -> Option<DateTime<Utc>> {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// 一道题的作答文字，多选项用 `, ` 连接
fn answer_text(answer: &JsonValue) -> String {
    answer
        .pointer("/textAnswers/answers")
        .and_then(JsonValue::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("value").and_then(JsonValue::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// 把 `forms.get` 和 `responses.get` 的结果合成提交事件
///
/// 作答按表单题目顺序排列，`item_id` 用表单的 item id，标题取自题目。
fn event_from_response(form_id: &str, form: &JsonValue, response: &JsonValue) -> AppResult<SubmissionEvent> {
    let respondent_email = str_field(response, "/respondentEmail");
    if respondent_email.is_empty() {
        return Err(AppError::not_found(SERVICE, "respondentEmail in response"));
    }
    let submitted_at = parse_time(response, "/lastSubmittedTime")
        .or_else(|| parse_time(response, "/createTime"))
        .ok_or_else(|| AppError::not_found(SERVICE, "lastSubmittedTime in response"))?;

    let items = form
        .get("items")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let answers = items
        .iter()
        .filter_map(|item| {
            let question_id = str_field(item, "/questionItem/question/questionId");
            let answer = response.get("answers")?.get(&question_id)?;
            Some(Answer::new(
                str_field(item, "/itemId"),
                str_field(item, "/title"),
                answer_text(answer),
            ))
        })
        .collect();

    Ok(SubmissionEvent {
        form_id: form_id.to_string(),
        respondent_email,
        answers,
        submitted_at,
    })
}

impl GoogleClient {
    fn form_url(&self, form_id: &str, tail: &[&str]) -> AppResult<reqwest::Url> {
        let mut segments = vec!["v1", "forms", form_id];
        segments.extend_from_slice(tail);
        self.url(&self.forms_base, &segments)
    }

    async fn get_form(&self, form_id: &str) -> AppResult<JsonValue> {
        let url = self.form_url(form_id, &[])?;
        self.send(SERVICE, Method::GET, url, None).await
    }

    async fn batch_update_form(&self, form_id: &str, requests: JsonValue) -> AppResult<JsonValue> {
        let url = self.url(&self.forms_base, &["v1", "forms", &format!("{form_id}:batchUpdate")])?;
        let body = json!({ "requests": requests });
        self.send(SERVICE, Method::POST, url, Some(&body)).await
    }
}

impl FormService for GoogleClient {
    async fn create_form(&self, title: &str, settings: FormSettings) -> AppResult<FormHandle> {
        let url = self.url(&self.forms_base, &["v1", "forms"])?;
        let body = json!({ "info": { "title": title, "documentTitle": title } });
        let created = self.send(SERVICE, Method::POST, url, Some(&body)).await?;
        let handle = FormHandle {
            form_id: str_field(&created, "/formId"),
            published_url: str_field(&created, "/responderUri"),
        };
        if handle.form_id.is_empty() {
            return Err(AppError::not_found(SERVICE, "formId in create response"));
        }

        let collection = if settings.collect_email {
            "VERIFIED"
        } else {
            "DO_NOT_COLLECT"
        };
        self.batch_update_form(
            &handle.form_id,
            json!([{
                "updateSettings": {
                    "settings": { "emailCollectionType": collection },
                    "updateMask": "emailCollectionType"
                }
            }]),
        )
        .await?;
        // 每人一次、允许修改这两项 Forms API 不提供，需要在表单设置里手动确认
        debug!(
            "表单 {} 已创建 (one response: {}, edits: {})",
            handle.form_id, settings.limit_one_response_per_user, settings.allow_response_edits
        );
        Ok(handle)
    }

    async fn add_question(&self, form_id: &str, question: &QuestionSpec) -> AppResult<CreatedQuestion> {
        let form = self.get_form(form_id).await?;
        let index = form
            .get("items")
            .and_then(JsonValue::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        let reply = self
            .batch_update_form(
                form_id,
                json!([{
                    "createItem": {
                        "item": item_json(question),
                        "location": { "index": index }
                    }
                }]),
            )
            .await?;
        let created = CreatedQuestion {
            item_id: str_field(&reply, "/replies/0/createItem/itemId"),
            question_id: str_field(&reply, "/replies/0/createItem/questionId/0"),
        };
        if created.item_id.is_empty() || created.question_id.is_empty() {
            return Err(AppError::not_found(SERVICE, format!("item ids for \"{}\"", question.title())));
        }
        Ok(created)
    }

    async fn set_description(&self, form_id: &str, description: &str) -> AppResult<()> {
        self.batch_update_form(
            form_id,
            json!([{
                "updateFormInfo": {
                    "info": { "description": description },
                    "updateMask": "description"
                }
            }]),
        )
        .await?;
        Ok(())
    }

    async fn description(&self, form_id: &str) -> AppResult<String> {
        let form = self.get_form(form_id).await?;
        Ok(str_field(&form, "/info/description"))
    }

    async fn attach_submit_handler(&self, form_id: &str) -> AppResult<String> {
        if self.watch_topic.trim().is_empty() {
            return Err(AppError::validation(
                "watch_topic is required to attach submit handlers.",
            ));
        }
        let url = self.form_url(form_id, &["watches"])?;
        let body = json!({
            "watch": {
                "target": { "topic": { "topicName": self.watch_topic } },
                "eventType": "RESPONSES"
            }
        });
        let watch = self.send(SERVICE, Method::POST, url, Some(&body)).await?;
        let id = str_field(&watch, "/id");
        if id.is_empty() {
            return Err(AppError::not_found(SERVICE, "watch id in create response"));
        }
        Ok(id)
    }

    async fn remove_submit_handler(&self, form_id: &str, handler_id: &str) -> AppResult<()> {
        let url = self.form_url(form_id, &["watches", handler_id])?;
        self.send(SERVICE, Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn response(&self, form_id: &str, response_id: &str) -> AppResult<SubmissionEvent> {
        let form = self.get_form(form_id).await?;
        let url = self.form_url(form_id, &["responses", response_id])?;
        let response = self.send(SERVICE, Method::GET, url, None).await?;
        event_from_response(form_id, &form, &response)
    }

    async fn responses_since(&self, form_id: &str, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        let mut url = self.form_url(form_id, &["responses"])?;
        url.query_pairs_mut().append_pair(
            "filter",
            &format!("timestamp >= {}", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        let responses = self.get_paged(SERVICE, url, "responses").await?;
        Ok(responses
            .iter()
            .map(|r| str_field(r, "/responseId"))
            .filter(|id| !id.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_item_json() {
        let item = item_json(&QuestionSpec::Scale {
            title: "Rate Bob's performance".into(),
            lower: 1,
            upper: 5,
            lower_label: "Poor".into(),
            upper_label: "Great".into(),
            required: true,
        });
        let scale = &item["questionItem"]["question"]["scaleQuestion"];
        assert_eq!(item["title"], "Rate Bob's performance");
        assert_eq!(scale["low"], 1);
        assert_eq!(scale["high"], 5);
        assert_eq!(scale["highLabel"], "Great");
    }

    fn sample_form() -> JsonValue {
        json!({
            "formId": "f-1",
            "items": [
                {
                    "itemId": "1a2b",
                    "title": "Rate Bob's performance",
                    "questionItem": { "question": { "questionId": "7f01", "scaleQuestion": {} } }
                },
                { "itemId": "9z9z", "title": "Section", "textItem": {} },
                {
                    "itemId": "3c4d",
                    "title": "Justify why you gave Bob that score. Give details about their contribution.",
                    "questionItem": { "question": { "questionId": "7f02", "textQuestion": {} } }
                },
                {
                    "itemId": "5e6f",
                    "title": "Any other concerns or feedback regarding the activity?",
                    "questionItem": { "question": { "questionId": "7f03", "textQuestion": {} } }
                }
            ]
        })
    }

    #[test]
    fn test_response_answers_follow_form_order_and_use_item_ids() {
        // answers 是按 question id 索引的无序映射
        let response = json!({
            "responseId": "r-1",
            "respondentEmail": "bob@school.edu",
            "createTime": "2030-03-14T09:00:00Z",
            "lastSubmittedTime": "2030-03-14T09:05:00.5Z",
            "answers": {
                "7f02": { "questionId": "7f02", "textAnswers": { "answers": [{ "value": "solid work" }] } },
                "7f01": { "questionId": "7f01", "textAnswers": { "answers": [{ "value": "4" }] } }
            }
        });
        let event = event_from_response("f-1", &sample_form(), &response).unwrap();

        assert_eq!(event.form_id, "f-1");
        assert_eq!(event.respondent_email, "bob@school.edu");
        assert_eq!(
            event.answers,
            vec![
                Answer::new("1a2b", "Rate Bob's performance", "4"),
                Answer::new(
                    "3c4d",
                    "Justify why you gave Bob that score. Give details about their contribution.",
                    "solid work"
                ),
            ]
        );
        assert_eq!(event.submitted_at.timestamp(), 1_899_709_500);
    }

    #[test]
    fn test_response_without_email_is_rejected() {
        let response = json!({ "lastSubmittedTime": "2030-03-14T09:05:00Z", "answers": {} });
        assert!(event_from_response("f-1", &sample_form(), &response).is_err());
    }

    #[test]
    fn test_multiple_values_are_joined() {
        let answer = json!({ "textAnswers": { "answers": [{ "value": "a" }, { "value": "b" }] } });
        assert_eq!(answer_text(&answer), "a, b");
        assert_eq!(answer_text(&json!({})), "");
    }

    #[test]
    fn test_text_item_json() {
        let item = item_json(&QuestionSpec::Text {
            title: "Feedback".into(),
            required: false,
        });
        assert_eq!(item["questionItem"]["question"]["required"], false);
        assert_eq!(item["questionItem"]["question"]["textQuestion"]["paragraph"], true);
    }
}
