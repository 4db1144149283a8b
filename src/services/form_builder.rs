//! 表单构建服务 - 业务能力层
//!
//! 只负责为一个小组建表单：标题、题目、描述（含编码后的上下文），不关心处理器和文件夹

use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::FormService;
use crate::models::{
    FormContext, FormHandle, FormSettings, GenerationSettings, Group, QuestionKind, TaggedQuestion,
};
use crate::services::context_codec::ContextCodec;

/// 小组表单标题
pub fn form_title(base_title: &str, group: &str) -> String {
    format!("{base_title} - Group {group}")
}

/// 表单和作业描述中共用的小组说明
pub fn group_notice(group: &Group) -> String {
    format!(
        "This form is for Group {} only.\nGroup Members: {}",
        group.label,
        group.members.join(", ")
    )
}

/// 表单描述：上下文行、小组说明、用户填写的说明
pub fn form_description(blob: &str, group: &Group, user_description: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        ContextCodec::embed(blob),
        group_notice(group),
        user_description
    )
}

/// 建好的小组表单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltForm {
    pub title: String,
    pub handle: FormHandle,
    pub context: FormContext,
}

/// 表单构建服务
pub struct FormBuilder<'a, F> {
    forms: &'a F,
    codec: &'a ContextCodec,
}

impl<'a, F: FormService> FormBuilder<'a, F> {
    pub fn new(forms: &'a F, codec: &'a ContextCodec) -> Self {
        Self { forms, codec }
    }

    /// 为一个小组建表单
    ///
    /// `base_context` 是除小组和题目目录之外的上下文，题目建好后再写描述，
    /// 这样描述里的上下文能带上每道题的 item id。
    pub async fn build(
        &self,
        settings: &GenerationSettings,
        group: &Group,
        base_context: &FormContext,
    ) -> AppResult<BuiltForm> {
        let title = form_title(&settings.form_title, &group.label);
        let handle = self
            .forms
            .create_form(
                &title,
                FormSettings {
                    collect_email: true,
                    allow_response_edits: settings.allow_response_edits,
                    limit_one_response_per_user: true,
                },
            )
            .await?;
        debug!("[表单 {}] 已创建: {}", group.label, handle.form_id);

        let scale = settings.scale();
        let mut questions = Vec::new();
        for kind in QuestionKind::for_group(&group.members) {
            let created = self
                .forms
                .add_question(&handle.form_id, &kind.to_spec(&scale))
                .await?;
            questions.push(TaggedQuestion::new(created, kind));
        }

        let context = FormContext {
            group: group.label.clone(),
            questions,
            ..base_context.clone()
        };
        let blob = self.codec.encode(&context)?;
        self.forms
            .set_description(
                &handle.form_id,
                &form_description(&blob, group, &settings.form_description),
            )
            .await?;

        info!(
            "[表单 {}] ✓ {} 道题已添加: {}",
            group.label,
            context.questions.len(),
            handle.published_url
        );
        Ok(BuiltForm {
            title,
            handle,
            context,
        })
    }
}
