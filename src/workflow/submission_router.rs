//! 提交路由流程 - 流程层
//!
//! 核心职责：把一次表单提交的答案写进互评表
//!
//! 流程顺序：
//! 1. 从表单描述解出上下文
//! 2. 确认目标工作表存在，把提交者邮箱解析成全名
//! 3. 重新读取名单并计算布局（不使用生成时的快照）
//! 4. 确认提交者所在小组，计算要写的单元格（纯计算，见 [`plan`]）
//! 5. 逐个写入，单个失败只记录不中止
//!
//! 事件来源有三种：完整的提交事件、表单 id + response id、Forms watch 通知。

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, LookupError};
use crate::infrastructure::{Classroom, FormService, Spreadsheet};
use crate::models::{
    A1Range, Answer, CellFormat, CellRef, CellValue, CellWrite, FormContext, FormNotification,
    QuestionKind, SkippedWrite, SubmissionEvent, SubmissionRecord, WriteKind,
};
use crate::services::error_log::{ErrorEntry, ErrorLog};
use crate::services::layout::LayoutContext;
use crate::services::roster_reader::{parse_start_column, read_roster};
use crate::services::{ClassroomService, ContextCodec};
use crate::utils::time::format_submission_timestamp;
use crate::utils::truncate_text;
use crate::workflow::submission_ctx::SubmissionCtx;

/// 按通知读取作答时，从发布时间往前多查的分钟数
const NOTIFICATION_LOOKBACK_MINUTES: i64 = 10;

/// 提交的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// 提交者不属于这份表单的小组，不写入
    Ignored {
        respondent: String,
        actual_group: String,
        form_group: String,
    },
    /// 已写入（`writes` 是成功写入的单元格）
    Written(SubmissionRecord),
}

/// 计算一次提交要写的全部单元格
///
/// 不访问任何外部服务；行列找不到的写入放进 `skipped`。
pub fn plan(
    context: &FormContext,
    layout: &LayoutContext,
    respondent: &str,
    answers: &[Answer],
    submitted_at: DateTime<Utc>,
) -> AppResult<RouteOutcome> {
    let actual_group = layout
        .group_of(respondent)
        .ok_or_else(|| LookupError::SubmitterNotInRoster {
            name: respondent.to_string(),
            sheet: context.sheet.clone(),
        })?;
    if actual_group.label != context.group {
        return Ok(RouteOutcome::Ignored {
            respondent: respondent.to_string(),
            actual_group: actual_group.label.clone(),
            form_group: context.group.clone(),
        });
    }

    let index = layout
        .index_in_group
        .get(respondent)
        .copied()
        .ok_or_else(|| LookupError::SubmitterNotInRoster {
            name: respondent.to_string(),
            sheet: context.sheet.clone(),
        })?;
    let table = layout.table_layout(context.include_justification, context.include_feedback);
    let own_row = layout.row_of(respondent);

    let mut record = SubmissionRecord {
        respondent: respondent.to_string(),
        group: actual_group.label.clone(),
        index_in_group: index,
        writes: Vec::new(),
        skipped: Vec::new(),
    };

    let kind_of = |answer: &Answer| {
        context
            .question_kind(&answer.item_id)
            .cloned()
            .or_else(|| QuestionKind::classify(&answer.title))
    };

    let mut k = 0;
    while k < answers.len() {
        let answer = &answers[k];
        match kind_of(answer) {
            Some(QuestionKind::RatePeer { peer }) => {
                let score_column = table.score_column(index);
                let Some(row) = layout.row_of(&peer) else {
                    record.skipped.push(SkippedWrite {
                        category: "Invalid Row/Col (Score/Just.)".to_string(),
                        message: format!(
                            "Rated: {peer} (row not found). Submitter: {respondent} (Idx: {index} => ScoreCol: {score_column})"
                        ),
                    });
                    k += 1;
                    continue;
                };
                record.writes.push(CellWrite {
                    kind: WriteKind::Score,
                    row_owner: peer.clone(),
                    cell: CellRef::new(row, score_column),
                    value: CellValue::from_response(&answer.response),
                    format: None,
                });

                if let Some(column) = table.justification_column(index) {
                    let justify = QuestionKind::JustifyPeer { peer: peer.clone() };
                    let next = answers
                        .get(k + 1)
                        .filter(|&n| kind_of(n).as_ref() == Some(&justify));
                    if let Some(next) = next {
                        record.writes.push(CellWrite {
                            kind: WriteKind::Justification,
                            row_owner: peer.clone(),
                            cell: CellRef::new(row, column),
                            value: CellValue::text(next.response.clone()),
                            format: None,
                        });
                        k += 1;
                    }
                }
            }
            Some(QuestionKind::Feedback) if context.include_feedback => {
                match (own_row, table.feedback_column()) {
                    (Some(row), Some(column)) => record.writes.push(CellWrite {
                        kind: WriteKind::Feedback,
                        row_owner: respondent.to_string(),
                        cell: CellRef::new(row, column),
                        value: CellValue::text(answer.response.clone()),
                        format: None,
                    }),
                    _ => record.skipped.push(SkippedWrite {
                        category: "Invalid Row/Col for Feedback".to_string(),
                        message: format!("Submitter: {respondent} (row not found)."),
                    }),
                }
            }
            other => debug!("忽略题目 '{}' ({:?})", truncate_text(&answer.title, 40), other),
        }
        k += 1;
    }

    let column = table.last_submitted_column();
    match own_row {
        Some(row) => {
            let stamp = format_submission_timestamp(submitted_at, &context.utc_offset)
                .unwrap_or_else(|e| {
                    warn!("UTC 偏移 '{}' 无效，时间戳使用 UTC: {}", context.utc_offset, e);
                    submitted_at.format("%Y/%m/%d %H:%M:%S %p").to_string()
                });
            record.writes.push(CellWrite {
                kind: WriteKind::Timestamp,
                row_owner: respondent.to_string(),
                cell: CellRef::new(row, column),
                value: CellValue::Text(stamp),
                format: Some(CellFormat::right_aligned()),
            });
        }
        None => record.skipped.push(SkippedWrite {
            category: "Invalid Row/Col for Timestamp".to_string(),
            message: format!("Submitter: {respondent} (row not found). LastSubmittedCol: {column}"),
        }),
    }

    Ok(RouteOutcome::Written(record))
}

/// 提交路由流程
///
/// - 不持有任何资源，只借用外部协作者
/// - 每次提交都重新读名单
pub struct SubmissionRouter<'a, S, F, C, L> {
    sheets: &'a S,
    forms: &'a F,
    classroom: &'a C,
    codec: &'a ContextCodec,
    log: &'a L,
}

impl<'a, S, F, C, L> SubmissionRouter<'a, S, F, C, L>
where
    S: Spreadsheet,
    F: FormService,
    C: Classroom,
    L: ErrorLog,
{
    pub fn new(
        sheets: &'a S,
        forms: &'a F,
        classroom: &'a C,
        codec: &'a ContextCodec,
        log: &'a L,
    ) -> Self {
        Self {
            sheets,
            forms,
            classroom,
            codec,
            log,
        }
    }

    /// 处理一次提交
    ///
    /// 任何中止都会记到错误日志，返回 `None`。
    pub async fn route(&self, event: &SubmissionEvent) -> Option<RouteOutcome> {
        let ctx = SubmissionCtx::new(&event.form_id, &event.respondent_email, self.sheets.id());
        info!("{} 📥 收到提交，共 {} 个作答", ctx, event.answers.len());

        match self.try_route(&ctx, event).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("{} ⚠️ 提交处理中止: {}", ctx, e);
                self.log.record(
                    ErrorEntry::from_error(&ctx.respondent_email, &ctx.spreadsheet_id, "Submission", &e)
                        .with_detail(format!("Form: {}", ctx.form_id)),
                );
                None
            }
        }
    }

    /// 读取一份作答后处理
    pub async fn route_response(&self, form_id: &str, response_id: &str) -> Option<RouteOutcome> {
        match self.forms.response(form_id, response_id).await {
            Ok(event) => self.route(&event).await,
            Err(e) => {
                warn!("[提交 表单#{}] ⚠️ 读取作答 {} 失败: {}", form_id, response_id, e);
                self.log.record(
                    ErrorEntry::from_error("", self.sheets.id(), "Submission", &e)
                        .with_detail(format!("Form: {form_id}, Response: {response_id}")),
                );
                None
            }
        }
    }

    /// 处理一条 Forms watch 通知
    ///
    /// 通知不带 response id，所以把发布时间附近提交的作答都处理一遍；
    /// 同一份作答重复处理写入的值不变。
    pub async fn route_notification(&self, notification: &FormNotification) -> Vec<RouteOutcome> {
        let form_id = notification.form_id();
        if form_id.is_empty() || !notification.is_responses() {
            debug!(
                "忽略通知: 表单 '{}' 事件 '{}'",
                form_id, notification.message.attributes.event_type
            );
            return Vec::new();
        }

        let since = notification.message.publish_time - Duration::minutes(NOTIFICATION_LOOKBACK_MINUTES);
        let response_ids = match self.forms.responses_since(form_id, since).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("[提交 表单#{}] ⚠️ 读取作答列表失败: {}", form_id, e);
                self.log.record(
                    ErrorEntry::from_error("", self.sheets.id(), "Submission", &e)
                        .with_detail(format!("Form: {form_id}, since {since}")),
                );
                return Vec::new();
            }
        };
        info!("[提交 表单#{}] 🔔 通知对应 {} 份作答", form_id, response_ids.len());

        let mut outcomes = Vec::with_capacity(response_ids.len());
        for response_id in &response_ids {
            if let Some(outcome) = self.route_response(form_id, response_id).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    async fn try_route(&self, ctx: &SubmissionCtx, event: &SubmissionEvent) -> AppResult<RouteOutcome> {
        // ========== 步骤 1: 解出上下文 ==========
        let description = self.forms.description(&event.form_id).await?;
        let context = self.codec.decode_description(&description)?;
        debug!("{} 上下文: 工作表 {} / 小组 {}", ctx, context.sheet, context.group);

        // ========== 步骤 2: 工作表和提交者 ==========
        if !self.sheets.sheet_exists(&context.sheet).await? {
            return Err(LookupError::SheetNotFound(context.sheet.clone()).into());
        }
        let respondent = self.resolve_respondent(ctx, &context).await?;

        // ========== 步骤 3: 重新计算布局 ==========
        let snapshot = read_roster(
            self.sheets,
            &context.sheet,
            &context.names_range,
            &context.group_names_range,
        )
        .await?;
        let layout = snapshot.layout(parse_start_column(&context.eval_start_column)?);

        // ========== 步骤 4: 计算写入 ==========
        let outcome = plan(&context, &layout, &respondent, &event.answers, event.submitted_at)?;
        let mut record = match outcome {
            RouteOutcome::Ignored {
                respondent,
                actual_group,
                form_group,
            } => {
                info!(
                    "{} 提交者 {} 属于小组 {}，不是本表单的小组 {}，忽略",
                    ctx, respondent, actual_group, form_group
                );
                self.log.record(
                    ErrorEntry::new(
                        &ctx.respondent_email,
                        &ctx.spreadsheet_id,
                        "Submission Info",
                        format!(
                            "Submitter {respondent} (Actual Group: {actual_group}) for form of Group {form_group} ignored. Mismatch."
                        ),
                    )
                    .with_detail(format!("Sheet: {}", context.sheet)),
                );
                return Ok(RouteOutcome::Ignored {
                    respondent,
                    actual_group,
                    form_group,
                });
            }
            RouteOutcome::Written(record) => record,
        };

        for skipped in &record.skipped {
            warn!("{} 跳过写入: {} - {}", ctx, skipped.category, skipped.message);
            self.log.record(ErrorEntry::new(
                &ctx.respondent_email,
                &ctx.spreadsheet_id,
                format!("Submission {}", skipped.category),
                &skipped.message,
            ));
        }

        // ========== 步骤 5: 逐个写入 ==========
        let planned = std::mem::take(&mut record.writes);
        for write in planned {
            match self.apply(&context.sheet, &write).await {
                Ok(()) => record.writes.push(write),
                Err(e) => {
                    let err = AppError::write_failed(format!("{}!{}", context.sheet, write.cell), &e);
                    warn!("{} ⚠️ {} 写入失败: {}", ctx, write.kind.label(), err);
                    self.log.record(
                        ErrorEntry::from_error(&ctx.respondent_email, &ctx.spreadsheet_id, "Submission", &err)
                            .with_detail(format!(
                                "{} for {} at {}: {}",
                                write.kind.label(),
                                write.row_owner,
                                write.cell,
                                write.value.display()
                            )),
                    );
                }
            }
        }

        info!(
            "{} ✓ 已处理: {} (小组 {}, 序号 {})，写入 {} 个单元格",
            ctx,
            record.respondent,
            record.group,
            record.index_in_group,
            record.writes.len()
        );
        Ok(RouteOutcome::Written(record))
    }

    async fn resolve_respondent(&self, ctx: &SubmissionCtx, context: &FormContext) -> AppResult<String> {
        let service = ClassroomService::new(self.classroom);
        let course_id = service.course_id_by_name(&context.course).await?;
        let name = match service
            .resolve_respondent_name(&course_id, &ctx.respondent_email)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                self.log.record(
                    ErrorEntry::new(
                        &ctx.respondent_email,
                        &ctx.spreadsheet_id,
                        "Submission Warning",
                        format!(
                            "Could not map email {} for course \"{}\" via list. Error: {}",
                            ctx.respondent_email, context.course, e
                        ),
                    )
                    .with_detail(format!("Form: {}", ctx.form_id)),
                );
                None
            }
        };
        name.ok_or_else(|| LookupError::RespondentUnknown(ctx.respondent_email.clone()).into())
    }

    async fn apply(&self, sheet: &str, write: &CellWrite) -> AppResult<()> {
        self.sheets
            .write_cell(sheet, write.cell, write.value.clone())
            .await?;
        if let Some(format) = write.format {
            self.sheets
                .set_format(sheet, A1Range::single(write.cell), format)
                .await?;
        }
        Ok(())
    }
}
