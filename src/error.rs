use thiserror::Error;

/// 应用程序错误类型
///
/// 分类与处理策略：
/// - `Validation`：用户配置错误，直接把消息返回给调用方
/// - `Lookup`：课程/主题/学生找不到，生成前预检，生成时再次硬性检查
/// - `Write`：单个单元格写入失败，记录日志后跳过
/// - `Decode`：表单上下文损坏，只中止当前这一次提交事件
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置校验错误（范围语法、必填项、日期格式等）
    #[error("{0}")]
    Validation(String),
    /// 查找失败
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// 单元格写入失败
    #[error("write to {target} failed: {reason}")]
    Write { target: String, reason: String },
    /// 表单上下文解码失败
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// 外部服务调用错误
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// 配置文件 / 环境变量错误
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// 文件读写错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON 序列化错误
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 查找错误
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Sheet \"{0}\" not found.")]
    SheetNotFound(String),
    #[error("No active courses found in Google Classroom.")]
    NoActiveCourses,
    #[error("Course \"{0}\" not found. Check name and ensure it's active.")]
    CourseNotFound(String),
    #[error("Topic \"{name}\" not found and could not be created: {reason}")]
    TopicUnavailable { name: String, reason: String },
    #[error("No students found in the specified Google Classroom course.")]
    EmptyClassroomRoster,
    #[error("Respondent {0} could not be mapped to a Classroom full name.")]
    RespondentUnknown(String),
    #[error("Submitter {name} not found in any group on sheet {sheet}.")]
    SubmitterNotInRoster { name: String, sheet: String },
}

/// 表单上下文解码错误
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 描述中没有上下文行
    #[error("form context line not found in description")]
    ContextLineMissing,
    /// 不是合法的 base64 文本
    #[error("form context is not validly encoded: {0}")]
    NotEncoded(#[from] base64::DecodeError),
    /// 解混淆后不是合法的 JSON
    #[error("form context is not valid structured data: {0}")]
    NotStructured(#[from] serde_json::Error),
    /// 缺少必填字段
    #[error("form context is missing required field `{0}`")]
    MissingField(&'static str),
}

/// 外部服务调用错误
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 网络请求失败
    #[error("{service} request to {endpoint} failed: {source}")]
    RequestFailed {
        service: &'static str,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 服务返回错误响应
    #[error("{service} returned {status} for {endpoint}: {message}")]
    BadResponse {
        service: &'static str,
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 目标资源不存在
    #[error("{service}: {what} not found")]
    NotFound { service: &'static str, what: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("cannot read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("cannot parse {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("environment variable {var_name} has value '{value}' which is not a valid {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建配置校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// 创建单元格写入错误
    pub fn write_failed(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AppError::Write {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建服务请求失败错误
    pub fn request_failed(
        service: &'static str,
        endpoint: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        AppError::Service(ServiceError::RequestFailed {
            service,
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建资源不存在错误
    pub fn not_found(service: &'static str, what: impl Into<String>) -> Self {
        AppError::Service(ServiceError::NotFound {
            service,
            what: what.into(),
        })
    }

    /// 错误分类名，写入开发者错误日志的 category 列
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::Lookup(_) => "LookupError",
            AppError::Write { .. } => "WriteError",
            AppError::Decode(_) => "DecodeError",
            AppError::Service(_) => "ServiceError",
            AppError::Config(_) => "ConfigError",
            AppError::Io(_) => "IoError",
            AppError::Json(_) => "JsonError",
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = AppError::validation("Sheet Name is required.");
        assert_eq!(err.to_string(), "Sheet Name is required.");
        assert_eq!(err.category(), "ValidationError");
    }

    #[test]
    fn test_lookup_messages() {
        let err: AppError = LookupError::CourseNotFound("Biology 101".into()).into();
        assert_eq!(
            err.to_string(),
            "Course \"Biology 101\" not found. Check name and ensure it's active."
        );
        assert_eq!(err.category(), "LookupError");
    }

    #[test]
    fn test_decode_missing_field() {
        let err: AppError = DecodeError::MissingField("sheet").into();
        assert!(err.to_string().contains("`sheet`"));
        assert_eq!(err.category(), "DecodeError");
    }
}
