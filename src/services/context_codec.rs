//! 表单上下文编解码
//!
//! JSON → 按密钥循环异或 → base64。这只是防止随手改动的混淆，不是加密：
//! 任何拿到密钥（或足够多样本）的人都能还原内容。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::Config;
use crate::error::{AppResult, DecodeError};
use crate::models::FormContext;

/// 表单描述中上下文行的前缀
pub const CONTEXT_LINE_PREFIX: &str = "Form Data (do not edit): ";

#[derive(Debug, Clone)]
pub struct ContextCodec {
    secret: Vec<u8>,
}

impl ContextCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.context_secret)
    }

    pub fn encode(&self, context: &FormContext) -> AppResult<String> {
        let json = serde_json::to_vec(context)?;
        Ok(STANDARD.encode(self.transform(json)))
    }

    pub fn decode(&self, blob: &str) -> Result<FormContext, DecodeError> {
        let bytes = STANDARD.decode(blob.trim())?;
        let context: FormContext = serde_json::from_slice(&self.transform(bytes))?;
        context.validate()?;
        Ok(context)
    }

    /// 描述中的上下文行
    pub fn embed(blob: &str) -> String {
        format!("{CONTEXT_LINE_PREFIX}{blob}")
    }

    /// 从表单描述中取出编码后的上下文
    pub fn extract(description: &str) -> Result<&str, DecodeError> {
        description
            .lines()
            .find_map(|line| line.strip_prefix(CONTEXT_LINE_PREFIX.trim_end()))
            .map(str::trim)
            .filter(|blob| !blob.is_empty())
            .ok_or(DecodeError::ContextLineMissing)
    }

    /// 从表单描述中解出上下文
    pub fn decode_description(&self, description: &str) -> Result<FormContext, DecodeError> {
        self.decode(Self::extract(description)?)
    }

    fn transform(&self, mut bytes: Vec<u8>) -> Vec<u8> {
        if self.secret.is_empty() {
            return bytes;
        }
        for (byte, key) in bytes.iter_mut().zip(self.secret.iter().cycle()) {
            *byte ^= key;
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionKind, TaggedQuestion};

    fn sample() -> FormContext {
        FormContext {
            sheet: "Période 1".into(),
            names_range: "A2:A17".into(),
            group_names_range: "B2:B17".into(),
            eval_start_column: "E".into(),
            course: "Biology 101".into(),
            group: "A".into(),
            utc_offset: "-0530".into(),
            include_justification: true,
            include_feedback: true,
            questions: vec![
                TaggedQuestion {
                    item_id: "1a2b".into(),
                    question_id: "5e6f".into(),
                    kind: QuestionKind::RatePeer { peer: "Zoë".into() },
                },
                TaggedQuestion {
                    item_id: "3c4d".into(),
                    question_id: String::new(),
                    kind: QuestionKind::Feedback,
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = ContextCodec::new("YourSecretKeyForXOR");
        let blob = codec.encode(&sample()).unwrap();
        assert!(!blob.contains("Biology"));
        assert_eq!(codec.decode(&blob).unwrap(), sample());
    }

    #[test]
    fn test_round_trip_through_description() {
        let codec = ContextCodec::new("k");
        let blob = codec.encode(&sample()).unwrap();
        let description = format!(
            "{}\n\nThis form is for Group A only.\nGroup Members: Alice, Bob\n\nThanks!",
            ContextCodec::embed(&blob)
        );
        assert_eq!(codec.decode_description(&description).unwrap(), sample());
    }

    #[test]
    fn test_bad_base64() {
        let codec = ContextCodec::new("k");
        assert!(matches!(
            codec.decode("not base64 !!"),
            Err(DecodeError::NotEncoded(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let blob = ContextCodec::new("right").encode(&sample()).unwrap();
        assert!(matches!(
            ContextCodec::new("wrong").decode(&blob),
            Err(DecodeError::NotStructured(_))
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let codec = ContextCodec::new("k");
        let mut context = sample();
        context.group = String::new();
        let blob = codec.encode(&context).unwrap();
        assert!(matches!(
            codec.decode(&blob),
            Err(DecodeError::MissingField("group"))
        ));
    }

    #[test]
    fn test_flags_default_to_false() {
        let codec = ContextCodec::new("k");
        let json = r#"{"sheet":"S","namesR":"A2:A3","groupsR":"B2:B3","evalR":"E","course":"C","group":"1","utcOff":"+0000"}"#;
        let blob = STANDARD.encode(codec.transform(json.as_bytes().to_vec()));
        let context = codec.decode(&blob).unwrap();
        assert!(!context.include_justification);
        assert!(!context.include_feedback);
        assert!(context.questions.is_empty());
    }

    #[test]
    fn test_missing_context_line() {
        assert!(matches!(
            ContextCodec::extract("Just a description"),
            Err(DecodeError::ContextLineMissing)
        ));
    }
}
