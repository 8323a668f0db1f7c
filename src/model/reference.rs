//! 实体引用
//!
//! 所有实体之间以弱引用相连，不做外键约束。引用的唯一规范编码是
//! 24 位小写十六进制字符串；输入大小写不敏感，解析后统一转为小写，
//! 因此任意两个 [`ObjectRef`] 可以直接比较。

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

const REF_LEN: usize = 24;

/// 弱引用标识（24 位十六进制）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectRef(String);

impl ObjectRef {
    /// 生成一个新的随机引用
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(hex[..REF_LEN].to_string())
    }

    /// 解析调用方传入的引用，`field` 用于错误提示
    pub fn parse(raw: &str, field: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.len() != REF_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidReference {
                field: field.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// 解析引用列表，去重并保留首次出现的顺序
    pub fn parse_set(raws: &[String], field: &str) -> Result<Vec<Self>, ValidationError> {
        let mut refs: Vec<Self> = Vec::with_capacity(raws.len());
        for raw in raws {
            let parsed = Self::parse(raw, field)?;
            if !refs.contains(&parsed) {
                refs.push(parsed);
            }
        }
        Ok(refs)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value, "reference")
    }
}

impl From<ObjectRef> for String {
    fn from(value: ObjectRef) -> Self {
        value.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
