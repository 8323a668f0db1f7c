//! 身份记录：账号、资料与角色记录共享同一个 ID

use super::reference::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 账号角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Mentor,
    Member,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "mentor" => Some(Role::Mentor),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Mentor => "Mentor",
            Role::Member => "Member",
        }
    }

    /// 该角色对应的角色记录集合
    pub fn collection(self) -> Option<&'static str> {
        match self {
            Role::Mentor => Some("mentors"),
            Role::Member => Some("members"),
            Role::Admin => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 登录账号（密码等凭证由外部认证服务持有）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: ObjectRef,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// 个人资料，邮箱与角色不可经资料接口修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ObjectRef,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// 头像路径，文件本身由上传服务保存
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// 导师 / 成员角色记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: ObjectRef,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 解析后的身份视图，用于通知寻址和消息拼装
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: ObjectRef,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl Identity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// 上游已校验的调用方凭证：只带邮箱与角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub email: String,
    pub role: Role,
}

impl Credential {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into().trim().to_ascii_lowercase(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" MENTOR "), Some(Role::Mentor));
        assert_eq!(Role::parse("guest"), None);
        assert_eq!(Role::Member.collection(), Some("members"));
        assert_eq!(Role::Admin.collection(), None);
    }

    #[test]
    fn test_credential_normalizes_email() {
        let credential = Credential::new(" Jane@Example.COM ", Role::Mentor);
        assert_eq!(credential.email, "jane@example.com");
        assert!(!credential.is_admin());
    }

    #[test]
    fn test_display_name_without_last_name() {
        let identity = Identity {
            id: ObjectRef::generate(),
            email: "a@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: String::new(),
            role: Role::Member,
        };
        assert_eq!(identity.display_name(), "Alice");
    }
}
