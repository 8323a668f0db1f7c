//! 身份存储
//!
//! 账号（`accounts`）、资料（`profiles`）和角色记录（`mentors` / `members`）
//! 共用同一个 ID。任务与通知只通过 [`IdentityDirectory`] 读取身份；
//! 导师/成员的增删改以及本人资料的查看和修改由 [`PeopleRegistry`] 负责。

mod registry;

pub use registry::{
    NewPerson, POSITIONS, PeopleRegistry, PersonSummary, PersonUpdate, ProfileUpdate, Removal,
};

use crate::error::Result;
use crate::model::{Identity, ObjectRef};
use async_trait::async_trait;

/// 身份查询接口
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_by_id(&self, id: &ObjectRef) -> Result<Option<Identity>>;

    /// 邮箱比较不区分大小写
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;
}
