use super::lock;
use crate::error::{CrmError, Result, StoreError};
use crate::identity::IdentityDirectory;
use crate::model::{Identity, ObjectRef, Role};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// 内存版身份目录，测试时预置身份或模拟查询失败
#[derive(Default)]
pub struct MockIdentityDirectory {
    identities: Vec<Identity>,
    failing: bool,
    lookups: Arc<Mutex<usize>>,
}

impl MockIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// 快捷构造：按名字和角色生成一个身份，邮箱为 `<first>@example.com`
    pub fn with_person(self, id: &ObjectRef, first: &str, last: &str, role: Role) -> Self {
        self.with_identity(Identity {
            id: id.clone(),
            email: format!("{}@example.com", first.to_ascii_lowercase()),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role,
        })
    }

    /// 所有查询都返回错误
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn lookup_count(&self) -> usize {
        *lock(&self.lookups)
    }

    fn record(&self) -> Result<()> {
        *lock(&self.lookups) += 1;
        if self.failing {
            return Err(CrmError::Store(StoreError::Unavailable(
                "mock directory outage".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for MockIdentityDirectory {
    async fn find_by_id(&self, id: &ObjectRef) -> Result<Option<Identity>> {
        self.record()?;
        Ok(self.identities.iter().find(|i| &i.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        self.record()?;
        let email = email.trim().to_ascii_lowercase();
        Ok(self.identities.iter().find(|i| i.email == email).cloned())
    }
}
