use super::IdentityDirectory;
use crate::error::{CrmError, Result, StoreError, ValidationError};
use crate::model::{Account, Identity, ObjectRef, Person, Profile, Role};
use crate::store::{Document, DocumentStore, Filter};
use crate::tasks::{ProgressAggregator, TaskFilter, TaskStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ACCOUNTS: &str = "accounts";
const PROFILES: &str = "profiles";
/// 以邮箱为主键的唯一索引，登记时靠主键冲突判重
const ACCOUNT_EMAILS: &str = "accountEmails";

/// 资料页可选的职位
pub const POSITIONS: [&str; 5] = [
    "Front End Developer",
    "Back End Developer",
    "UI/UX Designer",
    "Data Scientist",
    "QA Engineer",
];

/// 新建导师/成员的请求
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub position: Option<String>,
}

/// 部分更新，全部为 `None` 时拒绝
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
}

impl PersonUpdate {
    fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.position.is_none()
    }
}

/// 本人资料的部分更新；邮箱与角色不在其中
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub avatar: Option<String>,
    pub position: Option<String>,
}

impl ProfileUpdate {
    fn is_empty(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.date_of_birth,
            &self.phone,
            &self.country,
            &self.city,
            &self.postal_code,
            &self.avatar,
            &self.position,
        ]
        .iter()
        .all(|field| field.is_none())
    }

    /// 姓名或职位变了，角色记录需要跟着改
    fn touches_person(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some() || self.position.is_some()
    }
}

/// 列表项：角色记录 + 关联任务数
#[derive(Debug, Clone, Serialize)]
pub struct PersonSummary {
    #[serde(flatten)]
    pub person: Person,
    pub task: usize,
}

/// 删除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// 角色记录删除前是否存在
    pub existed: bool,
    /// 被清理引用的任务数
    pub tasks_updated: usize,
}

/// 导师/成员登记簿
///
/// 登记先占用邮箱索引再依次写账号、资料、角色记录，后续写入失败时
/// 尽力删掉已写的部分。删除会级联：先删角色记录、账号、资料，再清理
/// 任务里的悬挂引用。即使角色记录已经不存在，引用清理也照常执行。
/// 这些多文档序列都不是事务。
pub struct PeopleRegistry {
    store: Arc<dyn DocumentStore>,
    tasks: Arc<dyn TaskStore>,
    aggregator: ProgressAggregator,
}

impl PeopleRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        tasks: Arc<dyn TaskStore>,
        aggregator: ProgressAggregator,
    ) -> Self {
        Self {
            store,
            tasks,
            aggregator,
        }
    }

    pub async fn register(&self, role: Role, input: NewPerson) -> Result<Person> {
        let email = input.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(ValidationError::MissingField("email".to_string()).into());
        }
        if !email.contains('@') {
            return Err(ValidationError::InvalidValue {
                field: "email".to_string(),
                message: "not an e-mail address".to_string(),
            }
            .into());
        }
        let first_name = required_text(&input.first_name, "firstName")?;
        let last_name = required_text(&input.last_name, "lastName")?;
        let position = required_text(input.position.as_deref().unwrap_or_default(), "position")?;

        let id = ObjectRef::generate();
        match self
            .store
            .insert(ACCOUNT_EMAILS, &email, json!({ "accountId": id }))
            .await
        {
            Ok(_) => {}
            Err(CrmError::Store(StoreError::DuplicateKey { .. })) => {
                return Err(CrmError::Conflict(format!(
                    "{role} with this email already exists."
                )));
            }
            Err(e) => return Err(e),
        }

        let now = Utc::now();
        let account = Account {
            id: id.clone(),
            email: email.clone(),
            role,
            created_at: now,
        };
        let profile = Profile {
            id: id.clone(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            email: email.clone(),
            role,
            position: Some(position.clone()),
            date_of_birth: None,
            phone: None,
            country: None,
            city: None,
            postal_code: None,
            avatar: None,
        };
        let person = Person {
            id: id.clone(),
            first_name,
            last_name,
            email: email.clone(),
            position: Some(position),
            created_at: now,
        };

        if let Err(e) = self.write_records(role, &account, &profile, &person).await {
            warn!(id = %id, role = %role, error = %e, "❌ 登记写入失败，回滚已写记录");
            self.discard(role, &id, &email).await;
            return Err(e);
        }
        info!(id = %id, role = %role, "👤 已登记新{}", role);
        Ok(person)
    }

    async fn write_records(
        &self,
        role: Role,
        account: &Account,
        profile: &Profile,
        person: &Person,
    ) -> Result<()> {
        let id = account.id.as_str();
        self.store
            .insert(ACCOUNTS, id, serde_json::to_value(account)?)
            .await?;
        self.store
            .insert(PROFILES, id, serde_json::to_value(profile)?)
            .await?;
        if let Some(collection) = role.collection() {
            self.store
                .insert(collection, id, serde_json::to_value(person)?)
                .await?;
        }
        Ok(())
    }

    /// 尽力删除一次登记留下的所有记录
    async fn discard(&self, role: Role, id: &ObjectRef, email: &str) {
        let mut targets = vec![
            (ACCOUNTS, id.as_str()),
            (PROFILES, id.as_str()),
            (ACCOUNT_EMAILS, email),
        ];
        if let Some(collection) = role.collection() {
            targets.push((collection, id.as_str()));
        }
        for (collection, key) in targets {
            if let Err(e) = self.store.delete(collection, key).await {
                warn!(collection, key, error = %e, "⚠️ 登记回滚失败");
            }
        }
    }

    pub async fn list(&self, role: Role) -> Result<Vec<PersonSummary>> {
        let collection = role_collection(role)?;
        let docs = self.store.find(collection, &Filter::All).await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let person: Person = serde_json::from_value(doc.body)?;
            let filter = match role {
                Role::Mentor => TaskFilter::for_mentor(person.id.clone()),
                _ => TaskFilter::for_member(person.id.clone()),
            };
            let task = self.tasks.count(&filter).await?;
            out.push(PersonSummary { person, task });
        }
        Ok(out)
    }

    pub async fn edit(&self, role: Role, id: &ObjectRef, update: PersonUpdate) -> Result<Person> {
        let collection = role_collection(role)?;
        if update.is_empty() {
            return Err(ValidationError::NoFieldsToUpdate.into());
        }
        let Some(doc) = self.store.get(collection, id.as_str()).await? else {
            return Err(CrmError::NotFound(format!("{role} not found.")));
        };
        let mut person: Person = serde_json::from_value(doc.body)?;
        if let Some(first) = &update.first_name {
            person.first_name = first.trim().to_string();
        }
        if let Some(last) = &update.last_name {
            person.last_name = last.trim().to_string();
        }
        set_optional(&mut person.position, &update.position);
        self.store
            .replace(
                collection,
                id.as_str(),
                serde_json::to_value(&person)?,
                Some(doc.version),
            )
            .await?;

        // 资料与角色记录保持同名
        if let Some(profile_doc) = self.store.get(PROFILES, id.as_str()).await? {
            let mut profile: Profile = serde_json::from_value(profile_doc.body)?;
            profile.first_name = person.first_name.clone();
            profile.last_name = person.last_name.clone();
            profile.position = person.position.clone();
            self.store
                .replace(
                    PROFILES,
                    id.as_str(),
                    serde_json::to_value(&profile)?,
                    Some(profile_doc.version),
                )
                .await?;
        }
        info!(id = %id, role = %role, "✏️ {}资料已更新", role);
        Ok(person)
    }

    pub async fn remove(&self, role: Role, id: &ObjectRef) -> Result<Removal> {
        let collection = role_collection(role)?;
        let existed = self.store.delete(collection, id.as_str()).await?.is_some();
        if let Some(doc) = self.store.delete(ACCOUNTS, id.as_str()).await? {
            let account: Account = serde_json::from_value(doc.body)?;
            self.store.delete(ACCOUNT_EMAILS, &account.email).await?;
        }
        self.store.delete(PROFILES, id.as_str()).await?;

        let tasks_updated = match role {
            Role::Mentor => self.tasks.detach_mentor(id).await?,
            _ => self.tasks.detach_member(id, &self.aggregator).await?,
        };
        if existed {
            info!(id = %id, role = %role, tasks_updated, "🗑️ {}已删除", role);
        } else {
            warn!(id = %id, role = %role, tasks_updated, "{}记录不存在，仅清理了任务引用", role);
        }
        Ok(Removal {
            existed,
            tasks_updated,
        })
    }

    async fn profile_doc(&self, email: &str) -> Result<Option<(Document, Profile)>> {
        let email = email.trim().to_ascii_lowercase();
        let docs = self
            .store
            .find(PROFILES, &Filter::eq("email", email.as_str()))
            .await?;
        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };
        let profile: Profile = serde_json::from_value(doc.body.clone())?;
        Ok(Some((doc, profile)))
    }

    /// 按凭证邮箱取本人资料
    pub async fn profile_for(&self, email: &str) -> Result<Profile> {
        self.profile_doc(email)
            .await?
            .map(|(_, profile)| profile)
            .ok_or_else(|| CrmError::NotFound("User not found.".to_string()))
    }

    /// 更新本人资料；姓名和职位同步到导师/成员记录
    pub async fn edit_profile(&self, email: &str, update: ProfileUpdate) -> Result<Profile> {
        if update.is_empty() {
            return Err(ValidationError::NoFieldsToUpdate.into());
        }
        let Some((doc, mut profile)) = self.profile_doc(email).await? else {
            return Err(CrmError::NotFound("Profile not found.".to_string()));
        };
        if let Some(first) = &update.first_name {
            profile.first_name = first.trim().to_string();
        }
        if let Some(last) = &update.last_name {
            profile.last_name = last.trim().to_string();
        }
        set_optional(&mut profile.date_of_birth, &update.date_of_birth);
        set_optional(&mut profile.phone, &update.phone);
        set_optional(&mut profile.country, &update.country);
        set_optional(&mut profile.city, &update.city);
        set_optional(&mut profile.postal_code, &update.postal_code);
        set_optional(&mut profile.avatar, &update.avatar);
        set_optional(&mut profile.position, &update.position);
        self.store
            .replace(
                PROFILES,
                &doc.id,
                serde_json::to_value(&profile)?,
                Some(doc.version),
            )
            .await?;

        if update.touches_person()
            && let Some(collection) = profile.role.collection()
        {
            match self.store.get(collection, profile.id.as_str()).await? {
                Some(record) => {
                    let mut person: Person = serde_json::from_value(record.body)?;
                    person.first_name = profile.first_name.clone();
                    person.last_name = profile.last_name.clone();
                    person.position = profile.position.clone();
                    self.store
                        .replace(
                            collection,
                            profile.id.as_str(),
                            serde_json::to_value(&person)?,
                            Some(record.version),
                        )
                        .await?;
                }
                None => debug!(id = %profile.id, role = %profile.role, "资料没有对应的角色记录"),
            }
        }
        info!(id = %profile.id, "🪪 个人资料已更新");
        Ok(profile)
    }
}

fn identity_from_profile(profile: Profile) -> Identity {
    Identity {
        id: profile.id,
        email: profile.email,
        first_name: profile.first_name,
        last_name: profile.last_name,
        role: profile.role,
    }
}

fn required_text(raw: &str, field: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()).into());
    }
    Ok(value.to_string())
}

/// `Some("")` 清空字段，`None` 保持不变
fn set_optional(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *slot = Some(value.trim().to_string()).filter(|v| !v.is_empty());
    }
}

fn role_collection(role: Role) -> Result<&'static str> {
    role.collection()
        .ok_or_else(|| CrmError::InvalidState("Admin accounts have no role record.".to_string()))
}

#[async_trait]
impl IdentityDirectory for PeopleRegistry {
    async fn find_by_id(&self, id: &ObjectRef) -> Result<Option<Identity>> {
        let Some(doc) = self.store.get(PROFILES, id.as_str()).await? else {
            return Ok(None);
        };
        let profile: Profile = serde_json::from_value(doc.body)?;
        Ok(Some(identity_from_profile(profile)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        Ok(self
            .profile_doc(email)
            .await?
            .map(|(_, profile)| identity_from_profile(profile)))
    }
}
