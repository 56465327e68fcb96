//! # 关系元组与权限检查
//!
//! 元组形如 `resource#relation@subject`，主体可以是具体对象，也可以是
//! userset（`object#relation`）。权限检查是在元组图上的深度优先搜索。

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use entity::relationship_tuples;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::database::serializable;
use crate::error::{Result, TicketingError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

const PERMISSION_SUFFIX: &str = "_permission";

/// 被引用的对象
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl ToString) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.to_string(),
        }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.object_type.trim().is_empty() {
            return Err(TicketingError::validation(
                format!("{field}.object_type"),
                "object type must not be empty",
            ));
        }
        if self.object_id.trim().is_empty() {
            return Err(TicketingError::validation(
                format!("{field}.object_id"),
                "object id must not be empty",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// 元组的主体，`relation` 非空时表示 userset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectRef {
    pub object: ObjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl SubjectRef {
    #[must_use]
    pub const fn object(object: ObjectRef) -> Self {
        Self {
            object,
            relation: None,
        }
    }

    pub fn userset(object: ObjectRef, relation: impl Into<String>) -> Self {
        Self {
            object,
            relation: Some(relation.into()),
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}#{relation}", self.object),
            None => self.object.fmt(f),
        }
    }
}

/// 关系元组
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub resource: ObjectRef,
    pub relation: String,
    pub subject: SubjectRef,
}

impl Relationship {
    pub fn validate(&self) -> Result<()> {
        self.resource.validate("resource")?;
        self.subject.object.validate("subject")?;
        if self.relation.trim().is_empty() {
            return Err(TicketingError::validation("relation", "relation must not be empty"));
        }
        if self.subject.relation.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(TicketingError::validation(
                "subject.relation",
                "subject relation must not be empty when present",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.resource, self.relation, self.subject)
    }
}

/// 写操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOperation {
    /// 不存在则创建，存在则保持
    Touch,
    /// 已存在时报错
    Create,
    /// 不存在时忽略
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipUpdate {
    pub operation: UpdateOperation,
    pub relationship: Relationship,
}

/// 读取过滤条件，空字段不参与过滤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipFilter {
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub relation: Option<String>,
    pub subject: Option<SubjectRef>,
}

impl RelationshipFilter {
    fn matches(&self, relationship: &Relationship) -> bool {
        relationship.resource.object_type == self.resource_type
            && self
                .resource_id
                .as_ref()
                .is_none_or(|id| *id == relationship.resource.object_id)
            && self
                .relation
                .as_ref()
                .is_none_or(|relation| *relation == relationship.relation)
            && self
                .subject
                .as_ref()
                .is_none_or(|subject| *subject == relationship.subject)
    }
}

/// 关系元组存储
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// 原子地应用一批写操作
    async fn write(&self, updates: &[RelationshipUpdate]) -> Result<()>;

    async fn read(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>>;

    /// 某资源在某关系上的全部主体
    async fn subjects(&self, resource: &ObjectRef, relation: &str) -> Result<Vec<SubjectRef>>;
}

/// 去掉可选的 `_permission` 后缀
#[must_use]
pub fn relation_for_permission(permission: &str) -> &str {
    permission
        .strip_suffix(PERMISSION_SUFFIX)
        .filter(|relation| !relation.is_empty())
        .unwrap_or(permission)
}

/// 判断 `subject` 是否对 `resource` 拥有 `permission`
///
/// userset 主体会递归展开；`(resource, relation)` 访问过一次后不再展开，
/// 因此环不会导致死循环。
pub async fn check_permission(
    store: &dyn RelationshipStore,
    resource: &ObjectRef,
    permission: &str,
    subject: &SubjectRef,
) -> Result<bool> {
    let relation = relation_for_permission(permission);
    let mut visited: HashSet<(ObjectRef, String)> = HashSet::new();
    let mut pending = vec![(resource.clone(), relation.to_string())];

    while let Some((resource, relation)) = pending.pop() {
        if !visited.insert((resource.clone(), relation.clone())) {
            continue;
        }
        for candidate in store.subjects(&resource, &relation).await? {
            if candidate == *subject {
                ldebug!(
                    "system",
                    LogStage::Authorization,
                    LogComponent::Relationships,
                    "permission_granted",
                    &format!("{resource}#{relation}@{subject}")
                );
                return Ok(true);
            }
            if let Some(userset_relation) = candidate.relation {
                pending.push((candidate.object, userset_relation));
            }
        }
    }
    Ok(false)
}

/// 内存实现
#[derive(Debug, Default)]
pub struct MemoryRelationshipStore {
    tuples: DashMap<(ObjectRef, String), Vec<SubjectRef>>,
}

impl MemoryRelationshipStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn exists(&self, relationship: &Relationship) -> bool {
        self.tuples
            .get(&(relationship.resource.clone(), relationship.relation.clone()))
            .is_some_and(|subjects| subjects.contains(&relationship.subject))
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn write(&self, updates: &[RelationshipUpdate]) -> Result<()> {
        for update in updates {
            update.relationship.validate()?;
            if update.operation == UpdateOperation::Create && self.exists(&update.relationship) {
                return Err(TicketingError::already_exists(
                    "relationship",
                    &update.relationship,
                ));
            }
        }

        for update in updates {
            let relationship = &update.relationship;
            let key = (relationship.resource.clone(), relationship.relation.clone());
            match update.operation {
                UpdateOperation::Touch | UpdateOperation::Create => {
                    let mut subjects = self.tuples.entry(key).or_default();
                    if !subjects.contains(&relationship.subject) {
                        subjects.push(relationship.subject.clone());
                    }
                }
                UpdateOperation::Delete => {
                    if let Some(mut subjects) = self.tuples.get_mut(&key) {
                        subjects.retain(|subject| *subject != relationship.subject);
                    }
                    self.tuples.remove_if(&key, |_, subjects| subjects.is_empty());
                }
            }
        }
        Ok(())
    }

    async fn read(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut found: Vec<Relationship> = self
            .tuples
            .iter()
            .flat_map(|entry| {
                let (resource, relation) = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|subject| Relationship {
                        resource: resource.clone(),
                        relation: relation.clone(),
                        subject: subject.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|relationship| filter.matches(relationship))
            .collect();
        found.sort_by_cached_key(ToString::to_string);
        Ok(found)
    }

    async fn subjects(&self, resource: &ObjectRef, relation: &str) -> Result<Vec<SubjectRef>> {
        Ok(self
            .tuples
            .get(&(resource.clone(), relation.to_string()))
            .map(|subjects| subjects.clone())
            .unwrap_or_default())
    }
}

/// 数据库实现
#[derive(Debug, Clone)]
pub struct DatabaseRelationshipStore {
    db: DatabaseConnection,
}

impl DatabaseRelationshipStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn tuple_condition(relationship: &Relationship) -> Condition {
    let subject_relation = match &relationship.subject.relation {
        Some(relation) => relationship_tuples::Column::SubjectRelation.eq(relation.clone()),
        None => relationship_tuples::Column::SubjectRelation.is_null(),
    };
    Condition::all()
        .add(relationship_tuples::Column::ResourceType.eq(relationship.resource.object_type.clone()))
        .add(relationship_tuples::Column::ResourceId.eq(relationship.resource.object_id.clone()))
        .add(relationship_tuples::Column::Relation.eq(relationship.relation.clone()))
        .add(relationship_tuples::Column::SubjectType.eq(relationship.subject.object.object_type.clone()))
        .add(relationship_tuples::Column::SubjectId.eq(relationship.subject.object.object_id.clone()))
        .add(subject_relation)
}

impl From<relationship_tuples::Model> for Relationship {
    fn from(model: relationship_tuples::Model) -> Self {
        Self {
            resource: ObjectRef::new(model.resource_type, model.resource_id),
            relation: model.relation,
            subject: SubjectRef {
                object: ObjectRef::new(model.subject_type, model.subject_id),
                relation: model.subject_relation,
            },
        }
    }
}

#[async_trait]
impl RelationshipStore for DatabaseRelationshipStore {
    async fn write(&self, updates: &[RelationshipUpdate]) -> Result<()> {
        for update in updates {
            update.relationship.validate()?;
        }
        let updates = updates.to_vec();

        serializable(&self.db, |txn| {
            Box::pin(async move {
                for update in updates {
                    let relationship = update.relationship;
                    let existing = relationship_tuples::Entity::find()
                        .filter(tuple_condition(&relationship))
                        .one(txn)
                        .await?;

                    match (update.operation, existing) {
                        (UpdateOperation::Create, Some(_)) => {
                            return Err(TicketingError::already_exists("relationship", &relationship));
                        }
                        (UpdateOperation::Touch | UpdateOperation::Create, None) => {
                            relationship_tuples::ActiveModel {
                                resource_type: Set(relationship.resource.object_type),
                                resource_id: Set(relationship.resource.object_id),
                                relation: Set(relationship.relation),
                                subject_type: Set(relationship.subject.object.object_type),
                                subject_id: Set(relationship.subject.object.object_id),
                                subject_relation: Set(relationship.subject.relation),
                                created_at: Set(Utc::now().naive_utc()),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await?;
                        }
                        (UpdateOperation::Touch, Some(_)) => {}
                        (UpdateOperation::Delete, _) => {
                            relationship_tuples::Entity::delete_many()
                                .filter(tuple_condition(&relationship))
                                .exec(txn)
                                .await?;
                        }
                    }
                }
                Ok(())
            })
        })
        .await
    }

    async fn read(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut query = relationship_tuples::Entity::find()
            .filter(relationship_tuples::Column::ResourceType.eq(filter.resource_type.clone()));
        if let Some(id) = &filter.resource_id {
            query = query.filter(relationship_tuples::Column::ResourceId.eq(id.clone()));
        }
        if let Some(relation) = &filter.relation {
            query = query.filter(relationship_tuples::Column::Relation.eq(relation.clone()));
        }
        let rows = query
            .order_by_asc(relationship_tuples::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(Relationship::from)
            .filter(|relationship| filter.matches(relationship))
            .collect())
    }

    async fn subjects(&self, resource: &ObjectRef, relation: &str) -> Result<Vec<SubjectRef>> {
        let rows = relationship_tuples::Entity::find()
            .filter(relationship_tuples::Column::ResourceType.eq(resource.object_type.clone()))
            .filter(relationship_tuples::Column::ResourceId.eq(resource.object_id.clone()))
            .filter(relationship_tuples::Column::Relation.eq(relation))
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Relationship::from(row).subject)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32) -> SubjectRef {
        SubjectRef::object(ObjectRef::new("user", id))
    }

    fn touch(resource: ObjectRef, relation: &str, subject: SubjectRef) -> RelationshipUpdate {
        RelationshipUpdate {
            operation: UpdateOperation::Touch,
            relationship: Relationship {
                resource,
                relation: relation.to_string(),
                subject,
            },
        }
    }

    #[test]
    fn strips_permission_suffix() {
        assert_eq!(relation_for_permission("edit_permission"), "edit");
        assert_eq!(relation_for_permission("edit"), "edit");
        assert_eq!(relation_for_permission("_permission"), "_permission");
    }

    #[tokio::test]
    async fn direct_and_userset_grants() {
        let store = MemoryRelationshipStore::new();
        let event = ObjectRef::new("event", 1);
        let team = ObjectRef::new("team", "staff");
        store
            .write(&[
                touch(event.clone(), "owner", user(7)),
                touch(event.clone(), "editor", SubjectRef::userset(team.clone(), "member")),
                touch(team, "member", user(9)),
            ])
            .await
            .unwrap();

        assert!(check_permission(&store, &event, "owner_permission", &user(7)).await.unwrap());
        assert!(check_permission(&store, &event, "editor", &user(9)).await.unwrap());
        assert!(!check_permission(&store, &event, "owner", &user(9)).await.unwrap());
        assert!(!check_permission(&store, &event, "editor", &user(8)).await.unwrap());
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let store = MemoryRelationshipStore::new();
        let a = ObjectRef::new("group", "a");
        let b = ObjectRef::new("group", "b");
        store
            .write(&[
                touch(a.clone(), "member", SubjectRef::userset(b.clone(), "member")),
                touch(b, "member", SubjectRef::userset(a.clone(), "member")),
            ])
            .await
            .unwrap();
        assert!(!check_permission(&store, &a, "member", &user(1)).await.unwrap());
    }

    #[tokio::test]
    async fn create_conflicts_and_delete_is_idempotent() {
        let store = MemoryRelationshipStore::new();
        let event = ObjectRef::new("event", 2);
        let mut update = touch(event.clone(), "owner", user(1));
        store.write(std::slice::from_ref(&update)).await.unwrap();

        update.operation = UpdateOperation::Create;
        let err = store.write(&[update.clone()]).await.unwrap_err();
        assert!(matches!(err, TicketingError::AlreadyExists { .. }));

        update.operation = UpdateOperation::Delete;
        store.write(&[update.clone(), update]).await.unwrap();
        let filter = RelationshipFilter {
            resource_type: "event".into(),
            ..RelationshipFilter::default()
        };
        assert!(store.read(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_filters_by_fields() {
        let store = MemoryRelationshipStore::new();
        store
            .write(&[
                touch(ObjectRef::new("event", 1), "owner", user(1)),
                touch(ObjectRef::new("event", 2), "owner", user(2)),
                touch(ObjectRef::new("packet", 1), "owner", user(1)),
            ])
            .await
            .unwrap();

        let filter = RelationshipFilter {
            resource_type: "event".into(),
            subject: Some(user(1)),
            ..RelationshipFilter::default()
        };
        let found = store.read(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].resource, ObjectRef::new("event", 1));
    }

    #[test]
    fn rejects_empty_fields() {
        let relationship = Relationship {
            resource: ObjectRef::new("event", ""),
            relation: "owner".into(),
            subject: user(1),
        };
        let err = relationship.validate().unwrap_err();
        assert_eq!(err.field(), Some("resource.object_id"));
    }
}
