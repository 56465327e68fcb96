//! # 关系元组实体定义
//!
//! 权限检查使用的 `(resource, relation, subject)` 关系表

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 关系元组实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "relationship_tuples")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    /// 非空时主体是一个 userset
    pub subject_relation: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
