//! Person entity
//!
//! Persons carry no upstream identifier; the (given, family) pair is the
//! natural key and `id` is assigned by the store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "persons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub given: String,

    #[sea_orm(column_type = "Text")]
    pub family: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::work_person::Entity")]
    WorkPersons,
}

impl ActiveModelBehavior for ActiveModel {}
