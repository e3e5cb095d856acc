//! Work entity: one catalogued thesis or paper

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "works")]
pub struct Model {
    /// Upstream work id, reused as primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    pub year: Option<i32>,

    /// Display page of the work in the source repository
    #[sea_orm(column_type = "Text", nullable)]
    pub source_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file::Entity")]
    Files,

    #[sea_orm(has_many = "super::work_person::Entity")]
    WorkPersons,

    #[sea_orm(has_many = "super::work_organization::Entity")]
    WorkOrganizations,
}

impl Related<super::file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        super::work_person::Relation::Person.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::work_person::Relation::Work.def().rev())
    }
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        super::work_organization::Relation::Organization.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::work_organization::Relation::Work.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
