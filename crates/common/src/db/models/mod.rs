//! SeaORM entity models
//!
//! Relational layout of the harvested catalog

mod file;
mod organization;
mod page;
mod person;
mod work;
mod work_organization;
mod work_person;

pub use work::{
    Entity as WorkEntity,
    Model as WorkRow,
    ActiveModel as WorkActiveModel,
    Column as WorkColumn,
};

pub use organization::{
    Entity as OrganizationEntity,
    Model as OrganizationRow,
    ActiveModel as OrganizationActiveModel,
    Column as OrganizationColumn,
};

pub use person::{
    Entity as PersonEntity,
    Model as PersonRow,
    ActiveModel as PersonActiveModel,
    Column as PersonColumn,
};

pub use file::{
    Entity as FileEntity,
    Model as FileRow,
    ActiveModel as FileActiveModel,
    Column as FileColumn,
};

pub use page::{
    Entity as PageEntity,
    Model as PageRow,
    ActiveModel as PageActiveModel,
    Column as PageColumn,
};

pub use work_person::{
    Entity as WorkPersonEntity,
    Model as WorkPersonRow,
    ActiveModel as WorkPersonActiveModel,
    Column as WorkPersonColumn,
};

pub use work_organization::{
    Entity as WorkOrganizationEntity,
    Model as WorkOrganizationRow,
    ActiveModel as WorkOrganizationActiveModel,
    Column as WorkOrganizationColumn,
};
