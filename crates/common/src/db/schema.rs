//! Schema bootstrap
//!
//! Tables are derived from the entity definitions so the same code runs
//! against PostgreSQL in production and SQLite in tests. Everything is
//! `IF NOT EXISTS`; running it on an existing catalog is a no-op.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DbBackend, EntityTrait, Schema};
use tracing::{debug, info};

/// Expression index backing the full-text query surface
const PAGES_TEXT_SEARCH_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS pages_text_search_idx
    ON pages USING GIN (to_tsvector('simple', text))
"#;

pub(super) async fn create_all<C: ConnectionTrait>(db: &C) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Referenced tables first
    create_table(db, &schema, WorkEntity).await?;
    create_table(db, &schema, OrganizationEntity).await?;
    create_table(db, &schema, PersonEntity).await?;
    create_table(db, &schema, FileEntity).await?;
    create_table(db, &schema, PageEntity).await?;
    create_table(db, &schema, WorkPersonEntity).await?;
    create_table(db, &schema, WorkOrganizationEntity).await?;

    let person_key = Index::create()
        .name("persons_given_family_key")
        .table(PersonEntity)
        .col(PersonColumn::Given)
        .col(PersonColumn::Family)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&person_key)).await?;

    let files_by_work = Index::create()
        .name("files_work_id_idx")
        .table(FileEntity)
        .col(FileColumn::WorkId)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&files_by_work)).await?;

    if backend == DbBackend::Postgres {
        db.execute_unprepared(PAGES_TEXT_SEARCH_INDEX).await?;
    }

    info!(?backend, "Catalog schema ready");
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    debug!(table = entity.table_name(), "Creating table if missing");

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}
