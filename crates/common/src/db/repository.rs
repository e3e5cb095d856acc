//! Repository for catalog persistence
//!
//! Every write is insert-if-absent: a row that already exists is left
//! untouched and the conflicting insert is absorbed by
//! `ON CONFLICT DO NOTHING`. [`Repository::store_work`] writes a whole work
//! graph inside one transaction so that a work row is only ever visible
//! together with its files, pages and relations.

use crate::catalog::{sanitize_text, File, Organization, Page, Person, Work};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Rows per multi-row page insert; keeps bind parameters well below the
/// PostgreSQL limit for long documents
const PAGE_BATCH: usize = 500;

/// Row counts of every catalog table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub works: u64,
    pub organizations: u64,
    pub persons: u64,
    pub files: u64,
    pub pages: u64,
    pub work_organizations: u64,
    pub work_persons: u64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Resume
    // ========================================================================

    /// Whether a work with this upstream id has been committed
    pub async fn work_exists(&self, id: i64) -> Result<bool> {
        let found = WorkEntity::find_by_id(id).one(self.conn()).await?;
        Ok(found.is_some())
    }

    // ========================================================================
    // Work graph
    // ========================================================================

    /// Persist a work with its files, pages, organizations and persons
    /// atomically. Parts that already exist are kept as they are.
    #[instrument(skip(self, work), fields(work_id = work.id))]
    pub async fn store_work(&self, work: &Work) -> Result<()> {
        let txn = self.conn().begin().await?;

        match write_work(&txn, work).await {
            Ok(()) => txn.commit().await.map_err(|e| match AppError::from(e) {
                AppError::Database(e) => AppError::Transaction {
                    message: format!("Failed to commit work {}: {}", work.id, e),
                },
                lost => lost,
            }),
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Single-entity operations
    // ========================================================================

    pub async fn upsert_work(&self, work: &Work) -> Result<bool> {
        upsert_work(self.conn(), work).await
    }

    pub async fn upsert_organization(&self, organization: &Organization) -> Result<bool> {
        upsert_organization(self.conn(), organization).await
    }

    /// Returns the id of the stored person, whether it was inserted now or
    /// earlier
    pub async fn upsert_person(&self, person: &Person) -> Result<i32> {
        upsert_person(self.conn(), person).await
    }

    pub async fn upsert_file(&self, work_id: i64, file: &File) -> Result<bool> {
        upsert_file(self.conn(), work_id, file).await
    }

    /// Returns the number of newly inserted pages
    pub async fn upsert_pages(&self, file_id: i64, pages: &[Page]) -> Result<u64> {
        upsert_pages(self.conn(), file_id, pages).await
    }

    pub async fn link_work_organization(&self, work_id: i64, organization_id: i64) -> Result<bool> {
        link_work_organization(self.conn(), work_id, organization_id).await
    }

    pub async fn link_work_person(&self, work_id: i64, person_id: i32) -> Result<bool> {
        link_work_person(self.conn(), work_id, person_id).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Stored pages of a file in sequence order
    pub async fn pages_of_file(&self, file_id: i64) -> Result<Vec<PageRow>> {
        use sea_orm::QueryOrder;

        PageEntity::find()
            .filter(PageColumn::FileId.eq(file_id))
            .order_by_asc(PageColumn::SequenceNo)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        let db = self.conn();

        Ok(TableCounts {
            works: WorkEntity::find().count(db).await?,
            organizations: OrganizationEntity::find().count(db).await?,
            persons: PersonEntity::find().count(db).await?,
            files: FileEntity::find().count(db).await?,
            pages: PageEntity::find().count(db).await?,
            work_organizations: WorkOrganizationEntity::find().count(db).await?,
            work_persons: WorkPersonEntity::find().count(db).await?,
        })
    }
}

async fn write_work<C: ConnectionTrait>(db: &C, work: &Work) -> Result<()> {
    upsert_work(db, work).await?;

    for file in &work.files {
        upsert_file(db, work.id, file).await?;
        let inserted = upsert_pages(db, file.id, &file.pages).await?;
        debug!(file_id = file.id, pages = file.pages.len(), inserted, "File stored");
    }

    for organization in &work.organizations {
        upsert_organization(db, organization).await?;
        link_work_organization(db, work.id, organization.id).await?;
    }

    for person in &work.persons {
        let person_id = upsert_person(db, person).await?;
        link_work_person(db, work.id, person_id).await?;
    }

    Ok(())
}

async fn upsert_work<C: ConnectionTrait>(db: &C, work: &Work) -> Result<bool> {
    let model = WorkActiveModel {
        id: Set(work.id),
        title: Set(work.title.clone()),
        year: Set(work.year),
        source_url: Set(work.source_url.clone()),
    };

    let rows = WorkEntity::insert(model)
        .on_conflict(OnConflict::column(WorkColumn::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

async fn upsert_organization<C: ConnectionTrait>(db: &C, organization: &Organization) -> Result<bool> {
    let model = OrganizationActiveModel {
        id: Set(organization.id),
        long_name: Set(organization.long_name.clone()),
        short_name: Set(organization.short_name.clone()),
    };

    let rows = OrganizationEntity::insert(model)
        .on_conflict(OnConflict::column(OrganizationColumn::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

async fn upsert_person<C: ConnectionTrait>(db: &C, person: &Person) -> Result<i32> {
    let model = PersonActiveModel {
        given: Set(person.given.clone()),
        family: Set(person.family.clone()),
        ..Default::default()
    };

    PersonEntity::insert(model)
        .on_conflict(
            OnConflict::columns([PersonColumn::Given, PersonColumn::Family])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let stored = PersonEntity::find()
        .filter(PersonColumn::Given.eq(person.given.as_str()))
        .filter(PersonColumn::Family.eq(person.family.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "person".to_string(),
            id: format!("{} {}", person.given, person.family),
        })?;

    Ok(stored.id)
}

async fn upsert_file<C: ConnectionTrait>(db: &C, work_id: i64, file: &File) -> Result<bool> {
    let model = FileActiveModel {
        id: Set(file.id),
        url: Set(file.url.clone()),
        work_id: Set(work_id),
    };

    let rows = FileEntity::insert(model)
        .on_conflict(OnConflict::column(FileColumn::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

async fn upsert_pages<C: ConnectionTrait>(db: &C, file_id: i64, pages: &[Page]) -> Result<u64> {
    let mut inserted = 0;

    for batch in pages.chunks(PAGE_BATCH) {
        let models = batch.iter().map(|page| PageActiveModel {
            file_id: Set(file_id),
            sequence_no: Set(page.sequence_no),
            page_label: Set(page.label.clone()),
            text: Set(sanitize_text(&page.text)),
        });

        inserted += PageEntity::insert_many(models)
            .on_conflict(
                OnConflict::columns([PageColumn::FileId, PageColumn::SequenceNo])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(inserted)
}

async fn link_work_organization<C: ConnectionTrait>(
    db: &C,
    work_id: i64,
    organization_id: i64,
) -> Result<bool> {
    let model = WorkOrganizationActiveModel {
        work_id: Set(work_id),
        organization_id: Set(organization_id),
    };

    let rows = WorkOrganizationEntity::insert(model)
        .on_conflict(
            OnConflict::columns([
                WorkOrganizationColumn::WorkId,
                WorkOrganizationColumn::OrganizationId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

async fn link_work_person<C: ConnectionTrait>(db: &C, work_id: i64, person_id: i32) -> Result<bool> {
    let model = WorkPersonActiveModel {
        work_id: Set(work_id),
        person_id: Set(person_id),
    };

    let rows = WorkPersonEntity::insert(model)
        .on_conflict(
            OnConflict::columns([WorkPersonColumn::WorkId, WorkPersonColumn::PersonId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn memory_repository() -> (Repository, DbPool) {
        let pool = DbPool::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 3600,
        })
        .await
        .unwrap();
        pool.ensure_schema().await.unwrap();
        (Repository::new(pool.clone()), pool)
    }

    fn sample_work(id: i64) -> Work {
        Work {
            id,
            title: format!("Thesis {}", id),
            year: Some(2023),
            source_url: Some(format!("https://repo.example/Dokument.php?id={}", id)),
            persons: vec![
                Person { given: "Ana".into(), family: "Novak".into() },
                Person { given: "Marko".into(), family: "Kranjc".into() },
            ],
            organizations: vec![Organization {
                id: 25,
                short_name: "FRI".into(),
                long_name: "Fakulteta za računalništvo in informatiko".into(),
            }],
            files: vec![File {
                id: id * 10,
                url: format!("https://repo.example/Dokument.php?lang=slv&id={}", id * 10),
                pages: vec![
                    Page::new(1, Some("i".into()), "Title page"),
                    Page::new(2, Some("ii".into()), "Abstract"),
                    Page::new(3, Some("1".into()), "Introduction"),
                ],
            }],
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let (repo, pool) = memory_repository().await;
        pool.ensure_schema().await.unwrap();
        assert_eq!(repo.table_counts().await.unwrap(), TableCounts::default());
    }

    #[tokio::test]
    async fn test_store_work_twice_is_noop() {
        let (repo, _) = memory_repository().await;
        let work = sample_work(7);

        assert!(!repo.work_exists(7).await.unwrap());
        repo.store_work(&work).await.unwrap();
        let first = repo.table_counts().await.unwrap();
        repo.store_work(&work).await.unwrap();
        let second = repo.table_counts().await.unwrap();

        assert!(repo.work_exists(7).await.unwrap());
        assert_eq!(first, second);
        assert_eq!(
            first,
            TableCounts {
                works: 1,
                organizations: 1,
                persons: 2,
                files: 1,
                pages: 3,
                work_organizations: 1,
                work_persons: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_later_sighting_does_not_update() {
        let (repo, _) = memory_repository().await;
        let mut work = sample_work(8);
        repo.store_work(&work).await.unwrap();

        work.title = "Renamed upstream".into();
        work.organizations[0].short_name = "XYZ".into();
        assert!(!repo.upsert_work(&work).await.unwrap());
        assert!(!repo.upsert_organization(&work.organizations[0]).await.unwrap());

        let stored = WorkEntity::find_by_id(8).one(repo.conn()).await.unwrap().unwrap();
        assert_eq!(stored.title, "Thesis 8");
        let org = OrganizationEntity::find_by_id(25).one(repo.conn()).await.unwrap().unwrap();
        assert_eq!(org.short_name, "FRI");
    }

    #[tokio::test]
    async fn test_person_identity_and_link_dedup() {
        let (repo, _) = memory_repository().await;
        repo.upsert_work(&sample_work(1)).await.unwrap();

        let person = Person { given: "Ana".into(), family: "Novak".into() };
        let first = repo.upsert_person(&person).await.unwrap();
        let second = repo.upsert_person(&person).await.unwrap();
        assert_eq!(first, second);

        assert!(repo.link_work_person(1, first).await.unwrap());
        assert!(!repo.link_work_person(1, first).await.unwrap());

        let counts = repo.table_counts().await.unwrap();
        assert_eq!(counts.persons, 1);
        assert_eq!(counts.work_persons, 1);
    }

    #[tokio::test]
    async fn test_links_resolve_to_their_rows() {
        let (repo, _) = memory_repository().await;
        repo.store_work(&sample_work(5)).await.unwrap();

        let persons = WorkPersonEntity::find()
            .find_also_related(PersonEntity)
            .all(repo.conn())
            .await
            .unwrap();
        let mut families: Vec<String> = persons
            .into_iter()
            .map(|(link, person)| {
                assert_eq!(link.work_id, 5);
                person.unwrap().family
            })
            .collect();
        families.sort();
        assert_eq!(families, vec!["Kranjc", "Novak"]);

        let orgs = WorkOrganizationEntity::find()
            .find_also_related(OrganizationEntity)
            .all(repo.conn())
            .await
            .unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].1.as_ref().unwrap().short_name, "FRI");
    }

    #[tokio::test]
    async fn test_same_name_different_family_is_distinct_person() {
        let (repo, _) = memory_repository().await;
        let a = repo
            .upsert_person(&Person { given: "Ana".into(), family: "Novak".into() })
            .await
            .unwrap();
        let b = repo
            .upsert_person(&Person { given: "Ana".into(), family: "Horvat".into() })
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_nul_bytes_removed_on_read_back() {
        let (repo, _) = memory_repository().await;
        let mut work = sample_work(3);
        work.files[0].pages.clear();
        repo.store_work(&work).await.unwrap();

        // Bypass Page::new so the raw text still carries NULs
        let raw = Page {
            sequence_no: 1,
            label: None,
            text: "Uvod\0 v \0računalništvo".into(),
        };
        repo.upsert_pages(30, &[raw]).await.unwrap();

        let pages = repo.pages_of_file(30).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "Uvod v računalništvo");
        assert_eq!(pages[0].page_label, None);
    }

    #[tokio::test]
    async fn test_pages_keep_sequence_and_labels() {
        let (repo, _) = memory_repository().await;
        let mut work = sample_work(4);
        work.files[0].pages = vec![
            Page::new(1, Some("A".into()), "cover"),
            Page::new(2, Some("A".into()), "cover verso"),
            Page::new(3, Some("3".into()), "body"),
        ];
        repo.store_work(&work).await.unwrap();

        let pages = repo.pages_of_file(40).await.unwrap();
        let sequence: Vec<i32> = pages.iter().map(|p| p.sequence_no).collect();
        let labels: Vec<Option<String>> = pages.iter().map(|p| p.page_label.clone()).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        assert_eq!(
            labels,
            vec![Some("A".to_string()), Some("A".to_string()), Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_work_is_rolled_back() {
        let (repo, pool) = memory_repository().await;
        pool.conn().execute_unprepared("DROP TABLE pages").await.unwrap();

        let result = repo.store_work(&sample_work(9)).await;
        assert!(result.is_err());
        assert!(!repo.work_exists(9).await.unwrap());
        assert_eq!(FileEntity::find().count(repo.conn()).await.unwrap(), 0);
        assert_eq!(PersonEntity::find().count(repo.conn()).await.unwrap(), 0);
    }
}
