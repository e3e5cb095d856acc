//! Shared fixtures for the ingestion integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use repoharvest_common::catalog::Page;
use repoharvest_common::config::DatabaseConfig;
use repoharvest_common::{DbPool, Repository};
use repoharvest_ingestion::extractor::ContentSource;
use repoharvest_ingestion::pager::{MetadataSource, RawRecord, SearchPage};
use repoharvest_ingestion::IngestionError;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub async fn memory_repository() -> Repository {
    Repository::new(memory_pool().await)
}

pub async fn memory_pool() -> DbPool {
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
    pool
}

/// Upstream JSON for one search result, the way the repository serves it
pub fn record_json(id: i64, files: &[i64]) -> serde_json::Value {
    json!({
        "ID": id,
        "Naslov": format!("Diplomsko delo {}", id),
        "LetoIzida": "2024",
        "IzpisPolniUrl": format!("https://repo.example/IzpisGradiva.php?id={}", id),
        "Osebe": [
            {"Ime": "Ana", "Priimek": "Novak"},
            {"Ime": "Marko", "Priimek": format!("Mentor{}", id)}
        ],
        "Organizacije": [
            {"OrganizacijaID": 25, "Naziv": "Fakulteta za računalništvo in informatiko", "Kratica": "FRI"}
        ],
        "Datoteke": files
            .iter()
            .map(|f| json!({"ID": f, "PrenosPolniUrl": format!("https://repo.example/Dokument.php?id={}", f)}))
            .collect::<Vec<_>>()
    })
}

pub fn record(id: i64, files: &[i64]) -> RawRecord {
    serde_json::from_value(record_json(id, files)).unwrap()
}

/// In-memory search results, one `Vec` per page
pub struct FakeSource {
    pages: Vec<Vec<RawRecord>>,
    requested: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<RawRecord>>) -> Self {
        Self { pages, requested: Mutex::new(Vec::new()) }
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn fetch_page(&self, _source_id: &str, page: u32) -> Result<SearchPage, IngestionError> {
        self.requested.lock().unwrap().push(page);
        let total_pages = self.pages.len() as u32;
        Ok(SearchPage {
            items: self.pages.get(page as usize - 1).cloned().unwrap_or_default(),
            has_more: page < total_pages,
            total_pages,
        })
    }
}

/// Serves canned pages per URL; unknown URLs have no pages
#[derive(Default)]
pub struct FakeContent {
    pub documents: HashMap<String, Vec<Page>>,
    pub calls: AtomicUsize,
}

impl FakeContent {
    pub fn with_document(mut self, file_id: i64, pages: Vec<Page>) -> Self {
        self.documents
            .insert(format!("https://repo.example/Dokument.php?id={}", file_id), pages);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn extract(&self, url: &str) -> Vec<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents.get(url).cloned().unwrap_or_default()
    }
}

/// A PDF with one line of text per page and an optional `/PageLabels` tree
pub fn build_pdf(texts: &[&str], labels: Option<Dictionary>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(labels) = labels {
        catalog.set("PageLabels", labels);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
