//! Raw search record → canonical work graph
//!
//! Persons, organizations and files are each derived in their own pass over
//! the record. Files in particular never depend on the affiliation list: a
//! work without affiliations keeps all of its files and a work with several
//! affiliations lists each file once.

use crate::pager::{RawAffiliation, RawAuthor, RawFile, RawRecord};
use repoharvest_common::catalog::{File, Organization, Person, Work};
use std::collections::HashSet;
use tracing::debug;

pub fn normalize(record: &RawRecord) -> Work {
    let work = Work {
        id: record.id,
        title: record.title.trim().to_string(),
        year: record.year,
        source_url: record
            .display_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        persons: persons(&record.authors),
        organizations: organizations(&record.affiliations),
        files: files(&record.files),
    };

    debug!(
        work_id = work.id,
        persons = work.persons.len(),
        organizations = work.organizations.len(),
        files = work.files.len(),
        "Record normalized"
    );

    work
}

fn persons(authors: &[RawAuthor]) -> Vec<Person> {
    let mut seen = HashSet::new();

    authors
        .iter()
        .map(|a| Person {
            given: a.name.trim().to_string(),
            family: a.surname.trim().to_string(),
        })
        .filter(|p| !(p.given.is_empty() && p.family.is_empty()))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn organizations(affiliations: &[RawAffiliation]) -> Vec<Organization> {
    let mut seen = HashSet::new();

    affiliations
        .iter()
        .filter(|a| seen.insert(a.id))
        .map(|a| Organization {
            id: a.id,
            short_name: a.short_name.trim().to_string(),
            long_name: a.long_name.trim().to_string(),
        })
        .collect()
}

fn files(raw: &[RawFile]) -> Vec<File> {
    let mut seen = HashSet::new();

    raw.iter()
        .filter(|f| seen.insert(f.id))
        .map(|f| File {
            id: f.id,
            url: f.download_url.trim().to_string(),
            pages: Vec::new(),
        })
        .collect()
}
