// Unique value collection (pass 1)
// Streams a source file and accumulates one deduplicated candidate set per lookup table.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::cell::{coerce_i64, field_i64, field_str, list_items, parse_cell};
use super::progress::{emit_progress_opt, ChunkProgress, ProgressListener, PHASE_COLLECT};
use super::reader::{CsvChunks, SourceRow};
use super::FileKind;
use crate::db::sink::Row;
use crate::error::Result;

/// A lookup candidate that knows its own insert tuple.
pub trait LookupRow {
    fn to_row(&self) -> Row;
}

/// (id, name) lookups: genres, companies, keywords.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedId {
    pub id: i64,
    pub name: String,
}

/// Countries and languages, keyed by ISO code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsoEntry {
    pub iso_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionEntry {
    pub id: i64,
    pub name: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

/// Cast or crew person. Only the id is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonEntry {
    pub id: i64,
    pub name: Option<String>,
    pub gender: Option<i64>,
    pub profile_path: Option<String>,
}

/// Bare text lookups: departments and jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyName(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

fn text(value: &Option<String>) -> SqlValue {
    match value {
        Some(s) => SqlValue::Text(s.clone()),
        None => SqlValue::Null,
    }
}

impl LookupRow for NamedId {
    fn to_row(&self) -> Row {
        vec![SqlValue::Integer(self.id), SqlValue::Text(self.name.clone())]
    }
}

impl LookupRow for IsoEntry {
    fn to_row(&self) -> Row {
        vec![SqlValue::Text(self.iso_code.clone()), SqlValue::Text(self.name.clone())]
    }
}

impl LookupRow for CollectionEntry {
    fn to_row(&self) -> Row {
        vec![
            SqlValue::Integer(self.id),
            SqlValue::Text(self.name.clone()),
            text(&self.poster_path),
            text(&self.backdrop_path),
        ]
    }
}

impl LookupRow for PersonEntry {
    fn to_row(&self) -> Row {
        vec![
            SqlValue::Integer(self.id),
            text(&self.name),
            self.gender.map(SqlValue::Integer).unwrap_or(SqlValue::Null),
            text(&self.profile_path),
        ]
    }
}

impl LookupRow for KeyName {
    fn to_row(&self) -> Row {
        vec![SqlValue::Text(self.0.clone())]
    }
}

impl LookupRow for UserId {
    fn to_row(&self) -> Row {
        vec![SqlValue::Integer(self.0)]
    }
}

/// Whole-file candidate sets, one per lookup table.
#[derive(Debug, Default)]
pub struct UniqueValues {
    pub genres: HashSet<NamedId>,
    pub companies: HashSet<NamedId>,
    pub countries: HashSet<IsoEntry>,
    pub languages: HashSet<IsoEntry>,
    pub collections: HashSet<CollectionEntry>,
    pub cast: HashSet<PersonEntry>,
    pub crew: HashSet<PersonEntry>,
    pub departments: HashSet<KeyName>,
    pub jobs: HashSet<KeyName>,
    pub keywords: HashSet<NamedId>,
    pub users: HashSet<UserId>,
    pub rows_scanned: u64,
}

impl UniqueValues {
    pub fn candidate_count(&self) -> usize {
        self.genres.len()
            + self.companies.len()
            + self.countries.len()
            + self.languages.len()
            + self.collections.len()
            + self.cast.len()
            + self.crew.len()
            + self.departments.len()
            + self.jobs.len()
            + self.keywords.len()
            + self.users.len()
    }
}

// --- Per-cell extraction ---

/// (id, name) records of a list cell. Records missing either are skipped.
pub fn extract_named_ids(cell: &Value, out: &mut HashSet<NamedId>) {
    for item in list_items(cell) {
        if let (Some(id), Some(name)) = (field_i64(item, "id"), field_str(item, "name")) {
            out.insert(NamedId { id, name: name.to_string() });
        }
    }
}

pub fn extract_iso_entries(cell: &Value, iso_key: &str, out: &mut HashSet<IsoEntry>) {
    for item in list_items(cell) {
        if let (Some(iso), Some(name)) = (field_str(item, iso_key), field_str(item, "name")) {
            out.insert(IsoEntry {
                iso_code: iso.to_string(),
                name: name.to_string(),
            });
        }
    }
}

/// belongs_to_collection holds a single map, not a list.
pub fn extract_collection(cell: &Value) -> Option<CollectionEntry> {
    if !cell.is_object() {
        return None;
    }
    Some(CollectionEntry {
        id: field_i64(cell, "id")?,
        name: field_str(cell, "name")?.to_string(),
        poster_path: field_str(cell, "poster_path").map(str::to_string),
        backdrop_path: field_str(cell, "backdrop_path").map(str::to_string),
    })
}

pub fn extract_person(record: &Value) -> Option<PersonEntry> {
    Some(PersonEntry {
        id: field_i64(record, "id")?,
        name: field_str(record, "name").map(str::to_string),
        gender: field_i64(record, "gender"),
        profile_path: field_str(record, "profile_path").map(str::to_string),
    })
}

pub fn extract_cast(cell: &Value, out: &mut HashSet<PersonEntry>) {
    out.extend(list_items(cell).filter_map(extract_person));
}

/// Crew people plus the department and job vocabularies.
pub fn extract_crew(
    cell: &Value,
    people: &mut HashSet<PersonEntry>,
    departments: &mut HashSet<KeyName>,
    jobs: &mut HashSet<KeyName>,
) {
    for item in list_items(cell) {
        if let Some(person) = extract_person(item) {
            people.insert(person);
        }
        if let Some(department) = field_str(item, "department") {
            departments.insert(KeyName(department.to_string()));
        }
        if let Some(job) = field_str(item, "job") {
            jobs.insert(KeyName(job.to_string()));
        }
    }
}

// --- Per-file column sets ---

struct MetadataLookupColumns {
    genres: usize,
    companies: usize,
    countries: usize,
    languages: usize,
    collection: usize,
}

impl MetadataLookupColumns {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            genres: chunks.column("genres")?,
            companies: chunks.column("production_companies")?,
            countries: chunks.column("production_countries")?,
            languages: chunks.column("spoken_languages")?,
            collection: chunks.column("belongs_to_collection")?,
        })
    }

    fn collect(&self, row: &SourceRow, out: &mut UniqueValues) {
        if let Some(cell) = parse_cell(row.cell(self.genres).as_deref()) {
            extract_named_ids(&cell, &mut out.genres);
        }
        if let Some(cell) = parse_cell(row.cell(self.companies).as_deref()) {
            extract_named_ids(&cell, &mut out.companies);
        }
        if let Some(cell) = parse_cell(row.cell(self.countries).as_deref()) {
            extract_iso_entries(&cell, "iso_3166_1", &mut out.countries);
        }
        if let Some(cell) = parse_cell(row.cell(self.languages).as_deref()) {
            extract_iso_entries(&cell, "iso_639_1", &mut out.languages);
        }
        if let Some(collection) = parse_cell(row.cell(self.collection).as_deref())
            .as_ref()
            .and_then(extract_collection)
        {
            out.collections.insert(collection);
        }
    }
}

/// Read a whole file and build its candidate sets.
/// Links carry no lookups; the file is still opened so a missing file fails here.
pub fn collect_unique(
    path: &Path,
    kind: FileKind,
    chunk_size: usize,
    listener: Option<&dyn ProgressListener>,
) -> Result<UniqueValues> {
    let chunks = CsvChunks::open(path, chunk_size)?;
    let mut values = UniqueValues::default();
    let scan = Scan { kind, listener };

    match kind {
        FileKind::MoviesMetadata => {
            let cols = MetadataLookupColumns::resolve(&chunks)?;
            scan.for_each_row(chunks, &mut values, |row, out| cols.collect(row, out))?;
        }
        FileKind::Credits => {
            let cast_col = chunks.column("cast")?;
            let crew_col = chunks.column("crew")?;
            scan.for_each_row(chunks, &mut values, |row, out| {
                if let Some(cell) = parse_cell(row.cell(cast_col).as_deref()) {
                    extract_cast(&cell, &mut out.cast);
                }
                if let Some(cell) = parse_cell(row.cell(crew_col).as_deref()) {
                    extract_crew(&cell, &mut out.crew, &mut out.departments, &mut out.jobs);
                }
            })?;
        }
        FileKind::Keywords => {
            let keywords_col = chunks.column("keywords")?;
            scan.for_each_row(chunks, &mut values, |row, out| {
                if let Some(cell) = parse_cell(row.cell(keywords_col).as_deref()) {
                    extract_named_ids(&cell, &mut out.keywords);
                }
            })?;
        }
        FileKind::Ratings => {
            let user_col = chunks.column("userId")?;
            scan.for_each_row(chunks, &mut values, |row, out| {
                // Bad ids are reported by the relationship pass
                if let Some(id) = row.cell(user_col).as_deref().and_then(coerce_i64) {
                    out.users.insert(UserId(id));
                }
            })?;
        }
        FileKind::Links => return Ok(values),
    }

    log::info!(
        "{}: scanned {} rows, {} lookup candidates",
        kind,
        values.rows_scanned,
        values.candidate_count()
    );
    Ok(values)
}

struct Scan<'a> {
    kind: FileKind,
    listener: Option<&'a dyn ProgressListener>,
}

impl Scan<'_> {
    fn for_each_row<F>(&self, mut chunks: CsvChunks, out: &mut UniqueValues, mut f: F) -> Result<()>
    where
        F: FnMut(&SourceRow, &mut UniqueValues),
    {
        let mut idx = 0;
        while let Some(chunk) = chunks.next() {
            let rows = chunk?;
            idx += 1;
            out.rows_scanned = chunks.rows_read();
            for row in &rows {
                f(row, out);
            }
            let progress = ChunkProgress::new(self.kind, PHASE_COLLECT, idx, out.rows_scanned);
            emit_progress_opt(self.listener, &progress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_ids_keep_differing_names() {
        let mut set = HashSet::new();
        extract_named_ids(&json!([{"id": 18, "name": "Drama"}]), &mut set);
        extract_named_ids(&json!([{"id": 18, "name": "drama"}, {"id": 18, "name": "Drama"}]), &mut set);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_records_missing_keys_are_skipped() {
        let mut set = HashSet::new();
        extract_named_ids(&json!([{"name": "No Id"}, {"id": 7}, {"id": "7.0", "name": "Seven"}]), &mut set);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&NamedId { id: 7, name: "Seven".into() }));
    }

    #[test]
    fn test_iso_entries() {
        let mut set = HashSet::new();
        let cell = json!([{"iso_639_1": "en", "name": "English"}, {"iso_639_1": "", "name": "Blank"}]);
        extract_iso_entries(&cell, "iso_639_1", &mut set);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().iso_code, "en");
    }

    #[test]
    fn test_collection_requires_map_with_id_and_name() {
        let cell = json!({"id": 10194, "name": "Toy Story Collection", "poster_path": null});
        let entry = extract_collection(&cell).unwrap();
        assert_eq!(entry.id, 10194);
        assert_eq!(entry.poster_path, None);

        assert!(extract_collection(&json!([{"id": 1, "name": "x"}])).is_none());
        assert!(extract_collection(&json!({"name": "x"})).is_none());
    }

    #[test]
    fn test_crew_without_department_still_yields_person() {
        let cell = json!([
            {"id": 7879, "name": "John Lasseter", "credit_id": "abc", "job": "Director"},
            {"id": 12, "credit_id": "def", "department": "Writing", "job": "Screenplay", "gender": 2}
        ]);
        let (mut people, mut departments, mut jobs) = (HashSet::new(), HashSet::new(), HashSet::new());
        extract_crew(&cell, &mut people, &mut departments, &mut jobs);

        assert_eq!(people.len(), 2);
        assert_eq!(departments.len(), 1);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_person_row_has_nulls_for_missing_fields() {
        let person = extract_person(&json!({"id": 31})).unwrap();
        assert_eq!(
            person.to_row(),
            vec![SqlValue::Integer(31), SqlValue::Null, SqlValue::Null, SqlValue::Null]
        );
    }
}
