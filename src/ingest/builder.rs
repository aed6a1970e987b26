// Relationship building (pass 2)
// Re-streams a source file and writes entity and junction rows chunk by chunk.
// Row-level problems skip the row; unresolved references drop just that link.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::cell::{coerce_i64, field_i64, field_str, list_items, parse_cell};
use super::progress::{emit_progress_opt, ChunkProgress, ProgressListener, PHASE_BUILD};
use super::reader::{CsvChunks, SourceRow};
use super::report::FileReport;
use super::resolver::LookupContext;
use super::FileKind;
use crate::constants::RELEASE_DATE_FORMAT;
use crate::db::sink::{BulkSink, InsertMode, Row};
use crate::db::tables::Table;
use crate::error::{Result, RowError};

type RowResult<T> = std::result::Result<T, RowError>;

/// Rows of one chunk, grouped per table and flushed in commit order.
pub struct Batch {
    tables: Vec<(Table, Vec<Row>)>,
}

impl Batch {
    pub fn new(order: &[Table]) -> Self {
        Self {
            tables: order.iter().map(|t| (*t, Vec::new())).collect(),
        }
    }

    pub fn push(&mut self, table: Table, row: Row) {
        if let Some((_, rows)) = self.tables.iter_mut().find(|(t, _)| *t == table) {
            rows.push(row);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows.len()).sum()
    }

    /// Write every table in order, one committed call each. Returns rows stored.
    pub fn flush<S>(&mut self, sink: &mut S, mode: InsertMode, report: &mut FileReport) -> Result<u64>
    where
        S: BulkSink + ?Sized,
    {
        let mut stored_total = 0;
        for (table, rows) in &mut self.tables {
            let stored = sink.bulk_insert(*table, mode, rows)?;
            report.record_write(*table, rows.len(), stored);
            stored_total += stored as u64;
            rows.clear();
        }
        Ok(stored_total)
    }
}

/// Per-file row translation.
trait RelationshipRows {
    /// Tables written, in commit order.
    fn tables(&self) -> &'static [Table];

    fn mode(&self) -> InsertMode {
        InsertMode::IgnoreConflicts
    }

    fn build(&self, row: &SourceRow, ctx: &LookupContext, batch: &mut Batch, report: &mut FileReport)
        -> RowResult<()>;
}

/// Re-stream `path` and write its relationship rows.
pub fn build_relationships<S>(
    sink: &mut S,
    kind: FileKind,
    path: &Path,
    ctx: &LookupContext,
    chunk_size: usize,
    report: &mut FileReport,
    listener: Option<&dyn ProgressListener>,
) -> Result<()>
where
    S: BulkSink + ?Sized,
{
    let mut chunks = CsvChunks::open(path, chunk_size)?;
    let builder: Box<dyn RelationshipRows> = match kind {
        FileKind::MoviesMetadata => Box::new(MetadataRows::resolve(&chunks)?),
        FileKind::Credits => Box::new(CreditRows::resolve(&chunks)?),
        FileKind::Keywords => Box::new(KeywordRows::resolve(&chunks)?),
        FileKind::Links => Box::new(LinkRows::resolve(&chunks)?),
        FileKind::Ratings => Box::new(RatingRows::resolve(&chunks)?),
    };

    let mut batch = Batch::new(builder.tables());
    let mut stored = 0;

    for (idx, chunk) in chunks.by_ref().enumerate() {
        let rows = chunk?;
        report.rows_read += rows.len() as u64;

        for row in &rows {
            if let Err(e) = builder.build(row, ctx, &mut batch, report) {
                report.skip_row(row.line(), &e);
            }
        }

        stored += batch.flush(&mut *sink, builder.mode(), report)?;

        let progress = ChunkProgress::new(kind, PHASE_BUILD, idx as u64 + 1, report.rows_read)
            .with_stored(stored)
            .with_message(format!("{} rows skipped", report.rows_skipped));
        emit_progress_opt(listener, &progress);
    }

    log::info!(
        "{}: read {} rows, stored {}, skipped {}, unresolved {}",
        chunks.label(),
        chunks.rows_read(),
        stored,
        report.rows_skipped,
        report.unresolved
    );
    Ok(())
}

// --- Cell coercions ---

fn subject_id(row: &SourceRow, idx: usize, column: &'static str) -> RowResult<i64> {
    let text = row.cell(idx).ok_or(RowError::MissingId { column })?;
    coerce_i64(&text).ok_or_else(|| RowError::InvalidId {
        column,
        value: text.to_string(),
    })
}

fn required_i64(row: &SourceRow, idx: usize, column: &'static str) -> RowResult<i64> {
    let text = row.cell(idx).ok_or(RowError::MissingField { column })?;
    coerce_i64(&text).ok_or_else(|| RowError::InvalidField {
        column,
        value: text.to_string(),
    })
}

fn required_f64(row: &SourceRow, idx: usize, column: &'static str) -> RowResult<f64> {
    let text = row.cell(idx).ok_or(RowError::MissingField { column })?;
    parse_f64(&text).ok_or_else(|| RowError::InvalidField {
        column,
        value: text.to_string(),
    })
}

fn parse_f64(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn opt_text(row: &SourceRow, idx: Option<usize>) -> SqlValue {
    match row.opt_cell(idx) {
        Some(text) => SqlValue::Text(text.into_owned()),
        None => SqlValue::Null,
    }
}

fn text_or_empty(row: &SourceRow, idx: Option<usize>) -> SqlValue {
    SqlValue::Text(row.opt_cell(idx).map(|t| t.into_owned()).unwrap_or_default())
}

fn opt_int(row: &SourceRow, idx: Option<usize>, column: &'static str) -> RowResult<SqlValue> {
    match row.opt_cell(idx) {
        None => Ok(SqlValue::Null),
        Some(text) => coerce_i64(&text)
            .map(SqlValue::Integer)
            .ok_or_else(|| RowError::InvalidField {
                column,
                value: text.to_string(),
            }),
    }
}

fn opt_real(row: &SourceRow, idx: Option<usize>, column: &'static str) -> RowResult<SqlValue> {
    match row.opt_cell(idx) {
        None => Ok(SqlValue::Null),
        Some(text) => parse_f64(&text)
            .map(SqlValue::Real)
            .ok_or_else(|| RowError::InvalidField {
                column,
                value: text.to_string(),
            }),
    }
}

/// adult / video: anything but a recognised true value is false.
fn flag(row: &SourceRow, idx: Option<usize>) -> SqlValue {
    let on = matches!(
        row.opt_cell(idx).as_deref().map(str::trim),
        Some("True") | Some("true") | Some("1")
    );
    SqlValue::Integer(i64::from(on))
}

fn release_date(row: &SourceRow, idx: Option<usize>) -> SqlValue {
    row.opt_cell(idx)
        .and_then(|text| NaiveDate::parse_from_str(text.trim(), RELEASE_DATE_FORMAT).ok())
        .map(|date| SqlValue::Text(date.format(RELEASE_DATE_FORMAT).to_string()))
        .unwrap_or(SqlValue::Null)
}

fn parsed(row: &SourceRow, idx: usize) -> Option<Value> {
    parse_cell(row.cell(idx).as_deref())
}

fn str_or_null(record: &Value, key: &str) -> SqlValue {
    field_str(record, key)
        .map(|s| SqlValue::Text(s.to_string()))
        .unwrap_or(SqlValue::Null)
}

// --- movies_metadata.csv ---

struct MetadataRows {
    id: usize,
    genres: usize,
    companies: usize,
    countries: usize,
    languages: usize,
    collection: usize,
    title: Option<usize>,
    original_title: Option<usize>,
    overview: Option<usize>,
    release_date: Option<usize>,
    runtime: Option<usize>,
    budget: Option<usize>,
    revenue: Option<usize>,
    vote_average: Option<usize>,
    vote_count: Option<usize>,
    popularity: Option<usize>,
    status: Option<usize>,
    tagline: Option<usize>,
    homepage: Option<usize>,
    adult: Option<usize>,
    video: Option<usize>,
    imdb_id: Option<usize>,
    original_language: Option<usize>,
    poster_path: Option<usize>,
    backdrop_path: Option<usize>,
}

impl MetadataRows {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            id: chunks.column("id")?,
            genres: chunks.column("genres")?,
            companies: chunks.column("production_companies")?,
            countries: chunks.column("production_countries")?,
            languages: chunks.column("spoken_languages")?,
            collection: chunks.column("belongs_to_collection")?,
            title: chunks.optional_column("title"),
            original_title: chunks.optional_column("original_title"),
            overview: chunks.optional_column("overview"),
            release_date: chunks.optional_column("release_date"),
            runtime: chunks.optional_column("runtime"),
            budget: chunks.optional_column("budget"),
            revenue: chunks.optional_column("revenue"),
            vote_average: chunks.optional_column("vote_average"),
            vote_count: chunks.optional_column("vote_count"),
            popularity: chunks.optional_column("popularity"),
            status: chunks.optional_column("status"),
            tagline: chunks.optional_column("tagline"),
            homepage: chunks.optional_column("homepage"),
            adult: chunks.optional_column("adult"),
            video: chunks.optional_column("video"),
            imdb_id: chunks.optional_column("imdb_id"),
            original_language: chunks.optional_column("original_language"),
            poster_path: chunks.optional_column("poster_path"),
            backdrop_path: chunks.optional_column("backdrop_path"),
        })
    }

    /// Column order matches Table::Movies.
    fn movie_row(&self, row: &SourceRow, id: i64) -> RowResult<Row> {
        Ok(vec![
            SqlValue::Integer(id),
            text_or_empty(row, self.title),
            text_or_empty(row, self.original_title),
            opt_text(row, self.overview),
            release_date(row, self.release_date),
            opt_int(row, self.runtime, "runtime")?,
            opt_int(row, self.budget, "budget")?,
            opt_int(row, self.revenue, "revenue")?,
            opt_real(row, self.vote_average, "vote_average")?,
            opt_int(row, self.vote_count, "vote_count")?,
            opt_real(row, self.popularity, "popularity")?,
            opt_text(row, self.status),
            opt_text(row, self.tagline),
            opt_text(row, self.homepage),
            flag(row, self.adult),
            flag(row, self.video),
            opt_text(row, self.imdb_id),
            opt_text(row, self.original_language),
            opt_text(row, self.poster_path),
            opt_text(row, self.backdrop_path),
        ])
    }
}

fn link_known_ids(
    cell: Option<Value>,
    movie_id: i64,
    known: &HashSet<i64>,
    table: Table,
    batch: &mut Batch,
    report: &mut FileReport,
) {
    let Some(cell) = cell else { return };
    for id in list_items(&cell).filter_map(|item| field_i64(item, "id")) {
        if known.contains(&id) {
            batch.push(table, vec![SqlValue::Integer(movie_id), SqlValue::Integer(id)]);
        } else {
            report.unresolved += 1;
        }
    }
}

fn link_iso_codes(
    cell: Option<Value>,
    iso_key: &str,
    movie_id: i64,
    known: &HashMap<String, i64>,
    table: Table,
    batch: &mut Batch,
    report: &mut FileReport,
) {
    let Some(cell) = cell else { return };
    for iso in list_items(&cell).filter_map(|item| field_str(item, iso_key)) {
        match known.get(iso) {
            Some(id) => batch.push(table, vec![SqlValue::Integer(movie_id), SqlValue::Integer(*id)]),
            None => report.unresolved += 1,
        }
    }
}

impl RelationshipRows for MetadataRows {
    fn tables(&self) -> &'static [Table] {
        &[
            Table::Movies,
            Table::MovieGenres,
            Table::MovieProductionCompanies,
            Table::MovieProductionCountries,
            Table::MovieSpokenLanguages,
            Table::MovieCollectionsJunction,
        ]
    }

    fn build(&self, row: &SourceRow, ctx: &LookupContext, batch: &mut Batch, report: &mut FileReport) -> RowResult<()> {
        let movie_id = subject_id(row, self.id, "id")?;
        let movie = self.movie_row(row, movie_id)?;
        batch.push(Table::Movies, movie);

        link_known_ids(parsed(row, self.genres), movie_id, &ctx.genres, Table::MovieGenres, batch, report);
        link_known_ids(
            parsed(row, self.companies),
            movie_id,
            &ctx.companies,
            Table::MovieProductionCompanies,
            batch,
            report,
        );
        link_iso_codes(
            parsed(row, self.countries),
            "iso_3166_1",
            movie_id,
            &ctx.countries,
            Table::MovieProductionCountries,
            batch,
            report,
        );
        link_iso_codes(
            parsed(row, self.languages),
            "iso_639_1",
            movie_id,
            &ctx.languages,
            Table::MovieSpokenLanguages,
            batch,
            report,
        );

        if let Some(collection_id) = parsed(row, self.collection)
            .filter(Value::is_object)
            .and_then(|c| field_i64(&c, "id"))
        {
            if ctx.collections.contains(&collection_id) {
                batch.push(
                    Table::MovieCollectionsJunction,
                    vec![SqlValue::Integer(movie_id), SqlValue::Integer(collection_id)],
                );
            } else {
                report.unresolved += 1;
            }
        }

        Ok(())
    }
}

// --- credits.csv ---

struct CreditRows {
    id: usize,
    cast: usize,
    crew: usize,
}

impl CreditRows {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            id: chunks.column("id")?,
            cast: chunks.column("cast")?,
            crew: chunks.column("crew")?,
        })
    }
}

impl RelationshipRows for CreditRows {
    fn tables(&self) -> &'static [Table] {
        &[Table::MovieCast, Table::MovieCrew]
    }

    fn build(&self, row: &SourceRow, ctx: &LookupContext, batch: &mut Batch, report: &mut FileReport) -> RowResult<()> {
        let movie_id = subject_id(row, self.id, "id")?;
        let mut cast_rows = Vec::new();
        let mut crew_rows = Vec::new();
        let mut unresolved = 0;

        if let Some(cast) = parsed(row, self.cast) {
            for item in list_items(&cast) {
                let (Some(person_id), Some(credit_id)) = (field_i64(item, "id"), field_str(item, "credit_id")) else {
                    continue;
                };
                if !ctx.cast_members.contains(&person_id) {
                    unresolved += 1;
                    continue;
                }
                cast_rows.push(vec![
                    SqlValue::Integer(movie_id),
                    SqlValue::Integer(person_id),
                    str_or_null(item, "character"),
                    field_i64(item, "order").map(SqlValue::Integer).unwrap_or(SqlValue::Null),
                    SqlValue::Text(credit_id.to_string()),
                ]);
            }
        }

        if let Some(crew) = parsed(row, self.crew) {
            for item in list_items(&crew) {
                let (Some(person_id), Some(credit_id), Some(department), Some(job)) = (
                    field_i64(item, "id"),
                    field_str(item, "credit_id"),
                    field_str(item, "department"),
                    field_str(item, "job"),
                ) else {
                    continue;
                };
                let resolved = (
                    ctx.crew_members.contains(&person_id),
                    ctx.departments.get(department),
                    ctx.jobs.get(job),
                );
                let (true, Some(department_id), Some(job_id)) = resolved else {
                    unresolved += 1;
                    continue;
                };
                crew_rows.push(vec![
                    SqlValue::Text(credit_id.to_string()),
                    SqlValue::Integer(movie_id),
                    SqlValue::Integer(person_id),
                    SqlValue::Integer(*department_id),
                    SqlValue::Integer(*job_id),
                ]);
            }
        }

        report.unresolved += unresolved;
        if !ctx.movies.contains(&movie_id) {
            report.unresolved += (cast_rows.len() + crew_rows.len()) as u64;
            return Ok(());
        }

        for r in cast_rows {
            batch.push(Table::MovieCast, r);
        }
        for r in crew_rows {
            batch.push(Table::MovieCrew, r);
        }
        Ok(())
    }
}

// --- keywords.csv ---

struct KeywordRows {
    id: usize,
    keywords: usize,
}

impl KeywordRows {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            id: chunks.column("id")?,
            keywords: chunks.column("keywords")?,
        })
    }
}

impl RelationshipRows for KeywordRows {
    fn tables(&self) -> &'static [Table] {
        &[Table::MovieKeywords]
    }

    fn build(&self, row: &SourceRow, ctx: &LookupContext, batch: &mut Batch, report: &mut FileReport) -> RowResult<()> {
        let movie_id = subject_id(row, self.id, "id")?;
        let Some(keywords) = parsed(row, self.keywords) else {
            return Ok(());
        };

        let ids: Vec<i64> = list_items(&keywords).filter_map(|item| field_i64(item, "id")).collect();
        if !ctx.movies.contains(&movie_id) {
            report.unresolved += ids.len() as u64;
            return Ok(());
        }

        for keyword_id in ids {
            if ctx.keywords.contains(&keyword_id) {
                batch.push(Table::MovieKeywords, vec![SqlValue::Integer(movie_id), SqlValue::Integer(keyword_id)]);
            } else {
                report.unresolved += 1;
            }
        }
        Ok(())
    }
}

// --- links.csv ---

struct LinkRows {
    movie_id: usize,
    imdb_id: usize,
    tmdb_id: usize,
}

impl LinkRows {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            movie_id: chunks.column("movieId")?,
            imdb_id: chunks.column("imdbId")?,
            tmdb_id: chunks.column("tmdbId")?,
        })
    }
}

impl RelationshipRows for LinkRows {
    fn tables(&self) -> &'static [Table] {
        &[Table::MovieIds]
    }

    fn build(&self, row: &SourceRow, _ctx: &LookupContext, batch: &mut Batch, _report: &mut FileReport) -> RowResult<()> {
        let movie_id = subject_id(row, self.movie_id, "movieId")?;
        // imdbId keeps its leading zeros
        let imdb_id = opt_text(row, Some(self.imdb_id));
        let tmdb_id = opt_int(row, Some(self.tmdb_id), "tmdbId")?;
        batch.push(Table::MovieIds, vec![SqlValue::Integer(movie_id), imdb_id, tmdb_id]);
        Ok(())
    }
}

// --- ratings*.csv ---

struct RatingRows {
    user_id: usize,
    movie_id: usize,
    rating: usize,
    timestamp: usize,
}

impl RatingRows {
    fn resolve(chunks: &CsvChunks) -> Result<Self> {
        Ok(Self {
            user_id: chunks.column("userId")?,
            movie_id: chunks.column("movieId")?,
            rating: chunks.column("rating")?,
            timestamp: chunks.column("timestamp")?,
        })
    }
}

impl RelationshipRows for RatingRows {
    fn tables(&self) -> &'static [Table] {
        &[Table::Ratings]
    }

    fn mode(&self) -> InsertMode {
        InsertMode::Plain
    }

    fn build(&self, row: &SourceRow, ctx: &LookupContext, batch: &mut Batch, report: &mut FileReport) -> RowResult<()> {
        let user_id = subject_id(row, self.user_id, "userId")?;
        let movie_id = required_i64(row, self.movie_id, "movieId")?;
        let rating = required_f64(row, self.rating, "rating")?;
        let timestamp = required_i64(row, self.timestamp, "timestamp")?;

        if !ctx.users.contains(&user_id) {
            report.unresolved += 1;
            return Ok(());
        }

        batch.push(
            Table::Ratings,
            vec![
                SqlValue::Integer(user_id),
                SqlValue::Integer(movie_id),
                SqlValue::Real(rating),
                SqlValue::Integer(timestamp),
            ],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn single_row(header: &str, line: &str) -> (TempDir, SourceRow, CsvChunks) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.csv");
        std::fs::write(&path, format!("{}\n{}\n", header, line)).unwrap();
        let mut chunks = CsvChunks::open(&path, 10).unwrap();
        let row = chunks.next().unwrap().unwrap().remove(0);
        (tmp, row, chunks)
    }

    #[test]
    fn test_subject_id_accepts_float_text() {
        let (_tmp, row, _) = single_row("id", "862.0");
        assert_eq!(subject_id(&row, 0, "id"), Ok(862));
    }

    #[test]
    fn test_subject_id_errors() {
        let (_tmp, row, _) = single_row("id,x", ",1");
        assert_eq!(subject_id(&row, 0, "id"), Err(RowError::MissingId { column: "id" }));

        let (_tmp, row, _) = single_row("id", "1997-08-20");
        assert_eq!(
            subject_id(&row, 0, "id"),
            Err(RowError::InvalidId { column: "id", value: "1997-08-20".into() })
        );
    }

    #[test]
    fn test_movie_attribute_coercion() {
        let header = "id,title,release_date,runtime,budget,vote_average,adult,video,genres,production_companies,production_countries,spoken_languages,belongs_to_collection";
        let (_tmp, row, chunks) = single_row(header, "862,Toy Story,1995-10-30,81.0,30000000,7.7,False,True,,,,,");
        let cols = MetadataRows::resolve(&chunks).unwrap();
        let movie = cols.movie_row(&row, 862).unwrap();

        assert_eq!(movie.len(), Table::Movies.schema().columns.len());
        assert_eq!(movie[1], SqlValue::Text("Toy Story".into()));
        assert_eq!(movie[2], SqlValue::Text(String::new()));
        assert_eq!(movie[4], SqlValue::Text("1995-10-30".into()));
        assert_eq!(movie[5], SqlValue::Integer(81));
        assert_eq!(movie[8], SqlValue::Real(7.7));
        assert_eq!(movie[10], SqlValue::Null);
        assert_eq!(movie[14], SqlValue::Integer(0));
        assert_eq!(movie[15], SqlValue::Integer(1));
    }

    #[test]
    fn test_bad_release_date_is_null_but_bad_budget_fails() {
        let header = "id,release_date,budget,genres,production_companies,production_countries,spoken_languages,belongs_to_collection";
        let (_tmp, row, chunks) = single_row(header, "5,1995-13-45,/ff9qCepilowshEtG2GYWwzt2bs4.jpg,,,,,");
        let cols = MetadataRows::resolve(&chunks).unwrap();

        let err = cols.movie_row(&row, 5).unwrap_err();
        assert!(matches!(err, RowError::InvalidField { column: "budget", .. }));
        assert_eq!(release_date(&row, cols.release_date), SqlValue::Null);
    }

    #[test]
    fn test_batch_push_ignores_undeclared_tables() {
        let mut batch = Batch::new(&[Table::MovieKeywords]);
        batch.push(Table::MovieKeywords, vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
        batch.push(Table::MovieGenres, vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
        assert_eq!(batch.len(), 1);
    }
}
