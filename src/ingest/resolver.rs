// Lookup resolution
// Stores candidate sets with conflict-ignore, then reads back what the
// relationship pass needs to check or translate references.

use std::collections::{HashMap, HashSet};

use super::collector::{LookupRow, UniqueValues};
use super::report::LookupStat;
use super::FileKind;
use crate::constants::LOOKUP_INSERT_BATCH;
use crate::db::sink::{BulkSink, InsertMode, Row};
use crate::db::tables::Table;
use crate::error::Result;

/// Resolved references for one file's relationship pass.
///
/// Natural-id tables (genres, companies, ...) need no translation, but only
/// ids present in storage may be referenced, so their stored ids are kept as
/// membership sets. Surrogate-keyed tables map natural key to stored id.
#[derive(Debug, Default)]
pub struct LookupContext {
    pub movies: HashSet<i64>,
    pub genres: HashSet<i64>,
    pub companies: HashSet<i64>,
    pub collections: HashSet<i64>,
    pub keywords: HashSet<i64>,
    pub cast_members: HashSet<i64>,
    pub crew_members: HashSet<i64>,
    pub users: HashSet<i64>,
    pub countries: HashMap<String, i64>,
    pub languages: HashMap<String, i64>,
    pub departments: HashMap<String, i64>,
    pub jobs: HashMap<String, i64>,
}

/// Store one lookup table's candidates. Returns the natural key -> id map for
/// surrogate-keyed tables, an empty map otherwise.
pub fn resolve_lookup<S, T>(
    sink: &mut S,
    table: Table,
    candidates: &HashSet<T>,
) -> Result<(HashMap<String, i64>, LookupStat)>
where
    S: BulkSink + ?Sized,
    T: LookupRow,
{
    let mut stored = 0;
    let mut batch: Vec<Row> = Vec::with_capacity(LOOKUP_INSERT_BATCH.min(candidates.len()));
    for candidate in candidates {
        batch.push(candidate.to_row());
        if batch.len() == LOOKUP_INSERT_BATCH {
            stored += sink.bulk_insert(table, InsertMode::IgnoreConflicts, &batch)?;
            batch.clear();
        }
    }
    stored += sink.bulk_insert(table, InsertMode::IgnoreConflicts, &batch)?;

    log::info!(
        "{}: {} candidates, {} new rows",
        table,
        candidates.len(),
        stored
    );

    let stat = LookupStat {
        table,
        candidates: candidates.len() as u64,
        stored: stored as u64,
    };

    let map = if table.schema().key_column.is_some() {
        sink.fetch_key_map(table)?
    } else {
        HashMap::new()
    };
    Ok((map, stat))
}

/// Resolve every lookup a file feeds and build its context.
pub fn resolve_file_lookups<S>(
    sink: &mut S,
    kind: FileKind,
    values: &UniqueValues,
) -> Result<(LookupContext, Vec<LookupStat>)>
where
    S: BulkSink + ?Sized,
{
    let mut ctx = LookupContext::default();
    let mut stats = Vec::new();

    match kind {
        FileKind::MoviesMetadata => {
            stats.push(resolve_lookup(sink, Table::Genres, &values.genres)?.1);
            stats.push(resolve_lookup(sink, Table::ProductionCompanies, &values.companies)?.1);
            stats.push(resolve_lookup(sink, Table::MovieCollections, &values.collections)?.1);

            let (countries, stat) = resolve_lookup(sink, Table::ProductionCountries, &values.countries)?;
            ctx.countries = countries;
            stats.push(stat);

            let (languages, stat) = resolve_lookup(sink, Table::SpokenLanguages, &values.languages)?;
            ctx.languages = languages;
            stats.push(stat);

            ctx.genres = sink.fetch_ids(Table::Genres)?;
            ctx.companies = sink.fetch_ids(Table::ProductionCompanies)?;
            ctx.collections = sink.fetch_ids(Table::MovieCollections)?;
        }
        FileKind::Credits => {
            stats.push(resolve_lookup(sink, Table::CastMembers, &values.cast)?.1);
            stats.push(resolve_lookup(sink, Table::CrewMembers, &values.crew)?.1);

            let (departments, stat) = resolve_lookup(sink, Table::Departments, &values.departments)?;
            ctx.departments = departments;
            stats.push(stat);

            let (jobs, stat) = resolve_lookup(sink, Table::Jobs, &values.jobs)?;
            ctx.jobs = jobs;
            stats.push(stat);

            ctx.cast_members = sink.fetch_ids(Table::CastMembers)?;
            ctx.crew_members = sink.fetch_ids(Table::CrewMembers)?;
        }
        FileKind::Keywords => {
            stats.push(resolve_lookup(sink, Table::Keywords, &values.keywords)?.1);
            ctx.keywords = sink.fetch_ids(Table::Keywords)?;
        }
        FileKind::Ratings => {
            stats.push(resolve_lookup(sink, Table::Users, &values.users)?.1);
            ctx.users = sink.fetch_ids(Table::Users)?;
        }
        FileKind::Links => {}
    }

    if kind.links_to_movies() {
        ctx.movies = sink.fetch_ids(Table::Movies)?;
        log::debug!("{}: {} known movies", kind, ctx.movies.len());
    }

    Ok((ctx, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::db::sink::SqliteSink;
    use crate::ingest::collector::{IsoEntry, KeyName, NamedId};

    #[test]
    fn test_natural_id_lookup_returns_empty_map() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let genres: HashSet<NamedId> = [
            NamedId { id: 18, name: "Drama".into() },
            NamedId { id: 18, name: "drama".into() },
            NamedId { id: 35, name: "Comedy".into() },
        ]
        .into_iter()
        .collect();

        let (map, stat) = resolve_lookup(&mut sink, Table::Genres, &genres).unwrap();
        assert!(map.is_empty());
        assert_eq!(stat.candidates, 3);
        assert_eq!(stat.stored, 2);
        assert_eq!(sink.count_rows(Table::Genres).unwrap(), 2);
    }

    #[test]
    fn test_surrogate_map_is_stable_across_reruns() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let jobs: HashSet<KeyName> = ["Director", "Screenplay"].iter().map(|j| KeyName(j.to_string())).collect();

        let (first, _) = resolve_lookup(&mut sink, Table::Jobs, &jobs).unwrap();
        let (second, stat) = resolve_lookup(&mut sink, Table::Jobs, &jobs).unwrap();

        assert_eq!(first, second);
        assert_eq!(stat.stored, 0);
        assert_eq!(sink.count_rows(Table::Jobs).unwrap(), 2);
    }

    #[test]
    fn test_key_map_includes_rows_from_earlier_runs() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let first: HashSet<IsoEntry> = [IsoEntry { iso_code: "US".into(), name: "United States of America".into() }]
            .into_iter()
            .collect();
        let second: HashSet<IsoEntry> = [IsoEntry { iso_code: "FR".into(), name: "France".into() }]
            .into_iter()
            .collect();

        resolve_lookup(&mut sink, Table::ProductionCountries, &first).unwrap();
        let (map, _) = resolve_lookup(&mut sink, Table::ProductionCountries, &second).unwrap();

        assert_eq!(map.len(), 2);
        assert!(map.contains_key("US"));
    }

    #[test]
    fn test_large_candidate_sets_are_batched() {
        let conn = open_in_memory().unwrap();
        let mut sink = SqliteSink::new(&conn);
        let keywords: HashSet<NamedId> = (0..(LOOKUP_INSERT_BATCH as i64 + 17))
            .map(|id| NamedId { id, name: format!("kw{}", id) })
            .collect();

        let (_, stat) = resolve_lookup(&mut sink, Table::Keywords, &keywords).unwrap();
        assert_eq!(stat.stored, LOOKUP_INSERT_BATCH as u64 + 17);
    }

    #[test]
    fn test_credits_context_loads_movie_ids() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO movies (id, title) VALUES (862, 'Toy Story')", []).unwrap();
        let mut sink = SqliteSink::new(&conn);

        let (ctx, stats) = resolve_file_lookups(&mut sink, FileKind::Credits, &UniqueValues::default()).unwrap();
        assert!(ctx.movies.contains(&862));
        assert_eq!(stats.len(), 4);

        let (ctx, _) = resolve_file_lookups(&mut sink, FileKind::Ratings, &UniqueValues::default()).unwrap();
        assert!(ctx.movies.is_empty());
    }
}
