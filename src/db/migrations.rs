// Database migrations
// Single forward-only schema version. reset_schema drops everything and re-applies it.

use rusqlite::Connection;
use anyhow::Result;

use crate::constants::SCHEMA_VERSION;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Normalized movies schema
    r#"
    -- Main movies table
    CREATE TABLE movies (
        id INTEGER PRIMARY KEY,
        title TEXT,
        original_title TEXT,
        overview TEXT,
        release_date TEXT,
        runtime INTEGER,
        budget INTEGER,
        revenue INTEGER,
        vote_average REAL,
        vote_count INTEGER,
        popularity REAL,
        status TEXT,
        tagline TEXT,
        homepage TEXT,
        adult INTEGER NOT NULL DEFAULT 0,
        video INTEGER NOT NULL DEFAULT 0,
        imdb_id TEXT,
        original_language TEXT,
        poster_path TEXT,
        backdrop_path TEXT
    );

    -- Lookups keyed by the dataset's own ids
    CREATE TABLE movie_collections (
        collection_id INTEGER PRIMARY KEY,
        name TEXT,
        poster_path TEXT,
        backdrop_path TEXT
    );

    CREATE TABLE genres (
        genre_id INTEGER PRIMARY KEY,
        name TEXT
    );

    CREATE TABLE keywords (
        keyword_id INTEGER PRIMARY KEY,
        name TEXT
    );

    CREATE TABLE production_companies (
        company_id INTEGER PRIMARY KEY,
        name TEXT
    );

    CREATE TABLE cast_members (
        person_id INTEGER PRIMARY KEY,
        name TEXT,
        gender INTEGER,
        profile_path TEXT
    );

    CREATE TABLE crew_members (
        person_id INTEGER PRIMARY KEY,
        name TEXT,
        gender INTEGER,
        profile_path TEXT
    );

    -- Lookups with surrogate ids backed by a unique natural column
    CREATE TABLE production_countries (
        country_id INTEGER PRIMARY KEY AUTOINCREMENT,
        iso_code TEXT NOT NULL UNIQUE,
        name TEXT
    );

    CREATE TABLE spoken_languages (
        language_id INTEGER PRIMARY KEY AUTOINCREMENT,
        iso_code TEXT NOT NULL UNIQUE,
        name TEXT
    );

    CREATE TABLE departments (
        department_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE jobs (
        job_id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE
    );

    -- Identifier links (MovieLens id -> IMDb / TMDB)
    CREATE TABLE movie_ids (
        movie_id INTEGER PRIMARY KEY,
        imdb_id TEXT,
        tmdb_id INTEGER
    );

    CREATE TABLE users (
        user_id INTEGER PRIMARY KEY
    );

    -- Append-only ratings
    CREATE TABLE ratings (
        rating_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        movie_id INTEGER NOT NULL,
        rating REAL NOT NULL,
        timestamp INTEGER NOT NULL
    );

    -- Junction tables
    CREATE TABLE movie_genres (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        genre_id INTEGER NOT NULL REFERENCES genres(genre_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, genre_id)
    );

    CREATE TABLE movie_keywords (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        keyword_id INTEGER NOT NULL REFERENCES keywords(keyword_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, keyword_id)
    );

    CREATE TABLE movie_production_companies (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        company_id INTEGER NOT NULL REFERENCES production_companies(company_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, company_id)
    );

    CREATE TABLE movie_production_countries (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        country_id INTEGER NOT NULL REFERENCES production_countries(country_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, country_id)
    );

    CREATE TABLE movie_spoken_languages (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        language_id INTEGER NOT NULL REFERENCES spoken_languages(language_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, language_id)
    );

    CREATE TABLE movie_cast (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        person_id INTEGER NOT NULL REFERENCES cast_members(person_id) ON DELETE CASCADE,
        character_name TEXT,
        cast_order INTEGER,
        credit_id TEXT NOT NULL,
        PRIMARY KEY (movie_id, person_id, credit_id)
    );

    CREATE TABLE movie_crew (
        credit_id TEXT PRIMARY KEY,
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        person_id INTEGER NOT NULL REFERENCES crew_members(person_id) ON DELETE CASCADE,
        department_id INTEGER NOT NULL REFERENCES departments(department_id) ON DELETE CASCADE,
        job_id INTEGER NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE
    );

    CREATE TABLE movie_collections_junction (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        collection_id INTEGER NOT NULL REFERENCES movie_collections(collection_id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, collection_id)
    );

    -- Indexes for join columns and common filters
    CREATE INDEX idx_movies_title ON movies(title);
    CREATE INDEX idx_movies_release_date ON movies(release_date);
    CREATE INDEX idx_movies_vote_average ON movies(vote_average);

    CREATE INDEX idx_movie_genres_movie_id ON movie_genres(movie_id);
    CREATE INDEX idx_movie_genres_genre_id ON movie_genres(genre_id);
    CREATE INDEX idx_movie_keywords_movie_id ON movie_keywords(movie_id);
    CREATE INDEX idx_movie_keywords_keyword_id ON movie_keywords(keyword_id);
    CREATE INDEX idx_movie_companies_company_id ON movie_production_companies(company_id);
    CREATE INDEX idx_movie_countries_country_id ON movie_production_countries(country_id);
    CREATE INDEX idx_movie_languages_language_id ON movie_spoken_languages(language_id);
    CREATE INDEX idx_movie_collections_collection_id ON movie_collections_junction(collection_id);

    CREATE INDEX idx_movie_cast_movie_id ON movie_cast(movie_id);
    CREATE INDEX idx_movie_cast_person_id ON movie_cast(person_id);
    CREATE INDEX idx_movie_crew_movie_id ON movie_crew(movie_id);
    CREATE INDEX idx_movie_crew_person_id ON movie_crew(person_id);
    CREATE INDEX idx_movie_crew_department_id ON movie_crew(department_id);
    CREATE INDEX idx_movie_crew_job_id ON movie_crew(job_id);

    CREATE INDEX idx_ratings_user_id ON ratings(user_id);
    CREATE INDEX idx_ratings_movie_id ON ratings(movie_id);
    "#,
];

/// Drop order: junctions first so foreign keys never block a drop.
const DROP_ORDER: &[&str] = &[
    "movie_genres",
    "movie_keywords",
    "movie_production_companies",
    "movie_production_countries",
    "movie_spoken_languages",
    "movie_cast",
    "movie_crew",
    "movie_collections_junction",
    "ratings",
    "genres",
    "keywords",
    "production_companies",
    "production_countries",
    "spoken_languages",
    "cast_members",
    "crew_members",
    "departments",
    "jobs",
    "movie_collections",
    "movie_ids",
    "users",
    "movies",
];

/// Get current schema version from database
fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = SCHEMA_VERSION;

    if current_version > target_version {
        anyhow::bail!(
            "Database schema version {} is newer than this build supports (max {})",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        conn.execute_batch(migration)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;

        log::info!("Applied migration {}", migration_version);
    }

    Ok(())
}

/// Drop every loader table and re-apply the schema from scratch.
pub fn reset_schema(conn: &Connection) -> Result<()> {
    let mut sql = String::from("BEGIN;\n");
    for table in DROP_ORDER {
        sql.push_str(&format!("DROP TABLE IF EXISTS {};\n", table));
    }
    sql.push_str("PRAGMA user_version = 0;\nCOMMIT;");
    conn.execute_batch(&sql)?;
    log::info!("Dropped {} tables", DROP_ORDER.len());

    run_migrations(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tables::Table;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrations_create_every_table() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in Table::ALL {
            assert!(table_exists(&conn, table.name()), "missing table {}", table);
        }
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(MIGRATIONS.len() as u32, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_reset_clears_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO genres (genre_id, name) VALUES (18, 'Drama')", []).unwrap();

        reset_schema(&conn).unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM genres", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
        assert_eq!(DROP_ORDER.len(), Table::ALL.len());
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        assert!(run_migrations(&conn).is_err());
    }
}
