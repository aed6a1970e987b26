// Static table descriptors
// Column order here is the tuple order every bulk insert must follow.

use serde::Serialize;

/// Every table the loader writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Movies,
    Genres,
    Keywords,
    ProductionCompanies,
    ProductionCountries,
    SpokenLanguages,
    MovieCollections,
    CastMembers,
    CrewMembers,
    Departments,
    Jobs,
    MovieIds,
    Users,
    Ratings,
    MovieGenres,
    MovieKeywords,
    MovieProductionCompanies,
    MovieProductionCountries,
    MovieSpokenLanguages,
    MovieCollectionsJunction,
    MovieCast,
    MovieCrew,
}

/// Name, insert columns, conflict target, and (for lookups) the key/id columns.
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_target: &'static [&'static str],
    /// Column holding the stored id that junction rows reference.
    pub id_column: Option<&'static str>,
    /// Natural key column for surrogate-keyed lookups.
    pub key_column: Option<&'static str>,
}

static MOVIES: TableSchema = TableSchema {
    name: "movies",
    columns: &[
        "id",
        "title",
        "original_title",
        "overview",
        "release_date",
        "runtime",
        "budget",
        "revenue",
        "vote_average",
        "vote_count",
        "popularity",
        "status",
        "tagline",
        "homepage",
        "adult",
        "video",
        "imdb_id",
        "original_language",
        "poster_path",
        "backdrop_path",
    ],
    conflict_target: &["id"],
    id_column: Some("id"),
    key_column: None,
};

static GENRES: TableSchema = TableSchema {
    name: "genres",
    columns: &["genre_id", "name"],
    conflict_target: &["genre_id"],
    id_column: Some("genre_id"),
    key_column: None,
};

static KEYWORDS: TableSchema = TableSchema {
    name: "keywords",
    columns: &["keyword_id", "name"],
    conflict_target: &["keyword_id"],
    id_column: Some("keyword_id"),
    key_column: None,
};

static PRODUCTION_COMPANIES: TableSchema = TableSchema {
    name: "production_companies",
    columns: &["company_id", "name"],
    conflict_target: &["company_id"],
    id_column: Some("company_id"),
    key_column: None,
};

static PRODUCTION_COUNTRIES: TableSchema = TableSchema {
    name: "production_countries",
    columns: &["iso_code", "name"],
    conflict_target: &["iso_code"],
    id_column: Some("country_id"),
    key_column: Some("iso_code"),
};

static SPOKEN_LANGUAGES: TableSchema = TableSchema {
    name: "spoken_languages",
    columns: &["iso_code", "name"],
    conflict_target: &["iso_code"],
    id_column: Some("language_id"),
    key_column: Some("iso_code"),
};

static MOVIE_COLLECTIONS: TableSchema = TableSchema {
    name: "movie_collections",
    columns: &["collection_id", "name", "poster_path", "backdrop_path"],
    conflict_target: &["collection_id"],
    id_column: Some("collection_id"),
    key_column: None,
};

static CAST_MEMBERS: TableSchema = TableSchema {
    name: "cast_members",
    columns: &["person_id", "name", "gender", "profile_path"],
    conflict_target: &["person_id"],
    id_column: Some("person_id"),
    key_column: None,
};

static CREW_MEMBERS: TableSchema = TableSchema {
    name: "crew_members",
    columns: &["person_id", "name", "gender", "profile_path"],
    conflict_target: &["person_id"],
    id_column: Some("person_id"),
    key_column: None,
};

static DEPARTMENTS: TableSchema = TableSchema {
    name: "departments",
    columns: &["name"],
    conflict_target: &["name"],
    id_column: Some("department_id"),
    key_column: Some("name"),
};

static JOBS: TableSchema = TableSchema {
    name: "jobs",
    columns: &["title"],
    conflict_target: &["title"],
    id_column: Some("job_id"),
    key_column: Some("title"),
};

static MOVIE_IDS: TableSchema = TableSchema {
    name: "movie_ids",
    columns: &["movie_id", "imdb_id", "tmdb_id"],
    conflict_target: &["movie_id"],
    id_column: Some("movie_id"),
    key_column: None,
};

static USERS: TableSchema = TableSchema {
    name: "users",
    columns: &["user_id"],
    conflict_target: &["user_id"],
    id_column: Some("user_id"),
    key_column: None,
};

// Append-only: no conflict target, plain inserts only.
static RATINGS: TableSchema = TableSchema {
    name: "ratings",
    columns: &["user_id", "movie_id", "rating", "timestamp"],
    conflict_target: &[],
    id_column: None,
    key_column: None,
};

static MOVIE_GENRES: TableSchema = TableSchema {
    name: "movie_genres",
    columns: &["movie_id", "genre_id"],
    conflict_target: &["movie_id", "genre_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_KEYWORDS: TableSchema = TableSchema {
    name: "movie_keywords",
    columns: &["movie_id", "keyword_id"],
    conflict_target: &["movie_id", "keyword_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_PRODUCTION_COMPANIES: TableSchema = TableSchema {
    name: "movie_production_companies",
    columns: &["movie_id", "company_id"],
    conflict_target: &["movie_id", "company_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_PRODUCTION_COUNTRIES: TableSchema = TableSchema {
    name: "movie_production_countries",
    columns: &["movie_id", "country_id"],
    conflict_target: &["movie_id", "country_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_SPOKEN_LANGUAGES: TableSchema = TableSchema {
    name: "movie_spoken_languages",
    columns: &["movie_id", "language_id"],
    conflict_target: &["movie_id", "language_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_COLLECTIONS_JUNCTION: TableSchema = TableSchema {
    name: "movie_collections_junction",
    columns: &["movie_id", "collection_id"],
    conflict_target: &["movie_id", "collection_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_CAST: TableSchema = TableSchema {
    name: "movie_cast",
    columns: &["movie_id", "person_id", "character_name", "cast_order", "credit_id"],
    conflict_target: &["movie_id", "person_id", "credit_id"],
    id_column: None,
    key_column: None,
};

static MOVIE_CREW: TableSchema = TableSchema {
    name: "movie_crew",
    columns: &["credit_id", "movie_id", "person_id", "department_id", "job_id"],
    conflict_target: &["credit_id"],
    id_column: None,
    key_column: None,
};

impl Table {
    /// All tables, lookups before the junctions that reference them.
    pub const ALL: [Table; 22] = [
        Table::Movies,
        Table::Genres,
        Table::Keywords,
        Table::ProductionCompanies,
        Table::ProductionCountries,
        Table::SpokenLanguages,
        Table::MovieCollections,
        Table::CastMembers,
        Table::CrewMembers,
        Table::Departments,
        Table::Jobs,
        Table::MovieIds,
        Table::Users,
        Table::Ratings,
        Table::MovieGenres,
        Table::MovieKeywords,
        Table::MovieProductionCompanies,
        Table::MovieProductionCountries,
        Table::MovieSpokenLanguages,
        Table::MovieCollectionsJunction,
        Table::MovieCast,
        Table::MovieCrew,
    ];

    pub fn schema(self) -> &'static TableSchema {
        match self {
            Table::Movies => &MOVIES,
            Table::Genres => &GENRES,
            Table::Keywords => &KEYWORDS,
            Table::ProductionCompanies => &PRODUCTION_COMPANIES,
            Table::ProductionCountries => &PRODUCTION_COUNTRIES,
            Table::SpokenLanguages => &SPOKEN_LANGUAGES,
            Table::MovieCollections => &MOVIE_COLLECTIONS,
            Table::CastMembers => &CAST_MEMBERS,
            Table::CrewMembers => &CREW_MEMBERS,
            Table::Departments => &DEPARTMENTS,
            Table::Jobs => &JOBS,
            Table::MovieIds => &MOVIE_IDS,
            Table::Users => &USERS,
            Table::Ratings => &RATINGS,
            Table::MovieGenres => &MOVIE_GENRES,
            Table::MovieKeywords => &MOVIE_KEYWORDS,
            Table::MovieProductionCompanies => &MOVIE_PRODUCTION_COMPANIES,
            Table::MovieProductionCountries => &MOVIE_PRODUCTION_COUNTRIES,
            Table::MovieSpokenLanguages => &MOVIE_SPOKEN_LANGUAGES,
            Table::MovieCollectionsJunction => &MOVIE_COLLECTIONS_JUNCTION,
            Table::MovieCast => &MOVIE_CAST,
            Table::MovieCrew => &MOVIE_CREW,
        }
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    /// Build the insert statement for this table.
    /// Conflict-ignore targets the declared uniqueness constraint explicitly.
    pub fn insert_sql(self, ignore_conflicts: bool) -> String {
        let schema = self.schema();
        let placeholders = (1..=schema.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.name,
            schema.columns.join(", "),
            placeholders
        );
        if ignore_conflicts && !schema.conflict_target.is_empty() {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO NOTHING",
                schema.conflict_target.join(", ")
            ));
        }
        sql
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_uses_declared_conflict_target() {
        let sql = Table::MovieCast.insert_sql(true);
        assert_eq!(
            sql,
            "INSERT INTO movie_cast (movie_id, person_id, character_name, cast_order, credit_id) \
             VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT (movie_id, person_id, credit_id) DO NOTHING"
        );
    }

    #[test]
    fn test_ratings_never_get_conflict_clause() {
        assert!(!Table::Ratings.insert_sql(true).contains("ON CONFLICT"));
        assert!(!Table::Genres.insert_sql(false).contains("ON CONFLICT"));
    }

    #[test]
    fn test_surrogate_lookups_declare_key_column() {
        for table in [Table::ProductionCountries, Table::SpokenLanguages, Table::Departments, Table::Jobs] {
            assert!(table.schema().key_column.is_some(), "{} needs a key column", table);
        }
        assert!(Table::Genres.schema().key_column.is_none());
    }
}
