use std::error::Error;
use std::fmt::{Display, Formatter};

/// Point in a connection's life at which SQLite failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStage {
    /// Opening the file or in-memory database.
    Open,
    /// Connection pragmas (journal mode, busy timeout).
    Bootstrap,
    /// Reading or advancing `user_version`.
    Migrate,
    /// Statements issued by the repository after open.
    Query,
}

impl DbStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Bootstrap => "bootstrap",
            Self::Migrate => "migrate",
            Self::Query => "query",
        }
    }

    /// Stable `error_code` value used in `db_*` log lines.
    pub fn error_code(self) -> &'static str {
        match self {
            Self::Open => "db_open_failed",
            Self::Bootstrap => "db_bootstrap_failed",
            Self::Migrate => "db_migrate_failed",
            Self::Query => "db_query_failed",
        }
    }
}

#[derive(Debug)]
pub enum DbError {
    Sqlite {
        stage: DbStage,
        source: rusqlite::Error,
    },
    /// The file was migrated by a newer build than this one.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Adapter for `map_err` that tags a SQLite error with `stage`.
    pub fn at(stage: DbStage) -> impl Fn(rusqlite::Error) -> Self {
        move |source| Self::Sqlite { stage, source }
    }

    pub fn stage(&self) -> DbStage {
        match self {
            Self::Sqlite { stage, .. } => *stage,
            Self::UnsupportedSchemaVersion { .. } => DbStage::Migrate,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite { stage, source } => {
                write!(f, "sqlite {} failed: {source}", stage.label())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "schema version {db_version} is newer than this build supports ({latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}
