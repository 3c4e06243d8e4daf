use thiserror::Error;

/// Errors that abort a whole import. Problems with a single record are
/// counted on the batch instead.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("no files to import")]
    NoFiles,

    #[error("the files contain no associations to import")]
    NoRecords,

    #[error("the files contain associations from several municipalities: {0}")]
    MixedMunicipalities(String),

    #[error("municipality with id {0} does not exist")]
    UnknownMunicipalityId(i64),

    #[error("municipality \"{0}\" does not exist")]
    UnknownMunicipality(String),

    #[error("a municipality must be given or readable from the file")]
    MissingMunicipality,

    #[error("{file}: invalid JSON at {location}: {source}")]
    Json {
        file: String,
        location: String,
        source: serde_json::Error,
    },

    #[error("{file}: invalid record at {location}: {reason}")]
    InvalidRecord {
        file: String,
        location: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ImportError {
    /// Errors caused by the uploaded content rather than by the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ImportError::Io(_) | ImportError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(ImportError::NoFiles.is_client_error());
        assert!(ImportError::UnknownMunicipality("Gävle".into()).is_client_error());
        assert!(!ImportError::Database(sqlx::Error::RowNotFound).is_client_error());
    }

    #[test]
    fn display_names_the_file() {
        let err = ImportError::InvalidRecord {
            file: "gavle.jsonl".into(),
            location: "line 3".into(),
            reason: "municipality must not be empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "gavle.jsonl: invalid record at line 3: municipality must not be empty"
        );
    }
}
