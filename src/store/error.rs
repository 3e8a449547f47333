use crate::model::{Guid, TypeError};

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("entity {0} is not known to the repository")]
    EntityNotKnown(Guid),

    #[error("relationship {0} is not known to the repository")]
    RelationshipNotKnown(Guid),

    #[error("an active {type_name} with qualified name '{qualified_name}' already exists")]
    DuplicateQualifiedName {
        type_name: String,
        qualified_name: String,
    },

    #[error("{0} must be soft-deleted before it can be purged")]
    NotDeleted(Guid),

    #[error("{0} is not supported by this repository")]
    FunctionNotSupported(String),

    #[error("repository storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Storage(err.into())
    }
}
