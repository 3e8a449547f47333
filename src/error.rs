use crate::store::RepositoryError;

pub type OmasResult<T> = std::result::Result<T, OmasError>;

/// Errors surfaced by the access services to their callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OmasError {
    #[error("invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("metadata repository failure: {0}")]
    PropertyServer(String),

    #[error("user '{0}' is not authorized to issue this request")]
    UserNotAuthorized(String),

    #[error("{0}")]
    EntityNotDeleted(String),

    #[error("{0}")]
    FunctionNotSupported(String),

    #[error("no {type_name} found with {identifier}")]
    NotFound {
        type_name: String,
        identifier: String,
    },
}

impl OmasError {
    pub fn invalid_parameter(parameter: &str, message: impl Into<String>) -> Self {
        OmasError::InvalidParameter {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(type_name: &str, identifier: impl Into<String>) -> Self {
        OmasError::NotFound {
            type_name: type_name.to_string(),
            identifier: identifier.into(),
        }
    }

    /// Exception class reported in error bodies, kept stable for clients.
    pub fn exception_class_name(&self) -> &'static str {
        match self {
            OmasError::InvalidParameter { .. } => "InvalidParameterException",
            OmasError::PropertyServer(_) => "PropertyServerException",
            OmasError::UserNotAuthorized(_) => "UserNotAuthorizedException",
            OmasError::EntityNotDeleted(_) => "EntityNotDeletedException",
            OmasError::FunctionNotSupported(_) => "FunctionNotSupportedException",
            OmasError::NotFound { .. } => "EntityNotKnownException",
        }
    }

    pub fn user_action(&self) -> &'static str {
        match self {
            OmasError::InvalidParameter { .. } => "Correct the request and retry.",
            OmasError::PropertyServer(_) => "Check the metadata repository and retry.",
            OmasError::UserNotAuthorized(_) => "Request access for this user.",
            OmasError::EntityNotDeleted(_) => "Soft-delete the instance before purging it.",
            OmasError::FunctionNotSupported(_) => "Use a soft delete instead.",
            OmasError::NotFound { .. } => "Check the identifier and retry.",
        }
    }
}

impl From<RepositoryError> for OmasError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Type(e) => OmasError::invalid_parameter("typeName", e.to_string()),
            RepositoryError::EntityNotKnown(guid) => {
                OmasError::invalid_parameter("guid", format!("entity {} is not known", guid))
            }
            RepositoryError::RelationshipNotKnown(guid) => {
                OmasError::invalid_parameter("guid", format!("relationship {} is not known", guid))
            }
            e @ RepositoryError::DuplicateQualifiedName { .. } => {
                OmasError::invalid_parameter("qualifiedName", e.to_string())
            }
            e @ RepositoryError::NotDeleted(_) => OmasError::EntityNotDeleted(e.to_string()),
            e @ RepositoryError::FunctionNotSupported(_) => {
                OmasError::FunctionNotSupported(e.to_string())
            }
            RepositoryError::Storage(e) => OmasError::PropertyServer(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_service_errors() {
        let err: OmasError = RepositoryError::NotDeleted("g1".to_string()).into();
        assert_eq!(err.exception_class_name(), "EntityNotDeletedException");

        let err: OmasError = RepositoryError::Storage(anyhow::anyhow!("connection reset")).into();
        assert_eq!(
            err,
            OmasError::PropertyServer("connection reset".to_string())
        );

        let err: OmasError =
            RepositoryError::FunctionNotSupported("purge_entity".to_string()).into();
        assert!(matches!(err, OmasError::FunctionNotSupported(_)));
    }
}
