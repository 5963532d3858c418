use thiserror::Error;

/// Failure of a catalog refresh. The serving generation is left untouched whenever one of these
/// is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("catalog data source failure: {0}")]
    DataSource(String),
    #[error("catalog is empty; a similarity index cannot be built from zero products")]
    EmptyCatalog,
    #[error("catalog load timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "The catalog is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Refresh(error) => {
                InterfaceError::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError, RefreshError};

    #[test]
    fn refresh_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(RefreshError::DataSource(
            "connection refused".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The catalog is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn empty_catalog_keeps_detail_out_of_user_message() {
        let interface =
            ApplicationError::from(RefreshError::EmptyCatalog).into_interface("req-2");

        assert!(interface.to_string().contains("catalog is empty"));
        assert!(!interface.user_message().contains("empty"));
        assert_eq!(interface.correlation_id(), "req-2");
    }
}
