//! Fatal errors and non-fatal warnings raised while resolving a document.

use std::fmt;

use crate::sections::SectionId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Environment '{environment}' not available (declared: {})", .available.join(", "))]
    UnknownEnvironment {
        environment: String,
        available: Vec<String>,
    },

    #[error("'target_specific' cannot contain '{key}'")]
    ForbiddenNesting { key: String },

    #[error("emitting [{section}] failed")]
    Emit {
        section: SectionId,
        #[source]
        source: anyhow::Error,
    },
}

/// Reported and logged, resolution continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    DeprecatedKey {
        key: String,
        replacement: String,
    },
    UnknownSection {
        key: String,
    },
    UnknownSetting {
        key: String,
    },
    MissingSection {
        key: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeprecatedKey { key, replacement } => {
                write!(f, "'{key}' key is deprecated, use '{replacement}' instead")
            }
            Self::UnknownSection { key } => write!(f, "No parsers found for '{key}'"),
            Self::UnknownSetting { key } => write!(f, "'{key}' is not a valid setting"),
            Self::MissingSection { key } => {
                write!(f, "'{key}' not declared, emitting defaults")
            }
        }
    }
}
