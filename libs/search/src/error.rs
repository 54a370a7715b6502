//! Error types for the search engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The query text is not valid for the searched domain.
    #[error("Search error: {0}")]
    Search(String),

    /// A boundary parameter (page, page size) is out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by the
    /// engine or its backend. Hosts map these to a 400-class response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Search(_) | Error::Validation(_))
    }
}

/// Format a set of valid names for an "unknown token" message.
///
/// Callers pass keys of an ordered map, so the listing is already sorted.
pub(crate) fn format_names<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let quoted: Vec<String> = names.into_iter().map(|n| format!("{:?}", n)).collect();
    format!("[{}]", quoted.join(", "))
}
