//! Errors raised while loading card data, scenarios and config.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("unable to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse json '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to parse yaml '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown card id '{0}'")]
    UnknownCard(String),

    #[error("team has {0} members, at most {max} slots are available", max = crate::calc::TEAM_SLOTS)]
    TooManyMembers(usize),
}
