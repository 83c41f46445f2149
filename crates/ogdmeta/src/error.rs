use std::path::PathBuf;

pub(crate) type OgdResult<T> = Result<T, OgdError>;

macro_rules! bail {
    ($($arg:tt)*) => {{
        return Err(OgdError::Other(format!($($arg)*)));
    }};
}

pub(crate) use bail;

#[derive(Debug, thiserror::Error)]
pub(crate) enum OgdError {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// The catalog could not be retrieved (network error, timeout or
    /// a non-success status code).
    #[error("unable to fetch catalog: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The catalog document doesn't have the expected shape.
    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("unable to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "snapshot not found ({}), run `ogdmeta run` first",
        path.display()
    )]
    DataNotFound { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl OgdError {
    #[inline]
    pub(crate) fn other<T: ToString>(s: T) -> Self {
        Self::Other(s.to_string())
    }

    #[inline]
    pub(crate) fn write<P: Into<PathBuf>>(
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
