use thiserror::Error;

pub type Result<T> = std::result::Result<T, FolioError>;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("layout failed: {0}")]
    Layout(String),
    #[error("{kind} element prepared twice without reset")]
    AlreadyPrepared { kind: &'static str },
    #[error("{kind} element used before prepare")]
    NotPrepared { kind: &'static str },
    #[error("document contains no elements")]
    EmptyDocument,
    #[error("render failed: {0}")]
    Render(#[from] std::io::Error),
    #[error("persistence error: {0}")]
    Persist(String),
    #[error("pdf inspection failed: {0}")]
    Inspect(String),
}

impl FolioError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        FolioError::Configuration(message.into())
    }

    pub(crate) fn layout(message: impl Into<String>) -> Self {
        FolioError::Layout(message.into())
    }
}

impl From<roxmltree::Error> for FolioError {
    fn from(value: roxmltree::Error) -> Self {
        FolioError::Persist(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_to_render_errors() {
        let err: FolioError = std::io::Error::other("disk full").into();
        assert!(matches!(err, FolioError::Render(_)));
        assert_eq!(err.to_string(), "render failed: disk full");
    }

    #[test]
    fn prepared_twice_names_the_kind() {
        let err = FolioError::AlreadyPrepared { kind: "text" };
        assert_eq!(err.to_string(), "text element prepared twice without reset");
    }
}
