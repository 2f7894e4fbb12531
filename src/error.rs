use thiserror::Error;

#[derive(Error, Debug)]
pub enum StormError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Source file not found: {0}\nRun `storm-report fetch` or pass --file.")]
    MissingSource(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("A report holds at most {max} figures")]
    TooManyFigures { max: usize },

    #[error("Settings error: {0}")]
    Settings(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, StormError>;
