use thiserror::Error;

/// Errors that can occur while loading banners or installing the overlay
#[derive(Error, Debug)]
pub enum BannerError {
    #[error("Failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid VAST version: {0}")]
    InvalidVersion(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No banners available")]
    NoBanners,

    #[error("Unknown error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BannerError>;
