use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("invalid position fix: {0}")]
    InvalidFix(String),
    #[error("no overlay registered under {0:?}")]
    OverlayNotFound(String),
    #[error("overlay {0:?} is already registered with a different descriptor")]
    DuplicateRegistration(String),
    #[error("invalid overlay: {0}")]
    InvalidOverlay(String),
    #[error("cannot save route: {0}")]
    SaveRefused(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
}
