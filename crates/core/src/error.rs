use crate::body_part::BodyPart;

/// Faults raised while turning an image into an analysis.
///
/// Each variant maps to exactly one HTTP response at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    BadRequest(String),
    #[error(
        "This image does not appear to be a valid {body_part} image. Please upload a clear image of your {body_part}."
    )]
    ImageRejected { body_part: BodyPart },
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Payment required. Please add credits to continue.")]
    PaymentRequired,
    #[error("AI Gateway error: {status}")]
    Gateway { status: u16 },
    #[error("Validation error: {status}")]
    Validation { status: u16 },
    #[error("AI Gateway returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("AI Gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to parse analysis: {0}")]
    Parse(String),
    #[error("{0} not configured")]
    MissingCredential(&'static str),
}

pub type AnalysisOutcome<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to create storage directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("analysis record already exists: {0}")]
    RecordExists(String),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read scope file {path}: {source}", path = path.display())]
    ScopeFileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse analysis scope: {0}")]
    ScopeParse(serde_yaml::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
