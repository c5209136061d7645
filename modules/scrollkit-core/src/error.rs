use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrollError {
    #[error("missing or empty entity id")]
    InvalidEntity,

    #[error("malformed paginated response: {0}")]
    MalformedResponse(String),

    #[error("record without id in batch for entity {entity}")]
    MissingId { entity: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
