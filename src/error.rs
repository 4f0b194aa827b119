//! Error handling and custom error types
//!
//! Provides unified error handling across the service using thiserror. Every
//! variant projects onto an [`ErrorKind`], which owns the wire code, the HTTP
//! status and the message a child or parent actually sees.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request has no image")]
    MissingImage,

    #[error("Request has no chat messages")]
    MissingMessages,

    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider billing or quota problem: {0}")]
    PaymentRequired(String),

    #[error("Provider rejected credentials: {0}")]
    Auth(String),

    #[error("Unparseable model response: {0}")]
    Unparseable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("All tutoring providers failed: {0}")]
    ProvidersExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client-facing classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingImage,
    MissingMessages,
    ImageFormat,
    RateLimited,
    PaymentRequired,
    Parse,
    Network,
    Auth,
    Server,
}

impl ErrorKind {
    /// Value of the `error` field in JSON error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingImage => "missing_image",
            ErrorKind::MissingMessages => "missing_messages",
            ErrorKind::ImageFormat => "image_format_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::PaymentRequired => "payment_required",
            ErrorKind::Parse => "parse_error",
            ErrorKind::Network => "network_error",
            ErrorKind::Auth => "auth_error",
            ErrorKind::Server => "server_error",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::MissingImage | ErrorKind::MissingMessages | ErrorKind::ImageFormat => 400,
            ErrorKind::RateLimited => 429,
            ErrorKind::PaymentRequired => 402,
            ErrorKind::Parse | ErrorKind::Network | ErrorKind::Auth | ErrorKind::Server => 500,
        }
    }

    /// Friendly, non-technical text shown to the family.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::MissingImage => "Please add a photo of the homework first.",
            ErrorKind::MissingMessages => "Please type a message so we can help.",
            ErrorKind::ImageFormat => {
                "We couldn't open that picture. Please take a new photo or upload a JPG or PNG."
            }
            ErrorKind::RateLimited => {
                "Lots of kids are asking for help right now! Please wait a moment and try again."
            }
            ErrorKind::PaymentRequired => {
                "Our homework helper is taking a little nap. Please try again later."
            }
            ErrorKind::Parse => {
                "We had trouble reading this homework. Please try again with a clearer photo."
            }
            ErrorKind::Network | ErrorKind::Auth | ErrorKind::Server => {
                "Something went wrong on our side. Please try again in a moment."
            }
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingImage => ErrorKind::MissingImage,
            Error::MissingMessages => ErrorKind::MissingMessages,
            Error::InvalidImageFormat(_) => ErrorKind::ImageFormat,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::PaymentRequired(_) => ErrorKind::PaymentRequired,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Unparseable(_) => ErrorKind::Parse,
            Error::Network(_) => ErrorKind::Network,
            Error::AiProvider(_)
            | Error::ProvidersExhausted(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_) => ErrorKind::Server,
        }
    }
}
