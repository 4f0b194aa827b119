use crate::image::{ImagePayload, MediaType};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockBuilder};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MESSAGES_PATH: &str = "/v1/messages";

pub fn post(route: &str) -> MockBuilder {
    Mock::given(method("POST")).and(path(route))
}

pub fn png_image() -> ImagePayload {
    ImagePayload {
        base64: "iVBORw0KGgo=".to_string(),
        media_type: MediaType::Png,
        byte_len: 8,
    }
}
