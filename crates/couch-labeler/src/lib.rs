//! Couch colour labels from a hosted multimodal model.
//!
//! The pipeline only sees the [`ColorLabeler`] trait; [`OpenAiLabeler`] is
//! the production implementation.

pub mod client;
pub mod error;

pub use client::{
    label_schema, ColorLabeler, LabelerConfig, OpenAiLabeler, DEFAULT_BASE_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, PROMPT,
};
pub use error::{LabelerError, LabelerResult};

/// Fill `{video_id}` in a public image URL template.
pub fn image_url_for(template: &str, video_id: &str) -> String {
    template.replace("{video_id}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_for() {
        let template = "https://example.com/couch_images/{video_id}_couch.jpg?raw=true";
        assert_eq!(
            image_url_for(template, "abc"),
            "https://example.com/couch_images/abc_couch.jpg?raw=true"
        );
    }
}
