//! The `utils` module provides the pieces shared by every other module of
//! `linesub`: the crate error type and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::error::Error;
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
        assert_eq!(logging::parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(logging::parse_level("chatty"), tracing::Level::INFO);
    }

    #[test]
    fn frame_too_large_message_names_limit() {
        let err = Error::FrameTooLarge { limit: 16 };
        assert_eq!(err.to_string(), "frame exceeds 16 bytes without a delimiter");
    }
}
