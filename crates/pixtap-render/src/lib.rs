//! Render orchestration for Pixlet applets.
//!
//! Ties the pieces together for one render: bundle a directory applet into
//! a single script, stand up the per-render callback server, invoke the
//! external `pixlet` binary with the reserved and user-supplied config
//! pairs, and retry timeout-class failures a bounded number of times.

mod error;
mod renderer;

use std::time::Duration;

pub use error::RenderError;
pub use renderer::{PixletRenderer, RenderAttempt, RenderOptions, RenderedImage};

/// Create render options from pixtap config.
///
/// The timezone falls back to the `TZ` environment variable when the config
/// leaves it unset; `app_config` pairs are passed through in table order.
#[must_use]
pub fn render_options_from_config(config: &pixtap_config::Config) -> RenderOptions {
    RenderOptions {
        pixlet: config.pixlet.binary.clone(),
        python: config.pixlet.python.clone(),
        magnify: config.pixlet.magnify,
        max_retries: config.pixlet.max_retries,
        retry_delay: Duration::from_secs(config.pixlet.retry_delay_secs),
        app_config: config
            .app_config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        timezone: config
            .pixlet
            .timezone
            .clone()
            .or_else(|| std::env::var("TZ").ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_from_config_defaults() {
        let config = pixtap_config::Config::default();

        let options = render_options_from_config(&config);

        assert_eq!(options.pixlet, "pixlet");
        assert_eq!(options.python, "python3");
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_secs(3));
        assert!(options.app_config.is_empty());
    }

    #[test]
    fn test_render_options_from_config_passes_app_config() {
        let mut config = pixtap_config::Config::default();
        config
            .app_config
            .insert("city".to_owned(), "Delft".to_owned());
        config.pixlet.timezone = Some("UTC".to_owned());

        let options = render_options_from_config(&config);

        assert_eq!(options.app_config, vec![("city".to_owned(), "Delft".to_owned())]);
        assert_eq!(options.timezone, Some("UTC".to_owned()));
    }
}

