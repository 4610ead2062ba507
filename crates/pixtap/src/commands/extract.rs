//! `pixtap extract` command implementation.
//!
//! Renders the configured applet and emits Singer-style SCHEMA and RECORD
//! messages on stdout. Human-facing output goes to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use pixtap_config::{CliSettings, Config};
use pixtap_process::{ProcessRunner, SystemRunner};
use pixtap_render::{PixletRenderer, render_options_from_config};

use crate::error::CliError;
use crate::output::Output;
use crate::records::{self, ImageRecord};

/// Arguments for the extract command.
#[derive(Args)]
pub(crate) struct ExtractArgs {
    /// Applet to render: a `.star` script or an applet directory
    /// (overrides config).
    path: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover pixtap.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Installation id for the emitted record (default: applet stem).
    #[arg(long)]
    installation_id: Option<String>,

    /// Show the applet in the background rotation (default: enabled).
    #[arg(long)]
    background: Option<bool>,

    /// Show the applet immediately.
    #[arg(long, conflicts_with = "background")]
    no_background: bool,

    /// Renderer binary (overrides config).
    #[arg(long)]
    pixlet: Option<String>,

    /// Python interpreter for helper programs (overrides config).
    #[arg(long)]
    python: Option<String>,

    /// Pixel magnification factor (overrides config).
    #[arg(long)]
    magnify: Option<u32>,

    /// Timezone passed to the applet (overrides config and $TZ).
    #[arg(long)]
    timezone: Option<String>,

    /// Enable verbose output (show render and callback logs).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl ExtractArgs {
    /// Execute the extract command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or the render fails. A failed
    /// render emits no partial record.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let background = self.resolve_background();
        let cli_settings = CliSettings {
            path: self.path,
            installation_id: self.installation_id,
            background,
            pixlet: self.pixlet,
            python: self.python,
            magnify: self.magnify,
            timezone: self.timezone,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let app_path = config.require_app_path()?.to_path_buf();
        let installation_id = config
            .app_resolved
            .installation_id
            .clone()
            .unwrap_or_else(|| applet_stem(&app_path));

        output.info(&format!("Rendering Pixlet applet '{}'", app_path.display()));

        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
        let renderer = PixletRenderer::new(render_options_from_config(&config), runner);
        let image = renderer.render(&app_path).await?;
        tracing::debug!(bytes = image.image_data.len(), "Render finished");

        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        records::write_message(&mut writer, &records::schema_message())?;
        let record = ImageRecord {
            image_data: image.image_data,
            installation_id,
            background: config.app_resolved.background,
        };
        records::write_message(&mut writer, &records::record_message(&record))?;

        output.success(&format!("Emitted record for '{}'", record.installation_id));
        Ok(())
    }

    /// Resolve `background` from --background/--no-background flags.
    fn resolve_background(&self) -> Option<bool> {
        self.no_background.then_some(false).or(self.background)
    }
}

/// Default installation id: the applet's file stem.
fn applet_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "app".to_owned(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applet_stem_of_script() {
        assert_eq!(applet_stem(Path::new("/apps/clock.star")), "clock");
    }

    #[test]
    fn test_applet_stem_of_directory() {
        assert_eq!(applet_stem(Path::new("/apps/weather")), "weather");
    }

    #[test]
    fn test_resolve_background_flags() {
        let base = ExtractArgs {
            path: None,
            config: None,
            installation_id: None,
            background: None,
            no_background: false,
            pixlet: None,
            python: None,
            magnify: None,
            timezone: None,
            verbose: false,
        };

        assert_eq!(base.resolve_background(), None);

        let enabled = ExtractArgs {
            background: Some(true),
            ..base
        };
        assert_eq!(enabled.resolve_background(), Some(true));

        let disabled = ExtractArgs {
            background: None,
            no_background: true,
            ..enabled
        };
        assert_eq!(disabled.resolve_background(), Some(false));
    }
}
