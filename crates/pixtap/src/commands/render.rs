//! `pixtap render` command implementation.
//!
//! One-shot render to a WebP file or stdout, without record framing.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Args;
use pixtap_config::{CliSettings, Config};
use pixtap_process::{ProcessRunner, SystemRunner};
use pixtap_render::{PixletRenderer, render_options_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Applet to render: a `.star` script or an applet directory
    /// (overrides config).
    path: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover pixtap.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file for the rendered WebP image (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

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

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, the render, or writing the image
    /// fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            path: self.path,
            pixlet: self.pixlet,
            python: self.python,
            magnify: self.magnify,
            timezone: self.timezone,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let app_path = config.require_app_path()?.to_path_buf();

        output.info(&format!("Rendering Pixlet applet '{}'", app_path.display()));

        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
        let renderer = PixletRenderer::new(render_options_from_config(&config), runner);
        let image = renderer.render(&app_path).await?;

        let bytes = BASE64
            .decode(image.image_data.as_bytes())
            .map_err(|err| CliError::Validation(format!("invalid image data: {err}")))?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &bytes)?;
                output.success(&format!(
                    "Wrote {} bytes to '{}'",
                    bytes.len(),
                    path.display()
                ));
            }
            None => {
                let stdout = std::io::stdout();
                let mut writer = stdout.lock();
                writer.write_all(&bytes)?;
            }
        }

        Ok(())
    }
}
