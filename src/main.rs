use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use log::info;

use screenshotdone::server::{Server, ServerConfig};
use screenshotdone::{async_api, RenderConfig, ScreenshotRequest};

#[derive(Parser)]
#[command(name = "screenshotdone", version, about = "HTML to WebP screenshot service")]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct Options {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000, global = true)]
    port: u16,

    /// Chrome/Chromium binary (autodetected when omitted)
    #[arg(long, env = "CHROME_PATH", global = true)]
    chrome_path: Option<PathBuf>,

    /// Run Chrome without its sandbox (needed in most containers)
    #[arg(long, env = "CHROME_NO_SANDBOX", global = true)]
    no_sandbox: bool,

    /// Upper bound on the network-idle wait
    #[arg(long, default_value_t = 30000, global = true)]
    load_timeout_ms: u64,

    /// Extra delay after the page is idle
    #[arg(long, default_value_t = 500, global = true)]
    settle_delay_ms: u64,

    /// Wall-clock budget for one screenshot request
    #[arg(long, default_value_t = 60, global = true)]
    request_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and demo page (default)
    Serve,
    /// Render a single HTML file to a WebP file
    Render {
        /// HTML file to render
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the WebP image
        #[arg(short, long)]
        output: PathBuf,
        /// Viewport width, clamped to 320-3840
        #[arg(long)]
        width: Option<f64>,
        /// WebP quality, 1-100
        #[arg(long)]
        quality: Option<f64>,
    },
}

impl Options {
    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            load_timeout_ms: self.load_timeout_ms,
            settle_delay_ms: self.settle_delay_ms,
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            ..Default::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let backend = screenshotdone::new_backend(cli.options.render_config())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = Server::new(cli.options.server_config(), backend);
            server.run().await?;
        }
        Command::Render { input, output, width, quality } => {
            let html = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let request = ScreenshotRequest::build(html, width, quality)?;

            let shot = async_api::render(Arc::new(backend), request).await?;
            std::fs::write(&output, &shot.data)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote {} ({}, {} bytes)", output.display(), shot.plan, shot.data.len());
        }
    }

    Ok(())
}
