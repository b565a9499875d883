//! listing-capture — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use listing_capture::config::resolve_output_dir;
use listing_capture::renderer::chromium::{BrowserOptions, ChromiumRenderer};
use listing_capture::{run_in_browser, CaptureError, Pipeline, RunConfig, RunSummary, SiteRegistry};

#[derive(Parser)]
#[command(
    name = "listing-capture",
    about = "Collect product images and capture rendered pages from classified-ad listings",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one listing page.
    Capture {
        /// Listing URL.
        url: String,

        /// Only capture the page (no image discovery or metadata).
        #[arg(long)]
        skip_images: bool,

        /// Output directory. Also reads LISTING_CAPTURE_OUTPUT_DIR.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Show the browser window.
        #[arg(long)]
        headful: bool,

        /// Path to a Chromium/Chrome binary.
        /// Also reads LISTING_CAPTURE_CHROMIUM_PATH.
        #[arg(long)]
        chromium: Option<PathBuf>,

        /// Concurrent metadata requests.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=64))]
        enrich_concurrency: u16,

        /// Do not write the PDF.
        #[arg(long)]
        no_pdf: bool,

        /// Do not write the screenshot.
        #[arg(long)]
        no_screenshot: bool,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List supported sites.
    Sites {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   listing-capture completions bash > ~/.local/share/bash-completion/completions/listing-capture
    ///   listing-capture completions zsh > ~/.zfunc/_listing-capture
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Capture {
            url,
            skip_images,
            output_dir,
            headful,
            chromium,
            enrich_concurrency,
            no_pdf,
            no_screenshot,
            json,
        } => {
            let mut config = RunConfig::new(url);
            config.skip_images = skip_images;
            config.output_dir = resolve_output_dir(output_dir.as_deref());
            config.browser = BrowserOptions {
                chromium_path: chromium,
                headless: !headful,
                ..BrowserOptions::default()
            };
            config.enrich_concurrency = usize::from(enrich_concurrency);
            config.capture_pdf = !no_pdf;
            config.capture_screenshot = !no_screenshot;

            let pipeline = Pipeline::new(config);
            // Unsupported URLs fail before the browser starts.
            let adapter = pipeline.adapter()?;
            tracing::info!(site = %adapter.id, "Resolved site adapter");

            let renderer = ChromiumRenderer::launch(&pipeline.config().browser)
                .await
                .map_err(|e| CaptureError::BrowserUnavailable(e.to_string()))?;
            let summary = run_in_browser(&renderer, &pipeline).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::Sites { json } => {
            let registry = SiteRegistry::builtin();
            if json {
                let sites: Vec<_> = registry
                    .adapters()
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "id": a.id,
                            "site_patterns": a.site_patterns,
                            "image_domains": a.image_domains,
                            "sections": a.section_labels,
                            "secondary_pdf": a.secondary_pdf.is_some(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else {
                for adapter in registry.adapters() {
                    println!(
                        "{:<12} {}  (images: {})",
                        adapter.id,
                        adapter.site_patterns.join(", "),
                        adapter.image_domains.join(", ")
                    );
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "listing-capture", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Site:       {}", summary.site);
    println!("Listing:    {}", summary.listing_id);
    if summary.images_skipped {
        println!("Images:     skipped");
    } else {
        println!("Images:     {}", summary.images_found);
        for (i, record) in summary.records.iter().enumerate() {
            println!("  {:>3}. {} | {}", i + 1, record.filename(), record.last_modified);
        }
    }
    println!(
        "Sections:   {} expanded, {} already open, {} not found",
        summary.sections_expanded, summary.sections_already_open, summary.sections_not_found
    );
    println!("Show more:  {} clicked", summary.buttons_clicked);
    println!("Gallery:    {} steps", summary.gallery_steps);

    let outputs = &summary.outputs;
    for path in [
        &outputs.dated_listing,
        &outputs.url_listing,
        &outputs.pdf,
        &outputs.screenshot,
        &outputs.original_pdf,
    ]
    .into_iter()
    .flatten()
    {
        println!("Saved:      {}", path.display());
    }
    if let Some(urls) = &outputs.url_listing {
        println!("\nTo download all images:");
        println!("  wget -i {} -P ./images-{}/", urls.display(), summary.site);
    }
}
