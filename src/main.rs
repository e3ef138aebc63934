use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use vsat_lbanner::config::Options;
use vsat_lbanner::controller::Controller;
use vsat_lbanner::error::BannerError;
use vsat_lbanner::geometry::{place_segment, resolve_offsets, ShellSize};
use vsat_lbanner::models::Banner;
use vsat_lbanner::render::MemoryHost;
use vsat_lbanner::tracking::HttpPixelSink;
use vsat_lbanner::{async_api, simulate};

/// L-banner overlay toolkit for VAST/VSAT payloads
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, unwrap and parse a payload, printing its banners as JSON
    Parse {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the offsets and placement rules of each banner for a shell size
    Layout {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        #[arg(long, default_value_t = 1280.0)]
        width: f64,

        #[arg(long, default_value_t = 720.0)]
        height: f64,

        /// Only lay out this banner
        #[arg(short, long)]
        banner: Option<String>,
    },

    /// Replay a script of player events against the payload
    Simulate {
        /// Path to the VAST file or URL
        #[arg(short, long)]
        input: String,

        /// Script file, one step per line
        #[arg(short, long)]
        script: PathBuf,

        /// Options file (JSON)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Force a banner on screen while paused
        #[arg(long)]
        show_on_pause: bool,

        /// Actually request impression and click tracking URLs
        #[arg(long)]
        fire_pixels: bool,

        #[arg(long, default_value_t = 1280.0)]
        width: f64,

        #[arg(long, default_value_t = 720.0)]
        height: f64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, pretty } => {
            let banners = async_api::load_banners(&input).await?;
            let banners: Vec<&Banner> = banners.iter().collect();

            if pretty {
                println!("{}", serde_json::to_string_pretty(&banners)?);
            } else {
                println!("{}", serde_json::to_string(&banners)?);
            }
        }
        Commands::Layout {
            input,
            width,
            height,
            banner,
        } => {
            let banners = async_api::load_banners(&input).await?;
            let shell = ShellSize::new(width, height);
            let reference_width = Options::default().reference_width;

            let selected: Vec<&Banner> = match &banner {
                Some(id) => banners.get(id).into_iter().collect(),
                None => banners.iter().collect(),
            };
            if selected.is_empty() {
                return Err(BannerError::NoBanners.into());
            }

            for banner in selected {
                let offsets = resolve_offsets(&banner.layout.segments, shell);
                println!("{}", banner.id);
                for (name, value) in offsets.css_properties() {
                    println!("  {}: {}", name, value);
                }
                for segment in &banner.layout.segments {
                    match place_segment(segment, shell, &offsets, reference_width) {
                        Some(rule) => println!("  #{} {{ {} }}", segment.id, rule.to_css()),
                        None => println!("  #{} (not placed)", segment.id),
                    }
                }
            }
        }
        Commands::Simulate {
            input,
            script,
            options,
            show_on_pause,
            fire_pixels,
            width,
            height,
        } => {
            let mut options = match options {
                Some(path) => Options::from_file(path)?,
                None => Options::default(),
            };
            if show_on_pause {
                options.show_banners_on_pause = true;
            }

            let steps = simulate::parse_script(&tokio::fs::read_to_string(&script).await?)?;
            let banners = async_api::load_banners(&input).await?;
            info!("Simulating {} steps over {} banners", steps.len(), banners.len());

            let host = MemoryHost::with_selectors(
                &options.shell_selector,
                &options.host_selector,
                ShellSize::new(width, height),
            );
            let mut controller = Controller::install(options, banners, host)?;
            if fire_pixels {
                controller = controller.with_tracking(Box::new(HttpPixelSink::new()?));
            }
            for line in simulate::run(&mut controller, &steps) {
                println!("{}", line);
            }
            if fire_pixels {
                // Pixel requests run as spawned tasks on this runtime
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    Ok(())
}
