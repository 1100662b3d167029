use clap::Parser;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use bom_car::CarFile;

mod dump;

use dump::{DumpError, Dumper, Output};

/// `car-dump` prints the content of a compiled asset catalog (CAR file)
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CAR file
    path: PathBuf,

    /// Dump the CAR information: header, extended metadata, key format,
    /// then every facet and rendition
    #[arg(short, long)]
    show: bool,

    /// Dump the facets
    #[arg(short, long)]
    facets: bool,

    /// Dump the renditions
    #[arg(short, long)]
    renditions: bool,

    /// List the named blocks of the container
    #[arg(long)]
    blocks: bool,

    /// Print one JSON object per line instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), DumpError> {
    info!("Opening CAR file: {:?}", args.path);
    let mut car = CarFile::open_path(&args.path)?;

    let output = if args.json { Output::Json } else { Output::Text };
    let mut dumper = Dumper::new(BufWriter::new(std::io::stdout().lock()), output);

    // Without any selection, behave as --show
    let show = args.show || !(args.facets || args.renditions || args.blocks);

    if args.blocks {
        dumper.blocks(car.store())?;
    }
    if show {
        dumper.header(&car.header()?)?;
        match car.metadata() {
            Ok(metadata) => dumper.metadata(&metadata)?,
            Err(e) => warn!("No extended metadata: {}", e),
        }
        dumper.key_format(car.key_format()?)?;
    }
    if show || args.facets {
        for facet in car.facets()? {
            match facet {
                Ok(facet) => dumper.facet(&facet)?,
                Err(e) => warn!("Skipping facet: {}", e),
            }
        }
    }
    if show || args.renditions {
        for rendition in car.renditions()? {
            match rendition {
                Ok(rendition) => dumper.rendition(&rendition)?,
                Err(e) => warn!("Skipping rendition: {}", e),
            }
        }
    }
    dumper.finish()
}

fn setup_logging() {
    use tracing_subscriber::FmtSubscriber;

    const DEFAULT_LOGGING: &str = "car_dump=info,bom_car=info,warn";

    let rust_log = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
        .unwrap_or_else(|| DEFAULT_LOGGING.to_owned());

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(rust_log)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .expect("tracing setup failed");
}
