use clap::{App, Arg, ArgMatches, SubCommand};
use log::{error, info};
use spdm_stream::{
    config::{DEFAULT_RECV_SLOT_LENGTH, DEFAULT_SEND_SLOT_LENGTH},
    run_session, Backing, Device, DeviceConfig, ImageSource, RawStackSource, Result,
    SessionConfig, SimulatedDevice, StreamError, SyntheticSource, TiffStackSource, TsvReport,
    SLOT_ALIGNMENT,
};
use std::io::{self, BufWriter};

fn main() {
    env_logger::init();

    let matches = App::new("spdm-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Stream image stacks through the signal detection engine")
        .subcommand(
            SubCommand::with_name("run")
                .about("Stream an image stack and print the results")
                .arg(
                    Arg::with_name("raw")
                        .short("r")
                        .long("raw")
                        .value_name("FILE")
                        .help("Raw stack of little-endian 16-bit frames")
                        .takes_value(true)
                        .conflicts_with_all(&["synthetic", "tiff"])
                        .requires_all(&["width", "height"]),
                )
                .arg(
                    Arg::with_name("tiff")
                        .short("t")
                        .long("tiff")
                        .value_name("FILE")
                        .help("Multi-page 16-bit grayscale TIFF stack")
                        .takes_value(true)
                        .conflicts_with("synthetic"),
                )
                .arg(
                    Arg::with_name("synthetic")
                        .short("s")
                        .long("synthetic")
                        .value_name("COUNT")
                        .help("Generate COUNT frames with one spot each")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("width")
                        .long("width")
                        .value_name("WIDTH")
                        .help("Frame width in pixels")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("height")
                        .long("height")
                        .value_name("HEIGHT")
                        .help("Frame height in pixels")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("config")
                        .short("c")
                        .long("config")
                        .value_name("FILE")
                        .help("TOML session configuration")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("send_slot")
                        .long("send-slot")
                        .value_name("PIXELS")
                        .help("Pixels per send slot")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("recv_slot")
                        .long("recv-slot")
                        .value_name("RECORDS")
                        .help("Records per receive slot")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("backing")
                        .short("b")
                        .long("backing")
                        .value_name("BACKING")
                        .help("Slot buffer backing")
                        .possible_values(&["heap", "mmap"])
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Show version and device information"),
        )
        .get_matches();

    let result = match matches.subcommand() {
        ("run", Some(run_matches)) => handle_run(run_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_arg(matches: &ArgMatches, name: &str) -> Result<Option<usize>> {
    matches
        .value_of(name)
        .map(|v| {
            v.parse()
                .map_err(|_| StreamError::invalid_parameter(name, format!("'{}' is not a number", v)))
        })
        .transpose()
}

fn handle_run(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.value_of("config") {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(len) = parse_arg(matches, "send_slot")? {
        config = config.with_send_slot_length(len);
    }
    if let Some(len) = parse_arg(matches, "recv_slot")? {
        config = config.with_recv_slot_length(len);
    }
    if let Some(name) = matches.value_of("backing") {
        config = config.with_backing(Backing::from_name(name)?);
    }

    let width = parse_arg(matches, "width")?;
    let height = parse_arg(matches, "height")?;
    let source: Box<dyn ImageSource> = match (
        matches.value_of("raw"),
        matches.value_of("tiff"),
        parse_arg(matches, "synthetic")?,
    ) {
        (Some(path), _, _) => {
            let (width, height) = width.zip(height).ok_or_else(|| {
                StreamError::invalid_parameter("width/height", "raw stacks need both dimensions")
            })?;
            Box::new(RawStackSource::open(path, width, height)?)
        }
        (None, Some(path), _) => Box::new(TiffStackSource::open(path)?),
        (None, None, Some(count)) => Box::new(SyntheticSource::new(
            width.unwrap_or(64),
            height.unwrap_or(64),
            count,
        )),
        (None, None, None) => {
            return Err(StreamError::invalid_parameter(
                "source",
                "pass --tiff FILE, --raw FILE or --synthetic COUNT",
            ))
        }
    };
    info!("Image stack holds {} frames", source.image_count());

    let device = DeviceConfig::new(SimulatedDevice::new())?;
    let stdout = io::stdout();
    let report = TsvReport::new(BufWriter::new(stdout.lock()));

    let (stats, report) = run_session(&device, &config, source, report)?;
    info!("Reported {} results", report.lines());
    info!("{:.0} pixels/sec", stats.pixels_per_second());

    Ok(())
}

fn show_info() -> Result<()> {
    let device = SimulatedDevice::new();
    let constants = device.constants();

    println!("spdm-stream");
    println!("Version: {}", spdm_stream::VERSION);

    println!("\nDevice '{}':", device.name());
    println!("  Maximum image size: {}x{}", constants.max_img_width, constants.max_img_height);
    println!("  Result record size: {} bits", constants.estimator_result_bitsize);
    match constants.max_channel_bytes {
        Some(bytes) => println!("  Channel queue limit: {} bytes", bytes),
        None => println!("  Channel queue limit: none"),
    }

    println!("\nDefaults:");
    println!("  Send slot length: {} pixels", DEFAULT_SEND_SLOT_LENGTH);
    println!("  Receive slot length: {} records", DEFAULT_RECV_SLOT_LENGTH);
    println!("  Slot alignment: {} bytes", SLOT_ALIGNMENT);
    println!("  Backing: {}", Backing::default().name());

    Ok(())
}
