use std::{io::Write, process::ExitCode};

use clap::Parser;
use kiln::{report::error_line, Args, Config, Error, Pipeline};
use log::{info, LevelFilter};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::builder();
    if let Some(level) = args.verbose.as_deref() {
        match level.parse::<LevelFilter>() {
            Ok(filter) => {
                builder.filter_level(filter);
            }
            Err(_) => eprintln!("Ignoring unknown log level '{level}'"),
        }
    }
    // RUST_LOG wins when set
    builder
        .parse_default_env()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{}: {:?}: {style}{}{style:#}: {}",
                ts,
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(args: Args) -> Result<(), Error> {
    let config = Config::new(args)?;
    let config_file = config.write()?;
    info!("Arguments recorded in {config_file:?}");
    let pipeline = Pipeline::load(config)?;
    let written = pipeline.run()?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
