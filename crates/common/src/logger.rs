use std::{fs::OpenOptions, io, path::Path, sync::Mutex};

use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info";
const FILE_FILTER: &str = "debug";

fn quiet_http(filter: EnvFilter) -> EnvFilter {
    filter
        .add_directive("reqwest=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"))
}

/// Console output follows `RUST_LOG`. With `log_file` set, everything at
/// debug and above is also appended to that file.
pub fn setup_logger(log_file: Option<&Path>) -> io::Result<()> {
    let console_filter = quiet_http(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    );

    let console = fmt::layer()
        // .with_file(true)
        // .with_line_number(true)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_filter(console_filter);

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(quiet_http(EnvFilter::new(FILE_FILTER))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(())
}
