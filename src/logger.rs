use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Log to the terminal, errors and warnings go to stderr.
///
/// Records from dependencies (reqwest, hyper, ...) are dropped.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    TermLogger::init(
        level,
        ConfigBuilder::default()
            .add_filter_allow_str(env!("CARGO_CRATE_NAME"))
            .set_time_level(LevelFilter::Off)
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}
