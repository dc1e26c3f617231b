use std::path::PathBuf;

use anyhow::Context;
use chrono_tz::Tz;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use dialoguer::theme::ColorfulTheme;
use hwcloud_export::api::{self, Client};
use hwcloud_export::extract::{BatteryExtractor, ChannelExtractor, Extractor, LOAD_RESISTOR};
use hwcloud_export::{logger, parse_bound, FetchRequest, Layout, TimeRange};
use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExtractorKind {
    /// Battery test rig: label, date, t1, t2, v1, v2, r
    Battery,
    /// One row per numeric reading of the payload
    Channels,
}

/// Export device measurements of a HARDWARIO Cloud group into an XLSX file.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output XLSX file
    #[arg(
        short = 'x',
        long,
        env = "HWCLOUD_XLSX_FILE",
        default_value = "measurements.xlsx"
    )]
    xlsx_file: PathBuf,

    /// Group identifier
    #[arg(short, long, env = "HWCLOUD_GROUP_ID")]
    group_id: String,

    /// Group api token, asked for on the terminal when missing
    #[arg(short = 't', long, env = "HWCLOUD_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Only messages created at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Only messages created before this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,

    /// Base url of the REST API
    #[arg(long, env = "HWCLOUD_API_URL", default_value = api::DEFAULT_BASE_URL)]
    api_url: String,

    /// Number of items requested per page
    #[arg(
        long,
        default_value_t = api::DEFAULT_PAGE_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=api::MAX_PAGE_SIZE as u64)
    )]
    page_size: usize,

    /// Timezone of the date column and of bare dates in --since/--until
    #[arg(long, env = "HWCLOUD_TIMEZONE", default_value = "UTC")]
    timezone: String,

    /// Which columns to extract from the messages
    #[arg(long, value_enum, default_value_t = ExtractorKind::Battery)]
    extractor: ExtractorKind,

    /// Load resistor of the battery rig in ohm
    #[arg(long, default_value_t = LOAD_RESISTOR)]
    load_resistor: f64,

    /// Write one sheet per device instead of a single sheet
    #[arg(long)]
    sheet_per_device: bool,

    /// Log every request
    #[arg(short, long)]
    verbose: bool,
}

fn prompt_token(group_id: &str) -> anyhow::Result<String> {
    let token = dialoguer::Password::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Enter api token for group `{}`", group_id))
        .allow_empty_password(false)
        .report(false)
        .interact()?;
    Ok(token)
}

fn parse_range(args: &Args, timezone: Tz) -> anyhow::Result<TimeRange> {
    let bound = |arg: &Option<String>, name: &str| {
        arg.as_deref()
            .map(|s| parse_bound(s, timezone))
            .transpose()
            .with_context(|| format!("parse --{}", name))
    };

    let range = TimeRange {
        since: bound(&args.since, "since")?,
        until: bound(&args.until, "until")?,
    };
    if let (Some(since), Some(until)) = (range.since, range.until) {
        anyhow::ensure!(since < until, "--since must be before --until");
    }
    Ok(range)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // before parsing, so the env fallbacks of the arguments see it
    let dotenv = dotenv::dotenv();
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logger::init(level).context("initialize logger")?;

    match dotenv {
        Ok(path) => log::info!("loaded .env from {}", path.display()),
        Err(err) => log::debug!("couldn't load .env file: {:?}", err),
    };

    let timezone = args
        .timezone
        .parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("unknown timezone `{}`", args.timezone))?;
    let range = parse_range(&args, timezone)?;

    let token = match args.api_token.clone() {
        Some(token) => token,
        None => prompt_token(&args.group_id).context("read api token")?,
    };

    let request = FetchRequest {
        group_id: args.group_id.clone(),
        token,
        range,
    };
    log::debug!("{:?}", request);

    let extractor: Box<dyn Extractor> = match args.extractor {
        ExtractorKind::Battery => Box::new(BatteryExtractor {
            timezone,
            load_resistor: args.load_resistor,
        }),
        ExtractorKind::Channels => Box::new(ChannelExtractor { timezone }),
    };
    let layout = if args.sheet_per_device {
        Layout::PerDevice
    } else {
        Layout::Single
    };

    let client = Client::new(&args.api_url, args.page_size)?;

    log::info!("fetching data for group {}", request.group_id);
    let rows = hwcloud_export::run(
        &client,
        &request,
        extractor.as_ref(),
        layout,
        &args.xlsx_file,
    )
    .await
    .with_context(|| format!("export group {}", request.group_id))?;

    log::info!("wrote {} rows to {}", rows, args.xlsx_file.display());
    Ok(())
}
