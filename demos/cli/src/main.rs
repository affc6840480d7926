mod config;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, info, LevelFilter};
use scanlog_core::{FixedClock, SystemClock};
use scanlog_passes::{process_page, ElementSpec, HtmlJsonTree, MemoryPage, MomentFormatter};

#[derive(Parser, Debug)]
#[command(
    name = "scanlog-cli",
    about = "Xem trước trang log webhook scan sau khi hậu xử lý."
)]
struct Args {
    /// Đường dẫn tới file JSON mô tả các phần tử của trang.
    #[arg(short, long)]
    input: PathBuf,

    /// File cấu hình TOML.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Thời điểm "bây giờ" (RFC 3339), mặc định là đồng hồ hệ thống.
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Số tầng cây JSON được mở sẵn.
    #[arg(long, default_value_t = 1)]
    open_depth: usize,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Log level không hợp lệ: {}. Dùng 'warn'.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
    debug!(args:?; "Tham số dòng lệnh");

    let config = config::load_config(args.config.as_deref())?;
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;
    let specs: Vec<ElementSpec> = serde_json::from_str(&data)
        .with_context(|| format!("File trang không hợp lệ {:?}", args.input))?;

    let page = MemoryPage::from_specs(&specs);
    let renderer = HtmlJsonTree::new(args.open_depth);
    let formatter = MomentFormatter::from_config(&config);

    let report = match args.now {
        Some(now) => process_page(&page, &renderer, &formatter, &FixedClock(now), &config)?,
        None => process_page(&page, &renderer, &formatter, &SystemClock, &config)?,
    };
    info!(elements = page.len(), failed = report.failed(); "Đã xử lý trang");

    let output = serde_json::json!({
        "report": report,
        "elements": page.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
