//! Bridge WASM <-> trang log webhook scan trong trình duyệt.

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod logger;
mod styles;

use std::str::FromStr;

use log::LevelFilter;
use scanlog_core::{PageReport, ProcessorConfig, RerunPolicy, ScanLogError};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
struct JsProcessorConfig {
    #[serde(default)]
    relative_threshold_secs: Option<i64>,
    #[serde(default)]
    absolute_pattern: Option<String>,
    #[serde(default)]
    rerun: Option<RerunPolicy>,
    #[serde(default)]
    display_offset_minutes: Option<i32>,
    #[serde(default)]
    builtin_renderer: Option<bool>,
    #[serde(default)]
    builtin_formatter: Option<bool>,
    #[serde(default)]
    inject_styles: Option<bool>,
    #[serde(default)]
    log_level: Option<String>,
}

/// Tuỳ chọn của bridge: cấu hình lõi cộng với lựa chọn backend.
#[derive(Debug, Clone, PartialEq)]
struct BridgeOptions {
    processor: ProcessorConfig,
    /// Dùng renderer HTML dựng sẵn thay cho `jsonTree.create`.
    builtin_renderer: bool,
    /// Dùng formatter chrono thay cho `moment`.
    builtin_formatter: bool,
    inject_styles: bool,
    log_level: LevelFilter,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            builtin_renderer: false,
            builtin_formatter: false,
            inject_styles: true,
            log_level: LevelFilter::Warn,
        }
    }
}

impl TryFrom<JsProcessorConfig> for BridgeOptions {
    type Error = ScanLogError;

    fn try_from(cfg: JsProcessorConfig) -> Result<Self, Self::Error> {
        let mut base = BridgeOptions::default();
        if let Some(secs) = cfg.relative_threshold_secs {
            base.processor.relative_threshold_secs = secs;
        }
        if let Some(pattern) = cfg.absolute_pattern {
            base.processor.absolute_pattern = pattern;
        }
        if let Some(rerun) = cfg.rerun {
            base.processor.rerun = rerun;
        }
        if cfg.display_offset_minutes.is_some() {
            base.processor.display_offset_minutes = cfg.display_offset_minutes;
        }
        if let Some(builtin) = cfg.builtin_renderer {
            base.builtin_renderer = builtin;
        }
        if let Some(builtin) = cfg.builtin_formatter {
            base.builtin_formatter = builtin;
        }
        if let Some(inject) = cfg.inject_styles {
            base.inject_styles = inject;
        }
        if let Some(level) = cfg.log_level {
            base.log_level = LevelFilter::from_str(&level)
                .map_err(|_| ScanLogError::Config(format!("log_level không hợp lệ: {level}")))?;
        }
        base.processor.validate()?;
        Ok(base)
    }
}

/// Chạy ba lượt xử lý trên `document` hiện tại và trả về thống kê.
#[wasm_bindgen]
pub fn process_scan_logs(config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let options = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsProcessorConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            BridgeOptions::try_from(cfg).map_err(to_js_error)?
        }
        _ => BridgeOptions::default(),
    };

    let report = run(&options).map_err(to_js_error)?;

    to_value(&report).map_err(|err| JsValue::from_str(&format!("Không serialize report: {err}")))
}

/// Chèn CSS mặc định cho nhãn trạng thái và cây JSON (không làm gì nếu đã có).
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn inject_scan_log_styles() -> Result<(), JsValue> {
    let document = dom::document().map_err(to_js_error)?;
    styles::ensure_styles(&document)
}

#[cfg(not(target_arch = "wasm32"))]
#[wasm_bindgen]
pub fn inject_scan_log_styles() -> Result<(), JsValue> {
    Err(to_js_error(wasm_only()))
}

#[cfg(target_arch = "wasm32")]
fn run(options: &BridgeOptions) -> Result<PageReport, ScanLogError> {
    use scanlog_core::SystemClock;

    logger::init(options.log_level);

    let document = dom::document()?;
    if options.inject_styles {
        if let Err(err) = styles::ensure_styles(&document) {
            log::warn!(error:? = err; "Không chèn được CSS mặc định");
        }
    }

    let page = dom::DomPage::new(document);
    let renderer = dom::TreeBackend::select(options.builtin_renderer);
    let formatter = dom::TimeBackend::select(options.builtin_formatter, &options.processor);

    scanlog_passes::process_page(
        &page,
        &renderer,
        &formatter,
        &SystemClock,
        &options.processor,
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn run(_: &BridgeOptions) -> Result<PageReport, ScanLogError> {
    Err(wasm_only())
}

#[cfg(not(target_arch = "wasm32"))]
fn wasm_only() -> ScanLogError {
    ScanLogError::Host("scanlog-wasm chỉ hỗ trợ biên dịch target wasm32".to_string())
}

/// Offset hiển thị ở dạng `+HH:MM` cho `moment().utcOffset`.
///
/// moment hiểu số nguyên trong khoảng (-16, 16) là giờ, nên offset luôn được truyền dạng chuỗi.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
fn moment_utc_offset(config: &ProcessorConfig) -> Option<String> {
    let seconds = config.display_offset()?.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    Some(format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60))
}

fn to_js_error(err: ScanLogError) -> JsValue {
    JsValue::from_str(&format!("Scan log error: {err}"))
}
