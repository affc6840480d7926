//! Kiểu dữ liệu và capability lõi cho bộ hậu xử lý trang log webhook scan.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Class đánh dấu phần tử chứa payload JSON.
pub const JSON_OBJECT_CLASS: &str = "json-object";
/// Class đánh dấu phần tử chứa thời điểm.
pub const TIME_OBJECT_CLASS: &str = "time-object";
/// Class đánh dấu nhãn trạng thái review.
pub const REVIEW_STATUS_CLASS: &str = "review-status";

/// Attribute gắn lên phần tử đã xử lý khi chạy ở chế độ idempotent.
pub const PROCESSED_ATTRIBUTE: &str = "data-scanlog-processed";

/// Pattern hiển thị tuyệt đối mặc định (cú pháp moment).
pub const DEFAULT_ABSOLUTE_PATTERN: &str = "DD/MM/YYYY hh:mm:ss A";

/// Tất cả style-tag mà bước tô màu trạng thái có thể gắn.
pub const STATUS_TAGS: [&str; 3] = ["allowed", "rejected", "warn"];

/// Cách xử lý khi host gọi lại trên cùng một tập phần tử.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RerunPolicy {
    /// Đánh dấu phần tử đã xử lý và bỏ qua ở lần chạy sau; tag trạng thái được thay thế.
    #[default]
    Idempotent,
    /// Host cam kết chỉ gọi một lần cho mỗi lần render; lần gọi thứ hai sẽ cộng dồn tag.
    Once,
}

/// Cấu hình bộ hậu xử lý.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Dưới ngưỡng này (giây) thời điểm được hiển thị dạng tương đối.
    pub relative_threshold_secs: i64,
    /// Pattern moment cho hiển thị tuyệt đối.
    pub absolute_pattern: String,
    pub rerun: RerunPolicy,
    /// Offset (phút) dùng khi in thời điểm tuyệt đối; `None` giữ offset gốc.
    pub display_offset_minutes: Option<i32>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            relative_threshold_secs: 120,
            absolute_pattern: DEFAULT_ABSOLUTE_PATTERN.to_string(),
            rerun: RerunPolicy::default(),
            display_offset_minutes: None,
        }
    }
}

impl ProcessorConfig {
    /// Kiểm tra các giá trị cấu hình trước khi chạy.
    pub fn validate(&self) -> Result<(), ScanLogError> {
        if self.relative_threshold_secs < 0 {
            return Err(ScanLogError::Config(format!(
                "relative_threshold_secs phải >= 0, nhận {}",
                self.relative_threshold_secs
            )));
        }
        if self.absolute_pattern.trim().is_empty() {
            return Err(ScanLogError::Config(
                "absolute_pattern không được rỗng".to_string(),
            ));
        }
        if let Some(minutes) = self.display_offset_minutes {
            if self.display_offset().is_none() {
                return Err(ScanLogError::Config(format!(
                    "display_offset_minutes ngoài khoảng hợp lệ: {minutes}"
                )));
            }
        }
        Ok(())
    }

    /// Offset hiển thị đã chuyển sang `FixedOffset`.
    pub fn display_offset(&self) -> Option<FixedOffset> {
        self.display_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.checked_mul(60)?))
    }

    pub fn is_idempotent(&self) -> bool {
        self.rerun == RerunPolicy::Idempotent
    }
}

/// Phân loại nhãn trạng thái review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Allowed,
    Rejected,
    Warn,
}

impl StatusCategory {
    /// Style-tag tương ứng được gắn lên phần tử.
    pub fn tag(self) -> &'static str {
        match self {
            StatusCategory::Allowed => "allowed",
            StatusCategory::Rejected => "rejected",
            StatusCategory::Warn => "warn",
        }
    }
}

/// Phân loại theo đúng chuỗi ký tự; mọi giá trị lạ đều rơi về `Warn`.
pub fn classify_status(text: &str) -> StatusCategory {
    match text {
        "Allowed" => StatusCategory::Allowed,
        "Rejected" => StatusCategory::Rejected,
        _ => StatusCategory::Warn,
    }
}

/// Handle tới một node đã render, do host sở hữu.
///
/// Các method nhận `&self` giống handle DOM: thay đổi được áp dụng trực tiếp lên node.
pub trait DisplayElement {
    fn text(&self) -> String;
    fn set_text(&self, text: &str);
    /// Thay toàn bộ nội dung bằng markup đã dựng sẵn.
    fn set_markup(&self, markup: &str);
    fn add_class(&self, class: &str);
    fn has_class(&self, class: &str) -> bool;
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
}

/// Khả năng truy vấn trang do host cung cấp.
pub trait PageQuery {
    type Element: DisplayElement;

    /// Trả về snapshot các phần tử mang class tại thời điểm gọi.
    fn elements_by_class(&self, class: &str) -> Vec<Self::Element>;
}

/// Thư viện vẽ cây JSON (hộp đen).
pub trait JsonTreeRenderer<E: DisplayElement> {
    fn render(&self, value: &Value, mount: &E) -> Result<(), ScanLogError>;
}

/// Thư viện định dạng thời gian (hộp đen).
pub trait TimeFormatter {
    /// Đọc chuỗi thời điểm; `None` nếu không hợp lệ.
    fn parse(&self, raw: &str) -> Option<DateTime<Utc>>;
    /// Cụm từ tương đối, ví dụ "a few seconds ago".
    fn format_relative(&self, raw: &str, now: DateTime<Utc>) -> String;
    /// Chuỗi tuyệt đối theo pattern moment.
    fn format_absolute(&self, raw: &str, pattern: &str) -> String;
}

/// Nguồn thời gian hiện tại.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Đồng hồ hệ thống.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Đồng hồ cố định (dùng cho testing và bản xem trước offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Thống kê một lượt xử lý.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PassReport {
    pub visited: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Thống kê cả ba lượt trên một trang.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PageReport {
    pub json: PassReport,
    pub timestamps: PassReport,
    pub statuses: PassReport,
}

impl PageReport {
    /// Tổng số phần tử lỗi trên cả trang.
    pub fn failed(&self) -> usize {
        self.json.failed + self.timestamps.failed + self.statuses.failed
    }
}

/// Lỗi chung của bộ hậu xử lý.
#[derive(Debug, thiserror::Error)]
pub enum ScanLogError {
    #[error("Payload JSON không hợp lệ: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Không render được cây JSON: {0}")]
    Render(String),
    #[error("Cấu hình không hợp lệ: {0}")]
    Config(String),
    #[error("Lỗi host: {0}")]
    Host(String),
}
