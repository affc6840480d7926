//! In-place post-processing passes for the webhook scan log page.
//!
//! Each pass takes a snapshot of the elements carrying its class marker and
//! transforms them one at a time. A failing element is logged and counted; it
//! never stops the rest of the pass.

pub mod memory;
pub mod moment;
pub mod tree;

use log::{debug, warn};
use scanlog_core::{
    classify_status, Clock, DisplayElement, JsonTreeRenderer, PageQuery, PageReport, PassReport,
    ProcessorConfig, ScanLogError, TimeFormatter, JSON_OBJECT_CLASS, PROCESSED_ATTRIBUTE,
    REVIEW_STATUS_CLASS, TIME_OBJECT_CLASS,
};
use serde_json::Value;

pub use memory::{ElementSpec, ElementState, MemoryElement, MemoryPage};
pub use moment::{format_with_pattern, humanize, parse_timestamp, MomentFormatter, INVALID_DATE};
pub use tree::HtmlJsonTree;

/// Run the JSON, timestamp and status passes over one page.
pub fn process_page<P, R, F, C>(
    page: &P,
    renderer: &R,
    formatter: &F,
    clock: &C,
    config: &ProcessorConfig,
) -> Result<PageReport, ScanLogError>
where
    P: PageQuery,
    R: JsonTreeRenderer<P::Element>,
    F: TimeFormatter,
    C: Clock,
{
    config.validate()?;

    let report = PageReport {
        json: expand_json_elements(page, renderer, config),
        timestamps: normalize_timestamps(page, formatter, clock, config),
        statuses: colorize_statuses(page, config),
    };

    debug!(
        json_processed = report.json.processed,
        timestamps_processed = report.timestamps.processed,
        statuses_processed = report.statuses.processed,
        failed = report.failed();
        "Scan log page processed"
    );
    Ok(report)
}

/// Replace the text of every `json-object` element with a rendered tree.
///
/// Blank payloads are left untouched. A payload that fails to parse or render
/// keeps its original text.
pub fn expand_json_elements<P, R>(page: &P, renderer: &R, config: &ProcessorConfig) -> PassReport
where
    P: PageQuery,
    R: JsonTreeRenderer<P::Element>,
{
    let mut report = PassReport::default();

    for (index, element) in page.elements_by_class(JSON_OBJECT_CLASS).iter().enumerate() {
        report.visited += 1;
        if skip_processed(element, config) {
            report.skipped += 1;
            continue;
        }

        match expand_json_element(element, renderer) {
            Ok(true) => {
                mark_processed(element, config);
                report.processed += 1;
            }
            Ok(false) => report.skipped += 1,
            Err(err) => {
                warn!(index = index, error:% = err; "Could not expand JSON payload");
                report.failed += 1;
            }
        }
    }

    report
}

fn expand_json_element<E, R>(element: &E, renderer: &R) -> Result<bool, ScanLogError>
where
    E: DisplayElement,
    R: JsonTreeRenderer<E>,
{
    let raw = element.text();
    if raw.trim().is_empty() {
        return Ok(false);
    }

    let value: Value = serde_json::from_str(&raw)?;
    element.set_text("");
    if let Err(err) = renderer.render(&value, element) {
        element.set_text(&raw);
        return Err(err);
    }
    Ok(true)
}

/// Rewrite every `time-object` element as a relative phrase when it is recent
/// enough, otherwise with the absolute pattern.
pub fn normalize_timestamps<P, F, C>(
    page: &P,
    formatter: &F,
    clock: &C,
    config: &ProcessorConfig,
) -> PassReport
where
    P: PageQuery,
    F: TimeFormatter,
    C: Clock,
{
    let mut report = PassReport::default();

    for element in page.elements_by_class(TIME_OBJECT_CLASS) {
        report.visited += 1;
        if skip_processed(&element, config) {
            report.skipped += 1;
            continue;
        }

        let raw = element.text();
        let text = normalize_timestamp_text(&raw, formatter, clock, config);
        element.set_text(&text);
        mark_processed(&element, config);
        report.processed += 1;
    }

    report
}

/// Text shown for one raw timestamp. `now` is sampled per call.
///
/// Unreadable input takes the absolute branch and shows whatever the
/// formatter prints for an invalid date.
pub fn normalize_timestamp_text<F, C>(
    raw: &str,
    formatter: &F,
    clock: &C,
    config: &ProcessorConfig,
) -> String
where
    F: TimeFormatter,
    C: Clock,
{
    let now = clock.now();
    match formatter.parse(raw) {
        Some(instant)
            if now.signed_duration_since(instant).num_milliseconds()
                < config.relative_threshold_secs.saturating_mul(1000) =>
        {
            formatter.format_relative(raw, now)
        }
        parsed => {
            if parsed.is_none() {
                debug!(raw = raw; "Unreadable timestamp");
            }
            formatter.format_absolute(raw, &config.absolute_pattern)
        }
    }
}

/// Tag every `review-status` element with `allowed`, `rejected` or `warn`.
pub fn colorize_statuses<P: PageQuery>(page: &P, config: &ProcessorConfig) -> PassReport {
    let mut report = PassReport::default();

    for element in page.elements_by_class(REVIEW_STATUS_CLASS) {
        report.visited += 1;
        if skip_processed(&element, config) {
            report.skipped += 1;
            continue;
        }

        // classes set by the host stay; the tag is only ever appended
        element.add_class(classify_status(&element.text()).tag());
        mark_processed(&element, config);
        report.processed += 1;
    }

    report
}

fn skip_processed<E: DisplayElement>(element: &E, config: &ProcessorConfig) -> bool {
    config.is_idempotent() && element.attribute(PROCESSED_ATTRIBUTE).is_some()
}

fn mark_processed<E: DisplayElement>(element: &E, config: &ProcessorConfig) {
    if config.is_idempotent() {
        element.set_attribute(PROCESSED_ATTRIBUTE, "true");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{DateTime, TimeDelta, Utc};
    use scanlog_core::{FixedClock, RerunPolicy};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: RefCell<Vec<Value>>,
    }

    impl<E: DisplayElement> JsonTreeRenderer<E> for RecordingRenderer {
        fn render(&self, value: &Value, mount: &E) -> Result<(), ScanLogError> {
            self.calls.borrow_mut().push(value.clone());
            mount.set_markup(&format!("<tree>{value}</tree>"));
            Ok(())
        }
    }

    struct FailingRenderer;

    impl<E: DisplayElement> JsonTreeRenderer<E> for FailingRenderer {
        fn render(&self, _: &Value, _: &E) -> Result<(), ScanLogError> {
            Err(ScanLogError::Render("mount detached".to_string()))
        }
    }

    /// Formatter that reports which branch was taken.
    struct BranchFormatter;

    impl TimeFormatter for BranchFormatter {
        fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
            MomentFormatter::new().parse(raw)
        }

        fn format_relative(&self, raw: &str, _: DateTime<Utc>) -> String {
            format!("relative:{raw}")
        }

        fn format_absolute(&self, raw: &str, pattern: &str) -> String {
            format!("absolute:{raw}:{pattern}")
        }
    }

    fn now() -> DateTime<Utc> {
        "2023-03-05T14:07:09Z".parse().expect("now hợp lệ")
    }

    fn seconds_ago(seconds: i64) -> String {
        (now() - TimeDelta::seconds(seconds)).to_rfc3339()
    }

    #[test]
    fn blank_json_payloads_are_left_alone() {
        let page = MemoryPage::new();
        let empty = page.push(&[JSON_OBJECT_CLASS], "");
        let blank = page.push(&[JSON_OBJECT_CLASS], "  \n\t ");
        let renderer = RecordingRenderer::default();

        let report = expand_json_elements(&page, &renderer, &ProcessorConfig::default());

        assert!(renderer.calls.borrow().is_empty());
        assert_eq!(blank.text(), "  \n\t ");
        assert_eq!(empty.markup(), None);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn valid_json_is_rendered_once_with_parsed_value() {
        let page = MemoryPage::new();
        let element = page.push(&[JSON_OBJECT_CLASS], r#" {"a": 1, "b": [null, "x"]} "#);
        let renderer = RecordingRenderer::default();

        expand_json_elements(&page, &renderer, &ProcessorConfig::default());

        assert_eq!(*renderer.calls.borrow(), vec![json!({"a": 1, "b": [null, "x"]})]);
        assert_eq!(element.text(), "");
        assert!(element.markup().is_some());
    }

    #[test]
    fn malformed_json_does_not_stop_the_pass() {
        let page = MemoryPage::new();
        page.push(&[JSON_OBJECT_CLASS], "[1, 2");
        let broken = page.elements()[0].clone();
        page.push(&[JSON_OBJECT_CLASS], "true");
        page.push(&[JSON_OBJECT_CLASS], "null");
        let renderer = RecordingRenderer::default();

        let report = expand_json_elements(&page, &renderer, &ProcessorConfig::default());

        assert_eq!(*renderer.calls.borrow(), vec![json!(true), Value::Null]);
        assert_eq!(broken.text(), "[1, 2");
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 2);
    }

    #[test]
    fn render_failure_restores_original_text() {
        let page = MemoryPage::new();
        let element = page.push(&[JSON_OBJECT_CLASS], "{\"a\":1}");

        let report = expand_json_elements(&page, &FailingRenderer, &ProcessorConfig::default());

        assert_eq!(element.text(), "{\"a\":1}");
        assert_eq!(element.attribute(PROCESSED_ATTRIBUTE), None);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn elements_added_during_a_pass_are_not_visited() {
        struct GrowingRenderer<'a>(&'a MemoryPage);

        impl JsonTreeRenderer<MemoryElement> for GrowingRenderer<'_> {
            fn render(&self, _: &Value, mount: &MemoryElement) -> Result<(), ScanLogError> {
                self.0.push(&[JSON_OBJECT_CLASS], "{}");
                mount.set_markup("<tree/>");
                Ok(())
            }
        }

        let page = MemoryPage::new();
        page.push(&[JSON_OBJECT_CLASS], "{}");

        let report = expand_json_elements(&page, &GrowingRenderer(&page), &ProcessorConfig::default());

        assert_eq!(report.visited, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page.elements()[1].text(), "{}");
    }

    #[test]
    fn relative_threshold_is_strict() {
        let clock = FixedClock(now());
        let config = ProcessorConfig::default();

        for (age, expected_relative) in [(0, true), (5, true), (119, true), (120, false), (121, false)] {
            let raw = seconds_ago(age);
            let text = normalize_timestamp_text(&raw, &BranchFormatter, &clock, &config);
            assert_eq!(text.starts_with("relative:"), expected_relative, "age {age}s");
        }
    }

    #[test]
    fn sub_second_precision_is_kept_at_the_threshold() {
        let clock = FixedClock(now());
        let config = ProcessorConfig::default();

        let just_under = (now() - TimeDelta::milliseconds(119_999)).to_rfc3339();
        let just_over = (now() - TimeDelta::milliseconds(120_001)).to_rfc3339();

        assert!(normalize_timestamp_text(&just_under, &BranchFormatter, &clock, &config)
            .starts_with("relative:"));
        assert!(normalize_timestamp_text(&just_over, &BranchFormatter, &clock, &config)
            .starts_with("absolute:"));
    }

    #[test]
    fn future_timestamps_use_the_relative_branch() {
        let clock = FixedClock(now());
        let raw = (now() + TimeDelta::minutes(10)).to_rfc3339();
        let text = normalize_timestamp_text(&raw, &MomentFormatter::new(), &clock, &ProcessorConfig::default());
        assert_eq!(text, "in 10 minutes");
    }

    #[test]
    fn timestamps_are_formatted_with_the_builtin_formatter() {
        let page = MemoryPage::new();
        let recent = page.push(&[TIME_OBJECT_CLASS], &seconds_ago(5));
        let old = page.push(&[TIME_OBJECT_CLASS], "2023-03-05T14:07:09");
        let bogus = page.push(&[TIME_OBJECT_CLASS], "soon");
        let clock = FixedClock("2023-03-06T00:00:00Z".parse().expect("now hợp lệ"));

        let report = normalize_timestamps(
            &page,
            &MomentFormatter::new(),
            &clock,
            &ProcessorConfig::default(),
        );

        assert_eq!(recent.text(), "05/03/2023 02:07:04 PM");
        assert_eq!(old.text(), "05/03/2023 02:07:09 PM");
        assert_eq!(bogus.text(), INVALID_DATE);
        assert_eq!(report.processed, 3);

        let page = MemoryPage::new();
        let recent = page.push(&[TIME_OBJECT_CLASS], &seconds_ago(5));
        normalize_timestamps(
            &page,
            &MomentFormatter::new(),
            &FixedClock(now()),
            &ProcessorConfig::default(),
        );
        assert_eq!(recent.text(), "a few seconds ago");
    }

    #[test]
    fn custom_threshold_and_pattern_are_honoured() {
        let clock = FixedClock(now());
        let config = ProcessorConfig {
            relative_threshold_secs: 0,
            absolute_pattern: "YYYY-MM-DD HH:mm".to_string(),
            ..ProcessorConfig::default()
        };
        let text = normalize_timestamp_text(&seconds_ago(1), &MomentFormatter::new(), &clock, &config);
        assert_eq!(text, "2023-03-05 14:07");
    }

    #[test]
    fn status_tags_are_added_next_to_existing_classes() {
        let page = MemoryPage::new();
        let cases = [
            ("Allowed", "allowed"),
            ("Rejected", "rejected"),
            ("", "warn"),
            ("Pending", "warn"),
            ("ALLOWED", "warn"),
            ("Allowed with warnings", "warn"),
        ];
        let elements: Vec<_> = cases
            .iter()
            .map(|(text, _)| page.push(&[REVIEW_STATUS_CLASS, "badge"], text))
            .collect();

        let report = colorize_statuses(&page, &ProcessorConfig::default());

        for (element, (text, tag)) in elements.iter().zip(cases) {
            assert_eq!(
                element.classes(),
                vec![REVIEW_STATUS_CLASS, "badge", tag],
                "status {text:?}"
            );
        }
        assert_eq!(report.processed, cases.len());
    }

    #[test]
    fn host_status_tags_survive_the_default_policy() {
        let page = MemoryPage::new();
        let allowed = page.push(&[REVIEW_STATUS_CLASS, "rejected", "warn"], "Allowed");
        let rejected = page.push(&[REVIEW_STATUS_CLASS, "allowed"], "Rejected");

        let report = colorize_statuses(&page, &ProcessorConfig::default());

        assert_eq!(
            allowed.classes(),
            vec![REVIEW_STATUS_CLASS, "rejected", "warn", "allowed"]
        );
        assert_eq!(rejected.classes(), vec![REVIEW_STATUS_CLASS, "allowed", "rejected"]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn idempotent_policy_makes_a_second_run_a_no_op() {
        let page = MemoryPage::new();
        let json = page.push(&[JSON_OBJECT_CLASS], "{\"a\":1}");
        let time = page.push(&[TIME_OBJECT_CLASS], &seconds_ago(600));
        let status = page.push(&[REVIEW_STATUS_CLASS, "warn"], "Allowed");
        let renderer = RecordingRenderer::default();
        let clock = FixedClock(now());
        let config = ProcessorConfig::default();

        process_page(&page, &renderer, &MomentFormatter::new(), &clock, &config).expect("chạy lần 1");
        let first = page.snapshot();
        let report =
            process_page(&page, &renderer, &MomentFormatter::new(), &clock, &config).expect("chạy lần 2");

        assert_eq!(page.snapshot(), first);
        assert_eq!(renderer.calls.borrow().len(), 1);
        assert_eq!(report.json.skipped, 1);
        assert_eq!(report.timestamps.skipped, 1);
        assert_eq!(report.statuses.skipped, 1);
        assert_eq!(time.text(), "05/03/2023 01:57:09 PM");
        assert_eq!(status.classes(), vec![REVIEW_STATUS_CLASS, "warn", "allowed"]);
        assert_eq!(json.attribute(PROCESSED_ATTRIBUTE).as_deref(), Some("true"));
    }

    #[test]
    fn once_policy_leaves_no_marker_and_rederives_from_current_text() {
        let page = MemoryPage::new();
        let time = page.push(&[TIME_OBJECT_CLASS], &seconds_ago(600));
        let status = page.push(&[REVIEW_STATUS_CLASS, "warn"], "Rejected");
        let clock = FixedClock(now());
        let config = ProcessorConfig {
            rerun: RerunPolicy::Once,
            ..ProcessorConfig::default()
        };

        normalize_timestamps(&page, &MomentFormatter::new(), &clock, &config);
        colorize_statuses(&page, &config);
        assert_eq!(time.attribute(PROCESSED_ATTRIBUTE), None);
        assert_eq!(status.classes(), vec![REVIEW_STATUS_CLASS, "warn", "rejected"]);

        normalize_timestamps(&page, &MomentFormatter::new(), &clock, &config);
        assert_eq!(time.text(), INVALID_DATE);
    }

    #[test]
    fn end_to_end_page() {
        let page = MemoryPage::new();
        let json = page.push(&[JSON_OBJECT_CLASS], "{\"a\":1}");
        let time = page.push(&[TIME_OBJECT_CLASS], &seconds_ago(5));
        let status = page.push(&[REVIEW_STATUS_CLASS], "Rejected");
        let renderer = RecordingRenderer::default();

        let report = process_page(
            &page,
            &renderer,
            &MomentFormatter::new(),
            &FixedClock(now()),
            &ProcessorConfig::default(),
        )
        .expect("trang hợp lệ");

        assert_eq!(*renderer.calls.borrow(), vec![json!({"a": 1})]);
        assert_eq!(json.markup().as_deref(), Some("<tree>{\"a\":1}</tree>"));
        assert_eq!(time.text(), "a few seconds ago");
        assert!(status.has_class("rejected"));
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_the_page() {
        let page = MemoryPage::new();
        let status = page.push(&[REVIEW_STATUS_CLASS], "Allowed");
        let config = ProcessorConfig {
            relative_threshold_secs: -5,
            ..ProcessorConfig::default()
        };

        let result = process_page(
            &page,
            &HtmlJsonTree::default(),
            &MomentFormatter::new(),
            &FixedClock(now()),
            &config,
        );

        assert!(matches!(result, Err(ScanLogError::Config(_))));
        assert!(!status.has_class("allowed"));
    }
}
