use chrono::{DateTime, Utc};
use log::warn;
use scanlog_core::{
    DisplayElement, JsonTreeRenderer, PageQuery, ProcessorConfig, ScanLogError, TimeFormatter,
};
use scanlog_passes::{HtmlJsonTree, MomentFormatter};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = jsonTree, js_name = create)]
    fn json_tree_create(data: &JsValue, mount: &HtmlElement) -> Result<JsValue, JsValue>;

    type Moment;

    #[wasm_bindgen(catch, js_name = moment)]
    fn moment(input: &str) -> Result<Moment, JsValue>;

    #[wasm_bindgen(method, js_name = fromNow)]
    fn from_now(this: &Moment) -> String;

    #[wasm_bindgen(method)]
    fn format(this: &Moment, pattern: &str) -> String;

    #[wasm_bindgen(method, js_name = utcOffset)]
    fn utc_offset(this: &Moment, offset: &str) -> Moment;

    #[wasm_bindgen(js_namespace = Date, js_name = parse)]
    fn date_parse(text: &str) -> f64;
}

pub fn document() -> Result<Document, ScanLogError> {
    web_sys::window()
        .ok_or_else(|| ScanLogError::Host("Không có window".to_string()))?
        .document()
        .ok_or_else(|| ScanLogError::Host("Không truy cập được document".to_string()))
}

/// Trang hiện tại, truy vấn theo class.
pub struct DomPage {
    document: Document,
}

impl DomPage {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl PageQuery for DomPage {
    type Element = DomElement;

    fn elements_by_class(&self, class: &str) -> Vec<DomElement> {
        // HTMLCollection là live, chép ra Vec để lượt xử lý chạy trên snapshot
        let collection = self.document.get_elements_by_class_name(class);
        (0..collection.length())
            .filter_map(|index| collection.item(index))
            .filter_map(|element| element.dyn_into::<HtmlElement>().ok())
            .map(DomElement)
            .collect()
    }
}

pub struct DomElement(HtmlElement);

impl DisplayElement for DomElement {
    fn text(&self) -> String {
        self.0.inner_text()
    }

    fn set_text(&self, text: &str) {
        self.0.set_inner_text(text);
    }

    fn set_markup(&self, markup: &str) {
        self.0.set_inner_html(markup);
    }

    fn add_class(&self, class: &str) {
        if let Err(err) = self.0.class_list().add_1(class) {
            warn!(class = class, error:? = err; "Không thêm được class");
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.class_list().contains(class)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let Err(err) = self.0.set_attribute(name, value) {
            warn!(attribute = name, error:? = err; "Không ghi được attribute");
        }
    }
}

/// Renderer cây JSON: thư viện `jsonTree` của trang hoặc bản HTML dựng sẵn.
pub enum TreeBackend {
    JsonTreeJs,
    Builtin(HtmlJsonTree),
}

impl TreeBackend {
    pub fn select(builtin: bool) -> Self {
        if builtin {
            TreeBackend::Builtin(HtmlJsonTree::default())
        } else {
            TreeBackend::JsonTreeJs
        }
    }
}

impl JsonTreeRenderer<DomElement> for TreeBackend {
    fn render(&self, value: &Value, mount: &DomElement) -> Result<(), ScanLogError> {
        match self {
            TreeBackend::Builtin(tree) => tree.render(value, mount),
            TreeBackend::JsonTreeJs => {
                let data = value
                    .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                    .map_err(|err| ScanLogError::Render(err.to_string()))?;
                json_tree_create(&data, &mount.0)
                    .map(|_| ())
                    .map_err(|err| ScanLogError::Render(format!("jsonTree.create: {err:?}")))
            }
        }
    }
}

/// Formatter thời gian: `moment` của trang hoặc formatter chrono dựng sẵn.
///
/// Khi `moment` không có trên trang, từng lời gọi rơi về formatter dựng sẵn.
pub enum TimeBackend {
    MomentJs {
        /// Offset `+HH:MM` áp cho `moment` trước khi `format`.
        /// `None` giữ múi giờ của trình duyệt.
        utc_offset: Option<String>,
        fallback: MomentFormatter,
    },
    Builtin(MomentFormatter),
}

impl TimeBackend {
    pub fn select(builtin: bool, config: &ProcessorConfig) -> Self {
        let formatter = MomentFormatter::from_config(config);
        if builtin {
            TimeBackend::Builtin(formatter)
        } else {
            TimeBackend::MomentJs {
                utc_offset: crate::moment_utc_offset(config),
                fallback: formatter,
            }
        }
    }
}

impl TimeFormatter for TimeBackend {
    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            TimeBackend::Builtin(formatter) => formatter.parse(raw),
            TimeBackend::MomentJs { .. } => {
                let millis = date_parse(raw);
                if millis.is_finite() {
                    DateTime::from_timestamp_millis(millis as i64)
                } else {
                    None
                }
            }
        }
    }

    fn format_relative(&self, raw: &str, now: DateTime<Utc>) -> String {
        match self {
            TimeBackend::Builtin(formatter) => formatter.format_relative(raw, now),
            TimeBackend::MomentJs { fallback, .. } => match moment(raw) {
                Ok(instant) => instant.from_now(),
                Err(err) => {
                    warn!(error:? = err; "moment không khả dụng, dùng formatter dựng sẵn");
                    fallback.format_relative(raw, now)
                }
            },
        }
    }

    fn format_absolute(&self, raw: &str, pattern: &str) -> String {
        match self {
            TimeBackend::Builtin(formatter) => formatter.format_absolute(raw, pattern),
            TimeBackend::MomentJs {
                utc_offset,
                fallback,
            } => match moment(raw) {
                Ok(instant) => match utc_offset {
                    Some(offset) => instant.utc_offset(offset).format(pattern),
                    None => instant.format(pattern),
                },
                Err(err) => {
                    warn!(error:? = err; "moment không khả dụng, dùng formatter dựng sẵn");
                    fallback.format_absolute(raw, pattern)
                }
            },
        }
    }
}
