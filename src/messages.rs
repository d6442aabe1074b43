use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, RwLock};

pub const UNSUPPORTED: &str = "generic.unsupported";
pub const REQUIRED: &str = "common.required";
pub const REQUIRED_OPTION: &str = "common.required_option";
pub const INVALID: &str = "common.invalid";
pub const MIN_LENGTH: &str = "rule.min_length";
pub const MAX_LENGTH: &str = "rule.max_length";
pub const EXACT_LENGTH: &str = "rule.length";
pub const MIN_VALUE: &str = "rule.min_value";
pub const MAX_VALUE: &str = "rule.max_value";
pub const MIN_ITEMS: &str = "rule.min_items";
pub const MAX_ITEMS: &str = "rule.max_items";
pub const LESS_THAN: &str = "rule.less_than";
pub const MORE_THAN: &str = "rule.more_than";
pub const EMAIL: &str = "rule.email";
pub const URL: &str = "rule.url";
pub const INTEGER: &str = "rule.integer";
pub const POSITIVE: &str = "rule.positive";
pub const NEGATIVE: &str = "rule.negative";
pub const TYPE_MISMATCH: &str = "rule.type";
pub const MAX_FILES: &str = "upload.max_files";
pub const FILE_TYPE: &str = "upload.file_type";
pub const FILE_SIZE: &str = "upload.file_size";

const DEFAULT_LOCALE: &str = "en";

const EN: &[(&str, &str)] = &[
    (UNSUPPORTED, "This component is not supported by the engine"),
    (REQUIRED, "This field is required"),
    (REQUIRED_OPTION, "Please select an option"),
    (INVALID, "Invalid value"),
    (MIN_LENGTH, "Must be at least {min} characters"),
    (MAX_LENGTH, "Must be at most {max} characters"),
    (EXACT_LENGTH, "Must be exactly {length} characters"),
    (MIN_VALUE, "Must be greater than or equal to {min}"),
    (MAX_VALUE, "Must be less than or equal to {max}"),
    (MIN_ITEMS, "Please select at least {min} options"),
    (MAX_ITEMS, "Please select at most {max} options"),
    (LESS_THAN, "Must be less than {value}"),
    (MORE_THAN, "Must be greater than {value}"),
    (EMAIL, "Invalid email address"),
    (URL, "Invalid URL"),
    (INTEGER, "Must be a whole number"),
    (POSITIVE, "Must be a positive number"),
    (NEGATIVE, "Must be a negative number"),
    (TYPE_MISMATCH, "Expected a {type} value"),
    (MAX_FILES, "You can only upload up to {max} photos"),
    (FILE_TYPE, "Upload failed. Only {types} files are accepted."),
    (FILE_SIZE, "Upload failed. Max file size allowed is {max}KB."),
];

const ZH_CN: &[(&str, &str)] = &[
    (UNSUPPORTED, "引擎不支持此组件"),
    (REQUIRED, "此项为必填项"),
    (REQUIRED_OPTION, "请选择一个选项"),
    (INVALID, "值无效"),
    (MIN_LENGTH, "至少需要 {min} 个字符"),
    (MAX_LENGTH, "最多只能输入 {max} 个字符"),
    (EXACT_LENGTH, "必须为 {length} 个字符"),
    (MIN_VALUE, "必须大于或等于 {min}"),
    (MAX_VALUE, "必须小于或等于 {max}"),
    (MIN_ITEMS, "请至少选择 {min} 项"),
    (MAX_ITEMS, "最多只能选择 {max} 项"),
    (LESS_THAN, "必须小于 {value}"),
    (MORE_THAN, "必须大于 {value}"),
    (EMAIL, "邮箱地址无效"),
    (URL, "链接无效"),
    (INTEGER, "必须为整数"),
    (POSITIVE, "必须为正数"),
    (NEGATIVE, "必须为负数"),
    (TYPE_MISMATCH, "需要 {type} 类型的值"),
    (MAX_FILES, "最多只能上传 {max} 张照片"),
    (FILE_TYPE, "上传失败，仅支持 {types} 格式"),
    (FILE_SIZE, "上传失败，文件大小不能超过 {max}KB"),
];

const LOCALES: &[(&str, &[(&str, &str)])] = &[("en", EN), ("zh-CN", ZH_CN)];

static CATALOG: LazyLock<MessageCatalog> = LazyLock::new(MessageCatalog::load);

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Locale {
    #[default]
    System,
    Tag(String),
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("system") {
            return Self::System;
        }
        Self::Tag(value.trim().to_string())
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// Default message lookup shared by validation rules, placeholders and
/// upload alerts. Schema-provided `errorMessage`s always win over these.
#[derive(Clone)]
pub struct Messages {
    locale: Arc<RwLock<Locale>>,
}

impl Default for Messages {
    fn default() -> Self {
        Self::new()
    }
}

impl Messages {
    pub fn new() -> Self {
        Self {
            locale: Arc::new(RwLock::new(Locale::System)),
        }
    }

    pub fn with_locale(locale: impl Into<Locale>) -> Self {
        Self {
            locale: Arc::new(RwLock::new(locale.into())),
        }
    }

    pub fn locale(&self) -> Locale {
        match self.locale.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_locale(&self, locale: impl Into<Locale>) {
        let mut guard = match self.locale.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = locale.into();
    }

    pub fn resolved_locale(&self) -> &'static str {
        CATALOG.resolve_locale(self.requested_locale().as_deref())
    }

    pub fn t(&self, key: &str) -> String {
        self.lookup(key).unwrap_or(key).to_string()
    }

    pub fn t_with(&self, key: &str, params: &[(&str, &str)]) -> String {
        let raw = self.lookup(key).unwrap_or(key);
        if params.is_empty() {
            return raw.to_string();
        }
        format_template(raw, params)
    }

    fn requested_locale(&self) -> Option<String> {
        match self.locale() {
            Locale::System => system_locale(),
            Locale::Tag(tag) => Some(tag),
        }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        let resolved = self.resolved_locale();
        CATALOG
            .lookup(resolved, key)
            .or_else(|| CATALOG.lookup(DEFAULT_LOCALE, key))
    }
}

#[cfg(feature = "i18n")]
fn system_locale() -> Option<String> {
    sys_locale::get_locale()
}

#[cfg(not(feature = "i18n"))]
fn system_locale() -> Option<String> {
    None
}

struct MessageCatalog {
    locales: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    normalized_locale_lookup: HashMap<String, &'static str>,
    language_lookup: HashMap<String, &'static str>,
}

impl MessageCatalog {
    fn load() -> Self {
        let mut locales = HashMap::new();
        let mut normalized_locale_lookup = HashMap::new();
        let mut language_lookup = HashMap::new();
        let mut ambiguous_languages = HashSet::new();

        for (locale, entries) in LOCALES.iter().copied() {
            let normalized = normalize_locale_tag(locale);
            normalized_locale_lookup.insert(normalized.clone(), locale);

            let language = normalized.split('-').next().unwrap_or_default().to_string();
            if let Some(existing) = language_lookup.get(&language) {
                if *existing != locale {
                    ambiguous_languages.insert(language.clone());
                }
            } else {
                language_lookup.insert(language, locale);
            }

            locales.insert(locale, entries.iter().copied().collect::<HashMap<_, _>>());
        }

        for language in ambiguous_languages {
            language_lookup.remove(&language);
        }

        Self {
            locales,
            normalized_locale_lookup,
            language_lookup,
        }
    }

    fn resolve_locale(&self, requested: Option<&str>) -> &'static str {
        let Some(requested) = requested else {
            return DEFAULT_LOCALE;
        };

        let normalized = normalize_locale_tag(requested);
        if let Some(locale) = self.normalized_locale_lookup.get(&normalized) {
            return locale;
        }

        let language = normalized.split('-').next().unwrap_or_default();
        if let Some(locale) = self.language_lookup.get(language) {
            return locale;
        }

        DEFAULT_LOCALE
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&'static str> {
        self.locales
            .get(locale)
            .and_then(|entries| entries.get(key).copied())
    }
}

fn normalize_locale_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    let without_encoding = trimmed.split('.').next().unwrap_or(trimmed);
    let without_variant = without_encoding
        .split('@')
        .next()
        .unwrap_or(without_encoding);
    without_variant
        .replace('_', "-")
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn format_template(template: &str, params: &[(&str, &str)]) -> String {
    let values = params.iter().copied().collect::<HashMap<&str, &str>>();
    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;

    while cursor < template.len() {
        let tail = &template[cursor..];
        let Some(open_rel) = tail.find('{') else {
            output.push_str(tail);
            break;
        };

        let open = cursor + open_rel;
        output.push_str(&template[cursor..open]);

        let token_start = open + 1;
        let Some(close_rel) = template[token_start..].find('}') else {
            output.push_str(&template[open..]);
            break;
        };
        let close = token_start + close_rel;
        let token = &template[token_start..close];

        if let Some(value) = values.get(token) {
            output.push_str(value);
        } else {
            output.push_str(&template[open..=close]);
        }

        cursor = close + 1;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_falls_back_to_key() {
        let messages = Messages::with_locale("en");
        assert_eq!(messages.t("demo.only_key"), "demo.only_key");
    }

    #[test]
    fn locale_tag_is_normalized() {
        let messages = Messages::with_locale("zh_CN.UTF-8");
        assert_eq!(messages.resolved_locale(), "zh-CN");
        assert_eq!(messages.t(REQUIRED), "此项为必填项");
    }

    #[test]
    fn language_only_tag_resolves_region() {
        let messages = Messages::with_locale("zh");
        assert_eq!(messages.resolved_locale(), "zh-CN");
    }

    #[test]
    fn interpolates_known_placeholders_and_keeps_unknown() {
        let messages = Messages::with_locale("en-SG");
        assert_eq!(
            messages.t_with(MIN_LENGTH, &[("min", "2")]),
            "Must be at least 2 characters"
        );
        assert_eq!(format_template("{a} and {b}", &[("a", "x")]), "x and {b}");
    }
}
