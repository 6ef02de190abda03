//! Runtime helper functions emitted into generated files on demand.
//!
//! Codec builders call [`Context::helper`](crate::context::Context::helper)
//! to obtain a helper's name; that marks it (and whatever it calls) in the
//! file's [`HelperSet`]. After all declarations are written the set is
//! rendered once, so every helper appears at most once and only when used.

use std::collections::BTreeSet;

use crate::options::LongOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Helper {
    LongFromJson,
    LongFromString,
    LongFromBigint,
    Base64FromBytes,
    BytesFromBase64,
    TimestampFromDate,
    TimestampFromIso,
    DateFromTimestamp,
    IsoFromTimestamp,
    DateToJson,
    TimestampToJson,
    TimestampFromJson,
    DateFromJson,
    IsoFromJson,
}

impl Helper {
    pub fn name(self) -> &'static str {
        match self {
            Helper::LongFromJson      => "long_from_json",
            Helper::LongFromString    => "long_from_string",
            Helper::LongFromBigint    => "long_from_bigint",
            Helper::Base64FromBytes   => "base64_from_bytes",
            Helper::BytesFromBase64   => "bytes_from_base64",
            Helper::TimestampFromDate => "timestamp_from_date",
            Helper::TimestampFromIso  => "timestamp_from_iso",
            Helper::DateFromTimestamp => "date_from_timestamp",
            Helper::IsoFromTimestamp  => "iso_from_timestamp",
            Helper::DateToJson        => "date_to_json",
            Helper::TimestampToJson   => "timestamp_to_json",
            Helper::TimestampFromJson => "timestamp_from_json",
            Helper::DateFromJson      => "date_from_json",
            Helper::IsoFromJson       => "iso_from_json",
        }
    }

    /// True for helpers that name the `Timestamp` message type.
    pub fn needs_timestamp(self) -> bool {
        matches!(
            self,
            Helper::TimestampFromDate
                | Helper::DateToJson
                | Helper::TimestampFromIso
                | Helper::DateFromTimestamp
                | Helper::IsoFromTimestamp
                | Helper::TimestampToJson
                | Helper::TimestampFromJson
                | Helper::DateFromJson
                | Helper::IsoFromJson
        )
    }
}

const LONG_FROM_JSON: &str = r#"fn long_from_json<T: TryFrom<i128>>(value: &JsonValue) -> Result<T, CodecError> {
    let wide = json::integer(value)?;
    T::try_from(wide).map_err(|_| CodecError::Overflow(wide.to_string()))
}"#;

const LONG_FROM_STRING: &str = r#"fn long_from_string<T: ::std::str::FromStr>(value: &str) -> Result<T, CodecError> {
    value
        .trim()
        .parse()
        .map_err(|_| CodecError::InvalidLong(value.to_string()))
}"#;

const LONG_FROM_BIGINT: &str = r#"fn long_from_bigint<T>(value: &::protoweave::num_bigint::BigInt) -> Result<T, CodecError>
where
    for<'b> T: TryFrom<&'b ::protoweave::num_bigint::BigInt>,
{
    T::try_from(value).map_err(|_| CodecError::Overflow(value.to_string()))
}"#;

const BASE64_FROM_BYTES: &str = r#"fn base64_from_bytes(bytes: &[u8]) -> String {
    use ::protoweave::base64::Engine as _;
    ::protoweave::base64::engine::general_purpose::STANDARD.encode(bytes)
}"#;

const BYTES_FROM_BASE64: &str = r#"fn bytes_from_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    use ::protoweave::base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
    use ::protoweave::base64::Engine as _;
    let trimmed = text.trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))
}"#;

const TIMESTAMP_FROM_DATE: &str = r#"fn timestamp_from_date(date: &::protoweave::time::OffsetDateTime) -> __Timestamp__ {
    __Timestamp__ {
        seconds: __seconds_from_date__,
        nanos: date.nanosecond() as i32,
    }
}"#;

const TIMESTAMP_FROM_ISO: &str = r#"fn timestamp_from_iso(text: &str) -> Result<__Timestamp__, CodecError> {
    let date = ::protoweave::time::OffsetDateTime::parse(
        text,
        &::protoweave::time::format_description::well_known::Rfc3339,
    )
    .map_err(|e| CodecError::InvalidTimestamp(e.to_string()))?;
    Ok(timestamp_from_date(&date))
}"#;

const DATE_FROM_TIMESTAMP: &str = r#"fn date_from_timestamp(
    timestamp: &__Timestamp__,
) -> Result<::protoweave::time::OffsetDateTime, CodecError> {
    let seconds: i64 = __seconds_to_i64__;
    let nanos = i128::from(seconds) * 1_000_000_000 + i128::from(timestamp.nanos);
    ::protoweave::time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|e| CodecError::InvalidTimestamp(e.to_string()))
}"#;

const ISO_FROM_TIMESTAMP: &str = r#"fn iso_from_timestamp(timestamp: &__Timestamp__) -> Result<String, CodecError> {
    date_from_timestamp(timestamp)?
        .format(&::protoweave::time::format_description::well_known::Rfc3339)
        .map_err(|e| CodecError::InvalidTimestamp(e.to_string()))
}"#;

/// RFC 3339 covers years 0000 through 9999; other dates are written in the
/// `{seconds, nanos}` object form, which `date_from_json` also reads.
const DATE_TO_JSON: &str = r#"fn date_to_json(date: &::protoweave::time::OffsetDateTime) -> JsonValue {
    match date.format(&::protoweave::time::format_description::well_known::Rfc3339) {
        Ok(text) => JsonValue::from(text),
        Err(_) => timestamp_from_date(date).to_json(),
    }
}"#;

const TIMESTAMP_TO_JSON: &str = r#"fn timestamp_to_json(timestamp: &__Timestamp__) -> JsonValue {
    match iso_from_timestamp(timestamp) {
        Ok(text) => JsonValue::from(text),
        Err(_) => timestamp.to_json(),
    }
}"#;

const TIMESTAMP_FROM_JSON: &str = r#"fn timestamp_from_json(value: &JsonValue) -> Result<__Timestamp__, CodecError> {
    match value {
        JsonValue::String(text) => timestamp_from_iso(text),
        other => __Timestamp__::from_json(other),
    }
}"#;

const DATE_FROM_JSON: &str = r#"fn date_from_json(value: &JsonValue) -> Result<::protoweave::time::OffsetDateTime, CodecError> {
    match value {
        JsonValue::String(text) => ::protoweave::time::OffsetDateTime::parse(
            text,
            &::protoweave::time::format_description::well_known::Rfc3339,
        )
        .map_err(|e| CodecError::InvalidTimestamp(e.to_string())),
        other => date_from_timestamp(&__Timestamp__::from_json(other)?),
    }
}"#;

const ISO_FROM_JSON: &str = r#"fn iso_from_json(value: &JsonValue) -> Result<String, CodecError> {
    match value {
        JsonValue::String(text) => Ok(text.clone()),
        other => iso_from_timestamp(&__Timestamp__::from_json(other)?),
    }
}"#;

/// Helper definitions for one run. The fragments depend on the 64-bit
/// integer representation, which is fixed per run.
#[derive(Debug, Clone)]
pub struct HelperRegistry {
    long: LongOption,
}

impl HelperRegistry {
    pub fn new(long: LongOption) -> Self {
        Self { long }
    }

    /// Helpers called from the body of `helper`.
    pub fn requires(&self, helper: Helper) -> Vec<Helper> {
        match helper {
            Helper::DateFromTimestamp => match self.long {
                LongOption::Number => vec![],
                LongOption::String => vec![Helper::LongFromString],
                LongOption::BigInt => vec![Helper::LongFromBigint],
            },
            Helper::TimestampFromIso | Helper::DateToJson => vec![Helper::TimestampFromDate],
            Helper::IsoFromTimestamp => vec![Helper::DateFromTimestamp],
            Helper::TimestampToJson => vec![Helper::IsoFromTimestamp],
            Helper::TimestampFromJson => vec![Helper::TimestampFromIso],
            Helper::DateFromJson => vec![Helper::DateFromTimestamp],
            Helper::IsoFromJson => vec![Helper::IsoFromTimestamp],
            _ => vec![],
        }
    }

    /// Renders one helper; `timestamp` is the path of the `Timestamp` type
    /// as seen from the file being assembled.
    pub fn render(&self, helper: Helper, timestamp: &str) -> String {
        let template = match helper {
            Helper::LongFromJson      => LONG_FROM_JSON,
            Helper::LongFromString    => LONG_FROM_STRING,
            Helper::LongFromBigint    => LONG_FROM_BIGINT,
            Helper::Base64FromBytes   => BASE64_FROM_BYTES,
            Helper::BytesFromBase64   => BYTES_FROM_BASE64,
            Helper::TimestampFromDate => TIMESTAMP_FROM_DATE,
            Helper::TimestampFromIso  => TIMESTAMP_FROM_ISO,
            Helper::DateFromTimestamp => DATE_FROM_TIMESTAMP,
            Helper::IsoFromTimestamp  => ISO_FROM_TIMESTAMP,
            Helper::DateToJson        => DATE_TO_JSON,
            Helper::TimestampToJson   => TIMESTAMP_TO_JSON,
            Helper::TimestampFromJson => TIMESTAMP_FROM_JSON,
            Helper::DateFromJson      => DATE_FROM_JSON,
            Helper::IsoFromJson       => ISO_FROM_JSON,
        };

        let (from_date, to_i64) = match self.long {
            LongOption::Number => ("date.unix_timestamp()", "timestamp.seconds"),
            LongOption::String => ("date.unix_timestamp().to_string()", "long_from_string(&timestamp.seconds)?"),
            LongOption::BigInt => (
                "::protoweave::num_bigint::BigInt::from(date.unix_timestamp())",
                "long_from_bigint(&timestamp.seconds)?",
            ),
        };

        template
            .replace("__Timestamp__", timestamp)
            .replace("__seconds_from_date__", from_date)
            .replace("__seconds_to_i64__", to_i64)
    }
}

/// Helpers referenced while generating one file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HelperSet {
    used: BTreeSet<Helper>,
}

impl HelperSet {
    /// Marks `helper` and its dependencies as used and returns its name.
    pub fn mark(&mut self, registry: &HelperRegistry, helper: Helper) -> &'static str {
        if self.used.insert(helper) {
            for required in registry.requires(helper) {
                self.mark(registry, required);
            }
        }
        helper.name()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn contains(&self, helper: Helper) -> bool {
        self.used.contains(&helper)
    }

    pub fn needs_timestamp(&self) -> bool {
        self.used.iter().any(|helper| helper.needs_timestamp())
    }

    pub fn iter(&self) -> impl Iterator<Item = Helper> + '_ {
        self.used.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_pulls_in_dependencies() {
        let registry = HelperRegistry::new(LongOption::String);
        let mut used = HelperSet::default();
        assert_eq!(used.mark(&registry, Helper::TimestampToJson), "timestamp_to_json");
        assert!(used.contains(Helper::IsoFromTimestamp));
        assert!(used.contains(Helper::DateFromTimestamp));
        assert!(used.contains(Helper::LongFromString));
        assert!(!used.contains(Helper::LongFromBigint));
        assert!(used.needs_timestamp());

        let registry = HelperRegistry::new(LongOption::Number);
        let mut used = HelperSet::default();
        used.mark(&registry, Helper::DateFromTimestamp);
        assert_eq!(used.iter().count(), 1);
    }

    #[test]
    fn unformattable_dates_fall_back_to_the_timestamp_form() {
        let registry = HelperRegistry::new(LongOption::Number);
        let mut used = HelperSet::default();
        used.mark(&registry, Helper::DateToJson);
        assert!(used.contains(Helper::TimestampFromDate));
        assert!(used.needs_timestamp());

        let text = registry.render(Helper::DateToJson, "Timestamp");
        assert!(text.contains("Err(_) => timestamp_from_date(date).to_json(),"));
        assert!(!text.contains("JsonValue::Null"));
    }

    #[test]
    fn marking_is_idempotent() {
        let registry = HelperRegistry::new(LongOption::Number);
        let mut used = HelperSet::default();
        for _ in 0..3 {
            used.mark(&registry, Helper::BytesFromBase64);
        }
        assert_eq!(used.iter().collect::<Vec<_>>(), vec![Helper::BytesFromBase64]);
        assert!(!used.needs_timestamp());
    }

    #[test]
    fn render_substitutes_timestamp_and_seconds() {
        let registry = HelperRegistry::new(LongOption::BigInt);
        let text = registry.render(Helper::TimestampFromDate, "crate::wkt::Timestamp");
        assert!(text.contains("-> crate::wkt::Timestamp {"));
        assert!(text.contains("seconds: ::protoweave::num_bigint::BigInt::from(date.unix_timestamp())"));

        let registry = HelperRegistry::new(LongOption::Number);
        let text = registry.render(Helper::DateFromTimestamp, "Timestamp");
        assert!(text.contains("let seconds: i64 = timestamp.seconds;"));
        assert!(!text.contains("__"));
    }

    #[test]
    fn string_seconds_are_formatted_from_the_date() {
        let registry = HelperRegistry::new(LongOption::String);
        let text = registry.render(Helper::TimestampFromDate, "Timestamp");
        assert!(text.contains("seconds: date.unix_timestamp().to_string(),"));

        let text = registry.render(Helper::DateFromTimestamp, "Timestamp");
        assert!(text.contains("let seconds: i64 = long_from_string(&timestamp.seconds)?;"));

        let registry = HelperRegistry::new(LongOption::Number);
        let text = registry.render(Helper::TimestampFromDate, "Timestamp");
        assert!(text.contains("seconds: date.unix_timestamp(),"));
    }
}
