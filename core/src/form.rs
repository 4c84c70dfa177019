//! Dynamic booking forms.
//!
//! A service's booking form is stored as data: an ordered list of field
//! definitions in the flat JSON shape
//!
//! ```json
//! { "key": "plate", "label": "ทะเบียนรถ", "type": "input", "helper": "เช่น กข 1234", "required": true }
//! ```
//!
//! On decode the `type` string is turned into [`FieldKind`], a closed sum type.
//! Rendering and validation match on it exhaustively, so adding a kind is a
//! compile error at every site that has to learn about it. Unknown type strings
//! never reach the engine: they fail decoding with
//! [`SchemaError::UnsupportedFieldType`].
//!
//! Besides the schema fields, every booking carries two mandatory out-of-band
//! inputs, the appointment `date` and `time`. The time must come from a fixed
//! menu of slots ([`TimeSlots`]) injected into the [`FormEngine`].

use crate::messages;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors raised while decoding a form schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The `type` string is not one of the supported field kinds.
    #[error("Unsupported field type: {field_type}")]
    UnsupportedFieldType {
        /// Key of the offending field.
        key: String,
        /// The unrecognized type string.
        field_type: String,
    },

    /// A select field was declared without options.
    #[error("Field {key} requires at least one option")]
    MissingOptions {
        /// Key of the offending field.
        key: String,
    },

    /// Two fields share the same key.
    #[error("Duplicate field key: {0}")]
    DuplicateKey(String),

    /// The stored JSON does not have the field-list shape at all.
    #[error("Malformed form schema: {0}")]
    Malformed(String),
}

/// The input affordance a field asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Exactly one of `options`.
    SelectOne {
        /// Offered choices, in display order.
        options: Vec<String>,
    },
    /// Any subset of `options`.
    SelectMultiple {
        /// Offered choices, in display order.
        options: Vec<String>,
    },
    /// Single-line free text.
    Input,
    /// Multi-line free text.
    Textarea,
    /// A yes/no flag.
    Checkbox,
}

impl FieldKind {
    /// Wire name of this kind (the JSON `type` value).
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::SelectOne { .. } => "select-one",
            Self::SelectMultiple { .. } => "select-multiple",
            Self::Input => "input",
            Self::Textarea => "textarea",
            Self::Checkbox => "checkbox",
        }
    }

    /// Options offered by a select kind; empty for the others.
    #[must_use]
    pub fn options(&self) -> &[String] {
        match self {
            Self::SelectOne { options } | Self::SelectMultiple { options } => options,
            Self::Input | Self::Textarea | Self::Checkbox => &[],
        }
    }

    fn from_parts(key: &str, field_type: &str, options: Option<Vec<String>>) -> Result<Self, SchemaError> {
        let require_options = |options: Option<Vec<String>>| match options {
            Some(options) if !options.is_empty() => Ok(options),
            _ => Err(SchemaError::MissingOptions {
                key: key.to_string(),
            }),
        };

        match field_type {
            "select-one" => Ok(Self::SelectOne {
                options: require_options(options)?,
            }),
            "select-multiple" => Ok(Self::SelectMultiple {
                options: require_options(options)?,
            }),
            "input" => Ok(Self::Input),
            "textarea" => Ok(Self::Textarea),
            "checkbox" => Ok(Self::Checkbox),
            other => Err(SchemaError::UnsupportedFieldType {
                key: key.to_string(),
                field_type: other.to_string(),
            }),
        }
    }
}

/// One field of a booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSchema", into = "RawFieldSchema")]
pub struct FieldSchema {
    /// Unique key within the form; responses are stored under it.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Input affordance.
    pub kind: FieldKind,
    /// Optional helper text.
    pub helper: Option<String>,
    /// Whether the field must be filled in.
    pub required: bool,
}

impl FieldSchema {
    /// Create a field definition.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            helper: None,
            required: false,
        }
    }

    /// Mark the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach helper text.
    #[must_use]
    pub fn with_helper(mut self, helper: impl Into<String>) -> Self {
        self.helper = Some(helper.into());
        self
    }
}

/// Storage shape of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldSchema {
    key: String,
    label: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    helper: Option<String>,
    #[serde(default)]
    required: Option<bool>,
}

impl TryFrom<RawFieldSchema> for FieldSchema {
    type Error = SchemaError;

    fn try_from(raw: RawFieldSchema) -> Result<Self, Self::Error> {
        let kind = FieldKind::from_parts(&raw.key, &raw.field_type, raw.options)?;
        Ok(Self {
            key: raw.key,
            label: raw.label,
            kind,
            helper: raw.helper,
            required: raw.required.unwrap_or(false),
        })
    }
}

impl From<FieldSchema> for RawFieldSchema {
    fn from(field: FieldSchema) -> Self {
        let field_type = field.kind.type_name().to_string();
        let options = match field.kind {
            FieldKind::SelectOne { options } | FieldKind::SelectMultiple { options } => Some(options),
            FieldKind::Input | FieldKind::Textarea | FieldKind::Checkbox => None,
        };
        Self {
            key: field.key,
            label: field.label,
            field_type,
            options,
            helper: field.helper,
            required: Some(field.required),
        }
    }
}

/// Ordered list of fields with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSchema>", into = "Vec<FieldSchema>")]
pub struct FormSchema {
    fields: Vec<FieldSchema>,
}

impl FormSchema {
    /// Build a schema, rejecting duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateKey`] when two fields share a key.
    pub fn new(fields: Vec<FieldSchema>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateKey(field.key.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Decode a stored JSON field list, keeping the typed error.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Malformed`] when the JSON is not a list of field
    /// objects, or the specific schema error for the first invalid field.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SchemaError> {
        let raw: Vec<RawFieldSchema> =
            serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        let fields = raw
            .into_iter()
            .map(FieldSchema::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    /// Encode back to the stored JSON shape.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let raw: Vec<RawFieldSchema> = self.fields.iter().cloned().map(RawFieldSchema::from).collect();
        serde_json::to_value(raw).unwrap_or(serde_json::Value::Array(Vec::new()))
    }

    /// Fields in display order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Look up a field by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Vec<FieldSchema>> for FormSchema {
    type Error = SchemaError;

    fn try_from(fields: Vec<FieldSchema>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<FormSchema> for Vec<FieldSchema> {
    fn from(schema: FormSchema) -> Self {
        schema.fields
    }
}

/// A user-entered value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox state.
    Flag(bool),
    /// Free text or a single selected option.
    Text(String),
    /// Selected options of a multi-select.
    Choices(Vec<String>),
}

impl FieldValue {
    /// Whether the value counts as "not filled in".
    ///
    /// An unchecked checkbox is blank, so a required checkbox must be ticked.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Flag(checked) => !checked,
            Self::Text(text) => text.is_empty(),
            Self::Choices(choices) => choices.is_empty(),
        }
    }
}

/// Current values of a form, keyed by field key.
///
/// Deserializing drops `null` entries, so a cleared field reads as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl<'de> Deserialize<'de> for FormValues {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Option<FieldValue>>::deserialize(deserializer)?;
        Ok(Self(raw.into_iter().filter_map(|(key, value)| Some((key, value?))).collect()))
    }
}

impl FormValues {
    /// Empty value map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a value.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.set(key, value);
        self
    }

    /// Value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Toggle membership of `option` in a multi-select value.
    ///
    /// Selecting an option twice removes it; the list never holds duplicates.
    pub fn toggle_choice(&mut self, key: &str, option: &str) {
        match self.0.get_mut(key) {
            Some(FieldValue::Choices(choices)) => {
                if let Some(pos) = choices.iter().position(|c| c == option) {
                    choices.remove(pos);
                } else {
                    choices.push(option.to_string());
                }
            }
            _ => {
                self.0
                    .insert(key.to_string(), FieldValue::Choices(vec![option.to_string()]));
            }
        }
    }

    /// Flatten into stored responses, in schema order.
    ///
    /// Booleans stay booleans, multi-select lists are joined with `", "`, and
    /// text passes through. Keys that are not part of `schema` are dropped.
    #[must_use]
    pub fn to_responses(&self, schema: &FormSchema) -> Vec<FormResponse> {
        schema
            .fields()
            .iter()
            .filter_map(|field| {
                let value = match self.0.get(&field.key)? {
                    FieldValue::Flag(flag) => ResponseValue::Flag(*flag),
                    FieldValue::Text(text) => ResponseValue::Text(text.clone()),
                    FieldValue::Choices(choices) => ResponseValue::Text(choices.join(", ")),
                };
                Some(FormResponse {
                    key: field.key.clone(),
                    value,
                })
            })
            .collect()
    }
}

/// A stored response value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    /// Checkbox state.
    Flag(bool),
    /// Everything else, flattened to text.
    Text(String),
}

/// One stored `{key, value}` response of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormResponse {
    /// Field key.
    pub key: String,
    /// Flattened value.
    pub value: ResponseValue,
}

/// Form values plus the out-of-band appointment date and time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSubmission {
    /// Values of schema fields.
    #[serde(default)]
    pub values: FormValues,
    /// Appointment date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Appointment time, `HH:MM`.
    #[serde(default)]
    pub time: String,
}

/// Combine a date and a time into the stored appointment (`{date}T{time}:00`).
#[must_use]
pub fn booking_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date}T{time}:00"), "%Y-%m-%dT%H:%M:%S").ok()
}

/// Invalid [`TimeSlots`] configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid time slot configuration: {0}")]
pub struct SlotConfigError(String);

/// Bookable appointment times: `first` to `last` inclusive, every `step_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlots {
    first: NaiveTime,
    last: NaiveTime,
    step_minutes: u32,
}

impl TimeSlots {
    /// Build a slot menu.
    ///
    /// # Errors
    ///
    /// Returns [`SlotConfigError`] when the step is zero or `last` precedes `first`.
    pub fn new(first: NaiveTime, last: NaiveTime, step_minutes: u32) -> Result<Self, SlotConfigError> {
        if step_minutes == 0 {
            return Err(SlotConfigError("step must be at least one minute".to_string()));
        }
        if last < first {
            return Err(SlotConfigError(format!("{last} is before {first}")));
        }
        Ok(Self {
            first,
            last,
            step_minutes,
        })
    }

    /// Earliest slot.
    #[must_use]
    pub const fn first(&self) -> NaiveTime {
        self.first
    }

    /// Latest slot.
    #[must_use]
    pub const fn last(&self) -> NaiveTime {
        self.last
    }

    /// Minutes between slots.
    #[must_use]
    pub const fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    /// All slots in ascending order.
    #[must_use]
    pub fn slots(&self) -> Vec<NaiveTime> {
        let first = self.first.num_seconds_from_midnight() / 60;
        let last = self.last.num_seconds_from_midnight() / 60;
        (first..=last)
            .step_by(self.step_minutes as usize)
            .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
            .collect()
    }

    /// Whether `time` is one of the slots.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.slots().contains(&time)
    }

    /// Slot labels formatted `HH:MM`.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.slots().iter().map(|t| t.format("%H:%M").to_string()).collect()
    }
}

impl Default for TimeSlots {
    fn default() -> Self {
        Self {
            first: NaiveTime::MIN + chrono::Duration::hours(6),
            last: NaiveTime::MIN + chrono::Duration::hours(18),
            step_minutes: 30,
        }
    }
}

/// How a field should be presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "kebab-case")]
pub enum Widget {
    /// Single-line text box.
    TextInput {
        /// Placeholder text.
        placeholder: String,
        /// Current text.
        value: String,
    },
    /// Multi-line text box.
    TextArea {
        /// Placeholder text.
        placeholder: String,
        /// Visible rows.
        rows: u8,
        /// Current text.
        value: String,
    },
    /// Drop-down with a leading placeholder option.
    Select {
        /// Placeholder option text.
        placeholder: String,
        /// Offered options.
        options: Vec<String>,
        /// Currently selected option.
        selected: Option<String>,
    },
    /// One checkbox per option.
    CheckboxGroup {
        /// Options with their checked state.
        options: Vec<ChoiceOption>,
    },
    /// A single captioned checkbox.
    Checkbox {
        /// Caption next to the box.
        caption: String,
        /// Current state.
        checked: bool,
    },
}

/// An option of a checkbox group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    /// Option text.
    pub label: String,
    /// Whether it is selected.
    pub checked: bool,
}

/// Presentation descriptor of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedField {
    /// Field key.
    pub key: String,
    /// Label (shown with a marker when required).
    pub label: String,
    /// Whether the field is required.
    pub required: bool,
    /// Helper line shown below the input (never for checkboxes, whose caption uses it).
    pub helper: Option<String>,
    /// Input affordance.
    #[serde(flatten)]
    pub widget: Widget,
}

/// Presentation descriptor of a whole booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedForm {
    /// Schema fields in order.
    pub fields: Vec<RenderedField>,
    /// Earliest selectable date.
    pub min_date: NaiveDate,
    /// Selectable times, `HH:MM`.
    pub time_slots: Vec<String>,
}

/// Outcome of validating a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: BTreeMap<String, String>,
}

impl ValidationReport {
    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors keyed by field key (or `date` / `time`).
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Error for a single key.
    #[must_use]
    pub fn error_for(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    /// Consume into the error map.
    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }

    fn record(&mut self, key: &str, message: impl Into<String>) {
        self.errors.insert(key.to_string(), message.into());
    }
}

/// A submission that passed validation, ready to become an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBooking {
    /// Flattened responses.
    pub responses: Vec<FormResponse>,
    /// Combined appointment date and time.
    pub appointment: NaiveDateTime,
}

/// Renders and validates booking forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEngine {
    slots: TimeSlots,
}

impl FormEngine {
    /// Create an engine with the given slot menu.
    #[must_use]
    pub const fn new(slots: TimeSlots) -> Self {
        Self { slots }
    }

    /// The slot menu this engine accepts.
    #[must_use]
    pub const fn slots(&self) -> &TimeSlots {
        &self.slots
    }

    /// Describe how each field should be presented given the current values.
    #[must_use]
    pub fn render(&self, schema: &FormSchema, values: &FormValues, today: NaiveDate) -> RenderedForm {
        let fields = schema
            .fields()
            .iter()
            .map(|field| Self::render_field(field, values.get(&field.key)))
            .collect();

        RenderedForm {
            fields,
            min_date: today,
            time_slots: self.slots.labels(),
        }
    }

    fn render_field(field: &FieldSchema, value: Option<&FieldValue>) -> RenderedField {
        let text = match value {
            Some(FieldValue::Text(text)) => text.clone(),
            _ => String::new(),
        };
        let placeholder = || {
            field
                .helper
                .clone()
                .unwrap_or_else(|| messages::input_placeholder(&field.label))
        };

        let widget = match &field.kind {
            FieldKind::Input => Widget::TextInput {
                placeholder: placeholder(),
                value: text,
            },
            FieldKind::Textarea => Widget::TextArea {
                placeholder: placeholder(),
                rows: 4,
                value: text,
            },
            FieldKind::SelectOne { options } => Widget::Select {
                placeholder: messages::select_placeholder(&field.label),
                options: options.clone(),
                selected: Some(text).filter(|t| options.contains(t)),
            },
            FieldKind::SelectMultiple { options } => {
                let selected: &[String] = match value {
                    Some(FieldValue::Choices(choices)) => choices,
                    _ => &[],
                };
                Widget::CheckboxGroup {
                    options: options
                        .iter()
                        .map(|option| ChoiceOption {
                            label: option.clone(),
                            checked: selected.contains(option),
                        })
                        .collect(),
                }
            }
            FieldKind::Checkbox => Widget::Checkbox {
                caption: field.helper.clone().unwrap_or_else(|| field.label.clone()),
                checked: matches!(value, Some(FieldValue::Flag(true))),
            },
        };

        let helper = match field.kind {
            FieldKind::Checkbox => None,
            _ => field.helper.clone(),
        };

        RenderedField {
            key: field.key.clone(),
            label: field.label.clone(),
            required: field.required,
            helper,
            widget,
        }
    }

    /// Validate a submission at submit time.
    ///
    /// Required fields must not be absent, an empty string, an empty list, or
    /// an unchecked checkbox. The date and time are always mandatory; the date
    /// may not precede `today` and the time must be one of the slots.
    #[must_use]
    pub fn validate(&self, schema: &FormSchema, submission: &BookingSubmission, today: NaiveDate) -> ValidationReport {
        let mut report = ValidationReport::default();

        for field in schema.fields() {
            let value = submission.values.get(&field.key);
            let blank = value.is_none_or(FieldValue::is_blank);

            if blank {
                if field.required {
                    report.record(&field.key, messages::fill_in(&field.label));
                }
                continue;
            }

            if let Some(value) = value {
                if !Self::value_fits(&field.kind, value) {
                    report.record(&field.key, messages::invalid_value(&field.label));
                }
            }
        }

        self.validate_schedule(submission, today, &mut report);
        report
    }

    /// Validate and, on success, flatten the submission for storage.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationReport`] when any rule fails.
    pub fn prepare(
        &self,
        schema: &FormSchema,
        submission: &BookingSubmission,
        today: NaiveDate,
    ) -> Result<PreparedBooking, ValidationReport> {
        let mut report = self.validate(schema, submission, today);
        if !report.is_valid() {
            return Err(report);
        }

        let Some(appointment) = booking_datetime(submission.date.trim(), submission.time.trim()) else {
            report.record(messages::DATE_KEY, messages::INVALID_DATE);
            return Err(report);
        };

        Ok(PreparedBooking {
            responses: submission.values.to_responses(schema),
            appointment,
        })
    }

    fn value_fits(kind: &FieldKind, value: &FieldValue) -> bool {
        match (kind, value) {
            (FieldKind::Input | FieldKind::Textarea, FieldValue::Text(_))
            | (FieldKind::Checkbox, FieldValue::Flag(_)) => true,
            (FieldKind::SelectOne { options }, FieldValue::Text(choice)) => options.contains(choice),
            (FieldKind::SelectMultiple { options }, FieldValue::Choices(choices)) => {
                choices.iter().all(|c| options.contains(c))
            }
            _ => false,
        }
    }

    fn validate_schedule(&self, submission: &BookingSubmission, today: NaiveDate, report: &mut ValidationReport) {
        let date = submission.date.trim();
        if date.is_empty() {
            report.record(messages::DATE_KEY, messages::SELECT_DATE);
        } else {
            match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(day) if day < today => report.record(messages::DATE_KEY, messages::PAST_DATE),
                Ok(_) => {}
                Err(_) => report.record(messages::DATE_KEY, messages::INVALID_DATE),
            }
        }

        let time = submission.time.trim();
        if time.is_empty() {
            report.record(messages::TIME_KEY, messages::SELECT_TIME);
        } else {
            let in_menu = NaiveTime::parse_from_str(time, "%H:%M").is_ok_and(|t| self.slots.contains(t));
            if !in_menu {
                report.record(messages::TIME_KEY, messages::INVALID_TIME);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn car_form() -> FormSchema {
        FormSchema::new(vec![
            FieldSchema::new("plate", "ทะเบียนรถ", FieldKind::Input).required(),
            FieldSchema::new(
                "color",
                "สีรถ",
                FieldKind::SelectOne {
                    options: vec!["ขาว".into(), "ดำ".into()],
                },
            ),
            FieldSchema::new(
                "items",
                "ของถวาย",
                FieldKind::SelectMultiple {
                    options: vec!["a".into(), "b".into(), "c".into()],
                },
            ),
            FieldSchema::new("consent", "ยินยอม", FieldKind::Checkbox),
            FieldSchema::new("note", "หมายเหตุ", FieldKind::Textarea).with_helper("ระบุเพิ่มเติม"),
        ])
        .unwrap()
    }

    fn submission(values: FormValues) -> BookingSubmission {
        BookingSubmission {
            values,
            date: "2025-01-02".into(),
            time: "09:30".into(),
        }
    }

    #[test]
    fn decodes_stored_json_shape() {
        let schema = FormSchema::from_json(json!([
            {"key": "plate", "label": "ทะเบียนรถ", "type": "input", "required": true},
            {"key": "color", "label": "สี", "type": "select-one", "options": ["ขาว"]},
            {"key": "ok", "label": "ตกลง", "type": "checkbox", "helper": "ยืนยัน"}
        ]))
        .unwrap();

        assert_eq!(schema.len(), 3);
        assert!(schema.field("plate").unwrap().required);
        assert!(!schema.field("color").unwrap().required);
        assert_eq!(schema.field("color").unwrap().kind.options(), ["ขาว".to_string()]);
    }

    #[test]
    fn unknown_type_is_a_hard_failure() {
        let err = FormSchema::from_json(json!([
            {"key": "x", "label": "X", "type": "slider"}
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnsupportedFieldType {
                key: "x".into(),
                field_type: "slider".into()
            }
        );
        assert_eq!(err.to_string(), "Unsupported field type: slider");
    }

    #[test]
    fn select_without_options_is_rejected() {
        let err = FormSchema::from_json(json!([
            {"key": "c", "label": "C", "type": "select-multiple", "options": []}
        ]))
        .unwrap_err();
        assert_eq!(err, SchemaError::MissingOptions { key: "c".into() });
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = FormSchema::new(vec![
            FieldSchema::new("a", "A", FieldKind::Input),
            FieldSchema::new("a", "A2", FieldKind::Textarea),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateKey("a".into()));
    }

    #[test]
    fn schema_survives_json_encoding() {
        let schema = car_form();
        let decoded = FormSchema::from_json(schema.to_json()).unwrap();
        assert_eq!(decoded, schema);

        let via_serde: FormSchema = serde_json::from_value(serde_json::to_value(&schema).unwrap()).unwrap();
        assert_eq!(via_serde, schema);
    }

    #[test]
    fn empty_required_input_fails_on_its_key() {
        let engine = FormEngine::default();
        let values = FormValues::new().with("plate", FieldValue::Text(String::new()));

        let report = engine.validate(&car_form(), &submission(values), today());

        assert!(!report.is_valid());
        assert_eq!(report.error_for("plate"), Some("กรุณากรอกทะเบียนรถ"));
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn blank_date_and_time_are_always_reported() {
        let engine = FormEngine::default();
        let values = FormValues::new().with("plate", FieldValue::Text("กข 1234".into()));
        let report = engine.validate(
            &car_form(),
            &BookingSubmission {
                values,
                date: String::new(),
                time: "  ".into(),
            },
            today(),
        );

        assert_eq!(report.error_for("date"), Some(messages::SELECT_DATE));
        assert_eq!(report.error_for("time"), Some(messages::SELECT_TIME));
        assert_eq!(report.errors().len(), 2);
    }

    #[test]
    fn past_dates_and_off_menu_times_are_rejected() {
        let engine = FormEngine::default();
        let values = FormValues::new().with("plate", FieldValue::Text("x".into()));
        let report = engine.validate(
            &car_form(),
            &BookingSubmission {
                values,
                date: "2024-12-31".into(),
                time: "18:30".into(),
            },
            today(),
        );

        assert_eq!(report.error_for("date"), Some(messages::PAST_DATE));
        assert_eq!(report.error_for("time"), Some(messages::INVALID_TIME));
    }

    #[test]
    fn option_outside_the_menu_is_invalid() {
        let engine = FormEngine::default();
        let values = FormValues::new()
            .with("plate", FieldValue::Text("x".into()))
            .with("color", FieldValue::Text("แดง".into()))
            .with("items", FieldValue::Choices(vec!["a".into(), "z".into()]));

        let report = engine.validate(&car_form(), &submission(values), today());

        assert_eq!(report.error_for("color"), Some("ข้อมูลสีรถไม่ถูกต้อง"));
        assert!(report.error_for("items").is_some());
        assert!(report.error_for("plate").is_none());
    }

    #[test]
    fn required_checkbox_must_be_ticked() {
        let schema = FormSchema::new(vec![FieldSchema::new("consent", "ยินยอม", FieldKind::Checkbox).required()]).unwrap();
        let engine = FormEngine::default();

        let unticked = FormValues::new().with("consent", FieldValue::Flag(false));
        assert!(engine.validate(&schema, &submission(unticked), today()).error_for("consent").is_some());

        let ticked = FormValues::new().with("consent", FieldValue::Flag(true));
        assert!(engine.validate(&schema, &submission(ticked), today()).is_valid());
    }

    #[test]
    fn toggle_choice_adds_and_removes_without_duplicates() {
        let mut values = FormValues::new();
        values.toggle_choice("items", "a");
        values.toggle_choice("items", "b");
        values.toggle_choice("items", "a");
        values.toggle_choice("items", "c");

        assert_eq!(
            values.get("items"),
            Some(&FieldValue::Choices(vec!["b".into(), "c".into()]))
        );
    }

    #[test]
    fn prepare_flattens_in_schema_order() {
        let engine = FormEngine::default();
        let values = FormValues::new()
            .with("stray", FieldValue::Text("ignored".into()))
            .with("consent", FieldValue::Flag(true))
            .with("items", FieldValue::Choices(vec!["a".into(), "b".into()]))
            .with("plate", FieldValue::Text("กข 1234".into()));

        let prepared = engine.prepare(&car_form(), &submission(values), today()).unwrap();

        let keys: Vec<_> = prepared.responses.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["plate", "items", "consent"]);
        assert_eq!(prepared.responses[1].value, ResponseValue::Text("a, b".into()));
        assert_eq!(prepared.responses[2].value, ResponseValue::Flag(true));
        assert_eq!(
            prepared.appointment,
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap().and_hms_opt(9, 30, 0).unwrap()
        );
    }

    #[test]
    fn default_slots_run_six_to_six_every_half_hour() {
        let slots = TimeSlots::default();
        let labels = slots.labels();

        assert_eq!(labels.len(), 25);
        assert_eq!(labels.first().map(String::as_str), Some("06:00"));
        assert_eq!(labels.last().map(String::as_str), Some("18:00"));
        assert!(!slots.contains(NaiveTime::from_hms_opt(18, 30, 0).unwrap()));
        assert!(!slots.contains(NaiveTime::from_hms_opt(9, 15, 0).unwrap()));
    }

    #[test]
    fn custom_slot_menu_is_honoured() {
        let slots = TimeSlots::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            20,
        )
        .unwrap();
        assert_eq!(slots.labels(), ["08:00", "08:20", "08:40", "09:00"]);

        assert!(TimeSlots::new(NaiveTime::MIN, NaiveTime::MIN, 0).is_err());
    }

    #[test]
    fn render_describes_each_kind() {
        let engine = FormEngine::default();
        let mut values = FormValues::new().with("color", FieldValue::Text("ดำ".into()));
        values.toggle_choice("items", "b");

        let form = engine.render(&car_form(), &values, today());

        assert_eq!(form.min_date, today());
        assert_eq!(form.time_slots.len(), 25);
        assert_eq!(
            form.fields[0].widget,
            Widget::TextInput {
                placeholder: "กรอกทะเบียนรถ".into(),
                value: String::new()
            }
        );
        assert_eq!(
            form.fields[1].widget,
            Widget::Select {
                placeholder: "เลือกสีรถ".into(),
                options: vec!["ขาว".into(), "ดำ".into()],
                selected: Some("ดำ".into()),
            }
        );
        let Widget::CheckboxGroup { options } = &form.fields[2].widget else {
            panic!("expected checkbox group");
        };
        assert!(options.iter().any(|o| o.label == "b" && o.checked));
        assert_eq!(
            form.fields[3].widget,
            Widget::Checkbox {
                caption: "ยินยอม".into(),
                checked: false
            }
        );
        assert_eq!(form.fields[4].helper.as_deref(), Some("ระบุเพิ่มเติม"));
    }

    #[test]
    fn checkbox_helper_becomes_caption_not_helper_line() {
        let schema = FormSchema::new(vec![
            FieldSchema::new("ok", "ตกลง", FieldKind::Checkbox).with_helper("ข้าพเจ้ายอมรับเงื่อนไข"),
        ])
        .unwrap();
        let form = FormEngine::default().render(&schema, &FormValues::new(), today());

        assert_eq!(form.fields[0].helper, None);
        assert!(matches!(
            &form.fields[0].widget,
            Widget::Checkbox { caption, .. } if caption == "ข้าพเจ้ายอมรับเงื่อนไข"
        ));
    }

    fn kind_for(index: u8) -> FieldKind {
        let options = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        match index {
            0 => FieldKind::Input,
            1 => FieldKind::Textarea,
            2 => FieldKind::SelectOne { options },
            3 => FieldKind::SelectMultiple { options },
            _ => FieldKind::Checkbox,
        }
    }

    fn value_for(kind: &FieldKind, filled: bool) -> FieldValue {
        match (kind, filled) {
            (FieldKind::Input | FieldKind::Textarea, true) => FieldValue::Text("x".into()),
            (FieldKind::SelectOne { .. }, true) => FieldValue::Text("a".into()),
            (FieldKind::SelectMultiple { .. }, true) => FieldValue::Choices(vec!["a".into(), "b".into()]),
            (FieldKind::Checkbox, true) => FieldValue::Flag(true),
            (FieldKind::SelectMultiple { .. }, false) => FieldValue::Choices(Vec::new()),
            (FieldKind::Checkbox, false) => FieldValue::Flag(false),
            (_, false) => FieldValue::Text(String::new()),
        }
    }

    proptest! {
        #[test]
        fn required_blank_fields_are_exactly_the_errors(
            specs in prop::collection::vec((0u8..5, any::<bool>(), 0u8..3), 0..10)
        ) {
            let fields: Vec<FieldSchema> = specs
                .iter()
                .enumerate()
                .map(|(i, (kind, required, _))| {
                    let field = FieldSchema::new(format!("f{i}"), format!("L{i}"), kind_for(*kind));
                    if *required { field.required() } else { field }
                })
                .collect();
            let schema = FormSchema::new(fields).unwrap();

            let mut values = FormValues::new();
            for (field, (_, _, state)) in schema.fields().iter().zip(&specs) {
                match state {
                    0 => {}
                    1 => values.set(field.key.clone(), value_for(&field.kind, false)),
                    _ => values.set(field.key.clone(), value_for(&field.kind, true)),
                }
            }

            let report = FormEngine::default().validate(&schema, &submission(values), today());

            for (field, (_, required, state)) in schema.fields().iter().zip(&specs) {
                let expect_error = *required && *state != 2;
                prop_assert_eq!(report.error_for(&field.key).is_some(), expect_error);
            }
            let expected_count = specs.iter().filter(|(_, r, s)| *r && *s != 2).count();
            prop_assert_eq!(report.errors().len(), expected_count);
        }

        #[test]
        fn multi_select_round_trips_through_responses(
            picks in prop::collection::btree_set("[a-z]{1,6}", 1..6)
        ) {
            let options: Vec<String> = picks.iter().cloned().collect();
            let schema = FormSchema::new(vec![FieldSchema::new(
                "pick",
                "เลือก",
                FieldKind::SelectMultiple { options: options.clone() },
            )])
            .unwrap();
            let values = FormValues::new().with("pick", FieldValue::Choices(options.clone()));

            let responses = values.to_responses(&schema);
            let ResponseValue::Text(joined) = &responses[0].value else {
                return Err(TestCaseError::fail("expected text response"));
            };
            let restored: std::collections::BTreeSet<String> =
                joined.split(", ").map(str::to_string).collect();
            prop_assert_eq!(restored, picks);
        }
    }

    #[test]
    fn null_values_read_as_unset() {
        let submission: BookingSubmission = serde_json::from_value(json!({
            "values": { "plate": "กข 1234", "note": null },
            "date": "2025-01-20",
            "time": "09:00"
        }))
        .unwrap();

        assert_eq!(submission.values.get("plate"), Some(&FieldValue::Text("กข 1234".into())));
        assert_eq!(submission.values.get("note"), None);
    }
}
