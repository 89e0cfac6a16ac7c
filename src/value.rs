//! The data values a template is filled from.
//!
//! Input data is pre-shaped into the [`Value`] union, either directly or
//! from its JSON text form via [`Value::parse_data`]. The engine navigates
//! this union only; there is no reflective access to arbitrary types.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// A tree-shaped data value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDateTime),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Parse the JSON text form of a data tree.
    ///
    /// Integral numbers become `Int`, all other numbers `Float`.
    pub fn parse_data(json: &str) -> Result<Value, serde_json::Error> {
        Ok(Self::from_json(serde_json::from_str(json)?))
    }

    /// Convert a parsed JSON value into the engine's value union.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// The truthiness used by bare-variable conditions.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => {
                let trimmed = s.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed == "0")
            }
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// The culture-independent string form used by `=` and `!=`.
    pub fn comparison_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_owned(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::List(items) => {
                let parts: Vec<_> = items.iter().map(|v| v.comparison_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<_> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.comparison_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Render the value for substitution into a document, honouring the
    /// culture and an optional format specifier.
    ///
    /// Boolean format specifiers are resolved by the caller against the
    /// formatter registry; here a boolean always renders as its default
    /// `"True"`/`"False"` form.
    pub fn display(&self, culture: &Culture, format: Option<&str>) -> String {
        match self {
            Value::Int(i) => culture.format_int(*i, format),
            Value::Float(f) => culture.format_float(*f, format),
            Value::Date(d) => culture.format_date(d, format),
            _ => self.comparison_string(),
        }
    }
}

/// Number and date formatting conventions, keyed by a culture tag.
///
/// The formatter travels with the options rather than being a
/// process-global setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    tag: String,
    decimal_separator: char,
    date_pattern: &'static str,
}

impl Culture {
    /// The invariant culture: `.` as decimal separator, ISO-style dates.
    pub fn invariant() -> Culture {
        Culture {
            tag: String::new(),
            decimal_separator: '.',
            date_pattern: "%Y-%m-%d %H:%M:%S",
        }
    }

    /// Look up a culture by identifier, e.g. `"de-DE"`. Unknown tags fall
    /// back to the invariant conventions.
    pub fn new(tag: &str) -> Culture {
        let (decimal_separator, date_pattern) = match tag {
            "en-US" => ('.', "%m/%d/%Y %H:%M:%S"),
            "en-GB" | "en-AU" | "en-NZ" => ('.', "%d/%m/%Y %H:%M:%S"),
            t if t.starts_with("de") => (',', "%d.%m.%Y %H:%M:%S"),
            t if t.starts_with("fr") => (',', "%d/%m/%Y %H:%M:%S"),
            t if t.starts_with("es") || t.starts_with("it") => (',', "%d/%m/%Y %H:%M:%S"),
            t if t.starts_with("nl") => (',', "%d-%m-%Y %H:%M:%S"),
            _ => ('.', "%Y-%m-%d %H:%M:%S"),
        };
        Culture {
            tag: tag.to_owned(),
            decimal_separator,
            date_pattern,
        }
    }

    /// The identifier this culture was created from.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn fixed_decimals(format: Option<&str>) -> Option<usize> {
        let format = format?;
        let mut chars = format.chars();
        if !matches!(chars.next(), Some('F' | 'f' | 'N' | 'n')) {
            return None;
        }
        let rest: String = chars.collect();
        if rest.is_empty() {
            Some(2)
        } else {
            rest.parse().ok()
        }
    }

    pub fn format_int(&self, value: i64, format: Option<&str>) -> String {
        match Self::fixed_decimals(format) {
            Some(decimals) => self.localize(format_args!("{:.*}", decimals, value as f64)),
            None => value.to_string(),
        }
    }

    pub fn format_float(&self, value: f64, format: Option<&str>) -> String {
        match Self::fixed_decimals(format) {
            Some(decimals) => self.localize(format_args!("{:.*}", decimals, value)),
            None => self.localize(format_args!("{}", value)),
        }
    }

    fn localize(&self, args: std::fmt::Arguments) -> String {
        let rendered = args.to_string();
        if self.decimal_separator == '.' {
            rendered
        } else {
            rendered.replace('.', &self.decimal_separator.to_string())
        }
    }

    pub fn format_date(&self, value: &NaiveDateTime, format: Option<&str>) -> String {
        let pattern = match format.and_then(translate_date_pattern) {
            Some(p) => p,
            None => self.date_pattern.to_owned(),
        };
        value.format(&pattern).to_string()
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

/// Translate a .NET-style date pattern (`dd.MM.yyyy HH:mm:ss`) into a
/// chrono format string. Returns `None` when the specifier does not look
/// like a date pattern at all, so it can be ignored.
fn translate_date_pattern(pattern: &str) -> Option<String> {
    if pattern.is_empty()
        || !pattern
            .chars()
            .all(|c| matches!(c, 'y' | 'M' | 'd' | 'H' | 'h' | 'm' | 's' | 't') || !c.is_alphabetic())
    {
        return None;
    }
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        match c {
            'y' => out.push_str(if run >= 4 { "%Y" } else { "%y" }),
            'M' => out.push_str("%m"),
            'd' => out.push_str("%d"),
            'H' => out.push_str("%H"),
            'h' => out.push_str("%I"),
            'm' => out.push_str("%M"),
            's' => out.push_str("%S"),
            't' => out.push_str("%p"),
            '%' => out.push_str("%%"),
            _ => {
                for _ in 0..run {
                    out.push(c);
                }
            }
        }
        i += run;
    }
    Some(out)
}
