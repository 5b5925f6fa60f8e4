use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum LimitValue {
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Nested(LimitReport),
    List(Vec<LimitValue>),
    Null,
}

impl LimitValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Unsigned(_) | Self::Float(_))
    }
}

impl From<Value> for LimitValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Boolean(flag),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Self::Integer(integer)
                } else if let Some(unsigned) = number.as_u64() {
                    Self::Unsigned(unsigned)
                } else {
                    Self::Float(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Nested(LimitReport::from_json_object(map)),
        }
    }
}

/// Field name to value, in the order the control plane returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitReport {
    entries: Vec<(String, LimitValue)>,
}

impl LimitReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are normalised to snake_case at every nesting level.
    pub fn from_json_object(map: Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(key, value)| (to_snake_case(&key), LimitValue::from(value)))
            .collect()
    }

    /// Replaces an existing entry in place, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: LimitValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LimitValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<LimitValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LimitValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, LimitValue)> for LimitReport {
    fn from_iter<I: IntoIterator<Item = (String, LimitValue)>>(iter: I) -> Self {
        let mut report = Self::new();
        for (key, value) in iter {
            report.insert(key, value);
        }
        report
    }
}

impl IntoIterator for LimitReport {
    type Item = (String, LimitValue);
    type IntoIter = std::vec::IntoIter<(String, LimitValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// `maxTotalRAMSize` -> `max_total_ram_size`. Already snake_case keys pass
/// through unchanged.
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            let prev = index.checked_sub(1).map(|prev| chars[prev]);
            let next = chars.get(index + 1).copied();
            let boundary = match prev {
                Some(prev) if prev.is_ascii_lowercase() || prev.is_ascii_digit() => true,
                Some(prev) if prev.is_ascii_uppercase() => {
                    next.is_some_and(|next| next.is_ascii_lowercase())
                }
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }

    out
}
