//! Measurement: one timestamped data point destined for one database

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::field::FieldValue;

/// A single point to be written to the time-series database.
///
/// Tags and fields keep insertion order; setting an existing key replaces its
/// value in place. The timestamp stays unset until the point is buffered,
/// unless the caller overrides it with [`Measurement::set_timestamp`].
///
/// ```rust
/// use metricbuf_domain::Measurement;
///
/// let mut measurement = Measurement::new("example", "requests");
/// measurement.set_tag("method", "GET").set_field("duration", 0.012);
/// assert_eq!(measurement.tag("method"), Some("GET"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    database: String,
    name: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Option<DateTime<Utc>>,
}

impl Measurement {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Set a tag, overwriting the current value if the key exists.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((key, value)),
        }
        self
    }

    /// Set several tags at once, in iteration order.
    pub fn set_tags<I, K, V>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in tags {
            self.set_tag(key, value);
        }
        self
    }

    /// Set a field value, overwriting the current value if the key exists.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    /// Override the timestamp. Precision beyond milliseconds is not written.
    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Consuming variant of [`Measurement::set_tag`].
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    /// Consuming variant of [`Measurement::set_field`].
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Consuming variant of [`Measurement::set_timestamp`].
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.set_timestamp(timestamp);
        self
    }

    /// Run `f` and record its wall-clock duration, in seconds, as a float
    /// field named `name`.
    pub fn time_field<T>(&mut self, name: impl Into<String>, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.set_field(name, started.elapsed().as_secs_f64());
        result
    }

    /// Assign `now` unless a timestamp was already set.
    pub fn stamp_if_unset(&mut self, now: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
    }

    /// Add each base tag whose key the measurement does not carry yet.
    pub fn apply_base_tags<'a, I>(&mut self, base_tags: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in base_tags {
            if self.tag(key).is_none() {
                self.tags.push((key.clone(), value.clone()));
            }
        }
    }
}
