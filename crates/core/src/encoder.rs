//! Line protocol encoder
//!
//! Renders one [`Measurement`] as a single line:
//!
//! ```text
//! name,tag_a=1,tag_b=2 field_x=2.5,field_y=3i,field_z="text" 1700000000000
//! ```
//!
//! - names escape commas and spaces
//! - tag keys, tag values and field keys also escape equals signs
//! - string fields are double-quoted with `"` and `\` escaped
//! - integers carry an `i` suffix; booleans are `true`/`false`
//! - tags are written sorted by key, fields in insertion order
//! - tags with an empty value are left out
//! - empty keys and line breaks outside string fields are rejected
//! - the timestamp is integer milliseconds since the Unix epoch

use metricbuf_domain::{EncodingError, FieldValue, Measurement};

/// Encode one measurement. Pure; fails only for points the database would
/// reject outright.
pub fn encode(measurement: &Measurement) -> Result<String, EncodingError> {
    let name = measurement.name();
    if name.is_empty() {
        return Err(EncodingError::EmptyName);
    }
    if measurement.field_count() == 0 {
        return Err(EncodingError::NoFields { name: name.to_string() });
    }
    check_token(measurement, name)?;

    let mut line = String::with_capacity(64);
    escape_into(&mut line, name, &[',', ' ']);

    let mut tags: Vec<(&str, &str)> = measurement.tags().collect();
    tags.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in tags {
        check_key(measurement, key)?;
        check_token(measurement, value)?;
        if value.is_empty() {
            continue;
        }
        line.push(',');
        escape_into(&mut line, key, KEY_SPECIALS);
        line.push('=');
        escape_into(&mut line, value, KEY_SPECIALS);
    }

    line.push(' ');
    for (idx, (key, value)) in measurement.fields().enumerate() {
        check_key(measurement, key)?;
        if idx > 0 {
            line.push(',');
        }
        escape_into(&mut line, key, KEY_SPECIALS);
        line.push('=');
        push_field_value(&mut line, measurement, key, value)?;
    }

    if let Some(timestamp) = measurement.timestamp() {
        line.push(' ');
        line.push_str(&timestamp.timestamp_millis().to_string());
    }

    Ok(line)
}

const KEY_SPECIALS: &[char] = &[',', '=', ' '];

fn check_key(measurement: &Measurement, key: &str) -> Result<(), EncodingError> {
    if key.is_empty() {
        return Err(EncodingError::EmptyKey { name: measurement.name().to_string() });
    }
    check_token(measurement, key)
}

/// Line breaks cannot be escaped outside quoted strings.
fn check_token(measurement: &Measurement, token: &str) -> Result<(), EncodingError> {
    if token.contains(|ch| ch == '\n' || ch == '\r') {
        return Err(EncodingError::LineBreak { name: measurement.name().to_string() });
    }
    Ok(())
}

fn escape_into(out: &mut String, raw: &str, specials: &[char]) {
    for ch in raw.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn push_field_value(
    out: &mut String,
    measurement: &Measurement,
    key: &str,
    value: &FieldValue,
) -> Result<(), EncodingError> {
    match value {
        FieldValue::String(text) => {
            out.push('"');
            for ch in text.chars() {
                if ch == '"' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push('"');
        }
        FieldValue::Boolean(flag) => out.push_str(if *flag { "true" } else { "false" }),
        FieldValue::Integer(number) => {
            out.push_str(&number.to_string());
            out.push('i');
        }
        FieldValue::Float(number) => {
            if !number.is_finite() {
                return Err(EncodingError::NonFiniteFloat {
                    name: measurement.name().to_string(),
                    field: key.to_string(),
                });
            }
            out.push_str(&number.to_string());
        }
    }
    Ok(())
}
