//! This module implements field-level utilities for Neutral file records:
//! the tokenizer, the empty-text sentinel, and small typed field accessors
//! used all over the extractors.

/// The sentinel the emitter writes in place of an empty text field.
pub const NULL_SENTINEL: &str = "<NULL>";

/// The characters that may not appear in file names derived from titles.
pub const FORBIDDEN_IN_PATHS: &[char] =
  &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Splits one record line into fields. Lines are either comma-separated
/// (possibly with a trailing comma) or whitespace-separated; commas win when
/// both appear.
pub fn split_record(line: &str) -> Vec<&str> {
  let line = line.trim().trim_end_matches(',').trim_end();
  if line.contains(',') {
    return line
      .split(',')
      .map(str::trim)
      .filter(|f| !f.is_empty())
      .collect();
  } else {
    return line.split_whitespace().collect();
  }
}

/// Normalizes a text-only line: trims whitespace and a trailing comma, and
/// converts the `<NULL>` sentinel to an empty string.
pub fn normalize_text(line: &str) -> String {
  let text = line.trim().trim_end_matches(',').trim_end();
  if text == NULL_SENTINEL {
    return String::new();
  } else {
    return text.to_string();
  }
}

/// Replaces every filesystem-forbidden character in a title with an
/// underscore. Idempotent; all other code points pass through untouched.
pub fn sanitize_title(title: &str) -> String {
  return title
    .chars()
    .map(|c| if FORBIDDEN_IN_PATHS.contains(&c) { '_' } else { c })
    .collect();
}

/// Parses the field at a position as a signed integer.
pub(crate) fn int_field(fields: &[&str], at: usize) -> Option<i64> {
  return fields.get(at).and_then(|f| f.parse::<i64>().ok());
}

/// Parses the field at a position as an entity ID (positive integer).
pub(crate) fn id_field(fields: &[&str], at: usize) -> Option<u32> {
  return fields.get(at).and_then(|f| f.parse::<u32>().ok());
}

/// Parses the field at a position as a real.
pub(crate) fn real_field(fields: &[&str], at: usize) -> Option<f64> {
  return fields.get(at).and_then(|f| f.parse::<f64>().ok());
}

/// Parses every field of a connectivity line as an integer. All-or-nothing:
/// a single bad token fails the whole line.
pub(crate) fn all_int_fields(fields: &[&str]) -> Option<Vec<i64>> {
  return fields.iter().map(|f| f.parse::<i64>().ok()).collect();
}
