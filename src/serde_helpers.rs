//! JSON decoding with diagnostics.
//!
//! When logging is enabled, unknown fields are reported as warnings and decode failures are
//! logged with the JSON path that failed, which helps spot server-side schema drift.

use std::any::type_name;

use serde::de::DeserializeOwned;

/// Decodes `text` as `T`. An empty or whitespace-only body decodes as JSON `null`, so `()` and
/// `Option<_>` responses work for `204 No Content`.
pub(crate) fn decode<T: DeserializeOwned>(text: &str, diagnostics: bool) -> serde_json::Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };

    if !diagnostics {
        return serde_json::from_str(text);
    }

    tracing::trace!(type_name = %type_name::<T>(), json = %text, "deserializing JSON");

    let mut unknown_paths: Vec<String> = Vec::new();
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let result: serde_json::Result<T> = serde_ignored::deserialize(&mut deserializer, |path| {
        unknown_paths.push(path.to_string());
    })
    .and_then(|value| deserializer.end().map(|()| value));

    match result {
        Ok(value) => {
            for path in unknown_paths {
                tracing::warn!(
                    type_name = %type_name::<T>(),
                    field = %path,
                    "unknown field in response"
                );
            }
            Ok(value)
        }
        Err(e) => {
            let mut deserializer = serde_json::Deserializer::from_str(text);
            if let Err(path_error) = serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
                tracing::error!(
                    type_name = %type_name::<T>(),
                    path = %path_error.path(),
                    error = %path_error.inner(),
                    "deserialization failed"
                );
            }
            Err(e)
        }
    }
}
