use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::ScriptorError;

/// `axum::Json` whose rejections use the v1 error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ScriptorError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ScriptorError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> ScriptorError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                ScriptorError::InvalidInput(format!("Missing required field: {field}"))
            } else {
                ScriptorError::InvalidInput(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            ScriptorError::InvalidInput(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => ScriptorError::InvalidInput(
            "Missing `Content-Type: application/json` header".to_string(),
        ),
        JsonRejection::BytesRejection(_) => {
            ScriptorError::Internal("Failed to read request body".to_string())
        }
        _ => ScriptorError::InvalidInput(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_missing_field_name() {
        let message = "Failed to deserialize the JSON body into the target type: missing field `model_type` at line 1 column 2";
        assert_eq!(extract_missing_field(message), Some("model_type"));
    }

    #[test]
    fn no_missing_field_in_other_errors() {
        assert_eq!(extract_missing_field("invalid type: integer"), None);
    }
}
