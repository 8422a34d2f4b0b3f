use lettre::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const NAME_LENGTH: (usize, usize) = (2, 100);
pub const MESSAGE_LENGTH: (usize, usize) = (10, 1000);

/// One failing field of a contact request.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// The body as received. Fields stay loose so every problem can be reported at once.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactPayload {
    pub name: Option<Value>,
    pub email: Option<Value>,
    pub message: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactPayload {
    pub fn validate(self) -> Result<ContactMessage, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let name = text_field("name", self.name, &mut errors)
            .filter(|name| check_length("name", name, NAME_LENGTH, &mut errors));
        let email = text_field("email", self.email, &mut errors).filter(|email| {
            let valid = is_email(email);
            if !valid {
                errors.push(ValidationError::new("email", "Invalid email address"));
            }
            valid
        });
        let message = text_field("message", self.message, &mut errors)
            .filter(|message| check_length("message", message, MESSAGE_LENGTH, &mut errors));

        match (name, email, message) {
            (Some(name), Some(email), Some(message)) if errors.is_empty() => Ok(ContactMessage {
                name,
                email,
                message,
            }),
            _ => Err(errors),
        }
    }
}

fn text_field(field: &str, value: Option<Value>, errors: &mut Vec<ValidationError>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        Some(other) => {
            errors.push(ValidationError::new(
                field,
                format!("Expected string, received {}", kind(&other)),
            ));
            None
        }
        None => {
            errors.push(ValidationError::new(field, "Required"));
            None
        }
    }
}

fn check_length(field: &str, text: &str, (min, max): (usize, usize), errors: &mut Vec<ValidationError>) -> bool {
    let length = text.chars().count();
    if length < min {
        errors.push(ValidationError::new(
            field,
            format!("Must contain at least {min} characters"),
        ));
        false
    } else if length > max {
        errors.push(ValidationError::new(
            field,
            format!("Must contain at most {max} characters"),
        ));
        false
    } else {
        true
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An address the SMTP builder accepts, on a dotted domain.
pub fn is_email(address: &str) -> bool {
    address.parse::<Address>().is_ok_and(|parsed| {
        let labels: Vec<&str> = parsed.domain().split('.').collect();
        labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
    })
}
