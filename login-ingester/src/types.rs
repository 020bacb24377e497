use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::DecodeError;
use crate::masking::Masker;

/// A decoded user-login event, exactly as the producer sent it. The `ip` and
/// `device_id` fields still hold raw PII here, so values of this type must
/// never be logged; they only live long enough to be masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub user_id: String,
    pub device_type: String,
    pub ip: String,
    pub device_id: String,
    pub locale: Option<String>,
    pub app_version: Option<String>,
}

impl LoginEvent {
    /// Decodes a raw message body. The producer normally emits a bare JSON
    /// object, but array-wrapped single objects have been observed as well,
    /// so both forms are accepted and normalized to the object.
    pub fn from_raw(raw: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(raw)?;
        let object = match value {
            Value::Object(map) => map,
            Value::Array(mut items) => match items.len() {
                0 => return Err(DecodeError::EmptyArray),
                1 => match items.remove(0) {
                    Value::Object(map) => map,
                    _ => return Err(DecodeError::NotAnObject),
                },
                n => return Err(DecodeError::AmbiguousArray(n)),
            },
            _ => return Err(DecodeError::NotAnObject),
        };

        let user_id = required_string(&object, "user_id")?;
        if user_id.is_empty() {
            return Err(DecodeError::EmptyField("user_id"));
        }

        Ok(Self {
            user_id,
            device_type: required_string(&object, "device_type")?,
            ip: required_string(&object, "ip")?,
            device_id: required_string(&object, "device_id")?,
            locale: optional_string(&object, "locale")?,
            // Free-form text: "2.1", "1.2.3-beta" and friends all pass
            // through untouched. An earlier integer column for this field
            // fell over on real payloads and was reverted to VARCHAR.
            app_version: optional_string(&object, "app_version")?,
        })
    }
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::WrongType(field)),
    }
}

fn optional_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::WrongType(field)),
    }
}

/// A `LoginEvent` with its PII fields replaced by masked digests. This is the
/// only form that ever reaches the database or the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedRecord {
    pub user_id: String,
    pub device_type: String,
    pub masked_ip: String,
    pub masked_device_id: String,
    pub locale: Option<String>,
    pub app_version: Option<String>,
    /// Content hash used as the idempotency key: redelivered messages derive
    /// the same key and collapse into the existing row on insert.
    pub event_key: String,
}

impl MaskedRecord {
    pub fn from_event(event: LoginEvent, masker: &Masker) -> Self {
        let masked_ip = masker.mask(&event.ip);
        let masked_device_id = masker.mask(&event.device_id);

        // Unit separators keep ("ab", "c") and ("a", "bc") from colliding.
        let mut hasher = Sha256::new();
        for part in [
            event.user_id.as_str(),
            event.device_type.as_str(),
            masked_ip.as_str(),
            masked_device_id.as_str(),
            event.locale.as_deref().unwrap_or(""),
            event.app_version.as_deref().unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        let event_key = format!("{:x}", hasher.finalize());

        Self {
            user_id: event.user_id,
            device_type: event.device_type,
            masked_ip,
            masked_device_id,
            locale: event.locale,
            app_version: event.app_version,
            event_key,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_body() -> &'static [u8] {
        br#"{"user_id":"u1","device_type":"iOS","ip":"1.2.3.4","device_id":"abc123","locale":"en-US","app_version":"2.1"}"#
    }

    #[test]
    fn decodes_a_bare_object() {
        let event = LoginEvent::from_raw(sample_body()).unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.device_type, "iOS");
        assert_eq!(event.ip, "1.2.3.4");
        assert_eq!(event.device_id, "abc123");
        assert_eq!(event.locale.as_deref(), Some("en-US"));
        assert_eq!(event.app_version.as_deref(), Some("2.1"));
    }

    #[test]
    fn decodes_a_single_element_array() {
        let body = br#"[{"user_id":"u1","device_type":"android","ip":"10.0.0.1","device_id":"d1"}]"#;
        let event = LoginEvent::from_raw(body).unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.locale, None);
    }

    #[test]
    fn rejects_empty_and_multi_element_arrays() {
        assert!(matches!(
            LoginEvent::from_raw(b"[]"),
            Err(DecodeError::EmptyArray)
        ));
        let body = br#"[{"user_id":"a"},{"user_id":"b"}]"#;
        assert!(matches!(
            LoginEvent::from_raw(body),
            Err(DecodeError::AmbiguousArray(2))
        ));
    }

    #[test]
    fn missing_user_id_is_a_decode_error() {
        let body = br#"{"device_type":"iOS","ip":"1.2.3.4","device_id":"abc123"}"#;
        assert!(matches!(
            LoginEvent::from_raw(body),
            Err(DecodeError::MissingField("user_id"))
        ));
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let body = br#"{"user_id":"","device_type":"iOS","ip":"1.2.3.4","device_id":"abc123"}"#;
        assert!(matches!(
            LoginEvent::from_raw(body),
            Err(DecodeError::EmptyField("user_id"))
        ));
    }

    #[test]
    fn non_string_required_field_is_rejected() {
        let body = br#"{"user_id":"u1","device_type":"iOS","ip":42,"device_id":"abc123"}"#;
        assert!(matches!(
            LoginEvent::from_raw(body),
            Err(DecodeError::WrongType("ip"))
        ));
    }

    #[test]
    fn app_version_is_never_coerced() {
        let body = br#"{"user_id":"u1","device_type":"iOS","ip":"1.2.3.4","device_id":"abc123","app_version":"1.2.3-beta"}"#;
        let event = LoginEvent::from_raw(body).unwrap();
        assert_eq!(event.app_version.as_deref(), Some("1.2.3-beta"));

        // A numeric app_version is a type error, not a silent coercion.
        let body = br#"{"user_id":"u1","device_type":"iOS","ip":"1.2.3.4","device_id":"abc123","app_version":2}"#;
        assert!(matches!(
            LoginEvent::from_raw(body),
            Err(DecodeError::WrongType("app_version"))
        ));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            LoginEvent::from_raw(b"{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(
            LoginEvent::from_raw(b"\"just a string\""),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn masked_record_replaces_pii_with_digests() {
        let event = LoginEvent::from_raw(sample_body()).unwrap();
        let record = MaskedRecord::from_event(event, &Masker::default());
        assert_eq!(
            record.masked_ip,
            "6694f83c9f476da31f5df6bcc520034e7e57d421d247b9d34f49edbfc84a764c"
        );
        assert_eq!(
            record.masked_device_id,
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.event_key.len(), 64);
    }

    #[test]
    fn event_key_is_stable_across_redelivery() {
        let masker = Masker::default();
        let first = MaskedRecord::from_event(LoginEvent::from_raw(sample_body()).unwrap(), &masker);
        let second =
            MaskedRecord::from_event(LoginEvent::from_raw(sample_body()).unwrap(), &masker);
        assert_eq!(first.event_key, second.event_key);
    }

    #[test]
    fn event_key_distinguishes_different_events() {
        let masker = Masker::default();
        let a = MaskedRecord::from_event(LoginEvent::from_raw(sample_body()).unwrap(), &masker);
        let body = br#"{"user_id":"u2","device_type":"iOS","ip":"1.2.3.4","device_id":"abc123"}"#;
        let b = MaskedRecord::from_event(LoginEvent::from_raw(body).unwrap(), &masker);
        assert_ne!(a.event_key, b.event_key);
    }
}
