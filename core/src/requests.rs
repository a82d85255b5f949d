//! Transactional message requests for the app API.
//!
//! # Design
//! Optional fields are `Option`s skipped when unset, so the JSON body only
//! contains what the caller chose to send. Map-valued fields are filled
//! through `add_*` helpers which refuse to silently overwrite an entry.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A transactional message, addressed by numeric id or by trigger name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageId {
    Id(u64),
    Name(String),
}

impl From<u64> for MessageId {
    fn from(v: u64) -> Self {
        MessageId::Id(v)
    }
}

impl From<u32> for MessageId {
    fn from(v: u32) -> Self {
        MessageId::Id(u64::from(v))
    }
}

impl From<&str> for MessageId {
    fn from(v: &str) -> Self {
        MessageId::Name(v.to_string())
    }
}

impl From<String> for MessageId {
    fn from(v: String) -> Self {
        MessageId::Name(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendEmailRequest {
    pub transactional_message_id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preheader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amp_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fake_bcc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_message_retention: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_to_unsubscribed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_data: Option<Map<String, Value>>,
    /// File name to base64 content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, String>>,
}

impl SendEmailRequest {
    pub fn new(transactional_message_id: impl Into<MessageId>) -> Self {
        Self {
            transactional_message_id: transactional_message_id.into(),
            to: None,
            identifiers: None,
            from: None,
            from_id: None,
            headers: None,
            reply_to: None,
            reply_to_id: None,
            bcc: None,
            subject: None,
            preheader: None,
            body: None,
            plaintext_body: None,
            amp_body: None,
            fake_bcc: None,
            disable_message_retention: None,
            send_to_unsubscribed: None,
            tracked: None,
            queue_draft: None,
            message_data: None,
            attachments: None,
        }
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn from_address(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        insert_unique(&mut self.headers, "header", name, value.into())
    }

    /// Attach a file. `content` is base64-encoded here unless `encode` is
    /// false, in which case it must already be base64 text.
    pub fn add_attachment(&mut self, name: &str, content: impl AsRef<[u8]>, encode: bool) -> Result<()> {
        let content = if encode {
            STANDARD.encode(content.as_ref())
        } else {
            String::from_utf8(content.as_ref().to_vec())
                .map_err(|e| Error::Validation(format!("attachment {name} is not valid base64 text: {e}")))?
        };
        insert_unique(&mut self.attachments, "attachment", name, content)
    }

    pub fn add_message_data(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        insert_unique_json(&mut self.message_data, "message_data", name, value.into())
    }

    /// Identify the recipient, e.g. `("id", "42")` or `("email", "a@b.c")`.
    pub fn add_identifier(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        insert_unique(&mut self.identifiers, "identifier", name, value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendPushRequest {
    pub transactional_message_id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_message_retention: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_to_unsubscribed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_payload: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_device: Option<Map<String, Value>>,
}

impl SendPushRequest {
    pub fn new(transactional_message_id: impl Into<MessageId>) -> Self {
        Self {
            transactional_message_id: transactional_message_id.into(),
            to: None,
            identifiers: None,
            title: None,
            message: None,
            disable_message_retention: None,
            send_to_unsubscribed: None,
            queue_draft: None,
            message_data: None,
            link: None,
            image_url: None,
            sound: None,
            custom_data: None,
            custom_payload: None,
            custom_device: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn add_message_data(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        insert_unique_json(&mut self.message_data, "message_data", name, value.into())
    }

    pub fn add_identifier(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        insert_unique(&mut self.identifiers, "identifier", name, value.into())
    }

    pub fn add_custom_data(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        insert_unique_json(&mut self.custom_data, "custom_data", name, value.into())
    }
}

fn insert_unique(map: &mut Option<BTreeMap<String, String>>, kind: &str, name: &str, value: String) -> Result<()> {
    let map = map.get_or_insert_with(BTreeMap::new);
    if map.contains_key(name) {
        return Err(Error::Validation(format!("{kind} {name} already exists")));
    }
    map.insert(name.to_string(), value);
    Ok(())
}

fn insert_unique_json(map: &mut Option<Map<String, Value>>, kind: &str, name: &str, value: Value) -> Result<()> {
    let map = map.get_or_insert_with(Map::new);
    if map.contains_key(name) {
        return Err(Error::Validation(format!("{kind} {name} already exists")));
    }
    map.insert(name.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_serializes_only_set_fields() {
        let req = SendEmailRequest::new(100_u64)
            .to("john@test.com")
            .subject("transactional message")
            .from_address("team@example.com");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "transactional_message_id": 100,
                "to": "john@test.com",
                "subject": "transactional message",
                "from": "team@example.com"
            })
        );
    }

    #[test]
    fn message_id_by_trigger_name() {
        let v = serde_json::to_value(SendEmailRequest::new("welcome")).unwrap();
        assert_eq!(v, json!({"transactional_message_id": "welcome"}));
    }

    #[test]
    fn helpers_reject_duplicates() {
        let mut req = SendEmailRequest::new(1_u64);
        req.add_identifier("id", "customer_1").unwrap();
        let err = req.add_identifier("id", "customer_2").unwrap_err();
        assert_eq!(err.to_string(), "identifier id already exists");

        req.add_header("X-Tag", "a").unwrap();
        assert!(req.add_header("X-Tag", "b").is_err());

        req.add_message_data("plan", "pro").unwrap();
        assert!(req.add_message_data("plan", json!({"x": 1})).is_err());
    }

    #[test]
    fn attachments_are_base64_encoded() {
        let mut req = SendEmailRequest::new(1_u64);
        req.add_attachment("hello.txt", "hello", true).unwrap();
        req.add_attachment("raw.txt", "aGk=", false).unwrap();
        let attachments = req.attachments.as_ref().unwrap();
        assert_eq!(attachments["hello.txt"], "aGVsbG8=");
        assert_eq!(attachments["raw.txt"], "aGk=");
        assert!(req.add_attachment("hello.txt", b"again", true).is_err());
    }

    #[test]
    fn push_request_shape() {
        let mut req = SendPushRequest::new(7_u64).title("Hi").message("There");
        req.add_identifier("email", "a@b.c").unwrap();
        req.add_custom_data("deep_link", "app://home").unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "transactional_message_id": 7,
                "identifiers": {"email": "a@b.c"},
                "title": "Hi",
                "message": "There",
                "custom_data": {"deep_link": "app://home"}
            })
        );
    }
}
