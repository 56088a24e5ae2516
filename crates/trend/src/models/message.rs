//! Message models: the raw Graph payload and the sized record kept per folder

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

use crate::numeric::lenient_bool;
use crate::sizing::{MessageSizes, compute_sizes};

/// An email address with optional display name, as Graph returns it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    #[serde(default)]
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    #[serde(default)]
    pub address: Option<String>,
}

impl EmailAddress {
    /// Create an address without a display name
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: Some(address.into()),
        }
    }

    /// Create an address with a display name
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: Some(address.into()),
        }
    }

    /// Format as a header value: `Name <address>` or the bare address
    pub fn display(&self) -> String {
        let address = self.address.as_deref().unwrap_or_default();
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, address),
            _ => address.to_string(),
        }
    }
}

/// Graph `recipient` wrapper
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

/// Graph `itemBody`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: Option<String>,
    pub content: Option<String>,
}

fn text_of(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(text)) => Cow::Borrowed(text),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

/// One entry of `internetMessageHeaders`
///
/// Kept as raw JSON so a null or non-string entry cannot fail the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InternetHeader {
    pub name: Option<Value>,
    pub value: Option<Value>,
}

impl InternetHeader {
    pub fn name(&self) -> Cow<'_, str> {
        text_of(self.name.as_ref())
    }

    pub fn value(&self) -> Cow<'_, str> {
        text_of(self.value.as_ref())
    }
}

/// Attachment metadata requested through `$expand=attachments($select=size,isInline)`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    pub size: Option<Value>,
    pub is_inline: Option<Value>,
}

impl RawAttachment {
    /// Inline flag; unreadable values count as a regular attachment
    pub fn is_inline(&self) -> bool {
        lenient_bool(self.is_inline.as_ref()).unwrap_or(false)
    }
}

/// One entry of `singleValueExtendedProperties`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedProperty {
    pub id: Option<String>,
    pub value: Option<Value>,
}

/// A message exactly as the list endpoint returns it
///
/// Everything except the identifying metadata is transient: it exists
/// only to feed the size calculation and is dropped by
/// [`SizedMessage::from_raw`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    pub to_recipients: Option<Vec<Recipient>>,
    pub cc_recipients: Option<Vec<Recipient>>,
    pub received_date_time: Option<String>,
    pub has_attachments: Option<Value>,
    /// Native size field; only present when the mailbox accepts it
    pub size: Option<Value>,
    pub body: Option<ItemBody>,
    pub body_preview: Option<String>,
    pub internet_message_headers: Option<Vec<InternetHeader>>,
    pub attachments: Option<Vec<RawAttachment>>,
    pub single_value_extended_properties: Option<Vec<ExtendedProperty>>,
}

impl RawMessage {
    /// Sender address, if any
    pub fn sender(&self) -> Option<&EmailAddress> {
        self.from.as_ref()?.email_address.as_ref()
    }

    /// Addresses of a recipient list, skipping entries without an address
    pub fn addresses(recipients: Option<&[Recipient]>) -> Vec<&EmailAddress> {
        recipients
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.email_address.as_ref())
            .collect()
    }
}

/// A message reduced to the fields the report needs, plus its size breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedMessage {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub received_date_time: Option<String>,
    pub has_attachments: Option<bool>,
    /// Bytes not accounted for by regular attachments
    pub body_size: u64,
    /// Bytes of regular (non-inline) attachments
    pub attachment_size: u64,
    /// Reconciled message size; always `body_size + attachment_size`
    pub total_size: u64,
}

impl SizedMessage {
    /// Size a raw message and drop its transient payload
    pub fn from_raw(raw: RawMessage) -> Self {
        let sizes = compute_sizes(&raw);
        let from = raw.sender().cloned();

        Self {
            id: raw.id,
            subject: raw.subject,
            from,
            received_date_time: raw.received_date_time,
            has_attachments: lenient_bool(raw.has_attachments.as_ref()),
            body_size: sizes.body_size,
            attachment_size: sizes.attachment_size,
            total_size: sizes.total_size,
        }
    }

    /// Build a record directly from known sizes
    pub fn with_sizes(
        subject: impl Into<String>,
        received_date_time: Option<&str>,
        sizes: MessageSizes,
    ) -> Self {
        Self {
            id: None,
            subject: Some(subject.into()),
            from: None,
            received_date_time: received_date_time.map(str::to_string),
            has_attachments: Some(sizes.attachment_size > 0),
            body_size: sizes.body_size,
            attachment_size: sizes.attachment_size,
            total_size: sizes.total_size,
        }
    }

    /// Sender address for display, empty when unknown
    pub fn sender_address(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|f| f.address.as_deref())
            .unwrap_or_default()
    }
}
