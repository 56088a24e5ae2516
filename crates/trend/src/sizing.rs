//! Message size reconciliation
//!
//! Combines the size signals a message listing can carry into one
//! breakdown:
//! - `PR_MESSAGE_SIZE` (tag 0x0E08) from the filtered extended property
//! - the native `size` field, when the mailbox accepts it
//! - attachment sizes, split into regular and inline
//! - a local estimate of header and body bytes
//!
//! The server-side value is authoritative but is floored by the locally
//! computed baseline, and the body is always re-derived from the total so
//! that `total == body + regular attachments` holds exactly.

use serde::{Deserialize, Serialize};

use crate::models::{RawAttachment, RawMessage};
use crate::numeric::lenient_int;

/// Extended property ids for `PR_MESSAGE_SIZE`, lowercase
const MESSAGE_SIZE_PROPERTY_IDS: [&str; 2] = ["integer 0x0e08", "long 0x0e08"];

/// `": "` between name and value plus the trailing CRLF
const HEADER_LINE_OVERHEAD: u64 = 4;

/// Blank line separating headers from the body
const HEADER_BODY_SEPARATOR: u64 = 2;

/// Size breakdown of a single message, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSizes {
    pub body_size: u64,
    pub attachment_size: u64,
    pub total_size: u64,
}

/// Attachment bytes split by disposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentBytes {
    pub regular: u64,
    pub inline: u64,
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// First positive `PR_MESSAGE_SIZE` value, or 0
pub fn extended_message_size(message: &RawMessage) -> u64 {
    message
        .single_value_extended_properties
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|prop| {
            prop.id.as_deref().is_some_and(|id| {
                let id = id.trim().to_ascii_lowercase();
                MESSAGE_SIZE_PROPERTY_IDS.contains(&id.as_str())
            })
        })
        .map(|prop| non_negative(lenient_int(prop.value.as_ref(), 0)))
        .find(|size| *size > 0)
        .unwrap_or(0)
}

/// Native `size` field, or 0 when absent or not positive
pub fn native_message_size(message: &RawMessage) -> u64 {
    non_negative(lenient_int(message.size.as_ref(), 0))
}

/// Sum attachment sizes, separating inline parts from regular attachments
pub fn split_attachments(attachments: &[RawAttachment]) -> AttachmentBytes {
    attachments
        .iter()
        .fold(AttachmentBytes::default(), |mut acc, attachment| {
            let size = non_negative(lenient_int(attachment.size.as_ref(), 0));
            if attachment.is_inline() {
                acc.inline = acc.inline.saturating_add(size);
            } else {
                acc.regular = acc.regular.saturating_add(size);
            }
            acc
        })
}

fn header_line_bytes(name: &str, value: &str) -> u64 {
    (name.len() as u64)
        .saturating_add(value.len() as u64)
        .saturating_add(HEADER_LINE_OVERHEAD)
}

fn saturating_sum(sizes: impl Iterator<Item = u64>) -> u64 {
    sizes.fold(0, u64::saturating_add)
}

/// Estimate the header block size
///
/// Uses the real internet headers when the listing carried them, otherwise
/// synthesizes Subject/From/To/Cc from the message metadata.
pub fn estimate_header_bytes(message: &RawMessage) -> u64 {
    if let Some(headers) = message.internet_message_headers.as_deref()
        && !headers.is_empty()
    {
        return saturating_sum(
            headers
                .iter()
                .map(|h| header_line_bytes(&h.name(), &h.value())),
        );
    }

    let join = |recipients| {
        RawMessage::addresses(recipients)
            .iter()
            .map(|a| a.display())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let synthesized = [
        ("Subject", message.subject.clone().unwrap_or_default()),
        (
            "From",
            message.sender().map(|a| a.display()).unwrap_or_default(),
        ),
        ("To", join(message.to_recipients.as_deref())),
        ("Cc", join(message.cc_recipients.as_deref())),
    ];

    saturating_sum(
        synthesized
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| header_line_bytes(name, value)),
    )
}

/// Estimate header plus body bytes in UTF-8
///
/// Falls back to the body preview when the body content is empty.
pub fn estimate_body_bytes(message: &RawMessage) -> u64 {
    let content = message
        .body
        .as_ref()
        .and_then(|b| b.content.as_deref())
        .filter(|c| !c.is_empty())
        .or(message.body_preview.as_deref())
        .unwrap_or_default();

    estimate_header_bytes(message)
        .saturating_add(HEADER_BODY_SEPARATOR)
        .saturating_add(content.len() as u64)
}

/// Reconcile all size signals of a message
pub fn compute_sizes(message: &RawMessage) -> MessageSizes {
    let attachments = split_attachments(message.attachments.as_deref().unwrap_or_default());
    let estimated_body = estimate_body_bytes(message);
    let authoritative_total = extended_message_size(message).max(native_message_size(message));

    reconcile(authoritative_total, attachments, estimated_body)
}

/// The reconciliation formula
///
/// `authoritative_total` of 0 means no server-side size was available.
/// Sums saturate at `u64::MAX`; the body then shrinks so that
/// `total == body + attachments` still holds.
pub fn reconcile(
    authoritative_total: u64,
    attachments: AttachmentBytes,
    estimated_body: u64,
) -> MessageSizes {
    let baseline_body = estimated_body.saturating_add(attachments.inline);
    let baseline_total = attachments.regular.saturating_add(baseline_body);

    let total = if authoritative_total > 0 {
        authoritative_total.max(baseline_total)
    } else {
        baseline_total
    };
    // At least baseline_body unless the sums saturated
    let body = total - attachments.regular;

    MessageSizes {
        body_size: body,
        attachment_size: attachments.regular,
        total_size: total,
    }
}
