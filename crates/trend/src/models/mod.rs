//! Domain models for harvested mailbox entities

mod capability;
mod folder;
mod message;

pub use capability::MailboxCapabilityState;
pub use folder::Folder;
pub use message::{
    EmailAddress, ExtendedProperty, InternetHeader, ItemBody, RawAttachment, RawMessage, Recipient,
    SizedMessage,
};
