pub mod imap;
pub mod message;
pub mod poller;

pub use imap::{ImapMailbox, ImapSettings};
pub use message::{BodyPart, MailboxMessage};
pub use poller::{await_message, Mailbox};
