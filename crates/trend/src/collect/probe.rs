//! Size capability probe

use log::debug;

use crate::fetch::FetchClient;
use crate::graph::{GraphUrls, SIZE_FIELD};
use crate::models::{Folder, MailboxCapabilityState};

/// What the probe learned about the native size field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A folder answered a query selecting `size`, or there was nothing to ask
    Supported,
    /// The mailbox rejected `size`; the capability state is downgraded
    Unsupported,
    /// Every folder failed for unrelated reasons; the state stays optimistic
    Inconclusive,
}

/// Ask the mailbox, one folder at a time, whether it accepts `size`
///
/// Each folder gets a single attempt. The first 200 or the first size
/// rejection settles the question.
pub async fn probe_size_support(
    client: &FetchClient,
    urls: &GraphUrls,
    mailbox: &str,
    folders: &[Folder],
    state: &MailboxCapabilityState,
) -> ProbeOutcome {
    let mut probed = false;

    for folder in folders.iter().filter(|f| !f.id.is_empty()) {
        probed = true;
        match client
            .get_json_with_attempts(&urls.size_probe(mailbox, &folder.id), 1)
            .await
        {
            Ok(_) => return ProbeOutcome::Supported,
            Err(err) if err.rejects_property(SIZE_FIELD) => {
                state.mark_size_unsupported(client.sink().as_ref());
                return ProbeOutcome::Unsupported;
            }
            Err(err) => {
                debug!(
                    "{}: size probe inconclusive on '{}': {}",
                    mailbox, folder.path, err
                );
            }
        }
    }

    if probed {
        ProbeOutcome::Inconclusive
    } else {
        ProbeOutcome::Supported
    }
}
