//! Splitting one header delivery into bounded `update_headers` messages.

use crate::messages::{HeaderUpdate, ServerMessage};
use docfeed_core::Header;

/// Default upper bound on headers per message.
pub const MAX_HEADERS_PER_MESSAGE: usize = 1000;

/// Splits `headers` into messages of at most `max_per_message` headers.
///
/// Every message carries the last revision of the whole list as
/// `sync_to_rev`, so a client can render progress before the delivery
/// completes. An empty list yields no messages. A `max_per_message` of zero
/// is treated as one.
#[must_use]
pub fn chunk_headers(headers: &[Header], max_per_message: usize) -> Vec<ServerMessage> {
    let Some(last) = headers.last() else {
        return Vec::new();
    };
    let sync_to_rev = last.rev.as_u64();
    let total_avail = headers.len();

    let mut total_sent = 0;
    headers
        .chunks(max_per_message.max(1))
        .map(|chunk| {
            total_sent += chunk.len();
            let first = chunk.first().map_or(sync_to_rev, |h| h.rev.as_u64());
            let last = chunk.last().map_or(sync_to_rev, |h| h.rev.as_u64());
            ServerMessage::UpdateHeaders(HeaderUpdate {
                rev: [first, last],
                sync_to_rev,
                headers: chunk.to_vec(),
                total_sent,
                total_avail,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfeed_core::{DocumentId, Revision};
    use proptest::prelude::*;

    fn headers(revs: impl IntoIterator<Item = u64>) -> Vec<Header> {
        revs.into_iter()
            .map(|rev| Header {
                id: DocumentId::from(format!("d{rev}")),
                rev: Revision::new(rev),
                timestamp: 0.0,
                hostname: None,
                kind: None,
                tag: None,
                run: None,
            })
            .collect()
    }

    fn updates(messages: &[ServerMessage]) -> Vec<&HeaderUpdate> {
        messages
            .iter()
            .map(|m| m.as_header_update().unwrap())
            .collect()
    }

    #[test]
    fn empty_delivery_sends_nothing() {
        assert!(chunk_headers(&[], MAX_HEADERS_PER_MESSAGE).is_empty());
    }

    #[test]
    fn small_delivery_is_one_message() {
        let messages = chunk_headers(&headers([4, 9]), MAX_HEADERS_PER_MESSAGE);
        let updates = updates(&messages);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].rev, [4, 9]);
        assert_eq!(updates[0].sync_to_rev, 9);
        assert_eq!(updates[0].total_sent, 2);
        assert_eq!(updates[0].total_avail, 2);
    }

    #[test]
    fn twenty_five_hundred_headers() {
        let messages = chunk_headers(&headers(1..=2500), MAX_HEADERS_PER_MESSAGE);
        let updates = updates(&messages);

        let sizes: Vec<_> = updates.iter().map(|u| u.headers.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        let spans: Vec<_> = updates.iter().map(|u| u.rev).collect();
        assert_eq!(spans, vec![[1, 1000], [1001, 2000], [2001, 2500]]);
        let sent: Vec<_> = updates.iter().map(|u| u.total_sent).collect();
        assert_eq!(sent, vec![1000, 2000, 2500]);
        assert!(updates.iter().all(|u| u.sync_to_rev == 2500 && u.total_avail == 2500));
    }

    #[test]
    fn zero_limit_is_one_per_message() {
        assert_eq!(chunk_headers(&headers([1, 2, 3]), 0).len(), 3);
    }

    proptest! {
        #[test]
        fn chunks_cover_delivery_in_order(len in 0usize..3000, max in 1usize..1200) {
            let list = headers(1..=len as u64);
            let messages = chunk_headers(&list, max);
            prop_assert_eq!(messages.len(), len.div_ceil(max));

            let mut joined = Vec::new();
            for update in updates(&messages) {
                prop_assert!(update.headers.len() <= max);
                prop_assert_eq!(update.sync_to_rev, len as u64);
                joined.extend(update.headers.iter().map(|h| h.rev.as_u64()));
                prop_assert_eq!(update.total_sent, joined.len());
            }
            prop_assert_eq!(joined, (1..=len as u64).collect::<Vec<_>>());
        }
    }
}
