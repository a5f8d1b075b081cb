// tests/service_message_props.rs

//! Property tests for the service message wire codec

use conveyor::service_message::{ServiceMessage, ServiceMessageDecoder};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = ServiceMessage> {
    (
        "[a-zA-Z][a-zA-Z0-9_-]{0,15}",
        prop::collection::vec(("[a-zA-Z][a-zA-Z0-9]{0,8}", any::<String>()), 0..5),
    )
        .prop_map(|(name, properties)| {
            properties
                .into_iter()
                .enumerate()
                // Index suffix keeps keys distinct regardless of case
                .fold(ServiceMessage::new(name), |message, (i, (key, value))| {
                    message.with_property(format!("{}{}", key, i), value)
                })
        })
}

/// Human text that cannot itself start a message
fn noise() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:;!?()-]{0,24}"
}

/// Split `text` into pieces at the given char offsets
fn split_at_chars(text: &str, cuts: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut offsets: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
    offsets.push(0);
    offsets.push(chars.len());
    offsets.sort_unstable();
    offsets.dedup();
    offsets
        .windows(2)
        .map(|w| chars[w[0]..w[1]].iter().collect())
        .collect()
}

proptest! {
    #[test]
    fn encoded_messages_decode_to_themselves(
        message in message_strategy(),
        before in noise(),
        after in noise(),
    ) {
        let line = format!("{}{}{}", before, message.encode(), after);
        let decoded = ServiceMessageDecoder::new().push(&line);
        prop_assert_eq!(decoded, vec![message]);
    }

    #[test]
    fn chunking_does_not_change_what_is_decoded(
        messages in prop::collection::vec(message_strategy(), 1..4),
        separators in prop::collection::vec(noise(), 4),
        cuts in prop::collection::vec(any::<usize>(), 0..12),
    ) {
        let mut stream = separators[0].clone();
        for (i, message) in messages.iter().enumerate() {
            stream.push_str(&message.encode());
            stream.push_str(&separators[(i + 1) % separators.len()]);
            stream.push('\n');
        }

        let mut whole = ServiceMessageDecoder::new();
        let expected = whole.push(&stream);
        prop_assert_eq!(&expected, &messages);

        let mut chunked = ServiceMessageDecoder::new();
        let mut actual = Vec::new();
        for piece in split_at_chars(&stream, &cuts) {
            actual.extend(chunked.push(&piece));
        }
        prop_assert_eq!(actual, messages);
    }

    #[test]
    fn arbitrary_text_never_panics(text in any::<String>()) {
        let mut decoder = ServiceMessageDecoder::new();
        let _ = decoder.push(&text);
        let _ = decoder.push("]");
    }
}
