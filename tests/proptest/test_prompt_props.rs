//! Property-based tests for console text handling and prompt matching
//!
//! Random console output must never panic the matcher, escape sequences
//! must never change what a prompt resolves to, and output split into
//! arbitrary chunks must read the same as output received at once, even
//! when backspaces erase text that was already consumed.

use modepilot::console::buffer::{strip_escapes, tail_chars};
use modepilot::{ConsoleBuffer, Mode, PromptMatcher, Resolution};
use proptest::prelude::*;

const COLOURS: [&str; 4] = ["\x1b[0m", "\x1b[1;32m", "\x1b[01;34m", "\x1b]0;uut\x07"];

fn lab_matcher() -> PromptMatcher {
    PromptMatcher::from_pairs([
        ("enable", r"switch# $"),
        ("cli", r"switch> $"),
        ("uboot", r"=> $"),
        ("linux", r"~# $"),
    ])
    .unwrap()
}

/// Interleave colour sequences between the words of `plain`
fn colourise(plain: &str, picks: &[usize]) -> String {
    let mut out = String::new();
    for (i, word) in plain.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if let Some(pick) = picks.get(i) {
            out.push_str(COLOURS[pick % COLOURS.len()]);
        }
        out.push_str(word);
    }
    out
}

proptest! {
    #[test]
    fn test_resolve_never_panics(text in "\\PC*") {
        let _ = lab_matcher().resolve(&text);
    }

    #[test]
    fn test_declared_prompt_at_end_resolves(
        noise in "[a-zA-Z0-9 .:/\n]{0,300}",
        host in "[a-z]{1,12}",
        trailing in "\n{0,3}",
    ) {
        let prompt = format!("{}@uut:~# ", host);
        let text = format!("{}\n{}{}", noise, prompt, trailing);
        prop_assert_eq!(lab_matcher().resolve(&text), Resolution::Matched(Mode::new("linux")));
    }

    #[test]
    fn test_literal_prompt_matches_itself(
        prefix in "\\PC{0,100}",
        literal in "[a-zA-Z0-9_()\\[\\]$#>.*+?|-]{1,20}",
    ) {
        let mut matcher = PromptMatcher::new();
        matcher.add("target", &regex::escape(&literal)).unwrap();
        let text = format!("{}\n{}", prefix, literal);
        prop_assert_eq!(matcher.resolve(&text), Resolution::Matched(Mode::new("target")));
    }

    #[test]
    fn test_colour_does_not_change_resolution(
        plain in "[a-z]{1,8}( [a-z]{1,8}){0,6}",
        picks in prop::collection::vec(0usize..8, 0..8),
    ) {
        let matcher = lab_matcher();
        let plain = format!("{} switch> ", plain);
        let coloured = colourise(&plain, &picks);

        prop_assert_eq!(strip_escapes(&coloured), plain.clone());
        prop_assert_eq!(matcher.resolve(&coloured), matcher.resolve(&plain));
    }

    #[test]
    fn test_chunking_does_not_change_text(
        plain in "[a-z]{1,8}( [a-z]{1,8}){0,6}",
        picks in prop::collection::vec(0usize..8, 0..8),
        split in any::<prop::sample::Index>(),
    ) {
        let bytes = colourise(&plain, &picks).into_bytes();
        let at = split.index(bytes.len() + 1);

        let mut whole = ConsoleBuffer::new();
        whole.push_bytes(&bytes);
        let mut chunked = ConsoleBuffer::new();
        chunked.push_bytes(&bytes[..at]);
        chunked.push_bytes(&bytes[at..]);

        prop_assert_eq!(chunked.text(), whole.text());
        prop_assert_eq!(whole.text(), plain.as_str());
    }

    #[test]
    fn test_chunking_with_backspaces_does_not_change_text(
        text in "[a-z :\\x08]{0,80}",
        split in any::<prop::sample::Index>(),
    ) {
        let bytes = text.as_bytes();
        let at = split.index(bytes.len() + 1);

        let mut whole = ConsoleBuffer::new();
        whole.push_bytes(bytes);
        let mut chunked = ConsoleBuffer::new();
        chunked.push_bytes(&bytes[..at]);
        chunked.push_bytes(&bytes[at..]);

        prop_assert_eq!(chunked.text(), whole.text());
        prop_assert!(!whole.text().contains('\x08'));
    }

    #[test]
    fn test_backspaces_never_strand_the_cursor(
        steps in prop::collection::vec(("[a-zé✓ \\x08]{0,12}", 0usize..4), 1..20),
    ) {
        let mut buffer = ConsoleBuffer::with_capacity(32);
        for (chunk, action) in steps {
            buffer.push_str(&chunk);
            match action {
                0 => buffer.consume_all(),
                1 => buffer.consume(3),
                _ => {}
            }
            let unconsumed = buffer.unconsumed();
            prop_assert!(buffer.text().ends_with(unconsumed));
            prop_assert!(buffer.tail(8).chars().count() <= 8);
        }
    }

    #[test]
    fn test_tail_is_a_bounded_suffix(text in "\\PC{0,200}", max in 0usize..64) {
        let tail = tail_chars(&text, max);
        prop_assert!(text.ends_with(tail));
        prop_assert!(tail.chars().count() <= max);
        prop_assert_eq!(tail.chars().count(), text.chars().count().min(max));
    }
}
