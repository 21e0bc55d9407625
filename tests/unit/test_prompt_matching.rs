//! Unit tests for prompt matching
//!
//! Exercise the lab product's prompt table against realistic console
//! output, including escape sequences and output split across reads.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use modepilot::{ConsoleBuffer, DefinitionError, Error, Mode, PromptMatcher, Resolution};
use test_utils::{lab_context, scenario_graph};

fn m(key: &str) -> Mode {
    Mode::from(key)
}

#[cfg(test)]
mod lab_prompt_tests {
    use super::*;

    #[test]
    fn test_each_lab_prompt_resolves() {
        let context = lab_context();
        let prompts = context.prompts();

        assert_eq!(prompts.resolve("U-Boot 2023.04\n=> "), Resolution::Matched(m("uboot")));
        assert_eq!(prompts.resolve("login ok\nroot@uut:~# "), Resolution::Matched(m("linux")));
        assert_eq!(prompts.resolve("switch> "), Resolution::Matched(m("cli")));
        assert_eq!(prompts.resolve("switch# "), Resolution::Matched(m("enable")));
    }

    #[test]
    fn test_prompt_must_be_last_thing_on_console() {
        let context = lab_context();
        let prompts = context.prompts();

        // The shell prompt scrolled by; the device is now printing boot logs
        let text = "root@uut:~# reboot\nStarting kernel ...\n";
        assert_eq!(prompts.resolve(text), Resolution::NoMatch);
    }

    #[test]
    fn test_latest_prompt_wins_over_earlier_ones() {
        let context = lab_context();
        let text = "switch> enable\nswitch# exit\nswitch> ";
        assert_eq!(context.prompts().resolve(text), Resolution::Matched(m("cli")));
    }

    #[test]
    fn test_coloured_prompt_resolves() {
        let context = lab_context();
        let text = "\x1b[1;32mroot@uut\x1b[0m:\x1b[1;34m~\x1b[0m# ";
        assert_eq!(context.prompts().resolve(text), Resolution::Matched(m("linux")));
    }

    #[test]
    fn test_stateful_variant_uses_base_prompt() {
        let context = lab_context();
        let prompts = context.prompts();
        let diag = Mode::with_variant("linux", "diag");

        assert!(prompts.pattern_for(&diag).is_none());
        let expected = prompts.expected_prompt(&diag).unwrap();
        assert!(expected.is_match("root@uut:~# "));
        assert!(prompts.expected_prompt(&m("bios")).is_none());
    }

    #[test]
    fn test_resolve_mode_reports_tail() {
        let context = lab_context();
        let err = context
            .prompts()
            .resolve_mode("Hit any key to stop autoboot:  3")
            .unwrap_err();

        match err {
            Error::NoMatch { tail } => assert!(tail.ends_with("autoboot:  3")),
            other => panic!("unexpected error: {}", other),
        }
    }
}

#[cfg(test)]
mod buffer_tests {
    use super::*;

    #[test]
    fn test_prompt_split_across_reads() {
        let context = lab_context();
        let mut buffer = ConsoleBuffer::default();

        buffer.push_bytes(b"boot\r\nroot@uut:\x1b[1");
        assert_eq!(context.prompts().resolve(buffer.text()), Resolution::NoMatch);

        buffer.push_bytes(b";34m~\x1b[0m# ");
        assert_eq!(
            context.prompts().resolve(buffer.text()),
            Resolution::Matched(m("linux"))
        );
    }

    #[test]
    fn test_tail_window_hides_old_prompts() {
        let matcher = PromptMatcher::from_pairs([("uboot", r"=> $")])
            .unwrap()
            .with_tail_chars(16);
        let text = format!("=> {}", "x".repeat(64));

        assert_eq!(matcher.resolve(&text), Resolution::NoMatch);
        assert_eq!(matcher.resolve("noise\n=> "), Resolution::Matched(m("uboot")));
    }
}

#[cfg(test)]
mod ambiguity_tests {
    use super::*;

    #[test]
    fn test_shared_prompt_lists_every_owner() {
        let matcher =
            PromptMatcher::from_pairs([("s3", r"\$ $"), ("s7", r"\$ $"), ("s1", r"> $")]).unwrap();

        let resolution = matcher.resolve("user@host:/tmp$ ");
        assert_eq!(resolution, Resolution::Ambiguous(vec![m("s3"), m("s7")]));
        assert!(resolution.admits(&m("s7")));
        assert!(!resolution.admits(&m("s1")));
        assert!(resolution.mode().is_none());

        let err = matcher.resolve_mode("user@host:/tmp$ ").unwrap_err();
        assert!(matches!(err, Error::AmbiguousPrompt { ref candidates } if candidates.len() == 2));
    }

    #[test]
    fn test_overlapping_patterns_follow_declaration_order() {
        let generic_first = PromptMatcher::from_pairs([("s1", r"[#>] $"), ("s2", r"# $")]).unwrap();
        let specific_first = PromptMatcher::from_pairs([("s2", r"# $"), ("s1", r"[#>] $")]).unwrap();

        assert_eq!(generic_first.resolve("box# "), Resolution::Matched(m("s1")));
        assert_eq!(specific_first.resolve("box# "), Resolution::Matched(m("s2")));
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_prompt_for_undeclared_mode_rejected() {
        let matcher = PromptMatcher::from_pairs([("s1", r"> $"), ("bogus", r"% $")]).unwrap();
        let err = matcher.validate_against(&scenario_graph()).unwrap_err();

        assert_eq!(err, DefinitionError::UndeclaredPromptMode(m("bogus")));
    }

    #[test]
    fn test_bad_regex_names_the_mode() {
        let err = PromptMatcher::from_pairs([("s1", r"(unclosed")]).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidPromptPattern { ref mode, .. } if mode == &m("s1")));
    }
}
