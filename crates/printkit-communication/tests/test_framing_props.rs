//! Property tests for line framing

use printkit_communication::line_protocol::frame;
use proptest::prelude::*;

proptest! {
    #[test]
    fn framed_commands_are_single_clean_lines(command in any::<String>()) {
        let framed = frame(&command);
        let text = String::from_utf8(framed).unwrap();

        prop_assert!(text.ends_with('\n'));
        let body = &text[..text.len() - 1];
        prop_assert!(body.chars().all(|c| c.is_ascii_graphic() || c == ' '));
        prop_assert_eq!(body.trim(), body);
    }

    #[test]
    fn printable_commands_survive_framing(command in "[A-Z][0-9]{1,3}( [A-Z][0-9.]{1,6}){0,4}") {
        let framed = frame(&command);
        prop_assert_eq!(framed, format!("{}\n", command).into_bytes());
    }
}
