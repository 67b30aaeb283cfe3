//! Fuzz target for `{{token}}` substitution.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_token_replacer
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use migrata_core::{parse_token, replace_tokens, unresolved_tokens, Tokens};

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    tokens: Vec<(String, String)>,
    raw_token: String,
}

fuzz_target!(|input: Input| {
    let tokens: Tokens = input.tokens.into_iter().collect();

    let replaced = replace_tokens(&input.text, &tokens);
    let _ = unresolved_tokens(&replaced, &tokens);

    if tokens.is_empty() {
        assert_eq!(replaced.as_ref(), input.text.as_str());
    }

    if let Ok((key, value)) = parse_token(&input.raw_token) {
        assert!(!key.is_empty());
        assert!(input.raw_token.contains(&value));
    }
});
