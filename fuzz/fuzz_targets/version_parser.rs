//! Fuzz target for version directory names.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_version_parser
//! ```

#![no_main]

use std::cmp::Ordering;

use libfuzzer_sys::fuzz_target;
use migrata_core::Version;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(version) = Version::parse(input) else {
        return;
    };

    // a parsed name is always version-like and keeps its spelling
    assert!(Version::is_version_like(input));
    assert_eq!(version.as_str(), input);

    let reparsed = Version::parse(version.as_str()).expect("reparse");
    assert_eq!(version.cmp(&reparsed), Ordering::Equal);

    let next = version.next_minor();
    assert!(Version::parse(next.as_str()).is_ok());
    if version.minor() < u32::MAX {
        assert!(next > version);
    }

    let next = version.next_major();
    assert!(Version::parse(next.as_str()).is_ok());
    if version.major() < u32::MAX {
        assert!(next > version);
    }
});
