//! Fuzz target for the bulk CSV reader.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_csv_reader
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use migrata_core::CsvReader;

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    separator: char,
}

fuzz_target!(|input: Input| {
    if input.separator == '"' || input.separator == '\n' || input.separator == '\r' {
        return;
    }

    let mut errors = 0;
    for record in CsvReader::new(&input.text, input.separator) {
        match record {
            Ok(fields) => assert!(errors == 0 && !fields.is_empty()),
            Err(_) => errors += 1,
        }
    }
    // iteration stops after the first error
    assert!(errors <= 1);
});
