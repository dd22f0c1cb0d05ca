// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use sortdesk::classify::Classifier;
use sortdesk::config::AppConfig;
use sortdesk::extract::{Extractor, FileKind};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    extension: &'a str,
    filename: &'a str,
    body: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let config = AppConfig::default();
    let Ok(classifier) = Classifier::new(&config) else {
        return;
    };
    let extractor = Extractor::new(&config.extraction);

    let kind = FileKind::from_extension(input.extension);
    let extraction = extractor.extract_bytes(input.filename, kind, input.body);
    let result = classifier.classify_extraction(&extraction);
    assert!((0.0..=1.0).contains(&result.confidence));

    let text = String::from_utf8_lossy(input.body);
    let result = classifier.classify_text(input.filename, &text);
    assert!((0.0..=1.0).contains(&result.confidence));
});
