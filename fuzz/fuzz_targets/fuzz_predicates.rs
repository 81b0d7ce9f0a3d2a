#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroon::Caveat;
use macaroon::predicate::{PredicateVerifier, SetPredicateVerifier};
use macaroon::verifier::CaveatVerifier;

fuzz_target!(|data: &[u8]| {
    let caveat = Caveat::first_party(data);

    // Typed verifiers must fail closed on arbitrary caveat bytes, never
    // panic.
    let verifiers: Vec<Box<dyn CaveatVerifier>> = vec![
        Box::new(PredicateVerifier::new("account", "alice")),
        Box::new(PredicateVerifier::new("count", 50i64)),
        Box::new(PredicateVerifier::new("ratio", 0.5f64)),
        Box::new(PredicateVerifier::new("admin", true)),
        Box::new(SetPredicateVerifier::new("actions", ["read", "write"])),
        Box::new(SetPredicateVerifier::new("excludes", [5i64, 7i64])),
    ];
    for verifier in &verifiers {
        let _ = verifier.verify(&caveat);
    }

    // Valid UTF-8 inputs exercise the field/operator/value split.
    if let Ok(text) = std::str::from_utf8(data) {
        for field in ["account", "count", "actions", ""] {
            let synthetic = Caveat::first_party(format!("{field} {text}"));
            for verifier in &verifiers {
                let _ = verifier.verify(&synthetic);
            }
        }
    }
});
