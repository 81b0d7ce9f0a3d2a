#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroon::Macaroon;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either decode cleanly or fail with a wire-format
    // error; nothing panics.
    if let Ok(macaroon) = Macaroon::deserialize(data) {
        // A successful decode must re-encode to something that decodes to
        // the same value.
        let serialized = macaroon.serialize();
        let round_tripped = Macaroon::deserialize(&serialized).unwrap();
        assert_eq!(macaroon, round_tripped);

        let _ = macaroon.to_string();
        let _ = macaroon.caveats().len();
    }
});
