#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroon::{Caveat, Macaroon, SecretKey, Verifier};

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }

    let key = SecretKey::from([0x42; 32]);
    let wrong_key = SecretKey::from([0x43; 32]);

    // Build a macaroon out of arbitrary caveat chunks.
    let split = data.len() / 2;
    let identifier = &data[..split];

    let mut builder = Macaroon::builder(&key, identifier, None::<String>);
    for chunk in data[split..].chunks(16) {
        if chunk.is_empty() {
            continue;
        }
        builder = match builder.require(chunk) {
            Ok(builder) => builder,
            Err(_) => return,
        };
    }
    let macaroon = builder.build();

    // Exact evidence for every caveat must verify; the wrong key never does.
    let mut verifier = Verifier::new(&macaroon);
    for caveat in macaroon.caveats() {
        verifier = verifier.satisfy_exact(caveat.identifier());
    }
    assert!(verifier.is_valid(&key));
    assert!(!macaroon.verify(&wrong_key));

    // A closure verifier sees every caveat without panicking.
    let _ = Verifier::new(&macaroon)
        .satisfy_general(|caveat: &Caveat| caveat.identifier().len() % 2 == 0)
        .is_valid(&key);

    // Third-party flow driven by fuzz bytes.
    if data.len() >= 32 {
        let discharge_key = SecretKey::from([0x24; 32]);
        let caveat_id = &data[..16];

        let primary = match Macaroon::builder(&key, identifier, None::<String>).require_third_party(
            "https://fuzz.test",
            &discharge_key,
            caveat_id,
        ) {
            Ok(builder) => builder.build(),
            Err(_) => return,
        };

        let discharge =
            Macaroon::builder(&discharge_key, caveat_id, Some("https://fuzz.test")).build();
        let bound = primary.extend().bind(&discharge).build();

        assert!(
            Verifier::new(&primary)
                .satisfy_discharge(bound)
                .is_valid(&key)
        );

        // An unbound discharge must not satisfy the caveat.
        assert!(
            !Verifier::new(&primary)
                .satisfy_discharge(discharge)
                .is_valid(&key)
        );
    }
});
