use macaroon::predicate::PredicateVerifier;
use macaroon::{Macaroon, SecretKey, Verifier};

fn main() {
    println!("=== Macaroon Basic Usage Example ===\n");

    // Step 1: Mint a new macaroon
    let root_key = SecretKey::generate();
    let macaroon = Macaroon::builder(&root_key, "user-session-12345", Some("https://api.example.com"))
        .require("account = alice")
        .unwrap()
        .require("action = read")
        .unwrap()
        .require("resource = /api/documents")
        .unwrap()
        .build();

    println!(
        "1. Minted macaroon with identifier: {:?}",
        String::from_utf8_lossy(macaroon.identifier())
    );

    println!("\n2. Attached caveats:");
    for (i, caveat) in macaroon.caveats().iter().enumerate() {
        println!("   {}. {}", i + 1, caveat);
    }

    // Step 2: Serialize for transmission
    let serialized = macaroon.serialize();
    println!(
        "\n3. Serialized envelope ({} ASCII bytes):\n   {}",
        serialized.len(),
        String::from_utf8_lossy(&serialized)
    );

    // Step 3: Deserialize and verify
    let received = Macaroon::deserialize(&serialized).unwrap();
    println!("\n4. Received macaroon, verifying...");

    let valid = Verifier::new(&received)
        .satisfy_exact("account = alice")
        .satisfy_exact("action = read")
        .satisfy_exact("resource = /api/documents")
        .is_valid(&root_key);

    match valid {
        true => println!("   ✓ Verification successful!"),
        false => println!("   ✗ Verification failed"),
    }

    // Step 4: Wrong evidence fails
    println!("\n5. Testing with the wrong account...");
    let valid = Verifier::new(&received)
        .satisfy_exact("account = bob") // Wrong account!
        .satisfy_exact("action = read")
        .satisfy_exact("resource = /api/documents")
        .is_valid(&root_key);

    match valid {
        true => println!("   ✗ Unexpectedly succeeded!"),
        false => println!("   ✓ Correctly failed"),
    }

    // Step 5: Typed comparison caveats
    println!("\n6. Testing numeric comparisons...");
    let limited = Macaroon::builder(&root_key, "session-with-limits", None::<String>)
        .require("count < 100")
        .unwrap()
        .require("level >= 5")
        .unwrap()
        .build();

    let valid = Verifier::new(&limited)
        .satisfy_general(PredicateVerifier::new("count", 50i64)) // 50 < 100 ✓
        .satisfy_general(PredicateVerifier::new("level", 10i64)) // 10 >= 5 ✓
        .is_valid(&root_key);

    match valid {
        true => println!("   ✓ Numeric verification successful!"),
        false => println!("   ✗ Numeric verification failed"),
    }

    println!("\n=== Example Complete ===");
}
