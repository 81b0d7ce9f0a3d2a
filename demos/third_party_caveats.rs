use macaroon::predicate::PredicateVerifier;
use macaroon::{Macaroon, SecretKey, Verifier};

fn main() {
    println!("=== Third-Party Caveats and Discharge Macaroons ===\n");

    // Scenario: a service grants access, but requires authentication from a
    // third-party auth service.

    let root_key = SecretKey::generate();
    let auth_key = SecretKey::generate(); // shared with the auth service

    // Step 1: Service mints a macaroon with a third-party caveat
    println!("1. Service mints macaroon with third-party caveat");
    let primary = Macaroon::builder(&root_key, "session-12345", Some("https://api.service.com"))
        .require("resource = /api/documents")
        .unwrap()
        .require_third_party("https://auth.service.com", &auth_key, "user_authenticated")
        .unwrap()
        .build();

    println!(
        "   Primary macaroon created with {} caveats",
        primary.caveats().len()
    );
    println!("   - First-party: resource = /api/documents");
    println!("   - Third-party: user_authenticated (at https://auth.service.com)");

    // Step 2: Verifying WITHOUT a discharge fails
    println!("\n2. Attempting verification without discharge macaroon...");
    let valid = Verifier::new(&primary)
        .satisfy_exact("resource = /api/documents")
        .is_valid(&root_key);
    match valid {
        true => println!("   ✗ Unexpectedly succeeded!"),
        false => println!("   ✓ Correctly failed"),
    }

    // Step 3: The auth service issues a discharge macaroon
    println!("\n3. Client contacts auth service...");
    println!("   Auth service verifies user credentials...");

    let discharge = Macaroon::builder(
        &auth_key,
        "user_authenticated",
        Some("https://auth.service.com"),
    )
    .require("auth_level >= 5") // the auth service attenuates its discharge
    .unwrap()
    .build();

    println!("   ✓ Auth service issues discharge macaroon with caveat: auth_level >= 5");

    // Step 4: Client binds the discharge to the primary macaroon
    println!("\n4. Client binds discharge to primary macaroon...");
    let bound = primary.extend().bind(&discharge).build();
    println!("   ✓ Discharge bound (signatures cryptographically linked)");

    // Step 5: Service verifies the pair
    println!("\n5. Service verifies both macaroons...");
    let valid = Verifier::new(&primary)
        .satisfy_exact("resource = /api/documents")
        .satisfy_general(PredicateVerifier::new("auth_level", 10i64))
        .satisfy_discharge(bound.clone())
        .is_valid(&root_key);
    match valid {
        true => println!("   ✓ Verification successful! Access granted."),
        false => println!("   ✗ Verification failed"),
    }

    // Step 6: Insufficient auth level fails
    println!("\n6. Testing with insufficient auth level...");
    let valid = Verifier::new(&primary)
        .satisfy_exact("resource = /api/documents")
        .satisfy_general(PredicateVerifier::new("auth_level", 3i64)) // need >= 5
        .satisfy_discharge(bound)
        .is_valid(&root_key);
    match valid {
        true => println!("   ✗ Unexpectedly succeeded!"),
        false => println!("   ✓ Correctly failed"),
    }

    // Step 7: Multiple third-party caveats
    println!("\n7. Testing multiple third-party caveats...");

    let payment_key = SecretKey::generate();
    let multi = Macaroon::builder(&root_key, "premium-session", None::<String>)
        .require_third_party("https://auth.service.com", &auth_key, "user_authenticated")
        .unwrap()
        .require_third_party(
            "https://payments.service.com",
            &payment_key,
            "payment_verified",
        )
        .unwrap()
        .build();

    let auth_discharge =
        Macaroon::builder(&auth_key, "user_authenticated", None::<String>).build();
    let payment_discharge =
        Macaroon::builder(&payment_key, "payment_verified", None::<String>).build();

    let bound_auth = multi.extend().bind(&auth_discharge).build();
    let bound_payment = multi.extend().bind(&payment_discharge).build();

    println!("   Created macaroon set: 1 primary + 2 bound discharges");

    let valid = Verifier::new(&multi)
        .satisfy_discharge(bound_auth)
        .satisfy_discharge(bound_payment)
        .is_valid(&root_key);
    match valid {
        true => println!("   ✓ All third-party caveats satisfied!"),
        false => println!("   ✗ Verification failed"),
    }

    println!("\n=== Example Complete ===");
}
