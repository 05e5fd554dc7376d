//! Property-based tests for refresh rotation
//!
//! These tests verify:
//! - Every token in a rotation chain works exactly once
//! - Refresh tokens are never accepted as access tokens and vice versa
//! - Arbitrary refresh-token strings are rejected without panicking

mod common;

use common::Harness;
use proptest::prelude::*;
use warden_auth_core::{AuthError, TokenClass};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Generate junk that looks more or less like a JWT
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_-]{0,60}",
        "[a-zA-Z0-9_-]{1,30}\\.[a-zA-Z0-9_-]{1,30}\\.[a-zA-Z0-9_-]{1,30}",
        "eyJ[a-zA-Z0-9_-]{10,40}\\.eyJ[a-zA-Z0-9_-]{10,40}\\.[a-zA-Z0-9_-]{0,40}",
        Just("..".to_string()),
        Just(".".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn rotation_chain_is_single_use(steps in 1usize..6) {
        let rt = runtime();
        rt.block_on(async {
            let h = Harness::new();
            let mut used = Vec::new();
            let mut current = h.core.register("chain@example.com", "pw123").await.unwrap();

            for _ in 0..steps {
                let next = h.core.refresh_with_token(&current.refresh_token).await.unwrap();
                used.push(current.refresh_token);
                current = next;
            }

            for token in &used {
                let result = h.core.refresh_with_token(token).await;
                assert!(matches!(result, Err(AuthError::RefreshRejected(_))));
            }
            h.core.refresh_with_token(&current.refresh_token).await.unwrap();
        });
    }

    #[test]
    fn token_classes_never_cross(email in "[a-z]{1,12}@[a-z]{1,8}\\.(com|org|net)") {
        let rt = runtime();
        rt.block_on(async {
            let h = Harness::new();
            let pair = h.core.register(&email, "pw123").await.unwrap();
            assert!(h.issuer().verify(&pair.access_token, TokenClass::Refresh).is_err());
            assert!(h.issuer().verify(&pair.refresh_token, TokenClass::Access).is_err());
        });
    }

    #[test]
    fn arbitrary_refresh_tokens_rejected(token in arb_token()) {
        let rt = runtime();
        let result = rt.block_on(async {
            let h = Harness::new();
            h.core.register("victim@example.com", "pw123").await.unwrap();
            h.core.refresh_with_token(&token).await
        });
        prop_assert!(result.is_err());
    }
}
