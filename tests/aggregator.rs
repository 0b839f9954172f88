//! Tests for aggregating claims across resolvers.

mod utils;

use std::sync::Arc;
use std::time::Duration;

use assert_let_bind::assert_let;
use credibil_claims::aggregator::{Aggregator, ClaimRequest, Resolver};
use credibil_claims::resolved::{Claim, Ial, Resolved, UnresolvedKind};
use test_utils::{FailingResolver, NORMAL_USER, StaticResolver, UNKNOWN_USER};

fn aggregator(resolvers: Vec<Arc<dyn Resolver>>) -> Aggregator {
    Aggregator::new(resolvers).expect("should build aggregator")
}

// Only resolvers able to provide a claim at the requested level are called.
#[tokio::test]
async fn routes_by_assurance() {
    utils::init_tracer();

    let a = StaticResolver::new("a", [("key1", 2), ("key2", 2)])
        .with_value(NORMAL_USER, "key1", "a1", Ial::TWO)
        .with_value(NORMAL_USER, "key2", "a2", Ial::TWO);
    let b = StaticResolver::new("b", [("key1", 3), ("key3", 2)])
        .with_value(NORMAL_USER, "key1", "b1", Ial::THREE);
    let aggregator = aggregator(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

    let request = ClaimRequest::new().with("key1", Ial::THREE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert!(a.calls().is_empty());
    assert_eq!(b.calls(), vec![request]);

    assert_let!(Some(claim), response.get("key1"));
    assert_eq!(claim, &Claim::from_resolved(vec![Resolved::new("b1", Ial::THREE)]));
    assert_eq!(response.len(), 1);
}

// Each resolver is called once, with only the claims it can provide.
#[tokio::test]
async fn one_call_per_resolver() {
    utils::init_tracer();

    let a = StaticResolver::new("a", [("key1", 2), ("key2", 2)])
        .with_value(NORMAL_USER, "key1", "a1", Ial::TWO)
        .with_value(NORMAL_USER, "key2", "a2", Ial::TWO);
    let b = StaticResolver::new("b", [("key1", 3), ("key3", 2)])
        .with_value(NORMAL_USER, "key1", "b1", Ial::THREE)
        .with_value(NORMAL_USER, "key3", "b3", Ial::TWO);
    let aggregator = aggregator(vec![Arc::new(a.clone()), Arc::new(b.clone())]);

    let request =
        ClaimRequest::new().with("key1", Ial::ONE).with("key2", Ial::TWO).with("key3", Ial::ONE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert_eq!(a.calls(), vec![ClaimRequest::new().with("key1", Ial::ONE).with("key2", Ial::TWO)]);
    assert_eq!(b.calls(), vec![ClaimRequest::new().with("key1", Ial::ONE).with("key3", Ial::ONE)]);

    // values from both resolvers are kept, in registration order
    assert_let!(Some(key1), response.get("key1"));
    assert_eq!(key1.resolved, vec![Resolved::new("a1", Ial::TWO), Resolved::new("b1", Ial::THREE)]);
    assert_eq!(response.names().collect::<Vec<_>>(), vec!["key1", "key2", "key3"]);
}

#[tokio::test]
async fn unsupported_claims_not_found() {
    utils::init_tracer();

    let a = StaticResolver::new("a", [("key1", 1)]);
    let aggregator = aggregator(vec![Arc::new(a.clone())]);

    let request = ClaimRequest::new().with("key1", Ial::TWO).with("key9", Ial::ONE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert!(a.calls().is_empty());
    assert_eq!(response.get("key1"), Some(&Claim::not_found()));
    assert_eq!(response.get("key9"), Some(&Claim::not_found()));
}

// A failing resolver only affects the claims it was asked for.
#[tokio::test]
async fn failure_is_isolated() {
    utils::init_tracer();

    let failing = FailingResolver::new([("key1", 3), ("key2", 3)]);
    let working = StaticResolver::new("working", [("key1", 3), ("key3", 3)])
        .with_value(NORMAL_USER, "key1", "w1", Ial::THREE)
        .with_value(NORMAL_USER, "key3", "w3", Ial::THREE);
    let aggregator = aggregator(vec![Arc::new(failing.clone()), Arc::new(working)]);

    let request =
        ClaimRequest::new().with("key1", Ial::ONE).with("key2", Ial::ONE).with("key3", Ial::ONE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert_eq!(failing.calls().len(), 1);
    assert_eq!(response.get("key2"), Some(&Claim::internal_error()));
    assert_eq!(
        response.get("key3"),
        Some(&Claim::from_resolved(vec![Resolved::new("w3", Ial::THREE)]))
    );

    assert_let!(Some(key1), response.get("key1"));
    assert_eq!(key1.resolved, vec![Resolved::new("w1", Ial::THREE)]);
    assert!(key1.has_unresolved(UnresolvedKind::InternalError));
}

// Responses are merged in registration order, not completion order.
#[tokio::test]
async fn merge_in_registration_order() {
    utils::init_tracer();

    let slow = StaticResolver::new("slow", [("email", 2)])
        .with_value(NORMAL_USER, "email", "slow@example.com", Ial::TWO)
        .with_delay(Duration::from_millis(50));
    let fast = StaticResolver::new("fast", [("email", 2)])
        .with_value(NORMAL_USER, "email", "fast@example.com", Ial::TWO);
    let aggregator = aggregator(vec![Arc::new(slow), Arc::new(fast)]);

    let request = ClaimRequest::new().with("email", Ial::ONE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert_let!(Some(email), response.get("email"));
    let values: Vec<_> = email.resolved.iter().map(|r| r.value.clone()).collect();
    assert_eq!(values, vec!["slow@example.com", "fast@example.com"]);
}

// Claims a resolver was not asked for are ignored; claims it leaves out are
// not found.
#[tokio::test]
async fn narrows_responses() {
    utils::init_tracer();

    let verbatim = StaticResolver::new("verbatim", [("key1", 1), ("key2", 1)])
        .with_value(NORMAL_USER, "key2", "v2", Ial::ONE)
        .with_value(NORMAL_USER, "key3", "v3", Ial::ONE)
        .verbatim();
    let aggregator = aggregator(vec![Arc::new(verbatim)]);

    let request = ClaimRequest::new().with("key1", Ial::ONE).with("key2", Ial::ONE);
    let response = aggregator.resolve(NORMAL_USER, &request).await.expect("should resolve");

    assert_eq!(response.names().collect::<Vec<_>>(), vec!["key1", "key2"]);
    assert_eq!(response.get("key1"), Some(&Claim::not_found()));
    assert_eq!(response.get("key2"), Some(&Claim::from_resolved(vec![Resolved::new("v2", Ial::ONE)])));
}

#[tokio::test]
async fn unknown_subject() {
    utils::init_tracer();

    let aggregator = aggregator(
        test_utils::resolvers::fixtures()
            .into_iter()
            .map(|r| Arc::new(r) as Arc<dyn Resolver>)
            .collect(),
    );
    let request = ClaimRequest::new().with("email", Ial::ONE);
    let response = aggregator.resolve(UNKNOWN_USER, &request).await.expect("should resolve");

    // one marker per resolver asked
    assert_let!(Some(email), response.get("email"));
    assert!(email.resolved.is_empty());
    assert_eq!(email.unresolved.len(), 2);
}

#[tokio::test]
async fn invalid_request() {
    utils::init_tracer();

    let a = StaticResolver::new("a", [("key1", 1)]);
    let aggregator = aggregator(vec![Arc::new(a.clone())]);

    let request = ClaimRequest::new().with("key1", Ial::ONE);
    let err = aggregator.resolve("", &request).await.expect_err("should fail");
    assert_eq!(err.to_json()["error_description"], "no `subject_id` specified");

    let request = ClaimRequest::new().with("", Ial::ONE);
    let err = aggregator.resolve(NORMAL_USER, &request).await.expect_err("should fail");
    assert_eq!(err.status(), 400);

    assert!(a.calls().is_empty());
}

#[test]
fn claims_supported() {
    let aggregator = aggregator(
        test_utils::resolvers::fixtures()
            .into_iter()
            .map(|r| Arc::new(r) as Arc<dyn Resolver>)
            .collect(),
    );
    let supported = aggregator.claims_supported();

    assert_eq!(supported.get("email"), Some(&Ial::TWO));
    assert_eq!(supported.get("total_balance"), Some(&Ial::THREE));
    assert_eq!(supported.get("address"), None);
}
