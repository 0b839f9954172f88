//! Tests for the interaction, consent, release and validation flow.

mod utils;

use assert_let_bind::assert_let;
use credibil_claims::consent::Group;
use credibil_claims::endpoint;
use credibil_claims::resolved::{Ial, Resolved, UnresolvedKind};
use credibil_claims::types::{
    ConsentRequest, InteractionRequest, ReleaseRequest, ValidationRequest,
};
use credibil_claims::Error;
use insta::assert_json_snapshot;
use rstest::rstest;
use serde_json::{Value, json};
use test_utils::{CLIENT_ID, NORMAL_USER, ProviderImpl};
use utils::provider;

fn claims_request() -> Value {
    json!({
        "id_token": {
            "email": {"ial": 2},
            "address": null
        },
        "userinfo": {
            "phone_number": null,
            "given_name": {"essential": true},
            "assertion_claims": {
                "total_balance": {
                    "assertion": {"amount": {"$gt": "999.00"}, "currency": {"$eq": "GBP"}}
                },
                "family_name": {"assertion": {"$nope": "Doe"}},
                "email": {"assertion": {"$eq": "jane.doe@example.com"}}
            }
        }
    })
}

fn interaction_request() -> InteractionRequest {
    InteractionRequest {
        client_id: CLIENT_ID.into(),
        user_id: NORMAL_USER.into(),
        claims: Some(claims_request()),
        scope: "openid profile".into(),
    }
}

fn consent_request(decision: Value) -> ConsentRequest {
    ConsentRequest {
        client_id: CLIENT_ID.into(),
        user_id: NORMAL_USER.into(),
        decision,
    }
}

fn release_request(group: Group) -> ReleaseRequest {
    ReleaseRequest {
        client_id: CLIENT_ID.into(),
        user_id: NORMAL_USER.into(),
        group,
    }
}

fn decision() -> Value {
    json!({
        "id_token": {"claims": {"email": 0}},
        "userinfo": {
            "claims": {"phone_number": 2, "given_name": -1},
            "assertions": {"total_balance": 0, "family_name": 0}
        },
        "approved_scopes": ["openid"]
    })
}

// Run the interaction and consent steps.
async fn accept(provider: &ProviderImpl) {
    endpoint::handle(interaction_request(), provider).await.expect("should start interaction");
    endpoint::handle(consent_request(decision()), provider).await.expect("should accept");
}

#[rstest]
#[tokio::test]
async fn interaction(provider: ProviderImpl) {
    utils::init_tracer();

    let response =
        endpoint::handle(interaction_request(), &provider).await.expect("should start interaction");

    assert_eq!(response.consent_id, format!("{NORMAL_USER}$${CLIENT_ID}"));
    assert_eq!(response.scopes, vec!["openid", "profile"]);

    // unsupported claims are dropped
    let claims = response.claims;
    assert!(!claims.id_token.claims.contains_key("address"));
    assert!(!claims.userinfo.assertion_claims.contains_key("email"));

    // only values meeting the requested level are kept
    assert_let!(Some(email), &claims.id_token.claims["email"].outcome);
    assert_eq!(email.resolved, vec![Resolved::new("jane.doe@example.com", Ial::TWO)]);

    // values from every resolver, in registration order
    assert_let!(Some(phone), &claims.userinfo.claims["phone_number"].outcome);
    let numbers: Vec<_> = phone.resolved.iter().map(|r| r.value.clone()).collect();
    assert_eq!(numbers, vec!["+447700900123", "07700 900456", "+447700900789"]);

    assert_let!(Some(balance), &claims.userinfo.assertion_claims["total_balance"].outcome);
    assert_eq!(balance.resolved.len(), 1);

    assert_let!(Some(family_name), &claims.userinfo.assertion_claims["family_name"].outcome);
    assert!(family_name.resolved.is_empty());
    assert!(family_name.has_unresolved(UnresolvedKind::UnknownOperator));
}

#[rstest]
#[tokio::test]
async fn no_claims_requested(provider: ProviderImpl) {
    utils::init_tracer();

    let request = InteractionRequest {
        claims: None,
        ..interaction_request()
    };
    let response = endpoint::handle(request, &provider).await.expect("should start interaction");
    assert!(response.claims.id_token.claims.is_empty());
    assert!(response.claims.userinfo.claims.is_empty());

    // nothing to select, but a decision can still be recorded
    let decision = json!({"approved_scopes": ["openid"]});
    let response =
        endpoint::handle(consent_request(decision), &provider).await.expect("should accept");
    assert_eq!(response.approved_scopes, vec!["openid"]);

    let response =
        endpoint::handle(release_request(Group::IdToken), &provider).await.expect("should release");
    assert_eq!(response.claims, json!({"sub": NORMAL_USER}));
}

#[rstest]
#[tokio::test]
async fn consent_and_release(provider: ProviderImpl) {
    utils::init_tracer();

    endpoint::handle(interaction_request(), &provider).await.expect("should start interaction");

    let response =
        endpoint::handle(consent_request(decision()), &provider).await.expect("should accept");
    assert_eq!(response.consent_id, format!("{NORMAL_USER}$${CLIENT_ID}"));
    assert_eq!(response.approved_scopes, vec!["openid"]);

    let response =
        endpoint::handle(release_request(Group::IdToken), &provider).await.expect("should release");
    assert_eq!(response.claims, json!({"sub": NORMAL_USER, "email": "jane.doe@example.com"}));

    let response =
        endpoint::handle(release_request(Group::Userinfo), &provider).await.expect("should release");
    assert_json_snapshot!(response.claims, @r#"
    {
      "assertion_claims": {
        "family_name": {
          "error": "unknown_operator",
          "result": null
        },
        "total_balance": {
          "result": true
        }
      },
      "phone_number": "+447700900789",
      "sub": "normal_user"
    }
    "#);
}

// The legacy decision format selects the first value of each named claim.
#[rstest]
#[tokio::test]
async fn legacy_decision(provider: ProviderImpl) {
    utils::init_tracer();

    endpoint::handle(interaction_request(), &provider).await.expect("should start interaction");

    let decision = json!({
        "id_token": {"approved_claims": ["email"]},
        "userinfo": {"approved_claims": ["phone_number"], "approved_assertions": ["total_balance"]},
        "approved_scopes": ["openid", "profile"]
    });
    endpoint::handle(consent_request(decision), &provider).await.expect("should accept");

    let response =
        endpoint::handle(release_request(Group::Userinfo), &provider).await.expect("should release");
    assert_eq!(
        response.claims,
        json!({
            "sub": NORMAL_USER,
            "phone_number": "+447700900123",
            "assertion_claims": {"total_balance": {"result": true}}
        })
    );
}

// A new interaction replaces an accepted consent.
#[rstest]
#[tokio::test]
async fn interaction_restarts(provider: ProviderImpl) {
    utils::init_tracer();

    accept(&provider).await;
    endpoint::handle(interaction_request(), &provider).await.expect("should start interaction");

    let Err(err) = endpoint::handle(release_request(Group::IdToken), &provider).await else {
        panic!("should not release before consent");
    };
    assert_eq!(err.status(), 409);

    endpoint::handle(consent_request(decision()), &provider).await.expect("should accept");
}

#[rstest]
#[tokio::test]
async fn consent_before_interaction(provider: ProviderImpl) {
    utils::init_tracer();

    let Err(err) = endpoint::handle(consent_request(decision()), &provider).await else {
        panic!("should fail");
    };
    assert_eq!(err.status(), 409);
    assert_eq!(
        err.to_json(),
        json!({
            "error": "illegal_state",
            "error_description": "consent cannot be resolved before request"
        })
    );
}

#[rstest]
#[tokio::test]
async fn accept_twice(provider: ProviderImpl) {
    utils::init_tracer();

    accept(&provider).await;

    let Err(err) = endpoint::handle(consent_request(decision()), &provider).await else {
        panic!("should fail");
    };
    assert_let!(Error::IllegalState(description), err);
    assert_eq!(description, "consent has already been accepted");
}

#[rstest]
#[tokio::test]
async fn release_without_consent(provider: ProviderImpl) {
    utils::init_tracer();

    let Err(err) = endpoint::handle(release_request(Group::Userinfo), &provider).await else {
        panic!("should fail");
    };
    assert_eq!(err.to_json()["error_description"], "no consent found");
}

#[rstest]
#[case::index_out_of_range(
    json!({"id_token": {"claims": {"email": 1}}, "approved_scopes": []}),
    "index 1 is not valid for email claim at id_token"
)]
#[case::not_requested(
    json!({"id_token": {"claims": {"address": 0}}, "approved_scopes": []}),
    "address could not be accepted as it has not been requested at id_token"
)]
#[case::negative_index(
    json!({"userinfo": {"claims": {"phone_number": -2}}, "approved_scopes": []}),
    "index -2 is not valid for phone_number claim at userinfo"
)]
#[case::not_an_object(json!(["email"]), "decision must be an object")]
#[case::missing_scopes(json!({"id_token": {}}), "approved_scopes must be an array of strings")]
#[tokio::test]
async fn invalid_decision(provider: ProviderImpl, #[case] decision: Value, #[case] description: &str) {
    utils::init_tracer();

    endpoint::handle(interaction_request(), &provider).await.expect("should start interaction");

    let Err(err) = endpoint::handle(consent_request(decision), &provider).await else {
        panic!("should fail");
    };
    assert_eq!(err.status(), 400);
    assert_eq!(err.to_json()["error_description"], description);

    // the consent is still awaiting a decision
    endpoint::handle(consent_request(self::decision()), &provider).await.expect("should accept");
}

#[rstest]
#[tokio::test]
async fn malformed_claims(provider: ProviderImpl) {
    utils::init_tracer();

    let request = InteractionRequest {
        claims: Some(json!({"userinfo": {"email": {"ial": 5}}})),
        ..interaction_request()
    };
    let Err(err) = endpoint::handle(request, &provider).await else {
        panic!("should fail");
    };
    assert_eq!(err.status(), 400);
    assert_eq!(err.to_json()["error_description"], "ial should be 1, 2 or 3");
}

#[rstest]
#[case::no_client(InteractionRequest { client_id: String::new(), ..interaction_request() }, "no `client_id` specified")]
#[case::no_user(InteractionRequest { user_id: String::new(), ..interaction_request() }, "no `user_id` specified")]
#[tokio::test]
async fn missing_parties(
    provider: ProviderImpl, #[case] request: InteractionRequest, #[case] description: &str,
) {
    utils::init_tracer();

    let Err(err) = endpoint::handle(request, &provider).await else {
        panic!("should fail");
    };
    assert_eq!(err.to_json()["error_description"], description);
}

#[rstest]
#[tokio::test]
async fn validation(provider: ProviderImpl) {
    utils::init_tracer();

    let request = ValidationRequest {
        client_id: CLIENT_ID.into(),
        claims: json!({
            "id_token": {
                "assertion_claims": {"total_balance": {"assertion": 5}}
            },
            "userinfo": {
                "email": null,
                "assertion_claims": {
                    "email": {"assertion": {"$eq": "jane.doe@example.com"}},
                    "family_name": {"assertion": {"$nope": "Doe"}},
                    "given_name": {"assertion": {"$eq": "Jane"}}
                }
            }
        }),
    };
    let response = endpoint::handle(request, &provider).await.expect("should validate");

    let mut errors: Vec<_> = response
        .errors
        .into_iter()
        .map(|e| (e.group, e.key, e.description))
        .collect();
    errors.sort();

    assert_eq!(
        errors,
        vec![
            (
                "id_token.assertion_claims".to_string(),
                "total_balance".to_string(),
                "expression should be an object".to_string()
            ),
            (
                "userinfo.assertion_claims".to_string(),
                "email".to_string(),
                "assertions not supported on this claim".to_string()
            ),
            (
                "userinfo.assertion_claims".to_string(),
                "family_name".to_string(),
                "unknown operator: $nope".to_string()
            ),
        ]
    );
}

#[rstest]
#[case::null(json!(null), Ok(0))]
#[case::no_assertions(json!({"userinfo": {"email": null}}), Ok(0))]
#[case::not_an_object(json!("email"), Err("claims should be an object"))]
#[tokio::test]
async fn validation_shapes(
    provider: ProviderImpl, #[case] claims: Value, #[case] expected: Result<usize, &str>,
) {
    utils::init_tracer();

    let request = ValidationRequest {
        client_id: CLIENT_ID.into(),
        claims,
    };
    let result = endpoint::handle(request, &provider).await;

    match expected {
        Ok(count) => assert_eq!(result.expect("should validate").errors.len(), count),
        Err(description) => {
            let err = result.expect_err("should fail");
            assert_eq!(err.to_json()["error_description"], description);
        }
    }
}
