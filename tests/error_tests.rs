// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use crucible_tracker::error::AppError;

#[test]
fn test_soft_failures_are_network_errors() {
    assert!(AppError::Transport("timed out".to_string()).is_soft_failure());
    assert!(AppError::upstream_status(503, "maintenance").is_soft_failure());
    assert!(AppError::upstream_code(5, "SystemDisabled").is_soft_failure());
}

#[test]
fn test_local_errors_are_not_soft() {
    assert!(!AppError::CacheUnavailable("disabled".to_string()).is_soft_failure());
    assert!(!AppError::BadRequest("bad".to_string()).is_soft_failure());
    assert!(!AppError::NotFound("nobody".to_string()).is_soft_failure());
    assert!(!AppError::Internal(anyhow::anyhow!("boom")).is_soft_failure());
}

#[test]
fn test_upstream_constructors() {
    match AppError::upstream_status(404, "missing") {
        AppError::Upstream { status, code, message } => {
            assert_eq!(status, Some(404));
            assert_eq!(code, None);
            assert_eq!(message, "missing");
        }
        other => panic!("unexpected {:?}", other),
    }

    let err = AppError::upstream_code(1665, "DestinyPrivacyRestriction");
    assert!(matches!(err, AppError::Upstream { code: Some(1665), status: None, .. }));
    assert_eq!(err.to_string(), "Bungie API error: DestinyPrivacyRestriction");
}

#[test]
fn test_status_mapping() {
    let cases = [
        (AppError::Transport("reset".to_string()), StatusCode::BAD_GATEWAY),
        (AppError::upstream_status(500, "oops"), StatusCode::BAD_GATEWAY),
        (
            AppError::CacheUnavailable("opening".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (AppError::Unresolved("two".to_string()), StatusCode::CONFLICT),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        (
            AppError::Internal(anyhow::anyhow!("boom")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.into_response().status(), expected);
    }
}
