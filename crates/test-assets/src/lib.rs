// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use serde_json::{json, Value};

/// Assert something is true while sleeping and retrying
///
/// This macro creates a loop that keeps retrying the expression
/// by default every 50 milliseconds.
/// In case, the assertion is not true after the timeout period
/// (default to 1 second), this macro panics
#[macro_export]
macro_rules! assert_while_retry {
    ($assertion:expr) => {
        assert_while_retry!(
            $assertion,
            "Assertion was not true while retrying every 50 milliseconds up to 1 second.",
            std::time::Duration::from_secs(1),
            std::time::Duration::from_millis(50)
        );
    };
    ($assertion:expr, $msg:expr, $timeout:expr, $sleep:expr) => {
        if tokio::time::timeout($timeout, async {
            loop {
                if $assertion {
                    tokio::time::sleep($sleep).await;
                } else {
                    break;
                }
            }
        })
        .await
        .is_err()
        {
            panic!($msg);
        }
    };
}

pub const NOTIFICATION_ID_REVIEW: &str = "4a3c9f1e-review";
pub const NOTIFICATION_ID_APPROVED: &str = "7b21d0aa-approved";
pub const NOTIFICATION_ID_REMINDER: &str = "c90e5512-reminder";

/// Body of `GET /notifications-list` with two unread records out of three,
/// newest first.
pub const NOTIFICATIONS_LIST_RESPONSE: &str = r#"
    {
        "notifications": [
            {
                "id": "4a3c9f1e-review",
                "type": "review_requested",
                "title": "Review requested",
                "message": "Golden visa application GV-2291 is waiting for your review",
                "is_read": false,
                "created_at": "2026-10-18T09:15:00Z",
                "metadata": {
                    "application_id": "GV-2291",
                    "submitter_name": "Operations Desk"
                }
            },
            {
                "id": "7b21d0aa-approved",
                "type": "application_approved",
                "title": "Application approved",
                "message": "Company services application CS-118 was approved",
                "is_read": false,
                "created_at": "2026-10-17T16:40:12Z",
                "metadata": {}
            },
            {
                "id": "c90e5512-reminder",
                "type": "follow_up_reminder",
                "title": "Follow-up due",
                "message": "Taxation follow-up TX-77 is due today",
                "is_read": true,
                "created_at": "2026-10-16T08:00:00Z"
            }
        ],
        "unread_count": 2
    }
"#;

/// A list body in which every record is unread and the kind is one this
/// client does not know about.
pub fn single_unknown_kind_response() -> Value {
    json!({
        "notifications": [
            {
                "id": "e11f-unknown",
                "type": "invoice_escalated",
                "title": "Invoice escalated",
                "message": "Invoice INV-3302 needs attention",
                "is_read": false,
                "created_at": "2026-10-18T11:00:00+04:00",
                "metadata": { "invoice": "INV-3302" }
            }
        ],
        "unread_count": 1
    })
}

/// Parsed form of [`NOTIFICATIONS_LIST_RESPONSE`].
pub fn notifications_list_response() -> Value {
    serde_json::from_str(NOTIFICATIONS_LIST_RESPONSE).expect("fixture is valid JSON")
}

pub fn empty_list_response() -> Value {
    json!({ "notifications": [], "unread_count": 0 })
}
