//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use domain::notification::OutboundDispatcher;
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

/// Identity headers for one simulated caller.
#[derive(Clone)]
struct Who {
    user_id: UserId,
    role: &'static str,
    organization: Option<&'static str>,
}

impl Who {
    fn user() -> Self {
        Self {
            user_id: UserId::new(),
            role: "user",
            organization: None,
        }
    }

    fn operation() -> Self {
        Self {
            user_id: UserId::new(),
            role: "operation",
            organization: None,
        }
    }

    fn organization(name: &'static str) -> Self {
        Self {
            organization: Some(name),
            ..Self::operation()
        }
    }
}

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let state = Arc::new(AppState::new(
            InMemoryEventStore::new(),
            OutboundDispatcher::in_memory(),
            5,
        ));
        Self {
            router: api::create_app(state, get_metrics_handle()),
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        who: Option<&Who>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(who) = who {
            builder = builder
                .header("x-user-id", who.user_id.to_string())
                .header("x-user-role", who.role)
                .header("x-user-name", "Mona Adel")
                .header("x-user-email", "mona@example.com")
                .header("x-user-phone", "01012345678");
            if let Some(org) = who.organization {
                builder = builder.header("x-organization-id", org);
            }
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn product(&self, name: &str, price: i64, stock: u32) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/products",
                Some(&Who::operation()),
                Some(json!({
                    "name": name,
                    "price": price,
                    "purchase_price": price / 2,
                    "stock_qty": stock,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["product_id"].as_str().unwrap().to_string()
    }

    async fn stock(&self, product_id: &str) -> u64 {
        let (_, body) = self
            .call("GET", &format!("/products/{product_id}"), None, None)
            .await;
        body["stock_qty"].as_u64().unwrap()
    }

    async fn add_to_cart(&self, who: &Who, product_id: &str, quantity: u32) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/cart/items",
            Some(who),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }
}

fn order_body() -> Value {
    json!({
        "address": {
            "first_name": "Mona",
            "last_name": "Adel",
            "phone_number": "01012345678",
            "address": "12 Nile St",
            "city": "Cairo"
        },
        "delivery_price": 500,
        "payment": { "channel": "Online", "wallet": "InstaPay" }
    })
}

mod platform {
    use super::*;

    #[tokio::test]
    async fn health_check() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let app = TestApp::new();
        app.call("GET", "/health", None, None).await;

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/cart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "unauthenticated");
    }

    #[tokio::test]
    async fn malformed_ids_are_bad_requests() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/products/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_input");
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn cart_to_order_reserves_stock_and_records_payment() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let b = app.product("Product B", 2000, 5).await;
        let alice = Who::user();
        app.add_to_cart(&alice, &a, 2).await;
        let (_, cart) = app.add_to_cart(&alice, &b, 1).await;
        assert_eq!(cart["total_quantity"], 3);
        assert_eq!(cart["total_price"], 4000);

        let (status, order) = app
            .call("POST", "/orders", Some(&alice), Some(order_body()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "UnderReview");
        assert_eq!(order["payment"]["total_price"], 4500);
        assert_eq!(order["payment"]["status"], "Deposit");
        assert_eq!(app.stock(&a).await, 8);
        assert_eq!(app.stock(&b).await, 4);

        let (_, cart) = app.call("GET", "/cart", Some(&alice), None).await;
        assert!(cart.is_null());
    }

    #[tokio::test]
    async fn insufficient_stock_is_a_conflict() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 1).await;
        let alice = Who::user();
        app.add_to_cart(&alice, &a, 3).await;

        let (status, body) = app
            .call("POST", "/orders", Some(&alice), Some(order_body()))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "insufficient_stock");
        assert_eq!(app.stock(&a).await, 1);
    }

    #[tokio::test]
    async fn no_cart_is_not_found() {
        let app = TestApp::new();
        let (status, body) = app
            .call("POST", "/orders", Some(&Who::user()), Some(order_body()))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }

    #[tokio::test]
    async fn cancellation_restocks_once() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let alice = Who::user();
        app.add_to_cart(&alice, &a, 4).await;
        let (_, order) = app
            .call("POST", "/orders", Some(&alice), Some(order_body()))
            .await;
        let number = order["order_number"].as_str().unwrap().to_string();
        let ops = Who::operation();

        let uri = format!("/orders/{number}/status");
        let cancel = json!({ "status": "Cancelled" });
        let (status, order) = app.call("PUT", &uri, Some(&ops), Some(cancel.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["payment"]["status"], "Cancelled");
        assert_eq!(app.stock(&a).await, 10);

        let (status, body) = app.call("PUT", &uri, Some(&ops), Some(cancel)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "invalid_state_transition");
        assert_eq!(app.stock(&a).await, 10);
    }

    #[tokio::test]
    async fn requesters_cannot_change_status_or_read_foreign_orders() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let alice = Who::user();
        app.add_to_cart(&alice, &a, 1).await;
        let (_, order) = app
            .call("POST", "/orders", Some(&alice), Some(order_body()))
            .await;
        let number = order["order_number"].as_str().unwrap().to_string();

        let (status, _) = app
            .call(
                "PUT",
                &format!("/orders/{number}/status"),
                Some(&alice),
                Some(json!({ "status": "Processing" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call("GET", &format!("/orders/{number}"), Some(&Who::user()), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listing_is_scoped_by_role() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let alice = Who::user();
        let bob = Who::user();
        for who in [&alice, &bob] {
            app.add_to_cart(who, &a, 1).await;
            app.call("POST", "/orders", Some(who), Some(order_body()))
                .await;
        }

        let (_, mine) = app.call("GET", "/orders", Some(&alice), None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (_, all) = app
            .call("GET", "/orders", Some(&Who::operation()), None)
            .await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        let (_, cancelled) = app
            .call("GET", "/orders?status=Cancelled", Some(&Who::operation()), None)
            .await;
        assert!(cancelled.as_array().unwrap().is_empty());
    }
}

mod inquiries {
    use super::*;

    #[tokio::test]
    async fn losing_organization_sees_no_contact_or_rival_replies() {
        let app = TestApp::new();
        let requester = Who::user();
        let org_a = Who::organization("org-a");
        let org_b = Who::organization("org-b");

        let (status, inquiry) = app
            .call(
                "POST",
                "/inquiries",
                Some(&requester),
                Some(json!({ "description": "Need 40 office chairs" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(inquiry["contact"]["email"], "mona@example.com");
        let id = inquiry["id"].as_str().unwrap().to_string();

        let replies = format!("/inquiries/{id}/replies");
        let (_, reply_a) = app
            .call("POST", &replies, Some(&org_a), Some(json!({ "text": "2000 total" })))
            .await;
        app.call("POST", &replies, Some(&org_b), Some(json!({ "text": "1900 total" })))
            .await;
        let (status, body) = app
            .call("POST", &replies, Some(&org_a), Some(json!({ "text": "again" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "conflict");

        let reply_id = reply_a["id"].as_str().unwrap();
        let (status, accepted) = app
            .call(
                "POST",
                &format!("/inquiries/{id}/replies/{reply_id}/accept"),
                Some(&requester),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "accepted");

        let (_, seen_by_b) = app
            .call("GET", &format!("/inquiries/{id}"), Some(&org_b), None)
            .await;
        assert!(seen_by_b["contact"].is_null());
        assert!(seen_by_b["requester"].is_null());
        let replies = seen_by_b["replies"].as_array().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["organization_id"], "org-b");

        let (_, seen_by_a) = app
            .call("GET", &format!("/inquiries/{id}"), Some(&org_a), None)
            .await;
        assert_eq!(seen_by_a["contact"]["name"], "Mona Adel");
    }

    #[tokio::test]
    async fn ended_inquiry_refuses_replies() {
        let app = TestApp::new();
        let requester = Who::user();
        let (_, inquiry) = app
            .call(
                "POST",
                "/inquiries",
                Some(&requester),
                Some(json!({ "description": "Printer paper" })),
            )
            .await;
        let id = inquiry["id"].as_str().unwrap().to_string();
        let (_, reply) = app
            .call(
                "POST",
                &format!("/inquiries/{id}/replies"),
                Some(&Who::organization("org-a")),
                Some(json!({ "text": "500 reams" })),
            )
            .await;
        let reply_id = reply["id"].as_str().unwrap();
        app.call(
            "POST",
            &format!("/inquiries/{id}/replies/{reply_id}/accept"),
            Some(&requester),
            None,
        )
        .await;

        let (status, ended) = app
            .call("POST", &format!("/inquiries/{id}/end"), Some(&requester), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ended["status"], "ended");

        let (status, body) = app
            .call(
                "POST",
                &format!("/inquiries/{id}/replies"),
                Some(&Who::organization("org-b")),
                Some(json!({ "text": "late" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "invalid_state_transition");
    }

    #[tokio::test]
    async fn too_many_attachments_is_invalid_input() {
        let app = TestApp::new();
        let media: Vec<String> = (0..6).map(|i| format!("uploads/{i}.jpg")).collect();
        let (status, body) = app
            .call(
                "POST",
                "/inquiries",
                Some(&Who::user()),
                Some(json!({ "description": "Desks", "media": media })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn listing_is_scoped_per_caller() {
        let app = TestApp::new();
        let requester = Who::user();
        app.call(
            "POST",
            "/inquiries",
            Some(&requester),
            Some(json!({ "description": "Need 40 office chairs" })),
        )
        .await;

        let (_, own) = app.call("GET", "/inquiries", Some(&requester), None).await;
        assert_eq!(own.as_array().unwrap().len(), 1);
        let (_, other) = app.call("GET", "/inquiries", Some(&Who::user()), None).await;
        assert!(other.as_array().unwrap().is_empty());
        let (_, org) = app
            .call("GET", "/inquiries", Some(&Who::organization("org-a")), None)
            .await;
        assert!(org[0]["contact"].is_null());
    }
}

mod notifications {
    use super::*;

    #[tokio::test]
    async fn inbox_read_and_delete() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let alice = Who::user();
        app.add_to_cart(&alice, &a, 1).await;
        app.call("POST", "/orders", Some(&alice), Some(order_body()))
            .await;

        let (status, inbox) = app.call("GET", "/notifications", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox["unread"], 1);
        let id = inbox["notifications"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call("POST", &format!("/notifications/{id}/read"), Some(&Who::user()), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, marked) = app
            .call("POST", "/notifications/read-all", Some(&alice), None)
            .await;
        assert_eq!(marked["marked"], 1);
        let (_, inbox) = app.call("GET", "/notifications", Some(&alice), None).await;
        assert_eq!(inbox["unread"], 0);

        let (status, _) = app
            .call("DELETE", &format!("/notifications/{id}"), Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, inbox) = app.call("GET", "/notifications", Some(&alice), None).await;
        assert!(inbox["notifications"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_all_empties_only_the_callers_inbox() {
        let app = TestApp::new();
        let a = app.product("Product A", 1000, 10).await;
        let alice = Who::user();
        let bob = Who::user();
        for who in [&alice, &alice, &bob] {
            app.add_to_cart(who, &a, 1).await;
            app.call("POST", "/orders", Some(who), Some(order_body()))
                .await;
        }
        let (_, inbox) = app.call("GET", "/notifications", Some(&alice), None).await;
        assert_eq!(inbox["notifications"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .call("DELETE", "/notifications", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 2);

        let (_, inbox) = app.call("GET", "/notifications", Some(&alice), None).await;
        assert!(inbox["notifications"].as_array().unwrap().is_empty());
        let (_, inbox) = app.call("GET", "/notifications", Some(&bob), None).await;
        assert_eq!(inbox["notifications"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn operations_see_role_targeted_notifications() {
        let app = TestApp::new();
        app.call(
            "POST",
            "/inquiries",
            Some(&Who::user()),
            Some(json!({ "description": "Need 40 office chairs" })),
        )
        .await;

        let (_, inbox) = app
            .call("GET", "/notifications", Some(&Who::operation()), None)
            .await;
        assert_eq!(inbox["unread"], 1);
        assert_eq!(inbox["notifications"][0]["target"]["kind"], "role");
    }
}
