//! Renderer negotiation through a whole controller.

use bytes::Bytes;
use heron::extract::{Parser, Renderer};
use heron::prelude::*;
use http::StatusCode;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

/// Renders the JSON text of a value under any content type.
#[derive(Debug, Clone, Copy)]
struct TextRenderer(&'static str);

impl Renderer for TextRenderer {
    fn content_type(&self) -> &str {
        self.0
    }

    fn render(&self, value: &Value) -> HeronResult<Bytes> {
        Ok(Bytes::from(format!("<{}>{value}", self.0)))
    }

    fn validation_parser(&self) -> Option<Arc<dyn Parser>> {
        None
    }
}

const XML: TextRenderer = TextRenderer("application/xml");
const TEXT: TextRenderer = TextRenderer("text/plain");

fn controller(renderers: &[&'static str]) -> Controller {
    let mut builder = Controller::builder("PingController");
    for content_type in renderers {
        builder = match *content_type {
            "application/json" => builder.renderer(JsonRenderer),
            other => builder.renderer(TextRenderer(other)),
        };
    }
    builder
        .endpoint("get", ModifyPayload::new(Schema::any()), |_ctx| async {
            Ok::<_, HeronError>(json!({"pong": true}))
        })
        .build()
        .unwrap()
}

fn get(accept: Option<&str>) -> Request {
    let builder = Request::builder().uri("/ping");
    let builder = match accept {
        Some(accept) => builder.header("Accept", accept),
        None => builder,
    };
    builder.build().unwrap()
}

#[tokio::test]
async fn test_quality_beats_registration_order() {
    let controller = Controller::builder("PingController")
        .renderer(XML)
        .renderer(JsonRenderer)
        .endpoint("get", ModifyPayload::new(Schema::any()), |_ctx| async {
            Ok::<_, HeronError>(json!({"pong": true}))
        })
        .build()
        .unwrap();

    let response = controller
        .dispatch(get(Some("application/json;q=0.9,application/xml;q=0.95")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.content_type(), Some("application/xml"));
    assert_eq!(response.body().as_ref(), br#"<application/xml>{"pong":true}"#);
}

#[tokio::test]
async fn test_missing_accept_uses_first_renderer() {
    let response = controller(&["text/plain", "application/json"])
        .dispatch(get(None))
        .await;
    assert_eq!(response.content_type(), Some(TEXT.content_type()));
}

#[tokio::test]
async fn test_unsatisfiable_accept_is_not_acceptable() {
    let response = controller(&["application/json", "application/xml"])
        .dispatch(get(Some("text/html")))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(response.content_type(), Some("application/json"));

    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["detail"][0]["type"], "value_error");
    assert!(body["detail"][0]["msg"]
        .as_str()
        .unwrap()
        .starts_with("Cannot serialize response body with accepted types"));
}

proptest! {
    #[test]
    fn test_negotiation_ignores_registration_order(
        renderers in Just(vec!["application/json", "application/xml", "text/plain"]).prop_shuffle(),
        pick in 0usize..3,
    ) {
        let controller = controller(&renderers);
        let wanted = renderers[pick];

        let response = tokio_test::block_on(controller.dispatch(get(Some(wanted))));
        prop_assert_eq!(response.status(), StatusCode::OK);
        prop_assert_eq!(response.content_type(), Some(wanted));

        let response = tokio_test::block_on(controller.dispatch(get(Some("*/*"))));
        prop_assert_eq!(response.content_type(), Some(renderers[0]));
    }
}
