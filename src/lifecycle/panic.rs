//! Handler panic policy.
//!
//! A panic inside request handling leaves shared state in an unknown
//! condition, so it is treated as fatal: the request gets a generic 500 and
//! the server drains and exits non-zero.

use std::any::Any;

use axum::body::Body;
use axum::http::Response;
use axum::response::IntoResponse;
use tower_http::catch_panic::ResponseForPanic;

use crate::error::GatewayError;
use crate::lifecycle::shutdown::Shutdown;

#[derive(Clone)]
pub struct PanicResponder {
    shutdown: Shutdown,
}

impl PanicResponder {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Self::ResponseBody> {
        let message = panic_message(err.as_ref());
        tracing::error!(panic = %message, "Request handler panicked");
        self.shutdown.trigger_fatal("request handler panicked");
        GatewayError::internal("request handler panicked").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_panic_triggers_fatal_shutdown() {
        let shutdown = Shutdown::new();
        let mut responder = PanicResponder::new(shutdown.clone());
        let response = responder.response_for_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(shutdown.is_fatal());
        assert!(shutdown.is_triggered());
    }
}
