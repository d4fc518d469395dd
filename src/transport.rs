use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::Result;
use crate::http::RequestOptions;
use crate::kind::WorkflowKind;
use crate::packager::TransportBody;

/// A boxed future type for transport calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Delivers a packaged request to the analysis service and returns the raw
/// JSON report.
///
/// Implementations must not interpret the report; normalization happens in
/// the workflow machine.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        kind: WorkflowKind,
        body: TransportBody,
        options: RequestOptions,
    ) -> BoxFuture<'_, Result<Value>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        kind: WorkflowKind,
        body: TransportBody,
        options: RequestOptions,
    ) -> BoxFuture<'_, Result<Value>> {
        (**self).send(kind, body, options)
    }
}
