//! Type-erased span exporter.
//!
//! [`SpanExporter::export`] returns `impl Future`, so the trait cannot be used
//! as a trait object. Factories in the registry produce exporters of different
//! concrete types, which are erased into [`BoxedSpanExporter`] here.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

trait DynSpanExporter: Send + Sync + fmt::Debug {
    fn export_boxed(&self, batch: Vec<SpanData>) -> BoxFuture<'_, OTelSdkResult>;
    fn shutdown_dyn(&mut self) -> OTelSdkResult;
    fn shutdown_with_timeout_dyn(&mut self, timeout: Duration) -> OTelSdkResult;
    fn force_flush_dyn(&mut self) -> OTelSdkResult;
    fn set_resource_dyn(&mut self, resource: &Resource);
}

impl<T: SpanExporter + 'static> DynSpanExporter for T {
    fn export_boxed(&self, batch: Vec<SpanData>) -> BoxFuture<'_, OTelSdkResult> {
        Box::pin(SpanExporter::export(self, batch))
    }

    fn shutdown_dyn(&mut self) -> OTelSdkResult {
        SpanExporter::shutdown(self)
    }

    fn shutdown_with_timeout_dyn(&mut self, timeout: Duration) -> OTelSdkResult {
        SpanExporter::shutdown_with_timeout(self, timeout)
    }

    fn force_flush_dyn(&mut self) -> OTelSdkResult {
        SpanExporter::force_flush(self)
    }

    fn set_resource_dyn(&mut self, resource: &Resource) {
        SpanExporter::set_resource(self, resource)
    }
}

/// A span exporter of any concrete type, as produced by a
/// [`SpanExporterFactory`](crate::SpanExporterFactory).
///
/// Every call is forwarded unchanged to the wrapped exporter.
pub struct BoxedSpanExporter {
    inner: Box<dyn DynSpanExporter>,
}

impl BoxedSpanExporter {
    /// Wraps `exporter`.
    pub fn new<E: SpanExporter + 'static>(exporter: E) -> Self {
        BoxedSpanExporter {
            inner: Box::new(exporter),
        }
    }
}

impl fmt::Debug for BoxedSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedSpanExporter").field(&self.inner).finish()
    }
}

impl SpanExporter for BoxedSpanExporter {
    fn export(
        &self,
        batch: Vec<SpanData>,
    ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        self.inner.export_boxed(batch)
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        self.inner.shutdown_dyn()
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout_dyn(timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush_dyn()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource_dyn(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Tracer, TracerProvider};
    use opentelemetry_sdk::error::OTelSdkError;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    struct CountingExporter {
        exported: Arc<AtomicUsize>,
        shut_down: Arc<AtomicBool>,
        resource_set: Arc<AtomicBool>,
    }

    impl SpanExporter for CountingExporter {
        async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
            if self.shut_down.load(Ordering::SeqCst) {
                return Err(OTelSdkError::AlreadyShutdown);
            }
            self.exported.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }

        fn shutdown_with_timeout(&mut self, _timeout: Duration) -> OTelSdkResult {
            self.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn set_resource(&mut self, _resource: &Resource) {
            self.resource_set.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_boxed_exporter_forwards_to_inner() {
        let inner = CountingExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(BoxedSpanExporter::new(inner.clone()))
            .build();

        let tracer = provider.tracer("boxed");
        tracer.in_span("one", |_cx| {});
        tracer.in_span("two", |_cx| {});

        assert_eq!(inner.exported.load(Ordering::SeqCst), 2);
        assert!(inner.resource_set.load(Ordering::SeqCst));

        provider.shutdown().unwrap();
        assert!(inner.shut_down.load(Ordering::SeqCst));
    }

    #[test]
    fn test_boxed_exporter_shutdown() {
        let inner = CountingExporter::default();
        let mut exporter = BoxedSpanExporter::new(inner.clone());

        assert!(exporter.shutdown().is_ok());
        assert!(inner.shut_down.load(Ordering::SeqCst));
        let result = futures_executor::block_on(exporter.export(Vec::new()));
        assert!(matches!(result, Err(OTelSdkError::AlreadyShutdown)));
    }
}
