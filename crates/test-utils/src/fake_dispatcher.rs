use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pollwatch::dispatch::{DispatchBackend, EventPublisher};
use pollwatch::engine::ChangeRecord;
use pollwatch::errors::Result;

/// A fake dispatch backend that:
/// - records every record the runtime dispatched, in order
/// - optionally publishes each one inline, so handler side effects are
///   visible as soon as the tick that produced them returns.
pub struct FakeDispatcher {
    dispatched: Arc<Mutex<Vec<ChangeRecord>>>,
    publisher: Option<Arc<EventPublisher>>,
}

impl FakeDispatcher {
    pub fn new(dispatched: Arc<Mutex<Vec<ChangeRecord>>>) -> Self {
        Self {
            dispatched,
            publisher: None,
        }
    }

    pub fn publishing(dispatched: Arc<Mutex<Vec<ChangeRecord>>>, publisher: Arc<EventPublisher>) -> Self {
        Self {
            dispatched,
            publisher: Some(publisher),
        }
    }
}

impl DispatchBackend for FakeDispatcher {
    fn dispatch(
        &mut self,
        records: Vec<ChangeRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let dispatched = Arc::clone(&self.dispatched);
        let publisher = self.publisher.clone();

        Box::pin(async move {
            for record in records {
                {
                    let mut guard = dispatched.lock().unwrap();
                    guard.push(record.clone());
                }

                if let Some(publisher) = &publisher {
                    publisher.publish(record).await;
                }
            }
            Ok(())
        })
    }
}
