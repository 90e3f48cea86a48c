use async_trait::async_trait;

use crate::domain::PaymentEvent;
use crate::error::Result;

pub mod stripe_client;

pub use stripe_client::StripeClient;

/// What a checkout session is for. The price itself comes from server
/// config; the gateway only needs display fields.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutHandle {
    /// External payment reference the rest of the system keys on.
    pub reference: String,
    pub checkout_url: String,
}

/// A webhook delivery, after signature verification, reduced to what the
/// reconciliation core cares about.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PaymentSucceeded(PaymentEvent),
    PaymentFailed { reference: String },
    Ignored,
}

/// Boundary to the payment provider. The production implementation is
/// [`StripeClient`]; tests swap in [`FakeGateway`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session; the returned reference becomes
    /// the payment record's external reference.
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutHandle>;

    /// Verify and decode an inbound webhook delivery.
    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<WebhookEvent>;

    /// Re-verify a payment's upstream status. The confirm endpoint uses
    /// this: the client asserting success is never trusted.
    async fn verify_payment(&self, reference: &str) -> Result<PaymentEvent>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeGateway;

#[cfg(any(test, feature = "test-utils"))]
mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::{PaymentEvent, PaymentEventStatus};
    use crate::error::{AppError, Result};

    use super::{CheckoutHandle, CheckoutRequest, PaymentGateway, WebhookEvent};

    /// In-memory gateway for tests: checkout references are sequential,
    /// and upstream verification answers whatever was programmed in.
    #[derive(Default)]
    pub struct FakeGateway {
        counter: Mutex<u64>,
        payments: Mutex<HashMap<String, PaymentEvent>>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Program the upstream state for a reference, as the provider
        /// would report it.
        pub fn set_payment(&self, event: PaymentEvent) {
            self.payments
                .lock()
                .unwrap()
                .insert(event.reference.clone(), event);
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_checkout(&self, _request: CheckoutRequest) -> Result<CheckoutHandle> {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            Ok(CheckoutHandle {
                reference: format!("cs_test_{}", counter),
                checkout_url: format!("https://checkout.test/{}", counter),
            })
        }

        fn parse_webhook(&self, payload: &str, _signature: &str) -> Result<WebhookEvent> {
            // Fake webhooks carry the reference directly.
            let reference = payload.trim().to_string();
            let payments = self.payments.lock().unwrap();
            match payments.get(&reference) {
                Some(event) if event.status == PaymentEventStatus::Failed => {
                    Ok(WebhookEvent::PaymentFailed { reference })
                }
                Some(event) => Ok(WebhookEvent::PaymentSucceeded(event.clone())),
                None => Ok(WebhookEvent::Ignored),
            }
        }

        async fn verify_payment(&self, reference: &str) -> Result<PaymentEvent> {
            self.payments
                .lock()
                .unwrap()
                .get(reference)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("No payment {}", reference)))
        }
    }
}
