use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, Currency, EventObject, EventType,
    Expandable, Webhook, WebhookError,
};

use crate::{
    domain::{PaymentEvent, PaymentEventStatus},
    error::{AppError, Result},
};

use super::{CheckoutHandle, CheckoutRequest, PaymentGateway, WebhookEvent};

pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
        }
    }

    fn currency_from_code(code: &str) -> Result<Currency> {
        match code.to_lowercase().as_str() {
            "czk" => Ok(Currency::CZK),
            "eur" => Ok(Currency::EUR),
            "usd" => Ok(Currency::USD),
            "gbp" => Ok(Currency::GBP),
            other => Err(AppError::Internal(format!(
                "Unsupported pricing currency: {}",
                other
            ))),
        }
    }

    fn payment_event_from_session(session: &CheckoutSession) -> Result<PaymentEvent> {
        let amount = session
            .amount_total
            .ok_or_else(|| AppError::External("Checkout session has no amount".to_string()))?;
        let currency = session
            .currency
            .ok_or_else(|| AppError::External("Checkout session has no currency".to_string()))?;

        let status = match session.payment_status {
            CheckoutSessionPaymentStatus::Paid => PaymentEventStatus::Succeeded,
            CheckoutSessionPaymentStatus::Unpaid
            | CheckoutSessionPaymentStatus::NoPaymentRequired => PaymentEventStatus::Processing,
        };

        Ok(PaymentEvent {
            reference: session.id.to_string(),
            amount,
            currency: currency.to_string().to_uppercase(),
            status,
            external_subscription_id: session.subscription.as_ref().map(expandable_id),
            external_customer_id: session.customer.as_ref().map(expandable_id),
        })
    }
}

fn expandable_id<T: stripe::Object>(expandable: &Expandable<T>) -> String
where
    T::Id: ToString,
{
    match expandable {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(object) => object.id().to_string(),
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutHandle> {
        let currency = Self::currency_from_code(&request.currency)?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.customer_email = Some(&request.customer_email);

        // Inline price data: one yearly listing subscription.
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.amount_minor),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.description.clone(),
                    ..Default::default()
                }),
                recurring: Some(stripe::CreateCheckoutSessionLineItemsPriceDataRecurring {
                    interval:
                        stripe::CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Year,
                    interval_count: None,
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        let checkout_url = session
            .url
            .ok_or_else(|| AppError::External("No checkout URL returned".to_string()))?;

        Ok(CheckoutHandle {
            reference: session.id.to_string(),
            checkout_url,
        })
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<WebhookEvent> {
        // Verify webhook signature and construct event
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret).map_err(
            |e| match e {
                WebhookError::BadSignature => AppError::BadRequest("Invalid signature".to_string()),
                _ => AppError::External(format!("Webhook error: {}", e)),
            },
        )?;

        match event.type_ {
            EventType::CheckoutSessionCompleted
            | EventType::CheckoutSessionAsyncPaymentSucceeded => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    let payment = Self::payment_event_from_session(&session)?;
                    Ok(WebhookEvent::PaymentSucceeded(payment))
                } else {
                    Ok(WebhookEvent::Ignored)
                }
            }
            EventType::CheckoutSessionExpired | EventType::CheckoutSessionAsyncPaymentFailed => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    Ok(WebhookEvent::PaymentFailed {
                        reference: session.id.to_string(),
                    })
                } else {
                    Ok(WebhookEvent::Ignored)
                }
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
                Ok(WebhookEvent::Ignored)
            }
        }
    }

    async fn verify_payment(&self, reference: &str) -> Result<PaymentEvent> {
        let session_id: CheckoutSessionId = reference
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid payment reference: {}", reference)))?;

        let session = CheckoutSession::retrieve(&self.client, &session_id, &[])
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Self::payment_event_from_session(&session)
    }
}
