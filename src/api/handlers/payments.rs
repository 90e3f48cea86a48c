use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{PaymentEvent, PaymentEventStatus, PaymentRecord, PaymentRecordStatus, Submission,
             SubmissionEnvelope},
    error::{AppError, Result},
    integrations::EntitlementNotification,
    payments::{CheckoutRequest, PaymentGateway, WebhookEvent},
    reconcile::{ReconcileError, ReconcileOutcome},
};

fn gateway(state: &AppState) -> Result<&Arc<dyn PaymentGateway>> {
    state.gateway.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Payment processing is not configured".to_string())
    })
}

/// Start a paid submission: create the hosted checkout session and the
/// Pending payment record the reconciler will key on later.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> Result<Response> {
    let gateway = gateway(&state)?;

    // Reject obviously broken submissions before anyone is charged. The
    // reconciler re-validates at the transaction boundary regardless.
    if submission.user().email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    let description = match &submission {
        Submission::New(new) => {
            if new.venue.name.trim().is_empty() || new.venue.address.trim().is_empty() {
                return Err(AppError::Validation(
                    "Venue name and address are required".to_string(),
                ));
            }
            format!("Annual venue listing: {}", new.venue.name.trim())
        }
        Submission::Claim(claim) => format!("Venue claim: {}", claim.venue_id),
    };

    let pricing = &state.settings.pricing;
    let base_url = &state.settings.server.base_url;

    let handle = gateway
        .create_checkout(CheckoutRequest {
            description,
            amount_minor: pricing.annual_listing_minor,
            currency: pricing.currency.clone(),
            customer_email: submission.user().email.trim().to_string(),
            success_url: format!(
                "{}/payments/success?reference={{CHECKOUT_SESSION_ID}}",
                base_url
            ),
            cancel_url: format!("{}/payments/cancelled", base_url),
        })
        .await?;

    let envelope = SubmissionEnvelope::new(submission);
    let record = PaymentRecord {
        id: Uuid::new_v4(),
        external_reference: handle.reference.clone(),
        submission: envelope
            .encode()
            .map_err(|e| AppError::Internal(format!("Submission encoding failed: {}", e)))?,
        status: PaymentRecordStatus::Pending,
        expected_amount: pricing.annual_listing_minor,
        expected_currency: pricing.currency.to_uppercase(),
        venue_id: None,
        claim_id: None,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    state.payment_records.create(record).await?;

    Ok(Json(json!({
        "reference": handle.reference,
        "checkout_url": handle.checkout_url,
    }))
    .into_response())
}

/// Trigger A: asynchronous provider webhook.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response> {
    let gateway = gateway(&state)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    match gateway.parse_webhook(&body, signature)? {
        WebhookEvent::PaymentSucceeded(event) => match reconcile_and_notify(&state, &event).await {
            Ok(outcome) => Ok((StatusCode::OK, Json(outcome_body(&outcome))).into_response()),
            // 409 makes the provider redeliver later; the concurrent
            // attempt that owns the record will have finished by then.
            Err(ReconcileError::InProgress(_)) => Ok((
                StatusCode::CONFLICT,
                Json(json!({ "status": "processing" })),
            )
                .into_response()),
            Err(ReconcileError::Fatal(reason)) => Err(reason.into()),
        },
        WebhookEvent::PaymentFailed { reference } => {
            let changed = state.payment_records.mark_failed(&reference).await?;
            if changed {
                tracing::info!(reference = %reference, "payment marked failed");
            }
            Ok(StatusCode::OK.into_response())
        }
        WebhookEvent::Ignored => Ok(StatusCode::OK.into_response()),
    }
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub reference: String,
}

/// Trigger B: the client lands back from checkout and asks us to
/// confirm. The upstream status is re-verified with the provider; the
/// client's word alone is never enough.
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Response> {
    let gateway = gateway(&state)?;

    let event = gateway.verify_payment(&request.reference).await?;

    match event.status {
        PaymentEventStatus::Succeeded => {}
        PaymentEventStatus::Processing => {
            return Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "status": "processing" })),
            )
                .into_response());
        }
        PaymentEventStatus::Failed => {
            return Err(AppError::Payment("Payment was not successful".to_string()));
        }
    }

    match reconcile_and_notify(&state, &event).await {
        Ok(outcome) => Ok((StatusCode::OK, Json(outcome_body(&outcome))).into_response()),
        // Tell the client to poll again shortly; the racing delivery is
        // mid-flight.
        Err(ReconcileError::InProgress(_)) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "processing" })),
        )
            .into_response()),
        Err(ReconcileError::Fatal(reason)) => Err(reason.into()),
    }
}

/// Reconcile, then fire best-effort notifications for a fresh
/// completion. Replays stay silent: the first call already notified.
async fn reconcile_and_notify(
    state: &AppState,
    event: &PaymentEvent,
) -> std::result::Result<ReconcileOutcome, ReconcileError> {
    let outcome = state.reconciler.reconcile(event).await?;

    if let ReconcileOutcome::Completed(entitlement) = &outcome {
        state
            .notifications
            .dispatch(EntitlementNotification::from_entitlement(
                entitlement,
                &event.reference,
            ))
            .await;
    }

    Ok(outcome)
}

fn outcome_body(outcome: &ReconcileOutcome) -> serde_json::Value {
    match outcome {
        ReconcileOutcome::Completed(e) => json!({
            "status": "completed",
            "mode": e.mode.to_string(),
            "venue_id": e.venue_id,
            "venue_name": e.venue_name,
            "user_id": e.user_id,
            "claim_id": e.claim_id,
            "expires_at": e.expires_at,
        }),
        ReconcileOutcome::AlreadyProcessed {
            mode,
            venue_id,
            user_id,
            claim_id,
        } => json!({
            "status": "completed",
            "mode": mode.to_string(),
            "venue_id": venue_id,
            "user_id": user_id,
            "claim_id": claim_id,
        }),
    }
}
