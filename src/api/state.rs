use std::sync::Arc;

use crate::{
    config::Settings,
    integrations::NotificationDispatcher,
    payments::PaymentGateway,
    reconcile::Reconciler,
    repository::PaymentRecordRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub payment_records: Arc<dyn PaymentRecordRepository>,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub notifications: Arc<NotificationDispatcher>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        reconciler: Arc<Reconciler>,
        payment_records: Arc<dyn PaymentRecordRepository>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: Arc<NotificationDispatcher>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            reconciler,
            payment_records,
            gateway,
            notifications,
            settings,
        }
    }
}
