pub mod catalog;
pub mod common;
pub mod customs;
pub mod hr;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod purchases;
pub mod sales;
pub mod subscriptions;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    attachments::AttachmentService,
    catalog::CatalogService,
    customs::CustomsService,
    hr::HrService,
    invoices::InvoiceService,
    notifications::{EventNotifier, VendorNotifier},
    pickings::PickingService,
    purchases::PurchaseService,
    sales::SaleService,
    subscriptions::SubscriptionService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub purchases: Arc<PurchaseService>,
    pub sales: Arc<SaleService>,
    pub pickings: Arc<PickingService>,
    pub customs: Arc<CustomsService>,
    pub invoices: Arc<InvoiceService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub hr: Arc<HrService>,
    pub attachments: Arc<AttachmentService>,
}

impl AppServices {
    /// Wires every service against one pool and event channel.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, currency: &str) -> Self {
        let notifier: Arc<dyn VendorNotifier> = Arc::new(EventNotifier::new(event_sender.clone()));
        Self::with_notifier(db_pool, event_sender, currency, notifier)
    }

    pub fn with_notifier(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        currency: &str,
        notifier: Arc<dyn VendorNotifier>,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone())),
            purchases: Arc::new(PurchaseService::new(
                db_pool.clone(),
                event_sender.clone(),
                currency.to_string(),
            )),
            sales: Arc::new(SaleService::new(
                db_pool.clone(),
                event_sender.clone(),
                currency.to_string(),
            )),
            pickings: Arc::new(PickingService::new(db_pool.clone(), event_sender.clone())),
            customs: Arc::new(CustomsService::new(db_pool.clone(), event_sender.clone())),
            invoices: Arc::new(InvoiceService::new(
                db_pool.clone(),
                event_sender.clone(),
                currency.to_string(),
            )),
            subscriptions: Arc::new(SubscriptionService::new(
                db_pool.clone(),
                event_sender.clone(),
                notifier,
                currency.to_string(),
            )),
            hr: Arc::new(HrService::new(db_pool.clone(), event_sender.clone())),
            attachments: Arc::new(AttachmentService::new(db_pool, event_sender)),
        }
    }
}
