// Shared pricing helpers
pub mod pricing;

// Master data
pub mod catalog;

// Procurement and sales
pub mod purchases;
pub mod sales;
pub mod subscriptions;

// Stock and customs
pub mod customs;
pub mod pickings;

// Accounting
pub mod invoices;

// Human resources
pub mod attachments;
pub mod hr;

// Outbound notifications
pub mod notifications;
