//! Persistence for the pharmacy records.
//!
//! Handlers talk to a [`Storage`] trait object so the same routes run against
//! the in-memory store (development, tests) or PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::db::models::{
    Category, Customer, Doctor, Invoice, InvoiceItem, Medicine, MedicineFilter, NewCategory,
    NewCustomer, NewDoctor, NewInvoice, NewInvoiceItem, NewMedicine, NewPrescription, NewUser,
    Prescription, TopSellingMedicine, User,
};

pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::MemStorage;
pub use postgres::PgStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidReference(String),
    #[error("{0}")]
    InvalidValue(String),
    #[error("Insufficient stock for medicine {medicine_id}: {available} available, {requested} requested")]
    InsufficientStock {
        medicine_id: i32,
        available: i32,
        requested: i32,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub(crate) fn check_stock(stock: i32) -> StorageResult<()> {
    if stock < 0 {
        return Err(StorageError::InvalidValue(
            "Stock cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, id: i32) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    async fn list_users(&self) -> StorageResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;

    async fn list_categories(&self) -> StorageResult<Vec<Category>>;
    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> StorageResult<Category>;

    async fn list_medicines(&self, filter: &MedicineFilter) -> StorageResult<Vec<Medicine>>;
    async fn get_medicine(&self, id: i32) -> StorageResult<Option<Medicine>>;
    async fn create_medicine(&self, medicine: NewMedicine) -> StorageResult<Medicine>;
    /// Sets the stock level; negative values are rejected with `InvalidValue`.
    async fn update_medicine_stock(&self, id: i32, stock: i32) -> StorageResult<Option<Medicine>>;
    async fn low_stock_medicines(&self) -> StorageResult<Vec<Medicine>>;
    /// Medicines whose expiry date is on or before `cutoff`, expired ones included.
    async fn expiring_medicines(&self, cutoff: NaiveDate) -> StorageResult<Vec<Medicine>>;

    async fn list_customers(&self) -> StorageResult<Vec<Customer>>;
    async fn get_customer(&self, id: i32) -> StorageResult<Option<Customer>>;
    async fn get_customer_by_phone(&self, phone: &str) -> StorageResult<Option<Customer>>;
    async fn create_customer(&self, customer: NewCustomer) -> StorageResult<Customer>;

    async fn list_doctors(&self) -> StorageResult<Vec<Doctor>>;
    async fn get_doctor(&self, id: i32) -> StorageResult<Option<Doctor>>;
    async fn create_doctor(&self, doctor: NewDoctor) -> StorageResult<Doctor>;

    async fn list_invoices(&self) -> StorageResult<Vec<Invoice>>;
    async fn get_invoice(&self, id: i32) -> StorageResult<Option<Invoice>>;
    async fn get_invoice_by_number(&self, number: &str) -> StorageResult<Option<Invoice>>;
    async fn customer_invoices(&self, customer_id: i32) -> StorageResult<Vec<Invoice>>;
    async fn invoice_items(&self, invoice_id: i32) -> StorageResult<Vec<InvoiceItem>>;
    async fn invoices_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Invoice>>;
    /// Persists the invoice and its items and takes the sold quantities out of
    /// stock. Either everything is written or nothing is.
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> StorageResult<(Invoice, Vec<InvoiceItem>)>;

    async fn customer_prescriptions(&self, customer_id: i32) -> StorageResult<Vec<Prescription>>;
    async fn get_prescription(&self, id: i32) -> StorageResult<Option<Prescription>>;
    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> StorageResult<Prescription>;

    async fn top_selling_medicines(&self, limit: usize) -> StorageResult<Vec<TopSellingMedicine>>;
}
