use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Pharmacist,
    Accountant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pharmacist => "pharmacist",
            Role::Accountant => "accountant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "pharmacist" => Ok(Role::Pharmacist),
            "accountant" => Ok(Role::Accountant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewCategory {
    pub name: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Medicine {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub category_id: i32,
    pub form: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub mrp: Decimal,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub gst_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Medicine {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub description: Option<String>,
    pub category_id: i32,
    pub form: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub mrp: Decimal,
    pub stock: i32,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i32,
    #[serde(default = "default_gst_rate")]
    pub gst_rate: Decimal,
}

fn default_low_stock_threshold() -> i32 {
    10
}

fn default_gst_rate() -> Decimal {
    Decimal::from(18)
}

/// Optional narrowing applied to the medicine listing.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MedicineFilter {
    pub search: Option<String>,
    pub category_id: Option<i32>,
}

impl MedicineFilter {
    pub fn matches(&self, medicine: &Medicine) -> bool {
        let matches_category = self
            .category_id
            .map_or(true, |category_id| medicine.category_id == category_id);
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                medicine.name.to_lowercase().contains(&term)
                    || medicine
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
        };
        matches_category && matches_search
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Doctor {
    pub id: i32,
    pub name: String,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: Option<String>,
    pub phone: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: i32,
    pub invoice_number: String,
    pub customer_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub customer_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
    pub user_id: i32,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvoiceItem {
    pub id: i32,
    pub invoice_id: i32,
    pub medicine_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub gst_rate: Decimal,
    pub gst_amount: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub medicine_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub gst_rate: Decimal,
    pub gst_amount: Decimal,
    pub total_price: Decimal,
}

/// An invoice together with its line items, as returned by the invoice endpoints.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prescription {
    pub id: i32,
    pub customer_id: i32,
    pub doctor_id: Option<i32>,
    pub prescription_image_path: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewPrescription {
    pub customer_id: i32,
    pub doctor_id: Option<i32>,
    pub prescription_image_path: Option<String>,
    pub notes: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TopSellingMedicine {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub sold_units: i64,
    pub revenue: Decimal,
}
