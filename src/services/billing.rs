use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;

use crate::db::models::{InvoiceDetails, Medicine, NewInvoice};
use crate::error::{ApiError, ApiResult};
use crate::pos::{Cart, CartRequestItem, CartSummary};
use crate::storage::{Storage, StorageError};
use crate::utils::generate_invoice_number;

const INVOICE_NUMBER_ATTEMPTS: usize = 5;

#[derive(Deserialize, Debug, Clone)]
pub struct CreateInvoiceRequest {
    pub customer_id: Option<i32>,
    pub doctor_id: Option<i32>,
    #[serde(default)]
    pub items: Vec<CartRequestItem>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct QuoteRequest {
    #[serde(default)]
    pub items: Vec<CartRequestItem>,
}

/// Prices the requested lines from the stored medicines.
pub async fn build_cart(storage: &dyn Storage, items: &[CartRequestItem]) -> ApiResult<Cart> {
    if items.is_empty() {
        return Err(ApiError::validation("Invalid invoice data"));
    }

    let mut medicines: BTreeMap<i32, Medicine> = BTreeMap::new();
    for item in items {
        if medicines.contains_key(&item.medicine_id) {
            continue;
        }
        if let Some(medicine) = storage.get_medicine(item.medicine_id).await? {
            medicines.insert(medicine.id, medicine);
        }
    }

    Ok(Cart::from_request(items, &medicines)?)
}

/// Prices `items` without recording anything.
pub async fn quote(storage: &dyn Storage, items: &[CartRequestItem]) -> ApiResult<CartSummary> {
    let cart = build_cart(storage, items).await?;
    Ok(CartSummary::from(&cart))
}

/// Prices the sale, issues a fresh invoice number, and records the invoice
/// with its stock decrements.
pub async fn create_invoice(
    storage: &dyn Storage,
    user_id: i32,
    request: CreateInvoiceRequest,
) -> ApiResult<InvoiceDetails> {
    if let Some(customer_id) = request.customer_id {
        if storage.get_customer(customer_id).await?.is_none() {
            return Err(ApiError::validation(format!(
                "Customer {} not found",
                customer_id
            )));
        }
    }
    if let Some(doctor_id) = request.doctor_id {
        if storage.get_doctor(doctor_id).await?.is_none() {
            return Err(ApiError::validation(format!("Doctor {} not found", doctor_id)));
        }
    }

    let cart = build_cart(storage, &request.items).await?;
    let totals = cart.totals();

    let mut attempt = 0;
    loop {
        attempt += 1;
        let invoice = NewInvoice {
            invoice_number: generate_invoice_number(Utc::now()),
            customer_id: request.customer_id,
            doctor_id: request.doctor_id,
            subtotal: totals.subtotal,
            gst_amount: totals.gst_amount,
            total: totals.total,
            user_id,
        };

        match storage.create_invoice(invoice, cart.invoice_items()).await {
            Ok((invoice, items)) => {
                log::info!(
                    "Invoice {} issued by user {}: {} lines, total {}",
                    invoice.invoice_number,
                    user_id,
                    items.len(),
                    invoice.total
                );
                return Ok(InvoiceDetails { invoice, items });
            }
            Err(StorageError::Conflict(message)) if attempt < INVOICE_NUMBER_ATTEMPTS => {
                log::warn!("{}; retrying with a new number", message);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewCategory, NewMedicine, NewUser, Role};
    use crate::storage::MemStorage;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    async fn setup() -> (MemStorage, i32, i32) {
        let store = MemStorage::new();
        let user = store
            .create_user(NewUser {
                username: "till".into(),
                password_hash: "x".into(),
                name: "Till".into(),
                role: Role::Pharmacist,
            })
            .await
            .unwrap();
        let category = store
            .create_category(NewCategory {
                name: "Supplements".into(),
            })
            .await
            .unwrap();
        let medicine = store
            .create_medicine(NewMedicine {
                name: "Multivitamin".into(),
                description: None,
                category_id: category.id,
                form: "tablet".into(),
                batch_number: "B9".into(),
                expiry_date: NaiveDate::from_ymd_opt(2028, 3, 31).unwrap(),
                mrp: dec!(150),
                stock: 4,
                low_stock_threshold: 2,
                gst_rate: dec!(18),
            })
            .await
            .unwrap();
        (store, user.id, medicine.id)
    }

    #[tokio::test]
    async fn invoice_totals_come_from_stored_prices() {
        let (store, user_id, medicine_id) = setup().await;
        let details = create_invoice(
            &store,
            user_id,
            CreateInvoiceRequest {
                customer_id: None,
                doctor_id: None,
                items: vec![CartRequestItem {
                    medicine_id,
                    quantity: 2,
                }],
            },
        )
        .await
        .unwrap();

        assert_eq!(details.invoice.subtotal, dec!(300));
        assert_eq!(details.invoice.gst_amount, dec!(54));
        assert_eq!(details.invoice.total, dec!(354));
        assert!(details.invoice.invoice_number.starts_with("INV-"));
        assert_eq!(details.items[0].quantity, 2);
        assert_eq!(store.get_medicine(medicine_id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn rejects_empty_unknown_and_oversold_requests() {
        let (store, user_id, medicine_id) = setup().await;

        let empty = CreateInvoiceRequest {
            customer_id: None,
            doctor_id: None,
            items: vec![],
        };
        assert!(matches!(
            create_invoice(&store, user_id, empty).await,
            Err(ApiError::Validation(_))
        ));

        let unknown_customer = CreateInvoiceRequest {
            customer_id: Some(42),
            doctor_id: None,
            items: vec![CartRequestItem {
                medicine_id,
                quantity: 1,
            }],
        };
        assert!(matches!(
            create_invoice(&store, user_id, unknown_customer).await,
            Err(ApiError::Validation(_))
        ));

        let oversold = CreateInvoiceRequest {
            customer_id: None,
            doctor_id: None,
            items: vec![CartRequestItem {
                medicine_id,
                quantity: 5,
            }],
        };
        assert!(matches!(
            create_invoice(&store, user_id, oversold).await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(store.get_medicine(medicine_id).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn quote_does_not_touch_stock() {
        let (store, _, medicine_id) = setup().await;
        let items = [CartRequestItem {
            medicine_id,
            quantity: 3,
        }];
        let summary = quote(&store, &items).await.unwrap();
        assert_eq!(summary.totals.total, dec!(531));
        assert_eq!(summary.lines[0].quantity, 3);
        assert_eq!(store.get_medicine(medicine_id).await.unwrap().unwrap().stock, 4);
        assert!(store.list_invoices().await.unwrap().is_empty());
    }
}
