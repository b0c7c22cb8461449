use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{Storage, StorageError};
use crate::auth::password::{hash_password, PasswordError};
use crate::db::models::{NewCategory, NewCustomer, NewDoctor, NewMedicine, NewUser, Role};

#[derive(thiserror::Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

const CATEGORIES: [&str; 6] = [
    "Pain Relief",
    "Antibiotics",
    "Antiallergic",
    "Antidiabetic",
    "Supplements",
    "Cold & Cough",
];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// (name, description, category index, form, batch, expiry, mrp, stock, threshold)
#[rustfmt::skip]
fn seed_medicines() -> Vec<NewMedicine> {
    [
        ("Paracetamol 500mg", "Tablet (Strip of 10)", 0, "tablet", "B2026056", date(2027, 12, 31), 25, 235, 20),
        ("Azithromycin 500mg", "Tablet (Strip of 6)", 1, "tablet", "B2026042", date(2027, 10, 31), 90, 186, 20),
        ("Cetirizine 10mg", "Tablet (Strip of 10)", 2, "tablet", "B2026089", date(2027, 11, 30), 30, 3, 10),
        ("Amoxicillin 250mg", "Capsule (Strip of 10)", 1, "capsule", "B2026016", date(2026, 11, 30), 80, 12, 15),
        ("Multivitamin", "Tablet (Bottle of 30)", 4, "tablet", "B2026098", date(2028, 3, 31), 150, 45, 10),
        ("Cough Syrup", "Syrup (100ml)", 5, "syrup", "B2026021", date(2026, 12, 31), 85, 65, 15),
    ]
    .into_iter()
    .map(
        |(name, description, category, form, batch, expiry, mrp, stock, threshold)| NewMedicine {
            name: name.to_string(),
            description: Some(description.to_string()),
            category_id: category + 1,
            form: form.to_string(),
            batch_number: batch.to_string(),
            expiry_date: expiry,
            mrp: Decimal::from(mrp),
            stock,
            low_stock_threshold: threshold,
            gst_rate: Decimal::from(18),
        },
    )
    .collect()
}

fn seed_doctors() -> Vec<NewDoctor> {
    [
        ("Dr. Sharma", "General Physician", "9876543210"),
        ("Dr. Patel", "Cardiologist", "9876543211"),
        ("Dr. Kumar", "Pediatrician", "9876543212"),
        ("Dr. Singh", "Dermatologist", "9876543213"),
        ("Dr. Gupta", "Orthopedic", "9876543214"),
    ]
    .into_iter()
    .map(|(name, specialization, phone)| NewDoctor {
        name: name.to_string(),
        specialization: Some(specialization.to_string()),
        phone: Some(phone.to_string()),
    })
    .collect()
}

fn seed_customers() -> Vec<NewCustomer> {
    [
        ("Amit Kumar", "9876543220", "amit@example.com", "123 Main St, Delhi"),
        ("Priya Sharma", "9876543221", "priya@example.com", "456 Park Ave, Mumbai"),
        ("Rahul Singh", "9876543222", "rahul@example.com", "789 Gandhi Rd, Bangalore"),
    ]
    .into_iter()
    .map(|(name, phone, email, address)| NewCustomer {
        name: name.to_string(),
        phone: phone.to_string(),
        email: Some(email.to_string()),
        address: Some(address.to_string()),
    })
    .collect()
}

/// Populates an empty store with the default admin account and a starter
/// catalogue. Does nothing when an `admin` user already exists.
pub async fn seed_defaults(storage: &dyn Storage, admin_password: &str) -> Result<bool, SeedError> {
    if storage.get_user_by_username("admin").await?.is_some() {
        log::info!("Store already seeded, skipping");
        return Ok(false);
    }

    storage
        .create_user(NewUser {
            username: "admin".to_string(),
            password_hash: hash_password(admin_password)?,
            name: "Administrator".to_string(),
            role: Role::Admin,
        })
        .await?;

    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        let category = storage
            .create_category(NewCategory {
                name: name.to_string(),
            })
            .await?;
        category_ids.push(category.id);
    }

    for mut medicine in seed_medicines() {
        // Seed rows refer to categories by position; map onto the real ids.
        medicine.category_id = category_ids[(medicine.category_id - 1) as usize];
        storage.create_medicine(medicine).await?;
    }
    for doctor in seed_doctors() {
        storage.create_doctor(doctor).await?;
    }
    for customer in seed_customers() {
        storage.create_customer(customer).await?;
    }

    log::info!("Seeded default admin user and starter catalogue");
    Ok(true)
}
