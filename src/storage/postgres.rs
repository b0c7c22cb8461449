use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use super::{check_stock, Storage, StorageError, StorageResult};
use crate::db::models::{
    Category, Customer, Doctor, Invoice, InvoiceItem, Medicine, MedicineFilter, NewCategory,
    NewCustomer, NewDoctor, NewInvoice, NewInvoiceItem, NewMedicine, NewPrescription, NewUser,
    Prescription, TopSellingMedicine, User,
};

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turns constraint violations into the storage-level error the handlers map
/// to 409 / 400.
fn map_constraint(err: sqlx::Error, conflict: impl FnOnce() -> String) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(conflict());
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::InvalidReference(db_err.message().to_string());
        }
    }
    StorageError::Database(err)
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, name, role) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("Username {} is already taken", user.username)))
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_category(&self, category: NewCategory) -> StorageResult<Category> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name) VALUES ($1) RETURNING *")
            .bind(&category.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint(e, || format!("Category {} already exists", category.name)))
    }

    async fn list_medicines(&self, filter: &MedicineFilter) -> StorageResult<Vec<Medicine>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", term));
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines \
             WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR description ILIKE $1) \
               AND ($2::INTEGER IS NULL OR category_id = $2) \
             ORDER BY id",
        )
        .bind(search)
        .bind(filter.category_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_medicine(&self, id: i32) -> StorageResult<Option<Medicine>> {
        Ok(
            sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_medicine(&self, medicine: NewMedicine) -> StorageResult<Medicine> {
        sqlx::query_as::<_, Medicine>(
            "INSERT INTO medicines \
             (name, description, category_id, form, batch_number, expiry_date, mrp, stock, \
              low_stock_threshold, gst_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(&medicine.name)
        .bind(&medicine.description)
        .bind(medicine.category_id)
        .bind(&medicine.form)
        .bind(&medicine.batch_number)
        .bind(medicine.expiry_date)
        .bind(medicine.mrp)
        .bind(medicine.stock)
        .bind(medicine.low_stock_threshold)
        .bind(medicine.gst_rate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || format!("Medicine {} already exists", medicine.name)))
    }

    async fn update_medicine_stock(&self, id: i32, stock: i32) -> StorageResult<Option<Medicine>> {
        check_stock(stock)?;
        Ok(sqlx::query_as::<_, Medicine>(
            "UPDATE medicines SET stock = $1 WHERE id = $2 RETURNING *",
        )
        .bind(stock)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn low_stock_medicines(&self) -> StorageResult<Vec<Medicine>> {
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE stock <= low_stock_threshold ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn expiring_medicines(&self, cutoff: NaiveDate) -> StorageResult<Vec<Medicine>> {
        Ok(sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE expiry_date <= $1 ORDER BY id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_customers(&self) -> StorageResult<Vec<Customer>> {
        Ok(
            sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_customer(&self, id: i32) -> StorageResult<Option<Customer>> {
        Ok(
            sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_customer_by_phone(&self, phone: &str) -> StorageResult<Option<Customer>> {
        Ok(
            sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE phone = $1")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_customer(&self, customer: NewCustomer) -> StorageResult<Customer> {
        sqlx::query_as::<_, Customer>(
            "INSERT INTO customers (name, phone, email, address) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, || {
                format!("A customer with phone {} already exists", customer.phone)
            })
        })
    }

    async fn list_doctors(&self) -> StorageResult<Vec<Doctor>> {
        Ok(sqlx::query_as::<_, Doctor>("SELECT * FROM doctors ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_doctor(&self, id: i32) -> StorageResult<Option<Doctor>> {
        Ok(
            sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_doctor(&self, doctor: NewDoctor) -> StorageResult<Doctor> {
        Ok(sqlx::query_as::<_, Doctor>(
            "INSERT INTO doctors (name, specialization, phone) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&doctor.name)
        .bind(&doctor.specialization)
        .bind(&doctor.phone)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_invoices(&self) -> StorageResult<Vec<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_invoice(&self, id: i32) -> StorageResult<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_invoice_by_number(&self, number: &str) -> StorageResult<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE invoice_number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn customer_invoices(&self, customer_id: i32) -> StorageResult<Vec<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE customer_id = $1 ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn invoice_items(&self, invoice_id: i32) -> StorageResult<Vec<InvoiceItem>> {
        Ok(sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn invoices_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE created_at >= $1 ORDER BY id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> StorageResult<(Invoice, Vec<InvoiceItem>)> {
        let mut tx = self.pool.begin().await?;

        let number = invoice.invoice_number.clone();
        let created = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoices \
             (invoice_number, customer_id, doctor_id, subtotal, gst_amount, total, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(&invoice.invoice_number)
        .bind(invoice.customer_id)
        .bind(invoice.doctor_id)
        .bind(invoice.subtotal)
        .bind(invoice.gst_amount)
        .bind(invoice.total)
        .bind(invoice.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, || format!("Invoice number {} already exists", number)))?;

        let mut created_items = Vec::with_capacity(items.len());
        for item in items {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT stock FROM medicines WHERE id = $1 FOR UPDATE")
                    .bind(item.medicine_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let available = available.ok_or_else(|| {
                StorageError::InvalidReference(format!(
                    "Medicine {} does not exist",
                    item.medicine_id
                ))
            })?;
            if available < item.quantity {
                // Dropping the transaction rolls back the invoice and earlier lines.
                return Err(StorageError::InsufficientStock {
                    medicine_id: item.medicine_id,
                    available,
                    requested: item.quantity,
                });
            }

            sqlx::query("UPDATE medicines SET stock = stock - $1 WHERE id = $2")
                .bind(item.quantity)
                .bind(item.medicine_id)
                .execute(&mut *tx)
                .await?;

            let created_item = sqlx::query_as::<_, InvoiceItem>(
                "INSERT INTO invoice_items \
                 (invoice_id, medicine_id, quantity, unit_price, gst_rate, gst_amount, total_price) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            )
            .bind(created.id)
            .bind(item.medicine_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.gst_rate)
            .bind(item.gst_amount)
            .bind(item.total_price)
            .fetch_one(&mut *tx)
            .await?;
            created_items.push(created_item);
        }

        tx.commit().await?;
        Ok((created, created_items))
    }

    async fn customer_prescriptions(&self, customer_id: i32) -> StorageResult<Vec<Prescription>> {
        Ok(sqlx::query_as::<_, Prescription>(
            "SELECT * FROM prescriptions WHERE customer_id = $1 ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_prescription(&self, id: i32) -> StorageResult<Option<Prescription>> {
        Ok(
            sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> StorageResult<Prescription> {
        sqlx::query_as::<_, Prescription>(
            "INSERT INTO prescriptions (customer_id, doctor_id, prescription_image_path, notes) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(prescription.customer_id)
        .bind(prescription.doctor_id)
        .bind(&prescription.prescription_image_path)
        .bind(&prescription.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, || "Prescription already exists".to_string()))
    }

    async fn top_selling_medicines(&self, limit: usize) -> StorageResult<Vec<TopSellingMedicine>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(sqlx::query_as::<_, TopSellingMedicine>(
            "SELECT m.id, m.name, COALESCE(c.name, 'Unknown') AS category, \
                    SUM(ii.quantity)::BIGINT AS sold_units, \
                    SUM(ii.unit_price * ii.quantity) AS revenue \
             FROM invoice_items ii \
             JOIN medicines m ON m.id = ii.medicine_id \
             LEFT JOIN categories c ON c.id = m.category_id \
             GROUP BY m.id, m.name, c.name \
             ORDER BY sold_units DESC, m.id \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
