use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{check_stock, Storage, StorageError, StorageResult};
use crate::db::models::{
    Category, Customer, Doctor, Invoice, InvoiceItem, Medicine, MedicineFilter, NewCategory,
    NewCustomer, NewDoctor, NewInvoice, NewInvoiceItem, NewMedicine, NewPrescription, NewUser,
    Prescription, TopSellingMedicine, User,
};

/// Rows keyed by id plus the next id to hand out.
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    next_id: i32,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn insert_with(&mut self, build: impl FnOnce(i32) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: i32) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn contains(&self, id: i32) -> bool {
        self.rows.contains_key(&id)
    }

    fn all(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    fn filter(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|row| keep(row)).cloned().collect()
    }

    fn find(&self, matches: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.values().find(|row| matches(row)).cloned()
    }
}

#[derive(Debug)]
struct Tables {
    users: Table<User>,
    categories: Table<Category>,
    medicines: Table<Medicine>,
    customers: Table<Customer>,
    doctors: Table<Doctor>,
    invoices: Table<Invoice>,
    invoice_items: Table<InvoiceItem>,
    prescriptions: Table<Prescription>,
}

/// Process-local store. All tables sit behind one lock so an invoice and its
/// stock decrements are applied together.
#[derive(Debug)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: Table::new(),
                categories: Table::new(),
                medicines: Table::new(),
                customers: Table::new(),
                doctors: Table::new(),
                invoices: Table::new(),
                invoice_items: Table::new(),
                prescriptions: Table::new(),
            }),
        }
    }
}

fn check_customer(tables: &Tables, customer_id: Option<i32>) -> StorageResult<()> {
    match customer_id {
        Some(id) if !tables.customers.contains(id) => Err(StorageError::InvalidReference(
            format!("Customer {} does not exist", id),
        )),
        _ => Ok(()),
    }
}

fn check_doctor(tables: &Tables, doctor_id: Option<i32>) -> StorageResult<()> {
    match doctor_id {
        Some(id) if !tables.doctors.contains(id) => Err(StorageError::InvalidReference(
            format!("Doctor {} does not exist", id),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id))
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .find(|user| user.username == username))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(self.tables.read().await.users.all())
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .find(|existing| existing.username == user.username)
            .is_some()
        {
            return Err(StorageError::Conflict(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        Ok(tables.users.insert_with(|id| User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: Utc::now(),
        }))
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.all())
    }

    async fn get_category(&self, id: i32) -> StorageResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(id))
    }

    async fn create_category(&self, category: NewCategory) -> StorageResult<Category> {
        let mut tables = self.tables.write().await;
        if tables
            .categories
            .find(|existing| existing.name == category.name)
            .is_some()
        {
            return Err(StorageError::Conflict(format!(
                "Category {} already exists",
                category.name
            )));
        }
        Ok(tables.categories.insert_with(|id| Category {
            id,
            name: category.name,
        }))
    }

    async fn list_medicines(&self, filter: &MedicineFilter) -> StorageResult<Vec<Medicine>> {
        Ok(self
            .tables
            .read()
            .await
            .medicines
            .filter(|medicine| filter.matches(medicine)))
    }

    async fn get_medicine(&self, id: i32) -> StorageResult<Option<Medicine>> {
        Ok(self.tables.read().await.medicines.get(id))
    }

    async fn create_medicine(&self, medicine: NewMedicine) -> StorageResult<Medicine> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains(medicine.category_id) {
            return Err(StorageError::InvalidReference(format!(
                "Category {} does not exist",
                medicine.category_id
            )));
        }
        Ok(tables.medicines.insert_with(|id| Medicine {
            id,
            name: medicine.name,
            description: medicine.description,
            category_id: medicine.category_id,
            form: medicine.form,
            batch_number: medicine.batch_number,
            expiry_date: medicine.expiry_date,
            mrp: medicine.mrp,
            stock: medicine.stock,
            low_stock_threshold: medicine.low_stock_threshold,
            gst_rate: medicine.gst_rate,
            created_at: Utc::now(),
        }))
    }

    async fn update_medicine_stock(&self, id: i32, stock: i32) -> StorageResult<Option<Medicine>> {
        check_stock(stock)?;
        let mut tables = self.tables.write().await;
        Ok(tables.medicines.rows.get_mut(&id).map(|medicine| {
            medicine.stock = stock;
            medicine.clone()
        }))
    }

    async fn low_stock_medicines(&self) -> StorageResult<Vec<Medicine>> {
        Ok(self
            .tables
            .read()
            .await
            .medicines
            .filter(Medicine::is_low_stock))
    }

    async fn expiring_medicines(&self, cutoff: NaiveDate) -> StorageResult<Vec<Medicine>> {
        Ok(self
            .tables
            .read()
            .await
            .medicines
            .filter(|medicine| medicine.expiry_date <= cutoff))
    }

    async fn list_customers(&self) -> StorageResult<Vec<Customer>> {
        Ok(self.tables.read().await.customers.all())
    }

    async fn get_customer(&self, id: i32) -> StorageResult<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(id))
    }

    async fn get_customer_by_phone(&self, phone: &str) -> StorageResult<Option<Customer>> {
        Ok(self
            .tables
            .read()
            .await
            .customers
            .find(|customer| customer.phone == phone))
    }

    async fn create_customer(&self, customer: NewCustomer) -> StorageResult<Customer> {
        let mut tables = self.tables.write().await;
        if tables
            .customers
            .find(|existing| existing.phone == customer.phone)
            .is_some()
        {
            return Err(StorageError::Conflict(format!(
                "A customer with phone {} already exists",
                customer.phone
            )));
        }
        Ok(tables.customers.insert_with(|id| Customer {
            id,
            name: customer.name,
            phone: customer.phone,
            email: customer.email,
            address: customer.address,
            created_at: Utc::now(),
        }))
    }

    async fn list_doctors(&self) -> StorageResult<Vec<Doctor>> {
        Ok(self.tables.read().await.doctors.all())
    }

    async fn get_doctor(&self, id: i32) -> StorageResult<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(id))
    }

    async fn create_doctor(&self, doctor: NewDoctor) -> StorageResult<Doctor> {
        let mut tables = self.tables.write().await;
        Ok(tables.doctors.insert_with(|id| Doctor {
            id,
            name: doctor.name,
            specialization: doctor.specialization,
            phone: doctor.phone,
            created_at: Utc::now(),
        }))
    }

    async fn list_invoices(&self) -> StorageResult<Vec<Invoice>> {
        Ok(self.tables.read().await.invoices.all())
    }

    async fn get_invoice(&self, id: i32) -> StorageResult<Option<Invoice>> {
        Ok(self.tables.read().await.invoices.get(id))
    }

    async fn get_invoice_by_number(&self, number: &str) -> StorageResult<Option<Invoice>> {
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .find(|invoice| invoice.invoice_number == number))
    }

    async fn customer_invoices(&self, customer_id: i32) -> StorageResult<Vec<Invoice>> {
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .filter(|invoice| invoice.customer_id == Some(customer_id)))
    }

    async fn invoice_items(&self, invoice_id: i32) -> StorageResult<Vec<InvoiceItem>> {
        Ok(self
            .tables
            .read()
            .await
            .invoice_items
            .filter(|item| item.invoice_id == invoice_id))
    }

    async fn invoices_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Invoice>> {
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .filter(|invoice| invoice.created_at >= since))
    }

    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> StorageResult<(Invoice, Vec<InvoiceItem>)> {
        let mut tables = self.tables.write().await;

        if tables
            .invoices
            .find(|existing| existing.invoice_number == invoice.invoice_number)
            .is_some()
        {
            return Err(StorageError::Conflict(format!(
                "Invoice number {} already exists",
                invoice.invoice_number
            )));
        }
        if !tables.users.contains(invoice.user_id) {
            return Err(StorageError::InvalidReference(format!(
                "User {} does not exist",
                invoice.user_id
            )));
        }
        check_customer(&tables, invoice.customer_id)?;
        check_doctor(&tables, invoice.doctor_id)?;

        // Validate every line before touching stock.
        let mut requested: HashMap<i32, i32> = HashMap::new();
        for item in &items {
            *requested.entry(item.medicine_id).or_default() += item.quantity;
        }
        for (&medicine_id, &quantity) in &requested {
            let medicine = tables.medicines.get(medicine_id).ok_or_else(|| {
                StorageError::InvalidReference(format!("Medicine {} does not exist", medicine_id))
            })?;
            if medicine.stock < quantity {
                return Err(StorageError::InsufficientStock {
                    medicine_id,
                    available: medicine.stock,
                    requested: quantity,
                });
            }
        }

        for (medicine_id, quantity) in requested {
            if let Some(medicine) = tables.medicines.rows.get_mut(&medicine_id) {
                medicine.stock -= quantity;
            }
        }

        let created = tables.invoices.insert_with(|id| Invoice {
            id,
            invoice_number: invoice.invoice_number,
            customer_id: invoice.customer_id,
            doctor_id: invoice.doctor_id,
            subtotal: invoice.subtotal,
            gst_amount: invoice.gst_amount,
            total: invoice.total,
            user_id: invoice.user_id,
            created_at: Utc::now(),
        });

        let created_items = items
            .into_iter()
            .map(|item| {
                tables.invoice_items.insert_with(|id| InvoiceItem {
                    id,
                    invoice_id: created.id,
                    medicine_id: item.medicine_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    gst_rate: item.gst_rate,
                    gst_amount: item.gst_amount,
                    total_price: item.total_price,
                })
            })
            .collect();

        Ok((created, created_items))
    }

    async fn customer_prescriptions(&self, customer_id: i32) -> StorageResult<Vec<Prescription>> {
        Ok(self
            .tables
            .read()
            .await
            .prescriptions
            .filter(|prescription| prescription.customer_id == customer_id))
    }

    async fn get_prescription(&self, id: i32) -> StorageResult<Option<Prescription>> {
        Ok(self.tables.read().await.prescriptions.get(id))
    }

    async fn create_prescription(
        &self,
        prescription: NewPrescription,
    ) -> StorageResult<Prescription> {
        let mut tables = self.tables.write().await;
        if !tables.customers.contains(prescription.customer_id) {
            return Err(StorageError::InvalidReference(format!(
                "Customer {} does not exist",
                prescription.customer_id
            )));
        }
        check_doctor(&tables, prescription.doctor_id)?;
        Ok(tables.prescriptions.insert_with(|id| Prescription {
            id,
            customer_id: prescription.customer_id,
            doctor_id: prescription.doctor_id,
            prescription_image_path: prescription.prescription_image_path,
            notes: prescription.notes,
            created_at: Utc::now(),
        }))
    }

    async fn top_selling_medicines(&self, limit: usize) -> StorageResult<Vec<TopSellingMedicine>> {
        let tables = self.tables.read().await;

        let mut totals: HashMap<i32, (i64, Decimal)> = HashMap::new();
        for item in tables.invoice_items.rows.values() {
            let entry = totals.entry(item.medicine_id).or_default();
            entry.0 += i64::from(item.quantity);
            entry.1 += item.unit_price * Decimal::from(item.quantity);
        }

        let mut ranked: Vec<TopSellingMedicine> = totals
            .into_iter()
            .filter_map(|(medicine_id, (sold_units, revenue))| {
                let medicine = tables.medicines.get(medicine_id)?;
                let category = tables
                    .categories
                    .get(medicine.category_id)
                    .map(|category| category.name)
                    .unwrap_or_else(|| "Unknown".to_string());
                Some(TopSellingMedicine {
                    id: medicine.id,
                    name: medicine.name,
                    category,
                    sold_units,
                    revenue,
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.sold_units.cmp(&a.sold_units).then(a.id.cmp(&b.id)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use rust_decimal_macros::dec;

    async fn store_with_medicine(stock: i32) -> (MemStorage, User, Medicine) {
        let store = MemStorage::new();
        let user = store
            .create_user(NewUser {
                username: "pharma".to_string(),
                password_hash: "hash".to_string(),
                name: "Pharmacist".to_string(),
                role: Role::Pharmacist,
            })
            .await
            .unwrap();
        let category = store
            .create_category(NewCategory {
                name: "Pain Relief".to_string(),
            })
            .await
            .unwrap();
        let medicine = store
            .create_medicine(new_medicine("Paracetamol 500mg", category.id, stock))
            .await
            .unwrap();
        (store, user, medicine)
    }

    fn new_medicine(name: &str, category_id: i32, stock: i32) -> NewMedicine {
        NewMedicine {
            name: name.to_string(),
            description: Some("Tablet (Strip of 10)".to_string()),
            category_id,
            form: "tablet".to_string(),
            batch_number: "B2026001".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30).unwrap(),
            mrp: dec!(25),
            stock,
            low_stock_threshold: 10,
            gst_rate: dec!(18),
        }
    }

    fn invoice(number: &str, user_id: i32) -> NewInvoice {
        NewInvoice {
            invoice_number: number.to_string(),
            customer_id: None,
            doctor_id: None,
            subtotal: dec!(50),
            gst_amount: dec!(9),
            total: dec!(59),
            user_id,
        }
    }

    fn line(medicine_id: i32, quantity: i32) -> NewInvoiceItem {
        NewInvoiceItem {
            medicine_id,
            quantity,
            unit_price: dec!(25),
            gst_rate: dec!(18),
            gst_amount: dec!(4.5) * Decimal::from(quantity),
            total_price: dec!(29.5) * Decimal::from(quantity),
        }
    }

    #[tokio::test]
    async fn created_records_read_back_unchanged() {
        let (store, _, medicine) = store_with_medicine(40).await;
        assert_eq!(store.get_medicine(medicine.id).await.unwrap(), Some(medicine.clone()));

        let customer = store
            .create_customer(NewCustomer {
                name: "Amit Kumar".to_string(),
                phone: "9876543220".to_string(),
                email: Some("amit@example.com".to_string()),
                address: None,
            })
            .await
            .unwrap();
        assert_eq!(
            store.get_customer_by_phone("9876543220").await.unwrap(),
            Some(customer.clone())
        );
        assert_eq!(store.get_customer(customer.id).await.unwrap(), Some(customer));
        assert_eq!(store.get_customer(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stock_updates_reject_negative_levels() {
        let (store, _, medicine) = store_with_medicine(40).await;

        let negative = store.update_medicine_stock(medicine.id, -1).await;
        assert!(matches!(negative, Err(StorageError::InvalidValue(_))));
        assert_eq!(store.get_medicine(medicine.id).await.unwrap().unwrap().stock, 40);

        let zeroed = store.update_medicine_stock(medicine.id, 0).await.unwrap().unwrap();
        assert_eq!(zeroed.stock, 0);
        assert_eq!(store.update_medicine_stock(99, 5).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ids_increase_per_table() {
        let store = MemStorage::new();
        let first = store
            .create_category(NewCategory { name: "A".into() })
            .await
            .unwrap();
        let second = store
            .create_category(NewCategory { name: "B".into() })
            .await
            .unwrap();
        let doctor = store
            .create_doctor(NewDoctor {
                name: "Dr. Sharma".into(),
                specialization: None,
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!((first.id, second.id, doctor.id), (1, 2, 1));
    }

    #[tokio::test]
    async fn unique_fields_are_enforced() {
        let (store, user, medicine) = store_with_medicine(40).await;

        let duplicate_user = store
            .create_user(NewUser {
                username: user.username.clone(),
                password_hash: "x".into(),
                name: "Other".into(),
                role: Role::Admin,
            })
            .await;
        assert!(matches!(duplicate_user, Err(StorageError::Conflict(_))));

        let duplicate_category = store
            .create_category(NewCategory {
                name: "Pain Relief".into(),
            })
            .await;
        assert!(matches!(duplicate_category, Err(StorageError::Conflict(_))));

        let customer = NewCustomer {
            name: "Priya".into(),
            phone: "9876543221".into(),
            email: None,
            address: None,
        };
        store.create_customer(customer.clone()).await.unwrap();
        assert!(matches!(
            store.create_customer(customer).await,
            Err(StorageError::Conflict(_))
        ));

        store
            .create_invoice(invoice("INV-1", user.id), vec![line(medicine.id, 1)])
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_invoice(invoice("INV-1", user.id), vec![line(medicine.id, 1)])
                .await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn medicine_requires_existing_category() {
        let store = MemStorage::new();
        let result = store.create_medicine(new_medicine("Orphan", 7, 1)).await;
        assert!(matches!(result, Err(StorageError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn invoice_decrements_stock() {
        let (store, user, medicine) = store_with_medicine(5).await;
        let (created, items) = store
            .create_invoice(invoice("INV-2", user.id), vec![line(medicine.id, 3)])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].invoice_id, created.id);
        assert_eq!(store.get_medicine(medicine.id).await.unwrap().unwrap().stock, 2);
        assert_eq!(store.invoice_items(created.id).await.unwrap(), items);
    }

    #[tokio::test]
    async fn oversold_invoice_leaves_stock_untouched() {
        let (store, user, medicine) = store_with_medicine(5).await;
        let other = store
            .create_medicine(new_medicine("Cetirizine 10mg", medicine.category_id, 50))
            .await
            .unwrap();

        // Two lines for the same medicine add up past the available stock.
        let result = store
            .create_invoice(
                invoice("INV-3", user.id),
                vec![line(other.id, 10), line(medicine.id, 3), line(medicine.id, 3)],
            )
            .await;
        assert!(matches!(
            result,
            Err(StorageError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));
        assert_eq!(store.get_medicine(medicine.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.get_medicine(other.id).await.unwrap().unwrap().stock, 50);
        assert!(store.list_invoices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_stock_and_expiring_filters() {
        let (store, _, healthy) = store_with_medicine(100).await;
        let mut low = new_medicine("Amoxicillin 250mg", healthy.category_id, 10);
        low.expiry_date = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let low = store.create_medicine(low).await.unwrap();

        let low_stock = store.low_stock_medicines().await.unwrap();
        assert_eq!(low_stock, vec![low.clone()]);

        let cutoff = NaiveDate::from_ymd_opt(2026, 11, 15).unwrap();
        assert_eq!(store.expiring_medicines(cutoff).await.unwrap(), vec![low]);
        let far = NaiveDate::from_ymd_opt(2028, 1, 1).unwrap();
        assert_eq!(store.expiring_medicines(far).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn medicine_filter_searches_name_and_description() {
        let (store, _, medicine) = store_with_medicine(10).await;
        let filter = MedicineFilter {
            search: Some("STRIP".into()),
            category_id: None,
        };
        assert_eq!(store.list_medicines(&filter).await.unwrap(), vec![medicine]);

        let filter = MedicineFilter {
            search: None,
            category_id: Some(42),
        };
        assert!(store.list_medicines(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_selling_ranks_by_quantity() {
        let (store, user, first) = store_with_medicine(100).await;
        let second = store
            .create_medicine(new_medicine("Azithromycin 500mg", first.category_id, 100))
            .await
            .unwrap();
        let _never_sold = store
            .create_medicine(new_medicine("Multivitamin", first.category_id, 100))
            .await
            .unwrap();

        store
            .create_invoice(invoice("INV-A", user.id), vec![line(first.id, 2), line(second.id, 3)])
            .await
            .unwrap();
        store
            .create_invoice(invoice("INV-B", user.id), vec![line(second.id, 4)])
            .await
            .unwrap();

        let top = store.top_selling_medicines(5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, second.id);
        assert_eq!(top[0].sold_units, 7);
        assert_eq!(top[0].revenue, dec!(175));
        assert_eq!(top[0].category, "Pain Relief");
        assert_eq!(top[1].id, first.id);

        assert_eq!(store.top_selling_medicines(1).await.unwrap().len(), 1);
    }
}
