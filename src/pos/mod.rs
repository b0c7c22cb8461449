//! Point-of-sale cart: the running bill a pharmacist builds before an invoice
//! is issued.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{Medicine, NewInvoiceItem};

#[derive(Error, Debug, PartialEq)]
pub enum CartError {
    #[error("Only {available} units of {name} available in stock")]
    StockLimit { name: String, available: i32 },
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,
    #[error("Medicine {0} is not in the cart")]
    NotInCart(i32),
    #[error("Medicine {0} not found")]
    UnknownMedicine(i32),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartLine {
    pub medicine_id: i32,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub gst_rate: Decimal,
    pub gst_amount: Decimal,
    pub total_price: Decimal,
    pub available_stock: i32,
}

impl CartLine {
    fn new(medicine: &Medicine) -> Self {
        let mut line = Self {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            quantity: 1,
            unit_price: medicine.mrp,
            gst_rate: medicine.gst_rate,
            gst_amount: Decimal::ZERO,
            total_price: Decimal::ZERO,
            available_stock: medicine.stock,
        };
        line.recompute();
        line
    }

    pub fn line_subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    fn recompute(&mut self) {
        let base = self.line_subtotal();
        self.gst_amount = base * self.gst_rate / Decimal::ONE_HUNDRED;
        self.total_price = base + self.gst_amount;
    }

    fn set_quantity(&mut self, quantity: i32) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity);
        }
        if quantity > self.available_stock {
            return Err(CartError::StockLimit {
                name: self.name.clone(),
                available: self.available_stock,
            });
        }
        self.quantity = quantity;
        self.recompute();
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
}

/// A requested sale line: which medicine and how many units.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CartRequestItem {
    pub medicine_id: i32,
    pub quantity: i32,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from requested lines. Repeated medicine ids are merged and
    /// every quantity is checked against the stock of `medicines`.
    pub fn from_request(
        items: &[CartRequestItem],
        medicines: &BTreeMap<i32, Medicine>,
    ) -> Result<Self, CartError> {
        let mut cart = Cart::new();
        for item in items {
            if item.quantity <= 0 {
                return Err(CartError::InvalidQuantity);
            }
            let medicine = medicines
                .get(&item.medicine_id)
                .ok_or(CartError::UnknownMedicine(item.medicine_id))?;
            let already = cart.line(item.medicine_id).map_or(0, |line| line.quantity);
            if already == 0 {
                cart.add(medicine)?;
            }
            let quantity = already
                .checked_add(item.quantity)
                .ok_or_else(|| CartError::StockLimit {
                    name: medicine.name.clone(),
                    available: medicine.stock.max(0),
                })?;
            cart.update_quantity(item.medicine_id, quantity)?;
        }
        Ok(cart)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, medicine_id: i32) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.medicine_id == medicine_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds one unit of `medicine`, as tapping a medicine card on the till does.
    pub fn add(&mut self, medicine: &Medicine) -> Result<(), CartError> {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.medicine_id == medicine.id)
        {
            line.available_stock = medicine.stock;
            let quantity = line.quantity.checked_add(1).ok_or_else(|| CartError::StockLimit {
                name: line.name.clone(),
                available: line.available_stock,
            })?;
            return line.set_quantity(quantity);
        }
        if medicine.stock <= 0 {
            return Err(CartError::StockLimit {
                name: medicine.name.clone(),
                available: medicine.stock.max(0),
            });
        }
        self.lines.push(CartLine::new(medicine));
        Ok(())
    }

    pub fn remove(&mut self, medicine_id: i32) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|line| line.medicine_id == medicine_id)
            .ok_or(CartError::NotInCart(medicine_id))?;
        Ok(self.lines.remove(index))
    }

    pub fn update_quantity(&mut self, medicine_id: i32, quantity: i32) -> Result<(), CartError> {
        self.lines
            .iter_mut()
            .find(|line| line.medicine_id == medicine_id)
            .ok_or(CartError::NotInCart(medicine_id))?
            .set_quantity(quantity)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn totals(&self) -> CartTotals {
        let subtotal: Decimal = self.lines.iter().map(CartLine::line_subtotal).sum();
        let gst_amount: Decimal = self.lines.iter().map(|line| line.gst_amount).sum();
        CartTotals {
            subtotal,
            gst_amount,
            total: subtotal + gst_amount,
        }
    }

    pub fn invoice_items(&self) -> Vec<NewInvoiceItem> {
        self.lines
            .iter()
            .map(|line| NewInvoiceItem {
                medicine_id: line.medicine_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                gst_rate: line.gst_rate,
                gst_amount: line.gst_amount,
                total_price: line.total_price,
            })
            .collect()
    }
}

/// A cart rendered with its totals, the response of the quote endpoint.
#[derive(Serialize, Debug, Clone)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

impl From<&Cart> for CartSummary {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines.clone(),
            totals: cart.totals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn medicine(id: i32, mrp: Decimal, gst_rate: Decimal, stock: i32) -> Medicine {
        Medicine {
            id,
            name: format!("Medicine {}", id),
            description: None,
            category_id: 1,
            form: "tablet".into(),
            batch_number: "B1".into(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 31).unwrap(),
            mrp,
            stock,
            low_stock_threshold: 10,
            gst_rate,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn add_starts_at_one_and_increments() {
        let paracetamol = medicine(1, dec!(25), dec!(18), 10);
        let mut cart = Cart::new();
        cart.add(&paracetamol).unwrap();
        assert_eq!(cart.line(1).unwrap().quantity, 1);
        assert_eq!(cart.line(1).unwrap().gst_amount, dec!(4.5));
        assert_eq!(cart.line(1).unwrap().total_price, dec!(29.5));

        cart.add(&paracetamol).unwrap();
        let line = cart.line(1).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.gst_amount, dec!(9));
        assert_eq!(line.total_price, dec!(59));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn add_stops_at_available_stock() {
        let scarce = medicine(3, dec!(30), dec!(18), 2);
        let mut cart = Cart::new();
        cart.add(&scarce).unwrap();
        cart.add(&scarce).unwrap();
        assert_eq!(
            cart.add(&scarce),
            Err(CartError::StockLimit {
                name: "Medicine 3".into(),
                available: 2
            })
        );
        assert_eq!(cart.line(3).unwrap().quantity, 2);

        let empty = medicine(4, dec!(30), dec!(18), 0);
        assert!(matches!(cart.add(&empty), Err(CartError::StockLimit { .. })));
    }

    #[test]
    fn update_quantity_validates_bounds() {
        let mut cart = Cart::new();
        cart.add(&medicine(1, dec!(80), dec!(12), 5)).unwrap();

        assert_eq!(cart.update_quantity(1, 0), Err(CartError::InvalidQuantity));
        assert!(matches!(
            cart.update_quantity(1, 6),
            Err(CartError::StockLimit { .. })
        ));
        assert_eq!(cart.update_quantity(9, 1), Err(CartError::NotInCart(9)));

        cart.update_quantity(1, 5).unwrap();
        let line = cart.line(1).unwrap();
        assert_eq!(line.gst_amount, dec!(48));
        assert_eq!(line.total_price, dec!(448));
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(&medicine(1, dec!(10), dec!(5), 5)).unwrap();
        cart.add(&medicine(2, dec!(20), dec!(5), 5)).unwrap();

        let removed = cart.remove(1).unwrap();
        assert_eq!(removed.medicine_id, 1);
        assert_eq!(cart.remove(1), Err(CartError::NotInCart(1)));
        assert_eq!(cart.lines().len(), 1);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.totals().total, Decimal::ZERO);
    }

    #[test]
    fn flat_rate_gst_equals_subtotal_times_rate() {
        let mut cart = Cart::new();
        for (id, mrp) in [(1, dec!(25)), (2, dec!(90)), (3, dec!(12.35))] {
            cart.add(&medicine(id, mrp, dec!(18), 100)).unwrap();
        }
        cart.update_quantity(2, 3).unwrap();
        cart.update_quantity(3, 7).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.subtotal, dec!(381.45));
        assert_eq!(totals.gst_amount, totals.subtotal * dec!(18) / dec!(100));
        assert_eq!(totals.total, totals.subtotal + totals.gst_amount);
    }

    #[test]
    fn mixed_rates_sum_per_line() {
        let mut cart = Cart::new();
        cart.add(&medicine(1, dec!(100), dec!(5), 10)).unwrap();
        cart.add(&medicine(2, dec!(100), dec!(12), 10)).unwrap();
        let totals = cart.totals();
        assert_eq!(totals.subtotal, dec!(200));
        assert_eq!(totals.gst_amount, dec!(17));
        assert_eq!(totals.total, dec!(217));
    }

    fn item(medicine_id: i32, quantity: i32) -> CartRequestItem {
        CartRequestItem {
            medicine_id,
            quantity,
        }
    }

    #[test]
    fn from_request_merges_repeated_medicines() {
        let medicines = BTreeMap::from([
            (1, medicine(1, dec!(25), dec!(18), 10)),
            (2, medicine(2, dec!(90), dec!(18), 1)),
        ]);
        let items = [item(1, 2), item(2, 1), item(1, 3)];
        let cart = Cart::from_request(&items, &medicines).unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.line(1).unwrap().quantity, 5);

        let too_many = [item(2, 2)];
        assert!(matches!(
            Cart::from_request(&too_many, &medicines),
            Err(CartError::StockLimit { available: 1, .. })
        ));

        let unknown = [item(9, 1)];
        assert_eq!(
            Cart::from_request(&unknown, &medicines),
            Err(CartError::UnknownMedicine(9))
        );

        let zero = [item(1, 0)];
        assert_eq!(
            Cart::from_request(&zero, &medicines),
            Err(CartError::InvalidQuantity)
        );

        let overflowing = [item(1, 1), item(1, i32::MAX)];
        assert!(matches!(
            Cart::from_request(&overflowing, &medicines),
            Err(CartError::StockLimit { available: 10, .. })
        ));
    }

    #[test]
    fn invoice_items_mirror_lines() {
        let mut cart = Cart::new();
        cart.add(&medicine(1, dec!(25), dec!(18), 10)).unwrap();
        let items = cart.invoice_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_price, dec!(29.5));
    }
}
