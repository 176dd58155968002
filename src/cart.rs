use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::CartSettings;
use crate::notify::Notifier;
use crate::source::{CatalogSource, SourceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineParam {
    pub label: String,
    /// Chosen option id → label.
    pub options: BTreeMap<String, String>,
}

/// One product in the cart, priced at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub amount: u32,
    pub price_single: u32,
    pub price: u32,
    pub params: BTreeMap<String, CartLineParam>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    pub total_number: u32,
    pub subtotal: u32,
    pub delivery_fee: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    Added(CartLine),
    Removed(CartLine),
    Updated { position: usize, amount: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub address: String,
    pub phone: String,
    pub total_price: u32,
    pub sub_total_price: u32,
    pub total_number: u32,
    pub delivery_fee: u32,
    pub products: Vec<CartLine>,
}

pub struct Cart {
    settings: CartSettings,
    lines: Vec<CartLine>,
    totals: CartTotals,
    events: Notifier<CartEvent>,
}

impl Cart {
    pub fn new(settings: CartSettings) -> Self {
        Self {
            settings,
            lines: Vec::new(),
            totals: CartTotals::default(),
            events: Notifier::new(),
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn totals(&self) -> CartTotals {
        self.totals
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    pub fn add(&mut self, line: CartLine) {
        debug!("cart add {} x{}", line.id, line.amount);
        self.lines.push(line.clone());
        self.recompute();
        self.events.send(CartEvent::Added(line));
    }

    pub fn remove(&mut self, position: usize) -> Option<CartLine> {
        if position >= self.lines.len() {
            return None;
        }
        let line = self.lines.remove(position);
        self.recompute();
        self.events.send(CartEvent::Removed(line.clone()));
        Some(line)
    }

    /// Change a line's amount, repricing it from its unit price. Returns false
    /// for an unknown position or an unchanged amount.
    pub fn update_amount(&mut self, position: usize, amount: u32) -> bool {
        let Some(line) = self.lines.get_mut(position) else {
            return false;
        };
        if line.amount == amount {
            return false;
        }
        line.amount = amount;
        line.price = line.price_single.saturating_mul(amount);
        self.recompute();
        self.events.send(CartEvent::Updated { position, amount });
        true
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.recompute();
    }

    /// The delivery fee is charged only when something is in the cart.
    fn recompute(&mut self) {
        let total_number = self.lines.iter().map(|l| l.amount).sum::<u32>();
        let subtotal = self.lines.iter().map(|l| l.price).sum::<u32>();
        let delivery_fee = if total_number > 0 {
            self.settings.delivery_fee
        } else {
            0
        };
        self.totals = CartTotals {
            total_number,
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
        };
    }

    pub fn order_payload(&self, phone: &str, address: &str) -> OrderPayload {
        OrderPayload {
            address: address.to_string(),
            phone: phone.to_string(),
            total_price: self.totals.total,
            sub_total_price: self.totals.subtotal,
            total_number: self.totals.total_number,
            delivery_fee: self.totals.delivery_fee,
            products: self.lines.clone(),
        }
    }

    /// Post the cart as an order and empty it. On failure the cart is kept.
    pub async fn submit(
        &mut self,
        phone: &str,
        address: &str,
        source: &dyn CatalogSource,
    ) -> Result<OrderPayload, SourceError> {
        let payload = self.order_payload(phone, address);
        source.post_order(&payload).await?;
        metrics::counter!(crate::observability::ORDERS_SUBMITTED_TOTAL).increment(1);
        info!("order submitted: {} items, total {}", payload.total_number, payload.total_price);
        self.clear();
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, amount: u32, price_single: u32) -> CartLine {
        CartLine {
            id: id.into(),
            name: id.to_uppercase(),
            amount,
            price_single,
            price: amount * price_single,
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_cart_has_no_delivery_fee() {
        let cart = Cart::new(CartSettings::default());
        assert_eq!(cart.totals(), CartTotals::default());
    }

    #[test]
    fn totals_include_fee() {
        let mut cart = Cart::new(CartSettings::default());
        cart.add(line("pizza", 2, 20));
        cart.add(line("salad", 1, 9));
        let t = cart.totals();
        assert_eq!(t.total_number, 3);
        assert_eq!(t.subtotal, 49);
        assert_eq!(t.delivery_fee, 20);
        assert_eq!(t.total, 69);
    }

    #[test]
    fn removing_last_line_drops_fee() {
        let mut cart = Cart::new(CartSettings::default());
        cart.add(line("pizza", 1, 20));
        let removed = cart.remove(0).unwrap();
        assert_eq!(removed.id, "pizza");
        assert_eq!(cart.totals().total, 0);
        assert!(cart.remove(0).is_none());
    }

    #[test]
    fn update_amount_reprices_line() {
        let mut cart = Cart::new(CartSettings { delivery_fee: 5 });
        cart.add(line("pizza", 1, 20));
        assert!(cart.update_amount(0, 3));
        assert!(!cart.update_amount(0, 3));
        assert!(!cart.update_amount(4, 1));
        assert_eq!(cart.lines()[0].price, 60);
        assert_eq!(cart.totals().total, 65);
    }

    #[test]
    fn events_published_per_change() {
        let mut cart = Cart::new(CartSettings::default());
        let mut rx = cart.subscribe();
        cart.add(line("pizza", 1, 20));
        cart.update_amount(0, 2);
        cart.remove(0);
        assert!(matches!(rx.try_recv().unwrap(), CartEvent::Added(_)));
        assert_eq!(
            rx.try_recv().unwrap(),
            CartEvent::Updated { position: 0, amount: 2 }
        );
        assert!(matches!(rx.try_recv().unwrap(), CartEvent::Removed(_)));
    }

    #[test]
    fn order_payload_shape() {
        let mut cart = Cart::new(CartSettings::default());
        cart.add(line("pizza", 2, 20));
        let payload = cart.order_payload("555 123", "Main St 1");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["totalPrice"], 60);
        assert_eq!(json["subTotalPrice"], 40);
        assert_eq!(json["totalNumber"], 2);
        assert_eq!(json["deliveryFee"], 20);
        assert_eq!(json["products"][0]["priceSingle"], 20);
    }

    #[tokio::test]
    async fn submit_posts_and_empties_cart() {
        let dir = std::env::temp_dir().join("tablebook_test_cart");
        let _ = std::fs::remove_dir_all(&dir);
        let src = crate::source::JsonDirSource::new(dir.clone());

        let mut cart = Cart::new(CartSettings::default());
        cart.add(line("pizza", 2, 20));
        let payload = cart.submit("555", "Main St", &src).await.unwrap();
        assert_eq!(payload.total_price, 60);
        assert!(cart.lines().is_empty());
        assert_eq!(cart.totals().total, 0);

        let stored: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(dir.join("order.json")).unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["id"], 1);
        assert_eq!(stored[0]["products"][0]["id"], "pizza");
    }
}
