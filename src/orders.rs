//! Orders a bot has placed and still believes are open

use std::collections::HashSet;

use crate::types::{Order, Side};

/// Ordered set of the bot's own live orders
///
/// Appended on placement, filtered against the exchange's open-order list
/// on reconciliation. Only ids are checked; amounts and prices are whatever
/// was recorded at placement.
#[derive(Debug, Clone, Default)]
pub struct ActiveOrders {
    orders: Vec<Order>,
}

impl ActiveOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, order: Order) {
        self.orders.push(order);
    }

    /// Keep only orders whose id is in `open_ids`, preserving order
    ///
    /// Returns how many entries were dropped.
    pub fn retain_open<'a, I>(&mut self, open_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let open: HashSet<&str> = open_ids.into_iter().collect();
        let before = self.orders.len();
        self.orders.retain(|order| open.contains(order.id.as_str()));
        before - self.orders.len()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn count_side(&self, side: Side) -> usize {
        self.orders.iter().filter(|o| o.side == side).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.orders.iter().map(|o| o.id.as_str()).collect()
    }
}
