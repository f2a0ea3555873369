//! Basket and basket item types
//!
//! A [`Basket`] is the itemised representation of what is being purchased.
//! Baskets are mutable and move between participants: a flow service may add
//! items, and the split stage may hand part of a basket to the next transaction.

use crate::types::{AdditionalData, AppFlowError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line item in a basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    id: String,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    individual_amount: i64,
    count: u32,
    #[serde(default)]
    references: AdditionalData,
}

impl BasketItem {
    /// Create an item with a generated id
    pub fn new(label: &str, individual_amount: i64, count: u32) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), label, individual_amount, count)
    }

    /// Create an item with a caller-supplied id
    pub fn with_id(id: &str, label: &str, individual_amount: i64, count: u32) -> Self {
        BasketItem {
            id: id.to_string(),
            label: label.to_string(),
            category: None,
            individual_amount,
            count,
            references: AdditionalData::new(),
        }
    }

    /// Set the item category
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Amount for a single unit; negative for discounts
    pub fn individual_amount(&self) -> i64 {
        self.individual_amount
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Bespoke data attached to the item
    pub fn references(&self) -> &AdditionalData {
        &self.references
    }

    /// `individual_amount × count`
    pub fn total_amount(&self) -> i64 {
        self.individual_amount * i64::from(self.count)
    }
}

/// An ordered collection of basket items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    basket_name: Option<String>,
    #[serde(default)]
    items: Vec<BasketItem>,
    #[serde(default)]
    additional_data: AdditionalData,
}

impl Basket {
    /// Create a named basket with the given items
    pub fn new(basket_name: &str, items: Vec<BasketItem>) -> Self {
        Basket {
            id: Uuid::new_v4().to_string(),
            basket_name: Some(basket_name.to_string()),
            items,
            additional_data: AdditionalData::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn basket_name(&self) -> Option<&str> {
        self.basket_name.as_deref()
    }

    pub fn items(&self) -> &[BasketItem] {
        &self.items
    }

    pub fn additional_data(&self) -> &AdditionalData {
        &self.additional_data
    }

    /// Append items as-is
    pub fn add_items(&mut self, items: Vec<BasketItem>) {
        self.items.extend(items);
    }

    /// Add an item, merging it into an existing item with the same label
    ///
    /// When an item with the same label exists its count is increased by the
    /// new item's count; otherwise the item is appended.
    ///
    /// # Returns
    ///
    /// The resulting count for that label.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the merged count overflows; the basket is
    /// unchanged.
    pub fn add_item_merge(&mut self, item: BasketItem) -> Result<u32, AppFlowError> {
        match self.items.iter_mut().find(|existing| existing.label == item.label) {
            Some(existing) => {
                existing.count = checked_count(existing, item.count)?;
                Ok(existing.count)
            }
            None => {
                let count = item.count;
                self.items.push(item);
                Ok(count)
            }
        }
    }

    pub fn item_by_id(&self, id: &str) -> Option<&BasketItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn has_item_with_id(&self, id: &str) -> bool {
        self.item_by_id(id).is_some()
    }

    /// Increase the count of an item
    ///
    /// # Errors
    ///
    /// Returns `BasketItemNotFound` if no item has this id, or
    /// `InvalidArgument` if the count overflows.
    pub fn increment_item_count(&mut self, id: &str, by: u32) -> Result<u32, AppFlowError> {
        let item = self.item_mut(id)?;
        item.count = checked_count(item, by)?;
        Ok(item.count)
    }

    /// Decrease the count of an item
    ///
    /// The count never goes below zero. When it reaches zero and
    /// `remove_if_zero` is set the item is removed from the basket.
    ///
    /// # Errors
    ///
    /// Returns `BasketItemNotFound` if no item has this id, or `InvalidItemCount`
    /// if `by` exceeds the current count.
    pub fn decrement_item_count(
        &mut self,
        id: &str,
        by: u32,
        remove_if_zero: bool,
    ) -> Result<u32, AppFlowError> {
        let item = self.item_mut(id)?;
        if by > item.count {
            return Err(AppFlowError::InvalidItemCount {
                item_id: id.to_string(),
                count: item.count,
                by,
            });
        }
        item.count -= by;
        let remaining = item.count;
        if remaining == 0 && remove_if_zero {
            self.items.retain(|item| item.id != id);
        }
        Ok(remaining)
    }

    /// Replace the item that has the same id as `item`
    ///
    /// # Errors
    ///
    /// Returns `BasketItemNotFound` if no item has this id.
    pub fn replace_item(&mut self, item: BasketItem) -> Result<(), AppFlowError> {
        let existing = self.item_mut(&item.id.clone())?;
        *existing = item;
        Ok(())
    }

    /// Remove an item, returning it if it existed
    pub fn remove_item(&mut self, id: &str) -> Option<BasketItem> {
        let position = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(position))
    }

    /// Σ(individual amount × count) over all items
    pub fn total_basket_value(&self) -> i64 {
        self.items.iter().map(BasketItem::total_amount).sum()
    }

    pub fn number_of_unique_items(&self) -> usize {
        self.items.len()
    }

    /// Sum of all item counts
    pub fn total_number_of_items(&self) -> u32 {
        self.items.iter().map(|item| item.count).sum()
    }

    /// Move the items with the given ids into a new basket
    ///
    /// Ids that are not present are ignored. Item order is preserved in both baskets.
    pub fn split_off(&mut self, ids: &[&str], basket_name: &str) -> Basket {
        let (moved, kept): (Vec<BasketItem>, Vec<BasketItem>) = self
            .items
            .drain(..)
            .partition(|item| ids.contains(&item.id.as_str()));
        self.items = kept;
        Basket::new(basket_name, moved)
    }

    /// Move `count` units of an item into another basket
    ///
    /// The units are merged by label into `to`. The source item is removed once
    /// its count reaches zero.
    ///
    /// # Errors
    ///
    /// Returns `BasketItemNotFound` if no item has this id, `InvalidItemCount`
    /// if `count` exceeds the available units, or `InvalidArgument` if the
    /// merged count in `to` would overflow. Neither basket changes on error.
    pub fn transfer_count(&mut self, to: &mut Basket, id: &str, count: u32) -> Result<(), AppFlowError> {
        let mut moved = self
            .item_by_id(id)
            .cloned()
            .ok_or_else(|| AppFlowError::basket_item_not_found(id))?;
        if let Some(existing) = to.items.iter().find(|existing| existing.label == moved.label) {
            checked_count(existing, count)?;
        }
        self.decrement_item_count(id, count, true)?;
        moved.count = count;
        to.add_item_merge(moved)?;
        Ok(())
    }

    fn item_mut(&mut self, id: &str) -> Result<&mut BasketItem, AppFlowError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AppFlowError::basket_item_not_found(id))
    }
}

fn checked_count(item: &BasketItem, by: u32) -> Result<u32, AppFlowError> {
    item.count.checked_add(by).ok_or_else(|| {
        AppFlowError::invalid_argument(format!(
            "count of item '{}' overflows: {} + {}",
            item.id, item.count, by
        ))
    })
}
