//! Shared fixtures for ledger integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use tally_core::pricing::LineInput;
use tally_core::{Money, NewOutbound, NewReceipt, NewSale, OutboundKind, PaymentMethod, Quantity};
use tally_db::{Database, DbConfig};
use tally_ledger::{Ledger, RetryPolicy};

pub struct Shop {
    pub ledger: Ledger,
    pub main: String,
    pub bar: String,
    /// Stock-tracked.
    pub beans: String,
    /// In a preparation category.
    pub latte: String,
}

pub async fn shop() -> Shop {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = db.catalog();

    let main = catalog.create_warehouse("MAIN", "Store room").await.unwrap().id;
    let bar = catalog.create_warehouse("BAR", "Bar").await.unwrap().id;

    let goods = catalog.create_category("Dry goods", false).await.unwrap();
    let drinks = catalog.create_category("Made to order", true).await.unwrap();

    let beans = catalog
        .create_product("DRY-001", "Arabica Beans", "kg", Some(goods.id.as_str()), Money::from_cents(2400))
        .await
        .unwrap()
        .id;
    let latte = catalog
        .create_product("MTO-001", "Latte", "cup", Some(drinks.id.as_str()), Money::from_cents(450))
        .await
        .unwrap()
        .id;

    Shop {
        ledger: Ledger::new(db, RetryPolicy::default()),
        main,
        bar,
        beans,
        latte,
    }
}

pub fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

pub fn qty(whole: i64) -> Quantity {
    Quantity::from_whole(whole)
}

pub fn receipt(warehouse_id: &str, product_id: &str, whole: i64, date: NaiveDate) -> NewReceipt {
    NewReceipt {
        doc_date: date,
        warehouse_id: warehouse_id.to_string(),
        supplier_id: Some("sup-roastery".to_string()),
        notes: None,
        lines: vec![LineInput::new(product_id, qty(whole), Money::from_cents(2400))],
        created_by: "clerk".to_string(),
    }
}

pub fn transfer(from: &str, to: &str, product_id: &str, whole: i64, date: NaiveDate) -> NewOutbound {
    NewOutbound {
        doc_date: date,
        kind: OutboundKind::Transfer,
        warehouse_id: from.to_string(),
        destination_warehouse_id: Some(to.to_string()),
        supplier_id: None,
        reason: Some("restock bar".to_string()),
        notes: None,
        lines: vec![LineInput::new(product_id, qty(whole), Money::zero())],
        created_by: "clerk".to_string(),
    }
}

pub fn cash_sale(warehouse_id: &str, product_id: &str, whole: i64, date: NaiveDate) -> NewSale {
    NewSale {
        doc_date: date,
        warehouse_id: warehouse_id.to_string(),
        customer_id: None,
        table_order_ref: None,
        payment_method: PaymentMethod::Cash,
        transaction_code: None,
        amount_received: Some(Money::from_cents(1_000_000)),
        notes: None,
        lines: vec![LineInput::new(product_id, qty(whole), Money::from_cents(2400)).into()],
        created_by: "cashier".to_string(),
    }
}

/// Creates and confirms a receipt in one go.
pub async fn stock_up(shop: &Shop, warehouse_id: &str, whole: i64, date: NaiveDate) {
    let doc = shop
        .ledger
        .create_receipt(&receipt(warehouse_id, &shop.beans, whole, date))
        .await
        .unwrap();
    shop.ledger.confirm_receipt(&doc.header.id, "clerk").await.unwrap();
}
