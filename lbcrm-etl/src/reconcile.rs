//! Sale to customer reconciliation by phone number
//!
//! Every valid phone of every customer is entered into a directory; each
//! sale's normalized phone is then looked up there. There is no fallback
//! match by name.

use crate::ingest::{CustomerRecord, NormalizedPhone, SaleRecord};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::{debug, info};

/// Customer fields attached to a matched sale
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerIdentity {
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub tax_id: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
    pub store_credit: f64,
}

impl From<&CustomerRecord> for CustomerIdentity {
    fn from(customer: &CustomerRecord) -> Self {
        Self {
            external_id: customer.external_id.clone(),
            full_name: customer.full_name.clone(),
            tax_id: customer.tax_id.clone(),
            registration_date: customer.registration_date,
            store_credit: customer.store_credit.unwrap_or(0.0),
        }
    }
}

/// Normalized phone to customer lookup
///
/// A phone maps to at most one customer. When two customers share a phone
/// the one processed last wins; such collisions are counted.
#[derive(Debug, Default)]
pub struct PhoneDirectory {
    entries: HashMap<String, CustomerIdentity>,
    collisions: usize,
}

impl PhoneDirectory {
    /// Build from customers in input order
    pub fn build(customers: &[CustomerRecord]) -> Self {
        let mut directory = Self::default();

        for customer in customers {
            let identity = CustomerIdentity::from(customer);
            for phone in customer.normalized_phones.iter().filter_map(NormalizedPhone::digits) {
                directory.insert(phone, identity.clone());
            }
        }

        info!(
            "Phone directory built: {} phones, {} collisions",
            directory.len(),
            directory.collisions
        );
        directory
    }

    fn insert(&mut self, phone: &str, identity: CustomerIdentity) {
        if let Some(previous) = self.entries.insert(phone.to_string(), identity) {
            if self.entries.get(phone) != Some(&previous) {
                self.collisions += 1;
                debug!(
                    phone,
                    replaced = ?previous.tax_id,
                    "Phone shared by several customers, last one wins"
                );
            }
        }
    }

    pub fn lookup(&self, phone: &NormalizedPhone) -> Option<&CustomerIdentity> {
        phone.digits().and_then(|digits| self.entries.get(digits))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of phone entries that replaced another customer
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

/// A sale with its resolved customer, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledSale {
    pub sale: SaleRecord,
    pub customer: Option<CustomerIdentity>,
}

impl ReconciledSale {
    /// Resolved, non-empty customer tax id
    pub fn tax_id(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.tax_id.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Attach customer identities to sales, preserving sale order
pub fn reconcile(sales: Vec<SaleRecord>, directory: &PhoneDirectory) -> Vec<ReconciledSale> {
    let reconciled: Vec<ReconciledSale> = sales
        .into_iter()
        .map(|sale| {
            let customer = directory.lookup(&sale.normalized_phone).cloned();
            ReconciledSale { sale, customer }
        })
        .collect();

    let matched = reconciled.iter().filter(|s| s.customer.is_some()).count();
    info!(
        "Reconciled sales: {} of {} matched to a customer",
        matched,
        reconciled.len()
    );
    reconciled
}
