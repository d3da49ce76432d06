//! Receipt counters and the sequencer that hands out voucher numbers.
//!
//! A [`Receipt`] tracks the last sequence used for one
//! (company, voucher type, establishment, issuing point) tuple. Numbers are handed out under a
//! per-key lease and written back with a compare-and-set once the document has been saved, so a
//! sequence is never reused for the same tuple.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::catalog::{Company, CompanyId};
use crate::store::RepositoryError;

/// `codDoc` of the voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    Invoice,
    CreditNote,
    SaleTicket,
}

impl VoucherType {
    pub const ALL: [VoucherType; 3] = [
        VoucherType::Invoice,
        VoucherType::CreditNote,
        VoucherType::SaleTicket,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            VoucherType::Invoice => "01",
            VoucherType::CreditNote => "04",
            VoucherType::SaleTicket => "08",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            VoucherType::Invoice => "FACTURA",
            VoucherType::CreditNote => "NOTA DE CRÉDITO",
            VoucherType::SaleTicket => "TICKET DE VENTA",
        }
    }

    /// Sale tickets never travel through the SRI pipeline.
    pub const fn is_electronic(self) -> bool {
        !matches!(self, VoucherType::SaleTicket)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|voucher| voucher.code() == code)
    }

    /// Accepts either the SRI code (`01`) or the snake_case name (`invoice`).
    pub fn parse(value: &str) -> Option<Self> {
        Self::from_code(value).or_else(|| match value {
            "invoice" => Some(Self::Invoice),
            "credit_note" => Some(Self::CreditNote),
            "sale_ticket" => Some(Self::SaleTicket),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiptKey {
    pub company: CompanyId,
    pub voucher_type: VoucherType,
    pub establishment_code: String,
    pub issuing_point_code: String,
}

impl ReceiptKey {
    /// Key for `voucher_type` at the company's current establishment and issuing point.
    pub fn for_company(company: &Company, voucher_type: VoucherType) -> Self {
        Self {
            company: company.id.clone(),
            voucher_type,
            establishment_code: company.establishment_code.clone(),
            issuing_point_code: company.issuing_point_code.clone(),
        }
    }

    /// `EEE-PPP-NNNNNNNNN`
    pub fn full_number(&self, number: ReceiptNumber) -> String {
        format!(
            "{}-{}-{}",
            self.establishment_code, self.issuing_point_code, number
        )
    }
}

impl fmt::Display for ReceiptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}-{}",
            self.company.0,
            self.voucher_type.code(),
            self.establishment_code,
            self.issuing_point_code
        )
    }
}

/// Nine-digit voucher sequence, rendered zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ReceiptNumber(pub u64);

impl ReceiptNumber {
    pub const MAX: u64 = 999_999_999;

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:09}", self.0)
    }
}

impl From<ReceiptNumber> for String {
    fn from(value: ReceiptNumber) -> Self {
        value.to_string()
    }
}

impl FromStr for ReceiptNumber {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 9 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SequencerError::InvalidNumber(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(ReceiptNumber)
            .map_err(|_| SequencerError::InvalidNumber(s.to_string()))
    }
}

impl TryFrom<String> for ReceiptNumber {
    type Error = SequencerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Counter entity: the last sequence consumed for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub key: ReceiptKey,
    pub sequence: u64,
}

impl Receipt {
    pub fn new(key: ReceiptKey) -> Self {
        Self { key, sequence: 0 }
    }

    pub fn next_number(&self) -> ReceiptNumber {
        ReceiptNumber(self.sequence + 1)
    }

    /// Base name used when archiving authorized documents.
    pub fn file_name(&self) -> String {
        self.key.voucher_type.label().to_lowercase().replace(' ', "_")
    }
}

/// Storage abstraction for receipt counters.
pub trait ReceiptRepository: Send + Sync {
    fn receipt(&self, key: &ReceiptKey) -> Result<Option<Receipt>, RepositoryError>;
    fn receipts_for(&self, company: &CompanyId) -> Result<Vec<Receipt>, RepositoryError>;
    /// Conflicts when a receipt already exists for the key.
    fn insert_receipt(&self, receipt: Receipt) -> Result<(), RepositoryError>;
    /// Writes `new` only if the stored sequence still equals `expected`.
    fn swap_sequence(&self, key: &ReceiptKey, expected: u64, new: u64)
        -> Result<(), RepositoryError>;
    /// Moves a receipt to another key, keeping its sequence.
    fn rekey_receipt(&self, from: &ReceiptKey, to: ReceiptKey) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SequencerError {
    #[error("no receipt configured for {0}")]
    UnknownReceipt(String),
    #[error("'{0}' is not a 9-digit receipt number")]
    InvalidNumber(String),
    #[error("receipt {0} exhausted its 9-digit range")]
    Exhausted(String),
    #[error("receipt number {number} does not advance sequence {sequence} of {key}")]
    NotMonotonic {
        key: String,
        sequence: u64,
        number: u64,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Exclusive claim on a receipt key together with the number handed out under it.
///
/// Dropping the lease without committing releases the key and leaves the counter untouched.
pub struct ReceiptLease {
    receipt: Receipt,
    number: ReceiptNumber,
    _guard: OwnedMutexGuard<()>,
}

impl ReceiptLease {
    pub fn key(&self) -> &ReceiptKey {
        &self.receipt.key
    }

    /// Counter value observed when the lease was taken (or last advanced).
    pub fn base_sequence(&self) -> u64 {
        self.receipt.sequence
    }

    pub fn number(&self) -> ReceiptNumber {
        self.number
    }

    pub fn full_number(&self) -> String {
        self.receipt.key.full_number(self.number)
    }
}

impl fmt::Debug for ReceiptLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptLease")
            .field("key", &self.receipt.key)
            .field("base_sequence", &self.receipt.sequence)
            .field("number", &self.number)
            .finish()
    }
}

/// Hands out receipt numbers and writes counters back.
pub struct ReceiptSequencer<R: ?Sized> {
    repository: Arc<R>,
    leases: Mutex<HashMap<ReceiptKey, Arc<AsyncMutex<()>>>>,
}

impl<R> ReceiptSequencer<R>
where
    R: ReceiptRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            leases: Mutex::new(HashMap::new()),
        }
    }

    fn load(&self, key: &ReceiptKey) -> Result<Receipt, SequencerError> {
        self.repository
            .receipt(key)?
            .ok_or_else(|| SequencerError::UnknownReceipt(key.to_string()))
    }

    fn lock_for(&self, key: &ReceiptKey) -> Result<Arc<AsyncMutex<()>>, SequencerError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| RepositoryError::Unavailable("receipt lease table poisoned".into()))?;
        Ok(leases
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Creates zeroed receipts for every voucher type at the company's current codes.
    pub fn ensure_receipts(&self, company: &Company) -> Result<Vec<Receipt>, SequencerError> {
        let mut receipts = Vec::with_capacity(VoucherType::ALL.len());
        for voucher_type in VoucherType::ALL {
            let key = ReceiptKey::for_company(company, voucher_type);
            match self.repository.receipt(&key)? {
                Some(existing) => receipts.push(existing),
                None => {
                    let receipt = Receipt::new(key);
                    match self.repository.insert_receipt(receipt.clone()) {
                        Ok(()) | Err(RepositoryError::Conflict) => {}
                        Err(other) => return Err(other.into()),
                    }
                    receipts.push(receipt);
                }
            }
        }
        Ok(receipts)
    }

    /// Preview of the number the next reservation would receive. Does not mutate state.
    pub fn next_number(&self, key: &ReceiptKey) -> Result<ReceiptNumber, SequencerError> {
        let receipt = self.load(key)?;
        if receipt.sequence >= ReceiptNumber::MAX {
            return Err(SequencerError::Exhausted(key.to_string()));
        }
        Ok(receipt.next_number())
    }

    /// Waits for exclusive use of `key` and hands out `sequence + 1`.
    pub async fn reserve(&self, key: &ReceiptKey) -> Result<ReceiptLease, SequencerError> {
        let guard = self.lock_for(key)?.lock_owned().await;
        let receipt = self.load(key)?;
        if receipt.sequence >= ReceiptNumber::MAX {
            return Err(SequencerError::Exhausted(key.to_string()));
        }
        let number = receipt.next_number();
        debug!(receipt = %key, number = %number, "receipt number reserved");
        Ok(ReceiptLease {
            receipt,
            number,
            _guard: guard,
        })
    }

    /// Writes the leased number back as the new counter value and releases the key.
    pub fn commit(&self, lease: ReceiptLease) -> Result<Receipt, SequencerError> {
        let ReceiptLease {
            mut receipt,
            number,
            _guard,
        } = lease;
        if number.value() <= receipt.sequence {
            return Err(SequencerError::NotMonotonic {
                key: receipt.key.to_string(),
                sequence: receipt.sequence,
                number: number.value(),
            });
        }
        self.repository
            .swap_sequence(&receipt.key, receipt.sequence, number.value())?;
        receipt.sequence = number.value();
        info!(receipt = %receipt.key, sequence = receipt.sequence, "receipt sequence committed");
        Ok(receipt)
    }

    /// Burns the leased number after the authority reported it as already registered and
    /// moves the lease to the following one.
    pub fn skip(&self, lease: &mut ReceiptLease) -> Result<ReceiptNumber, SequencerError> {
        let burned = lease.number;
        self.repository
            .swap_sequence(&lease.receipt.key, lease.receipt.sequence, burned.value())?;
        lease.receipt.sequence = burned.value();
        if burned.value() >= ReceiptNumber::MAX {
            return Err(SequencerError::Exhausted(lease.receipt.key.to_string()));
        }
        lease.number = lease.receipt.next_number();
        info!(
            receipt = %lease.receipt.key,
            burned = %burned,
            next = %lease.number,
            "duplicate sequence skipped"
        );
        Ok(lease.number)
    }

    /// Moves the counter to at least `number` outside of any reservation.
    pub async fn advance_past(
        &self,
        key: &ReceiptKey,
        number: ReceiptNumber,
    ) -> Result<Receipt, SequencerError> {
        let _guard = self.lock_for(key)?.lock_owned().await;
        let mut receipt = self.load(key)?;
        if receipt.sequence >= number.value() {
            return Ok(receipt);
        }
        self.repository
            .swap_sequence(key, receipt.sequence, number.value())?;
        receipt.sequence = number.value();
        info!(receipt = %key, sequence = receipt.sequence, "receipt sequence advanced");
        Ok(receipt)
    }

    /// Moves every receipt of `company` to new establishment/issuing-point codes, keeping
    /// sequences. Keys that already exist at the new codes are left alone.
    pub async fn realign_codes(
        &self,
        company: &CompanyId,
        establishment_code: &str,
        issuing_point_code: &str,
    ) -> Result<usize, SequencerError> {
        let mut moved = 0;
        for receipt in self.repository.receipts_for(company)? {
            if receipt.key.establishment_code == establishment_code
                && receipt.key.issuing_point_code == issuing_point_code
            {
                continue;
            }
            let _guard = self.lock_for(&receipt.key)?.lock_owned().await;
            let target = ReceiptKey {
                establishment_code: establishment_code.to_string(),
                issuing_point_code: issuing_point_code.to_string(),
                ..receipt.key.clone()
            };
            match self.repository.rekey_receipt(&receipt.key, target) {
                Ok(()) => moved += 1,
                Err(RepositoryError::Conflict) => {
                    debug!(receipt = %receipt.key, "target codes already configured; skipped");
                }
                Err(other) => return Err(other.into()),
            }
        }
        if moved > 0 {
            info!(company = %company.0, moved, establishment_code, issuing_point_code, "receipts realigned");
        }
        Ok(moved)
    }
}
