use crate::domain::idempotency::{IdempotencyEntry, IdempotencyKey, Reservation};
use crate::domain::payment::{Payment, Transition};
use crate::domain::ports::{IdempotencyStore, OrderSequence, PaymentStore};
use crate::domain::refund::Refund;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment aggregates, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for refunds, keyed by `payment_id 0x00 refund_id`.
pub const CF_REFUNDS: &str = "refunds";
/// Column Family for idempotency entries, keyed by `endpoint 0x00 key`.
pub const CF_IDEMPOTENCY: &str = "idempotency";
/// Column Family for counters.
pub const CF_META: &str = "meta";

const ORDER_SEQ_KEY: &[u8] = b"order_seq";
const REFUND_SEQ_KEY: &[u8] = b"refund_seq";

/// A persistent store implementation using RocksDB.
///
/// Implements the payment, idempotency and order-sequence ports over separate
/// Column Families of one database. Read-modify-write operations run under a
/// shared write lock so each conditional update is atomic per row.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_PAYMENTS, CF_REFUNDS, CF_IDEMPOTENCY, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::internal(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    /// Increments a counter in the meta family. Caller must hold the write lock.
    fn bump_counter(&self, batch: &mut WriteBatch, key: &[u8]) -> Result<u64> {
        let meta = self.cf(CF_META)?;
        let current = match self.db.get_pinned_cf(meta, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| PaymentError::internal("corrupt counter value"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(meta, key, next.to_be_bytes());
        Ok(next)
    }
}

fn refund_key(payment_id: &str, refund_id: u64) -> Vec<u8> {
    let mut key = refund_prefix(payment_id);
    key.extend_from_slice(&refund_id.to_be_bytes());
    key
}

fn refund_prefix(payment_id: &str) -> Vec<u8> {
    let mut key = payment_id.as_bytes().to_vec();
    key.push(0);
    key
}

fn idempotency_key(key: &IdempotencyKey) -> Vec<u8> {
    let mut raw = key.endpoint.as_bytes().to_vec();
    raw.push(0);
    raw.extend_from_slice(key.key.as_bytes());
    raw
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read::<Payment>(CF_PAYMENTS, payment.id.as_bytes())?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        self.write(CF_PAYMENTS, payment.id.as_bytes(), &payment)
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, payment_id.as_bytes())
    }

    async fn apply(
        &self,
        payment_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut payment) = self.read::<Payment>(CF_PAYMENTS, payment_id.as_bytes())? else {
            return Ok(false);
        };
        if !payment.apply(transition, now) {
            return Ok(false);
        }
        self.write(CF_PAYMENTS, payment_id.as_bytes(), &payment)?;
        Ok(true)
    }

    async fn insert_refund(&self, payment_id: &str, now: DateTime<Utc>) -> Result<Refund> {
        let _guard = self.write_lock.lock().await;
        let payment = self
            .read::<Payment>(CF_PAYMENTS, payment_id.as_bytes())?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

        let mut batch = WriteBatch::default();
        let id = self.bump_counter(&mut batch, REFUND_SEQ_KEY)?;
        let refund = Refund {
            id,
            payment_id: payment_id.to_string(),
            amount_cents: payment.captured_amount_cents,
            created_at: now,
        };
        batch.put_cf(
            self.cf(CF_REFUNDS)?,
            refund_key(payment_id, id),
            serde_json::to_vec(&refund)?,
        );
        self.db.write(batch)?;
        Ok(refund)
    }

    async fn captured_amount(&self, payment_id: &str) -> Result<Option<i64>> {
        Ok(self
            .read::<Payment>(CF_PAYMENTS, payment_id.as_bytes())?
            .map(|p| p.captured_amount_cents))
    }

    async fn refunds(&self, payment_id: &str) -> Result<Vec<Refund>> {
        let cf = self.cf(CF_REFUNDS)?;
        let prefix = refund_prefix(payment_id);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut refunds = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            refunds.push(serde_json::from_slice(&value)?);
        }
        Ok(refunds)
    }
}

#[async_trait]
impl IdempotencyStore for RocksDBStore {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<String>> {
        let entry: Option<IdempotencyEntry> = self.read(CF_IDEMPOTENCY, &idempotency_key(key))?;
        Ok(entry.and_then(|e| e.response))
    }

    async fn put(&self, key: &IdempotencyKey, response: String, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let raw = idempotency_key(key);
        let entry = match self.read::<IdempotencyEntry>(CF_IDEMPOTENCY, &raw)? {
            Some(mut existing) => {
                existing.complete(response, now);
                existing
            }
            None => IdempotencyEntry::completed(response, now),
        };
        self.write(CF_IDEMPOTENCY, &raw, &entry)
    }

    async fn reserve(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<Reservation> {
        let _guard = self.write_lock.lock().await;
        let raw = idempotency_key(key);
        if let Some(existing) = self.read::<IdempotencyEntry>(CF_IDEMPOTENCY, &raw)?
            && !existing.is_abandoned(now)
        {
            return Ok(existing.reservation());
        }
        self.write(CF_IDEMPOTENCY, &raw, &IdempotencyEntry::pending(now))?;
        Ok(Reservation::Acquired)
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let raw = idempotency_key(key);
        if let Some(entry) = self.read::<IdempotencyEntry>(CF_IDEMPOTENCY, &raw)?
            && entry.response.is_none()
        {
            self.db.delete_cf(self.cf(CF_IDEMPOTENCY)?, &raw)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderSequence for RocksDBStore {
    async fn next(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let next = self.bump_counter(&mut batch, ORDER_SEQ_KEY)?;
        self.db.write(batch)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::idempotency::{AUTHORIZE_ENDPOINT, RESERVATION_LEASE_SECONDS};
    use crate::domain::payment::{AmountCents, Currency, PaymentStatus};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn payment(id: &str, amount: i64) -> Payment {
        Payment::authorize(
            id.to_string(),
            "ORD-1".to_string(),
            AmountCents::new(amount).unwrap(),
            Currency::parse("usd").unwrap(),
            t0(),
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [CF_PAYMENTS, CF_REFUNDS, CF_IDEMPOTENCY, CF_META] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_payment_lifecycle() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let p = payment("pay_1", 500);
        PaymentStore::insert(&store, p.clone()).await.unwrap();
        assert!(PaymentStore::insert(&store, p.clone()).await.is_err());

        let retrieved = PaymentStore::get(&store, "pay_1").await.unwrap().unwrap();
        assert_eq!(retrieved, p);

        let capture = Transition::Capture {
            amount_cents: AmountCents::new(500).unwrap(),
        };
        assert!(store.apply("pay_1", capture, t0()).await.unwrap());
        assert!(!store.apply("pay_1", capture, t0()).await.unwrap());
        assert!(!store.apply("pay_9", capture, t0()).await.unwrap());
        assert!(store.apply("pay_1", Transition::Refund, t0()).await.unwrap());

        let refund = store.insert_refund("pay_1", t0()).await.unwrap();
        assert_eq!(refund.id, 1);
        assert_eq!(refund.amount_cents, 500);
        assert_eq!(store.refunds("pay_1").await.unwrap(), vec![refund]);
        assert!(store.refunds("pay_").await.unwrap().is_empty());

        let stored = PaymentStore::get(&store, "pay_1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_rocksdb_idempotency_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let key = IdempotencyKey::new("k1", AUTHORIZE_ENDPOINT);

        assert_eq!(store.reserve(&key, t0()).await.unwrap(), Reservation::Acquired);
        assert_eq!(store.reserve(&key, t0()).await.unwrap(), Reservation::InFlight);

        let stale = IdempotencyKey::new("k2", AUTHORIZE_ENDPOINT);
        let lease = chrono::Duration::seconds(RESERVATION_LEASE_SECONDS);
        assert_eq!(store.reserve(&stale, t0()).await.unwrap(), Reservation::Acquired);
        assert_eq!(
            store.reserve(&stale, t0() + lease).await.unwrap(),
            Reservation::Acquired
        );

        IdempotencyStore::put(&store, &key, "resp".to_string(), t0())
            .await
            .unwrap();
        IdempotencyStore::put(&store, &key, "other".to_string(), t0())
            .await
            .unwrap();
        assert_eq!(
            IdempotencyStore::get(&store, &key).await.unwrap().as_deref(),
            Some("resp")
        );
    }

    #[tokio::test]
    async fn test_rocksdb_counters_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            assert_eq!(store.next().await.unwrap(), 1);
            assert_eq!(store.next().await.unwrap(), 2);
        }
        let store = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(store.next().await.unwrap(), 3);
    }
}
