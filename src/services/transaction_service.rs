use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ServiceError, ServiceResult, UserCaches};
use crate::database::models::{NewSecurity, NewTransaction, Security, Transaction, TransactionWithSecurity};
use crate::database::{PortfolioStore, StoreResult};
use crate::import::{self, FileKind, ImportError, ImportRow, ImportSummary};
use crate::providers::{BrokerHolding, BrokerHoldingsProvider};
use crate::types::{source, SecurityType, TransactionType};

const MISSING_FIELDS: &str = "Missing required fields";

/// Body of `POST /api/transactions`. Numbers may arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub security_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub price_per_unit: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Result of a broker holdings sync
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    pub processed: usize,
    pub added: usize,
    pub errors: Vec<String>,
}

fn number(value: &Option<Value>) -> Option<f64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive(value: Option<f64>, field: &str) -> ServiceResult<f64> {
    match value {
        None => Err(ServiceError::InvalidInput(MISSING_FIELDS.to_string())),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(_) => Err(ServiceError::InvalidInput(format!("{} must be greater than 0", field))),
    }
}

pub struct TransactionService {
    store: Arc<dyn PortfolioStore>,
    broker: Arc<dyn BrokerHoldingsProvider>,
    caches: Arc<UserCaches>,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        broker: Arc<dyn BrokerHoldingsProvider>,
        caches: Arc<UserCaches>,
    ) -> Self {
        Self { store, broker, caches }
    }

    async fn find_or_create_security(&self, security: NewSecurity) -> StoreResult<Security> {
        if let Some(existing) = self
            .store
            .find_security(&security.symbol, security.security_type)
            .await?
        {
            return Ok(existing);
        }
        self.store.insert_security(security).await
    }

    pub async fn create(&self, user_id: Uuid, request: CreateTransactionRequest) -> ServiceResult<Transaction> {
        let symbol = request
            .symbol
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput(MISSING_FIELDS.to_string()))?;
        let security_type: SecurityType = request
            .security_type
            .as_deref()
            .ok_or_else(|| ServiceError::InvalidInput(MISSING_FIELDS.to_string()))?
            .parse()
            .map_err(ServiceError::InvalidInput)?;
        let quantity = positive(number(&request.quantity), "quantity")?;
        let price = positive(
            number(&request.price_per_unit).or_else(|| number(&request.price)),
            "price_per_unit",
        )?;
        let transaction_type = match request.transaction_type.as_deref() {
            Some(raw) => raw.parse::<TransactionType>().map_err(ServiceError::InvalidInput)?,
            None => TransactionType::Buy,
        };
        let transaction_date = match request.transaction_date.as_deref() {
            Some(raw) => import::parse_date(raw)
                .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid transaction_date '{}'", raw)))?,
            None => Utc::now(),
        };

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| symbol.clone(), str::to_string);

        let security = self
            .find_or_create_security(NewSecurity {
                symbol,
                name,
                security_type,
                isin: None,
                exchange: None,
                last_price: Some(price),
                last_updated: None,
            })
            .await?;

        let transaction = self
            .store
            .insert_transaction(NewTransaction {
                user_id,
                security_id: security.id,
                transaction_type,
                transaction_date,
                quantity,
                price_per_unit: price,
                total_amount: quantity * price,
                source: request.source.unwrap_or_else(|| source::MANUAL.to_string()),
            })
            .await?;

        info!(
            user_id = %user_id,
            transaction_id = transaction.id,
            symbol = %security.symbol,
            "Created transaction"
        );
        self.caches.invalidate_user(&user_id).await;
        Ok(transaction)
    }

    /// The user's transactions, newest first. Cached per user; a failed
    /// refresh falls back to the last cached list.
    pub async fn list(&self, user_id: Uuid, force: bool) -> ServiceResult<Arc<Vec<TransactionWithSecurity>>> {
        if let Some(cached) = self.caches.transactions.fresh(&user_id, force).await {
            return Ok(cached);
        }

        match self.store.transactions_for_user(user_id).await {
            Ok(rows) => {
                let rows = Arc::new(rows);
                self.caches.transactions.insert(user_id, rows.clone()).await;
                Ok(rows)
            }
            Err(e) => match self.caches.transactions.stale(&user_id).await {
                Some(stale) => {
                    warn!(user_id = %user_id, error = %e, "Using cached transactions (latest refresh failed)");
                    Ok(stale)
                }
                None => Err(e.into()),
            },
        }
    }

    pub async fn for_security(&self, user_id: Uuid, security_id: i64) -> ServiceResult<Vec<TransactionWithSecurity>> {
        Ok(self.store.transactions_for_security(user_id, security_id).await?)
    }

    /// Imports every row of a CSV or Excel upload. Row failures are
    /// collected; only an unreadable or empty file fails the request.
    pub async fn import_file(&self, user_id: Uuid, filename: &str, bytes: &[u8]) -> ServiceResult<ImportSummary> {
        let kind = FileKind::from_filename(filename).ok_or(ImportError::UnsupportedFile)?;
        let rows = import::parse(bytes, kind)?;

        let mut summary = ImportSummary::default();
        for raw in &rows {
            summary.processed += 1;
            let row = match raw.as_ref().map_err(String::clone).and_then(import::validate_row) {
                Ok(row) => row,
                Err(message) => {
                    summary.record_error(summary.processed, message);
                    continue;
                }
            };
            match self.import_row(user_id, row).await {
                Ok(_) => summary.success += 1,
                Err(e) => summary.record_error(summary.processed, e),
            }
        }

        info!(
            user_id = %user_id,
            processed = summary.processed,
            success = summary.success,
            errors = summary.errors.len(),
            "Imported transactions file"
        );
        if summary.success > 0 {
            self.caches.invalidate_user(&user_id).await;
        }
        Ok(summary)
    }

    async fn import_row(&self, user_id: Uuid, row: ImportRow) -> StoreResult<Transaction> {
        let security = self
            .find_or_create_security(NewSecurity {
                symbol: row.symbol,
                name: row.name,
                security_type: row.security_type,
                isin: None,
                exchange: None,
                last_price: None,
                last_updated: None,
            })
            .await?;

        self.store
            .insert_transaction(NewTransaction {
                user_id,
                security_id: security.id,
                transaction_type: row.transaction_type,
                transaction_date: row.transaction_date,
                quantity: row.quantity,
                price_per_unit: row.price,
                total_amount: row.quantity * row.price,
                source: source::CSV_UPLOAD.to_string(),
            })
            .await
    }

    /// Records every broker holding as a BUY. Fetching the holdings must
    /// succeed; individual holdings may fail.
    pub async fn broker_sync(&self, user_id: Uuid) -> ServiceResult<SyncSummary> {
        let holdings = self.broker.holdings(user_id).await?;

        let mut summary = SyncSummary::default();
        for holding in &holdings {
            summary.processed += 1;
            match self.sync_holding(user_id, holding).await {
                Ok(_) => summary.added += 1,
                Err(e) => summary
                    .errors
                    .push(format!("Error processing {}: {}", holding.symbol, e)),
            }
        }

        info!(
            user_id = %user_id,
            broker = self.broker.name(),
            processed = summary.processed,
            added = summary.added,
            "Synced broker holdings"
        );
        if summary.added > 0 {
            self.caches.invalidate_user(&user_id).await;
        }
        Ok(summary)
    }

    async fn sync_holding(&self, user_id: Uuid, holding: &BrokerHolding) -> ServiceResult<Transaction> {
        let symbol = holding.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ServiceError::InvalidInput(MISSING_FIELDS.to_string()));
        }
        let quantity = positive(Some(holding.quantity), "quantity")?;
        let price = positive(Some(holding.avg_price), "avg_price")?;
        let transaction_date = match holding.purchase_date.as_deref() {
            Some(raw) => import::parse_date(raw)
                .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid purchase_date '{}'", raw)))?,
            None => Utc::now(),
        };

        let security = self
            .find_or_create_security(NewSecurity {
                name: holding.name.clone().unwrap_or_else(|| symbol.clone()),
                symbol,
                security_type: SecurityType::Stock,
                isin: None,
                exchange: Some(holding.exchange.clone().unwrap_or_else(|| "NSE".to_string())),
                last_price: None,
                last_updated: None,
            })
            .await?;

        Ok(self
            .store
            .insert_transaction(NewTransaction {
                user_id,
                security_id: security.id,
                transaction_type: TransactionType::Buy,
                transaction_date,
                quantity,
                price_per_unit: price,
                total_amount: quantity * price,
                source: source::MOTILAL_API.to_string(),
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use crate::testing::{seed_security, test_store, FixedBroker};
    use serde_json::json;

    fn service(store: Arc<MemoryStore>, holdings: Vec<BrokerHolding>) -> TransactionService {
        let caches = Arc::new(UserCaches::new(&AppConfig::for_tests().cache));
        TransactionService::new(store, Arc::new(FixedBroker { holdings }), caches)
    }

    fn request(body: Value) -> CreateTransactionRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn create_seeds_new_security_price() {
        let store = Arc::new(test_store());
        let user = Uuid::new_v4();
        let service = service(store.clone(), vec![]);

        let txn = service
            .create(
                user,
                request(json!({
                    "symbol": " tcs ",
                    "security_type": "STOCK",
                    "quantity": "4",
                    "price": 250.5,
                    "transaction_date": "2024-02-01"
                })),
            )
            .await
            .unwrap();

        assert_eq!(txn.total_amount, 1002.0);
        assert_eq!(txn.transaction_type, TransactionType::Buy);
        assert_eq!(txn.source, "MANUAL");

        let security = store.find_security("TCS", SecurityType::Stock).await.unwrap().unwrap();
        assert_eq!(security.last_price, Some(250.5));
        assert_eq!(security.name, "TCS");
    }

    #[tokio::test]
    async fn create_reuses_existing_security() {
        let store = Arc::new(test_store());
        let existing = seed_security(&store, "AXISMF", SecurityType::MutualFund, Some(10.0)).await;
        let service = service(store.clone(), vec![]);

        let txn = service
            .create(
                Uuid::new_v4(),
                request(json!({
                    "symbol": "AXISMF",
                    "security_type": "MF",
                    "quantity": 3,
                    "price_per_unit": 12,
                    "transaction_type": "SELL"
                })),
            )
            .await
            .unwrap();
        assert_eq!(txn.security_id, existing.id);

        let security = store.find_security("AXISMF", SecurityType::MutualFund).await.unwrap().unwrap();
        assert_eq!(security.last_price, Some(10.0));
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let service = service(Arc::new(test_store()), vec![]);
        let user = Uuid::new_v4();

        let missing = service
            .create(user, request(json!({"security_type": "STOCK", "quantity": 1, "price": 1})))
            .await
            .unwrap_err();
        assert!(matches!(missing, ServiceError::InvalidInput(ref m) if m == MISSING_FIELDS));

        let negative = service
            .create(user, request(json!({"symbol": "A", "security_type": "STOCK", "quantity": -1, "price": 1})))
            .await
            .unwrap_err();
        assert!(matches!(negative, ServiceError::InvalidInput(ref m) if m.contains("quantity")));

        let bad_type = service
            .create(user, request(json!({"symbol": "A", "security_type": "BOND", "quantity": 1, "price": 1})))
            .await
            .unwrap_err();
        assert!(matches!(bad_type, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_is_cached_and_invalidated_by_writes() {
        let store = Arc::new(test_store());
        let user = Uuid::new_v4();
        let service = service(store.clone(), vec![]);

        assert!(service.list(user, false).await.unwrap().is_empty());

        service
            .create(user, request(json!({"symbol": "TCS", "security_type": "STOCK", "quantity": 1, "price": 5})))
            .await
            .unwrap();
        let rows = service.list(user, false).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].security.as_ref().map(|s| s.symbol.as_str()), Some("TCS"));
    }

    #[tokio::test]
    async fn import_collects_row_errors() {
        let store = Arc::new(test_store());
        let user = Uuid::new_v4();
        let service = service(store.clone(), vec![]);

        let csv = "symbol,name,type,quantity,price,date\n\
                   TCS,Tata Consultancy,STOCK,2,3500,2024-01-15\n\
                   ,Missing,STOCK,1,1,2024-01-15\n\
                   AXIS,Axis Bluechip,MF,10.5,45.2,15/01/2024\n";
        let summary = service.import_file(user, "holdings.csv", csv.as_bytes()).await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.errors, vec!["Row 2: Missing required fields".to_string()]);
        assert!(store
            .find_security("AXIS", SecurityType::MutualFund)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn import_rejects_unsupported_files() {
        let service = service(Arc::new(test_store()), vec![]);
        let err = service
            .import_file(Uuid::new_v4(), "holdings.pdf", b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Import(ImportError::UnsupportedFile)));
    }

    #[tokio::test]
    async fn broker_sync_reports_per_holding_errors() {
        let store = Arc::new(test_store());
        let holdings = vec![
            BrokerHolding {
                symbol: "reliance".to_string(),
                name: Some("Reliance Industries Ltd".to_string()),
                quantity: 100.0,
                avg_price: 2500.5,
                purchase_date: Some("2024-01-15".to_string()),
                exchange: None,
            },
            BrokerHolding {
                symbol: "BAD".to_string(),
                name: None,
                quantity: 0.0,
                avg_price: 1.0,
                purchase_date: None,
                exchange: None,
            },
        ];
        let service = service(store.clone(), holdings);

        let summary = service.broker_sync(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.errors, vec!["Error processing BAD: quantity must be greater than 0".to_string()]);

        let reliance = store.find_security("RELIANCE", SecurityType::Stock).await.unwrap().unwrap();
        assert_eq!(reliance.exchange.as_deref(), Some("NSE"));
    }
}
