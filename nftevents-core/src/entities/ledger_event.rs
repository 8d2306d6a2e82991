use kanau::processor::Processor;

use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone)]
/// Read the transaction id list of a ledger `event` row.
///
/// The value is a comma-separated list of transaction ids in ledger order.
pub struct GetLedgerEventValue {
    pub event_id: i64,
}

impl Processor<GetLedgerEventValue> for DatabaseProcessor {
    type Output = Option<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLedgerEventValue")]
    async fn process(&self, query: GetLedgerEventValue) -> Result<Option<String>, sqlx::Error> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM event WHERE id = $1")
            .bind(query.event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}

/// Split a ledger event value into its transaction ids, dropping blanks.
pub fn split_transaction_ids(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_in_listed_order() {
        assert_eq!(split_transaction_ids("tx1,tx2"), vec!["tx1", "tx2"]);
        assert_eq!(split_transaction_ids(" tx1 , ,tx2,"), vec!["tx1", "tx2"]);
        assert!(split_transaction_ids("").is_empty());
    }
}
