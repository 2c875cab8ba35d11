use crate::{AccountRow, ResultEngine, networth, networth::aggregate_net_worth};

use super::{Engine, sink};

impl Engine {
    /// Roll every ledger's account rows into the `networth` table.
    pub async fn import_net_worth(&self, accounts: Vec<AccountRow>) -> ResultEngine<usize> {
        let rows = aggregate_net_worth(accounts)?;
        sink::upsert_batched::<networth::Entity, networth::ActiveModel, _>(
            &self.database,
            "networth",
            networth::Column::Date,
            &rows,
            self.config.effective_batch_size(),
        )
        .await
    }
}
