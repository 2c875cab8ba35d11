use std::fmt;

/// Rows written for one ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerReport {
    pub name: String,
    pub transactions: usize,
    pub accounts: usize,
    pub budgets: usize,
    pub reconciliation_warnings: usize,
}

/// Outcome of one import run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ledgers: Vec<LedgerReport>,
    pub networth: usize,
}

impl RunSummary {
    pub fn total_rows(&self) -> usize {
        self.networth
            + self
                .ledgers
                .iter()
                .map(|l| l.transactions + l.accounts + l.budgets)
                .sum::<usize>()
    }
}

impl fmt::Display for LedgerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} transactions, {} accounts, {} budgets",
            self.name, self.transactions, self.accounts, self.budgets
        )?;
        if self.reconciliation_warnings > 0 {
            write!(f, " ({} reconciliation warnings)", self.reconciliation_warnings)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ledger in &self.ledgers {
            writeln!(f, "{ledger}")?;
        }
        write!(f, "networth: {} days", self.networth)
    }
}
