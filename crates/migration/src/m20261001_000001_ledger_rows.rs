//! Sink schema for the import runs.
//!
//! - `transactions`: one row per transaction or split child
//! - `accounts`: one row per account and day
//! - `budgets`: one row per category and month
//! - `networth`: one row per day
//!
//! Converted amounts, tags and calculated fields are JSON objects keyed by
//! currency code or field name.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Key,
    TransactionDate,
    TransactionMonth,
    Category,
    CategoryGroup,
    Payee,
    Account,
    Memo,
    Currency,
    Amount,
    Conversions,
    TransactionType,
    Tags,
    Fields,
    UpdatedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Key,
    Date,
    Name,
    Currency,
    BudgetName,
    OnBudget,
    #[iden = "type"]
    AccountType,
    Balance,
    Conversions,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Key,
    Category,
    CategoryGroup,
    Month,
    Name,
    Currency,
    Budgeted,
    Activity,
    Balance,
    Conversions,
    ActivityConversions,
    BalanceConversions,
    Fields,
}

#[derive(Iden)]
enum Networth {
    Table,
    Date,
    Totals,
    BudgetBreakdown,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::TransactionDate).date().not_null())
                    .col(ColumnDef::new(Transactions::TransactionMonth).date().not_null())
                    .col(ColumnDef::new(Transactions::Category).string().not_null())
                    .col(ColumnDef::new(Transactions::CategoryGroup).string().not_null())
                    .col(ColumnDef::new(Transactions::Payee).string().not_null())
                    .col(ColumnDef::new(Transactions::Account).string().not_null())
                    .col(ColumnDef::new(Transactions::Memo).text().not_null())
                    .col(ColumnDef::new(Transactions::Currency).string().not_null())
                    .col(ColumnDef::new(Transactions::Amount).double().not_null())
                    .col(ColumnDef::new(Transactions::Conversions).json().not_null())
                    .col(ColumnDef::new(Transactions::TransactionType).string().not_null())
                    .col(ColumnDef::new(Transactions::Tags).json().not_null())
                    .col(ColumnDef::new(Transactions::Fields).json().not_null())
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::Date).date().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Currency).string().not_null())
                    .col(ColumnDef::new(Accounts::BudgetName).string().not_null())
                    .col(ColumnDef::new(Accounts::OnBudget).boolean().not_null())
                    .col(ColumnDef::new(Accounts::AccountType).string().not_null())
                    .col(ColumnDef::new(Accounts::Balance).double().not_null())
                    .col(ColumnDef::new(Accounts::Conversions).json().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::Category).string().not_null())
                    .col(ColumnDef::new(Budgets::CategoryGroup).string().not_null())
                    .col(ColumnDef::new(Budgets::Month).date().not_null())
                    .col(ColumnDef::new(Budgets::Name).string().not_null())
                    .col(ColumnDef::new(Budgets::Currency).string().not_null())
                    .col(ColumnDef::new(Budgets::Budgeted).double().not_null())
                    .col(ColumnDef::new(Budgets::Activity).double().not_null())
                    .col(ColumnDef::new(Budgets::Balance).double().not_null())
                    .col(ColumnDef::new(Budgets::Conversions).json().not_null())
                    .col(ColumnDef::new(Budgets::ActivityConversions).json().not_null())
                    .col(ColumnDef::new(Budgets::BalanceConversions).json().not_null())
                    .col(ColumnDef::new(Budgets::Fields).json().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-month")
                    .table(Budgets::Table)
                    .col(Budgets::Month)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Networth::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Networth::Date).date().not_null().primary_key())
                    .col(ColumnDef::new(Networth::Totals).json().not_null())
                    .col(ColumnDef::new(Networth::BudgetBreakdown).json().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Networth::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}
