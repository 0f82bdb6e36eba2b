//! Creates the normalized order schema: orders, delivery, payment, items.
//!
//! Foreign keys are declared inline so the same migration runs on Postgres
//! and on the SQLite backend used by the test suite.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::OrderUid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::TrackNumber).string().not_null())
                    .col(ColumnDef::new(Orders::Entry).string().not_null())
                    .col(ColumnDef::new(Orders::Locale).string().not_null())
                    .col(ColumnDef::new(Orders::InternalSignature).string().null())
                    .col(ColumnDef::new(Orders::CustomerId).string().not_null())
                    .col(ColumnDef::new(Orders::DeliveryService).string().not_null())
                    .col(ColumnDef::new(Orders::Shardkey).integer().not_null())
                    .col(ColumnDef::new(Orders::SmId).integer().not_null())
                    .col(
                        ColumnDef::new(Orders::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::OofShard).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Delivery::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Delivery::OrderUid)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Delivery::Name).string().not_null())
                    .col(ColumnDef::new(Delivery::Phone).string().not_null())
                    .col(ColumnDef::new(Delivery::Zip).string().not_null())
                    .col(ColumnDef::new(Delivery::City).string().not_null())
                    .col(ColumnDef::new(Delivery::Address).string().not_null())
                    .col(ColumnDef::new(Delivery::Region).string().not_null())
                    .col(ColumnDef::new(Delivery::Email).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_order_uid")
                            .from(Delivery::Table, Delivery::OrderUid)
                            .to(Orders::Table, Orders::OrderUid),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payment::Transaction)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payment::OrderUid).string().not_null())
                    .col(ColumnDef::new(Payment::RequestId).string().null())
                    .col(ColumnDef::new(Payment::Currency).string().not_null())
                    .col(ColumnDef::new(Payment::Provider).string().not_null())
                    .col(ColumnDef::new(Payment::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Payment::PaymentDt).big_integer().not_null())
                    .col(ColumnDef::new(Payment::Bank).string().not_null())
                    .col(ColumnDef::new(Payment::DeliveryCost).big_integer().not_null())
                    .col(ColumnDef::new(Payment::GoodsTotal).big_integer().not_null())
                    .col(ColumnDef::new(Payment::CustomFee).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_order_uid")
                            .from(Payment::Table, Payment::OrderUid)
                            .to(Orders::Table, Orders::OrderUid),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Items::OrderUid).string().not_null())
                    .col(ColumnDef::new(Items::ChrtId).big_integer().not_null())
                    .col(ColumnDef::new(Items::TrackNumber).string().not_null())
                    .col(ColumnDef::new(Items::Price).big_integer().not_null())
                    .col(ColumnDef::new(Items::Rid).string().not_null())
                    .col(ColumnDef::new(Items::Name).string().not_null())
                    .col(ColumnDef::new(Items::Sale).integer().not_null())
                    .col(ColumnDef::new(Items::Size).string().not_null())
                    .col(ColumnDef::new(Items::TotalPrice).big_integer().not_null())
                    .col(ColumnDef::new(Items::NmId).big_integer().not_null())
                    .col(ColumnDef::new(Items::Brand).string().not_null())
                    .col(ColumnDef::new(Items::Status).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_items_order_uid")
                            .from(Items::Table, Items::OrderUid)
                            .to(Orders::Table, Orders::OrderUid),
                    )
                    .to_owned(),
            )
            .await?;

        // Bootstrap join and per-order item lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_items_order_uid")
                    .table(Items::Table)
                    .col(Items::OrderUid)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_order_uid")
                    .table(Payment::Table)
                    .col(Payment::OrderUid)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Delivery::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Orders {
    Table,
    OrderUid,
    TrackNumber,
    Entry,
    Locale,
    InternalSignature,
    CustomerId,
    DeliveryService,
    Shardkey,
    SmId,
    DateCreated,
    OofShard,
}

#[derive(Iden)]
enum Delivery {
    Table,
    OrderUid,
    Name,
    Phone,
    Zip,
    City,
    Address,
    Region,
    Email,
}

#[derive(Iden)]
enum Payment {
    Table,
    Transaction,
    OrderUid,
    RequestId,
    Currency,
    Provider,
    Amount,
    PaymentDt,
    Bank,
    DeliveryCost,
    GoodsTotal,
    CustomFee,
}

#[derive(Iden)]
enum Items {
    Table,
    Id,
    OrderUid,
    ChrtId,
    TrackNumber,
    Price,
    Rid,
    Name,
    Sale,
    Size,
    TotalPrice,
    NmId,
    Brand,
    Status,
}
