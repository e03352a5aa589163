use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_purchase_tables::Migration),
            Box::new(m20240101_000003_create_sale_tables::Migration),
            Box::new(m20240101_000004_create_stock_tables::Migration),
            Box::new(m20240101_000005_create_customs_tables::Migration),
            Box::new(m20240101_000006_create_invoice_tables::Migration),
            Box::new(m20240101_000007_create_hr_tables::Migration),
            Box::new(m20240101_000008_create_attachments_table::Migration),
            Box::new(m20240101_000009_create_subscriptions_table::Migration),
        ]
    }
}

fn pk(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 2)
        .not_null()
        .default(0)
        .to_owned()
}

fn qty(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 4)
        .not_null()
        .default(0)
        .to_owned()
}

mod m20240101_000001_create_catalog_tables {
    use super::{money, pk};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(pk(Partners::Id))
                        .col(ColumnDef::new(Partners::Name).string().not_null())
                        .col(ColumnDef::new(Partners::Email).string().null())
                        .col(ColumnDef::new(Partners::Phone).string().null())
                        .col(
                            ColumnDef::new(Partners::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(pk(Products::Id))
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::DefaultCode).string().null())
                        .col(money(Products::ListPrice))
                        .col(money(Products::StandardPrice))
                        .col(
                            ColumnDef::new(Products::ProductType)
                                .string_len(16)
                                .not_null()
                                .default("consu"),
                        )
                        .col(
                            ColumnDef::new(Products::Tracking)
                                .string_len(16)
                                .not_null()
                                .default("none"),
                        )
                        .col(
                            ColumnDef::new(Products::IsCar)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Taxes::Table)
                        .if_not_exists()
                        .col(pk(Taxes::Id))
                        .col(ColumnDef::new(Taxes::Name).string().not_null())
                        .col(ColumnDef::new(Taxes::Amount).decimal_len(8, 4).not_null())
                        .col(
                            ColumnDef::new(Taxes::PriceInclude)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(pk(StockLots::Id))
                        .col(ColumnDef::new(StockLots::Name).string().not_null())
                        .col(ColumnDef::new(StockLots::ProductId).integer().not_null())
                        .col(
                            ColumnDef::new(StockLots::CustomId)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // A serial number is unique per product
            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_lots_product_name")
                        .table(StockLots::Table)
                        .col(StockLots::ProductId)
                        .col(StockLots::Name)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Taxes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Partners::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Partners {
        Table,
        Id,
        Name,
        Email,
        Phone,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        DefaultCode,
        ListPrice,
        StandardPrice,
        ProductType,
        Tracking,
        IsCar,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Taxes {
        Table,
        Id,
        Name,
        Amount,
        PriceInclude,
    }

    #[derive(DeriveIden)]
    enum StockLots {
        Table,
        Id,
        Name,
        ProductId,
        CustomId,
        CreatedAt,
    }
}

mod m20240101_000002_create_purchase_tables {
    use super::{money, pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(pk(PurchaseOrders::Id))
                        .col(
                            ColumnDef::new(PurchaseOrders::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PartnerId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::State)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::DateOrder)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(ColumnDef::new(PurchaseOrders::Origin).string().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Currency)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::IsClosedOperation)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(money(PurchaseOrders::AmountUntaxed))
                        .col(money(PurchaseOrders::AmountTax))
                        .col(money(PurchaseOrders::AmountTotal))
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(pk(PurchaseOrderLines::Id))
                        .col(
                            ColumnDef::new(PurchaseOrderLines::OrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::Name).string().not_null())
                        .col(qty(PurchaseOrderLines::ProductQty))
                        .col(money(PurchaseOrderLines::PriceUnit))
                        .col(ColumnDef::new(PurchaseOrderLines::TaxId).integer().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::DatePlanned)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::CustomId).string().null())
                        .col(money(PurchaseOrderLines::PriceSubtotal))
                        .col(money(PurchaseOrderLines::PriceTax))
                        .col(money(PurchaseOrderLines::PriceTotal))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_order")
                                .from(PurchaseOrderLines::Table, PurchaseOrderLines::OrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        Name,
        PartnerId,
        State,
        DateOrder,
        Notes,
        Origin,
        Currency,
        IsClosedOperation,
        AmountUntaxed,
        AmountTax,
        AmountTotal,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        Name,
        ProductQty,
        PriceUnit,
        TaxId,
        DatePlanned,
        CustomId,
        PriceSubtotal,
        PriceTax,
        PriceTotal,
    }
}

mod m20240101_000003_create_sale_tables {
    use super::{money, pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_sale_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SaleOrders::Table)
                        .if_not_exists()
                        .col(pk(SaleOrders::Id))
                        .col(
                            ColumnDef::new(SaleOrders::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SaleOrders::PartnerId).integer().not_null())
                        .col(ColumnDef::new(SaleOrders::State).string_len(16).not_null())
                        .col(
                            ColumnDef::new(SaleOrders::DateOrder)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleOrders::Note).text().null())
                        .col(ColumnDef::new(SaleOrders::Currency).string_len(3).not_null())
                        .col(money(SaleOrders::AmountUntaxed))
                        .col(money(SaleOrders::AmountTax))
                        .col(money(SaleOrders::AmountTotal))
                        .col(
                            ColumnDef::new(SaleOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleOrderLines::Table)
                        .if_not_exists()
                        .col(pk(SaleOrderLines::Id))
                        .col(ColumnDef::new(SaleOrderLines::OrderId).integer().not_null())
                        .col(
                            ColumnDef::new(SaleOrderLines::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleOrderLines::Name).string().not_null())
                        .col(qty(SaleOrderLines::ProductUomQty))
                        .col(money(SaleOrderLines::PriceUnit))
                        .col(ColumnDef::new(SaleOrderLines::TaxId).integer().null())
                        .col(money(SaleOrderLines::PriceSubtotal))
                        .col(money(SaleOrderLines::PriceTax))
                        .col(money(SaleOrderLines::PriceTotal))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_order_lines_order")
                                .from(SaleOrderLines::Table, SaleOrderLines::OrderId)
                                .to(SaleOrders::Table, SaleOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleOrderLineLots::Table)
                        .if_not_exists()
                        .col(pk(SaleOrderLineLots::Id))
                        .col(
                            ColumnDef::new(SaleOrderLineLots::SaleLineId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleOrderLineLots::LotId)
                                .integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_order_line_lots_line")
                                .from(SaleOrderLineLots::Table, SaleOrderLineLots::SaleLineId)
                                .to(SaleOrderLines::Table, SaleOrderLines::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sale_order_line_lots_pair")
                        .table(SaleOrderLineLots::Table)
                        .col(SaleOrderLineLots::SaleLineId)
                        .col(SaleOrderLineLots::LotId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleOrderLineLots::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SaleOrders {
        Table,
        Id,
        Name,
        PartnerId,
        State,
        DateOrder,
        Note,
        Currency,
        AmountUntaxed,
        AmountTax,
        AmountTotal,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SaleOrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        Name,
        ProductUomQty,
        PriceUnit,
        TaxId,
        PriceSubtotal,
        PriceTax,
        PriceTotal,
    }

    #[derive(DeriveIden)]
    enum SaleOrderLineLots {
        Table,
        Id,
        SaleLineId,
        LotId,
    }
}

mod m20240101_000004_create_stock_tables {
    use super::{pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Pickings::Table)
                        .if_not_exists()
                        .col(pk(Pickings::Id))
                        .col(
                            ColumnDef::new(Pickings::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Pickings::PickingType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Pickings::LocationId).integer().not_null())
                        .col(ColumnDef::new(Pickings::LocationDestId).integer().not_null())
                        .col(ColumnDef::new(Pickings::PartnerId).integer().null())
                        .col(ColumnDef::new(Pickings::Origin).string().null())
                        .col(ColumnDef::new(Pickings::PurchaseId).integer().null())
                        .col(ColumnDef::new(Pickings::SaleId).integer().null())
                        .col(ColumnDef::new(Pickings::State).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Pickings::ScheduledDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Pickings::DateDone)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Pickings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMoves::Table)
                        .if_not_exists()
                        .col(pk(StockMoves::Id))
                        .col(ColumnDef::new(StockMoves::PickingId).integer().not_null())
                        .col(ColumnDef::new(StockMoves::ProductId).integer().not_null())
                        .col(ColumnDef::new(StockMoves::Name).string().not_null())
                        .col(qty(StockMoves::ProductUomQty))
                        .col(qty(StockMoves::Quantity))
                        .col(ColumnDef::new(StockMoves::State).string_len(16).not_null())
                        .col(ColumnDef::new(StockMoves::PurchaseLineId).integer().null())
                        .col(ColumnDef::new(StockMoves::SaleLineId).integer().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_moves_picking")
                                .from(StockMoves::Table, StockMoves::PickingId)
                                .to(Pickings::Table, Pickings::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMoveLines::Table)
                        .if_not_exists()
                        .col(pk(StockMoveLines::Id))
                        .col(ColumnDef::new(StockMoveLines::MoveId).integer().not_null())
                        .col(
                            ColumnDef::new(StockMoveLines::PickingId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoveLines::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMoveLines::LotId).integer().null())
                        .col(qty(StockMoveLines::Quantity))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_move_lines_move")
                                .from(StockMoveLines::Table, StockMoveLines::MoveId)
                                .to(StockMoves::Table, StockMoves::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMoveLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockMoves::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Pickings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Pickings {
        Table,
        Id,
        Name,
        PickingType,
        LocationId,
        LocationDestId,
        PartnerId,
        Origin,
        PurchaseId,
        SaleId,
        State,
        ScheduledDate,
        DateDone,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMoves {
        Table,
        Id,
        PickingId,
        ProductId,
        Name,
        ProductUomQty,
        Quantity,
        State,
        PurchaseLineId,
        SaleLineId,
    }

    #[derive(DeriveIden)]
    enum StockMoveLines {
        Table,
        Id,
        MoveId,
        PickingId,
        ProductId,
        LotId,
        Quantity,
    }
}

mod m20240101_000005_create_customs_tables {
    use super::{pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_customs_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CustomsOperations::Table)
                        .if_not_exists()
                        .col(pk(CustomsOperations::Id))
                        .col(
                            ColumnDef::new(CustomsOperations::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperations::OperationType)
                                .string_len(8)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomsOperations::SourceNumber).string().null())
                        .col(ColumnDef::new(CustomsOperations::PartnerId).integer().null())
                        .col(
                            ColumnDef::new(CustomsOperations::PurchaseOrderId)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperations::SaleOrderId)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperations::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperations::SalePurchaseReference)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperations::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomsOperations::Description).text().null())
                        .col(
                            ColumnDef::new(CustomsOperations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomsOperationLines::Table)
                        .if_not_exists()
                        .col(pk(CustomsOperationLines::Id))
                        .col(
                            ColumnDef::new(CustomsOperationLines::OperationId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomsOperationLines::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomsOperationLines::LotId).integer().null())
                        .col(
                            ColumnDef::new(CustomsOperationLines::CustomId)
                                .string()
                                .null(),
                        )
                        .col(qty(CustomsOperationLines::Quantity))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_customs_operation_lines_operation")
                                .from(
                                    CustomsOperationLines::Table,
                                    CustomsOperationLines::OperationId,
                                )
                                .to(CustomsOperations::Table, CustomsOperations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustomsOperationLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CustomsOperations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CustomsOperations {
        Table,
        Id,
        Name,
        OperationType,
        SourceNumber,
        PartnerId,
        PurchaseOrderId,
        SaleOrderId,
        Date,
        SalePurchaseReference,
        Status,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CustomsOperationLines {
        Table,
        Id,
        OperationId,
        ProductId,
        LotId,
        CustomId,
        Quantity,
    }
}

mod m20240101_000006_create_invoice_tables {
    use super::{money, pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_invoice_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(pk(Invoices::Id))
                        .col(ColumnDef::new(Invoices::Name).string().not_null())
                        .col(ColumnDef::new(Invoices::MoveType).string_len(16).not_null())
                        .col(ColumnDef::new(Invoices::PartnerId).integer().not_null())
                        .col(ColumnDef::new(Invoices::State).string_len(16).not_null())
                        .col(ColumnDef::new(Invoices::InvoiceDate).date().null())
                        .col(ColumnDef::new(Invoices::InvoiceDateDue).date().null())
                        .col(
                            ColumnDef::new(Invoices::InvoicePaymentTermId)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Invoices::Narration).text().null())
                        .col(ColumnDef::new(Invoices::InvoiceOrigin).string().null())
                        .col(ColumnDef::new(Invoices::ConfirmedBy).date().null())
                        .col(ColumnDef::new(Invoices::Currency).string_len(3).not_null())
                        .col(money(Invoices::AmountUntaxed))
                        .col(money(Invoices::AmountTax))
                        .col(money(Invoices::AmountTotal))
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InvoiceLines::Table)
                        .if_not_exists()
                        .col(pk(InvoiceLines::Id))
                        .col(ColumnDef::new(InvoiceLines::InvoiceId).integer().not_null())
                        .col(ColumnDef::new(InvoiceLines::ProductId).integer().null())
                        .col(ColumnDef::new(InvoiceLines::Name).string().not_null())
                        .col(qty(InvoiceLines::Quantity))
                        .col(money(InvoiceLines::PriceUnit))
                        .col(ColumnDef::new(InvoiceLines::TaxId).integer().null())
                        .col(money(InvoiceLines::PriceSubtotal))
                        .col(money(InvoiceLines::PriceTax))
                        .col(money(InvoiceLines::PriceTotal))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoice_lines_invoice")
                                .from(InvoiceLines::Table, InvoiceLines::InvoiceId)
                                .to(Invoices::Table, Invoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
        Name,
        MoveType,
        PartnerId,
        State,
        InvoiceDate,
        InvoiceDateDue,
        InvoicePaymentTermId,
        Narration,
        InvoiceOrigin,
        ConfirmedBy,
        Currency,
        AmountUntaxed,
        AmountTax,
        AmountTotal,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum InvoiceLines {
        Table,
        Id,
        InvoiceId,
        ProductId,
        Name,
        Quantity,
        PriceUnit,
        TaxId,
        PriceSubtotal,
        PriceTax,
        PriceTotal,
    }
}

mod m20240101_000007_create_hr_tables {
    use super::pk;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_hr_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Departments::Table)
                        .if_not_exists()
                        .col(pk(Departments::Id))
                        .col(ColumnDef::new(Departments::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(pk(Employees::Id))
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::JobTitle).string().null())
                        .col(ColumnDef::new(Employees::WorkEmail).string().null())
                        .col(ColumnDef::new(Employees::WorkPhone).string().null())
                        .col(ColumnDef::new(Employees::DepartmentId).integer().null())
                        .col(ColumnDef::new(Employees::Image).text().null())
                        .col(ColumnDef::new(Employees::ImageMimetype).string().null())
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LeaveTypes::Table)
                        .if_not_exists()
                        .col(pk(LeaveTypes::Id))
                        .col(ColumnDef::new(LeaveTypes::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TimeOff::Table)
                        .if_not_exists()
                        .col(pk(TimeOff::Id))
                        .col(ColumnDef::new(TimeOff::EmployeeId).integer().not_null())
                        .col(ColumnDef::new(TimeOff::HolidayStatusId).integer().not_null())
                        .col(ColumnDef::new(TimeOff::Name).string().not_null())
                        .col(
                            ColumnDef::new(TimeOff::DateFrom)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeOff::DateTo)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeOff::NumberOfDays)
                                .decimal_len(8, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(TimeOff::State).string_len(16).not_null())
                        .col(
                            ColumnDef::new(TimeOff::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TimeOff::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LeaveTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Departments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Departments {
        Table,
        Id,
        Name,
    }

    #[derive(DeriveIden)]
    enum Employees {
        Table,
        Id,
        Name,
        JobTitle,
        WorkEmail,
        WorkPhone,
        DepartmentId,
        Image,
        ImageMimetype,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum LeaveTypes {
        Table,
        Id,
        Name,
    }

    #[derive(DeriveIden)]
    enum TimeOff {
        Table,
        Id,
        EmployeeId,
        HolidayStatusId,
        Name,
        DateFrom,
        DateTo,
        NumberOfDays,
        State,
        CreatedAt,
    }
}

mod m20240101_000008_create_attachments_table {
    use super::pk;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_attachments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Attachments::Table)
                        .if_not_exists()
                        .col(pk(Attachments::Id))
                        .col(ColumnDef::new(Attachments::Name).string().not_null())
                        .col(ColumnDef::new(Attachments::Mimetype).string().not_null())
                        .col(ColumnDef::new(Attachments::ResModel).string().not_null())
                        .col(ColumnDef::new(Attachments::ResId).integer().not_null())
                        .col(ColumnDef::new(Attachments::Datas).text().not_null())
                        .col(
                            ColumnDef::new(Attachments::FileSize)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Attachments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_attachments_res")
                        .table(Attachments::Table)
                        .col(Attachments::ResModel)
                        .col(Attachments::ResId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Attachments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Attachments {
        Table,
        Id,
        Name,
        Mimetype,
        ResModel,
        ResId,
        Datas,
        FileSize,
        CreatedAt,
    }
}

mod m20240101_000009_create_subscriptions_table {
    use super::{money, pk, qty};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000009_create_subscriptions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Subscriptions::Table)
                        .if_not_exists()
                        .col(pk(Subscriptions::Id))
                        .col(
                            ColumnDef::new(Subscriptions::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Subscriptions::VendorId).integer().not_null())
                        .col(ColumnDef::new(Subscriptions::ProductId).integer().not_null())
                        .col(
                            ColumnDef::new(Subscriptions::ProductDescription)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Subscriptions::PoType).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Subscriptions::DaysToNotify)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(qty(Subscriptions::Quantity))
                        .col(money(Subscriptions::UnitPrice))
                        .col(ColumnDef::new(Subscriptions::TaxId).integer().null())
                        .col(
                            ColumnDef::new(Subscriptions::Frequency)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Subscriptions::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Subscriptions::LastInvoiceDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Subscriptions::NextInvoiceDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(money(Subscriptions::SubAmount))
                        .col(money(Subscriptions::Amount))
                        .col(
                            ColumnDef::new(Subscriptions::PaymentMethod)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Subscriptions::PaymentType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Subscriptions::PurchaseOrderId)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(Subscriptions::State).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Subscriptions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Subscriptions {
        Table,
        Id,
        Name,
        VendorId,
        ProductId,
        ProductDescription,
        PoType,
        DaysToNotify,
        Quantity,
        UnitPrice,
        TaxId,
        Frequency,
        StartDate,
        LastInvoiceDate,
        NextInvoiceDate,
        SubAmount,
        Amount,
        PaymentMethod,
        PaymentType,
        PurchaseOrderId,
        State,
        CreatedAt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_unique() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
