use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_orders_table::Migration),
            Box::new(m20240301_000002_create_stores_tables::Migration),
            Box::new(m20240301_000003_create_store_templates_table::Migration),
            Box::new(m20240301_000004_create_webhook_events_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::StoreSlug).string().not_null())
                        .col(ColumnDef::new(Orders::FullName).string().not_null())
                        .col(ColumnDef::new(Orders::Email).string().not_null())
                        .col(ColumnDef::new(Orders::Whatsapp).string().not_null())
                        .col(ColumnDef::new(Orders::TemplateKey).string().not_null())
                        .col(ColumnDef::new(Orders::PlanType).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Amount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::ToyyibBillCode).string().null())
                        .col(ColumnDef::new(Orders::ToyyibRef).string().null())
                        .col(ColumnDef::new(Orders::PaymentUrl).string().null())
                        .col(ColumnDef::new(Orders::StoreDisplayName).string().not_null())
                        .col(
                            ColumnDef::new(Orders::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeployedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // The unique slug index is the reservation: the slug is
            // claimed at order creation, before the store row exists.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_store_slug")
                        .table(Orders::Table)
                        .col(Orders::StoreSlug)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        StoreSlug,
        FullName,
        Email,
        Whatsapp,
        TemplateKey,
        PlanType,
        Amount,
        Status,
        ToyyibBillCode,
        ToyyibRef,
        PaymentUrl,
        StoreDisplayName,
        PaidAt,
        DeployedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stores_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stores_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Slug).string().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Whatsapp).string().not_null())
                        .col(ColumnDef::new(Stores::Email).string().null())
                        .col(ColumnDef::new(Stores::ThemeJson).json().not_null())
                        .col(ColumnDef::new(Stores::TemplateKey).string().null())
                        .col(
                            ColumnDef::new(Stores::IsPremium)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Stores::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Stores::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stores::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stores_slug")
                        .table(Stores::Table)
                        .col(Stores::Slug)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::ImagesJson).json().not_null())
                        .col(
                            ColumnDef::new(Products::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_store_id")
                                .from(Products::Table, Products::StoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_store_id")
                        .table(Products::Table)
                        .col(Products::StoreId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stores {
        Table,
        Id,
        Slug,
        Name,
        Whatsapp,
        Email,
        ThemeJson,
        TemplateKey,
        IsPremium,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        StoreId,
        Name,
        Price,
        ImagesJson,
        SortOrder,
        IsActive,
        CreatedAt,
    }
}

mod m20240301_000003_create_store_templates_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_store_templates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StoreTemplates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StoreTemplates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StoreTemplates::Key).string().not_null())
                        .col(ColumnDef::new(StoreTemplates::Title).string().not_null())
                        .col(ColumnDef::new(StoreTemplates::ThemeJson).json().not_null())
                        .col(
                            ColumnDef::new(StoreTemplates::SampleProductsJson)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StoreTemplates::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StoreTemplates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_store_templates_key")
                        .table(StoreTemplates::Table)
                        .col(StoreTemplates::Key)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StoreTemplates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StoreTemplates {
        Table,
        Id,
        Key,
        Title,
        ThemeJson,
        SampleProductsJson,
        IsActive,
        CreatedAt,
    }
}

mod m20240301_000004_create_webhook_events_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_webhook_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WebhookEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WebhookEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WebhookEvents::Provider).string().not_null())
                        .col(
                            ColumnDef::new(WebhookEvents::ProviderEventId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WebhookEvents::Endpoint).string().not_null())
                        .col(ColumnDef::new(WebhookEvents::RawPayload).json().not_null())
                        .col(
                            ColumnDef::new(WebhookEvents::Processed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(WebhookEvents::ErrorMessage).string().null())
                        .col(
                            ColumnDef::new(WebhookEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WebhookEvents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per delivery attempt; the unique pair is what
            // makes duplicate deliveries detectable under concurrency.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_webhook_events_provider_event")
                        .table(WebhookEvents::Table)
                        .col(WebhookEvents::Provider)
                        .col(WebhookEvents::ProviderEventId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WebhookEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WebhookEvents {
        Table,
        Id,
        Provider,
        ProviderEventId,
        Endpoint,
        RawPayload,
        Processed,
        ErrorMessage,
        CreatedAt,
        UpdatedAt,
    }
}
