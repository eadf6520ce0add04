use sea_orm_migration::prelude::*;

/// Tables this migration creates, registered for the drift resolver.
pub const CREATES: &[&str] = &["sites", "modules", "pages"];

#[derive(DeriveMigrationName)]
pub struct Migration;

// No `if_not_exists`: re-running this DDL against an existing object must
// surface the store's "already exists" error, which is the drift signal the
// recovery engine classifies.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sites::Table)
                    .col(
                        ColumnDef::new(Sites::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sites::Name).string().not_null())
                    .col(ColumnDef::new(Sites::Host).string().not_null().unique_key())
                    .col(ColumnDef::new(Sites::Description).string().null())
                    .col(
                        ColumnDef::new(Sites::DefaultTheme)
                            .string()
                            .not_null()
                            .default("default"),
                    )
                    .col(ColumnDef::new(Sites::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Sites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sites::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Modules::Table)
                    .col(
                        ColumnDef::new(Modules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Modules::SiteId).integer().not_null())
                    .col(ColumnDef::new(Modules::Title).string().not_null())
                    .col(ColumnDef::new(Modules::ModuleType).string().not_null())
                    .col(ColumnDef::new(Modules::Settings).text().not_null().default("{}"))
                    .col(ColumnDef::new(Modules::SortOrder).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Modules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Modules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_modules_site_id")
                            .from(Modules::Table, Modules::SiteId)
                            .to(Sites::Table, Sites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pages::Table)
                    .col(
                        ColumnDef::new(Pages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Pages::SiteId).integer().not_null())
                    .col(ColumnDef::new(Pages::Path).string().not_null())
                    .col(ColumnDef::new(Pages::Title).string().not_null())
                    .col(ColumnDef::new(Pages::Layout).string().null())
                    .col(
                        ColumnDef::new(Pages::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Pages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pages_site_id")
                            .from(Pages::Table, Pages::SiteId)
                            .to(Sites::Table, Sites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uk_pages_site_path")
                    .table(Pages::Table)
                    .col(Pages::SiteId)
                    .col(Pages::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Modules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sites::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Sites {
    Table,
    Id,
    Name,
    Host,
    Description,
    DefaultTheme,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Modules {
    Table,
    Id,
    SiteId,
    Title,
    ModuleType,
    Settings,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Pages {
    Table,
    Id,
    SiteId,
    Path,
    Title,
    Layout,
    IsPublished,
    CreatedAt,
    UpdatedAt,
}
