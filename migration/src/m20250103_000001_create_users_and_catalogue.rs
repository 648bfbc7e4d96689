use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    PhoneNumber,
    IsPhoneVerified,
    PasswordHash,
    IsStaff,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Banners {
    Table,
    Id,
    NameEn,
    NameHu,
    Image,
    Queue,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    NameEn,
    NameHu,
    Image,
    Queue,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    NameEn,
    NameHu,
    DescriptionEn,
    DescriptionHu,
    Price,
    Discount,
    NewPrice,
    IsBest,
    IsActive,
    Thumbnail,
    Image,
    CategoryId,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string_len(150).not_null())
                    .col(ColumnDef::new(Users::PhoneNumber).string_len(16).null())
                    .col(
                        ColumnDef::new(Users::IsPhoneVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::PasswordHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::IsStaff)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // Postgres allows several NULLs under a unique index
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_phone_number_unique")
                    .table(Users::Table)
                    .col(Users::PhoneNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_username_unique")
                    .table(Users::Table)
                    .col(Users::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Banners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Banners::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Banners::NameEn).string_len(100).not_null())
                    .col(ColumnDef::new(Banners::NameHu).string_len(100).not_null())
                    .col(ColumnDef::new(Banners::Image).string_len(255).not_null())
                    .col(ColumnDef::new(Banners::Queue).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Categories::NameEn)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Categories::NameHu)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Categories::Image)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Categories::Queue).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::NameEn).string_len(100).not_null())
                    .col(ColumnDef::new(Products::NameHu).string_len(100).not_null())
                    .col(ColumnDef::new(Products::DescriptionEn).text().not_null())
                    .col(ColumnDef::new(Products::DescriptionHu).text().not_null())
                    .col(
                        ColumnDef::new(Products::Price)
                            .decimal_len(15, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::Discount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Products::Discount).between(0, 100)),
                    )
                    .col(
                        ColumnDef::new(Products::NewPrice)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::IsBest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Products::Thumbnail)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Products::Image).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Products::CategoryId)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_category")
                            .from(Products::Table, Products::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_products_category")
                    .table(Products::Table)
                    .col(Products::CategoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Banners::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
