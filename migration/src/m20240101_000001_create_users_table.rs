use sea_orm_migration::prelude::*;

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
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string_len(255).unique_key())
                    .col(
                        ColumnDef::new(Users::MobileNumber)
                            .string_len(32)
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::HashedPassword).string_len(255))
                    .col(ColumnDef::new(Users::FirstName).string_len(128))
                    .col(ColumnDef::new(Users::LastName).string_len(128))
                    .col(ColumnDef::new(Users::Avatar).string_len(512))
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(32)
                            .not_null()
                            .default("customer"),
                    )
                    .col(ColumnDef::new(Users::Groups).json().not_null())
                    .col(ColumnDef::new(Users::Permissions).json().not_null())
                    .col(
                        ColumnDef::new(Users::IsEnable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::IsBlocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsForceLogin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsForceChangePassword)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::PhoneVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::UserStatus)
                            .string_len(32)
                            .not_null()
                            .default("just_joined"),
                    )
                    .col(
                        ColumnDef::new(Users::LoginType)
                            .string_len(16)
                            .not_null()
                            .default("direct"),
                    )
                    .col(ColumnDef::new(Users::LoginDatetime).timestamp())
                    .col(ColumnDef::new(Users::LastLoginDatetime).timestamp())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_role")
                    .table(Users::Table)
                    .col(Users::Role)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    MobileNumber,
    HashedPassword,
    FirstName,
    LastName,
    Avatar,
    Role,
    Groups,
    Permissions,
    IsEnable,
    IsBlocked,
    IsForceLogin,
    IsForceChangePassword,
    EmailVerified,
    PhoneVerified,
    UserStatus,
    LoginType,
    LoginDatetime,
    LastLoginDatetime,
    CreatedAt,
    UpdatedAt,
}
