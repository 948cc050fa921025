use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_geography_tables::Migration),
            Box::new(m20240301_000003_create_materiel_types_table::Migration),
            Box::new(m20240301_000004_create_expedition_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("agent"),
                        )
                        .col(ColumnDef::new(Users::Phone).string_len(20).null())
                        .col(ColumnDef::new(Users::Position).string_len(100).null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
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
                        .name("idx_users_email")
                        .table(Users::Table)
                        .col(Users::Email)
                        .unique()
                        .to_owned(),
                )
                .await
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
        Name,
        Role,
        Phone,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_geography_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_geography_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Regions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Regions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Regions::Code).string_len(32).not_null())
                        .col(ColumnDef::new(Regions::Name).string().not_null())
                        .col(ColumnDef::new(Regions::Capital).string().null())
                        .col(
                            ColumnDef::new(Regions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Regions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Districts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Districts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Districts::Code).string_len(32).not_null())
                        .col(ColumnDef::new(Districts::Name).string().not_null())
                        .col(ColumnDef::new(Districts::Capital).string().null())
                        .col(ColumnDef::new(Districts::RegionId).uuid().not_null())
                        .col(
                            ColumnDef::new(Districts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Districts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_districts_region")
                                .from(Districts::Table, Districts::RegionId)
                                .to(Regions::Table, Regions::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Communes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Communes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Communes::Code).string_len(32).not_null())
                        .col(ColumnDef::new(Communes::Name).string().not_null())
                        .col(ColumnDef::new(Communes::DistrictId).uuid().not_null())
                        .col(
                            ColumnDef::new(Communes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Communes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_communes_district")
                                .from(Communes::Table, Communes::DistrictId)
                                .to(Districts::Table, Districts::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(VotingCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VotingCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VotingCenters::Code)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(VotingCenters::Name).string().not_null())
                        .col(ColumnDef::new(VotingCenters::Address).string().null())
                        .col(ColumnDef::new(VotingCenters::Capacity).integer().null())
                        .col(ColumnDef::new(VotingCenters::CommuneId).uuid().not_null())
                        .col(
                            ColumnDef::new(VotingCenters::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VotingCenters::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_voting_centers_commune")
                                .from(VotingCenters::Table, VotingCenters::CommuneId)
                                .to(Communes::Table, Communes::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_regions_code")
                        .table(Regions::Table)
                        .col(Regions::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_districts_code")
                        .table(Districts::Table)
                        .col(Districts::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_districts_region_id")
                        .table(Districts::Table)
                        .col(Districts::RegionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_communes_code")
                        .table(Communes::Table)
                        .col(Communes::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_communes_district_id")
                        .table(Communes::Table)
                        .col(Communes::DistrictId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_voting_centers_code")
                        .table(VotingCenters::Table)
                        .col(VotingCenters::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_voting_centers_commune_id")
                        .table(VotingCenters::Table)
                        .col(VotingCenters::CommuneId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(VotingCenters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Communes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Districts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Regions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Regions {
        Table,
        Id,
        Code,
        Name,
        Capital,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Districts {
        Table,
        Id,
        Code,
        Name,
        Capital,
        RegionId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Communes {
        Table,
        Id,
        Code,
        Name,
        DistrictId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum VotingCenters {
        Table,
        Id,
        Code,
        Name,
        Address,
        Capacity,
        CommuneId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_materiel_types_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_materiel_types_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaterielTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterielTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterielTypes::Code)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterielTypes::Name).string().not_null())
                        .col(ColumnDef::new(MaterielTypes::Category).string().null())
                        .col(ColumnDef::new(MaterielTypes::Description).text().null())
                        .col(ColumnDef::new(MaterielTypes::Unit).string_len(32).null())
                        .col(
                            ColumnDef::new(MaterielTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterielTypes::UpdatedAt)
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
                        .name("idx_materiel_types_code")
                        .table(MaterielTypes::Table)
                        .col(MaterielTypes::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MaterielTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MaterielTypes {
        Table,
        Id,
        Code,
        Name,
        Category,
        Description,
        Unit,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_expedition_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_expedition_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Expeditions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Expeditions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Expeditions::Number).string_len(32).not_null())
                        .col(ColumnDef::new(Expeditions::Designation).string().not_null())
                        .col(
                            ColumnDef::new(Expeditions::Origin)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Expeditions::DepartureDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Expeditions::SenderName).string().null())
                        .col(ColumnDef::new(Expeditions::SenderAddress).string().null())
                        .col(
                            ColumnDef::new(Expeditions::Destination)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Expeditions::ArrivalDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Expeditions::ReceiverName).string().null())
                        .col(ColumnDef::new(Expeditions::ReceiverAddress).string().null())
                        .col(
                            ColumnDef::new(Expeditions::Status)
                                .string_len(16)
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Expeditions::Notes).text().null())
                        .col(ColumnDef::new(Expeditions::RegionId).uuid().null())
                        .col(ColumnDef::new(Expeditions::DistrictId).uuid().null())
                        .col(ColumnDef::new(Expeditions::CommuneId).uuid().null())
                        .col(ColumnDef::new(Expeditions::VotingCenterId).uuid().null())
                        .col(ColumnDef::new(Expeditions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Expeditions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Expeditions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expeditions_user")
                                .from(Expeditions::Table, Expeditions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expeditions_region")
                                .from(Expeditions::Table, Expeditions::RegionId)
                                .to(Regions::Table, Regions::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expeditions_district")
                                .from(Expeditions::Table, Expeditions::DistrictId)
                                .to(Districts::Table, Districts::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expeditions_commune")
                                .from(Expeditions::Table, Expeditions::CommuneId)
                                .to(Communes::Table, Communes::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expeditions_voting_center")
                                .from(Expeditions::Table, Expeditions::VotingCenterId)
                                .to(VotingCenters::Table, VotingCenters::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materiels::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materiels::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Materiels::ExpeditionId).uuid().not_null())
                        .col(ColumnDef::new(Materiels::MaterielTypeId).uuid().null())
                        .col(ColumnDef::new(Materiels::Designation).string().not_null())
                        .col(ColumnDef::new(Materiels::Category).string().null())
                        .col(ColumnDef::new(Materiels::Description).text().null())
                        .col(
                            ColumnDef::new(Materiels::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Materiels::QuantityReceived).integer().null())
                        .col(ColumnDef::new(Materiels::QuantityUsed).integer().null())
                        .col(
                            ColumnDef::new(Materiels::Status)
                                .string_len(16)
                                .not_null()
                                .default("good"),
                        )
                        .col(ColumnDef::new(Materiels::UserId).uuid().null())
                        .col(
                            ColumnDef::new(Materiels::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materiels::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materiels_expedition")
                                .from(Materiels::Table, Materiels::ExpeditionId)
                                .to(Expeditions::Table, Expeditions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materiels_materiel_type")
                                .from(Materiels::Table, Materiels::MaterielTypeId)
                                .to(MaterielTypes::Table, MaterielTypes::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materiels_user")
                                .from(Materiels::Table, Materiels::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Movements::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Movements::ExpeditionId).uuid().not_null())
                        .col(
                            ColumnDef::new(Movements::MovementType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::StatusBefore).string_len(16).null())
                        .col(
                            ColumnDef::new(Movements::StatusAfter)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::Location).string().null())
                        .col(ColumnDef::new(Movements::Notes).text().null())
                        .col(ColumnDef::new(Movements::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Movements::OccurredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_expedition")
                                .from(Movements::Table, Movements::ExpeditionId)
                                .to(Expeditions::Table, Expeditions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_user")
                                .from(Movements::Table, Movements::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // Numbers are unique; the generator relies on this index to detect collisions.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_expeditions_number")
                        .table(Expeditions::Table)
                        .col(Expeditions::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_expeditions_user_status")
                        .table(Expeditions::Table)
                        .col(Expeditions::UserId)
                        .col(Expeditions::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materiels_expedition_id")
                        .table(Materiels::Table)
                        .col(Materiels::ExpeditionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_expedition_occurred")
                        .table(Movements::Table)
                        .col(Movements::ExpeditionId)
                        .col(Movements::OccurredAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materiels::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Expeditions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Regions {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Districts {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Communes {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum VotingCenters {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum MaterielTypes {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Expeditions {
        Table,
        Id,
        Number,
        Designation,
        Origin,
        DepartureDate,
        SenderName,
        SenderAddress,
        Destination,
        ArrivalDate,
        ReceiverName,
        ReceiverAddress,
        Status,
        Notes,
        RegionId,
        DistrictId,
        CommuneId,
        VotingCenterId,
        UserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Materiels {
        Table,
        Id,
        ExpeditionId,
        MaterielTypeId,
        Designation,
        Category,
        Description,
        Quantity,
        QuantityReceived,
        QuantityUsed,
        Status,
        UserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Movements {
        Table,
        Id,
        ExpeditionId,
        MovementType,
        StatusBefore,
        StatusAfter,
        Location,
        Notes,
        UserId,
        OccurredAt,
    }
}
