pub use sea_orm_migration::prelude::*;

mod m20250103_000001_create_users_and_catalogue;
mod m20250103_000002_create_order_ledger;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250103_000001_create_users_and_catalogue::Migration),
            Box::new(m20250103_000002_create_order_ledger::Migration),
        ]
    }
}
