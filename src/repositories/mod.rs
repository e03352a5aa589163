use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PrimaryKeyTrait, QueryFilter, QueryOrder,
};

use crate::entities::{
    customs_operation, invoice, picking, purchase_order, sale_order, subscription,
};
use crate::errors::ServiceError;

pub mod lot_repository;

/// How a `{identifier}` path segment addresses a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Id(i32),
    Name(String),
}

impl Identifier {
    /// All-digit segments are ids, everything else is a business reference.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i32>() {
                return Identifier::Id(id);
            }
        }
        Identifier::Name(raw.to_string())
    }
}

/// Records that carry a unique business reference next to their id
pub trait Referenced: EntityTrait {
    fn id_column() -> Self::Column;
    fn name_column() -> Self::Column;
}

macro_rules! referenced {
    ($($module:ident),* $(,)?) => {
        $(
            impl Referenced for $module::Entity {
                fn id_column() -> Self::Column {
                    $module::Column::Id
                }

                fn name_column() -> Self::Column {
                    $module::Column::Name
                }
            }
        )*
    };
}

referenced!(
    purchase_order,
    sale_order,
    invoice,
    picking,
    customs_operation,
    subscription
);

/// Finds by numeric id first and falls back to the `name` column.
pub async fn find_by_identifier<E, C>(db: &C, identifier: &str) -> Result<Option<E::Model>, DbErr>
where
    E: Referenced,
    C: ConnectionTrait,
{
    let name = match Identifier::parse(identifier) {
        Identifier::Id(id) => {
            if let Some(found) = E::find().filter(E::id_column().eq(id)).one(db).await? {
                return Ok(Some(found));
            }
            identifier.trim().to_string()
        }
        Identifier::Name(name) => name,
    };

    E::find()
        .filter(E::name_column().eq(name))
        .order_by_asc(E::id_column())
        .one(db)
        .await
}

/// `find_by_identifier`, mapping a miss to `"{what} not found"`.
pub async fn require_by_identifier<E, C>(
    db: &C,
    identifier: &str,
    what: &str,
) -> Result<E::Model, ServiceError>
where
    E: Referenced,
    C: ConnectionTrait,
{
    find_by_identifier::<E, C>(db, identifier)
        .await?
        .ok_or_else(|| ServiceError::not_found(what))
}

pub async fn get_by_id<E, C>(db: &C, id: i32, what: &str) -> Result<E::Model, ServiceError>
where
    E: EntityTrait,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = i32>,
    C: ConnectionTrait,
{
    E::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(what))
}

/// Sequence reference such as `P00012` or `WH/IN/00003`
pub fn sequence_name(prefix: &str, id: i32) -> String {
    format!("{}{:05}", prefix, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Identifier::Id(42))]
    #[case(" 7 ", Identifier::Id(7))]
    #[case("P00042", Identifier::Name("P00042".into()))]
    #[case("WH/IN/00001", Identifier::Name("WH/IN/00001".into()))]
    #[case("-3", Identifier::Name("-3".into()))]
    #[case("99999999999", Identifier::Name("99999999999".into()))]
    fn parses_identifiers(#[case] raw: &str, #[case] expected: Identifier) {
        assert_eq!(Identifier::parse(raw), expected);
    }

    #[test]
    fn sequence_names_are_zero_padded() {
        assert_eq!(sequence_name("P", 12), "P00012");
        assert_eq!(sequence_name("WH/OUT/", 3), "WH/OUT/00003");
        assert_eq!(sequence_name("S", 123456), "S123456");
    }
}
