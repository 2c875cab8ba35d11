use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IdenStatic,
    IntoActiveModel, Iterable, Schema,
    sea_query::{OnConflict, Table},
};

use crate::{EngineError, ResultEngine};

/// Upsert `rows` in batches of `batch_size`, overwriting every non-key
/// column on key conflicts.
///
/// Every batch commits on its own; a failure reports the offset of the
/// failing batch and leaves the previous ones in place.
pub(crate) async fn upsert_batched<E, A, R>(
    db: &DatabaseConnection,
    table: &'static str,
    key: E::Column,
    rows: &[R],
    batch_size: usize,
) -> ResultEngine<usize>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + Send + for<'r> From<&'r R>,
{
    let update: Vec<E::Column> = E::Column::iter()
        .filter(|column| column.as_str() != key.as_str())
        .collect();

    let mut written = 0;
    for (batch, chunk) in rows.chunks(batch_size.max(1)).enumerate() {
        let offset = batch * batch_size.max(1);
        E::insert_many(chunk.iter().map(A::from))
            .on_conflict(
                OnConflict::column(key)
                    .update_columns(update.iter().copied())
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await
            .map_err(|source| EngineError::SinkWrite {
                table,
                offset,
                source,
            })?;
        written += chunk.len();
        tracing::debug!("{table}: wrote batch at offset {offset} ({} rows)", chunk.len());
    }
    Ok(written)
}

/// Drop and create `E`'s table from the entity definition.
pub(crate) async fn recreate_table<E>(db: &DatabaseConnection, entity: E) -> ResultEngine<()>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let drop = Table::drop().table(entity.table_ref()).if_exists().to_owned();
    db.execute(backend.build(&drop)).await?;

    let create = Schema::new(backend).create_table_from_entity(entity);
    db.execute(backend.build(&create)).await?;
    tracing::debug!("recreated table {}", entity.table_name());
    Ok(())
}

/// Create `E`'s table unless it already exists.
pub(crate) async fn ensure_table<E>(db: &DatabaseConnection, entity: E) -> ResultEngine<()>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let create = Schema::new(backend)
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&create)).await?;
    Ok(())
}
