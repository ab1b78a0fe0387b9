use crate::domain::{
    Device, DeviceId, DeviceStore, EncodedDocument, RawDocument, RequestContext, StoreError,
    StoreResult, decode, encode,
};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tracing::{debug, instrument};

/// Format version byte prefixed to jsonb values on the wire
const JSONB_VERSION: u8 = 1;

const SELECT_COLUMNS: &str = "id, hardware_id, name, metadata, created_at, updated_at";

/// Encoded metadata bound as a query parameter
#[derive(Debug)]
struct DocumentParam(EncodedDocument);

impl ToSql for DocumentParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.0 {
            EncodedDocument::Null => Ok(IsNull::Yes),
            EncodedDocument::Text(text) => {
                if *ty == Type::JSONB {
                    out.put_u8(JSONB_VERSION);
                }
                out.put_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::JSONB | Type::JSON | Type::TEXT | Type::VARCHAR)
    }

    to_sql_checked!();
}

/// Metadata column exactly as the driver delivered it, before decoding
struct DocumentColumn<'a>(RawDocument<'a>);

impl<'a> FromSql<'a> for DocumentColumn<'a> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let document = match *ty {
            Type::JSONB => match raw.split_first() {
                None => RawDocument::Bytes(raw),
                Some((&JSONB_VERSION, body)) => RawDocument::Bytes(body),
                Some(_) => RawDocument::Unsupported("jsonb with unknown format version"),
            },
            Type::JSON => RawDocument::Bytes(raw),
            Type::TEXT | Type::VARCHAR => RawDocument::Text(std::str::from_utf8(raw)?),
            _ => RawDocument::Unsupported("non-document column"),
        };
        Ok(Self(document))
    }

    fn from_sql_null(_: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self(RawDocument::Null))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::JSONB | Type::JSON | Type::TEXT | Type::VARCHAR)
    }
}

fn device_from_pg(row: &tokio_postgres::Row) -> StoreResult<Device> {
    let id = DeviceId::from_uuid(row.try_get(0).context("failed to read id column")?);
    let column_context = |column: &str| format!("failed to read {column} column of device {id}");

    let document: DocumentColumn<'_> = row
        .try_get(3)
        .with_context(|| column_context("metadata"))?;

    Ok(Device {
        id,
        hardware_id: row.try_get(1).with_context(|| column_context("hardware_id"))?,
        name: row.try_get(2).with_context(|| column_context("name"))?,
        metadata: decode(document.0).map_err(|e| StoreError::codec(id, e))?,
        created_at: Some(row.try_get(4).with_context(|| column_context("created_at"))?),
        updated_at: Some(row.try_get(5).with_context(|| column_context("updated_at"))?),
    })
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    // PostgreSQL error code 23505 is unique_violation
    err.as_db_error()
        .is_some_and(|db_err| db_err.code().code() == "23505")
}

/// PostgreSQL implementation of DeviceStore trait
#[derive(Clone)]
pub struct PostgresDeviceStore {
    client: PostgresClient,
}

impl PostgresDeviceStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceStore for PostgresDeviceStore {
    #[instrument(skip(self, ctx, device), fields(device_id = %device.id, hardware_id = %device.hardware_id))]
    async fn save(&self, ctx: &RequestContext, device: &mut Device) -> StoreResult<()> {
        let id = if device.id.is_nil() {
            DeviceId::generate()
        } else {
            device.id
        };
        let metadata = DocumentParam(
            encode(Some(&device.metadata))
                .map_err(|e| StoreError::codec(&device.hardware_id, e))?,
        );
        let now = Utc::now();

        let row = ctx
            .run(async {
                let conn = self.client.get_connection().await?;

                let result = conn
                    .query_one(
                        "INSERT INTO devices (id, hardware_id, name, metadata, created_at, updated_at)
                         VALUES ($1, $2, $3, $4, $5, $5)
                         ON CONFLICT (id) DO UPDATE
                         SET hardware_id = EXCLUDED.hardware_id,
                             name = EXCLUDED.name,
                             metadata = EXCLUDED.metadata,
                             updated_at = EXCLUDED.updated_at
                         RETURNING created_at, updated_at",
                        &[
                            id.as_uuid(),
                            &device.hardware_id,
                            &device.name,
                            &metadata,
                            &now,
                        ],
                    )
                    .await;

                match result {
                    Ok(row) => Ok(row),
                    Err(e) if is_unique_violation(&e) => {
                        Err(StoreError::Conflict(device.hardware_id.clone()))
                    }
                    Err(e) => Err(StoreError::Repository(anyhow::Error::new(e).context(
                        format!("failed to upsert device {id} ({})", device.hardware_id),
                    ))),
                }
            })
            .await?;

        let created_at: DateTime<Utc> = row
            .try_get(0)
            .with_context(|| format!("failed to read created_at of saved device {id}"))?;
        let updated_at: DateTime<Utc> = row
            .try_get(1)
            .with_context(|| format!("failed to read updated_at of saved device {id}"))?;

        device.id = id;
        device.created_at = Some(created_at);
        device.updated_at = Some(updated_at);

        debug!(device_id = %id, "saved device");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(device_id = %id))]
    async fn find_by_id(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<Device> {
        let row = ctx
            .run(async {
                let conn = self.client.get_connection().await?;
                conn.query_opt(
                    &format!("SELECT {} FROM devices WHERE id = $1", SELECT_COLUMNS),
                    &[id.as_uuid()],
                )
                .await
                .with_context(|| format!("failed to query device {id}"))
                .map_err(StoreError::from)
            })
            .await?;

        match row {
            Some(row) => device_from_pg(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    #[instrument(skip(self, ctx), fields(hardware_id = %hardware_id))]
    async fn find_by_hardware_id(
        &self,
        ctx: &RequestContext,
        hardware_id: &str,
    ) -> StoreResult<Device> {
        let row = ctx
            .run(async {
                let conn = self.client.get_connection().await?;
                conn.query_opt(
                    &format!(
                        "SELECT {} FROM devices WHERE hardware_id = $1",
                        SELECT_COLUMNS
                    ),
                    &[&hardware_id],
                )
                .await
                .with_context(|| format!("failed to query device by hardware id {hardware_id}"))
                .map_err(StoreError::from)
            })
            .await?;

        match row {
            Some(row) => device_from_pg(&row),
            None => Err(StoreError::NotFound(hardware_id.to_string())),
        }
    }

    #[instrument(skip(self, ctx))]
    async fn find_all(&self, ctx: &RequestContext) -> StoreResult<Vec<Device>> {
        let rows = ctx
            .run(async {
                let conn = self.client.get_connection().await?;
                conn.query(
                    &format!(
                        "SELECT {} FROM devices ORDER BY created_at ASC, id ASC",
                        SELECT_COLUMNS
                    ),
                    &[],
                )
                .await
                .context("failed to query devices")
                .map_err(StoreError::from)
            })
            .await?;

        let devices = rows
            .iter()
            .map(device_from_pg)
            .collect::<StoreResult<Vec<_>>>()?;

        debug!("found {} devices", devices.len());
        Ok(devices)
    }

    #[instrument(skip(self, ctx), fields(device_id = %id))]
    async fn delete(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<()> {
        let rows_affected = ctx
            .run(async {
                let conn = self.client.get_connection().await?;
                conn.execute("DELETE FROM devices WHERE id = $1", &[id.as_uuid()])
                    .await
                    .with_context(|| format!("failed to delete device {id}"))
                    .map_err(StoreError::from)
            })
            .await?;

        debug!(device_id = %id, rows_affected, "deleted device");
        Ok(())
    }
}
